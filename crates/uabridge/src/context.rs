// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared bridge context.
//!
//! Everything the resolver, the subscription engine and the supervisor need
//! is reached through one [`BridgeContext`] passed to their constructors.
//! There is no process-wide client; independent contexts can coexist, which
//! is what the tests do.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::coercion::CoercionTable;
use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::hooks::HostHooks;
use crate::registry::ItemRegistry;
use crate::session::SessionClient;
use crate::stats::BridgeStats;

/// Shared handle to a [`BridgeContext`].
pub type SharedContext = Arc<BridgeContext>;

/// Collaborators and shared state of one bridge instance.
pub struct BridgeContext {
    config: BridgeConfig,
    registry: ItemRegistry,
    coercion: CoercionTable,
    session: Arc<dyn SessionClient>,
    hooks: Arc<dyn HostHooks>,
    stats: BridgeStats,
}

impl BridgeContext {
    /// Creates a context with the standard coercion table.
    pub fn new(
        config: BridgeConfig,
        session: Arc<dyn SessionClient>,
        hooks: Arc<dyn HostHooks>,
    ) -> BridgeResult<Self> {
        Self::with_coercion(config, CoercionTable::standard(), session, hooks)
    }

    /// Creates a context with a custom coercion table.
    ///
    /// Fails if the table does not cover every wire/local type pair.
    pub fn with_coercion(
        config: BridgeConfig,
        coercion: CoercionTable,
        session: Arc<dyn SessionClient>,
        hooks: Arc<dyn HostHooks>,
    ) -> BridgeResult<Self> {
        coercion.validate()?;
        debug!(
            endpoint = %session.endpoint(),
            rules = coercion.len(),
            "Bridge context created"
        );
        Ok(Self {
            registry: ItemRegistry::new(config.defaults.clone()),
            config,
            coercion,
            session,
            hooks,
            stats: BridgeStats::new(),
        })
    }

    /// Bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Item registry.
    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    /// Coercion table.
    pub fn coercion(&self) -> &CoercionTable {
        &self.coercion
    }

    /// Session client.
    pub fn session(&self) -> &Arc<dyn SessionClient> {
        &self.session
    }

    /// Host hooks.
    pub fn hooks(&self) -> &Arc<dyn HostHooks> {
        &self.hooks
    }

    /// Counters.
    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }
}

impl fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeContext")
            .field("endpoint", &self.session.endpoint())
            .field("items", &self.registry.len())
            .field("coercion", &self.coercion)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;
    use crate::item::LocalType;
    use crate::session::InMemorySession;
    use crate::types::WireType;

    fn session() -> Arc<dyn SessionClient> {
        Arc::new(InMemorySession::new("opc.tcp://localhost:4840"))
    }

    #[test]
    fn test_context_with_standard_table() {
        let ctx = BridgeContext::new(
            BridgeConfig::new("opc.tcp://localhost:4840"),
            session(),
            Arc::new(NoopHooks),
        )
        .unwrap();
        assert!(ctx.registry().is_empty());
        assert_eq!(ctx.coercion().len(), 117);
    }

    #[test]
    fn test_incomplete_table_fails_at_startup() {
        let mut table = CoercionTable::standard();
        table.remove(WireType::Float, LocalType::String);
        let result = BridgeContext::with_coercion(
            BridgeConfig::new("opc.tcp://localhost:4840"),
            table,
            session(),
            Arc::new(NoopHooks),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_independent_contexts() {
        let config = BridgeConfig::new("opc.tcp://localhost:4840");
        let a = BridgeContext::new(config.clone(), session(), Arc::new(NoopHooks)).unwrap();
        let b = BridgeContext::new(config, session(), Arc::new(NoopHooks)).unwrap();
        a.registry()
            .register(crate::item::ItemDefinition::new(
                "2,1",
                crate::item::Direction::Input,
                LocalType::Int32,
            ))
            .unwrap();
        assert_eq!(a.registry().len(), 1);
        assert!(b.registry().is_empty());
    }
}
