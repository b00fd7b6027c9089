// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The bridge facade used by the host.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use uabridge::{Bridge, BridgeConfig, Direction, InMemorySession, LocalType};
//!
//! # async fn example() -> uabridge::BridgeResult<()> {
//! let session = Arc::new(InMemorySession::new("opc.tcp://localhost:4840"));
//! let bridge = Bridge::builder(BridgeConfig::new("opc.tcp://localhost:4840"))
//!     .session(session)
//!     .build()?;
//!
//! let level = bridge.register_item("2:Plant.Tank.Level", Direction::Input, LocalType::Float64, None)?;
//! bridge.start().await?;
//! let reading = bridge.read(level)?;
//! println!("{} {}", reading.value, reading.status);
//! bridge.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::coercion::CoercionTable;
use crate::config::BridgeConfig;
use crate::context::{BridgeContext, SharedContext};
use crate::error::{BridgeResult, ConfigError};
use crate::hooks::{HostHooks, NoopHooks};
use crate::item::{Direction, Item, ItemDefinition, ItemIndex, ItemReading, LocalType, LocalValue};
use crate::report::StatusReport;
use crate::session::{SessionClient, SessionStatus};
use crate::stats::StatsSnapshot;
use crate::subscription::SubscriptionEngine;
use crate::supervisor::{ConnectionState, ConnectionSupervisor};

// =============================================================================
// Bridge
// =============================================================================

/// One bridge instance: items, subscription and connection supervision.
pub struct Bridge {
    context: SharedContext,
    engine: Arc<SubscriptionEngine>,
    supervisor: Arc<ConnectionSupervisor>,
}

impl Bridge {
    /// Creates a builder.
    pub fn builder(config: BridgeConfig) -> BridgeBuilder {
        BridgeBuilder::new(config)
    }

    /// Registers an item and returns its index.
    ///
    /// Items registered after [`start`](Self::start) are picked up by the
    /// next wiring.
    pub fn register_item(
        &self,
        path: &str,
        direction: Direction,
        local_type: LocalType,
        array_capacity: Option<usize>,
    ) -> BridgeResult<ItemIndex> {
        let mut definition = ItemDefinition::new(path, direction, local_type);
        if let Some(capacity) = array_capacity {
            definition = definition.array(capacity);
        }
        self.register(definition)
    }

    /// Registers an item from a full definition.
    pub fn register(&self, definition: ItemDefinition) -> BridgeResult<ItemIndex> {
        self.context.registry().register(definition)
    }

    /// Returns an item.
    pub fn item(&self, index: ItemIndex) -> BridgeResult<Arc<Item>> {
        self.context.registry().get(index)
    }

    /// Returns the stored value, status and timestamp. Never contacts the server.
    pub fn read(&self, index: ItemIndex) -> BridgeResult<ItemReading> {
        Ok(self.context.registry().get(index)?.read())
    }

    /// Writes a value to an output item's node.
    pub async fn write(&self, index: ItemIndex, value: impl Into<LocalValue>) -> BridgeResult<()> {
        self.engine.write(index, value.into()).await
    }

    /// Starts event processing and, with auto-connect, connects.
    pub async fn start(&self) -> BridgeResult<()> {
        info!(
            endpoint = %self.context.session().endpoint(),
            items = self.context.registry().len(),
            auto_connect = self.context.config().auto_connect,
            "Starting bridge"
        );
        self.supervisor.start().await
    }

    /// Connects now. Used when auto-connect is off.
    pub async fn connect(&self) -> BridgeResult<()> {
        self.supervisor.connect().await
    }

    /// Unsubscribes and disconnects.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    /// Connection state.
    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Watches connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.subscribe()
    }

    /// Last session status received.
    pub fn last_session_status(&self) -> Option<SessionStatus> {
        self.supervisor.last_status()
    }

    /// Current subscription id.
    pub fn subscription_id(&self) -> Option<u32> {
        self.engine.current_subscription()
    }

    /// Item status report at the given verbosity.
    pub fn report(&self, verbosity: u8) -> StatusReport {
        StatusReport::collect(
            self.context.registry(),
            &self.engine,
            self.supervisor.state(),
            verbosity,
        )
    }

    /// Counter snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.context.stats().snapshot()
    }

    /// Shared context.
    pub fn context(&self) -> &SharedContext {
        &self.context
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("context", &self.context)
            .field("supervisor", &self.supervisor)
            .finish()
    }
}

// =============================================================================
// BridgeBuilder
// =============================================================================

/// Builder for [`Bridge`].
pub struct BridgeBuilder {
    config: BridgeConfig,
    session: Option<Arc<dyn SessionClient>>,
    hooks: Option<Arc<dyn HostHooks>>,
    coercion: Option<CoercionTable>,
}

impl BridgeBuilder {
    /// Creates a builder.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            session: None,
            hooks: None,
            coercion: None,
        }
    }

    /// Sets the session client. Required.
    pub fn session(mut self, session: Arc<dyn SessionClient>) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets the host hooks. Defaults to [`NoopHooks`].
    pub fn hooks(mut self, hooks: Arc<dyn HostHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Replaces the standard coercion table.
    pub fn coercion(mut self, table: CoercionTable) -> Self {
        self.coercion = Some(table);
        self
    }

    /// Validates the coercion table, registers configured items and builds
    /// the bridge.
    pub fn build(self) -> BridgeResult<Bridge> {
        let session = self
            .session
            .ok_or_else(|| ConfigError::invalid_field("session", "no session client given"))?;
        let hooks = self.hooks.unwrap_or_else(|| Arc::new(NoopHooks));
        let definitions = self.config.item_definitions();
        let context = BridgeContext::with_coercion(
            self.config,
            self.coercion.unwrap_or_default(),
            session,
            hooks,
        )?;
        for definition in definitions {
            context.registry().register(definition)?;
        }

        let context = Arc::new(context);
        let engine = Arc::new(SubscriptionEngine::new(context.clone()));
        let supervisor = ConnectionSupervisor::new(context.clone(), engine.clone());
        Ok(Bridge {
            context,
            engine,
            supervisor,
        })
    }
}

impl fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("config", &self.config)
            .field("session", &self.session.as_ref().map(|s| s.endpoint().to_string()))
            .finish()
    }
}
