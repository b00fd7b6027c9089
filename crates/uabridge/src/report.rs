// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Item status report.
//!
//! ```text
//! Connected items: 3 of 4 (state Connected, subscription 7)
//!  idx name                 type         remote       status path
//!    2 tank_level           float64      -            Bad    2:Plant.Tank.Level  (not found)
//! ```

use std::fmt;

use serde::Serialize;

use crate::item::{Item, ItemIndex, ItemStatus, LocalType, RemoteType};
use crate::registry::ItemRegistry;
use crate::subscription::SubscriptionEngine;
use crate::supervisor::ConnectionState;

/// One row of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    /// Registry index.
    pub index: ItemIndex,
    /// Host-side name.
    pub name: String,
    /// Local type.
    pub local_type: LocalType,
    /// Array capacity, `None` for scalars.
    pub capacity: Option<usize>,
    /// Last observed wire type.
    pub remote_type: Option<RemoteType>,
    /// Item status.
    pub status: ItemStatus,
    /// Addressing expression.
    pub path: String,
    /// Whether the item is wired to a node.
    pub wired: bool,
    /// Last failure, if any.
    pub last_error: Option<String>,
}

impl ItemReport {
    fn from_item(item: &Item, wired: bool) -> Self {
        let (status, remote_type, last_error) =
            item.with_state(|s| (s.status, s.remote_type, s.last_error.clone()));
        Self {
            index: item.index(),
            name: item.name().to_string(),
            local_type: item.local_type(),
            capacity: item.is_array().then(|| item.capacity()),
            remote_type,
            status,
            path: item.path().to_string(),
            wired,
            last_error,
        }
    }

    fn type_label(&self) -> String {
        match self.capacity {
            Some(capacity) => format!("{}[{}]", self.local_type, capacity),
            None => self.local_type.to_string(),
        }
    }
}

/// Snapshot of the bridge for operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Connection state.
    pub state: ConnectionState,
    /// Current subscription id.
    pub subscription_id: Option<u32>,
    /// Registered items.
    pub total: usize,
    /// Items wired to a node.
    pub connected: usize,
    /// Rows included at the requested verbosity.
    pub items: Vec<ItemReport>,
}

impl StatusReport {
    /// Collects a report.
    ///
    /// Verbosity 0 only counts, 1 lists bad items, 2 or more lists every item.
    pub fn collect(
        registry: &ItemRegistry,
        engine: &SubscriptionEngine,
        state: ConnectionState,
        verbosity: u8,
    ) -> Self {
        let wiring = engine.wiring();
        let all = registry.snapshot();
        let is_wired = |item: &Item| {
            wiring
                .as_ref()
                .is_some_and(|w| w.handles.contains_key(&item.index()))
        };
        let connected = all.iter().filter(|item| is_wired(item)).count();

        let items = match verbosity {
            0 => Vec::new(),
            1 => all
                .iter()
                .filter(|item| !item.status().is_good())
                .map(|item| ItemReport::from_item(item, is_wired(item)))
                .collect(),
            _ => all
                .iter()
                .map(|item| ItemReport::from_item(item, is_wired(item)))
                .collect(),
        };

        Self {
            state,
            subscription_id: wiring.as_ref().map(|w| w.subscription_id),
            total: all.len(),
            connected,
            items,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connected items: {}", self.connected)?;
        if self.connected != self.total {
            write!(f, " of {}", self.total)?;
        }
        write!(f, " (state {}", self.state)?;
        if let Some(id) = self.subscription_id {
            write!(f, ", subscription {}", id)?;
        }
        f.write_str(")")?;

        if self.items.is_empty() {
            return Ok(());
        }
        write!(
            f,
            "\n{:>4} {:<20} {:<12} {:<12} {:<6} path",
            "idx", "name", "type", "remote", "status"
        )?;
        for row in &self.items {
            let remote = row
                .remote_type
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string());
            write!(
                f,
                "\n{:>4} {:<20} {:<12} {:<12} {:<6} {}",
                row.index.get(),
                row.name,
                row.type_label(),
                remote,
                row.status.to_string(),
                row.path
            )?;
            if let Some(error) = &row.last_error {
                write!(f, "  ({})", error)?;
            }
        }
        Ok(())
    }
}
