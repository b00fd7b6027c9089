// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session client abstraction.
//!
//! The wire protocol is not implemented here. The bridge talks to the server
//! through [`SessionClient`]; a real client library is wrapped behind it, and
//! [`InMemorySession`] provides an in-process server for tests and the
//! `simulate` command.
//!
//! Asynchronous traffic from the server (data changes and session status
//! changes) arrives as [`SessionEvent`]s on the channel handed to
//! [`SessionClient::connect`].

mod memory;

pub use memory::InMemorySession;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::browse::{BrowsePath, BrowsePathResult};
use crate::error::BridgeResult;
use crate::types::{DataValue, NodeId, StatusCode, UaValue};

// =============================================================================
// Events
// =============================================================================

/// Session status notifications delivered by the client library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The session is connected.
    Connected,
    /// The session was closed.
    Disconnected,
    /// Keep-alive watchdog expired.
    WatchdogTimeout,
    /// Automatic reconnection failed; server-side state is lost.
    ReconnectError,
    /// The server announced shutdown.
    ServerShutdown,
    /// The client library had to create a fresh session.
    NewSessionCreated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::WatchdogTimeout => "WatchdogTimeout",
            Self::ReconnectError => "ReconnectError",
            Self::ServerShutdown => "ServerShutdown",
            Self::NewSessionCreated => "NewSessionCreated",
        };
        f.write_str(name)
    }
}

/// One monitored item change inside a publish response.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    /// Client handle given when the monitored item was created.
    pub client_handle: u32,
    /// The new value.
    pub value: DataValue,
}

/// Asynchronous traffic from the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A batch of data changes for one subscription.
    DataChange {
        /// Subscription the batch belongs to.
        subscription_id: u32,
        /// Changes in arrival order.
        changes: Vec<DataChange>,
    },
    /// The session status changed.
    StatusChanged(SessionStatus),
}

/// Sender half handed to the session on connect.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiver half consumed by the bridge.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

// =============================================================================
// Monitored items
// =============================================================================

/// Parameters of one monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemRequest {
    /// Node to monitor.
    pub node_id: NodeId,
    /// Handle echoed back in every notification.
    pub client_handle: u32,
    /// Requested sampling interval in milliseconds.
    pub sampling_interval_ms: f64,
    /// Server-side queue depth.
    pub queue_size: u32,
    /// Drop the oldest queued value on overflow.
    pub discard_oldest: bool,
}

/// Server answer for one monitored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredItemResult {
    /// Creation status.
    pub status: StatusCode,
    /// Server-assigned id.
    pub monitored_item_id: u32,
}

// =============================================================================
// SessionClient
// =============================================================================

/// Operations the bridge needs from a session client library.
///
/// Implementations must be `Send + Sync`; every method takes `&self` so the
/// client can be shared between the supervisor, the dispatch task and host
/// write calls.
#[async_trait]
pub trait SessionClient: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Connects and starts delivering events into `events`.
    async fn connect(&self, events: EventSender) -> BridgeResult<()>;

    /// Closes the session.
    async fn disconnect(&self) -> BridgeResult<()>;

    /// Returns `true` while the session is connected.
    fn is_connected(&self) -> bool;

    /// Server endpoint url.
    fn endpoint(&self) -> &str;

    // =========================================================================
    // Services
    // =========================================================================

    /// Translates browse paths to node ids in one batched call.
    ///
    /// Results are positionally aligned with `paths`.
    async fn translate_browse_paths(
        &self,
        paths: &[BrowsePath],
    ) -> BridgeResult<Vec<BrowsePathResult>>;

    /// Reads the value attribute of several nodes in one call.
    ///
    /// Results are positionally aligned with `nodes`.
    async fn read_values(&self, nodes: &[NodeId]) -> BridgeResult<Vec<DataValue>>;

    /// Writes the value attribute of one node.
    ///
    /// `Ok` carries the per-node status; `Err` means the call itself failed.
    async fn write_value(&self, node: &NodeId, value: UaValue) -> BridgeResult<StatusCode>;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Creates a subscription and returns its id.
    async fn create_subscription(&self, publishing_interval: Duration) -> BridgeResult<u32>;

    /// Deletes a subscription.
    async fn delete_subscription(&self, subscription_id: u32) -> BridgeResult<()>;

    /// Creates monitored items; results are aligned with `items`.
    async fn create_monitored_items(
        &self,
        subscription_id: u32,
        items: &[MonitoredItemRequest],
    ) -> BridgeResult<Vec<MonitoredItemResult>>;
}
