// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process session backed by a node table.
//!
//! Behaves like a small server: nodes are addressable by id and by browse
//! path, writes come back as data change notifications on every subscription
//! monitoring the node, and monitored item creation delivers the current
//! value. Tests drive the failure cases through the control methods
//! ([`fail_next_connects`](InMemorySession::fail_next_connects),
//! [`fail_next_subscriptions`](InMemorySession::fail_next_subscriptions),
//! [`fail_next_monitored_items`](InMemorySession::fail_next_monitored_items),
//! [`reject_writes`](InMemorySession::reject_writes),
//! [`notify_status`](InMemorySession::notify_status)).

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    DataChange, EventSender, MonitoredItemRequest, MonitoredItemResult, SessionClient,
    SessionEvent, SessionStatus,
};
use crate::browse::{BrowsePath, BrowsePathResult, QualifiedName};
use crate::error::{BridgeResult, ConnectionError, PathError, SubscriptionError};
use crate::resolver::ItemPath;
use crate::types::{DataValue, NodeId, StatusCode, UaValue};

#[derive(Debug, Clone)]
struct Monitored {
    node_id: NodeId,
    client_handle: u32,
}

#[derive(Debug, Default)]
struct ServerState {
    connected: bool,
    events: Option<EventSender>,
    nodes: HashMap<NodeId, DataValue>,
    browse_index: HashMap<Vec<QualifiedName>, NodeId>,
    subscriptions: HashMap<u32, Vec<Monitored>>,
    next_subscription_id: u32,
    next_monitored_id: u32,
    failing_connects: u32,
    failing_subscriptions: u32,
    failing_monitored: u32,
    subscription_delay: Duration,
    write_status: Option<StatusCode>,
    writes: Vec<(NodeId, UaValue)>,
}

impl ServerState {
    fn send(&self, event: SessionEvent) {
        match &self.events {
            Some(events) => {
                if events.send(event).is_err() {
                    trace!("Session event dropped, receiver closed");
                }
            }
            None => trace!("Session event dropped, no receiver"),
        }
    }

    /// Sends the node's current value to every subscription monitoring it.
    fn publish(&self, node: &NodeId) {
        let Some(value) = self.nodes.get(node) else {
            return;
        };
        let mut ids: Vec<_> = self.subscriptions.keys().copied().collect();
        ids.sort_unstable();
        for subscription_id in ids {
            let changes: Vec<DataChange> = self.subscriptions[&subscription_id]
                .iter()
                .filter(|m| &m.node_id == node)
                .map(|m| DataChange {
                    client_handle: m.client_handle,
                    value: value.clone(),
                })
                .collect();
            if !changes.is_empty() {
                self.send(SessionEvent::DataChange {
                    subscription_id,
                    changes,
                });
            }
        }
    }

    fn ensure_connected(&self) -> BridgeResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected.into())
        }
    }
}

/// A session client serving an in-memory node table.
#[derive(Debug)]
pub struct InMemorySession {
    endpoint: String,
    state: Mutex<ServerState>,
    initial_values: bool,
    connect_attempts: AtomicU64,
}

impl InMemorySession {
    /// Creates an empty server for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: Mutex::new(ServerState {
                next_subscription_id: 1,
                next_monitored_id: 1,
                ..ServerState::default()
            }),
            initial_values: true,
            connect_attempts: AtomicU64::new(0),
        }
    }

    /// Disables the initial notification sent when a monitored item is created.
    pub fn without_initial_values(mut self) -> Self {
        self.initial_values = false;
        self
    }

    // =========================================================================
    // Address space
    // =========================================================================

    /// Adds a node reachable by id.
    pub fn add_node(&self, node: NodeId, value: UaValue) {
        self.state.lock().nodes.insert(node, DataValue::good(value));
    }

    /// Adds a node reachable by id and by the browse path of `path`.
    pub fn add_browse_node(&self, path: &str, node: NodeId, value: UaValue) -> Result<(), PathError> {
        let names: Vec<QualifiedName> = match ItemPath::parse(path)? {
            ItemPath::Browse(browse) => browse.names().cloned().collect(),
            ItemPath::Direct(_) => {
                return Err(PathError::MissingDelimiter {
                    path: path.to_string(),
                })
            }
        };
        let mut state = self.state.lock();
        state.browse_index.insert(names, node.clone());
        state.nodes.insert(node, DataValue::good(value));
        Ok(())
    }

    /// Replaces a node value without notifying anyone.
    pub fn set_value(&self, node: &NodeId, value: DataValue) {
        self.state.lock().nodes.insert(node.clone(), value);
    }

    /// Current value of a node.
    pub fn value(&self, node: &NodeId) -> Option<DataValue> {
        self.state.lock().nodes.get(node).cloned()
    }

    // =========================================================================
    // Event injection
    // =========================================================================

    /// Changes a node value from "outside" and notifies monitoring subscriptions.
    pub fn notify_change(&self, node: &NodeId, value: UaValue) {
        self.notify_data_value(node, DataValue::good(value));
    }

    /// Stores a full data value and notifies monitoring subscriptions.
    pub fn notify_data_value(&self, node: &NodeId, value: DataValue) {
        let mut state = self.state.lock();
        state.nodes.insert(node.clone(), value);
        state.publish(node);
    }

    /// Sends a raw data change batch, bypassing the node table.
    pub fn send_data_change(&self, subscription_id: u32, changes: Vec<DataChange>) {
        self.state.lock().send(SessionEvent::DataChange {
            subscription_id,
            changes,
        });
    }

    /// Applies a session status change and reports it to the bridge.
    ///
    /// Reconnect errors, server shutdown and new sessions lose every
    /// subscription, as they would on a real server.
    pub fn notify_status(&self, status: SessionStatus) {
        let mut state = self.state.lock();
        match status {
            SessionStatus::ReconnectError | SessionStatus::ServerShutdown => {
                state.connected = false;
                state.subscriptions.clear();
            }
            SessionStatus::Disconnected => state.connected = false,
            SessionStatus::NewSessionCreated => {
                state.connected = true;
                state.subscriptions.clear();
            }
            SessionStatus::Connected => state.connected = true,
            SessionStatus::WatchdogTimeout => {}
        }
        debug!(%status, "Simulated session status");
        state.send(SessionEvent::StatusChanged(status));
    }

    // =========================================================================
    // Failure injection and inspection
    // =========================================================================

    /// Makes the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.state.lock().failing_connects = count;
    }

    /// Makes the next `count` subscription creations fail.
    pub fn fail_next_subscriptions(&self, count: u32) {
        self.state.lock().failing_subscriptions = count;
    }

    /// Makes the next `count` monitored item service calls fail.
    pub fn fail_next_monitored_items(&self, count: u32) {
        self.state.lock().failing_monitored = count;
    }

    /// Delays every subscription creation by `delay`.
    pub fn delay_subscriptions(&self, delay: Duration) {
        self.state.lock().subscription_delay = delay;
    }

    /// Makes every write return `status`; `None` restores normal writes.
    pub fn reject_writes(&self, status: Option<StatusCode>) {
        self.state.lock().write_status = status;
    }

    /// Number of connect calls so far.
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Writes accepted so far, in order.
    pub fn writes(&self) -> Vec<(NodeId, UaValue)> {
        self.state.lock().writes.clone()
    }

    /// Live subscription ids, ascending.
    pub fn subscription_ids(&self) -> Vec<u32> {
        let mut ids: Vec<_> = self.state.lock().subscriptions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Number of monitored items across all subscriptions.
    pub fn monitored_item_count(&self) -> usize {
        self.state.lock().subscriptions.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl SessionClient for InMemorySession {
    async fn connect(&self, events: EventSender) -> BridgeResult<()> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(ConnectionError::refused(&self.endpoint, "simulated connection failure").into());
        }
        state.connected = true;
        state.events = Some(events);
        Ok(())
    }

    async fn disconnect(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.connected = false;
        state.subscriptions.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn translate_browse_paths(
        &self,
        paths: &[BrowsePath],
    ) -> BridgeResult<Vec<BrowsePathResult>> {
        let state = self.state.lock();
        state.ensure_connected()?;
        Ok(paths
            .iter()
            .map(|path| {
                let names: Vec<QualifiedName> = path.names().cloned().collect();
                match state.browse_index.get(&names) {
                    Some(node) => BrowsePathResult::found(node.clone()),
                    None => BrowsePathResult::not_found(StatusCode::BAD_NO_MATCH),
                }
            })
            .collect())
    }

    async fn read_values(&self, nodes: &[NodeId]) -> BridgeResult<Vec<DataValue>> {
        let state = self.state.lock();
        state.ensure_connected()?;
        Ok(nodes
            .iter()
            .map(|node| {
                state
                    .nodes
                    .get(node)
                    .cloned()
                    .unwrap_or_else(|| DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN))
            })
            .collect())
    }

    async fn write_value(&self, node: &NodeId, value: UaValue) -> BridgeResult<StatusCode> {
        let mut state = self.state.lock();
        state.ensure_connected()?;
        if let Some(status) = state.write_status {
            return Ok(status);
        }
        let Some(current) = state.nodes.get(node) else {
            return Ok(StatusCode::BAD_NODE_ID_UNKNOWN);
        };
        if let Some(existing) = &current.value {
            if mem::discriminant(existing) != mem::discriminant(&value) {
                return Ok(StatusCode::BAD_TYPE_MISMATCH);
            }
        }
        state.writes.push((node.clone(), value.clone()));
        state.nodes.insert(node.clone(), DataValue::good(value));
        state.publish(node);
        Ok(StatusCode::GOOD)
    }

    async fn create_subscription(&self, publishing_interval: Duration) -> BridgeResult<u32> {
        let delay = self.state.lock().subscription_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        state.ensure_connected()?;
        if state.failing_subscriptions > 0 {
            state.failing_subscriptions -= 1;
            return Err(SubscriptionError::create_failed("simulated subscription failure").into());
        }
        let id = state.next_subscription_id;
        state.next_subscription_id += 1;
        state.subscriptions.insert(id, Vec::new());
        debug!(subscription_id = id, ?publishing_interval, "Simulated subscription created");
        Ok(id)
    }

    async fn delete_subscription(&self, subscription_id: u32) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.ensure_connected()?;
        state
            .subscriptions
            .remove(&subscription_id)
            .map(|_| ())
            .ok_or_else(|| SubscriptionError::NotFound { subscription_id }.into())
    }

    async fn create_monitored_items(
        &self,
        subscription_id: u32,
        items: &[MonitoredItemRequest],
    ) -> BridgeResult<Vec<MonitoredItemResult>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.ensure_connected()?;
        if state.failing_monitored > 0 {
            state.failing_monitored -= 1;
            return Err(SubscriptionError::MonitoredItemsFailed {
                subscription_id,
                message: "simulated service failure".to_string(),
            }
            .into());
        }
        let Some(monitored) = state.subscriptions.get_mut(&subscription_id) else {
            return Err(SubscriptionError::NotFound { subscription_id }.into());
        };

        let mut results = Vec::with_capacity(items.len());
        let mut initial = Vec::new();
        for request in items {
            match state.nodes.get(&request.node_id) {
                Some(value) => {
                    let monitored_item_id = state.next_monitored_id;
                    state.next_monitored_id += 1;
                    monitored.push(Monitored {
                        node_id: request.node_id.clone(),
                        client_handle: request.client_handle,
                    });
                    initial.push(DataChange {
                        client_handle: request.client_handle,
                        value: value.clone(),
                    });
                    results.push(MonitoredItemResult {
                        status: StatusCode::GOOD,
                        monitored_item_id,
                    });
                }
                None => results.push(MonitoredItemResult {
                    status: StatusCode::BAD_NODE_ID_UNKNOWN,
                    monitored_item_id: 0,
                }),
            }
        }

        if self.initial_values && !initial.is_empty() {
            state.send(SessionEvent::DataChange {
                subscription_id,
                changes: initial,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn connected() -> (InMemorySession, mpsc::UnboundedReceiver<SessionEvent>) {
        let session = InMemorySession::new("opc.tcp://sim:4840");
        let (tx, rx) = mpsc::unbounded_channel();
        session.connect(tx).await.unwrap();
        (session, rx)
    }

    fn request(node: NodeId, handle: u32) -> MonitoredItemRequest {
        MonitoredItemRequest {
            node_id: node,
            client_handle: handle,
            sampling_interval_ms: 100.0,
            queue_size: 1,
            discard_oldest: true,
        }
    }

    #[tokio::test]
    async fn test_connect_failures_are_counted() {
        let session = InMemorySession::new("opc.tcp://sim:4840");
        session.fail_next_connects(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(session.connect(tx.clone()).await.is_err());
        assert!(session.connect(tx.clone()).await.is_err());
        assert!(session.connect(tx).await.is_ok());
        assert_eq!(session.connect_attempts(), 3);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_write_is_echoed_to_monitors() {
        let (session, mut rx) = connected().await;
        let node = NodeId::numeric(2, 5);
        session.add_node(node.clone(), UaValue::Int32(1));

        let sub = session.create_subscription(Duration::from_millis(100)).await.unwrap();
        let results = session
            .create_monitored_items(sub, &[request(node.clone(), 7)])
            .await
            .unwrap();
        assert!(results[0].status.is_good());
        // Initial value.
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::DataChange { .. }));

        let status = session.write_value(&node, UaValue::Int32(9)).await.unwrap();
        assert!(status.is_good());
        match rx.try_recv().unwrap() {
            SessionEvent::DataChange { subscription_id, changes } => {
                assert_eq!(subscription_id, sub);
                assert_eq!(changes[0].client_handle, 7);
                assert_eq!(changes[0].value.value, Some(UaValue::Int32(9)));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_type_mismatch_and_unknown_node() {
        let (session, _rx) = connected().await;
        let node = NodeId::numeric(2, 5);
        session.add_node(node.clone(), UaValue::Double(1.0));
        assert_eq!(
            session.write_value(&node, UaValue::Int32(1)).await.unwrap(),
            StatusCode::BAD_TYPE_MISMATCH
        );
        assert_eq!(
            session
                .write_value(&NodeId::numeric(2, 6), UaValue::Int32(1))
                .await
                .unwrap(),
            StatusCode::BAD_NODE_ID_UNKNOWN
        );
        assert!(session.writes().is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_error_drops_subscriptions() {
        let (session, mut rx) = connected().await;
        session.create_subscription(Duration::from_millis(100)).await.unwrap();
        assert_eq!(session.subscription_count(), 1);

        session.notify_status(SessionStatus::ReconnectError);
        assert_eq!(session.subscription_count(), 0);
        assert!(!session.is_connected());
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::StatusChanged(SessionStatus::ReconnectError)
        );
    }

    #[tokio::test]
    async fn test_browse_translation() {
        let (session, _rx) = connected().await;
        session
            .add_browse_node("2:Plant.3:Valve", NodeId::numeric(3, 1), UaValue::Boolean(true))
            .unwrap();
        let ItemPath::Browse(path) = ItemPath::parse("2:Plant.3:Valve").unwrap() else {
            panic!("expected browse path");
        };
        let results = session.translate_browse_paths(&[path]).await.unwrap();
        assert_eq!(results[0].target(), Some(&NodeId::numeric(3, 1)));
    }
}
