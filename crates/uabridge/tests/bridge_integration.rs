// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge integration tests.
//!
//! Every test drives the public [`Bridge`] API against an
//! [`InMemorySession`]. Time is paused, so retry intervals elapse instantly
//! once all tasks are idle.
//!
//! ```bash
//! cargo test -p uabridge --test bridge_integration
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use uabridge::session::SessionClient;
use uabridge::{
    Bridge, BridgeConfig, ChannelHooks, ConnectionState, DataChange, DataValue, Direction,
    HostRequest, InMemorySession, ItemIndex, ItemStatus, LocalScalar, LocalType, LocalValue,
    NodeId, NodeResolver, SessionStatus, StatusCode, UaValue,
};

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    bridge: Bridge,
    session: Arc<InMemorySession>,
    requests: UnboundedReceiver<HostRequest>,
}

impl Harness {
    fn new(session: InMemorySession) -> Self {
        let session = Arc::new(session);
        session.add_node(NodeId::numeric(2, 1), UaValue::Int32(1));
        session.add_node(NodeId::numeric(2, 2), UaValue::Double(0.0));
        session.add_node(
            NodeId::numeric(2, 3),
            UaValue::Array((0..10).map(UaValue::Int16).collect()),
        );
        session
            .add_browse_node("2:Plant.Tank.Level", NodeId::numeric(2, 10), UaValue::Float(1.5))
            .unwrap();

        let (hooks, requests) = ChannelHooks::with_channel();
        let config = BridgeConfig::builder("opc.tcp://sim:4840")
            .retry_interval(Duration::from_secs(5))
            .build()
            .unwrap();
        let bridge = Bridge::builder(config)
            .session(session.clone())
            .hooks(Arc::new(hooks))
            .build()
            .unwrap();
        Self {
            bridge,
            session,
            requests,
        }
    }

    fn quiet() -> Self {
        Self::new(InMemorySession::new("opc.tcp://sim:4840").without_initial_values())
    }

    async fn start(&self) {
        self.bridge.start().await.unwrap();
        assert_eq!(self.bridge.state(), ConnectionState::Connected);
    }

    async fn next_request(&mut self) -> HostRequest {
        timeout(Duration::from_secs(1), self.requests.recv())
            .await
            .expect("no host request")
            .expect("hook channel closed")
    }

    async fn expect_no_request(&mut self) {
        if let Ok(request) = timeout(Duration::from_millis(200), self.requests.recv()).await {
            panic!("unexpected host request {:?}", request);
        }
    }

    fn drain(&mut self) -> Vec<HostRequest> {
        let mut out = Vec::new();
        while let Ok(request) = self.requests.try_recv() {
            out.push(request);
        }
        out
    }

    async fn wait_for_state(&self, target: ConnectionState) {
        let mut states = self.bridge.subscribe_state();
        timeout(Duration::from_secs(60), states.wait_for(|s| *s == target))
            .await
            .expect("state not reached")
            .unwrap();
    }

    async fn eventually(&self, mut condition: impl FnMut(&Bridge) -> bool) {
        for _ in 0..1000 {
            if condition(&self.bridge) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("condition not reached");
    }
}

fn int16_array(values: impl IntoIterator<Item = i16>) -> UaValue {
    UaValue::Array(values.into_iter().map(UaValue::Int16).collect())
}

// =============================================================================
// Round-trip write suppression
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_own_write_echo_is_suppressed() {
    let mut h = Harness::quiet();
    let index = h
        .bridge
        .register_item("2,2", Direction::Output, LocalType::Float64, None)
        .unwrap();
    h.start().await;

    h.bridge.write(index, LocalScalar::Float64(3.5)).await.unwrap();
    assert_eq!(h.session.writes(), vec![(NodeId::numeric(2, 2), UaValue::Double(3.5))]);
    h.expect_no_request().await;
    assert_eq!(h.bridge.stats().echoes_suppressed, 1);

    // A distinct external change is reported.
    h.session.notify_change(&NodeId::numeric(2, 2), UaValue::Double(4.0));
    assert_eq!(h.next_request().await, HostRequest::Reprocess(index));
    assert_eq!(
        h.bridge.read(index).unwrap().value,
        LocalValue::Scalar(LocalScalar::Float64(4.0))
    );

    // The host answering the reprocess request does not write back.
    h.bridge.write(index, LocalScalar::Float64(4.0)).await.unwrap();
    assert_eq!(h.session.writes().len(), 1);

    // The next external change is reported again.
    h.session.notify_change(&NodeId::numeric(2, 2), UaValue::Double(5.0));
    assert_eq!(h.next_request().await, HostRequest::Reprocess(index));
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_reports_error_and_keeps_echo_state_clear() {
    let mut h = Harness::quiet();
    let index = h
        .bridge
        .register_item("2,2", Direction::Output, LocalType::Float64, None)
        .unwrap();
    h.start().await;

    h.session.reject_writes(Some(StatusCode::BAD));
    assert!(h.bridge.write(index, LocalScalar::Float64(1.0)).await.is_err());
    assert_eq!(h.bridge.read(index).unwrap().status, ItemStatus::Bad);

    // Nothing is pending, so an external change is not mistaken for an echo.
    h.session.notify_change(&NodeId::numeric(2, 2), UaValue::Double(2.0));
    assert_eq!(h.next_request().await, HostRequest::Reprocess(index));
    assert_eq!(h.bridge.read(index).unwrap().status, ItemStatus::Good);
}

#[tokio::test(start_paused = true)]
async fn test_input_items_are_not_writable() {
    let h = Harness::quiet();
    let index = h
        .bridge
        .register_item("2,1", Direction::Input, LocalType::Int32, None)
        .unwrap();
    h.start().await;
    assert!(h.bridge.write(index, LocalScalar::Int32(2)).await.is_err());
    assert!(h.session.writes().is_empty());
}

// =============================================================================
// Index stability
// =============================================================================

#[tokio::test]
async fn test_indices_follow_registration_order() {
    let h = Harness::quiet();
    let paths = ["2,1", "2,2", "2:Plant.Tank.Level", "2,3", "2,1"];
    let indices: Vec<_> = paths
        .iter()
        .map(|p| {
            h.bridge
                .register_item(p, Direction::Input, LocalType::Float64, None)
                .unwrap()
        })
        .collect();
    assert_eq!(indices, (0..5).map(ItemIndex::new).collect::<Vec<_>>());

    let first = h.bridge.item(ItemIndex::new(2)).unwrap();
    h.bridge
        .register_item("2,2", Direction::Output, LocalType::Int32, None)
        .unwrap();
    let again = h.bridge.item(ItemIndex::new(2)).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(again.path(), "2:Plant.Tank.Level");
}

// =============================================================================
// Resolution partial-failure isolation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_partial_resolution() {
    let h = Harness::quiet();
    for path in ["2:Plant.Tank.Level", "0:Plant.Tank.Level", "2,1"] {
        h.bridge
            .register_item(path, Direction::Input, LocalType::Float64, None)
            .unwrap();
    }

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    h.session.connect(tx).await.unwrap();
    let items = h.bridge.context().registry().snapshot();
    let resolution = NodeResolver::new(h.bridge.context().clone())
        .resolve_all(&items)
        .await
        .unwrap();

    assert!(resolution.is_partial());
    assert_eq!(resolution.handle(ItemIndex::new(0)), Some(&NodeId::numeric(2, 10)));
    assert_eq!(resolution.handle(ItemIndex::new(1)), None);
    assert_eq!(resolution.handle(ItemIndex::new(2)), Some(&NodeId::numeric(2, 1)));
    assert_eq!(resolution.failed_indices(), vec![ItemIndex::new(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_unresolved_item_does_not_block_the_rest() {
    let h = Harness::new(InMemorySession::new("opc.tcp://sim:4840"));
    let good = h
        .bridge
        .register_item("2:Plant.Tank.Level", Direction::Input, LocalType::Float64, None)
        .unwrap();
    let missing = h
        .bridge
        .register_item("2:Plant.Tank.Volume", Direction::Input, LocalType::Float64, None)
        .unwrap();
    h.start().await;

    h.eventually(|b| b.read(good).unwrap().status == ItemStatus::Good)
        .await;
    assert_eq!(
        h.bridge.read(good).unwrap().value,
        LocalValue::Scalar(LocalScalar::Float64(1.5))
    );
    assert_eq!(h.bridge.read(missing).unwrap().status, ItemStatus::Bad);

    let report = h.bridge.report(1);
    assert_eq!(report.connected, 1);
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].index, missing);
}

// =============================================================================
// Array bounds
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_oversized_array_is_rejected_without_partial_write() {
    let h = Harness::quiet();
    let index = h
        .bridge
        .register_item("2,3", Direction::Input, LocalType::Int16, Some(10))
        .unwrap();
    h.start().await;

    h.session.notify_change(&NodeId::numeric(2, 3), int16_array(0..10));
    h.eventually(|b| b.read(index).unwrap().status == ItemStatus::Good)
        .await;
    let before = h.bridge.read(index).unwrap().value;
    assert_eq!(before.elements().len(), 10);

    h.session.notify_change(&NodeId::numeric(2, 3), int16_array(100..112));
    h.eventually(|b| b.read(index).unwrap().status == ItemStatus::Bad)
        .await;
    assert_eq!(h.bridge.read(index).unwrap().value, before);

    // A shorter array recovers the item.
    h.session.notify_change(&NodeId::numeric(2, 3), int16_array([7, 8]));
    h.eventually(|b| b.read(index).unwrap().status == ItemStatus::Good)
        .await;
    assert_eq!(
        h.bridge.read(index).unwrap().value,
        LocalValue::Array(vec![LocalScalar::Int16(7), LocalScalar::Int16(8)])
    );
}

// =============================================================================
// Bulk bad-quality propagation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_connection_loss_marks_every_item_bad() {
    let mut h = Harness::quiet();
    let notified = h
        .bridge
        .register_item("2,1", Direction::Input, LocalType::Int32, None)
        .unwrap();
    let silent = h
        .bridge
        .register_item("2:Plant.Tank.Level", Direction::Input, LocalType::Float32, None)
        .unwrap();
    let output = h
        .bridge
        .register_item("2,2", Direction::Output, LocalType::Float64, None)
        .unwrap();
    h.start().await;

    h.session.notify_change(&NodeId::numeric(2, 1), UaValue::Int32(42));
    h.eventually(|b| b.read(notified).unwrap().status == ItemStatus::Good)
        .await;
    h.drain();

    h.session.notify_status(SessionStatus::ReconnectError);
    h.wait_for_state(ConnectionState::Disconnected).await;

    for index in [notified, silent, output] {
        let reading = h.bridge.read(index).unwrap();
        assert_eq!(reading.status, ItemStatus::Bad, "item {}", index);
        assert!(reading.timestamp.is_some());
    }
    // The last good value is kept with bad status.
    assert_eq!(
        h.bridge.read(notified).unwrap().value,
        LocalValue::Scalar(LocalScalar::Int32(42))
    );

    let requests = h.drain();
    assert_eq!(requests.len(), 3);
    assert!(requests.contains(&HostRequest::Rescan(notified)));
    assert!(requests.contains(&HostRequest::Rescan(silent)));
    assert!(requests.contains(&HostRequest::Reprocess(output)));

    // The host flushing the output item does not reach the server.
    h.bridge.write(output, LocalScalar::Float64(9.0)).await.unwrap();
    assert!(h.session.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_degrades_and_recovers() {
    let mut h = Harness::quiet();
    let index = h
        .bridge
        .register_item("2,1", Direction::Input, LocalType::Int32, None)
        .unwrap();
    h.start().await;

    h.session.notify_status(SessionStatus::WatchdogTimeout);
    h.wait_for_state(ConnectionState::Degraded).await;
    assert_eq!(h.bridge.read(index).unwrap().status, ItemStatus::Bad);
    assert_eq!(h.drain(), vec![HostRequest::Rescan(index)]);

    h.session.notify_status(SessionStatus::Connected);
    h.wait_for_state(ConnectionState::Connected).await;
    h.session.notify_change(&NodeId::numeric(2, 1), UaValue::Int32(3));
    h.eventually(|b| b.read(index).unwrap().status == ItemStatus::Good)
        .await;
}

// =============================================================================
// Idempotent reconnect sequencing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnects_replace_the_handle_set() {
    let h = Harness::quiet();
    for path in ["2,1", "2,2", "2:Plant.Tank.Level", "2:Plant.Missing"] {
        h.bridge
            .register_item(path, Direction::Input, LocalType::Float64, None)
            .unwrap();
    }
    h.start().await;
    let after_first = h.session.monitored_item_count();
    assert_eq!(after_first, 3);

    for _ in 0..2 {
        h.session.notify_status(SessionStatus::ReconnectError);
        h.wait_for_state(ConnectionState::Disconnected).await;
        h.wait_for_state(ConnectionState::Connected).await;
    }

    assert_eq!(h.session.monitored_item_count(), after_first);
    assert_eq!(h.session.subscription_count(), 1);
    assert_eq!(h.bridge.report(0).connected, 3);
    assert_eq!(h.bridge.stats().bulk_bad, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_subscription_notifications_are_dropped() {
    let h = Harness::quiet();
    let index = h
        .bridge
        .register_item("2,1", Direction::Input, LocalType::Int32, None)
        .unwrap();
    h.start().await;
    let first = h.bridge.subscription_id().unwrap();

    h.session.notify_status(SessionStatus::ReconnectError);
    h.wait_for_state(ConnectionState::Disconnected).await;
    h.wait_for_state(ConnectionState::Connected).await;
    assert_ne!(h.bridge.subscription_id(), Some(first));

    h.session.send_data_change(
        first,
        vec![DataChange {
            client_handle: index.client_handle(),
            value: DataValue::good(UaValue::Int32(99)),
        }],
    );
    h.eventually(|b| b.stats().notifications_dropped == 1).await;
    assert_ne!(
        h.bridge.read(index).unwrap().value,
        LocalValue::Scalar(LocalScalar::Int32(99))
    );
}

// =============================================================================
// Startup and shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_unreachable_server_is_retried() {
    let h = Harness::quiet();
    h.bridge
        .register_item("2,1", Direction::Input, LocalType::Int32, None)
        .unwrap();
    h.session.fail_next_connects(2);

    h.bridge.start().await.unwrap();
    assert_eq!(h.bridge.state(), ConnectionState::Disconnected);
    h.wait_for_state(ConnectionState::Connected).await;
    assert_eq!(h.session.connect_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_initial_values_prompt_output_reprocess() {
    let mut h = Harness::new(InMemorySession::new("opc.tcp://sim:4840"));
    let output = h
        .bridge
        .register_item("2,2", Direction::Output, LocalType::Float64, None)
        .unwrap();
    h.start().await;

    // The first value of an output item comes from outside.
    assert_eq!(h.next_request().await, HostRequest::Reprocess(output));
    h.bridge.write(output, LocalScalar::Float64(0.0)).await.unwrap();
    assert!(h.session.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_unsubscribes_and_disconnects() {
    let h = Harness::quiet();
    h.bridge
        .register_item("2,1", Direction::Input, LocalType::Int32, None)
        .unwrap();
    h.start().await;
    assert_eq!(h.session.subscription_count(), 1);

    h.bridge.shutdown().await;
    assert_eq!(h.bridge.state(), ConnectionState::ShuttingDown);
    assert_eq!(h.session.subscription_count(), 0);
    assert!(!h.session.is_connected());
}
