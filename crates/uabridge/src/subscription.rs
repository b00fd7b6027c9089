// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The shared subscription: wiring, notification dispatch and writes.
//!
//! # Wiring
//!
//! One subscription carries every resolved item. The current subscription id
//! and the item → node map live together in a [`Wiring`] that is replaced
//! wholesale on every reconnect, never patched in place:
//!
//! ```text
//!   teardown old ─▶ create subscription ─▶ initial type read
//!        ─▶ publish wiring ─▶ create monitored items ─▶ record count
//! ```
//!
//! The monitored item client handle is the item index, so a notification
//! maps to its item without a lookup table.
//!
//! # Dispatch
//!
//! Notifications for any subscription other than the current one are stale
//! and dropped. Each change is decoded outside the item lock, committed under
//! it together with the echo bookkeeping, and host hooks are called after the
//! lock is released. A failing item is marked bad and the batch continues.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::coercion::Decoded;
use crate::context::SharedContext;
use crate::echo::{EchoDecision, WriteDecision};
use crate::error::{
    BridgeError, BridgeResult, CoercionError, ItemError, ResolutionError, SubscriptionError,
};
use crate::item::{Item, ItemIndex, LocalValue, RemoteType, ScanMode, TimestampSource};
use crate::resolver::Resolution;
use crate::session::{DataChange, MonitoredItemRequest};
use crate::types::{DataValue, NodeId, StatusCode, UaValue};

// =============================================================================
// Wiring
// =============================================================================

/// The current subscription and the nodes it monitors.
#[derive(Debug, Clone, PartialEq)]
pub struct Wiring {
    /// Server subscription id.
    pub subscription_id: u32,
    /// Resolved node per item.
    pub handles: BTreeMap<ItemIndex, NodeId>,
    /// Monitored items the server accepted.
    pub monitored: usize,
}

/// What a change notification turned into for one item.
enum Outcome {
    Value(Decoded),
    BadStatus(StatusCode),
    Failed(CoercionError),
}

// =============================================================================
// SubscriptionEngine
// =============================================================================

/// Owns the shared subscription and routes traffic between items and session.
#[derive(Debug)]
pub struct SubscriptionEngine {
    context: SharedContext,
    wiring: RwLock<Option<Arc<Wiring>>>,
}

impl SubscriptionEngine {
    /// Creates an engine with no subscription.
    pub fn new(context: SharedContext) -> Self {
        Self {
            context,
            wiring: RwLock::new(None),
        }
    }

    /// Current wiring, if any.
    pub fn wiring(&self) -> Option<Arc<Wiring>> {
        self.wiring.read().clone()
    }

    /// Current subscription id.
    pub fn current_subscription(&self) -> Option<u32> {
        self.wiring.read().as_ref().map(|w| w.subscription_id)
    }

    /// Node an item is wired to.
    pub fn handle_for(&self, index: ItemIndex) -> Option<NodeId> {
        self.wiring
            .read()
            .as_ref()
            .and_then(|w| w.handles.get(&index).cloned())
    }

    /// Number of monitored items in the current wiring.
    pub fn monitored_count(&self) -> usize {
        self.wiring.read().as_ref().map_or(0, |w| w.monitored)
    }

    // =========================================================================
    // Wiring
    // =========================================================================

    /// Creates the shared subscription. No retry here.
    pub async fn create_subscription(&self) -> BridgeResult<u32> {
        let interval = self.context.config().publishing_interval;
        let subscription_id = self
            .context
            .session()
            .create_subscription(interval)
            .await
            .map_err(|e| match e {
                BridgeError::Connection(_) => e,
                other => SubscriptionError::create_failed(other.to_string()).into(),
            })?;
        info!(
            subscription_id,
            publishing_interval = ?interval,
            "Subscription created"
        );
        Ok(subscription_id)
    }

    /// Registers one monitored item per resolved item.
    ///
    /// Items without a handle are skipped with a warning. Items the server
    /// rejects are marked bad. Returns the number of accepted items.
    pub async fn register_monitored_items(
        &self,
        subscription_id: u32,
        handles: &BTreeMap<ItemIndex, NodeId>,
        items: &[Arc<Item>],
    ) -> BridgeResult<usize> {
        let publishing_ms = self.context.config().publishing_interval.as_secs_f64() * 1000.0;
        let mut requested: Vec<&Arc<Item>> = Vec::with_capacity(handles.len());
        let mut requests = Vec::with_capacity(handles.len());

        for item in items {
            let Some(node) = handles.get(&item.index()) else {
                warn!(
                    index = %item.index(),
                    item = %item.name(),
                    path = %item.path(),
                    "Item unresolved, not monitored"
                );
                continue;
            };
            let settings = item.settings();
            let sampling_interval_ms = if settings.sampling_interval_ms < 0.0 {
                publishing_ms
            } else {
                settings.sampling_interval_ms
            };
            requests.push(MonitoredItemRequest {
                node_id: node.clone(),
                client_handle: item.index().client_handle(),
                sampling_interval_ms,
                queue_size: settings.queue_size,
                discard_oldest: settings.discard_oldest,
            });
            requested.push(item);
        }

        if requests.is_empty() {
            return Ok(0);
        }

        let results = self
            .context
            .session()
            .create_monitored_items(subscription_id, &requests)
            .await?;
        if results.len() != requests.len() {
            return Err(SubscriptionError::MonitoredItemsFailed {
                subscription_id,
                message: format!(
                    "{} results for {} requests",
                    results.len(),
                    requests.len()
                ),
            }
            .into());
        }

        let mut accepted = 0;
        for (item, result) in requested.into_iter().zip(results) {
            if result.status.is_bad() {
                warn!(
                    index = %item.index(),
                    item = %item.name(),
                    status = %result.status,
                    "Monitored item rejected"
                );
                let reason = format!("monitored item rejected: {}", result.status);
                item.with_state(|state| state.set_bad(reason));
            } else {
                accepted += 1;
            }
        }
        debug!(subscription_id, accepted, "Monitored items created");
        Ok(accepted)
    }

    /// Reads every resolved item once and records its wire type.
    pub async fn read_initial_types(
        &self,
        handles: &BTreeMap<ItemIndex, NodeId>,
        items: &[Arc<Item>],
    ) -> BridgeResult<()> {
        let targets: Vec<(&Arc<Item>, NodeId)> = items
            .iter()
            .filter_map(|item| handles.get(&item.index()).map(|n| (item, n.clone())))
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        let nodes: Vec<NodeId> = targets.iter().map(|(_, n)| n.clone()).collect();
        let values = self.context.session().read_values(&nodes).await?;

        for ((item, _), value) in targets.into_iter().zip(values) {
            if value.status.is_bad() {
                continue;
            }
            let Some(remote_type) = value.value.as_ref().and_then(|v| Self::remote_type_of(item, v))
            else {
                continue;
            };
            trace!(index = %item.index(), remote_type = %remote_type, "Initial type read");
            item.with_state(|state| state.remote_type = Some(remote_type));
        }
        Ok(())
    }

    fn remote_type_of(item: &Item, value: &UaValue) -> Option<RemoteType> {
        let value = match item.settings().element.as_deref() {
            Some(element) => value.field(element)?,
            None => value,
        };
        match value {
            UaValue::Array(elements) if item.is_array() => {
                elements.first().and_then(UaValue::wire_type).map(RemoteType::array)
            }
            UaValue::Array(_) => {
                warn!(
                    index = %item.index(),
                    item = %item.name(),
                    "Remote value is an array but the item is scalar"
                );
                None
            }
            scalar => scalar.wire_type().map(RemoteType::scalar),
        }
    }

    /// Replaces the current wiring with a fresh subscription.
    ///
    /// On failure the new subscription is deleted again and no wiring is
    /// left behind.
    pub async fn install(&self, resolution: &Resolution, items: &[Arc<Item>]) -> BridgeResult<u32> {
        if let Err(e) = self.teardown().await {
            debug!(error = %e, "Previous subscription not deleted");
        }

        let subscription_id = self.create_subscription().await?;

        if self.context.config().read_initial_types {
            if let Err(e) = self.read_initial_types(&resolution.handles, items).await {
                e.log("Initial type read failed");
            }
        }

        // Published before monitored items exist so their first
        // notifications are not taken for stale ones.
        *self.wiring.write() = Some(Arc::new(Wiring {
            subscription_id,
            handles: resolution.handles.clone(),
            monitored: 0,
        }));

        match self
            .register_monitored_items(subscription_id, &resolution.handles, items)
            .await
        {
            Ok(monitored) => {
                *self.wiring.write() = Some(Arc::new(Wiring {
                    subscription_id,
                    handles: resolution.handles.clone(),
                    monitored,
                }));
                self.context.stats().record_wiring();
                info!(subscription_id, monitored, "Subscription wired");
                Ok(subscription_id)
            }
            Err(e) => {
                *self.wiring.write() = None;
                if let Err(cleanup) = self
                    .context
                    .session()
                    .delete_subscription(subscription_id)
                    .await
                {
                    debug!(subscription_id, error = %cleanup, "Cleanup of failed subscription failed");
                }
                Err(e)
            }
        }
    }

    /// Drops the current wiring and deletes its subscription on the server.
    pub async fn teardown(&self) -> BridgeResult<()> {
        let Some(wiring) = self.wiring.write().take() else {
            return Ok(());
        };
        info!(subscription_id = wiring.subscription_id, "Deleting subscription");
        self.context
            .session()
            .delete_subscription(wiring.subscription_id)
            .await
    }

    /// Drops the current wiring without contacting the server.
    pub fn discard(&self) {
        if let Some(wiring) = self.wiring.write().take() {
            debug!(subscription_id = wiring.subscription_id, "Subscription discarded");
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Routes one notification batch to its items, in arrival order.
    pub fn dispatch(&self, subscription_id: u32, changes: Vec<DataChange>) {
        if self.current_subscription() != Some(subscription_id) {
            debug!(
                subscription_id,
                count = changes.len(),
                "Notifications for stale subscription dropped"
            );
            for _ in &changes {
                self.context.stats().record_dropped();
            }
            return;
        }
        for change in changes {
            self.dispatch_one(change);
        }
    }

    fn dispatch_one(&self, change: DataChange) {
        let ctx = &self.context;
        let index = ItemIndex::from_client_handle(change.client_handle);
        let Some(item) = ctx.registry().try_get(index) else {
            warn!(client_handle = change.client_handle, "Notification for unknown item dropped");
            ctx.stats().record_dropped();
            return;
        };
        ctx.stats().record_notification();

        let value = change.value;
        let outcome = if value.status.is_bad() {
            Outcome::BadStatus(value.status)
        } else {
            match &value.value {
                Some(v) => match ctx.coercion().decode_for(&item, v) {
                    Ok(decoded) => Outcome::Value(decoded),
                    Err(e) => Outcome::Failed(e),
                },
                None => Outcome::Failed(CoercionError::UnsupportedWireValue { type_name: "Null" }),
            }
        };
        let timestamp = Self::pick_timestamp(item.settings().timestamp_source, &value);
        let is_output = item.direction().is_output();

        let (echo, failure) = item.with_state(|state| {
            let failure = match outcome {
                Outcome::Value(decoded) => match state.storage.commit(&decoded.value) {
                    Ok(()) => {
                        if let Some(remote_type) = decoded.remote_type {
                            state.remote_type = Some(remote_type);
                        }
                        state.set_good();
                        None
                    }
                    Err(e) => Some(BridgeError::from(e)),
                },
                Outcome::BadStatus(status) => {
                    state.set_bad(format!("bad status {}", status));
                    None
                }
                Outcome::Failed(e) => Some(BridgeError::from(e)),
            };
            if let Some(e) = &failure {
                state.set_bad(e.to_string());
            }
            state.timestamp = Some(timestamp);
            let echo = is_output.then(|| state.echo.on_notification());
            (echo, failure)
        });

        if let Some(e) = failure {
            ctx.stats().record_coercion_error();
            warn!(
                index = %index,
                item = %item.name(),
                error_code = %e.error_code(),
                error = %e,
                "Notification rejected"
            );
        } else {
            trace!(index = %index, item = %item.name(), status = %value.status, "Notification applied");
        }

        match echo {
            Some(EchoDecision::Reprocess) => {
                ctx.stats().record_reprocess();
                ctx.hooks().request_reprocess(index);
            }
            Some(EchoDecision::Suppressed) => {
                ctx.stats().record_echo_suppressed();
                trace!(index = %index, "Echo suppressed");
            }
            None if item.settings().scan == ScanMode::Event => {
                ctx.stats().record_rescan();
                ctx.hooks().request_rescan(index);
            }
            None => {}
        }
    }

    fn pick_timestamp(source: TimestampSource, value: &DataValue) -> DateTime<Utc> {
        let (preferred, fallback) = match source {
            TimestampSource::Server => (value.server_timestamp, value.source_timestamp),
            TimestampSource::Source => (value.source_timestamp, value.server_timestamp),
        };
        preferred.or(fallback).unwrap_or_else(Utc::now)
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Writes a host value to the item's node.
    ///
    /// A write arriving while the item is suppressing is the host consuming a
    /// reprocess request and completes without contacting the server. On
    /// success the storage is updated right away; on failure the echo state
    /// is rolled back and the item is marked bad.
    pub async fn write(&self, index: ItemIndex, value: LocalValue) -> BridgeResult<()> {
        let item = self.context.registry().get(index)?;
        if !item.direction().is_output() {
            return Err(ItemError::NotWritable { index }.into());
        }
        item.check_value(&value)?;

        let (decision, remote_type) =
            item.with_state(|state| (state.echo.begin_write(), state.remote_type));
        if decision == WriteDecision::AcknowledgeReprocess {
            debug!(index = %index, item = %item.name(), "Reprocess acknowledged, nothing written");
            return Ok(());
        }

        match self.submit(&item, &value, remote_type).await {
            Ok(()) => {
                item.with_state(|state| match state.storage.commit(&value) {
                    Ok(()) => {
                        state.set_good();
                        state.timestamp = Some(Utc::now());
                    }
                    Err(e) => state.set_bad(e.to_string()),
                });
                self.context.stats().record_write(true);
                debug!(index = %index, item = %item.name(), %value, "Value written");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                item.with_state(|state| {
                    state.echo.abort_write();
                    state.set_bad(reason);
                });
                self.context.stats().record_write(false);
                e.log(&format!("Write to item {} failed", index));
                Err(e)
            }
        }
    }

    async fn submit(
        &self,
        item: &Item,
        value: &LocalValue,
        remote_type: Option<RemoteType>,
    ) -> BridgeResult<()> {
        let index = item.index();
        let node = self
            .handle_for(index)
            .ok_or(ResolutionError::Unresolved { index })?;
        let wire = self.context.coercion().encode_for(item, value, remote_type)?;
        let status = self.context.session().write_value(&node, wire).await?;
        if status.is_bad() {
            return Err(ItemError::WriteRejected { index, status }.into());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeConfig, ItemOptions};
    use crate::context::BridgeContext;
    use crate::hooks::{ChannelHooks, HostRequest};
    use crate::item::{Direction, ItemDefinition, ItemStatus, LocalScalar, LocalType};
    use crate::resolver::NodeResolver;
    use crate::session::{InMemorySession, SessionClient};
    use crate::types::WireType;
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    struct Fixture {
        ctx: SharedContext,
        session: Arc<InMemorySession>,
        engine: SubscriptionEngine,
        requests: mpsc::UnboundedReceiver<HostRequest>,
    }

    async fn fixture(definitions: Vec<ItemDefinition>) -> Fixture {
        let session = Arc::new(InMemorySession::new("opc.tcp://sim:4840").without_initial_values());
        session.add_node(NodeId::numeric(2, 1), UaValue::Double(0.0));
        session.add_node(NodeId::numeric(2, 2), UaValue::Int32(0));
        session.add_node(
            NodeId::numeric(2, 3),
            UaValue::Array(vec![UaValue::Int16(0); 2]),
        );

        let (hooks, requests) = ChannelHooks::with_channel();
        let ctx = BridgeContext::new(
            BridgeConfig::new("opc.tcp://sim:4840"),
            session.clone(),
            Arc::new(hooks),
        )
        .unwrap();
        for definition in definitions {
            ctx.registry().register(definition).unwrap();
        }
        let ctx = Arc::new(ctx);

        let (tx, _rx) = mpsc::unbounded_channel();
        session.connect(tx).await.unwrap();

        let engine = SubscriptionEngine::new(ctx.clone());
        let items = ctx.registry().snapshot();
        let resolution = NodeResolver::new(ctx.clone()).resolve_all(&items).await.unwrap();
        engine.install(&resolution, &items).await.unwrap();

        Fixture {
            ctx,
            session,
            engine,
            requests,
        }
    }

    fn change(handle: u32, value: UaValue) -> DataChange {
        DataChange {
            client_handle: handle,
            value: DataValue::good(value),
        }
    }

    fn current(f: &Fixture) -> u32 {
        f.engine.current_subscription().unwrap()
    }

    #[tokio::test]
    async fn test_install_records_initial_types() {
        let f = fixture(vec![
            ItemDefinition::new("2,1", Direction::Input, LocalType::Float64),
            ItemDefinition::new("2,3", Direction::Input, LocalType::Int16).array(4),
            ItemDefinition::new("2,99", Direction::Input, LocalType::Int32),
        ])
        .await;

        assert_eq!(f.engine.monitored_count(), 2);
        assert_eq!(f.session.monitored_item_count(), 2);
        let items = f.ctx.registry().snapshot();
        assert_eq!(items[0].remote_type(), Some(RemoteType::scalar(WireType::Double)));
        assert_eq!(items[1].remote_type(), Some(RemoteType::array(WireType::Int16)));
        assert_eq!(items[2].remote_type(), None);
        assert!(f.engine.handle_for(ItemIndex::new(2)).is_none());
    }

    #[tokio::test]
    async fn test_reinstall_replaces_wiring() {
        let f = fixture(vec![ItemDefinition::new("2,1", Direction::Input, LocalType::Float64)]).await;
        let first = current(&f);
        let items = f.ctx.registry().snapshot();
        let resolution = NodeResolver::new(f.ctx.clone()).resolve_all(&items).await.unwrap();
        let second = f.engine.install(&resolution, &items).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(f.session.subscription_ids(), vec![second]);
        assert_eq!(f.session.monitored_item_count(), 1);
    }

    #[tokio::test]
    async fn test_event_input_requests_rescan() {
        let mut f = fixture(vec![
            ItemDefinition::new("2,1", Direction::Input, LocalType::Float64).scan(ScanMode::Event),
            ItemDefinition::new("2,2", Direction::Input, LocalType::Int32),
        ])
        .await;
        f.engine.dispatch(
            current(&f),
            vec![change(0, UaValue::Double(4.5)), change(1, UaValue::Int32(8))],
        );

        assert_eq!(f.requests.try_recv().unwrap(), HostRequest::Rescan(ItemIndex::new(0)));
        assert!(f.requests.try_recv().is_err());
        let reading = f.ctx.registry().get(ItemIndex::new(1)).unwrap().read();
        assert_eq!(reading.value, LocalValue::Scalar(LocalScalar::Int32(8)));
        assert_eq!(reading.status, ItemStatus::Good);
    }

    #[tokio::test]
    async fn test_stale_and_unknown_notifications_are_dropped() {
        let f = fixture(vec![ItemDefinition::new("2,1", Direction::Input, LocalType::Float64)]).await;
        f.engine.dispatch(current(&f) + 100, vec![change(0, UaValue::Double(1.0))]);
        f.engine.dispatch(current(&f), vec![change(42, UaValue::Double(1.0))]);

        let item = f.ctx.registry().get(ItemIndex::new(0)).unwrap();
        assert_eq!(item.read().value, LocalValue::Scalar(LocalScalar::Float64(0.0)));
        assert_eq!(f.ctx.stats().snapshot().notifications_dropped, 2);
    }

    #[tokio::test]
    async fn test_bad_item_does_not_abort_batch() {
        let f = fixture(vec![
            ItemDefinition::new("2,2", Direction::Input, LocalType::UInt8),
            ItemDefinition::new("2,1", Direction::Input, LocalType::Float64),
        ])
        .await;
        f.engine.dispatch(
            current(&f),
            vec![change(0, UaValue::Int32(1000)), change(1, UaValue::Double(2.5))],
        );

        let items = f.ctx.registry().snapshot();
        assert_eq!(items[0].status(), ItemStatus::Bad);
        assert_eq!(items[1].status(), ItemStatus::Good);
        assert_eq!(f.ctx.stats().snapshot().coercion_errors, 1);

        // A later good value recovers the item.
        f.engine.dispatch(current(&f), vec![change(0, UaValue::Int32(10))]);
        assert_eq!(items[0].status(), ItemStatus::Good);
    }

    #[tokio::test]
    async fn test_oversized_array_leaves_storage_unchanged() {
        let f = fixture(vec![ItemDefinition::new("2,3", Direction::Input, LocalType::Int16).array(2)]).await;
        f.engine.dispatch(
            current(&f),
            vec![change(0, UaValue::Array(vec![UaValue::Int16(1), UaValue::Int16(2)]))],
        );
        let item = f.ctx.registry().get(ItemIndex::new(0)).unwrap();
        let before = item.read().value;

        f.engine.dispatch(current(&f), vec![change(0, UaValue::Array(vec![UaValue::Int16(9); 3]))]);
        let after = item.read();
        assert_eq!(after.status, ItemStatus::Bad);
        assert_eq!(after.value, before);
    }

    #[tokio::test]
    async fn test_bad_status_still_toggles_echo() {
        let mut f = fixture(vec![ItemDefinition::new("2,2", Direction::Output, LocalType::Int32)]).await;
        f.engine.dispatch(
            current(&f),
            vec![DataChange {
                client_handle: 0,
                value: DataValue::bad(StatusCode::BAD_COMMUNICATION_ERROR),
            }],
        );
        let item = f.ctx.registry().get(ItemIndex::new(0)).unwrap();
        assert_eq!(item.status(), ItemStatus::Bad);
        assert!(item.with_state(|s| s.echo.is_suppressing()));
        assert_eq!(f.requests.try_recv().unwrap(), HostRequest::Reprocess(ItemIndex::new(0)));
    }

    #[tokio::test]
    async fn test_timestamp_source() {
        let options = ItemOptions {
            timestamp_source: Some(TimestampSource::Source),
            ..ItemOptions::default()
        };
        let f = fixture(vec![
            ItemDefinition::new("2,1", Direction::Input, LocalType::Float64).options(options),
        ])
        .await;
        let server = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
        let source = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        f.engine.dispatch(
            current(&f),
            vec![DataChange {
                client_handle: 0,
                value: DataValue::good(UaValue::Double(1.0)).with_timestamps(Some(server), Some(source)),
            }],
        );
        let item = f.ctx.registry().get(ItemIndex::new(0)).unwrap();
        assert_eq!(item.read().timestamp, Some(source));
    }

    #[tokio::test]
    async fn test_write_encodes_remote_type_and_updates_storage() {
        let f = fixture(vec![ItemDefinition::new("2,1", Direction::Output, LocalType::Int32)]).await;
        f.engine
            .write(ItemIndex::new(0), LocalScalar::Int32(12).into())
            .await
            .unwrap();

        assert_eq!(
            f.session.writes(),
            vec![(NodeId::numeric(2, 1), UaValue::Double(12.0))]
        );
        let item = f.ctx.registry().get(ItemIndex::new(0)).unwrap();
        assert_eq!(item.read().value, LocalValue::Scalar(LocalScalar::Int32(12)));
        assert_eq!(item.status(), ItemStatus::Good);
        assert!(item.with_state(|s| s.echo.is_suppressing()));
    }

    #[tokio::test]
    async fn test_rejected_write_rolls_back_echo() {
        let f = fixture(vec![ItemDefinition::new("2,2", Direction::Output, LocalType::Int32)]).await;
        f.session.reject_writes(Some(StatusCode::BAD));

        let err = f
            .engine
            .write(ItemIndex::new(0), LocalScalar::Int32(5).into())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Item(ItemError::WriteRejected { .. })));

        let item = f.ctx.registry().get(ItemIndex::new(0)).unwrap();
        assert_eq!(item.status(), ItemStatus::Bad);
        assert!(!item.with_state(|s| s.echo.is_suppressing()));
        assert_eq!(f.ctx.stats().snapshot().writes_failed, 1);
    }

    #[tokio::test]
    async fn test_write_to_input_is_refused() {
        let f = fixture(vec![ItemDefinition::new("2,1", Direction::Input, LocalType::Float64)]).await;
        let err = f
            .engine
            .write(ItemIndex::new(0), LocalScalar::Float64(1.0).into())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Item(ItemError::NotWritable { .. })));
    }
}
