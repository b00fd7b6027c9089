// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection supervision.
//!
//! The supervisor owns the session lifecycle. It connects, runs resolution
//! and subscription wiring, reacts to session status changes and keeps a
//! retry task alive while the server is unreachable.
//!
//! # State Machine
//!
//! ```text
//!                connect()
//!  Disconnected ───────────▶ Connecting ──ok──▶ Connected ◀─────┐
//!       ▲                        │                  │           │ Connected
//!       │◀──── failure ──────────┘                  │ watchdog  │
//!       │         (retry after retry_interval)      ▼           │
//!       │◀──── reconnect error / shutdown ────── Degraded ──────┘
//!
//!  any ──shutdown()──▶ ShuttingDown
//! ```
//!
//! A watchdog timeout, a reconnect error or a server shutdown marks every
//! item bad and asks the host to look at each one. After a reconnect error,
//! a new session, or a disconnect following a completed wiring, the next
//! `Connected` status re-runs resolution and subscription from scratch.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::context::SharedContext;
use crate::error::{BridgeResult, ConnectionError};
use crate::resolver::NodeResolver;
use crate::session::{EventReceiver, EventSender, SessionEvent, SessionStatus};
use crate::subscription::SubscriptionEngine;

// =============================================================================
// ConnectionState
// =============================================================================

/// Connection state of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,
    /// Connect in progress.
    Connecting,
    /// Session up and items wired.
    Connected,
    /// Session up but unhealthy; items are bad.
    Degraded,
    /// Shutting down; no further transitions.
    ShuttingDown,
}

impl ConnectionState {
    /// Returns `true` while connected and wired.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Degraded => write!(f, "Degraded"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
        }
    }
}

// =============================================================================
// ConnectionSupervisor
// =============================================================================

/// Drives connect, wiring, retry and failure propagation.
pub struct ConnectionSupervisor {
    context: SharedContext,
    engine: Arc<SubscriptionEngine>,
    resolver: NodeResolver,
    state: watch::Sender<ConnectionState>,
    events: EventSender,
    pending_events: Mutex<Option<EventReceiver>>,
    /// Serializes connect and wiring between the retry task and the event loop.
    connect_lock: tokio::sync::Mutex<()>,
    last_status: Mutex<Option<SessionStatus>>,
    wired: AtomicBool,
    /// Set when the server-side subscription can no longer be trusted.
    stale: AtomicBool,
    retry_task: Mutex<Option<JoinHandle<()>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionSupervisor {
    /// Creates a supervisor for the given engine.
    pub fn new(context: SharedContext, engine: Arc<SubscriptionEngine>) -> Arc<Self> {
        let (events, pending) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            resolver: NodeResolver::new(context.clone()),
            context,
            engine,
            state,
            events,
            pending_events: Mutex::new(Some(pending)),
            connect_lock: tokio::sync::Mutex::new(()),
            last_status: Mutex::new(None),
            wired: AtomicBool::new(false),
            stale: AtomicBool::new(false),
            retry_task: Mutex::new(None),
            event_task: Mutex::new(None),
        })
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watches state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Last session status received.
    pub fn last_status(&self) -> Option<SessionStatus> {
        *self.last_status.lock()
    }

    /// Returns `true` while a retry task is pending.
    pub fn is_retrying(&self) -> bool {
        self.retry_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn is_shutting_down(&self) -> bool {
        self.state() == ConnectionState::ShuttingDown
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next || *current == ConnectionState::ShuttingDown {
                return false;
            }
            info!(from = %current, to = %next, "Connection state changed");
            *current = next;
            true
        });
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the event loop and, with auto-connect, the first connection.
    ///
    /// A failed first connection is not an error: the retry task takes over.
    pub async fn start(self: &Arc<Self>) -> BridgeResult<()> {
        if self.is_shutting_down() {
            return Err(ConnectionError::ShuttingDown.into());
        }
        let Some(events) = self.pending_events.lock().take() else {
            debug!("Supervisor already started");
            return Ok(());
        };
        let task = tokio::spawn(Self::run_events(Arc::downgrade(self), events));
        *self.event_task.lock() = Some(task);

        if self.context.config().auto_connect {
            if let Err(e) = self.connect().await {
                e.log("Initial connection failed");
            }
        }
        Ok(())
    }

    /// Connects and wires now; schedules retries if that fails.
    pub async fn connect(self: &Arc<Self>) -> BridgeResult<()> {
        match self.connect_and_wire().await {
            Ok(()) => Ok(()),
            Err(e) => {
                if !self.is_shutting_down() {
                    self.schedule_retry();
                }
                Err(e)
            }
        }
    }

    /// Unsubscribes, then disconnects. Failures of either step are logged.
    #[instrument(skip(self), name = "supervisor_shutdown")]
    pub async fn shutdown(&self) {
        let previous = self.state.send_replace(ConnectionState::ShuttingDown);
        if previous == ConnectionState::ShuttingDown {
            debug!("Shutdown already in progress");
            return;
        }
        info!(from = %previous, "Shutting down bridge connection");

        if let Some(task) = self.retry_task.lock().take() {
            task.abort();
        }

        let _guard = self.connect_lock.lock().await;
        if let Err(e) = self.engine.teardown().await {
            e.log("Unsubscribe during shutdown failed");
        }
        if let Err(e) = self.context.session().disconnect().await {
            e.log("Disconnect during shutdown failed");
        }
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
        info!("Bridge connection shut down");
    }

    // =========================================================================
    // Connect and wire
    // =========================================================================

    /// Connects if needed, then resolves every item and installs the
    /// subscription. Wiring either completes or leaves nothing installed.
    pub async fn connect_and_wire(&self) -> BridgeResult<()> {
        self.establish(false).await
    }

    /// Rewires after a session recovery unless another caller already did.
    async fn rewire(self: &Arc<Self>) -> BridgeResult<()> {
        match self.establish(true).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if !self.is_shutting_down() {
                    self.schedule_retry();
                }
                Err(e)
            }
        }
    }

    async fn establish(&self, only_if_stale: bool) -> BridgeResult<()> {
        let _guard = self.connect_lock.lock().await;
        if self.is_shutting_down() {
            return Err(ConnectionError::ShuttingDown.into());
        }
        // Checked under the lock: a concurrent rewire may have finished.
        if only_if_stale && !self.stale.load(Ordering::SeqCst) {
            if self.wired.load(Ordering::SeqCst) {
                self.set_state(ConnectionState::Connected);
            }
            return Ok(());
        }

        let session = self.context.session();
        if !session.is_connected() {
            self.set_state(ConnectionState::Connecting);
            self.context.stats().record_connect_attempt();
            info!(endpoint = %session.endpoint(), "Connecting");
            if let Err(e) = session.connect(self.events.clone()).await {
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
            self.context.stats().record_connect();
        }

        self.wire().await
    }

    async fn wire(&self) -> BridgeResult<()> {
        let items = self.context.registry().snapshot();
        let result = async {
            let resolution = self.resolver.resolve_all(&items).await?;
            self.engine.install(&resolution, &items).await
        }
        .await;

        match result {
            Ok(subscription_id) => {
                self.stale.store(false, Ordering::SeqCst);
                self.wired.store(true, Ordering::SeqCst);
                self.set_state(ConnectionState::Connected);
                info!(subscription_id, items = items.len(), "Bridge wired");
                Ok(())
            }
            Err(e) => {
                self.stale.store(true, Ordering::SeqCst);
                self.mark_all_bad(&format!("wiring failed: {}", e));
                let next = if self.context.session().is_connected() {
                    ConnectionState::Degraded
                } else {
                    ConnectionState::Disconnected
                };
                self.set_state(next);
                Err(e)
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>) {
        let mut slot = self.retry_task.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("Retry already pending");
            return;
        }
        let interval = self.context.config().retry_interval;
        info!(retry_in = ?interval, "Connection retry scheduled");
        *slot = Some(tokio::spawn(Self::retry_loop(Arc::downgrade(self), interval)));
    }

    async fn retry_loop(this: Weak<Self>, interval: Duration) {
        let mut attempt: u64 = 0;
        loop {
            tokio::time::sleep(interval).await;
            let Some(supervisor) = this.upgrade() else {
                return;
            };
            if supervisor.is_shutting_down() {
                return;
            }
            attempt += 1;
            match supervisor.connect_and_wire().await {
                Ok(()) => {
                    info!(attempt, "Connection re-established");
                    return;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        retry_in = ?interval,
                        error_code = %e.error_code(),
                        error = %e,
                        "Connection attempt failed"
                    );
                }
            }
        }
    }

    // =========================================================================
    // Session events
    // =========================================================================

    async fn run_events(this: Weak<Self>, mut events: EventReceiver) {
        debug!("Session event loop started");
        while let Some(event) = events.recv().await {
            let Some(supervisor) = this.upgrade() else {
                break;
            };
            supervisor.handle_event(event).await;
        }
        debug!("Session event loop stopped");
    }

    async fn handle_event(self: &Arc<Self>, event: SessionEvent) {
        match event {
            SessionEvent::DataChange {
                subscription_id,
                changes,
            } => self.engine.dispatch(subscription_id, changes),
            SessionEvent::StatusChanged(status) => self.handle_status(status).await,
        }
    }

    /// Applies one session status notification.
    pub async fn handle_status(self: &Arc<Self>, status: SessionStatus) {
        let previous = self.last_status.lock().replace(status);
        info!(status = %status, previous = ?previous, state = %self.state(), "Session status");
        if self.is_shutting_down() {
            return;
        }

        match status {
            SessionStatus::WatchdogTimeout => {
                self.mark_all_bad("session watchdog timeout");
                self.set_state(ConnectionState::Degraded);
            }
            SessionStatus::ReconnectError | SessionStatus::ServerShutdown => {
                self.mark_all_bad(&format!("session lost: {}", status));
                if let Err(e) = self.engine.teardown().await {
                    debug!(error = %e, "Subscription of the lost session not deleted");
                }
                self.stale.store(true, Ordering::SeqCst);
                self.set_state(ConnectionState::Disconnected);
                if self.context.config().auto_connect {
                    self.schedule_retry();
                }
            }
            SessionStatus::NewSessionCreated => {
                self.engine.discard();
                self.stale.store(true, Ordering::SeqCst);
            }
            SessionStatus::Disconnected => {
                if self.wired.load(Ordering::SeqCst) {
                    self.stale.store(true, Ordering::SeqCst);
                }
                self.set_state(ConnectionState::Disconnected);
            }
            SessionStatus::Connected => {
                if self.stale.load(Ordering::SeqCst) {
                    info!("Session recovered, rewiring");
                    if let Err(e) = self.rewire().await {
                        e.log("Rewiring after reconnect failed");
                    }
                } else if self.wired.load(Ordering::SeqCst) {
                    self.set_state(ConnectionState::Connected);
                }
            }
        }
    }

    /// Marks every registered item bad and asks the host to look at it.
    ///
    /// Output items are flushed through a reprocess request with their echo
    /// flag forced to suppressing, so the host's answering write is not sent
    /// to the server. Input items get a rescan request.
    pub fn mark_all_bad(&self, reason: &str) {
        let items = self.context.registry().snapshot();
        let now = Utc::now();
        for item in &items {
            item.with_state(|state| {
                state.set_bad(reason);
                state.timestamp = Some(now);
                state.echo.force_suppressing();
            });
            if item.direction().is_output() {
                self.context.stats().record_reprocess();
                self.context.hooks().request_reprocess(item.index());
            } else {
                self.context.stats().record_rescan();
                self.context.hooks().request_rescan(item.index());
            }
        }
        self.context.stats().record_bulk_bad();
        warn!(items = items.len(), reason, "All items marked bad");
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        if let Some(task) = self.retry_task.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.event_task.get_mut().take() {
            task.abort();
        }
    }
}

impl fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.state())
            .field("last_status", &self.last_status())
            .field("subscription", &self.engine.current_subscription())
            .field("retrying", &self.is_retrying())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::context::BridgeContext;
    use crate::hooks::{ChannelHooks, HostRequest};
    use crate::item::{Direction, ItemDefinition, ItemIndex, ItemStatus, LocalType};
    use crate::session::{InMemorySession, SessionClient};
    use crate::types::{NodeId, UaValue};
    use tokio::time::timeout;

    struct Fixture {
        ctx: SharedContext,
        session: Arc<InMemorySession>,
        engine: Arc<SubscriptionEngine>,
        supervisor: Arc<ConnectionSupervisor>,
        requests: mpsc::UnboundedReceiver<HostRequest>,
        states: watch::Receiver<ConnectionState>,
    }

    fn fixture() -> Fixture {
        let session = Arc::new(InMemorySession::new("opc.tcp://sim:4840").without_initial_values());
        session.add_node(NodeId::numeric(2, 1), UaValue::Int32(1));
        session.add_node(NodeId::numeric(2, 2), UaValue::Double(2.0));
        session.add_node(NodeId::numeric(2, 3), UaValue::Int32(3));

        let (hooks, requests) = ChannelHooks::with_channel();
        let config = BridgeConfig::builder("opc.tcp://sim:4840")
            .retry_interval(Duration::from_secs(10))
            .build()
            .unwrap();
        let ctx = BridgeContext::new(config, session.clone(), Arc::new(hooks)).unwrap();
        ctx.registry()
            .register(ItemDefinition::new("2,1", Direction::Input, LocalType::Int32))
            .unwrap();
        ctx.registry()
            .register(ItemDefinition::new("2,2", Direction::Output, LocalType::Float64))
            .unwrap();
        ctx.registry()
            .register(ItemDefinition::new("2,3", Direction::Input, LocalType::Int32))
            .unwrap();
        let ctx = Arc::new(ctx);

        let engine = Arc::new(SubscriptionEngine::new(ctx.clone()));
        let supervisor = ConnectionSupervisor::new(ctx.clone(), engine.clone());
        let states = supervisor.subscribe();
        Fixture {
            ctx,
            session,
            engine,
            supervisor,
            requests,
            states,
        }
    }

    async fn wait_for(states: &mut watch::Receiver<ConnectionState>, target: ConnectionState) {
        timeout(Duration::from_secs(120), states.wait_for(|s| *s == target))
            .await
            .expect("state not reached")
            .unwrap();
    }

    fn drain(requests: &mut mpsc::UnboundedReceiver<HostRequest>) -> Vec<HostRequest> {
        let mut out = Vec::new();
        while let Ok(request) = requests.try_recv() {
            out.push(request);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failures_are_retried_until_connected() {
        let mut f = fixture();
        f.session.fail_next_connects(3);

        f.supervisor.start().await.unwrap();
        assert_eq!(f.supervisor.state(), ConnectionState::Disconnected);
        assert!(f.supervisor.is_retrying());

        wait_for(&mut f.states, ConnectionState::Connected).await;
        assert_eq!(f.session.connect_attempts(), 4);
        assert_eq!(f.engine.monitored_count(), 3);
        assert_eq!(f.ctx.stats().snapshot().connect_attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_marks_every_item_bad() {
        let mut f = fixture();
        f.supervisor.start().await.unwrap();
        wait_for(&mut f.states, ConnectionState::Connected).await;

        // Only item 0 ever receives a value.
        f.session.notify_change(&NodeId::numeric(2, 1), UaValue::Int32(5));
        f.session.notify_status(SessionStatus::WatchdogTimeout);
        wait_for(&mut f.states, ConnectionState::Degraded).await;

        for item in f.ctx.registry().snapshot() {
            assert_eq!(item.status(), ItemStatus::Bad);
            assert!(item.read().timestamp.is_some());
        }
        let requests = drain(&mut f.requests);
        assert!(requests.contains(&HostRequest::Rescan(ItemIndex::new(0))));
        assert!(requests.contains(&HostRequest::Reprocess(ItemIndex::new(1))));
        assert!(requests.contains(&HostRequest::Rescan(ItemIndex::new(2))));

        // Recovery from a watchdog keeps the subscription.
        let subscription = f.engine.current_subscription();
        f.session.notify_status(SessionStatus::Connected);
        wait_for(&mut f.states, ConnectionState::Connected).await;
        assert_eq!(f.engine.current_subscription(), subscription);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_error_rewires_without_duplicates() {
        let mut f = fixture();
        f.supervisor.start().await.unwrap();
        wait_for(&mut f.states, ConnectionState::Connected).await;
        let first = f.engine.current_subscription().unwrap();

        for round in 0..2 {
            f.session.notify_status(SessionStatus::ReconnectError);
            wait_for(&mut f.states, ConnectionState::Disconnected).await;
            assert!(f.engine.current_subscription().is_none(), "round {}", round);
            wait_for(&mut f.states, ConnectionState::Connected).await;
        }

        let current = f.engine.current_subscription().unwrap();
        assert_ne!(current, first);
        assert_eq!(f.session.subscription_ids(), vec![current]);
        assert_eq!(f.session.monitored_item_count(), 3);
        assert_eq!(f.engine.monitored_count(), 3);
        assert_eq!(f.ctx.stats().snapshot().bulk_bad, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_rewires_on_connected() {
        let mut f = fixture();
        f.supervisor.start().await.unwrap();
        wait_for(&mut f.states, ConnectionState::Connected).await;
        let first = f.engine.current_subscription().unwrap();

        f.session.notify_status(SessionStatus::NewSessionCreated);
        f.session.notify_status(SessionStatus::Connected);
        timeout(Duration::from_secs(5), async {
            while f.engine.current_subscription().map_or(true, |id| id == first) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(f.session.subscription_count(), 1);
        assert_eq!(f.supervisor.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_rewire_marks_items_bad() {
        let mut f = fixture();
        f.supervisor.start().await.unwrap();
        wait_for(&mut f.states, ConnectionState::Connected).await;
        f.session.notify_change(&NodeId::numeric(2, 1), UaValue::Int32(5));
        timeout(Duration::from_secs(5), async {
            while f.ctx.registry().snapshot()[0].status() != ItemStatus::Good {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        drain(&mut f.requests);

        f.session.fail_next_subscriptions(1);
        f.session.notify_status(SessionStatus::NewSessionCreated);
        f.session.notify_status(SessionStatus::Connected);
        wait_for(&mut f.states, ConnectionState::Degraded).await;

        for item in f.ctx.registry().snapshot() {
            assert_eq!(item.status(), ItemStatus::Bad);
        }
        assert!(f.engine.current_subscription().is_none());
        assert_eq!(f.session.subscription_count(), 0);
        let requests = drain(&mut f.requests);
        assert!(requests.contains(&HostRequest::Rescan(ItemIndex::new(0))));
        assert!(requests.contains(&HostRequest::Reprocess(ItemIndex::new(1))));
        assert!(requests.contains(&HostRequest::Rescan(ItemIndex::new(2))));

        // The retry wires the bridge again.
        wait_for(&mut f.states, ConnectionState::Connected).await;
        assert_eq!(f.session.subscription_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wiring_leaves_no_server_subscription() {
        let mut f = fixture();
        f.supervisor.start().await.unwrap();
        wait_for(&mut f.states, ConnectionState::Connected).await;

        f.session.fail_next_monitored_items(1);
        f.session.notify_status(SessionStatus::NewSessionCreated);
        f.session.notify_status(SessionStatus::Connected);
        wait_for(&mut f.states, ConnectionState::Degraded).await;

        for item in f.ctx.registry().snapshot() {
            assert_eq!(item.status(), ItemStatus::Bad);
        }
        assert!(f.engine.current_subscription().is_none());
        assert_eq!(f.engine.monitored_count(), 0);
        assert_eq!(f.session.subscription_count(), 0);
        assert_eq!(f.session.monitored_item_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_connected_statuses_rewire_once() {
        let mut f = fixture();
        f.supervisor.start().await.unwrap();
        wait_for(&mut f.states, ConnectionState::Connected).await;
        let wirings = f.ctx.stats().snapshot().wirings;

        f.session.notify_status(SessionStatus::NewSessionCreated);
        timeout(Duration::from_secs(5), async {
            while f.engine.current_subscription().is_some() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        f.session.delay_subscriptions(Duration::from_millis(200));
        tokio::join!(
            f.supervisor.handle_status(SessionStatus::Connected),
            f.supervisor.handle_status(SessionStatus::Connected),
        );

        assert_eq!(f.ctx.stats().snapshot().wirings, wirings + 1);
        assert_eq!(f.session.subscription_count(), 1);
        assert_eq!(f.supervisor.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_loss_deletes_reachable_subscription() {
        let mut f = fixture();
        f.supervisor.start().await.unwrap();
        wait_for(&mut f.states, ConnectionState::Connected).await;
        assert_eq!(f.session.subscription_count(), 1);

        // The server is still reachable when the loss is reported.
        f.supervisor.handle_status(SessionStatus::ServerShutdown).await;
        assert_eq!(f.supervisor.state(), ConnectionState::Disconnected);
        assert!(f.engine.current_subscription().is_none());
        assert_eq!(f.session.subscription_count(), 0);

        wait_for(&mut f.states, ConnectionState::Connected).await;
        assert_eq!(f.session.subscription_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_unsubscribes_then_disconnects() {
        let mut f = fixture();
        f.supervisor.start().await.unwrap();
        wait_for(&mut f.states, ConnectionState::Connected).await;

        f.supervisor.shutdown().await;
        assert_eq!(f.supervisor.state(), ConnectionState::ShuttingDown);
        assert_eq!(f.session.subscription_count(), 0);
        assert!(!f.session.is_connected());

        // A second shutdown and late status changes are harmless.
        f.supervisor.shutdown().await;
        f.supervisor.handle_status(SessionStatus::Connected).await;
        assert_eq!(f.supervisor.state(), ConnectionState::ShuttingDown);
        assert!(f.supervisor.start().await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_tolerates_dead_session() {
        let f = fixture();
        f.supervisor.start().await.unwrap();
        f.session.notify_status(SessionStatus::ServerShutdown);
        f.supervisor.shutdown().await;
        assert_eq!(f.supervisor.state(), ConnectionState::ShuttingDown);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Degraded.to_string(), "Degraded");
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Degraded.is_connected());
    }
}
