// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Host hooks.
//!
//! The bridge never runs host logic itself. When an item needs attention it
//! asks the host through [`HostHooks`]: an input item with event scanning
//! gets a rescan request, an output item changed from outside gets a
//! reprocess request. Hooks are called from the dispatch task with no item
//! lock held and must return promptly.

use std::fmt;

use tokio::sync::mpsc;
use tracing::trace;

use crate::item::ItemIndex;

/// Callbacks into the host.
pub trait HostHooks: Send + Sync {
    /// The input item has a new value or status the host should pick up.
    fn request_rescan(&self, index: ItemIndex);

    /// The output item was changed externally; the host should reprocess it.
    fn request_reprocess(&self, index: ItemIndex);
}

/// A request sent to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostRequest {
    /// Rescan an input item.
    Rescan(ItemIndex),
    /// Reprocess an output item.
    Reprocess(ItemIndex),
}

impl HostRequest {
    /// The item the request refers to.
    pub fn index(&self) -> ItemIndex {
        match self {
            Self::Rescan(index) | Self::Reprocess(index) => *index,
        }
    }
}

impl fmt::Display for HostRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rescan(index) => write!(f, "rescan({})", index),
            Self::Reprocess(index) => write!(f, "reprocess({})", index),
        }
    }
}

/// A channel-based hook implementation.
///
/// The channel is unbounded so dispatch never waits on the host.
#[derive(Debug, Clone)]
pub struct ChannelHooks {
    sender: mpsc::UnboundedSender<HostRequest>,
}

impl ChannelHooks {
    /// Creates hooks sending into an existing channel.
    pub fn new(sender: mpsc::UnboundedSender<HostRequest>) -> Self {
        Self { sender }
    }

    /// Creates hooks together with their receiver.
    pub fn with_channel() -> (Self, mpsc::UnboundedReceiver<HostRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, request: HostRequest) {
        // A dropped receiver means the host stopped listening.
        if self.sender.send(request).is_err() {
            trace!(%request, "Host request dropped, receiver closed");
        }
    }
}

impl HostHooks for ChannelHooks {
    fn request_rescan(&self, index: ItemIndex) {
        self.send(HostRequest::Rescan(index));
    }

    fn request_reprocess(&self, index: ItemIndex) {
        self.send(HostRequest::Reprocess(index));
    }
}

/// Hooks that ignore every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl HostHooks for NoopHooks {
    fn request_rescan(&self, _index: ItemIndex) {}

    fn request_reprocess(&self, _index: ItemIndex) {}
}
