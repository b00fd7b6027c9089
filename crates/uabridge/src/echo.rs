// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Echo suppression for output items.
//!
//! A write to the server comes back as a change notification. The bridge
//! must not hand that echo to the host as if someone else had changed the
//! value. One bit per item tells the two apart:
//!
//! ```text
//!            write submitted / external change seen
//!   Quiet ─────────────────────────────────────────▶ Suppressing
//!     ▲                                                   │
//!     └───────────── echo seen / reprocess consumed ──────┘
//! ```
//!
//! The state lives inside the item and is only touched while the item lock
//! is held, by both the write path and the dispatch path.

use serde::Serialize;

/// Per-item echo state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoState {
    /// The next notification is an external change.
    #[default]
    Quiet,
    /// The next notification is ours, or a reprocess is pending.
    Suppressing,
}

/// What dispatch should do with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoDecision {
    /// External change: ask the host to reprocess the item.
    Reprocess,
    /// Echo of our own write: drop silently.
    Suppressed,
}

/// What the write path should do with a host write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    /// Submit the value to the server.
    Submit,
    /// The host is reprocessing an external change; nothing to send.
    AcknowledgeReprocess,
}

impl EchoState {
    /// Applies an incoming notification.
    pub fn on_notification(&mut self) -> EchoDecision {
        match self {
            Self::Quiet => {
                *self = Self::Suppressing;
                EchoDecision::Reprocess
            }
            Self::Suppressing => {
                *self = Self::Quiet;
                EchoDecision::Suppressed
            }
        }
    }

    /// Applies a host write before it is submitted.
    ///
    /// A write arriving while `Suppressing` is the host processing the
    /// reprocess request raised by dispatch, so it consumes the state and is
    /// not sent back to the server.
    pub fn begin_write(&mut self) -> WriteDecision {
        match self {
            Self::Quiet => {
                *self = Self::Suppressing;
                WriteDecision::Submit
            }
            Self::Suppressing => {
                *self = Self::Quiet;
                WriteDecision::AcknowledgeReprocess
            }
        }
    }

    /// Undoes [`begin_write`](Self::begin_write) after a failed submission.
    pub fn abort_write(&mut self) {
        *self = Self::Quiet;
    }

    /// Forces `Suppressing`, used when every item is flushed as bad.
    pub fn force_suppressing(&mut self) {
        *self = Self::Suppressing;
    }

    /// Returns `true` while suppressing.
    #[inline]
    pub fn is_suppressing(self) -> bool {
        matches!(self, Self::Suppressing)
    }
}
