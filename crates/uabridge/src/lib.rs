// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA item bridge.
//!
//! Keeps process variables held by a host runtime in sync with nodes on an
//! OPC UA server. The host registers items, the bridge resolves them to
//! nodes, monitors them through one shared subscription and writes host
//! values back.
//!
//! # Architecture
//!
//! ```text
//!        host                          bridge                        server
//!   ┌───────────┐  register/read  ┌──────────────┐
//!   │           │────────────────▶│ ItemRegistry │
//!   │           │  write          │              │   translate/read
//!   │  runtime  │────────────────▶│ Subscription │◀──────────────────┐
//!   │           │                 │    Engine    │   data changes    │
//!   │           │◀────────────────│              │◀──────────┐       │
//!   └───────────┘  rescan /       └──────┬───────┘           │       │
//!                  reprocess             │            ┌──────┴───────┴──┐
//!                                 ┌──────┴───────┐    │  SessionClient  │
//!                                 │  Connection  │───▶│                 │
//!                                 │  Supervisor  │    └─────────────────┘
//!                                 └──────────────┘
//! ```
//!
//! # Error Handling
//!
//! ```text
//! BridgeError
//! ├── Path          - Malformed item path
//! ├── Resolution    - Node not found on the server
//! ├── Connection    - Session failures, retried
//! ├── Subscription  - Subscription and monitored item failures
//! ├── Coercion      - Value cannot be represented
//! ├── Item          - Registration, lookup and write failures
//! └── Config        - Invalid configuration
//! ```
//!
//! Failures on one item never affect another: the item is marked bad and
//! everything else keeps running.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod browse;
pub mod coercion;
pub mod config;
pub mod context;
pub mod echo;
pub mod error;
pub mod hooks;
pub mod item;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod session;
pub mod setup;
pub mod stats;
pub mod subscription;
pub mod supervisor;
pub mod types;

pub use bridge::{Bridge, BridgeBuilder};

pub use error::{
    BridgeError, BridgeResult, CoercionError, ConfigError, ConnectionError, ErrorCode,
    ErrorSeverity, ItemError, PathError, ResolutionError, SubscriptionError,
};

pub use config::{
    BridgeConfig, BridgeConfigBuilder, ConfigFormat, DiscardPolicy, ItemDefaults, ItemOptions,
    ItemSpec,
};

pub use item::{
    Direction, Item, ItemDefinition, ItemIndex, ItemReading, ItemStatus, LocalScalar, LocalType,
    LocalValue, RemoteType, ScanMode, TimestampSource,
};

pub use types::{DataValue, Identifier, NodeId, StatusCode, UaValue, WireType};

pub use hooks::{ChannelHooks, HostHooks, HostRequest, NoopHooks};

pub use session::{DataChange, InMemorySession, SessionClient, SessionEvent, SessionStatus};

pub use coercion::CoercionTable;
pub use context::{BridgeContext, SharedContext};
pub use echo::EchoState;
pub use registry::ItemRegistry;
pub use report::{ItemReport, StatusReport};
pub use resolver::{ItemPath, NodeResolver, Resolution};
pub use setup::{Security, SessionSetup, SetupParams};
pub use stats::{BridgeStats, StatsSnapshot};
pub use subscription::SubscriptionEngine;
pub use supervisor::{ConnectionState, ConnectionSupervisor};
