// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uabridge-bin
//!
//! Command-line front end for the uabridge OPC UA item bridge.
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    └──────┬──────┘
//!               ┌───────────┴───────────┐
//!               ▼                       ▼
//!        ┌──────────┐            ┌──────────┐
//!        │ commands │            │ logging  │
//!        └────┬─────┘            └──────────┘
//!             │
//!      ┌──────▼──────┐
//!      │  uabridge   │
//!      └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Validate configuration and item paths
//! uabridge -c /etc/uabridge.yaml check
//!
//! # Show endpoint, host name and certificate paths
//! uabridge setup --host-name ioc1
//!
//! # Run against an in-memory server for 30 seconds
//! uabridge -d 1 simulate --seconds 30
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

pub use cli::{Cli, Commands, LogFormat, OutputFormat};
pub use error::{BinError, BinResult};
