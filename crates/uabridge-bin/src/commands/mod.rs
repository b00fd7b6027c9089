// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `check`: Validate configuration, item paths and the coercion table
//! - `setup`: Show the derived session setup
//! - `simulate`: Run the bridge against an in-memory server

mod check;
mod setup;
mod simulate;

pub use check::check;
pub use setup::setup;
pub use simulate::simulate;

use std::path::Path;

use uabridge::BridgeConfig;

use crate::cli::{Cli, Commands};
use crate::error::{BinError, BinResult};
use crate::logging::LogHandle;

/// Executes the command selected on the command line.
pub async fn execute(cli: Cli, log: LogHandle) -> BinResult<()> {
    match cli.command.clone() {
        Commands::Check(args) => check::check(&cli, args),
        Commands::Setup(args) => setup::setup(&cli, args),
        Commands::Simulate(args) => simulate::simulate(&cli, args, log).await,
    }
}

/// Loads the configuration file named on the command line.
pub(crate) fn load_config(path: &Path) -> BinResult<BridgeConfig> {
    if !path.exists() {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }
    Ok(BridgeConfig::load(path)?)
}
