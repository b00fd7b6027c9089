// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! uabridge command-line entry point.

use std::process::ExitCode;

use uabridge_bin::error::report_error;
use uabridge_bin::{commands, logging, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let log = match logging::init_logging(&cli.log_level, cli.debug_level, cli.log_format) {
        Ok(handle) => handle,
        Err(e) => {
            report_error(&e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    match commands::execute(cli, log).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
