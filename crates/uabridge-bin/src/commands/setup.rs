// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `setup` command.

use uabridge::{BridgeConfig, Security, SessionSetup, SetupParams};

use crate::cli::{Cli, OutputFormat, SetupArgs};
use crate::commands::load_config;
use crate::error::BinResult;

/// Builds setup parameters from the config file and command-line overrides.
///
/// With `--server-url` the config file is optional.
pub(crate) fn setup_params(cli: &Cli, args: &SetupArgs) -> BinResult<SetupParams> {
    let mut config = match (&args.server_url, cli.config.exists()) {
        (Some(url), false) => BridgeConfig::new(url.clone()),
        _ => load_config(&cli.config)?,
    };
    if let Some(url) = &args.server_url {
        config.server_url = url.clone();
    }
    let mut params = SetupParams::from_config(&config);
    if let Some(store) = &args.certificate_store {
        params = params.certificate_store(store.clone());
    }
    if let Some(host) = &args.host_name {
        params = params.host_name(host.clone());
    }
    Ok(params.debug_level(cli.debug_level))
}

/// Executes the `setup` command.
pub fn setup(cli: &Cli, args: SetupArgs) -> BinResult<()> {
    let resolved = setup_params(cli, &args)?.resolve()?;
    match args.format {
        OutputFormat::Text => print_text(&resolved),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
    }
    Ok(())
}

fn print_text(setup: &SessionSetup) {
    println!("Endpoint: {}", setup.endpoint);
    println!("Host name: {}", setup.host_name);
    println!("Auto connect: {}", setup.auto_connect);
    println!("Debug level: {}", setup.debug_level);
    match &setup.security {
        Security::None => println!("Security: none"),
        Security::Certificate {
            certificate,
            private_key,
        } => {
            println!("Security: certificate");
            println!("  Certificate: {}", certificate.display());
            println!("  Private key: {}", private_key.display());
        }
    }
}
