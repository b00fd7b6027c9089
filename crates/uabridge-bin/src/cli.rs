// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// CLI Root
// =============================================================================

/// OPC UA item bridge.
#[derive(Parser, Debug, Clone)]
#[command(name = "uabridge", version, about, long_about = None)]
pub struct Cli {
    /// Path to the bridge configuration file (yaml, toml or json)
    #[arg(
        short,
        long,
        global = true,
        env = "UABRIDGE_CONFIG",
        default_value = "uabridge.yaml"
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "UABRIDGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Bridge debug level (0 = info, 1 = debug, 2+ = trace)
    #[arg(short, long, global = true, default_value_t = 0)]
    pub debug_level: u8,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Load the configuration, parse item paths and verify the coercion table
    Check(CheckArgs),

    /// Print the derived session setup
    Setup(SetupArgs),

    /// Run the bridge against an in-memory server
    Simulate(SimulateArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `check` command.
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `setup` command.
#[derive(Args, Debug, Clone, Default)]
pub struct SetupArgs {
    /// Override the server endpoint
    #[arg(long)]
    pub server_url: Option<String>,

    /// Override the certificate store directory
    #[arg(long)]
    pub certificate_store: Option<PathBuf>,

    /// Override the host name
    #[arg(long)]
    pub host_name: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `simulate` command.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// How long to run, in seconds
    #[arg(short, long, default_value_t = 10)]
    pub seconds: u64,

    /// Interval between simulated input changes, in milliseconds
    #[arg(short, long, default_value_t = 500)]
    pub tick_ms: u64,

    /// Report verbosity printed at the end (0 = summary, 1 = bad items, 2 = all)
    #[arg(short, long, default_value_t = 2)]
    pub verbosity: u8,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            seconds: 10,
            tick_ms: 500,
            verbosity: 2,
        }
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_command() {
        let cli = Cli::parse_from(["uabridge", "check"]);
        assert!(matches!(cli.command, Commands::Check(_)));
        assert_eq!(cli.config, PathBuf::from("uabridge.yaml"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["uabridge", "simulate", "-c", "/etc/ua.toml", "-d", "2"]);
        assert_eq!(cli.config, PathBuf::from("/etc/ua.toml"));
        assert_eq!(cli.debug_level, 2);
    }

    #[test]
    fn test_setup_overrides() {
        let cli = Cli::parse_from([
            "uabridge",
            "setup",
            "--server-url",
            "opc.tcp://plc:4840",
            "--host-name",
            "ioc1",
            "-f",
            "json",
        ]);
        if let Commands::Setup(args) = cli.command {
            assert_eq!(args.server_url.as_deref(), Some("opc.tcp://plc:4840"));
            assert_eq!(args.host_name.as_deref(), Some("ioc1"));
            assert_eq!(args.format, OutputFormat::Json);
        } else {
            panic!("Expected Setup command");
        }
    }

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::parse_from(["uabridge", "simulate"]);
        if let Commands::Simulate(args) = cli.command {
            assert_eq!(args.seconds, 10);
            assert_eq!(args.tick_ms, 500);
        } else {
            panic!("Expected Simulate command");
        }
    }

    #[test]
    fn test_log_format() {
        let cli = Cli::parse_from(["uabridge", "--log-format", "json", "check"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
