// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.
//!
//! The filter sits behind a reload layer so the bridge debug level can be
//! changed while the process runs.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};
use uabridge::setup::debug_directive;

use crate::cli::LogFormat;
use crate::error::{BinError, BinResult};

/// Handle for adjusting the log filter after initialization.
#[derive(Debug, Clone)]
pub struct LogHandle {
    base: String,
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Replaces the bridge directive with the one for `level`.
    pub fn set_debug_level(&self, level: u8) -> BinResult<()> {
        let filter = EnvFilter::try_new(filter_directives(&self.base, level))
            .map_err(|e| BinError::Logging(e.to_string()))?;
        self.handle
            .reload(filter)
            .map_err(|e| BinError::Logging(e.to_string()))
    }
}

/// Builds the directive string for a base level and a bridge debug level.
pub fn filter_directives(base: &str, debug_level: u8) -> String {
    format!("{},{}", base, debug_directive(debug_level))
}

/// Initializes the logging subsystem.
///
/// `RUST_LOG` takes precedence over `level` and `debug_level`.
pub fn init_logging(level: &str, debug_level: u8, format: LogFormat) -> BinResult<LogHandle> {
    let base = level.to_lowercase();
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&base, debug_level))
            .map_err(|e| BinError::Logging(e.to_string()))?,
    };
    let (filter, handle) = reload::Layer::new(filter);
    let registry = tracing_subscriber::registry().with(filter);
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());

    let result = match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(is_terminal),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(is_terminal),
            )
            .try_init(),
    };
    result.map_err(|e| BinError::Logging(e.to_string()))?;

    Ok(LogHandle { base, handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        assert_eq!(filter_directives("warn", 0), "warn,uabridge=info");
        assert_eq!(filter_directives("info", 1), "info,uabridge=debug");
        assert_eq!(filter_directives("info", 3), "info,uabridge=trace");
    }

    #[test]
    fn test_directives_parse() {
        for level in 0..3 {
            assert!(EnvFilter::try_new(filter_directives("info", level)).is_ok());
        }
    }
}
