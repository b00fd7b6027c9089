// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session setup parameters.
//!
//! Derives what a session client needs from the operator's setup call:
//! endpoint, host name, and the client certificate and key when a
//! certificate store is configured.
//!
//! ```text
//!   <store>/certs/cert_client_<host>.der
//!   <store>/private/private_key_client_<host>.pem
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::error::{BridgeResult, ConfigError};

/// Host name used when neither an explicit name nor `HOSTNAME` is set.
pub const UNKNOWN_HOST: &str = "unknown_host";

/// Environment variable consulted for the host name.
pub const HOSTNAME_VAR: &str = "HOSTNAME";

/// Operator-facing setup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupParams {
    server_url: String,
    certificate_store: Option<PathBuf>,
    host_name: Option<String>,
    auto_connect: bool,
    debug_level: u8,
}

impl SetupParams {
    /// Creates setup parameters for an endpoint.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            certificate_store: None,
            host_name: None,
            auto_connect: true,
            debug_level: 0,
        }
    }

    /// Takes the parameters from a loaded configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            server_url: config.server_url.clone(),
            certificate_store: config.certificate_store.clone(),
            host_name: config.host_name.clone(),
            auto_connect: config.auto_connect,
            debug_level: 0,
        }
    }

    /// Sets the certificate store directory.
    pub fn certificate_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.certificate_store = Some(path.into());
        self
    }

    /// Sets the host name.
    pub fn host_name(mut self, name: impl Into<String>) -> Self {
        self.host_name = Some(name.into());
        self
    }

    /// Enables or disables automatic connection.
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    /// Sets the debug level.
    pub fn debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    /// Debug level.
    pub fn level(&self) -> u8 {
        self.debug_level
    }

    /// Resolves host name and security material.
    pub fn resolve(&self) -> BridgeResult<SessionSetup> {
        self.resolve_with_env(env::var(HOSTNAME_VAR).ok())
    }

    fn resolve_with_env(&self, env_host: Option<String>) -> BridgeResult<SessionSetup> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::invalid_field("server_url", "missing").into());
        }
        let host_name = resolve_host_name(self.host_name.as_deref(), env_host);
        let security = match &self.certificate_store {
            Some(store) => Security::certificate(store, &host_name),
            None => Security::None,
        };
        debug!(
            endpoint = %self.server_url,
            host = %host_name,
            secure = security.is_secure(),
            "Session setup resolved"
        );
        Ok(SessionSetup {
            endpoint: self.server_url.clone(),
            host_name,
            auto_connect: self.auto_connect,
            debug_level: self.debug_level,
            security,
        })
    }

    /// Writes these parameters into a configuration.
    pub fn apply(&self, config: &mut BridgeConfig) {
        config.server_url = self.server_url.clone();
        config.certificate_store = self.certificate_store.clone();
        config.host_name = self.host_name.clone();
        config.auto_connect = self.auto_connect;
    }
}

fn resolve_host_name(explicit: Option<&str>, env_host: Option<String>) -> String {
    explicit
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or(env_host.filter(|name| !name.is_empty()))
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

/// Security material for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Security {
    /// No security.
    None,
    /// Client certificate and private key.
    Certificate {
        /// DER-encoded client certificate.
        certificate: PathBuf,
        /// PEM-encoded private key.
        private_key: PathBuf,
    },
}

impl Security {
    fn certificate(store: &Path, host_name: &str) -> Self {
        Self::Certificate {
            certificate: store
                .join("certs")
                .join(format!("cert_client_{}.der", host_name)),
            private_key: store
                .join("private")
                .join(format!("private_key_client_{}.pem", host_name)),
        }
    }

    /// Returns `true` when a certificate is used.
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Certificate { .. })
    }
}

/// Resolved session setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSetup {
    /// Server endpoint.
    pub endpoint: String,
    /// Client host name.
    pub host_name: String,
    /// Connect automatically on start.
    pub auto_connect: bool,
    /// Debug level.
    pub debug_level: u8,
    /// Security material.
    pub security: Security,
}

/// Log filter directive for a numeric debug level.
pub fn debug_directive(level: u8) -> &'static str {
    match level {
        0 => "uabridge=info",
        1 => "uabridge=debug",
        _ => "uabridge=trace",
    }
}
