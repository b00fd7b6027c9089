// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge configuration.
//!
//! Configuration is read from YAML, TOML or JSON, chosen by file extension.
//! Durations are written in humantime form (`"100ms"`, `"10s"`).
//!
//! ```yaml
//! server_url: opc.tcp://plc.local:4840
//! certificate_store: /etc/uabridge/pki
//! publishing_interval: 100ms
//! retry_interval: 10s
//! defaults:
//!   queue_size: 1
//!   timestamp_source: server
//! items:
//!   - name: TANK:LEVEL
//!     path: "2:Plant.Tank.Level"
//!     direction: input
//!     local_type: float64
//!     scan: event
//!   - name: PUMP:SPEED:SP
//!     path: "2,1001"
//!     direction: output
//!     local_type: int32
//!     options:
//!       sampling_interval_ms: 250
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BridgeResult, ConfigError};
use crate::item::{Direction, ItemDefinition, LocalType, ScanMode, TimestampSource};

// =============================================================================
// BridgeConfig
// =============================================================================

/// Process-wide bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Server endpoint url.
    pub server_url: String,

    /// Certificate store directory; `None` connects without security.
    #[serde(default)]
    pub certificate_store: Option<PathBuf>,

    /// Host name used for certificate file names.
    #[serde(default)]
    pub host_name: Option<String>,

    /// Keep retrying the connection in the background.
    #[serde(default = "default_true")]
    pub auto_connect: bool,

    /// Publishing interval of the shared subscription.
    #[serde(default = "default_publishing_interval", with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Delay between connection attempts.
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Check direct identifiers with a read during resolution.
    #[serde(default = "default_true")]
    pub validate_direct_ids: bool,

    /// Read every resolved item once to learn its wire type.
    #[serde(default = "default_true")]
    pub read_initial_types: bool,

    /// Process-wide item defaults.
    #[serde(default)]
    pub defaults: ItemDefaults,

    /// Items registered at startup.
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

fn default_true() -> bool {
    true
}

fn default_publishing_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(10)
}

impl BridgeConfig {
    /// Creates a configuration with defaults for the given endpoint.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            certificate_store: None,
            host_name: None,
            auto_connect: true,
            publishing_interval: default_publishing_interval(),
            retry_interval: default_retry_interval(),
            validate_direct_ids: true,
            read_initial_types: true,
            defaults: ItemDefaults::default(),
            items: Vec::new(),
        }
    }

    /// Creates a builder.
    pub fn builder(server_url: impl Into<String>) -> BridgeConfigBuilder {
        BridgeConfigBuilder {
            config: Self::new(server_url),
        }
    }

    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading bridge configuration");

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content, format)?;
        config.validate()?;

        debug!(items = config.items.len(), "Configuration loaded");
        Ok(config)
    }

    /// Parses a configuration document without validating it.
    pub fn parse(content: &str, format: ConfigFormat) -> BridgeResult<Self> {
        let config = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(ConfigError::parse)?,
            ConfigFormat::Toml => toml::from_str(content).map_err(ConfigError::parse)?,
            ConfigFormat::Json => serde_json::from_str(content).map_err(ConfigError::parse)?,
        };
        Ok(config)
    }

    /// Validates field values.
    pub fn validate(&self) -> BridgeResult<()> {
        if !self.server_url.starts_with("opc.tcp://") {
            return Err(ConfigError::invalid_field(
                "server_url",
                format!("'{}' must start with opc.tcp://", self.server_url),
            )
            .into());
        }
        if self.publishing_interval.is_zero() {
            return Err(ConfigError::invalid_field("publishing_interval", "must be positive").into());
        }
        if self.retry_interval.is_zero() {
            return Err(ConfigError::invalid_field("retry_interval", "must be positive").into());
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(ConfigError::invalid_field(format!("items[{i}].name"), "is empty").into());
            }
            if item.path.trim().is_empty() {
                return Err(ConfigError::invalid_field(format!("items[{i}].path"), "is empty").into());
            }
            if item.array_size == Some(0) {
                return Err(
                    ConfigError::invalid_field(format!("items[{i}].array_size"), "must be non-zero")
                        .into(),
                );
            }
        }
        Ok(())
    }

    /// Converts the configured items into registration requests.
    pub fn item_definitions(&self) -> Vec<ItemDefinition> {
        self.items.iter().map(ItemSpec::to_definition).collect()
    }
}

/// Builder for [`BridgeConfig`].
#[derive(Debug, Clone)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Sets the certificate store.
    pub fn certificate_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.certificate_store = Some(path.into());
        self
    }

    /// Sets the host name.
    pub fn host_name(mut self, host: impl Into<String>) -> Self {
        self.config.host_name = Some(host.into());
        self
    }

    /// Enables or disables background reconnection.
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.config.auto_connect = enabled;
        self
    }

    /// Sets the publishing interval.
    pub fn publishing_interval(mut self, interval: Duration) -> Self {
        self.config.publishing_interval = interval;
        self
    }

    /// Sets the retry interval.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval = interval;
        self
    }

    /// Enables or disables direct identifier validation.
    pub fn validate_direct_ids(mut self, enabled: bool) -> Self {
        self.config.validate_direct_ids = enabled;
        self
    }

    /// Enables or disables the initial type read.
    pub fn read_initial_types(mut self, enabled: bool) -> Self {
        self.config.read_initial_types = enabled;
        self
    }

    /// Sets item defaults.
    pub fn defaults(mut self, defaults: ItemDefaults) -> Self {
        self.config.defaults = defaults;
        self
    }

    /// Adds an item.
    pub fn item(mut self, item: ItemSpec) -> Self {
        self.config.items.push(item);
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> BridgeResult<BridgeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`).
    Yaml,
    /// TOML (`.toml`).
    Toml,
    /// JSON (`.json`).
    Json,
}

impl ConfigFormat {
    /// Detects the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat { extension }),
        }
    }
}

// =============================================================================
// ItemDefaults
// =============================================================================

/// Process-wide monitoring defaults, overridable per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefaults {
    /// Sampling interval in ms; negative uses the publishing interval.
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval_ms: f64,

    /// Server-side queue depth.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Drop the oldest value on queue overflow.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,

    /// Timestamp attached to dispatched values.
    #[serde(default)]
    pub timestamp_source: TimestampSource,
}

fn default_sampling_interval() -> f64 {
    -1.0
}

fn default_queue_size() -> u32 {
    1
}

impl Default for ItemDefaults {
    fn default() -> Self {
        Self {
            sampling_interval_ms: default_sampling_interval(),
            queue_size: default_queue_size(),
            discard_oldest: true,
            timestamp_source: TimestampSource::default(),
        }
    }
}

// =============================================================================
// ItemSpec / ItemOptions
// =============================================================================

/// One configured item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    /// Host-side name.
    pub name: String,

    /// Addressing expression.
    pub path: String,

    /// Data flow direction.
    pub direction: Direction,

    /// Local storage type.
    pub local_type: LocalType,

    /// Array capacity; absent for scalars.
    #[serde(default)]
    pub array_size: Option<usize>,

    /// Host pickup mode.
    #[serde(default)]
    pub scan: ScanMode,

    /// Per-item overrides.
    #[serde(default)]
    pub options: ItemOptions,
}

impl ItemSpec {
    /// Creates a scalar item spec with default options.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        direction: Direction,
        local_type: LocalType,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            direction,
            local_type,
            array_size: None,
            scan: ScanMode::default(),
            options: ItemOptions::default(),
        }
    }

    /// Makes the item an array of the given capacity.
    pub fn array(mut self, capacity: usize) -> Self {
        self.array_size = Some(capacity);
        self
    }

    /// Sets the scan mode.
    pub fn scan(mut self, scan: ScanMode) -> Self {
        self.scan = scan;
        self
    }

    /// Converts to a registration request.
    pub fn to_definition(&self) -> ItemDefinition {
        ItemDefinition {
            name: self.name.clone(),
            path: self.path.clone(),
            direction: self.direction,
            local_type: self.local_type,
            array_capacity: self.array_size,
            scan: self.scan,
            options: self.options.clone(),
        }
    }
}

/// Queue overflow policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardPolicy {
    /// Drop the oldest queued value.
    Oldest,
    /// Drop the newest value.
    Newest,
}

impl DiscardPolicy {
    /// Returns `true` for [`DiscardPolicy::Oldest`].
    pub fn is_oldest(self) -> bool {
        matches!(self, Self::Oldest)
    }
}

/// Per-item overrides of the process defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemOptions {
    /// Sampling interval in ms.
    #[serde(default)]
    pub sampling_interval_ms: Option<f64>,

    /// Queue depth.
    #[serde(default)]
    pub queue_size: Option<u32>,

    /// Overflow policy.
    #[serde(default)]
    pub discard: Option<DiscardPolicy>,

    /// Timestamp source.
    #[serde(default)]
    pub timestamp_source: Option<TimestampSource>,

    /// Field extracted from structured values.
    #[serde(default)]
    pub element: Option<String>,
}

impl ItemOptions {
    /// Host info key for the sampling interval.
    pub const SAMPLING_KEY: &'static str = "opcua:SAMPLING";
    /// Host info key for the queue size.
    pub const QUEUE_SIZE_KEY: &'static str = "opcua:QSIZE";
    /// Host info key for the discard policy.
    pub const DISCARD_KEY: &'static str = "opcua:DISCARD";
    /// Host info key for the element name.
    pub const ELEMENT_KEY: &'static str = "opcua:ELEMENT";

    /// Builds options from host info key/value pairs.
    ///
    /// Unknown keys are ignored. A discard value starting with `new`
    /// (any case) selects discard-newest; anything else keeps the default.
    pub fn from_info_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            let invalid = || ConfigError::InvalidOption {
                key: key.to_string(),
                value: value.to_string(),
            };
            match key {
                Self::SAMPLING_KEY => {
                    options.sampling_interval_ms =
                        Some(value.trim().parse::<f64>().map_err(|_| invalid())?);
                }
                Self::QUEUE_SIZE_KEY => {
                    options.queue_size = Some(value.trim().parse::<u32>().map_err(|_| invalid())?);
                }
                Self::DISCARD_KEY => {
                    let newest = value
                        .get(..3)
                        .map(|p| p.eq_ignore_ascii_case("new"))
                        .unwrap_or(false);
                    if newest {
                        options.discard = Some(DiscardPolicy::Newest);
                    }
                }
                Self::ELEMENT_KEY => options.element = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(options)
    }
}

// =============================================================================
// Tests
// =============================================================================
