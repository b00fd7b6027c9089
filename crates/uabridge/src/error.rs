// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge error types with diagnostics.
//!
//! Errors are grouped by the part of the bridge that raises them, so a caller
//! can decide whether a failure is local to one item or global to the session.
//!
//! # Error Categories
//!
//! ```text
//! BridgeError
//! ├── Path          - Malformed item path (per item, permanent)
//! ├── Resolution    - Server could not translate a path or id (per item)
//! ├── Connection    - Session connect/transport failures (global, retried)
//! ├── Subscription  - Subscription and monitored item failures (global)
//! ├── Coercion      - Wire value cannot be represented locally (per notification)
//! ├── Item          - Registration, lookup and write failures (per item)
//! └── Config        - Invalid configuration (startup)
//! ```
//!
//! # Examples
//!
//! ```
//! use uabridge::error::{BridgeError, ConnectionError};
//!
//! let error = BridgeError::from(ConnectionError::refused("opc.tcp://plc:4840", "timeout"));
//! assert!(error.is_retryable());
//! assert_eq!(error.category(), "connection");
//! ```

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::Level;

use crate::item::{ItemIndex, LocalType};
use crate::types::{StatusCode, WireType};

/// Result alias used throughout the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;

// =============================================================================
// BridgeError
// =============================================================================

/// The main error type of the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Malformed item path.
    #[error("{0}")]
    Path(#[from] PathError),

    /// Remote translation or validation of a handle failed.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// Session connection failure.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Subscription or monitored item failure.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Value coercion failure.
    #[error("{0}")]
    Coercion(#[from] CoercionError),

    /// Item registration, lookup or write failure.
    #[error("{0}")]
    Item(#[from] ItemError),

    /// Configuration failure.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl BridgeError {
    /// Returns `true` if retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Subscription(e) => e.is_retryable(),
            Self::Resolution(ResolutionError::ServiceFailed { .. }) => true,
            Self::Item(ItemError::WriteRejected { .. }) => true,
            _ => false,
        }
    }

    /// Returns `true` if the error concerns the whole session rather than one item.
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Subscription(_)
                | Self::Resolution(ResolutionError::ServiceFailed { .. })
        )
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Path(_) => ErrorSeverity::Error,
            Self::Resolution(_) => ErrorSeverity::Warning,
            Self::Connection(ConnectionError::ShuttingDown) => ErrorSeverity::Info,
            Self::Connection(_) => ErrorSeverity::Warning,
            Self::Subscription(_) => ErrorSeverity::Error,
            Self::Coercion(_) => ErrorSeverity::Warning,
            Self::Item(_) => ErrorSeverity::Warning,
            Self::Config(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Resolution(_) => "resolution",
            Self::Connection(_) => "connection",
            Self::Subscription(_) => "subscription",
            Self::Coercion(_) => "coercion",
            Self::Item(_) => "item",
            Self::Config(_) => "config",
        }
    }

    /// Returns a unique code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Path(e) => e.error_code(),
            Self::Resolution(e) => e.error_code(),
            Self::Connection(e) => e.error_code(),
            Self::Subscription(e) => e.error_code(),
            Self::Coercion(e) => e.error_code(),
            Self::Item(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
        }
    }

    /// Returns the tracing level matching this error's severity.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with its code and category.
    pub fn log(&self, context: &str) {
        let code = self.error_code();
        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
        }
    }
}

// =============================================================================
// PathError
// =============================================================================

/// Malformed item path. The item stays unresolved until the process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path is empty.
    #[error("Item path is empty")]
    Empty,

    /// Neither `:` nor `,` follows the namespace.
    #[error("Item path '{path}' has no namespace delimiter (':' or ',')")]
    MissingDelimiter {
        /// The offending path.
        path: String,
    },

    /// Nothing precedes the delimiter.
    #[error("Item path '{path}' has an empty namespace")]
    MissingNamespace {
        /// The offending path.
        path: String,
    },

    /// The namespace is not an unsigned 16-bit number.
    #[error("Item path '{path}' has invalid namespace '{namespace}'")]
    InvalidNamespace {
        /// The offending path.
        path: String,
        /// The namespace text.
        namespace: String,
    },

    /// A browse segment names namespace 0.
    #[error("Item path '{path}' uses reserved namespace 0 in a browse segment")]
    ZeroNamespace {
        /// The offending path.
        path: String,
    },

    /// A browse segment has no name.
    #[error("Item path '{path}' has an empty browse segment")]
    EmptySegment {
        /// The offending path.
        path: String,
    },

    /// A direct identifier is empty.
    #[error("Item path '{path}' has an empty identifier")]
    EmptyIdentifier {
        /// The offending path.
        path: String,
    },
}

impl PathError {
    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::Empty => 1,
            Self::MissingDelimiter { .. } => 2,
            Self::MissingNamespace { .. } => 3,
            Self::InvalidNamespace { .. } => 4,
            Self::ZeroNamespace { .. } => 5,
            Self::EmptySegment { .. } => 6,
            Self::EmptyIdentifier { .. } => 7,
        };
        ErrorCode::new(1, code)
    }
}

// =============================================================================
// ResolutionError
// =============================================================================

/// The server could not produce a handle for an item.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// The path or identifier does not name a node on the server.
    #[error("Item {index} '{path}' not found on server ({status})")]
    NotFound {
        /// Item index.
        index: ItemIndex,
        /// Item path.
        path: String,
        /// Status returned by the server.
        status: StatusCode,
    },

    /// The item has no handle in the current wiring.
    #[error("Item {index} is not resolved")]
    Unresolved {
        /// Item index.
        index: ItemIndex,
    },

    /// The translate or validation service call itself failed.
    #[error("Resolution service failed: {message}")]
    ServiceFailed {
        /// Failure description.
        message: String,
    },
}

impl ResolutionError {
    /// Creates a service failure.
    pub fn service_failed(message: impl Into<String>) -> Self {
        Self::ServiceFailed {
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::NotFound { .. } => 1,
            Self::Unresolved { .. } => 2,
            Self::ServiceFailed { .. } => 3,
        };
        ErrorCode::new(2, code)
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Session connection failures.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// Connect attempt failed.
    #[error("Connection to '{endpoint}' failed: {reason}")]
    Refused {
        /// Server endpoint.
        endpoint: String,
        /// Failure description.
        reason: String,
    },

    /// Operation requires a connected session.
    #[error("Session is not connected")]
    NotConnected,

    /// Session was closed.
    #[error("Session closed: {reason}")]
    Closed {
        /// Close reason.
        reason: String,
    },

    /// Service call failed at transport level.
    #[error("Service call '{service}' failed: {status}")]
    ServiceFault {
        /// Service name.
        service: &'static str,
        /// Status returned.
        status: StatusCode,
    },

    /// The bridge is shutting down.
    #[error("Bridge is shutting down")]
    ShuttingDown,
}

impl ConnectionError {
    /// Creates a refused connection error.
    pub fn refused(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a closed session error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the connection may recover on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ShuttingDown)
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::Refused { .. } => 1,
            Self::NotConnected => 2,
            Self::Closed { .. } => 3,
            Self::ServiceFault { .. } => 4,
            Self::ShuttingDown => 5,
        };
        ErrorCode::new(3, code)
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitored item failures.
#[derive(Debug, Clone, Error)]
pub enum SubscriptionError {
    /// Creating the shared subscription failed.
    #[error("Failed to create subscription: {message}")]
    CreateFailed {
        /// Failure description.
        message: String,
    },

    /// The monitored item service call failed.
    #[error("Failed to create monitored items on subscription {subscription_id}: {message}")]
    MonitoredItemsFailed {
        /// Subscription id.
        subscription_id: u32,
        /// Failure description.
        message: String,
    },

    /// The subscription id is unknown to the server.
    #[error("Subscription {subscription_id} not found")]
    NotFound {
        /// Subscription id.
        subscription_id: u32,
    },
}

impl SubscriptionError {
    /// Creates a creation failure.
    pub fn create_failed(message: impl Into<String>) -> Self {
        Self::CreateFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if the call may succeed after reconnecting.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::CreateFailed { .. } => 1,
            Self::MonitoredItemsFailed { .. } => 2,
            Self::NotFound { .. } => 3,
        };
        ErrorCode::new(4, code)
    }
}

// =============================================================================
// CoercionError
// =============================================================================

/// A wire value cannot be represented in local storage, or the reverse.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    /// The table has no conversion for this pair.
    #[error("Cannot convert {wire} to local {local}")]
    TypeMismatch {
        /// Wire type.
        wire: WireType,
        /// Local type.
        local: LocalType,
    },

    /// A scalar arrived for an array item or the reverse.
    #[error("Shape mismatch: item expects {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected shape.
        expected: &'static str,
        /// Received shape.
        actual: &'static str,
    },

    /// An array is longer than the item's fixed capacity.
    #[error("Array of {len} elements exceeds capacity {capacity}")]
    ArrayCapacityExceeded {
        /// Incoming length.
        len: usize,
        /// Item capacity.
        capacity: usize,
    },

    /// A numeric value does not fit the target type.
    #[error("Value {value} out of range for {target}")]
    OutOfRange {
        /// Value text.
        value: String,
        /// Target type name.
        target: &'static str,
    },

    /// A string could not be parsed as the target type.
    #[error("Cannot parse '{value}' as {target}")]
    Unparsable {
        /// Value text.
        value: String,
        /// Target type name.
        target: &'static str,
    },

    /// The configured element is missing from a structured value.
    #[error("Element '{element}' not found in structured value")]
    MissingElement {
        /// Element name.
        element: String,
    },

    /// The wire type is not part of the supported set.
    #[error("Unsupported wire value '{type_name}'")]
    UnsupportedWireValue {
        /// Variant name.
        type_name: &'static str,
    },

    /// Any other failure on the notification path.
    #[error("Unexpected coercion failure: {message}")]
    Unexpected {
        /// Failure description.
        message: String,
    },
}

impl CoercionError {
    /// Creates an out-of-range error.
    pub fn out_of_range(value: impl fmt::Display, target: &'static str) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            target,
        }
    }

    /// Creates an unexpected failure.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::TypeMismatch { .. } => 1,
            Self::ShapeMismatch { .. } => 2,
            Self::ArrayCapacityExceeded { .. } => 3,
            Self::OutOfRange { .. } => 4,
            Self::Unparsable { .. } => 5,
            Self::MissingElement { .. } => 6,
            Self::UnsupportedWireValue { .. } => 7,
            Self::Unexpected { .. } => 8,
        };
        ErrorCode::new(5, code)
    }
}

// =============================================================================
// ItemError
// =============================================================================

/// Item registration, lookup and write failures.
#[derive(Debug, Clone, Error)]
pub enum ItemError {
    /// The path exceeds the fixed path buffer.
    #[error("Item path of {len} bytes exceeds the limit of {max}")]
    PathTooLong {
        /// Path length.
        len: usize,
        /// Maximum length.
        max: usize,
    },

    /// An array item was declared with zero capacity.
    #[error("Array item '{path}' needs a non-zero capacity")]
    ZeroCapacity {
        /// Item path.
        path: String,
    },

    /// No item has this index.
    #[error("No item with index {index}")]
    UnknownIndex {
        /// Requested index.
        index: ItemIndex,
    },

    /// Input items are not written by the host.
    #[error("Item {index} is an input and cannot be written")]
    NotWritable {
        /// Item index.
        index: ItemIndex,
    },

    /// The server rejected a write.
    #[error("Write to item {index} rejected with {status}")]
    WriteRejected {
        /// Item index.
        index: ItemIndex,
        /// Status returned.
        status: StatusCode,
    },
}

impl ItemError {
    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::PathTooLong { .. } => 1,
            Self::ZeroCapacity { .. } => 2,
            Self::UnknownIndex { .. } => 3,
            Self::NotWritable { .. } => 4,
            Self::WriteRejected { .. } => 5,
        };
        ErrorCode::new(6, code)
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension does not name a known format.
    #[error("Unsupported configuration format '{extension}'")]
    UnsupportedFormat {
        /// File extension.
        extension: String,
    },

    /// The document could not be parsed.
    #[error("Configuration parse error: {message}")]
    Parse {
        /// Parser message.
        message: String,
    },

    /// A field holds an invalid value.
    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },

    /// A host info option could not be parsed.
    #[error("Invalid item option {key}='{value}'")]
    InvalidOption {
        /// Option key.
        key: String,
        /// Option value.
        value: String,
    },

    /// The coercion table misses wire/local combinations.
    #[error("Coercion table is missing {} combination(s): {}", missing.len(), missing.join(", "))]
    IncompleteCoercionTable {
        /// Missing pairs, formatted as `wire->local`.
        missing: Vec<String>,
    },
}

impl ConfigError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse {
            message: message.to_string(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::Io { .. } => 1,
            Self::UnsupportedFormat { .. } => 2,
            Self::Parse { .. } => 3,
            Self::InvalidField { .. } => 4,
            Self::InvalidOption { .. } => 5,
            Self::IncompleteCoercionTable { .. } => 6,
        };
        ErrorCode::new(7, code)
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational.
    Info,
    /// Recoverable without intervention.
    Warning,
    /// Needs attention.
    Error,
    /// Startup cannot proceed.
    Critical,
}

impl ErrorSeverity {
    /// Converts to a tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code, formatted as `UB-XXYY`.
///
/// Categories: 1 path, 2 resolution, 3 connection, 4 subscription,
/// 5 coercion, 6 item, 7 config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category.
    pub category: u8,
    /// Code within the category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the code packed as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UB-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Tests
// =============================================================================
