// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Wire-level types exchanged with the remote session.
//!
//! These mirror the small subset of the OPC UA data model the bridge needs:
//! node identifiers, status codes, variant values and data values.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// NodeId
// =============================================================================

/// Identifier of a node on the remote server.
///
/// # Examples
///
/// ```
/// use uabridge::types::NodeId;
///
/// let node = NodeId::numeric(2, 1001);
/// assert_eq!(node.to_string(), "ns=2;i=1001");
///
/// let node = NodeId::string(3, "Pump.Speed");
/// assert_eq!(node.to_string(), "ns=3;s=Pump.Speed");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = standard namespace).
    pub namespace_index: u16,

    /// The identifier within the namespace.
    pub identifier: Identifier,
}

impl NodeId {
    /// Objects folder (ns=0, i=85), the start of every browse path.
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: Identifier::Numeric(85),
    };

    /// HierarchicalReferences reference type (ns=0, i=33).
    pub const HIERARCHICAL_REFERENCES: NodeId = NodeId {
        namespace_index: 0,
        identifier: Identifier::Numeric(33),
    };

    /// Creates a numeric node id.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::Numeric(value),
        }
    }

    /// Creates a string node id.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::String(value.into()),
        }
    }

    /// Returns `true` for a numeric identifier.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self.identifier, Identifier::Numeric(_))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(v) => write!(f, "ns={};i={}", self.namespace_index, v),
            Identifier::String(v) => write!(f, "ns={};s={}", self.namespace_index, v),
        }
    }
}

/// Node identifier value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(String),
}

// =============================================================================
// StatusCode
// =============================================================================

/// OPC UA status code. The two top bits carry the severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Good.
    pub const GOOD: StatusCode = StatusCode(0);
    /// Generic bad status.
    pub const BAD: StatusCode = StatusCode(0x8000_0000);
    /// Communication with the server failed.
    pub const BAD_COMMUNICATION_ERROR: StatusCode = StatusCode(0x8005_0000);
    /// Node id unknown to the server.
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    /// Browse path matched nothing.
    pub const BAD_NO_MATCH: StatusCode = StatusCode(0x806F_0000);
    /// Value type rejected by the server.
    pub const BAD_TYPE_MISMATCH: StatusCode = StatusCode(0x8074_0000);
    /// Session is not connected.
    pub const BAD_NOT_CONNECTED: StatusCode = StatusCode(0x808A_0000);

    /// Returns `true` if the severity is good.
    #[inline]
    pub fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` if the severity is uncertain.
    #[inline]
    pub fn is_uncertain(self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Returns `true` if the severity is bad.
    #[inline]
    pub fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns a symbolic name for well-known codes.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::GOOD => Some("Good"),
            Self::BAD => Some("Bad"),
            Self::BAD_COMMUNICATION_ERROR => Some("BadCommunicationError"),
            Self::BAD_NODE_ID_UNKNOWN => Some("BadNodeIdUnknown"),
            Self::BAD_NO_MATCH => Some("BadNoMatch"),
            Self::BAD_TYPE_MISMATCH => Some("BadTypeMismatch"),
            Self::BAD_NOT_CONNECTED => Some("BadNotConnected"),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

// =============================================================================
// WireType
// =============================================================================

/// Scalar wire types the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WireType {
    /// Boolean.
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
    /// Date and time.
    DateTime,
}

impl WireType {
    /// Every wire type, in built-in type id order.
    pub const ALL: [WireType; 13] = [
        WireType::Boolean,
        WireType::SByte,
        WireType::Byte,
        WireType::Int16,
        WireType::UInt16,
        WireType::Int32,
        WireType::UInt32,
        WireType::Int64,
        WireType::UInt64,
        WireType::Float,
        WireType::Double,
        WireType::String,
        WireType::DateTime,
    ];

    /// Returns the OPC UA built-in type id.
    pub fn type_id(self) -> u32 {
        match self {
            Self::Boolean => 1,
            Self::SByte => 2,
            Self::Byte => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float => 10,
            Self::Double => 11,
            Self::String => 12,
            Self::DateTime => 13,
        }
    }

    /// Returns the type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
        }
    }

    /// Returns `true` for integer and floating point types.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Boolean | Self::String | Self::DateTime)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// UaValue
// =============================================================================

/// A variant value as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UaValue {
    /// Empty variant.
    Null,
    /// Boolean.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// String.
    String(String),
    /// Date and time.
    DateTime(DateTime<Utc>),
    /// One-dimensional array.
    Array(Vec<UaValue>),
    /// Flat structure of named fields.
    Structure(Vec<(String, UaValue)>),
}

impl UaValue {
    /// Returns the scalar wire type, or `None` for null, arrays and structures.
    pub fn wire_type(&self) -> Option<WireType> {
        Some(match self {
            Self::Boolean(_) => WireType::Boolean,
            Self::SByte(_) => WireType::SByte,
            Self::Byte(_) => WireType::Byte,
            Self::Int16(_) => WireType::Int16,
            Self::UInt16(_) => WireType::UInt16,
            Self::Int32(_) => WireType::Int32,
            Self::UInt32(_) => WireType::UInt32,
            Self::Int64(_) => WireType::Int64,
            Self::UInt64(_) => WireType::UInt64,
            Self::Float(_) => WireType::Float,
            Self::Double(_) => WireType::Double,
            Self::String(_) => WireType::String,
            Self::DateTime(_) => WireType::DateTime,
            Self::Null | Self::Array(_) | Self::Structure(_) => return None,
        })
    }

    /// Returns the variant name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Array(_) => "Array",
            Self::Structure(_) => "Structure",
            other => other.wire_type().map(WireType::name).unwrap_or("Unknown"),
        }
    }

    /// Returns `true` for arrays.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns a named field of a structure.
    pub fn field(&self, name: &str) -> Option<&UaValue> {
        match self {
            Self::Structure(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for UaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Array(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
            Self::Structure(fields) => {
                f.write_str("{")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

// =============================================================================
// DataValue
// =============================================================================

/// A value with status and timestamps, as delivered by reads and notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    /// The value, absent on bad status.
    pub value: Option<UaValue>,

    /// Status of the value.
    pub status: StatusCode,

    /// Time the server processed the value.
    pub server_timestamp: Option<DateTime<Utc>>,

    /// Time the source produced the value.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Creates a good value stamped with the current time.
    pub fn good(value: UaValue) -> Self {
        let now = Utc::now();
        Self {
            value: Some(value),
            status: StatusCode::GOOD,
            server_timestamp: Some(now),
            source_timestamp: Some(now),
        }
    }

    /// Creates a value carrying only a bad status.
    pub fn bad(status: StatusCode) -> Self {
        Self {
            value: None,
            status,
            server_timestamp: Some(Utc::now()),
            source_timestamp: None,
        }
    }

    /// Sets both timestamps.
    pub fn with_timestamps(
        mut self,
        server: Option<DateTime<Utc>>,
        source: Option<DateTime<Utc>>,
    ) -> Self {
        self.server_timestamp = server;
        self.source_timestamp = source;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
