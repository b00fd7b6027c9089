// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Items: one binding between a local variable and one remote node.
//!
//! # Lock discipline
//!
//! Storage, status, remote type, timestamp and echo state form a single
//! consistency unit guarded by the item's own mutex. Every access goes
//! through [`Item::with_state`] (or [`Item::read`]), which locks, runs a
//! closure and unlocks. The closure must not block or await, and no code
//! holds two item locks at once.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{ItemDefaults, ItemOptions};
use crate::echo::EchoState;
use crate::error::CoercionError;
use crate::types::WireType;

/// Longest accepted item path in bytes.
pub const MAX_PATH_LEN: usize = 127;

/// Capacity of string storage in bytes.
pub const STRING_CAPACITY: usize = 80;

// =============================================================================
// ItemIndex
// =============================================================================

/// Stable position of an item in the registry. Doubles as the client handle
/// of its monitored item, so notifications map back to the item directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemIndex(u32);

impl ItemIndex {
    /// Creates an index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Returns the index as a slice position.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the monitored item client handle for this item.
    #[inline]
    pub fn client_handle(self) -> u32 {
        self.0
    }

    /// Maps a monitored item client handle back to an index.
    #[inline]
    pub fn from_client_handle(handle: u32) -> Self {
        Self(handle)
    }
}

impl fmt::Display for ItemIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Direction of data flow for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Updated by notifications, read by the host.
    Input,
    /// Written by the host, may be echoed back.
    Output,
}

impl Direction {
    /// Returns `true` for output items.
    #[inline]
    pub fn is_output(self) -> bool {
        matches!(self, Self::Output)
    }
}

/// How the host picks up new values of an input item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// The host polls periodically; dispatch leaves the value in storage.
    #[default]
    Periodic,
    /// The host wants a rescan request on every change.
    Event,
}

/// Which remote timestamp is attached to a dispatched value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Time the server processed the value.
    #[default]
    Server,
    /// Time the source device produced the value.
    Source,
}

/// Outcome of the last operation on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Last operation succeeded.
    Good,
    /// Last operation failed or no value has arrived yet.
    #[default]
    Bad,
}

impl ItemStatus {
    /// Returns `true` if good.
    #[inline]
    pub fn is_good(self) -> bool {
        matches!(self, Self::Good)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => f.write_str("Good"),
            Self::Bad => f.write_str("Bad"),
        }
    }
}

// =============================================================================
// LocalType / LocalScalar / LocalValue
// =============================================================================

/// Local storage representation of an item (element type for arrays).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalType {
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Fixed-capacity string.
    String,
}

impl LocalType {
    /// Every local type.
    pub const ALL: [LocalType; 9] = [
        LocalType::Int8,
        LocalType::UInt8,
        LocalType::Int16,
        LocalType::UInt16,
        LocalType::Int32,
        LocalType::UInt32,
        LocalType::Float32,
        LocalType::Float64,
        LocalType::String,
    ];

    /// Returns the type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
        }
    }

    /// Wire type used for writes before the remote type is known.
    pub fn natural_wire_type(self) -> WireType {
        match self {
            Self::Int8 => WireType::SByte,
            Self::UInt8 => WireType::Byte,
            Self::Int16 => WireType::Int16,
            Self::UInt16 => WireType::UInt16,
            Self::Int32 => WireType::Int32,
            Self::UInt32 => WireType::UInt32,
            Self::Float32 => WireType::Float,
            Self::Float64 => WireType::Double,
            Self::String => WireType::String,
        }
    }
}

impl fmt::Display for LocalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value in local representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalScalar {
    /// Signed 8-bit integer.
    Int8(i8),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// String of at most [`STRING_CAPACITY`] bytes.
    String(String),
}

impl LocalScalar {
    /// Returns the zero value of a local type.
    pub fn zero(local_type: LocalType) -> Self {
        match local_type {
            LocalType::Int8 => Self::Int8(0),
            LocalType::UInt8 => Self::UInt8(0),
            LocalType::Int16 => Self::Int16(0),
            LocalType::UInt16 => Self::UInt16(0),
            LocalType::Int32 => Self::Int32(0),
            LocalType::UInt32 => Self::UInt32(0),
            LocalType::Float32 => Self::Float32(0.0),
            LocalType::Float64 => Self::Float64(0.0),
            LocalType::String => Self::String(String::new()),
        }
    }

    /// Returns the local type of this value.
    pub fn local_type(&self) -> LocalType {
        match self {
            Self::Int8(_) => LocalType::Int8,
            Self::UInt8(_) => LocalType::UInt8,
            Self::Int16(_) => LocalType::Int16,
            Self::UInt16(_) => LocalType::UInt16,
            Self::Int32(_) => LocalType::Int32,
            Self::UInt32(_) => LocalType::UInt32,
            Self::Float32(_) => LocalType::Float32,
            Self::Float64(_) => LocalType::Float64,
            Self::String(_) => LocalType::String,
        }
    }
}

impl fmt::Display for LocalScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int8(v) => write!(f, "{}", v),
            Self::UInt8(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Float32(v) => write!(f, "{}", v),
            Self::Float64(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "'{}'", v),
        }
    }
}

/// A complete item value: one scalar or an array prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalValue {
    /// Scalar value.
    Scalar(LocalScalar),
    /// Array value, at most the item's capacity long.
    Array(Vec<LocalScalar>),
}

impl LocalValue {
    /// Returns `true` for arrays.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns the scalar, if this is one.
    pub fn as_scalar(&self) -> Option<&LocalScalar> {
        match self {
            Self::Scalar(v) => Some(v),
            Self::Array(_) => None,
        }
    }

    /// Returns the elements of an array or the scalar as a one-element slice.
    pub fn elements(&self) -> &[LocalScalar] {
        match self {
            Self::Scalar(v) => std::slice::from_ref(v),
            Self::Array(values) => values,
        }
    }

    pub(crate) fn shape_name(&self) -> &'static str {
        if self.is_array() {
            "array"
        } else {
            "scalar"
        }
    }
}

impl From<LocalScalar> for LocalValue {
    fn from(value: LocalScalar) -> Self {
        Self::Scalar(value)
    }
}

impl fmt::Display for LocalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{}", v),
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
        }
    }
}

/// Wire type last observed for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteType {
    /// Scalar or element wire type.
    pub wire_type: WireType,
    /// Whether the remote value is an array.
    pub is_array: bool,
}

impl RemoteType {
    /// Creates a scalar remote type.
    pub fn scalar(wire_type: WireType) -> Self {
        Self {
            wire_type,
            is_array: false,
        }
    }

    /// Creates an array remote type.
    pub fn array(wire_type: WireType) -> Self {
        Self {
            wire_type,
            is_array: true,
        }
    }
}

impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array {
            write!(f, "{}[]", self.wire_type)
        } else {
            write!(f, "{}", self.wire_type)
        }
    }
}

// =============================================================================
// ItemSettings / ItemDefinition
// =============================================================================

/// Effective monitoring settings of one item, after applying defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSettings {
    /// Sampling interval in milliseconds; negative means the publishing interval.
    pub sampling_interval_ms: f64,
    /// Server-side queue depth.
    pub queue_size: u32,
    /// Drop the oldest queued value on overflow.
    pub discard_oldest: bool,
    /// Timestamp attached to dispatched values.
    pub timestamp_source: TimestampSource,
    /// Field extracted from structured values.
    pub element: Option<String>,
    /// Host pickup mode for input items.
    pub scan: ScanMode,
}

impl ItemSettings {
    /// Merges per-item options over process defaults.
    pub fn resolve(options: &ItemOptions, scan: ScanMode, defaults: &ItemDefaults) -> Self {
        Self {
            sampling_interval_ms: options
                .sampling_interval_ms
                .unwrap_or(defaults.sampling_interval_ms),
            queue_size: options.queue_size.unwrap_or(defaults.queue_size),
            discard_oldest: options
                .discard
                .map(|d| d.is_oldest())
                .unwrap_or(defaults.discard_oldest),
            timestamp_source: options.timestamp_source.unwrap_or(defaults.timestamp_source),
            element: options.element.clone(),
            scan,
        }
    }
}

/// Everything needed to register an item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDefinition {
    /// Host-side name, used in logs and reports.
    pub name: String,
    /// Addressing expression.
    pub path: String,
    /// Data flow direction.
    pub direction: Direction,
    /// Local storage type.
    pub local_type: LocalType,
    /// Array capacity; `None` for scalars.
    pub array_capacity: Option<usize>,
    /// Host pickup mode.
    pub scan: ScanMode,
    /// Per-item overrides.
    pub options: ItemOptions,
}

impl ItemDefinition {
    /// Creates a scalar definition named after its path.
    pub fn new(path: impl Into<String>, direction: Direction, local_type: LocalType) -> Self {
        let path = path.into();
        Self {
            name: path.clone(),
            path,
            direction,
            local_type,
            array_capacity: None,
            scan: ScanMode::default(),
            options: ItemOptions::default(),
        }
    }

    /// Sets the host-side name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Makes the item an array of the given capacity.
    pub fn array(mut self, capacity: usize) -> Self {
        self.array_capacity = Some(capacity);
        self
    }

    /// Sets the scan mode.
    pub fn scan(mut self, scan: ScanMode) -> Self {
        self.scan = scan;
        self
    }

    /// Sets the per-item options.
    pub fn options(mut self, options: ItemOptions) -> Self {
        self.options = options;
        self
    }
}

// =============================================================================
// ItemStorage / ItemState
// =============================================================================

/// Fixed-size value buffer owned by one item. Allocated once, never resized.
#[derive(Debug, Clone)]
pub struct ItemStorage {
    data: Box<[LocalScalar]>,
    len: usize,
    is_array: bool,
}

impl ItemStorage {
    fn new(local_type: LocalType, capacity: usize, is_array: bool) -> Self {
        let slots = if is_array { capacity } else { 1 };
        Self {
            data: vec![LocalScalar::zero(local_type); slots].into_boxed_slice(),
            len: if is_array { 0 } else { 1 },
            is_array,
        }
    }

    /// Returns the stored value.
    pub fn value(&self) -> LocalValue {
        if self.is_array {
            LocalValue::Array(self.data[..self.len].to_vec())
        } else {
            LocalValue::Scalar(self.data[0].clone())
        }
    }

    /// Number of valid elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no element is valid.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fixed number of slots.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Copies a checked value into the buffer.
    ///
    /// The value must have passed [`Item::check_value`]; nothing is written
    /// when the shape or length does not fit.
    pub fn commit(&mut self, value: &LocalValue) -> Result<(), CoercionError> {
        match (value, self.is_array) {
            (LocalValue::Scalar(v), false) => {
                self.data[0] = v.clone();
                Ok(())
            }
            (LocalValue::Array(values), true) => {
                if values.len() > self.data.len() {
                    return Err(CoercionError::ArrayCapacityExceeded {
                        len: values.len(),
                        capacity: self.data.len(),
                    });
                }
                for (slot, v) in self.data.iter_mut().zip(values) {
                    *slot = v.clone();
                }
                self.len = values.len();
                Ok(())
            }
            (value, _) => Err(CoercionError::ShapeMismatch {
                expected: if self.is_array { "array" } else { "scalar" },
                actual: value.shape_name(),
            }),
        }
    }
}

/// Mutable part of an item, guarded by the item lock.
#[derive(Debug, Clone)]
pub struct ItemState {
    /// Value buffer.
    pub storage: ItemStorage,
    /// Last observed wire type.
    pub remote_type: Option<RemoteType>,
    /// Echo suppression bit.
    pub echo: EchoState,
    /// Outcome of the last operation.
    pub status: ItemStatus,
    /// Time attached to the current value.
    pub timestamp: Option<DateTime<Utc>>,
    /// Description of the last failure.
    pub last_error: Option<String>,
}

impl ItemState {
    /// Marks the state bad and records why.
    pub fn set_bad(&mut self, reason: impl Into<String>) {
        self.status = ItemStatus::Bad;
        self.last_error = Some(reason.into());
    }

    /// Marks the state good.
    pub fn set_good(&mut self) {
        self.status = ItemStatus::Good;
        self.last_error = None;
    }
}

/// Snapshot returned to the host by a read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReading {
    /// Stored value.
    pub value: LocalValue,
    /// Item status.
    pub status: ItemStatus,
    /// Time attached to the value.
    pub timestamp: Option<DateTime<Utc>>,
    /// Last observed wire type.
    pub remote_type: Option<RemoteType>,
}

// =============================================================================
// Item
// =============================================================================

/// One local-to-remote binding.
#[derive(Debug)]
pub struct Item {
    index: ItemIndex,
    name: String,
    path: String,
    direction: Direction,
    local_type: LocalType,
    capacity: usize,
    is_array: bool,
    settings: ItemSettings,
    state: Mutex<ItemState>,
}

impl Item {
    pub(crate) fn new(index: ItemIndex, definition: ItemDefinition, settings: ItemSettings) -> Self {
        let is_array = definition.array_capacity.is_some();
        let capacity = definition.array_capacity.unwrap_or(1);
        Self {
            index,
            name: definition.name,
            path: definition.path,
            direction: definition.direction,
            local_type: definition.local_type,
            capacity,
            is_array,
            settings,
            state: Mutex::new(ItemState {
                storage: ItemStorage::new(definition.local_type, capacity, is_array),
                remote_type: None,
                echo: EchoState::Quiet,
                status: ItemStatus::Bad,
                timestamp: None,
                last_error: None,
            }),
        }
    }

    /// Registry index.
    pub fn index(&self) -> ItemIndex {
        self.index
    }

    /// Host-side name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Addressing expression.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Data flow direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Local storage type.
    pub fn local_type(&self) -> LocalType {
        self.local_type
    }

    /// Fixed capacity (1 for scalars).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the item stores an array.
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Effective monitoring settings.
    pub fn settings(&self) -> &ItemSettings {
        &self.settings
    }

    /// Runs `f` with the item lock held.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ItemState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    /// Returns the stored value, status and timestamp.
    pub fn read(&self) -> ItemReading {
        self.with_state(|state| ItemReading {
            value: state.storage.value(),
            status: state.status,
            timestamp: state.timestamp,
            remote_type: state.remote_type,
        })
    }

    /// Current status.
    pub fn status(&self) -> ItemStatus {
        self.with_state(|state| state.status)
    }

    /// Last observed wire type.
    pub fn remote_type(&self) -> Option<RemoteType> {
        self.with_state(|state| state.remote_type)
    }

    /// Checks that a host value fits this item's type, shape and capacity.
    pub fn check_value(&self, value: &LocalValue) -> Result<(), CoercionError> {
        if value.is_array() != self.is_array {
            return Err(CoercionError::ShapeMismatch {
                expected: if self.is_array { "array" } else { "scalar" },
                actual: value.shape_name(),
            });
        }
        let elements = value.elements();
        if elements.len() > self.capacity {
            return Err(CoercionError::ArrayCapacityExceeded {
                len: elements.len(),
                capacity: self.capacity,
            });
        }
        match elements.iter().find(|v| v.local_type() != self.local_type) {
            Some(other) => Err(CoercionError::unexpected(format!(
                "value of type {} written to {} item",
                other.local_type(),
                self.local_type
            ))),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(definition: ItemDefinition) -> Item {
        let settings =
            ItemSettings::resolve(&definition.options, definition.scan, &ItemDefaults::default());
        Item::new(ItemIndex::new(0), definition, settings)
    }

    #[test]
    fn test_new_item_is_bad_and_zeroed() {
        let item = item(ItemDefinition::new("2,7", Direction::Input, LocalType::Int32));
        let reading = item.read();
        assert_eq!(reading.status, ItemStatus::Bad);
        assert_eq!(reading.value, LocalValue::Scalar(LocalScalar::Int32(0)));
        assert_eq!(reading.remote_type, None);
    }

    #[test]
    fn test_array_storage_commit() {
        let item = item(ItemDefinition::new("2,7", Direction::Input, LocalType::Int16).array(4));
        let value = LocalValue::Array(vec![LocalScalar::Int16(1), LocalScalar::Int16(2)]);
        item.with_state(|s| s.storage.commit(&value)).unwrap();
        assert_eq!(item.read().value, value);
        item.with_state(|s| {
            assert_eq!(s.storage.capacity(), 4);
            assert_eq!(s.storage.len(), 2);
        });
    }

    #[test]
    fn test_array_commit_rejects_overflow_without_writing() {
        let item = item(ItemDefinition::new("2,7", Direction::Input, LocalType::UInt8).array(2));
        let first = LocalValue::Array(vec![LocalScalar::UInt8(9)]);
        item.with_state(|s| s.storage.commit(&first)).unwrap();

        let oversized = LocalValue::Array(vec![LocalScalar::UInt8(1); 3]);
        let err = item.with_state(|s| s.storage.commit(&oversized)).unwrap_err();
        assert_eq!(err, CoercionError::ArrayCapacityExceeded { len: 3, capacity: 2 });
        assert_eq!(item.read().value, first);
    }

    #[test]
    fn test_check_value() {
        let scalar = item(ItemDefinition::new("2,7", Direction::Output, LocalType::Float64));
        assert!(scalar
            .check_value(&LocalScalar::Float64(1.0).into())
            .is_ok());
        assert!(matches!(
            scalar.check_value(&LocalValue::Array(vec![])),
            Err(CoercionError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            scalar.check_value(&LocalScalar::Int32(1).into()),
            Err(CoercionError::Unexpected { .. })
        ));
    }

    #[test]
    fn test_settings_resolution() {
        let defaults = ItemDefaults::default();
        let options = ItemOptions {
            queue_size: Some(5),
            ..ItemOptions::default()
        };
        let settings = ItemSettings::resolve(&options, ScanMode::Event, &defaults);
        assert_eq!(settings.queue_size, 5);
        assert_eq!(settings.sampling_interval_ms, defaults.sampling_interval_ms);
        assert!(settings.discard_oldest);
        assert_eq!(settings.scan, ScanMode::Event);
    }

    #[test]
    fn test_remote_type_display() {
        assert_eq!(RemoteType::array(WireType::Float).to_string(), "Float[]");
        assert_eq!(RemoteType::scalar(WireType::Int32).to_string(), "Int32");
    }
}
