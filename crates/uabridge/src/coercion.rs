// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Wire ↔ local value conversion.
//!
//! Every conversion is looked up in a table keyed by `(wire type, local type)`.
//! An entry carries an optional decoder (notification/read direction) and an
//! optional encoder (write direction). A missing function means the
//! direction is unsupported for that pair and yields
//! [`CoercionError::TypeMismatch`].
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   UaValue ────▶ │ element ─▶ shape ─▶ decoder  │ ────▶ LocalValue
//!                 │        CoercionTable         │
//!   UaValue ◀──── │      encoder ◀─ wire type    │ ◀──── LocalValue
//!                 └──────────────────────────────┘
//! ```
//!
//! The table must cover all 13 × 9 pairs. [`CoercionTable::validate`] runs
//! when the bridge context is built, so a gap is reported at startup rather
//! than on the first notification of an unlucky item.

use std::collections::HashMap;
use std::fmt;

use crate::error::{CoercionError, ConfigError};
use crate::item::{Item, LocalScalar, LocalType, LocalValue, RemoteType, STRING_CAPACITY};
use crate::types::{UaValue, WireType};

/// Converts one wire scalar to a local scalar of the given type.
pub type Decoder = fn(&UaValue, LocalType) -> Result<LocalScalar, CoercionError>;

/// Converts one local scalar to a wire scalar of the given type.
pub type Encoder = fn(&LocalScalar, WireType) -> Result<UaValue, CoercionError>;

// =============================================================================
// Rule
// =============================================================================

/// Conversion functions for one `(wire, local)` pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rule {
    /// Wire → local.
    pub decode: Option<Decoder>,
    /// Local → wire.
    pub encode: Option<Encoder>,
}

impl Rule {
    /// A rule converting in both directions.
    pub fn both(decode: Decoder, encode: Encoder) -> Self {
        Self {
            decode: Some(decode),
            encode: Some(encode),
        }
    }

    /// A rule that only decodes.
    pub fn decode_only(decode: Decoder) -> Self {
        Self {
            decode: Some(decode),
            encode: None,
        }
    }

    /// A rule that rejects both directions.
    pub fn unsupported() -> Self {
        Self::default()
    }
}

// =============================================================================
// CoercionTable
// =============================================================================

/// Result of decoding a notification or read for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Value ready to commit to storage.
    pub value: LocalValue,
    /// Observed wire type; `None` for an empty array.
    pub remote_type: Option<RemoteType>,
}

/// Conversion table keyed by `(wire type, local type)`.
#[derive(Clone)]
pub struct CoercionTable {
    rules: HashMap<(WireType, LocalType), Rule>,
}

impl CoercionTable {
    /// Creates an empty table.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Creates the standard table covering every pair.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        for wire in WireType::ALL {
            for local in LocalType::ALL {
                table.insert(wire, local, standard_rule(wire, local));
            }
        }
        table
    }

    /// Inserts or replaces a rule.
    pub fn insert(&mut self, wire: WireType, local: LocalType, rule: Rule) {
        self.rules.insert((wire, local), rule);
    }

    /// Replaces a rule, builder style.
    pub fn with_rule(mut self, wire: WireType, local: LocalType, rule: Rule) -> Self {
        self.insert(wire, local, rule);
        self
    }

    /// Removes a rule.
    pub fn remove(&mut self, wire: WireType, local: LocalType) -> Option<Rule> {
        self.rules.remove(&(wire, local))
    }

    /// Returns the rule for a pair.
    pub fn rule(&self, wire: WireType, local: LocalType) -> Option<&Rule> {
        self.rules.get(&(wire, local))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks that every `(wire, local)` pair has an entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<String> = WireType::ALL
            .iter()
            .flat_map(|wire| LocalType::ALL.iter().map(move |local| (*wire, *local)))
            .filter(|key| !self.rules.contains_key(key))
            .map(|(wire, local)| format!("{}→{}", wire, local))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::IncompleteCoercionTable { missing })
        }
    }

    /// Decodes a single wire scalar.
    pub fn decode_scalar(
        &self,
        value: &UaValue,
        local: LocalType,
    ) -> Result<LocalScalar, CoercionError> {
        let wire = value
            .wire_type()
            .ok_or(CoercionError::UnsupportedWireValue {
                type_name: value.type_name(),
            })?;
        let decode = self
            .rule(wire, local)
            .and_then(|rule| rule.decode)
            .ok_or(CoercionError::TypeMismatch { wire, local })?;
        decode(value, local)
    }

    /// Encodes a single local scalar as the given wire type.
    pub fn encode_scalar(
        &self,
        value: &LocalScalar,
        wire: WireType,
    ) -> Result<UaValue, CoercionError> {
        let local = value.local_type();
        let encode = self
            .rule(wire, local)
            .and_then(|rule| rule.encode)
            .ok_or(CoercionError::TypeMismatch { wire, local })?;
        encode(value, wire)
    }

    /// Decodes a wire value for an item.
    ///
    /// Applies element extraction, then the shape and capacity checks, then
    /// the per-element conversion. Only immutable item properties are used,
    /// so this runs without the item lock.
    pub fn decode_for(&self, item: &Item, value: &UaValue) -> Result<Decoded, CoercionError> {
        let value = match item.settings().element.as_deref() {
            Some(element) => value
                .field(element)
                .ok_or_else(|| CoercionError::MissingElement {
                    element: element.to_string(),
                })?,
            None => value,
        };

        match (value, item.is_array()) {
            (UaValue::Array(elements), true) => {
                if elements.len() > item.capacity() {
                    return Err(CoercionError::ArrayCapacityExceeded {
                        len: elements.len(),
                        capacity: item.capacity(),
                    });
                }
                let decoded = elements
                    .iter()
                    .map(|e| self.decode_scalar(e, item.local_type()))
                    .collect::<Result<Vec<_>, _>>()?;
                let remote_type = elements
                    .first()
                    .and_then(UaValue::wire_type)
                    .map(RemoteType::array);
                Ok(Decoded {
                    value: LocalValue::Array(decoded),
                    remote_type,
                })
            }
            (UaValue::Array(_), false) => Err(CoercionError::ShapeMismatch {
                expected: "scalar",
                actual: "array",
            }),
            (scalar, true) => Err(CoercionError::ShapeMismatch {
                expected: "array",
                actual: if scalar.wire_type().is_some() {
                    "scalar"
                } else {
                    scalar.type_name()
                },
            }),
            (scalar, false) => {
                let decoded = self.decode_scalar(scalar, item.local_type())?;
                Ok(Decoded {
                    value: LocalValue::Scalar(decoded),
                    remote_type: scalar.wire_type().map(RemoteType::scalar),
                })
            }
        }
    }

    /// Encodes a host value for an item.
    ///
    /// Uses the remote wire type when known, otherwise the local type's
    /// natural wire type.
    pub fn encode_for(
        &self,
        item: &Item,
        value: &LocalValue,
        remote_type: Option<RemoteType>,
    ) -> Result<UaValue, CoercionError> {
        let wire = match remote_type {
            Some(remote) if remote.is_array != item.is_array() => {
                return Err(CoercionError::ShapeMismatch {
                    expected: if item.is_array() { "array" } else { "scalar" },
                    actual: if remote.is_array { "array" } else { "scalar" },
                });
            }
            Some(remote) => remote.wire_type,
            None => item.local_type().natural_wire_type(),
        };

        match value {
            LocalValue::Scalar(v) => self.encode_scalar(v, wire),
            LocalValue::Array(values) => values
                .iter()
                .map(|v| self.encode_scalar(v, wire))
                .collect::<Result<Vec<_>, _>>()
                .map(UaValue::Array),
        }
    }
}

impl Default for CoercionTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for CoercionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decoders = self.rules.values().filter(|r| r.decode.is_some()).count();
        let encoders = self.rules.values().filter(|r| r.encode.is_some()).count();
        f.debug_struct("CoercionTable")
            .field("entries", &self.rules.len())
            .field("decoders", &decoders)
            .field("encoders", &encoders)
            .finish()
    }
}

// =============================================================================
// Standard rules
// =============================================================================

fn standard_rule(wire: WireType, local: LocalType) -> Rule {
    match (wire, local) {
        (WireType::String, LocalType::String) => Rule::both(decode_text, encode_text),
        (_, LocalType::String) => Rule::decode_only(decode_text),
        (WireType::Boolean, _) => Rule::both(decode_boolean, encode_boolean),
        (WireType::String, _) => Rule::decode_only(decode_parse),
        (WireType::DateTime, _) => Rule::unsupported(),
        _ => Rule::both(decode_numeric, encode_numeric),
    }
}

/// Intermediate numeric form wide enough for every supported integer.
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i128),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

fn wire_number(value: &UaValue) -> Option<Number> {
    Some(match value {
        UaValue::SByte(v) => Number::Int(i128::from(*v)),
        UaValue::Byte(v) => Number::Int(i128::from(*v)),
        UaValue::Int16(v) => Number::Int(i128::from(*v)),
        UaValue::UInt16(v) => Number::Int(i128::from(*v)),
        UaValue::Int32(v) => Number::Int(i128::from(*v)),
        UaValue::UInt32(v) => Number::Int(i128::from(*v)),
        UaValue::Int64(v) => Number::Int(i128::from(*v)),
        UaValue::UInt64(v) => Number::Int(i128::from(*v)),
        UaValue::Float(v) => Number::Float(f64::from(*v)),
        UaValue::Double(v) => Number::Float(*v),
        _ => return None,
    })
}

fn local_number(value: &LocalScalar) -> Option<Number> {
    Some(match value {
        LocalScalar::Int8(v) => Number::Int(i128::from(*v)),
        LocalScalar::UInt8(v) => Number::Int(i128::from(*v)),
        LocalScalar::Int16(v) => Number::Int(i128::from(*v)),
        LocalScalar::UInt16(v) => Number::Int(i128::from(*v)),
        LocalScalar::Int32(v) => Number::Int(i128::from(*v)),
        LocalScalar::UInt32(v) => Number::Int(i128::from(*v)),
        LocalScalar::Float32(v) => Number::Float(f64::from(*v)),
        LocalScalar::Float64(v) => Number::Float(*v),
        LocalScalar::String(_) => return None,
    })
}

/// Narrows to an integer type. Floats are rounded to the nearest integer.
fn narrow<T: TryFrom<i128>>(n: Number, target: &'static str) -> Result<T, CoercionError> {
    let integral = match n {
        Number::Int(v) => v,
        Number::Float(v) if v.is_finite() => v.round() as i128,
        Number::Float(_) => return Err(CoercionError::out_of_range(n, target)),
    };
    T::try_from(integral).map_err(|_| CoercionError::out_of_range(n, target))
}

fn to_f32(n: Number, target: &'static str) -> Result<f32, CoercionError> {
    match n {
        Number::Int(v) => Ok(v as f32),
        Number::Float(v) if v.is_finite() && v.abs() > f64::from(f32::MAX) => {
            Err(CoercionError::out_of_range(n, target))
        }
        Number::Float(v) => Ok(v as f32),
    }
}

fn to_f64(n: Number) -> f64 {
    match n {
        Number::Int(v) => v as f64,
        Number::Float(v) => v,
    }
}

fn number_to_local(n: Number, local: LocalType) -> Result<LocalScalar, CoercionError> {
    let target = local.name();
    Ok(match local {
        LocalType::Int8 => LocalScalar::Int8(narrow(n, target)?),
        LocalType::UInt8 => LocalScalar::UInt8(narrow(n, target)?),
        LocalType::Int16 => LocalScalar::Int16(narrow(n, target)?),
        LocalType::UInt16 => LocalScalar::UInt16(narrow(n, target)?),
        LocalType::Int32 => LocalScalar::Int32(narrow(n, target)?),
        LocalType::UInt32 => LocalScalar::UInt32(narrow(n, target)?),
        LocalType::Float32 => LocalScalar::Float32(to_f32(n, target)?),
        LocalType::Float64 => LocalScalar::Float64(to_f64(n)),
        LocalType::String => LocalScalar::String(truncate_text(n.to_string())),
    })
}

fn number_to_wire(n: Number, wire: WireType) -> Result<UaValue, CoercionError> {
    let target = wire.name();
    Ok(match wire {
        WireType::SByte => UaValue::SByte(narrow(n, target)?),
        WireType::Byte => UaValue::Byte(narrow(n, target)?),
        WireType::Int16 => UaValue::Int16(narrow(n, target)?),
        WireType::UInt16 => UaValue::UInt16(narrow(n, target)?),
        WireType::Int32 => UaValue::Int32(narrow(n, target)?),
        WireType::UInt32 => UaValue::UInt32(narrow(n, target)?),
        WireType::Int64 => UaValue::Int64(narrow(n, target)?),
        WireType::UInt64 => UaValue::UInt64(narrow(n, target)?),
        WireType::Float => UaValue::Float(to_f32(n, target)?),
        WireType::Double => UaValue::Double(to_f64(n)),
        WireType::Boolean | WireType::String | WireType::DateTime => {
            return Err(CoercionError::unexpected(format!(
                "numeric encoder used for {}",
                wire
            )))
        }
    })
}

/// Cuts a string to the storage capacity on a character boundary.
fn truncate_text(mut text: String) -> String {
    if text.len() > STRING_CAPACITY {
        let mut end = STRING_CAPACITY;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

fn decode_numeric(value: &UaValue, local: LocalType) -> Result<LocalScalar, CoercionError> {
    let n = wire_number(value).ok_or(CoercionError::UnsupportedWireValue {
        type_name: value.type_name(),
    })?;
    number_to_local(n, local)
}

fn decode_boolean(value: &UaValue, local: LocalType) -> Result<LocalScalar, CoercionError> {
    match value {
        UaValue::Boolean(b) => number_to_local(Number::Int(i128::from(*b)), local),
        other => Err(CoercionError::UnsupportedWireValue {
            type_name: other.type_name(),
        }),
    }
}

fn decode_parse(value: &UaValue, local: LocalType) -> Result<LocalScalar, CoercionError> {
    let UaValue::String(text) = value else {
        return Err(CoercionError::UnsupportedWireValue {
            type_name: value.type_name(),
        });
    };
    let trimmed = text.trim();
    let n = if let Ok(v) = trimmed.parse::<i128>() {
        Number::Int(v)
    } else if let Ok(v) = trimmed.parse::<f64>() {
        Number::Float(v)
    } else {
        return Err(CoercionError::Unparsable {
            value: text.clone(),
            target: local.name(),
        });
    };
    number_to_local(n, local)
}

fn decode_text(value: &UaValue, _local: LocalType) -> Result<LocalScalar, CoercionError> {
    Ok(LocalScalar::String(truncate_text(value.to_string())))
}

fn encode_numeric(value: &LocalScalar, wire: WireType) -> Result<UaValue, CoercionError> {
    let n = local_number(value).ok_or(CoercionError::TypeMismatch {
        wire,
        local: value.local_type(),
    })?;
    number_to_wire(n, wire)
}

fn encode_boolean(value: &LocalScalar, wire: WireType) -> Result<UaValue, CoercionError> {
    let n = local_number(value).ok_or(CoercionError::TypeMismatch {
        wire,
        local: value.local_type(),
    })?;
    Ok(UaValue::Boolean(match n {
        Number::Int(v) => v != 0,
        Number::Float(v) => v != 0.0,
    }))
}

fn encode_text(value: &LocalScalar, wire: WireType) -> Result<UaValue, CoercionError> {
    match value {
        LocalScalar::String(s) => Ok(UaValue::String(s.clone())),
        other => Err(CoercionError::TypeMismatch {
            wire,
            local: other.local_type(),
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ItemDefaults, ItemOptions};
    use crate::item::{Direction, ItemDefinition, ItemIndex, ItemSettings};
    use chrono::{TimeZone, Utc};

    fn item(definition: ItemDefinition) -> Item {
        let settings =
            ItemSettings::resolve(&definition.options, definition.scan, &ItemDefaults::default());
        Item::new(ItemIndex::new(0), definition, settings)
    }

    #[test]
    fn test_standard_table_is_complete() {
        let table = CoercionTable::standard();
        assert_eq!(table.len(), 13 * 9);
        table.validate().unwrap();
    }

    #[test]
    fn test_incomplete_table_is_reported() {
        let mut table = CoercionTable::standard();
        table.remove(WireType::Int64, LocalType::Int8);
        let err = table.validate().unwrap_err();
        match err {
            ConfigError::IncompleteCoercionTable { missing } => {
                assert_eq!(missing, vec!["Int64→int8".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_numeric_decode_with_range_check() {
        let table = CoercionTable::standard();
        assert_eq!(
            table.decode_scalar(&UaValue::Int32(-5), LocalType::Int8).unwrap(),
            LocalScalar::Int8(-5)
        );
        assert!(matches!(
            table.decode_scalar(&UaValue::Int32(300), LocalType::Int8),
            Err(CoercionError::OutOfRange { target: "int8", .. })
        ));
        assert_eq!(
            table.decode_scalar(&UaValue::Double(2.6), LocalType::UInt16).unwrap(),
            LocalScalar::UInt16(3)
        );
        assert!(table
            .decode_scalar(&UaValue::Double(1e300), LocalType::Float32)
            .is_err());
        assert_eq!(
            table.decode_scalar(&UaValue::UInt64(u64::MAX), LocalType::Float64).unwrap(),
            LocalScalar::Float64(u64::MAX as f64)
        );
    }

    #[test]
    fn test_boolean_and_string_decode() {
        let table = CoercionTable::standard();
        assert_eq!(
            table.decode_scalar(&UaValue::Boolean(true), LocalType::Int32).unwrap(),
            LocalScalar::Int32(1)
        );
        assert_eq!(
            table
                .decode_scalar(&UaValue::String(" 42 ".into()), LocalType::UInt8)
                .unwrap(),
            LocalScalar::UInt8(42)
        );
        assert!(matches!(
            table.decode_scalar(&UaValue::String("abc".into()), LocalType::Float64),
            Err(CoercionError::Unparsable { .. })
        ));
        assert_eq!(
            table.decode_scalar(&UaValue::Double(1.5), LocalType::String).unwrap(),
            LocalScalar::String("1.5".into())
        );
    }

    #[test]
    fn test_datetime_decodes_to_string_only() {
        let table = CoercionTable::standard();
        let when = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let decoded = table
            .decode_scalar(&UaValue::DateTime(when), LocalType::String)
            .unwrap();
        assert_eq!(decoded, LocalScalar::String(when.to_rfc3339()));
        assert_eq!(
            table.decode_scalar(&UaValue::DateTime(when), LocalType::Int32),
            Err(CoercionError::TypeMismatch {
                wire: WireType::DateTime,
                local: LocalType::Int32
            })
        );
    }

    #[test]
    fn test_strings_are_truncated_on_char_boundary() {
        let table = CoercionTable::standard();
        let long = "é".repeat(60);
        let LocalScalar::String(s) = table
            .decode_scalar(&UaValue::String(long), LocalType::String)
            .unwrap()
        else {
            panic!("expected string");
        };
        assert_eq!(s.len(), STRING_CAPACITY);
        assert_eq!(s.chars().count(), STRING_CAPACITY / 2);
    }

    #[test]
    fn test_encode_rules() {
        let table = CoercionTable::standard();
        assert_eq!(
            table.encode_scalar(&LocalScalar::Int16(7), WireType::Boolean).unwrap(),
            UaValue::Boolean(true)
        );
        assert_eq!(
            table.encode_scalar(&LocalScalar::Float64(2.4), WireType::Int32).unwrap(),
            UaValue::Int32(2)
        );
        assert!(matches!(
            table.encode_scalar(&LocalScalar::Int32(-1), WireType::UInt32),
            Err(CoercionError::OutOfRange { .. })
        ));
        assert!(matches!(
            table.encode_scalar(&LocalScalar::Int32(1), WireType::String),
            Err(CoercionError::TypeMismatch { .. })
        ));
        assert_eq!(
            table
                .encode_scalar(&LocalScalar::String("on".into()), WireType::String)
                .unwrap(),
            UaValue::String("on".into())
        );
    }

    #[test]
    fn test_decode_for_array_item() {
        let table = CoercionTable::standard();
        let item = item(ItemDefinition::new("2,7", Direction::Input, LocalType::Int16).array(3));

        let decoded = table
            .decode_for(&item, &UaValue::Array(vec![UaValue::Int32(1), UaValue::Int32(2)]))
            .unwrap();
        assert_eq!(
            decoded.value,
            LocalValue::Array(vec![LocalScalar::Int16(1), LocalScalar::Int16(2)])
        );
        assert_eq!(decoded.remote_type, Some(RemoteType::array(WireType::Int32)));

        let err = table
            .decode_for(&item, &UaValue::Array(vec![UaValue::Int32(0); 4]))
            .unwrap_err();
        assert_eq!(err, CoercionError::ArrayCapacityExceeded { len: 4, capacity: 3 });

        assert!(matches!(
            table.decode_for(&item, &UaValue::Int32(1)),
            Err(CoercionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_for_element() {
        let table = CoercionTable::standard();
        let options = ItemOptions {
            element: Some("High".into()),
            ..ItemOptions::default()
        };
        let item = item(
            ItemDefinition::new("2:Range", Direction::Input, LocalType::Float64).options(options),
        );
        let value = UaValue::Structure(vec![
            ("Low".into(), UaValue::Double(0.0)),
            ("High".into(), UaValue::Double(9.5)),
        ]);
        let decoded = table.decode_for(&item, &value).unwrap();
        assert_eq!(decoded.value, LocalValue::Scalar(LocalScalar::Float64(9.5)));

        assert!(matches!(
            table.decode_for(&item, &UaValue::Double(1.0)),
            Err(CoercionError::MissingElement { .. })
        ));
    }

    #[test]
    fn test_encode_for_uses_natural_type_before_remote_is_known() {
        let table = CoercionTable::standard();
        let item = item(ItemDefinition::new("2,7", Direction::Output, LocalType::UInt8));
        let value = LocalValue::Scalar(LocalScalar::UInt8(9));

        assert_eq!(table.encode_for(&item, &value, None).unwrap(), UaValue::Byte(9));
        assert_eq!(
            table
                .encode_for(&item, &value, Some(RemoteType::scalar(WireType::Double)))
                .unwrap(),
            UaValue::Double(9.0)
        );
        assert!(matches!(
            table.encode_for(&item, &value, Some(RemoteType::array(WireType::Double))),
            Err(CoercionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_custom_rule_override() {
        fn always_seven(_: &UaValue, _: LocalType) -> Result<LocalScalar, CoercionError> {
            Ok(LocalScalar::Int32(7))
        }
        let table = CoercionTable::standard().with_rule(
            WireType::DateTime,
            LocalType::Int32,
            Rule::decode_only(always_seven),
        );
        let now = UaValue::DateTime(Utc::now());
        assert_eq!(
            table.decode_scalar(&now, LocalType::Int32).unwrap(),
            LocalScalar::Int32(7)
        );
    }
}
