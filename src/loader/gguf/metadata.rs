//! GGUF Metadata Parsing
//!
//! This module handles the key-value table of a GGUF file:
//! - The value-type tags from gguf.h
//! - A typed [`MetadataValue`] tagged union (arrays recurse)
//! - The immutable [`GgufMetadataTable`] with coercing lookups

use super::GgufError;
use crate::loader::cursor::ByteCursor;
use serde::Serialize;
use std::collections::BTreeMap;

/// Arrays may nest; this bounds the recursion on corrupt input
pub const MAX_ARRAY_DEPTH: usize = 64;

/// GGUF value types, numbered as in ggml/gguf.h
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum GgufValueType {
    UInt8 = 0,
    Int8 = 1,
    UInt16 = 2,
    Int16 = 3,
    UInt32 = 4,
    Int32 = 5,
    Float32 = 6,
    Bool = 7,
    String = 8,
    Array = 9,
    UInt64 = 10,
    Int64 = 11,
    Float64 = 12,
}

impl GgufValueType {
    pub fn from_u32(value: u32) -> Option<Self> {
        use GgufValueType::*;
        let ty = match value {
            0 => UInt8,
            1 => Int8,
            2 => UInt16,
            3 => Int16,
            4 => UInt32,
            5 => Int32,
            6 => Float32,
            7 => Bool,
            8 => String,
            9 => Array,
            10 => UInt64,
            11 => Int64,
            12 => Float64,
            _ => return None,
        };
        Some(ty)
    }

    /// Fewest bytes one value of this type can occupy on disk
    ///
    /// Strings and arrays count their length prefixes.
    pub fn min_encoded_size(&self) -> u64 {
        use GgufValueType::*;
        match self {
            UInt8 | Int8 | Bool => 1,
            UInt16 | Int16 => 2,
            UInt32 | Int32 | Float32 => 4,
            UInt64 | Int64 | Float64 | String => 8,
            Array => 12,
        }
    }
}

/// Capacity to reserve for an array of `len` elements with `remaining`
/// bytes left in the buffer
fn array_capacity(len: u64, element_type: GgufValueType, remaining: usize) -> usize {
    let fits = remaining as u64 / element_type.min_encoded_size();
    len.min(fits) as usize
}

/// A typed metadata value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    String(String),
    Array(MetadataArray),
}

/// Homogeneous array with its declared element type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataArray {
    pub element_type: GgufValueType,
    pub values: Vec<MetadataValue>,
}

impl MetadataValue {
    /// Any non-negative integer, widened to u64
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            MetadataValue::U8(v) => Some(v as u64),
            MetadataValue::U16(v) => Some(v as u64),
            MetadataValue::U32(v) => Some(v as u64),
            MetadataValue::U64(v) => Some(v),
            MetadataValue::I8(v) => u64::try_from(v).ok(),
            MetadataValue::I16(v) => u64::try_from(v).ok(),
            MetadataValue::I32(v) => u64::try_from(v).ok(),
            MetadataValue::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Any numeric value as f64
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            MetadataValue::F32(v) => Some(v as f64),
            MetadataValue::F64(v) => Some(v),
            MetadataValue::I8(v) => Some(v as f64),
            MetadataValue::I16(v) => Some(v as f64),
            MetadataValue::I32(v) => Some(v as f64),
            MetadataValue::I64(v) => Some(v as f64),
            _ => self.as_u64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            MetadataValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&MetadataArray> {
        match self {
            MetadataValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Short human-readable rendering; long arrays are summarized
    pub fn summary(&self) -> String {
        match self {
            MetadataValue::String(s) if s.len() > 64 => {
                let cut = s.char_indices().nth(61).map(|(i, _)| i).unwrap_or(s.len());
                format!("{:?}...", &s[..cut])
            }
            MetadataValue::String(s) => format!("{:?}", s),
            MetadataValue::Array(a) => {
                format!("[{:?}; {}]", a.element_type, a.values.len())
            }
            MetadataValue::Bool(b) => b.to_string(),
            MetadataValue::F32(v) => v.to_string(),
            MetadataValue::F64(v) => v.to_string(),
            other => other
                .as_u64()
                .map(|v| v.to_string())
                .or_else(|| other.as_f64().map(|v| v.to_string()))
                .unwrap_or_default(),
        }
    }
}

/// Read a single value of the given type
///
/// Arrays carry a u32 element type and a u64 length followed by that many
/// elements, which may themselves be arrays.
pub fn read_value(
    cursor: &mut ByteCursor<'_>,
    value_type: GgufValueType,
    key: &str,
    depth: usize,
) -> Result<MetadataValue, GgufError> {
    let value = match value_type {
        GgufValueType::UInt8 => MetadataValue::U8(cursor.read_u8()?),
        GgufValueType::Int8 => MetadataValue::I8(cursor.read_i8()?),
        GgufValueType::UInt16 => MetadataValue::U16(cursor.read_u16()?),
        GgufValueType::Int16 => MetadataValue::I16(cursor.read_i16()?),
        GgufValueType::UInt32 => MetadataValue::U32(cursor.read_u32()?),
        GgufValueType::Int32 => MetadataValue::I32(cursor.read_i32()?),
        GgufValueType::UInt64 => MetadataValue::U64(cursor.read_u64()?),
        GgufValueType::Int64 => MetadataValue::I64(cursor.read_i64()?),
        GgufValueType::Float32 => MetadataValue::F32(cursor.read_f32()?),
        GgufValueType::Float64 => MetadataValue::F64(cursor.read_f64()?),
        GgufValueType::Bool => MetadataValue::Bool(cursor.read_bool()?),
        GgufValueType::String => MetadataValue::String(cursor.read_string()?),
        GgufValueType::Array => {
            if depth >= MAX_ARRAY_DEPTH {
                return Err(GgufError::ArrayNestingTooDeep {
                    key: key.to_string(),
                    depth,
                });
            }
            let tag = cursor.read_u32()?;
            let element_type =
                GgufValueType::from_u32(tag).ok_or_else(|| GgufError::UnknownValueType {
                    tag,
                    key: key.to_string(),
                })?;
            let len = cursor.read_u64()?;

            let mut values =
                Vec::with_capacity(array_capacity(len, element_type, cursor.remaining()));
            for _ in 0..len {
                values.push(read_value(cursor, element_type, key, depth + 1)?);
            }
            MetadataValue::Array(MetadataArray {
                element_type,
                values,
            })
        }
    };
    Ok(value)
}

/// Read one key/value entry
pub fn read_kv_pair(cursor: &mut ByteCursor<'_>) -> Result<(String, MetadataValue), GgufError> {
    let key = cursor.read_string()?;
    let tag = cursor.read_u32()?;
    let value_type = GgufValueType::from_u32(tag).ok_or_else(|| GgufError::UnknownValueType {
        tag,
        key: key.clone(),
    })?;
    let value = read_value(cursor, value_type, &key, 0)?;
    Ok((key, value))
}

/// Immutable key/value metadata of one GGUF file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GgufMetadataTable {
    entries: BTreeMap<String, MetadataValue>,
}

impl GgufMetadataTable {
    /// Build from parsed entries; on duplicate keys the last one wins
    pub fn from_entries(entries: impl IntoIterator<Item = (String, MetadataValue)>) -> Self {
        let mut map = BTreeMap::new();
        for (key, value) in entries {
            if map.insert(key.clone(), value).is_some() {
                tracing::warn!("Duplicate GGUF metadata key '{}', keeping the last value", key);
            }
        }
        Self { entries: map }
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.get(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(MetadataValue::as_u64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(MetadataValue::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetadataValue::as_str)
    }

    /// Element count of an array entry
    pub fn array_len(&self, key: &str) -> Option<usize> {
        self.get(key)
            .and_then(MetadataValue::as_array)
            .map(|a| a.values.len())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
