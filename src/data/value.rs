//! Tagged value type and its ordering semantics

use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Int,
    Float,
    Text,
    Bool,
    Timestamp,
    Binary,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Text => "text",
            DataType::Bool => "bool",
            DataType::Timestamp => "timestamp",
            DataType::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// A single typed value
///
/// JSON mapping is the natural one for null/bool/int/float/text. Timestamps
/// and binary blobs use a one-key envelope (`{"$timestamp": n}`,
/// `{"$binary": [..]}`) so round-trips stay type-exact.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Microseconds since the Unix epoch
    Timestamp(i64),
    Binary(Vec<u8>),
}

impl Value {
    /// The data type of this value, or `None` for null
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::Int(_) => Some(DataType::Int),
            Value::Float(_) => Some(DataType::Float),
            Value::Text(_) => Some(DataType::Text),
            Value::Timestamp(_) => Some(DataType::Timestamp),
            Value::Binary(_) => Some(DataType::Binary),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Three-way comparison used for index ordering and range queries.
    ///
    /// Integers, floats and text compare meaningfully; every other pairing,
    /// including mismatched types, compares `Equal`. Callers must not rely on
    /// ordering across mixed or unsupported types. Exact-match lookups use
    /// structural equality (`PartialEq`), not this comparator.
    pub fn cmp_key(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }

    fn from_json(raw: serde_json::Value) -> Result<Value, String> {
        match raw {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(format!("unsupported number: {n}"))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Object(map) if map.len() == 1 => {
                let (tag, inner) = map.into_iter().next().unwrap_or_default();
                match (tag.as_str(), inner) {
                    ("$timestamp", serde_json::Value::Number(n)) => n
                        .as_i64()
                        .map(Value::Timestamp)
                        .ok_or_else(|| "timestamp out of range".to_string()),
                    ("$binary", serde_json::Value::Array(items)) => {
                        let mut bytes = Vec::with_capacity(items.len());
                        for item in items {
                            let byte = item
                                .as_u64()
                                .and_then(|b| u8::try_from(b).ok())
                                .ok_or_else(|| "binary element out of range".to_string())?;
                            bytes.push(byte);
                        }
                        Ok(Value::Binary(bytes))
                    }
                    (tag, _) => Err(format!("unsupported value envelope: {tag}")),
                }
            }
            other => Err(format!("unsupported JSON shape: {other}")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(t) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$timestamp", t)?;
                map.end()
            }
            Value::Binary(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$binary", bytes)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(raw).map_err(D::Error::custom)
    }
}

/// Renders the storage key string used for record file names
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(t) => write!(f, "{t}"),
            Value::Binary(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}
