//! The value type stored by every driver.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A cacheable value.
///
/// Closed set of shapes the cache preserves across every backend. A stored
/// `Null` is a real value: `get` returns `Some(CacheValue::Null)` for it and
/// `None` only for a miss.
///
/// The serde representation is the wire format used by [`crate::codec`];
/// changing it invalidates persisted entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "lowercase")]
pub enum CacheValue {
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number, including NaN and infinities
    Float(#[serde(with = "crate::codec::float_repr")] f64),
    /// UTF-8 string
    String(String),
    /// Ordered list of values
    List(Vec<CacheValue>),
    /// Opaque serialized object
    Object(#[serde(with = "crate::codec::bytes_repr")] Vec<u8>),
}

impl CacheValue {
    /// Serialize `value` as JSON into an opaque [`CacheValue::Object`].
    pub fn object<T: Serialize + ?Sized>(value: &T) -> CacheResult<Self> {
        serde_json::to_vec(value)
            .map(CacheValue::Object)
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Deserialize an [`CacheValue::Object`] built by [`CacheValue::object`].
    ///
    /// Returns `Ok(None)` when the value is not an object.
    pub fn to_object<T: DeserializeOwned>(&self) -> CacheResult<Option<T>> {
        match self {
            CacheValue::Object(bytes) => serde_json::from_slice(bytes)
                .map(Some)
                .map_err(|e| CacheError::Deserialization(e.to_string())),
            _ => Ok(None),
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            CacheValue::Null => "null",
            CacheValue::Bool(_) => "bool",
            CacheValue::Int(_) => "int",
            CacheValue::Float(_) => "float",
            CacheValue::String(_) => "string",
            CacheValue::List(_) => "list",
            CacheValue::Object(_) => "object",
        }
    }

    /// Whether this is [`CacheValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, CacheValue::Null)
    }

    /// String contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer contents, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CacheValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float contents, if this is a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CacheValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Boolean contents, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CacheValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// List contents, if this is a list.
    pub fn as_list(&self) -> Option<&[CacheValue]> {
        match self {
            CacheValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::String(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::String(value)
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        CacheValue::Bool(value)
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        CacheValue::Int(value)
    }
}

impl From<i32> for CacheValue {
    fn from(value: i32) -> Self {
        CacheValue::Int(i64::from(value))
    }
}

impl From<u32> for CacheValue {
    fn from(value: u32) -> Self {
        CacheValue::Int(i64::from(value))
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        CacheValue::Float(value)
    }
}

impl<T: Into<CacheValue>> From<Vec<T>> for CacheValue {
    fn from(values: Vec<T>) -> Self {
        CacheValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<CacheValue>> From<Option<T>> for CacheValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CacheValue::Null, Into::into)
    }
}

impl std::fmt::Display for CacheValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheValue::Null => f.write_str("null"),
            CacheValue::Bool(b) => write!(f, "{}", b),
            CacheValue::Int(i) => write!(f, "{}", i),
            CacheValue::Float(v) => write!(f, "{}", v),
            CacheValue::String(s) => f.write_str(s),
            CacheValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            CacheValue::Object(bytes) => write!(f, "<object {} bytes>", bytes.len()),
        }
    }
}
