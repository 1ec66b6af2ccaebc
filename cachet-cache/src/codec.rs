//! Value codec.
//!
//! Turns a [`CacheValue`] into the UTF-8 payload stored by string-oriented
//! backends (Redis, memcache, the database `v` column) and back. The payload
//! is tagged JSON, e.g. `{"t":"int","v":5}` or `{"t":"null"}`, so integers,
//! floats, strings and null never collapse into one another.
//!
//! Encoding is deterministic: equal values produce byte-identical payloads,
//! which lets backends compare payloads instead of decoded values.

use crate::error::{CacheError, CacheResult};
use crate::value::CacheValue;

/// Encode a value into its storable payload.
pub fn encode(value: &CacheValue) -> CacheResult<String> {
    serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Decode a payload produced by [`encode`].
pub fn decode(payload: &str) -> CacheResult<CacheValue> {
    serde_json::from_str(payload).map_err(|e| CacheError::Deserialization(e.to_string()))
}

/// Decode raw bytes read from a byte-oriented backend.
pub fn decode_bytes(payload: &[u8]) -> CacheResult<CacheValue> {
    serde_json::from_slice(payload).map_err(|e| CacheError::Deserialization(e.to_string()))
}

/// Floats as JSON numbers, with NaN and infinities spelled as strings since
/// JSON has no literal for them.
pub(crate) mod float_repr {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float literal '{}'", other))),
            },
        }
    }
}

/// Opaque object bytes as a base64 string.
pub(crate) mod bytes_repr {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(D::Error::custom)
    }
}
