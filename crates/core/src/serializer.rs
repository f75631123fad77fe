//! Content serialization seam
//!
//! Documents cross the engine boundary as bytes. A `Serializer` converts
//! between those bytes and `JsonValue`; typed access goes through serde on top.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::JsonValue;

/// Encodes and decodes document content.
pub trait Serializer: Send + Sync {
    /// Encode a JSON value into document bytes
    fn serialize(&self, value: &JsonValue) -> Result<Vec<u8>>;

    /// Decode document bytes into a JSON value
    fn deserialize(&self, bytes: &[u8]) -> Result<JsonValue>;
}

/// Plain JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &JsonValue) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<JsonValue> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Encode any `Serialize` value through `serializer`.
pub fn encode<T: Serialize + ?Sized>(serializer: &dyn Serializer, value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_value(value)?;
    serializer.serialize(&json)
}

/// Convert a decoded JSON value into `T`.
pub fn decode_as<T: DeserializeOwned>(value: &JsonValue) -> Result<T> {
    Ok(serde_json::from_value(value.clone())?)
}
