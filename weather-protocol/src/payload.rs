//! Reading payload codec.
//!
//! A reading travels as a flat JSON object. String, number and boolean
//! values are accepted and carried as strings; anything nested is rejected.
//! The same functions encode what the content server sends and decode what
//! the GET client receives, so both sides agree on one format.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::ID_ATTRIBUTE;

/// Attribute name -> attribute value, kept sorted for stable rendering.
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("snapshot must be a JSON array")]
    NotAnArray,
    #[error("attribute '{0}' must be a string, number or boolean")]
    UnsupportedValue(String),
    #[error("missing 'id' attribute")]
    MissingId,
    #[error("'id' attribute is empty")]
    EmptyId,
}

/// True when the body carries nothing but whitespace.
pub fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Decodes one producer reading and checks it names its producer.
/// The stored `id` is the trimmed identity, so it matches the store key.
pub fn decode_reading(body: &[u8]) -> Result<Attributes, PayloadError> {
    let value: Value = serde_json::from_slice(body)?;
    let mut attributes = attributes_from_value(value)?;
    let id = producer_id(&attributes)?.to_string();
    attributes.insert(ID_ATTRIBUTE.to_string(), id);
    Ok(attributes)
}

pub fn encode_reading(attributes: &Attributes) -> Vec<u8> {
    // A BTreeMap<String, String> always serializes.
    serde_json::to_vec_pretty(attributes).unwrap_or_default()
}

/// Decodes a query response: an ordered array of readings.
pub fn decode_snapshot(body: &[u8]) -> Result<Vec<Attributes>, PayloadError> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Array(items) => items.into_iter().map(attributes_from_value).collect(),
        _ => Err(PayloadError::NotAnArray),
    }
}

pub fn encode_snapshot(readings: &[Attributes]) -> Vec<u8> {
    serde_json::to_vec_pretty(readings).unwrap_or_default()
}

/// Returns the non-empty producer identity of a reading.
pub fn producer_id(attributes: &Attributes) -> Result<&str, PayloadError> {
    let id = attributes.get(ID_ATTRIBUTE).ok_or(PayloadError::MissingId)?;
    let id = id.trim();
    if id.is_empty() {
        return Err(PayloadError::EmptyId);
    }
    Ok(id)
}

fn attributes_from_value(value: Value) -> Result<Attributes, PayloadError> {
    match value {
        Value::Object(object) => attributes_from_object(object),
        _ => Err(PayloadError::NotAnObject),
    }
}

fn attributes_from_object(object: Map<String, Value>) -> Result<Attributes, PayloadError> {
    object
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(PayloadError::UnsupportedValue(key)),
            };
            Ok((key, text))
        })
        .collect()
}
