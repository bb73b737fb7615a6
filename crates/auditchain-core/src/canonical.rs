//! Deterministic encodings for hashing and signing.
//!
//! Two layers:
//! - [`canonical_json`] renders a JSON value with object keys sorted
//!   bytewise at every depth, with no insignificant whitespace.
//! - [`encode_canonical`] writes CBOR following RFC 8949 Core Deterministic
//!   Encoding (smallest integer form, definite lengths, map keys sorted by
//!   their encoded bytes). Floats are rejected.
//!
//! An event's content bytes are the canonical CBOR map
//! `{0: canonical_json(payload), 1: timestamp_ms, 2: previous_hash}`.

use ciborium::value::Value;
use serde_json::{Map, Value as JsonValue};

use crate::crypto::Blake3Hash;
use crate::error::CoreError;

/// Domain prefix for event signatures.
pub const EVENT_SIGNATURE_DOMAIN: &[u8] = b"auditchain-event-v0:";

/// Content field keys. Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const PAYLOAD: u64 = 0;
    pub const TIMESTAMP: u64 = 1;
    pub const PREVIOUS_HASH: u64 = 2;
}

/// Render a JSON value with sorted object keys and no whitespace.
///
/// Independent of whether `serde_json` preserves insertion order.
pub fn canonical_json(value: &JsonValue) -> String {
    let mut out = String::new();
    write_json(&mut out, value);
    out
}

fn write_json(out: &mut String, value: &JsonValue) {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a string into JSON cannot fail.
                out.push_str(&JsonValue::String(key.clone()).to_string());
                out.push(':');
                write_json(out, &map[key]);
            }
            out.push('}');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// The bytes an event's content hash is computed over.
pub fn content_bytes(
    payload: &Map<String, JsonValue>,
    timestamp: i64,
    previous_hash: &Blake3Hash,
) -> Result<Vec<u8>, CoreError> {
    let payload_json = canonical_json(&JsonValue::Object(payload.clone()));

    let value = Value::Map(vec![
        (Value::Integer(keys::PAYLOAD.into()), Value::Text(payload_json)),
        (Value::Integer(keys::TIMESTAMP.into()), Value::Integer(timestamp.into())),
        (
            Value::Integer(keys::PREVIOUS_HASH.into()),
            Value::Bytes(previous_hash.0.to_vec()),
        ),
    ]);

    encode_canonical(&value)
}

/// The message the service key signs for an event.
pub fn signing_message(content_hash: &Blake3Hash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(EVENT_SIGNATURE_DOMAIN.len() + 32);
    buf.extend_from_slice(EVENT_SIGNATURE_DOMAIN);
    buf.extend_from_slice(content_hash.as_bytes());
    buf
}

/// Encode a CBOR value deterministically.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            encode_uint(buf, 4, items.len() as u64);
            for item in items {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::EncodingError(
                "floats are not allowed in canonical encoding".into(),
            ))
        }
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_map(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
