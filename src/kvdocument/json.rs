//! JSON conversion for documents.
//!
//! Integral numbers become `Integer` when they fit in 32 bits and `Long`
//! otherwise. Extended JSON wrappers `{"$oid": ...}` and `{"$date": ...}`
//! are recognized in both directions.

use super::{KvArray, KvDocument, KvValue, ObjectId};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Number, Value as JsonValue};

const OID_KEY: &str = "$oid";
const DATE_KEY: &str = "$date";

/// Errors converting JSON into documents
#[derive(Debug, Clone, thiserror::Error)]
pub enum JsonConversionError {
    /// The top level JSON value is not an object
    #[error("Expected a JSON object at top level, found {0}")]
    NotAnObject(&'static str),
    /// The number can't be represented as i32, i64 or f64
    #[error("Unsupported number at '{path}': {number}")]
    UnsupportedNumber { path: String, number: String },
    /// Malformed extended JSON wrapper
    #[error("Invalid {kind} at '{path}': {reason}")]
    InvalidExtendedJson {
        kind: &'static str,
        path: String,
        reason: String,
    },
    /// Input text is not valid JSON
    #[error("JSON parse error: {0}")]
    Parse(String),
}

/// Parse a JSON text into a document
pub fn from_json_str(text: &str) -> Result<KvDocument, JsonConversionError> {
    let value: JsonValue =
        serde_json::from_str(text).map_err(|e| JsonConversionError::Parse(e.to_string()))?;
    from_json(&value)
}

/// Convert a JSON object into a document
pub fn from_json(value: &JsonValue) -> Result<KvDocument, JsonConversionError> {
    match value {
        JsonValue::Object(map) => translate_object(map, ""),
        other => Err(JsonConversionError::NotAnObject(json_kind(other))),
    }
}

/// Convert a document into JSON, emitting extended JSON where needed
pub fn to_json(doc: &KvDocument) -> JsonValue {
    JsonValue::Object(
        doc.iter()
            .map(|(k, v)| (k.to_string(), value_to_json(v)))
            .collect(),
    )
}

fn translate_object(
    map: &Map<String, JsonValue>,
    path: &str,
) -> Result<KvDocument, JsonConversionError> {
    let mut doc = KvDocument::new();
    for (key, value) in map {
        let child_path = join_path(path, key);
        doc.insert(key.as_str(), translate(value, &child_path)?);
    }
    Ok(doc)
}

fn translate(value: &JsonValue, path: &str) -> Result<KvValue, JsonConversionError> {
    Ok(match value {
        JsonValue::Null => KvValue::Null,
        JsonValue::Bool(b) => KvValue::Boolean(*b),
        JsonValue::String(s) => KvValue::string(s),
        JsonValue::Number(n) => translate_number(n, path)?,
        JsonValue::Array(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for (i, element) in elements.iter().enumerate() {
                values.push(translate(element, &format!("{path}[{i}]"))?);
            }
            KvValue::Array(KvArray::new(values))
        }
        JsonValue::Object(map) => {
            if let Some(special) = translate_extended(map, path)? {
                special
            } else {
                KvValue::Document(translate_object(map, path)?)
            }
        }
    })
}

fn translate_number(n: &Number, path: &str) -> Result<KvValue, JsonConversionError> {
    if let Some(v) = n.as_i64() {
        return Ok(match i32::try_from(v) {
            Ok(small) => KvValue::Integer(small),
            Err(_) => KvValue::Long(v),
        });
    }
    if n.is_u64() {
        // Only reachable above i64::MAX
        return Err(JsonConversionError::UnsupportedNumber {
            path: path.to_string(),
            number: n.to_string(),
        });
    }
    match n.as_f64() {
        Some(v) => Ok(KvValue::Double(v)),
        None => Err(JsonConversionError::UnsupportedNumber {
            path: path.to_string(),
            number: n.to_string(),
        }),
    }
}

fn translate_extended(
    map: &Map<String, JsonValue>,
    path: &str,
) -> Result<Option<KvValue>, JsonConversionError> {
    if map.len() != 1 {
        return Ok(None);
    }
    if let Some(oid) = map.get(OID_KEY) {
        let hex = oid.as_str().ok_or_else(|| JsonConversionError::InvalidExtendedJson {
            kind: "$oid",
            path: path.to_string(),
            reason: "expected a string".to_string(),
        })?;
        let parsed =
            ObjectId::parse_hex(hex).ok_or_else(|| JsonConversionError::InvalidExtendedJson {
                kind: "$oid",
                path: path.to_string(),
                reason: format!("'{hex}' is not 24 hex characters"),
            })?;
        return Ok(Some(KvValue::ObjectId(parsed)));
    }
    if let Some(date) = map.get(DATE_KEY) {
        let instant = match date {
            JsonValue::Number(n) => n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            _ => None,
        };
        return match instant {
            Some(instant) => Ok(Some(KvValue::Instant(instant))),
            None => Err(JsonConversionError::InvalidExtendedJson {
                kind: "$date",
                path: path.to_string(),
                reason: format!("unparseable date {date}"),
            }),
        };
    }
    Ok(None)
}

fn value_to_json(value: &KvValue) -> JsonValue {
    match value {
        KvValue::Null => JsonValue::Null,
        KvValue::Boolean(b) => JsonValue::Bool(*b),
        KvValue::Integer(v) => JsonValue::from(*v),
        KvValue::Long(v) => JsonValue::from(*v),
        KvValue::Double(v) => Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number),
        KvValue::String(s) => JsonValue::String(s.to_string()),
        KvValue::Date(d) => JsonValue::String(d.to_string()),
        KvValue::Time(t) => JsonValue::String(t.to_string()),
        KvValue::Instant(i) => {
            let mut map = Map::new();
            map.insert(DATE_KEY.to_string(), JsonValue::from(i.timestamp_millis()));
            JsonValue::Object(map)
        }
        KvValue::Binary(bytes) => JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect()),
        KvValue::ObjectId(oid) => {
            let mut map = Map::new();
            map.insert(OID_KEY.to_string(), JsonValue::String(oid.to_hex()));
            JsonValue::Object(map)
        }
        KvValue::Timestamp(ts) => {
            let mut map = Map::new();
            map.insert("t".to_string(), JsonValue::from(ts.seconds));
            map.insert("i".to_string(), JsonValue::from(ts.ordinal));
            let mut wrapper = Map::new();
            wrapper.insert("$timestamp".to_string(), JsonValue::Object(map));
            JsonValue::Object(wrapper)
        }
        KvValue::Document(doc) => to_json(doc),
        KvValue::Array(array) => JsonValue::Array(array.iter().map(value_to_json).collect()),
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
