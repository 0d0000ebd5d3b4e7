//! # Document Value Model
//!
//! Schemaless, nested, MongoDB-style values as they travel into the D2R
//! translator and back out of the R2D translator.
//!
//! ## Design Decisions
//!
//! - **Closed enum**: every value the engine can store is a `KvValue` variant,
//!   so "unknown type" can only arise at the conversion boundary (see `json`)
//! - **Order-insensitive documents**: `KvDocument` keeps insertion order for
//!   display but compares as a map, since reconstruction emits members in
//!   schema order
//! - **Cheap clones**: strings and binaries are `Arc`-backed
//!
//! ## Usage
//!
//! ```rust
//! use docpart::kvdocument::{KvDocument, KvValue};
//!
//! let doc = KvDocument::builder()
//!     .put("name", KvValue::string("John"))
//!     .put("age", KvValue::Integer(34))
//!     .build();
//!
//! assert_eq!(doc.get("name").and_then(KvValue::as_str), Some("John"));
//! ```

pub mod json;

pub use json::{from_json, from_json_str, to_json, JsonConversionError};

use crate::meta::FieldType;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// 12-byte MongoDB object id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Parse the canonical 24 character hex form
    pub fn parse_hex(hex: &str) -> Option<Self> {
        if hex.len() != 24 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(ObjectId(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

/// MongoDB internal timestamp: seconds since epoch plus an ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MongoTimestamp {
    pub seconds: u32,
    pub ordinal: u32,
}

impl MongoTimestamp {
    pub fn new(seconds: u32, ordinal: u32) -> Self {
        MongoTimestamp { seconds, ordinal }
    }
}

/// A document value
#[derive(Debug, Clone, PartialEq)]
pub enum KvValue {
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(Arc<str>),
    /// Calendar date without time zone
    Date(NaiveDate),
    /// Time of day without date
    Time(NaiveTime),
    /// Point in time (BSON datetime)
    Instant(DateTime<Utc>),
    Binary(Arc<[u8]>),
    ObjectId(ObjectId),
    Timestamp(MongoTimestamp),
    Document(KvDocument),
    Array(KvArray),
}

impl KvValue {
    pub fn string(s: &str) -> Self {
        KvValue::String(Arc::from(s))
    }

    pub fn binary(bytes: &[u8]) -> Self {
        KvValue::Binary(Arc::from(bytes))
    }

    /// Everything except documents and arrays
    pub fn is_scalar(&self) -> bool {
        !matches!(self, KvValue::Document(_) | KvValue::Array(_))
    }

    /// Tag used by the schema registry for this value.
    /// Documents and arrays both report `CHILD`.
    pub fn field_type(&self) -> FieldType {
        match self {
            KvValue::Null => FieldType::Null,
            KvValue::Boolean(_) => FieldType::Boolean,
            KvValue::Integer(_) => FieldType::Integer,
            KvValue::Long(_) => FieldType::Long,
            KvValue::Double(_) => FieldType::Double,
            KvValue::String(_) => FieldType::String,
            KvValue::Date(_) => FieldType::Date,
            KvValue::Time(_) => FieldType::Time,
            KvValue::Instant(_) => FieldType::Instant,
            KvValue::Binary(_) => FieldType::Binary,
            KvValue::ObjectId(_) => FieldType::MongoObjectId,
            KvValue::Timestamp(_) => FieldType::MongoTimestamp,
            KvValue::Document(_) | KvValue::Array(_) => FieldType::Child,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KvValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KvValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KvValue::Integer(v) => Some(i64::from(*v)),
            KvValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&KvDocument> {
        match self {
            KvValue::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&KvArray> {
        match self {
            KvValue::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, KvValue::Null)
    }
}

impl fmt::Display for KvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvValue::Null => write!(f, "null"),
            KvValue::Boolean(b) => write!(f, "{b}"),
            KvValue::Integer(v) => write!(f, "{v}"),
            KvValue::Long(v) => write!(f, "{v}L"),
            KvValue::Double(v) => write!(f, "{v}"),
            KvValue::String(s) => write!(f, "\"{s}\""),
            KvValue::Date(d) => write!(f, "{d}"),
            KvValue::Time(t) => write!(f, "{t}"),
            KvValue::Instant(i) => write!(f, "{}", i.to_rfc3339()),
            KvValue::Binary(b) => write!(f, "<{} bytes>", b.len()),
            KvValue::ObjectId(oid) => write!(f, "{oid}"),
            KvValue::Timestamp(ts) => write!(f, "Timestamp({}, {})", ts.seconds, ts.ordinal),
            KvValue::Document(doc) => write!(f, "{doc}"),
            KvValue::Array(array) => write!(f, "{array}"),
        }
    }
}

impl From<KvDocument> for KvValue {
    fn from(doc: KvDocument) -> Self {
        KvValue::Document(doc)
    }
}

impl From<KvArray> for KvValue {
    fn from(array: KvArray) -> Self {
        KvValue::Array(array)
    }
}

/// Nested document. Members keep insertion order; equality ignores it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KvDocument {
    entries: IndexMap<Arc<str>, KvValue>,
}

impl KvDocument {
    pub fn new() -> Self {
        KvDocument {
            entries: IndexMap::new(),
        }
    }

    pub fn builder() -> KvDocumentBuilder {
        KvDocumentBuilder::default()
    }

    pub fn get(&self, key: &str) -> Option<&KvValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a member, returning the previous value under the same key
    pub fn insert(&mut self, key: impl Into<Arc<str>>, value: KvValue) -> Option<KvValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Members in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KvValue)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(AsRef::as_ref)
    }
}

impl fmt::Display for KvDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{key}\": {value}")?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<Arc<str>>> FromIterator<(K, KvValue)> for KvDocument {
    fn from_iter<I: IntoIterator<Item = (K, KvValue)>>(iter: I) -> Self {
        KvDocument {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Fluent builder for `KvDocument`
#[derive(Debug, Default)]
pub struct KvDocumentBuilder {
    doc: KvDocument,
}

impl KvDocumentBuilder {
    #[must_use]
    pub fn put(mut self, key: &str, value: impl Into<KvValue>) -> Self {
        self.doc.insert(key, value.into());
        self
    }

    pub fn put_value(&mut self, key: &str, value: KvValue) -> &mut Self {
        self.doc.insert(key, value);
        self
    }

    pub fn build(self) -> KvDocument {
        self.doc
    }
}

/// Ordered array of values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KvArray {
    elements: Vec<KvValue>,
}

impl KvArray {
    pub fn new(elements: Vec<KvValue>) -> Self {
        KvArray { elements }
    }

    pub fn empty() -> Self {
        KvArray {
            elements: Vec::new(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&KvValue> {
        self.elements.get(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KvValue> {
        self.elements.iter()
    }

    pub fn into_vec(self) -> Vec<KvValue> {
        self.elements
    }
}

impl fmt::Display for KvArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "]")
    }
}

impl FromIterator<KvValue> for KvArray {
    fn from_iter<I: IntoIterator<Item = KvValue>>(iter: I) -> Self {
        KvArray {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a KvArray {
    type Item = &'a KvValue;
    type IntoIter = std::slice::Iter<'a, KvValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// A reconstructed top-level document and the id of its root row
#[derive(Debug, Clone, PartialEq)]
pub struct ToroDocument {
    pub did: i32,
    pub root: KvDocument,
}

impl ToroDocument {
    pub fn new(did: i32, root: KvDocument) -> Self {
        ToroDocument { did, root }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_equality_ignores_member_order() {
        let a = KvDocument::builder()
            .put("x", KvValue::Integer(1))
            .put("y", KvValue::string("b"))
            .build();
        let b = KvDocument::builder()
            .put("y", KvValue::string("b"))
            .put("x", KvValue::Integer(1))
            .build();
        assert_eq!(a, b);
    }

    #[test]
    fn test_array_equality_respects_order() {
        let a = KvArray::new(vec![KvValue::Integer(1), KvValue::Integer(2)]);
        let b = KvArray::new(vec![KvValue::Integer(2), KvValue::Integer(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_field_type_of_containers_is_child() {
        assert_eq!(KvValue::Document(KvDocument::new()).field_type(), FieldType::Child);
        assert_eq!(KvValue::Array(KvArray::empty()).field_type(), FieldType::Child);
        assert!(!KvValue::Array(KvArray::empty()).is_scalar());
        assert!(KvValue::Null.is_scalar());
    }

    #[test]
    fn test_object_id_hex() {
        let oid = ObjectId::parse_hex("5298a5a03b3f4220588fe57c").unwrap();
        assert_eq!(oid.to_hex(), "5298a5a03b3f4220588fe57c");
        assert_eq!(oid.bytes()[0], 0x52);
        assert!(ObjectId::parse_hex("zz98a5a03b3f4220588fe57c").is_none());
        assert!(ObjectId::parse_hex("5298").is_none());
    }

    #[test]
    fn test_display_nested() {
        let doc = KvDocument::builder()
            .put("a", KvArray::new(vec![KvValue::Integer(1), KvValue::Null]))
            .build();
        assert_eq!(doc.to_string(), "{\"a\": [1, null]}");
    }
}
