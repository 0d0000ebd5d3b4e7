//! # Schema Registry
//!
//! Per-collection catalog of doc parts discovered while translating
//! documents. A doc part is the virtual table behind one `TableRef`; it owns
//! the named fields (`MetaField`) seen as object members at that position and
//! the unnamed scalar slots (`MetaScalar`) seen as direct array elements.
//!
//! The catalog only grows. Every lookup is a get-or-create that converges on
//! a single canonical instance when several translators discover the same
//! path or field at once:
//!
//! ```text
//! MetaCollection
//!   `-- IndexMap<TableRef, Arc<MetaDocPart>>   (arena, stable keys)
//!         `-- MetaDocPart
//!               |-- IndexMap<(name, FieldType), Arc<MetaField>>
//!               `-- IndexMap<FieldType, Arc<MetaScalar>>
//! ```

mod collection_info;
pub mod id_generator;
pub mod identifier;

pub use collection_info::CollectionMetaInfo;
pub use id_generator::{IdGeneratorError, InMemoryReservedIdGenerator, ReservedIdGenerator};
pub use identifier::{IdentifierError, IdentifierFactory};

use crate::table_ref::TableRef;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Value-kind tag of a stored column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldType {
    Boolean,
    Integer,
    Long,
    Double,
    String,
    Date,
    Time,
    Instant,
    Binary,
    MongoObjectId,
    MongoTimestamp,
    Null,
    /// Boolean flag: the member's value lives in a child table.
    /// `true` means the occurrence was an array, `false` a sub-document.
    Child,
}

impl FieldType {
    pub const ALL: [FieldType; 13] = [
        FieldType::Boolean,
        FieldType::Integer,
        FieldType::Long,
        FieldType::Double,
        FieldType::String,
        FieldType::Date,
        FieldType::Time,
        FieldType::Instant,
        FieldType::Binary,
        FieldType::MongoObjectId,
        FieldType::MongoTimestamp,
        FieldType::Null,
        FieldType::Child,
    ];

    pub fn is_child(self) -> bool {
        self == FieldType::Child
    }

    /// Single character appended to physical column names
    pub fn type_identifier(self) -> char {
        match self {
            FieldType::Binary => 'r',
            FieldType::Boolean => 'b',
            FieldType::Date => 'c',
            FieldType::Double => 'd',
            FieldType::Instant => 'g',
            FieldType::Integer => 'i',
            FieldType::Long => 'l',
            FieldType::MongoObjectId => 'x',
            FieldType::MongoTimestamp => 'y',
            FieldType::Null => 'n',
            FieldType::String => 's',
            FieldType::Time => 't',
            FieldType::Child => 'e',
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "BOOLEAN",
            FieldType::Integer => "INTEGER",
            FieldType::Long => "LONG",
            FieldType::Double => "DOUBLE",
            FieldType::String => "STRING",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::Instant => "INSTANT",
            FieldType::Binary => "BINARY",
            FieldType::MongoObjectId => "MONGO_OBJECT_ID",
            FieldType::MongoTimestamp => "MONGO_TIMESTAMP",
            FieldType::Null => "NULL",
            FieldType::Child => "CHILD",
        };
        write!(f, "{name}")
    }
}

/// Named column of a doc part: an object member of a given type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaField {
    name: Arc<str>,
    identifier: String,
    field_type: FieldType,
}

impl MetaField {
    pub fn new(name: &str, identifier: impl Into<String>, field_type: FieldType) -> Self {
        MetaField {
            name: Arc::from(name),
            identifier: identifier.into(),
            field_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

/// Unnamed column of a doc part: an array element of a given type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaScalar {
    identifier: String,
    field_type: FieldType,
}

impl MetaScalar {
    pub fn new(identifier: impl Into<String>, field_type: FieldType) -> Self {
        MetaScalar {
            identifier: identifier.into(),
            field_type,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

#[derive(Debug, Default)]
struct Columns {
    fields: IndexMap<(Arc<str>, FieldType), Arc<MetaField>>,
    scalars: IndexMap<FieldType, Arc<MetaScalar>>,
    identifiers: HashSet<String>,
}

/// Schema entry for one `TableRef` of a collection
#[derive(Debug)]
pub struct MetaDocPart {
    table_ref: TableRef,
    identifier: String,
    columns: RwLock<Columns>,
}

impl MetaDocPart {
    pub fn new(table_ref: TableRef, identifier: impl Into<String>) -> Self {
        MetaDocPart {
            table_ref,
            identifier: identifier.into(),
            columns: RwLock::new(Columns::default()),
        }
    }

    pub fn table_ref(&self) -> &TableRef {
        &self.table_ref
    }

    /// Physical table identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn get_field(&self, name: &str, field_type: FieldType) -> Option<Arc<MetaField>> {
        let columns = self.columns.read();
        columns
            .fields
            .get(&(Arc::from(name), field_type))
            .cloned()
    }

    pub fn get_scalar(&self, field_type: FieldType) -> Option<Arc<MetaScalar>> {
        self.columns.read().scalars.get(&field_type).cloned()
    }

    /// Snapshot of the fields, in discovery order
    pub fn fields(&self) -> Vec<Arc<MetaField>> {
        self.columns.read().fields.values().cloned().collect()
    }

    /// Snapshot of the scalars, in discovery order
    pub fn scalars(&self) -> Vec<Arc<MetaScalar>> {
        self.columns.read().scalars.values().cloned().collect()
    }

    pub fn field_count(&self) -> usize {
        self.columns.read().fields.len()
    }

    pub fn scalar_count(&self) -> usize {
        self.columns.read().scalars.len()
    }

    /// Get or create the field `(name, field_type)`.
    ///
    /// Returns the canonical instance and whether this call created it.
    pub fn resolve_field(
        &self,
        name: &str,
        field_type: FieldType,
        factory: &IdentifierFactory,
    ) -> Result<(Arc<MetaField>, bool), IdentifierError> {
        let key = (Arc::<str>::from(name), field_type);
        if let Some(field) = self.columns.read().fields.get(&key) {
            return Ok((field.clone(), false));
        }

        let mut columns = self.columns.write();
        if let Some(field) = columns.fields.get(&key) {
            return Ok((field.clone(), false));
        }
        let identifier =
            factory.field_identifier(name, field_type, |c| columns.identifiers.contains(c))?;
        let field = Arc::new(MetaField::new(name, identifier.clone(), field_type));
        columns.identifiers.insert(identifier);
        columns.fields.insert(key, field.clone());
        Ok((field, true))
    }

    /// Get or create the scalar slot for `field_type`
    pub fn resolve_scalar(&self, field_type: FieldType) -> (Arc<MetaScalar>, bool) {
        if let Some(scalar) = self.columns.read().scalars.get(&field_type) {
            return (scalar.clone(), false);
        }

        let mut columns = self.columns.write();
        if let Some(scalar) = columns.scalars.get(&field_type) {
            return (scalar.clone(), false);
        }
        let identifier = IdentifierFactory::scalar_identifier(field_type);
        let scalar = Arc::new(MetaScalar::new(identifier.clone(), field_type));
        columns.identifiers.insert(identifier);
        columns.scalars.insert(field_type, scalar.clone());
        (scalar, true)
    }
}

#[derive(Debug, Default)]
struct DocPartArena {
    by_ref: IndexMap<TableRef, Arc<MetaDocPart>>,
    identifiers: HashSet<String>,
}

/// Mutable catalog of one collection's doc parts
#[derive(Debug)]
pub struct MetaCollection {
    name: String,
    doc_parts: RwLock<DocPartArena>,
}

impl MetaCollection {
    pub fn new(name: &str) -> Self {
        MetaCollection {
            name: name.to_string(),
            doc_parts: RwLock::new(DocPartArena::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_doc_part(&self, table_ref: &TableRef) -> Option<Arc<MetaDocPart>> {
        self.doc_parts.read().by_ref.get(table_ref).cloned()
    }

    /// All doc parts in discovery order
    pub fn doc_parts(&self) -> Vec<Arc<MetaDocPart>> {
        self.doc_parts.read().by_ref.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.doc_parts.read().by_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_parts.read().by_ref.is_empty()
    }

    /// Get or create the doc part for `table_ref`.
    ///
    /// Returns the canonical instance and whether this call created it.
    pub fn resolve_doc_part(
        &self,
        table_ref: &TableRef,
        factory: &IdentifierFactory,
    ) -> Result<(Arc<MetaDocPart>, bool), IdentifierError> {
        if let Some(doc_part) = self.doc_parts.read().by_ref.get(table_ref) {
            return Ok((doc_part.clone(), false));
        }

        let mut arena = self.doc_parts.write();
        if let Some(doc_part) = arena.by_ref.get(table_ref) {
            return Ok((doc_part.clone(), false));
        }
        let identifier = factory.doc_part_identifier(&self.name, table_ref, |c| {
            arena.identifiers.contains(c)
        })?;
        let doc_part = Arc::new(MetaDocPart::new(table_ref.clone(), identifier.clone()));
        arena.identifiers.insert(identifier);
        arena.by_ref.insert(table_ref.clone(), doc_part.clone());
        Ok((doc_part, true))
    }
}
