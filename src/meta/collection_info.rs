use super::{
    FieldType, IdGeneratorError, IdentifierError, IdentifierFactory, MetaCollection, MetaDocPart,
    MetaField, MetaScalar, ReservedIdGenerator,
};
use crate::table_ref::TableRef;
use std::sync::Arc;

/// One collection's schema registry bound to its row id source.
///
/// Clones share the registry and the id source, so one instance per
/// translating thread is the expected usage.
#[derive(Clone)]
pub struct CollectionMetaInfo {
    database: Arc<str>,
    meta: Arc<MetaCollection>,
    rid_generator: Arc<dyn ReservedIdGenerator>,
    identifiers: IdentifierFactory,
}

impl CollectionMetaInfo {
    pub fn new(
        database: &str,
        meta: Arc<MetaCollection>,
        rid_generator: Arc<dyn ReservedIdGenerator>,
        identifiers: IdentifierFactory,
    ) -> Self {
        CollectionMetaInfo {
            database: Arc::from(database),
            meta,
            rid_generator,
            identifiers,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        self.meta.name()
    }

    pub fn meta_collection(&self) -> &Arc<MetaCollection> {
        &self.meta
    }

    pub fn identifier_factory(&self) -> &IdentifierFactory {
        &self.identifiers
    }

    /// Fresh rid for a new row of `table_ref`
    pub fn next_row_id(&self, table_ref: &TableRef) -> Result<i32, IdGeneratorError> {
        self.rid_generator
            .next_rid(&self.database, self.meta.name(), table_ref)
    }

    pub fn resolve_doc_part(&self, table_ref: &TableRef) -> Result<Arc<MetaDocPart>, IdentifierError> {
        let (doc_part, created) = self.meta.resolve_doc_part(table_ref, &self.identifiers)?;
        if created {
            tracing::debug!(
                database = %self.database,
                collection = self.meta.name(),
                table = %table_ref,
                identifier = doc_part.identifier(),
                "doc_part_created"
            );
        }
        Ok(doc_part)
    }

    pub fn resolve_field(
        &self,
        doc_part: &MetaDocPart,
        name: &str,
        field_type: FieldType,
    ) -> Result<Arc<MetaField>, IdentifierError> {
        let (field, created) = doc_part.resolve_field(name, field_type, &self.identifiers)?;
        if created {
            tracing::debug!(
                collection = self.meta.name(),
                table = %doc_part.table_ref(),
                field = name,
                field_type = %field_type,
                identifier = field.identifier(),
                "field_created"
            );
        }
        Ok(field)
    }

    pub fn resolve_scalar(&self, doc_part: &MetaDocPart, field_type: FieldType) -> Arc<MetaScalar> {
        let (scalar, created) = doc_part.resolve_scalar(field_type);
        if created {
            tracing::debug!(
                collection = self.meta.name(),
                table = %doc_part.table_ref(),
                field_type = %field_type,
                identifier = scalar.identifier(),
                "scalar_created"
            );
        }
        scalar
    }

    /// Column identifier for `(name, field_type)` in `table_ref`, registering
    /// the doc part and field when unseen
    pub fn field_identifier(
        &self,
        table_ref: &TableRef,
        field_type: FieldType,
        name: &str,
    ) -> Result<String, IdentifierError> {
        let doc_part = self.resolve_doc_part(table_ref)?;
        let field = self.resolve_field(&doc_part, name, field_type)?;
        Ok(field.identifier().to_string())
    }

    pub fn scalar_identifier(&self, field_type: FieldType) -> String {
        IdentifierFactory::scalar_identifier(field_type)
    }
}

impl std::fmt::Debug for CollectionMetaInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionMetaInfo")
            .field("database", &self.database)
            .field("collection", &self.meta.name())
            .field("doc_parts", &self.meta.len())
            .finish()
    }
}
