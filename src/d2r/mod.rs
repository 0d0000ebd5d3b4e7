//! # D2R: Document to Relational
//!
//! Splits documents into rows across the doc part tables of a collection.
//!
//! ```text
//! {"name": "John", "address": {"street": "X"}, "months": [1, 2]}
//!
//! ""        did=0 rid=0                name_s="John" address_e=false months_e=true
//! address   did=0 rid=0 pid=0          street_s="X"
//! months    did=0 rid=0 pid=0 seq=0    v_i=1
//! months    did=0 rid=1 pid=0 seq=1    v_i=2
//! ```
//!
//! A document is translated in two steps. The walk builds rows against
//! path-local column keys and allocates row ids. Only when the whole
//! document walked successfully are doc parts, fields and scalars resolved
//! in the schema registry and the rows merged into the `CollectionData`.
//! A failing document therefore adds no rows and no schema elements.

mod doc_part;
mod error;
pub mod path_stack;

pub use doc_part::{CellValue, ChildKind, CollectionData, DocPartData, DocPartRow};
pub use error::{TranslationError, TranslationResult};

use crate::config::TranslationConfig;
use crate::kvdocument::{KvArray, KvDocument, KvValue};
use crate::meta::{CollectionMetaInfo, FieldType, MetaDocPart, MetaField, MetaScalar};
use crate::table_ref::TableRef;
use indexmap::IndexMap;
use path_stack::{FrameKind, PathContext, PathStack};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ColumnKey {
    Field(Arc<str>, FieldType),
    Scalar(FieldType),
}

#[derive(Debug, Clone)]
enum Column {
    Field(Arc<MetaField>),
    Scalar(Arc<MetaScalar>),
}

#[derive(Debug)]
struct PendingRow {
    did: i32,
    rid: i32,
    pid: Option<i32>,
    seq: Option<i32>,
    cells: Vec<(ColumnKey, CellValue)>,
}

impl PendingRow {
    fn new(did: i32, rid: i32, pid: Option<i32>, seq: Option<i32>) -> Self {
        PendingRow {
            did,
            rid,
            pid,
            seq,
            cells: Vec::new(),
        }
    }

    fn field(&mut self, name: &str, value: CellValue) {
        let key = ColumnKey::Field(Arc::from(name), value.field_type());
        self.cells.push((key, value));
    }

    fn scalar(&mut self, value: CellValue) {
        self.cells.push((ColumnKey::Scalar(value.field_type()), value));
    }
}

/// Rows of one document, grouped by table in first-visit order
#[derive(Debug)]
struct PendingDocument {
    did: i32,
    tables: IndexMap<TableRef, Vec<PendingRow>>,
}

impl PendingDocument {
    fn new(did: i32) -> Self {
        PendingDocument {
            did,
            tables: IndexMap::new(),
        }
    }

    /// Register a visit, so that empty arrays still produce their table
    fn touch(&mut self, table_ref: &TableRef) {
        if !self.tables.contains_key(table_ref) {
            self.tables.insert(table_ref.clone(), Vec::new());
        }
    }

    fn push(&mut self, table_ref: &TableRef, row: PendingRow) {
        self.tables.entry(table_ref.clone()).or_default().push(row);
    }

    fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

/// Translates documents of one collection into `CollectionData`
#[derive(Debug)]
pub struct D2RTranslator {
    meta: CollectionMetaInfo,
    max_nesting_depth: usize,
    stack: PathStack,
    data: CollectionData,
}

impl D2RTranslator {
    pub fn new(meta: &CollectionMetaInfo, config: &TranslationConfig) -> Self {
        D2RTranslator {
            meta: meta.clone(),
            max_nesting_depth: config.max_nesting_depth,
            stack: PathStack::new(),
            data: CollectionData::new(),
        }
    }

    /// Translate one document, returning its did
    pub fn translate(&mut self, document: &KvDocument) -> TranslationResult<i32> {
        self.stack.clear();
        let result = self.walk(document).and_then(|pending| self.commit(pending));
        self.stack.clear();

        match &result {
            Ok(did) => tracing::debug!(
                collection = self.meta.collection(),
                did,
                tables = self.data.len(),
                "document_translated"
            ),
            Err(e) => tracing::warn!(
                collection = self.meta.collection(),
                error = %e,
                "document_translation_failed"
            ),
        }
        result
    }

    /// Rows collected so far
    pub fn collection_data(&self) -> &CollectionData {
        &self.data
    }

    pub fn into_collection_data(self) -> CollectionData {
        self.data
    }

    fn enter(&mut self, table_ref: TableRef, rid: i32, kind: FrameKind) -> TranslationResult<PathContext> {
        if self.stack.depth() >= self.max_nesting_depth {
            return Err(TranslationError::NestingTooDeep {
                limit: self.max_nesting_depth,
                path: table_ref.to_string(),
                enclosing: self.stack.describe(),
            });
        }
        self.stack.push(table_ref.clone(), rid, kind);
        Ok(PathContext {
            table_ref,
            rid,
            kind,
        })
    }

    fn walk(&mut self, document: &KvDocument) -> TranslationResult<PendingDocument> {
        let root = TableRef::root();
        let did = self.meta.next_row_id(&root)?;
        let mut pending = PendingDocument::new(did);
        pending.touch(&root);

        let frame = self.enter(root, did, FrameKind::Document)?;
        let mut row = PendingRow::new(did, did, None, None);
        self.visit_document(document, &frame, &mut row, &mut pending)?;
        self.stack.pop();
        pending.push(&frame.table_ref, row);
        Ok(pending)
    }

    fn visit_document(
        &mut self,
        document: &KvDocument,
        frame: &PathContext,
        row: &mut PendingRow,
        pending: &mut PendingDocument,
    ) -> TranslationResult<()> {
        for (key, value) in document.iter() {
            match value {
                KvValue::Document(sub) => {
                    row.field(key, CellValue::Child(ChildKind::IsDocument));
                    let child_ref = frame.table_ref.child(key);
                    pending.touch(&child_ref);
                    let rid = self.meta.next_row_id(&child_ref)?;
                    let child_frame = self.enter(child_ref, rid, FrameKind::Document)?;
                    let mut child_row = PendingRow::new(pending.did, rid, Some(row.rid), None);
                    self.visit_document(sub, &child_frame, &mut child_row, pending)?;
                    self.stack.pop();
                    pending.push(&child_frame.table_ref, child_row);
                }
                KvValue::Array(array) => {
                    row.field(key, CellValue::Child(ChildKind::IsArray));
                    let child_ref = frame.table_ref.child(key);
                    let array_frame =
                        self.enter(child_ref, row.rid, FrameKind::Array { dimension: 1 })?;
                    self.visit_array(array, &array_frame, pending)?;
                    self.stack.pop();
                }
                scalar => row.field(key, CellValue::Scalar(scalar.clone())),
            }
        }
        Ok(())
    }

    /// Each element becomes a row of the array's table; `frame.rid` is the
    /// row holding the `CHILD` flag
    fn visit_array(
        &mut self,
        array: &KvArray,
        frame: &PathContext,
        pending: &mut PendingDocument,
    ) -> TranslationResult<()> {
        let table_ref = &frame.table_ref;
        let dimension = match frame.kind {
            FrameKind::Array { dimension } => dimension,
            FrameKind::Document => 1,
        };
        if i32::try_from(array.len()).is_err() {
            return Err(TranslationError::ArrayTooLarge {
                path: table_ref.to_string(),
                len: array.len(),
            });
        }
        pending.touch(table_ref);

        for (index, element) in array.iter().enumerate() {
            let rid = self.meta.next_row_id(table_ref)?;
            let mut row = PendingRow::new(pending.did, rid, Some(frame.rid), Some(index as i32));
            match element {
                KvValue::Document(sub) => {
                    let element_frame = self.enter(table_ref.clone(), rid, FrameKind::Document)?;
                    self.visit_document(sub, &element_frame, &mut row, pending)?;
                    self.stack.pop();
                }
                KvValue::Array(inner) => {
                    row.scalar(CellValue::Child(ChildKind::IsArray));
                    let inner_ref = table_ref.array_child(dimension + 1);
                    let inner_frame = self.enter(
                        inner_ref,
                        rid,
                        FrameKind::Array {
                            dimension: dimension + 1,
                        },
                    )?;
                    self.visit_array(inner, &inner_frame, pending)?;
                    self.stack.pop();
                }
                scalar => row.scalar(CellValue::Scalar(scalar.clone())),
            }
            pending.push(table_ref, row);
        }
        Ok(())
    }

    /// Resolve every column first so that a registry failure leaves the
    /// collected rows untouched
    fn commit(&mut self, pending: PendingDocument) -> TranslationResult<i32> {
        let did = pending.did;
        let rows = pending.row_count();
        let mut resolved: Vec<(Arc<MetaDocPart>, Vec<(PendingRow, Vec<Column>)>)> =
            Vec::with_capacity(pending.tables.len());

        for (table_ref, table_rows) in pending.tables {
            let doc_part = self.meta.resolve_doc_part(&table_ref)?;
            let mut columns: HashMap<ColumnKey, Column> = HashMap::new();
            let mut resolved_rows = Vec::with_capacity(table_rows.len());
            for row in table_rows {
                let mut row_columns = Vec::with_capacity(row.cells.len());
                for (key, _) in &row.cells {
                    let column = match columns.get(key) {
                        Some(column) => column.clone(),
                        None => {
                            let column = self.resolve_column(&doc_part, key)?;
                            columns.insert(key.clone(), column.clone());
                            column
                        }
                    };
                    row_columns.push(column);
                }
                resolved_rows.push((row, row_columns));
            }
            resolved.push((doc_part, resolved_rows));
        }

        for (doc_part, table_rows) in resolved {
            let data = self.data.doc_part_mut(&doc_part);
            for (pending_row, row_columns) in table_rows {
                let mut row =
                    DocPartRow::new(pending_row.did, pending_row.rid, pending_row.pid, pending_row.seq);
                for ((_, value), column) in pending_row.cells.into_iter().zip(row_columns) {
                    match column {
                        Column::Field(field) => {
                            let index = data.field_column(field);
                            row.set_field(index, value);
                        }
                        Column::Scalar(scalar) => {
                            let index = data.scalar_column(scalar);
                            row.set_scalar(index, value);
                        }
                    }
                }
                data.push_row(row);
            }
        }

        self.data.record_document(did);
        tracing::trace!(collection = self.meta.collection(), did, rows, "document_rows_committed");
        Ok(did)
    }

    fn resolve_column(&self, doc_part: &MetaDocPart, key: &ColumnKey) -> TranslationResult<Column> {
        Ok(match key {
            ColumnKey::Field(name, field_type) => {
                Column::Field(self.meta.resolve_field(doc_part, name, *field_type)?)
            }
            ColumnKey::Scalar(field_type) => {
                Column::Scalar(self.meta.resolve_scalar(doc_part, *field_type))
            }
        })
    }
}
