//! Row batches produced by D2R.
//!
//! A `DocPartData` collects the rows of one table together with the columns
//! they use, in first-use order. Rows are kept padded to the column count:
//! adding a column appends an empty cell to every existing row.

use crate::kvdocument::KvValue;
use crate::meta::{FieldType, MetaDocPart, MetaField, MetaScalar};
use crate::table_ref::TableRef;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Which container a `CHILD` column points at for one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    IsArray,
    IsDocument,
}

impl ChildKind {
    /// Stored boolean: `true` for arrays
    pub fn as_flag(self) -> bool {
        self == ChildKind::IsArray
    }

    pub fn from_flag(is_array: bool) -> Self {
        if is_array {
            ChildKind::IsArray
        } else {
            ChildKind::IsDocument
        }
    }
}

/// Content of one stored cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Scalar(KvValue),
    Child(ChildKind),
}

impl CellValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            CellValue::Scalar(value) => value.field_type(),
            CellValue::Child(_) => FieldType::Child,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Scalar(value) => write!(f, "{value}"),
            CellValue::Child(kind) => write!(f, "CHILD({})", kind.as_flag()),
        }
    }
}

/// One row of a doc part table
#[derive(Debug, Clone, PartialEq)]
pub struct DocPartRow {
    did: i32,
    rid: i32,
    pid: Option<i32>,
    seq: Option<i32>,
    scalar_values: Vec<Option<CellValue>>,
    field_values: Vec<Option<CellValue>>,
}

impl DocPartRow {
    pub fn new(did: i32, rid: i32, pid: Option<i32>, seq: Option<i32>) -> Self {
        DocPartRow {
            did,
            rid,
            pid,
            seq,
            scalar_values: Vec::new(),
            field_values: Vec::new(),
        }
    }

    pub fn did(&self) -> i32 {
        self.did
    }

    pub fn rid(&self) -> i32 {
        self.rid
    }

    pub fn pid(&self) -> Option<i32> {
        self.pid
    }

    pub fn seq(&self) -> Option<i32> {
        self.seq
    }

    /// Scalar cells, aligned with `DocPartData::scalars`
    pub fn scalar_values(&self) -> &[Option<CellValue>] {
        &self.scalar_values
    }

    /// Field cells, aligned with `DocPartData::fields`
    pub fn field_values(&self) -> &[Option<CellValue>] {
        &self.field_values
    }

    pub fn scalar_value(&self, index: usize) -> Option<&CellValue> {
        self.scalar_values.get(index).and_then(Option::as_ref)
    }

    pub fn field_value(&self, index: usize) -> Option<&CellValue> {
        self.field_values.get(index).and_then(Option::as_ref)
    }

    /// All cells in storage order: scalars first, then fields
    pub fn values(&self) -> impl Iterator<Item = Option<&CellValue>> {
        self.scalar_values
            .iter()
            .chain(self.field_values.iter())
            .map(Option::as_ref)
    }

    pub(crate) fn set_scalar(&mut self, index: usize, value: CellValue) {
        if self.scalar_values.len() <= index {
            self.scalar_values.resize(index + 1, None);
        }
        self.scalar_values[index] = Some(value);
    }

    pub(crate) fn set_field(&mut self, index: usize, value: CellValue) {
        if self.field_values.len() <= index {
            self.field_values.resize(index + 1, None);
        }
        self.field_values[index] = Some(value);
    }

    fn pad(&mut self, scalars: usize, fields: usize) {
        if self.scalar_values.len() < scalars {
            self.scalar_values.resize(scalars, None);
        }
        if self.field_values.len() < fields {
            self.field_values.resize(fields, None);
        }
    }
}

/// Rows of one table collected by a translator
#[derive(Debug, Clone)]
pub struct DocPartData {
    meta: Arc<MetaDocPart>,
    scalars: IndexMap<FieldType, Arc<MetaScalar>>,
    fields: IndexMap<(Arc<str>, FieldType), Arc<MetaField>>,
    rows: Vec<DocPartRow>,
}

impl DocPartData {
    pub fn new(meta: Arc<MetaDocPart>) -> Self {
        DocPartData {
            meta,
            scalars: IndexMap::new(),
            fields: IndexMap::new(),
            rows: Vec::new(),
        }
    }

    pub fn meta_doc_part(&self) -> &Arc<MetaDocPart> {
        &self.meta
    }

    pub fn table_ref(&self) -> &TableRef {
        self.meta.table_ref()
    }

    /// Table whose rows are referenced by `pid`, `None` for the root
    pub fn parent_table_ref(&self) -> Option<&TableRef> {
        self.meta.table_ref().parent()
    }

    pub fn scalars(&self) -> impl Iterator<Item = &Arc<MetaScalar>> {
        self.scalars.values()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Arc<MetaField>> {
        self.fields.values()
    }

    pub fn scalar_count(&self) -> usize {
        self.scalars.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn column_count(&self) -> usize {
        self.scalars.len() + self.fields.len()
    }

    pub fn rows(&self) -> &[DocPartRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position of the scalar slot, adding it when unused so far
    pub(crate) fn scalar_column(&mut self, scalar: Arc<MetaScalar>) -> usize {
        let key = scalar.field_type();
        if let Some(index) = self.scalars.get_index_of(&key) {
            return index;
        }
        let (index, _) = self.scalars.insert_full(key, scalar);
        self.pad_rows();
        index
    }

    /// Column position of the field, adding it when unused so far
    pub(crate) fn field_column(&mut self, field: Arc<MetaField>) -> usize {
        let key = (Arc::<str>::from(field.name()), field.field_type());
        if let Some(index) = self.fields.get_index_of(&key) {
            return index;
        }
        let (index, _) = self.fields.insert_full(key, field);
        self.pad_rows();
        index
    }

    pub(crate) fn push_row(&mut self, mut row: DocPartRow) {
        row.pad(self.scalars.len(), self.fields.len());
        self.rows.push(row);
    }

    fn pad_rows(&mut self) {
        let (scalars, fields) = (self.scalars.len(), self.fields.len());
        for row in &mut self.rows {
            row.pad(scalars, fields);
        }
    }
}

/// Everything produced by one translator, keyed by table
#[derive(Debug, Default, Clone)]
pub struct CollectionData {
    doc_parts: IndexMap<TableRef, DocPartData>,
    dids: Vec<i32>,
}

impl CollectionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table_ref: &TableRef) -> Option<&DocPartData> {
        self.doc_parts.get(table_ref)
    }

    /// Number of tables touched
    pub fn len(&self) -> usize {
        self.doc_parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_parts.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.doc_parts.values().map(DocPartData::row_count).sum()
    }

    /// Ids of the documents translated so far, in translation order
    pub fn dids(&self) -> &[i32] {
        &self.dids
    }

    pub fn document_count(&self) -> usize {
        self.dids.len()
    }

    /// Tables with every parent before its children: by depth, then by
    /// first use
    pub fn ordered_doc_part_data(&self) -> Vec<&DocPartData> {
        let mut ordered: Vec<&DocPartData> = self.doc_parts.values().collect();
        ordered.sort_by_key(|data| data.table_ref().depth());
        ordered
    }

    /// Owned variant of [`CollectionData::ordered_doc_part_data`]
    pub fn into_ordered_doc_part_data(self) -> Vec<DocPartData> {
        let mut ordered: Vec<DocPartData> = self.doc_parts.into_values().collect();
        ordered.sort_by_key(|data| data.table_ref().depth());
        ordered
    }

    pub(crate) fn doc_part_mut(&mut self, meta: &Arc<MetaDocPart>) -> &mut DocPartData {
        self.doc_parts
            .entry(meta.table_ref().clone())
            .or_insert_with(|| DocPartData::new(meta.clone()))
    }

    pub(crate) fn record_document(&mut self, did: i32) {
        self.dids.push(did);
    }
}
