use crate::d2r::CellValue;
use crate::meta::{MetaDocPart, MetaField, MetaScalar};
use crate::table_ref::TableRef;
use std::sync::Arc;

/// One stored row as read back. `values` are positional: scalar columns
/// first, then field columns, matching the enclosing `DocPartResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocPartResultRow {
    pub did: i32,
    pub rid: i32,
    pub pid: Option<i32>,
    pub seq: Option<i32>,
    pub values: Vec<Option<CellValue>>,
}

impl DocPartResultRow {
    pub fn new(did: i32, rid: i32, pid: Option<i32>, seq: Option<i32>, values: Vec<Option<CellValue>>) -> Self {
        DocPartResultRow {
            did,
            rid,
            pid,
            seq,
            values,
        }
    }
}

/// A block of rows of one table, with the columns they are laid out by
#[derive(Debug, Clone)]
pub struct DocPartResult {
    pub table_ref: TableRef,
    pub scalars: Vec<Arc<MetaScalar>>,
    pub fields: Vec<Arc<MetaField>>,
    pub rows: Vec<DocPartResultRow>,
}

impl DocPartResult {
    /// Snapshot the current columns of `meta`
    pub fn from_meta(meta: &MetaDocPart, rows: Vec<DocPartResultRow>) -> Self {
        DocPartResult {
            table_ref: meta.table_ref().clone(),
            scalars: meta.scalars(),
            fields: meta.fields(),
            rows,
        }
    }

    pub fn depth(&self) -> usize {
        self.table_ref.depth()
    }

    pub fn column_count(&self) -> usize {
        self.scalars.len() + self.fields.len()
    }
}
