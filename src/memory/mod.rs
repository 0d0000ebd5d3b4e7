//! In-memory doc part storage.
//!
//! Stands in for the relational backend: rows are stored per table with
//! their cells keyed by column, so columns added later read back as empty.
//! Reads hand out blocks in the order R2D expects, deepest table first and
//! the root table last.

use crate::d2r::{CellValue, CollectionData};
use crate::meta::{FieldType, MetaDocPart};
use crate::r2d::{DocPartResult, DocPartResultRow};
use crate::table_ref::TableRef;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredRow {
    pid: Option<i32>,
    seq: Option<i32>,
    scalars: HashMap<FieldType, CellValue>,
    fields: HashMap<(Arc<str>, FieldType), CellValue>,
}

#[derive(Debug)]
struct StoredTable {
    meta: Arc<MetaDocPart>,
    /// Keyed by (did, rid)
    rows: BTreeMap<(i32, i32), StoredRow>,
}

/// Thread-safe row store for one collection
#[derive(Debug, Default)]
pub struct MemoryDocPartStore {
    tables: RwLock<IndexMap<TableRef, StoredTable>>,
}

impl MemoryDocPartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every row of `data`, parents first. Returns the row count.
    pub fn write(&self, data: &CollectionData) -> usize {
        let mut tables = self.tables.write();
        let mut written = 0;

        for doc_part in data.ordered_doc_part_data() {
            let table = tables
                .entry(doc_part.table_ref().clone())
                .or_insert_with(|| StoredTable {
                    meta: doc_part.meta_doc_part().clone(),
                    rows: BTreeMap::new(),
                });
            let scalar_types: Vec<FieldType> =
                doc_part.scalars().map(|s| s.field_type()).collect();
            let field_keys: Vec<(Arc<str>, FieldType)> = doc_part
                .fields()
                .map(|f| (Arc::from(f.name()), f.field_type()))
                .collect();

            for row in doc_part.rows() {
                let scalars = scalar_types
                    .iter()
                    .zip(row.scalar_values())
                    .filter_map(|(t, v)| v.clone().map(|v| (*t, v)))
                    .collect();
                let fields = field_keys
                    .iter()
                    .zip(row.field_values())
                    .filter_map(|(k, v)| v.clone().map(|v| (k.clone(), v)))
                    .collect();
                table.rows.insert(
                    (row.did(), row.rid()),
                    StoredRow {
                        pid: row.pid(),
                        seq: row.seq(),
                        scalars,
                        fields,
                    },
                );
                written += 1;
            }
        }

        tracing::debug!(
            tables = data.len(),
            rows = written,
            documents = data.document_count(),
            "collection_data_written"
        );
        written
    }

    /// Blocks holding the rows of `dids`, deepest table first, root last.
    /// Tables without matching rows are left out.
    pub fn read(&self, dids: &[i32]) -> Vec<DocPartResult> {
        let wanted: BTreeSet<i32> = dids.iter().copied().collect();
        self.read_matching(|did| wanted.contains(&did))
    }

    /// Blocks for every stored document
    pub fn read_all(&self) -> Vec<DocPartResult> {
        self.read_matching(|_| true)
    }

    fn read_matching(&self, keep: impl Fn(i32) -> bool) -> Vec<DocPartResult> {
        let tables = self.tables.read();
        let mut ordered: Vec<&StoredTable> = tables.values().collect();
        ordered.sort_by_key(|table| std::cmp::Reverse(table.meta.table_ref().depth()));

        let mut results = Vec::with_capacity(ordered.len());
        for table in ordered {
            let scalars = table.meta.scalars();
            let fields = table.meta.fields();
            let rows: Vec<DocPartResultRow> = table
                .rows
                .iter()
                .filter(|((did, _), _)| keep(*did))
                .map(|(&(did, rid), row)| {
                    let values = scalars
                        .iter()
                        .map(|s| row.scalars.get(&s.field_type()).cloned())
                        .chain(fields.iter().map(|f| {
                            row.fields
                                .get(&(Arc::from(f.name()), f.field_type()))
                                .cloned()
                        }))
                        .collect();
                    DocPartResultRow::new(did, rid, row.pid, row.seq, values)
                })
                .collect();
            if rows.is_empty() {
                continue;
            }
            results.push(DocPartResult {
                table_ref: table.meta.table_ref().clone(),
                scalars,
                fields,
                rows,
            });
        }
        results
    }

    /// Remove every row of `did`. Returns the number of rows removed.
    pub fn delete(&self, did: i32) -> usize {
        let mut tables = self.tables.write();
        let mut removed = 0;
        for table in tables.values_mut() {
            let before = table.rows.len();
            table.rows.retain(|(row_did, _), _| *row_did != did);
            removed += before - table.rows.len();
        }
        tracing::debug!(did, rows = removed, "document_deleted");
        removed
    }

    /// Stored documents, i.e. rows of the root table
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .get(&TableRef::root())
            .map_or(0, |root| root.rows.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row_count(&self) -> usize {
        self.tables.read().values().map(|t| t.rows.len()).sum()
    }

    /// Ids of the stored documents, ascending
    pub fn dids(&self) -> Vec<i32> {
        self.tables
            .read()
            .get(&TableRef::root())
            .map(|root| root.rows.keys().map(|(did, _)| *did).collect())
            .unwrap_or_default()
    }
}
