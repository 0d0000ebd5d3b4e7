//! # R2D: Relational to Document
//!
//! Rebuilds documents from per-table row blocks read back from storage.
//!
//! ## Input order
//!
//! Blocks arrive one generation at a time. Inside a generation the depth
//! never increases and the root table comes last, so every row finds the
//! values of its children already built:
//!
//! ```text
//! months.$2  (depth 2)  ─┐ child generation
//! months     (depth 1)  ─┘ reads child, fills current
//! ""         (depth 0)     reads child, emits documents
//! months.$2  (depth 2)     next generation starts
//! ```
//!
//! A depth increase anywhere else is an [`R2dError::OrderingViolation`] and
//! aborts the whole batch. Inconsistencies confined to one document poison
//! that document only; it is reported in [`R2dOutput::failures`].

mod buffer;
mod error;
mod result;

pub use error::{R2dError, ReconstructionError};
pub use result::{DocPartResult, DocPartResultRow};

use crate::d2r::{CellValue, ChildKind};
use crate::kvdocument::{KvArray, KvDocument, KvValue, ToroDocument};
use crate::table_ref::TableRef;
use buffer::{into_array, Collected, GenerationBuffers, Orphan};
use indexmap::IndexMap;

/// A document that could not be rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub did: i32,
    pub error: ReconstructionError,
}

/// Result of one reconstruction batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct R2dOutput {
    /// Rebuilt documents, in the order their root rows were read
    pub documents: Vec<ToroDocument>,
    pub failures: Vec<DocumentFailure>,
}

impl R2dOutput {
    /// No document failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn document(&self, did: i32) -> Option<&ToroDocument> {
        self.documents.iter().find(|doc| doc.did == did)
    }
}

/// Stateless entry point; each call reads one batch
#[derive(Debug, Default, Clone, Copy)]
pub struct R2DTranslator;

impl R2DTranslator {
    pub fn new() -> Self {
        R2DTranslator
    }

    pub fn translate<I>(&self, results: I) -> Result<R2dOutput, R2dError>
    where
        I: IntoIterator<Item = DocPartResult>,
    {
        let mut state = Reconstruction::default();
        for result in results {
            state.read_block(&result)?;
        }
        let output = state.finish();
        tracing::debug!(
            documents = output.documents.len(),
            failures = output.failures.len(),
            "documents_reconstructed"
        );
        Ok(output)
    }
}

#[derive(Debug, Default)]
struct Reconstruction {
    buffers: GenerationBuffers,
    last_depth: Option<usize>,
    documents: Vec<ToroDocument>,
    failures: IndexMap<i32, ReconstructionError>,
}

impl Reconstruction {
    fn read_block(&mut self, result: &DocPartResult) -> Result<(), R2dError> {
        let depth = result.depth();
        if let Some(previous) = self.last_depth {
            if depth > previous && previous != 0 {
                return Err(R2dError::OrderingViolation {
                    table: result.table_ref.to_string(),
                    depth,
                    previous_depth: previous,
                });
            }
            if depth != previous {
                let consumed = self.buffers.advance();
                self.report_orphans(consumed.into_orphans());
            }
        }
        self.last_depth = Some(depth);

        for row in &result.rows {
            if self.failures.contains_key(&row.did) {
                continue;
            }
            if let Err(error) = self.read_row(result, row) {
                self.fail(row.did, error);
            }
        }
        Ok(())
    }

    fn read_row(
        &mut self,
        result: &DocPartResult,
        row: &DocPartResultRow,
    ) -> Result<(), ReconstructionError> {
        let table_ref = &result.table_ref;
        let scalar_count = result.scalars.len();

        let scalar = (0..scalar_count).find_map(|i| row.values.get(i).and_then(Option::as_ref));
        if let Some(cell) = scalar {
            let Some(seq) = row.seq else {
                return Err(ReconstructionError::ScalarOutsideArray {
                    table: table_ref.to_string(),
                    rid: row.rid,
                });
            };
            let value = self.resolve_cell(cell, table_ref, row.rid, table_ref.member_name())?;
            return self.attach_element(table_ref, row, seq, value);
        }

        let mut doc = KvDocument::new();
        for (i, field) in result.fields.iter().enumerate() {
            let Some(cell) = row.values.get(scalar_count + i).and_then(Option::as_ref) else {
                continue;
            };
            let value = self.resolve_cell(cell, table_ref, row.rid, field.name())?;
            if doc.insert(field.name(), value).is_some() {
                return Err(ReconstructionError::DuplicateMember {
                    table: table_ref.to_string(),
                    rid: row.rid,
                    member: field.name().to_string(),
                });
            }
        }

        if table_ref.is_root() {
            self.documents.push(ToroDocument::new(row.did, doc));
            return Ok(());
        }
        match row.seq {
            Some(seq) => self.attach_element(table_ref, row, seq, KvValue::Document(doc)),
            None => {
                let (parent, pid) = parent_of(table_ref, row)?;
                self.buffers
                    .current
                    .attach_document(parent, pid, row.did, table_ref.member_name(), doc)
            }
        }
    }

    fn attach_element(
        &mut self,
        table_ref: &TableRef,
        row: &DocPartResultRow,
        seq: i32,
        value: KvValue,
    ) -> Result<(), ReconstructionError> {
        let (parent, pid) = parent_of(table_ref, row)?;
        let index = usize::try_from(seq).map_err(|_| ReconstructionError::InvalidSequence {
            table: table_ref.to_string(),
            rid: row.rid,
            seq,
        })?;
        self.buffers
            .current
            .attach_element(parent, pid, row.did, table_ref.member_name(), index, value)
    }

    /// Cell to value, pulling `CHILD` contents out of the child generation
    fn resolve_cell(
        &mut self,
        cell: &CellValue,
        table_ref: &TableRef,
        rid: i32,
        member: &str,
    ) -> Result<KvValue, ReconstructionError> {
        let kind = match cell {
            CellValue::Scalar(value) => return Ok(value.clone()),
            CellValue::Child(kind) => *kind,
        };
        let mismatch = |expected| ReconstructionError::ChildKindMismatch {
            table: table_ref.to_string(),
            rid,
            member: member.to_string(),
            expected,
        };

        match (kind, self.buffers.child.take(table_ref, rid, member)) {
            (ChildKind::IsArray, None) => Ok(KvValue::Array(KvArray::empty())),
            (ChildKind::IsArray, Some(Collected::Elements(elements))) => {
                into_array(elements, table_ref, rid, member).map(KvValue::Array)
            }
            (ChildKind::IsArray, Some(Collected::Document(_))) => Err(mismatch("an array")),
            (ChildKind::IsDocument, Some(Collected::Document(doc))) => Ok(KvValue::Document(doc)),
            (ChildKind::IsDocument, Some(Collected::Elements(_))) => {
                Err(mismatch("a sub-document"))
            }
            (ChildKind::IsDocument, None) => Err(ReconstructionError::MissingChild {
                table: table_ref.to_string(),
                rid,
                member: member.to_string(),
            }),
        }
    }

    fn report_orphans(&mut self, orphans: Vec<Orphan>) {
        for orphan in orphans {
            self.fail(
                orphan.did,
                ReconstructionError::OrphanRows {
                    table: orphan.table_ref.to_string(),
                    rid: orphan.rid,
                    member: orphan.member,
                },
            );
        }
    }

    /// First error wins
    fn fail(&mut self, did: i32, error: ReconstructionError) {
        if !self.failures.contains_key(&did) {
            tracing::warn!(did, error = %error, "document_reconstruction_failed");
            self.failures.insert(did, error);
        }
    }

    fn finish(mut self) -> R2dOutput {
        let buffers = std::mem::take(&mut self.buffers);
        self.report_orphans(buffers.finish());

        let failures = self.failures;
        let documents = self
            .documents
            .into_iter()
            .filter(|doc| !failures.contains_key(&doc.did))
            .collect();
        R2dOutput {
            documents,
            failures: failures
                .into_iter()
                .map(|(did, error)| DocumentFailure { did, error })
                .collect(),
        }
    }
}

fn parent_of<'a>(
    table_ref: &'a TableRef,
    row: &DocPartResultRow,
) -> Result<(&'a TableRef, i32), ReconstructionError> {
    match (table_ref.parent(), row.pid) {
        (Some(parent), Some(pid)) => Ok((parent, pid)),
        _ => Err(ReconstructionError::MissingParent {
            table: table_ref.to_string(),
            rid: row.rid,
        }),
    }
}
