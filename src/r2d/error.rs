//! R2D Error Types

use thiserror::Error;

/// Inconsistency confined to one document. The document is dropped from
/// the output and reported as a failure; the batch continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionError {
    /// A `CHILD` flag announces a sub-document that no row provided
    #[error("Row {rid} of '{table}' expects sub-document '{member}' but none was read")]
    MissingChild {
        table: String,
        rid: i32,
        member: String,
    },

    /// Collected child values disagree with the `CHILD` flag
    #[error("Row {rid} of '{table}' expects {expected} for '{member}'")]
    ChildKindMismatch {
        table: String,
        rid: i32,
        member: String,
        expected: &'static str,
    },

    /// An array is missing the element at `index`
    #[error("Array '{member}' of row {rid} in '{table}' has no element at position {index}")]
    ArrayHole {
        table: String,
        rid: i32,
        member: String,
        index: usize,
    },

    /// A scalar value in a row that is not an array element
    #[error("Row {rid} of '{table}' holds an array element but has no sequence number")]
    ScalarOutsideArray { table: String, rid: i32 },

    /// Negative array position
    #[error("Row {rid} of '{table}' has invalid sequence number {seq}")]
    InvalidSequence { table: String, rid: i32, seq: i32 },

    /// A non-root row without parent id
    #[error("Row {rid} of '{table}' has no parent id")]
    MissingParent { table: String, rid: i32 },

    /// The same member was produced twice for one parent
    #[error("Member '{member}' of row {rid} in '{table}' is set more than once")]
    DuplicateMember {
        table: String,
        rid: i32,
        member: String,
    },

    /// Rows whose parent never claimed them
    #[error("Rows of '{member}' under row {rid} of '{table}' were never attached to a parent")]
    OrphanRows {
        table: String,
        rid: i32,
        member: String,
    },
}

/// Batch-level failure: the input stream itself is malformed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum R2dError {
    /// Depth increased other than right after a root table block
    #[error("Table '{table}' at depth {depth} arrived after depth {previous_depth}; blocks must arrive deepest first")]
    OrderingViolation {
        table: String,
        depth: usize,
        previous_depth: usize,
    },
}
