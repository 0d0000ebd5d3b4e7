//! D2R Error Types

use crate::meta::{IdGeneratorError, IdentifierError};
use thiserror::Error;

/// Errors translating one document into rows.
///
/// Any of these aborts the document: it contributes no rows and registers
/// no schema elements.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// Containers nested deeper than the configured limit
    #[error("Document nesting exceeds {limit} levels at '{path}' inside '{enclosing}'")]
    NestingTooDeep {
        limit: usize,
        path: String,
        /// Innermost open container, `[]` marking an array
        enclosing: String,
    },

    /// Array with more elements than a sequence number can address
    #[error("Array at '{path}' has {len} elements, more than a row sequence can address")]
    ArrayTooLarge { path: String, len: usize },

    /// Row id allocation failed
    #[error("Row id allocation failed: {0}")]
    RowId(#[from] IdGeneratorError),

    /// Physical identifier generation failed
    #[error("Identifier generation failed: {0}")]
    Identifier(#[from] IdentifierError),
}

impl TranslationError {
    /// Whether retrying the same document may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::RowId(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for D2R operations
pub type TranslationResult<T> = Result<T, TranslationError>;
