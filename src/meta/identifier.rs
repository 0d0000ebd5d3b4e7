//! Physical identifier generation for doc part tables and their columns.
//!
//! ```text
//! collection "Coll.A", table ref "object.array.$2.object"
//!     -> chain  [coll_a, object, array$2, object]
//!     -> table  "coll_a_object_array$2_object"
//! field "Name" of type STRING  -> "name_s"
//! scalar of type INTEGER       -> "v_i"
//! ```
//!
//! Candidates that exceed the length limit or collide with an identifier
//! already in use get truncated and suffixed with `_<n>` until unique.

use super::FieldType;
use crate::config::IdentifierConfig;
use crate::table_ref::{TableRef, ARRAY_DIMENSION_PREFIX};

const SEPARATOR: char = '_';
const SCALAR_PREFIX: &str = "v";

/// Errors generating identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// Every candidate up to the attempt limit was taken or too long
    #[error("Could not generate a unique identifier for '{name}' after {attempts} attempts")]
    Exhausted { name: String, attempts: usize },
}

/// Deterministic mapper from logical names to backend identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierFactory {
    max_len: usize,
    max_attempts: usize,
}

impl Default for IdentifierFactory {
    fn default() -> Self {
        IdentifierFactory::new(&IdentifierConfig::default())
    }
}

impl IdentifierFactory {
    pub fn new(config: &IdentifierConfig) -> Self {
        IdentifierFactory {
            max_len: config.max_identifier_len,
            max_attempts: config.max_attempts,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Column holding array elements of `field_type`
    pub fn scalar_identifier(field_type: FieldType) -> String {
        format!("{SCALAR_PREFIX}{SEPARATOR}{}", field_type.type_identifier())
    }

    /// Table identifier for `table_ref` in `collection`.
    /// `is_taken` reports identifiers already allocated in the collection.
    pub fn doc_part_identifier(
        &self,
        collection: &str,
        table_ref: &TableRef,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<String, IdentifierError> {
        let mut chain = vec![sanitize(collection)];
        chain.extend(table_chain(table_ref));
        let base = chain.join(&SEPARATOR.to_string());
        self.unique(&base, "", is_taken)
    }

    /// Column identifier for the member `name` of type `field_type`.
    /// `is_taken` reports identifiers already allocated in the doc part.
    pub fn field_identifier(
        &self,
        name: &str,
        field_type: FieldType,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<String, IdentifierError> {
        let mut base = sanitize(name);
        let suffix = format!("{SEPARATOR}{}", field_type.type_identifier());
        // row identity columns never end in a type char, only scalar columns can clash
        if is_scalar_identifier(&format!("{base}{suffix}")) {
            base.insert(0, SEPARATOR);
        }
        self.unique(&base, &suffix, is_taken)
    }

    fn unique(
        &self,
        base: &str,
        suffix: &str,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<String, IdentifierError> {
        let candidate = format!("{base}{suffix}");
        if candidate.len() <= self.max_len && !is_taken(&candidate) {
            return Ok(candidate);
        }

        for counter in 1..=self.max_attempts {
            let tail = format!("{SEPARATOR}{counter}{suffix}");
            let Some(room) = self.max_len.checked_sub(tail.len()) else {
                break;
            };
            // sanitized names are ASCII, byte slicing is safe
            let head = &base[..base.len().min(room)];
            let candidate = format!("{head}{tail}");
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
        }

        Err(IdentifierError::Exhausted {
            name: format!("{base}{suffix}"),
            attempts: self.max_attempts,
        })
    }
}

/// Lowercase, with every character outside `[0-9a-z_$]` replaced by `_`
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_digit() || c.is_ascii_lowercase() || c == SEPARATOR || c == ARRAY_DIMENSION_PREFIX {
                c
            } else {
                SEPARATOR
            }
        })
        .collect()
}

fn is_scalar_identifier(identifier: &str) -> bool {
    FieldType::ALL
        .iter()
        .any(|t| IdentifierFactory::scalar_identifier(*t) == identifier)
}

/// Sanitized names from the root (excluded) down to `table_ref`. Runs of
/// array levels collapse into their key: `a.$2.$3` renders as `a$3`.
fn table_chain(table_ref: &TableRef) -> Vec<String> {
    let mut names = Vec::with_capacity(table_ref.depth());
    let mut current = Some(table_ref);
    while let Some(table) = current {
        if table.is_root() {
            break;
        }
        if table.is_in_array() {
            let named = table.without_array_levels();
            names.push(format!(
                "{}{ARRAY_DIMENSION_PREFIX}{}",
                sanitize(named.key().unwrap_or("")),
                table.array_dimension()
            ));
            current = named.parent();
        } else {
            names.push(sanitize(&table.name()));
            current = table.parent();
        }
    }
    names.reverse();
    names
}
