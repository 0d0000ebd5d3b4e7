//! Row id allocation.
//!
//! Ids are scoped to (database, collection, table ref), start at 0 and are
//! never handed out twice. A persistent backend seeds its counters on startup
//! through [`InMemoryReservedIdGenerator::recover`].

use crate::table_ref::TableRef;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Errors allocating row ids
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdGeneratorError {
    /// The id space of one table is used up
    #[error("Row ids exhausted for {database}.{collection} table '{table}'")]
    Exhausted {
        database: String,
        collection: String,
        table: String,
    },
    /// The backing id source could not be reached
    #[error("Row id source unavailable: {0}")]
    Unavailable(String),
}

impl IdGeneratorError {
    /// Whether the caller may retry the enclosing operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IdGeneratorError::Exhausted { .. } | IdGeneratorError::Unavailable(_)
        )
    }
}

/// Source of row ids
pub trait ReservedIdGenerator: Send + Sync {
    /// Next unused rid for the table. Strictly increasing per table.
    fn next_rid(
        &self,
        database: &str,
        collection: &str,
        table_ref: &TableRef,
    ) -> Result<i32, IdGeneratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RidKey {
    database: Arc<str>,
    collection: Arc<str>,
    table_ref: TableRef,
}

impl RidKey {
    fn new(database: &str, collection: &str, table_ref: &TableRef) -> Self {
        RidKey {
            database: Arc::from(database),
            collection: Arc::from(collection),
            table_ref: table_ref.clone(),
        }
    }
}

/// Process-local generator. Each counter stores the last id handed out,
/// `-1` when none was.
#[derive(Debug, Default)]
pub struct InMemoryReservedIdGenerator {
    counters: DashMap<RidKey, AtomicI32>,
}

impl InMemoryReservedIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure ids up to and including `last_used` are never returned.
    /// Lowering a counter is not possible.
    pub fn recover(&self, database: &str, collection: &str, table_ref: &TableRef, last_used: i32) {
        let key = RidKey::new(database, collection, table_ref);
        let counter = self.counters.entry(key).or_insert_with(|| AtomicI32::new(-1));
        counter.fetch_max(last_used, Ordering::SeqCst);
        tracing::debug!(
            database,
            collection,
            table = %table_ref,
            last_used,
            "rid_counter_recovered"
        );
    }

    /// Last id handed out for the table, if any
    pub fn last_used(&self, database: &str, collection: &str, table_ref: &TableRef) -> Option<i32> {
        let key = RidKey::new(database, collection, table_ref);
        self.counters
            .get(&key)
            .map(|counter| counter.load(Ordering::SeqCst))
            .filter(|last| *last >= 0)
    }
}

impl ReservedIdGenerator for InMemoryReservedIdGenerator {
    fn next_rid(
        &self,
        database: &str,
        collection: &str,
        table_ref: &TableRef,
    ) -> Result<i32, IdGeneratorError> {
        let key = RidKey::new(database, collection, table_ref);
        let counter = self.counters.entry(key).or_insert_with(|| AtomicI32::new(-1));
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| last.checked_add(1))
            .map(|previous| previous + 1)
            .map_err(|_| IdGeneratorError::Exhausted {
                database: database.to_string(),
                collection: collection.to_string(),
                table: table_ref.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_zero_and_increase() {
        let gen = InMemoryReservedIdGenerator::new();
        let root = TableRef::root();
        assert_eq!(gen.next_rid("db", "c", &root).unwrap(), 0);
        assert_eq!(gen.next_rid("db", "c", &root).unwrap(), 1);
        assert_eq!(gen.last_used("db", "c", &root), Some(1));
    }

    #[test]
    fn test_counters_are_scoped() {
        let gen = InMemoryReservedIdGenerator::new();
        let root = TableRef::root();
        let child = root.child("a");
        gen.next_rid("db", "c", &root).unwrap();
        assert_eq!(gen.next_rid("db", "c", &child).unwrap(), 0);
        assert_eq!(gen.next_rid("db", "other", &root).unwrap(), 0);
        assert_eq!(gen.next_rid("db2", "c", &root).unwrap(), 0);
    }

    #[test]
    fn test_recover_never_lowers() {
        let gen = InMemoryReservedIdGenerator::new();
        let root = TableRef::root();
        gen.recover("db", "c", &root, 41);
        assert_eq!(gen.next_rid("db", "c", &root).unwrap(), 42);
        gen.recover("db", "c", &root, 5);
        assert_eq!(gen.next_rid("db", "c", &root).unwrap(), 43);
    }

    #[test]
    fn test_exhaustion_is_retryable() {
        let gen = InMemoryReservedIdGenerator::new();
        let root = TableRef::root();
        gen.recover("db", "c", &root, i32::MAX);
        let err = gen.next_rid("db", "c", &root).unwrap_err();
        assert!(matches!(err, IdGeneratorError::Exhausted { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unused_table_has_no_last_id() {
        let gen = InMemoryReservedIdGenerator::new();
        assert_eq!(gen.last_used("db", "c", &TableRef::root()), None);
    }
}
