//! Concurrency Tests
//!
//! Tests for:
//! - Translators on several threads sharing one schema registry
//! - Convergent get-or-create of doc parts and columns
//! - Row id uniqueness across threads
//! - Concurrent writes and reads on the in-memory store

use docpart::{
    CollectionMetaInfo, D2RTranslator, FieldType, IdentifierFactory, InMemoryReservedIdGenerator,
    KvArray, KvDocument, KvValue, MemoryDocPartStore, MetaCollection, R2DTranslator, TableRef,
    TranslationConfig,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

// ============================================================================
// Test Helpers
// ============================================================================

fn shared_meta_info() -> CollectionMetaInfo {
    CollectionMetaInfo::new(
        "db",
        Arc::new(MetaCollection::new("events")),
        Arc::new(InMemoryReservedIdGenerator::new()),
        IdentifierFactory::default(),
    )
}

fn event(thread_id: i32, i: i32) -> KvDocument {
    KvDocument::builder()
        .put("thread", KvValue::Integer(thread_id))
        .put("seq", KvValue::Integer(i))
        .put(
            "payload",
            KvDocument::builder()
                .put(
                    "tags",
                    KvArray::new(vec![KvValue::string("x"), KvValue::Integer(i)]),
                )
                .build(),
        )
        .build()
}

// ============================================================================
// Shared Schema Tests
// ============================================================================

#[test]
fn test_concurrent_doc_part_creation_converges() {
    let info = shared_meta_info();
    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));
    let table_ref = TableRef::root().child("payload");

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let info = info.clone();
            let barrier = Arc::clone(&barrier);
            let table_ref = table_ref.clone();
            thread::spawn(move || {
                barrier.wait();
                info.resolve_doc_part(&table_ref).unwrap()
            })
        })
        .collect();

    let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for doc_part in &resolved[1..] {
        assert!(Arc::ptr_eq(&resolved[0], doc_part));
    }
    assert_eq!(info.meta_collection().len(), 1);
}

#[test]
fn test_concurrent_field_creation_converges() {
    let info = shared_meta_info();
    let doc_part = info.resolve_doc_part(&TableRef::root()).unwrap();
    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let info = info.clone();
            let doc_part = Arc::clone(&doc_part);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                info.resolve_field(&doc_part, "name", FieldType::String).unwrap()
            })
        })
        .collect();

    let fields: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for field in &fields[1..] {
        assert!(Arc::ptr_eq(&fields[0], field));
    }
    assert_eq!(doc_part.field_count(), 1);
}

#[test]
fn test_distinct_fields_get_distinct_identifiers() {
    let info = shared_meta_info();
    let doc_part = info.resolve_doc_part(&TableRef::root()).unwrap();

    // names that sanitize to the same identifier base
    let names = ["a b", "a-b", "a.b", "a_b", "A B", "a/b"];
    let handles: Vec<_> = names
        .iter()
        .copied()
        .map(|name| {
            let info = info.clone();
            let doc_part = Arc::clone(&doc_part);
            thread::spawn(move || {
                info.resolve_field(&doc_part, name, FieldType::Integer)
                    .unwrap()
                    .identifier()
                    .to_string()
            })
        })
        .collect();

    let identifiers: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(identifiers.len(), names.len());
}

// ============================================================================
// Translation Tests
// ============================================================================

#[test]
fn test_concurrent_translators_allocate_unique_ids() {
    let info = shared_meta_info();
    let num_threads = 6;
    let docs_per_thread = 50;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let info = info.clone();
            thread::spawn(move || {
                let mut translator = D2RTranslator::new(&info, &TranslationConfig::default());
                for i in 0..docs_per_thread {
                    translator.translate(&event(t, i)).unwrap();
                }
                translator.into_collection_data()
            })
        })
        .collect();

    let batches: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let mut dids = HashSet::new();
    let mut payload_rids = HashSet::new();
    for data in &batches {
        for did in data.dids() {
            assert!(dids.insert(*did), "did {did} allocated twice");
        }
        let payload = data.get(&TableRef::root().child("payload")).unwrap();
        for row in payload.rows() {
            assert!(payload_rids.insert(row.rid()), "rid {} allocated twice", row.rid());
        }
    }
    let total = (num_threads * docs_per_thread) as usize;
    assert_eq!(dids.len(), total);
    assert_eq!(payload_rids.len(), total);
}

#[test]
fn test_concurrent_writes_then_read_back() {
    let info = shared_meta_info();
    let store = Arc::new(MemoryDocPartStore::new());
    let num_threads = 4;
    let docs_per_thread = 25;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let info = info.clone();
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut translator = D2RTranslator::new(&info, &TranslationConfig::default());
                for i in 0..docs_per_thread {
                    translator.translate(&event(t, i)).unwrap();
                    // flush in small batches to interleave with other writers
                    if i % 5 == 4 {
                        let data = std::mem::replace(
                            &mut translator,
                            D2RTranslator::new(&info, &TranslationConfig::default()),
                        )
                        .into_collection_data();
                        store.write(&data);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), (num_threads * docs_per_thread) as usize);
    let output = R2DTranslator::new().translate(store.read_all()).unwrap();
    assert!(output.is_complete(), "failures: {:?}", output.failures);

    let seen: HashSet<(i64, i64)> = output
        .documents
        .iter()
        .map(|doc| {
            let thread_id = doc.root.get("thread").and_then(KvValue::as_i64).unwrap();
            let seq = doc.root.get("seq").and_then(KvValue::as_i64).unwrap();
            (thread_id, seq)
        })
        .collect();
    assert_eq!(seen.len(), (num_threads * docs_per_thread) as usize);
}

#[test]
fn test_readers_during_writes_never_see_partial_documents() {
    let info = shared_meta_info();
    let store = Arc::new(MemoryDocPartStore::new());
    let writer_store = Arc::clone(&store);

    let writer = thread::spawn(move || {
        for i in 0..100 {
            let mut translator = D2RTranslator::new(&info, &TranslationConfig::default());
            translator.translate(&event(0, i)).unwrap();
            writer_store.write(&translator.into_collection_data());
        }
    });

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    let output = R2DTranslator::new().translate(store.read_all()).unwrap();
                    assert!(output.is_complete(), "failures: {:?}", output.failures);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.len(), 100);
}
