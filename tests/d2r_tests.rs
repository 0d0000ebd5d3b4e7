//! Document → rows translation tests.
//!
//! Covers the shape of the produced rows (did/rid/pid/seq), the CHILD
//! flags, table identity across heterogeneous documents and the
//! all-or-nothing behavior of a failing document.

use docpart::kvdocument::from_json;
use docpart::{
    CellValue, ChildKind, CollectionData, CollectionMetaInfo, D2RTranslator, DocPartData,
    FieldType, IdGeneratorError, IdentifierFactory, InMemoryReservedIdGenerator, KvDocument,
    KvValue, MetaCollection, ReservedIdGenerator, TableRef, TranslationConfig, TranslationError,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn meta_info(collection: &str) -> CollectionMetaInfo {
    CollectionMetaInfo::new(
        "test",
        Arc::new(MetaCollection::new(collection)),
        Arc::new(InMemoryReservedIdGenerator::new()),
        IdentifierFactory::default(),
    )
}

fn doc(value: serde_json::Value) -> KvDocument {
    from_json(&value).unwrap()
}

fn translate_all(info: &CollectionMetaInfo, docs: &[KvDocument]) -> CollectionData {
    let mut translator = D2RTranslator::new(info, &TranslationConfig::default());
    for d in docs {
        translator.translate(d).unwrap();
    }
    translator.into_collection_data()
}

/// Value of the named field in `row_index`, looked up through the columns
fn field<'a>(data: &'a DocPartData, row_index: usize, name: &str) -> Option<&'a CellValue> {
    let position = data.fields().position(|f| f.name() == name)?;
    data.rows()[row_index].field_value(position)
}

fn first_scalar(data: &DocPartData, row_index: usize) -> Option<&CellValue> {
    data.rows()[row_index].scalar_values().iter().flatten().next()
}

fn scalar(value: KvValue) -> CellValue {
    CellValue::Scalar(value)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_single_string_field() {
    let info = meta_info("people");
    let data = translate_all(&info, &[doc(json!({"name": "John"}))]);

    assert_eq!(data.len(), 1);
    let root = data.get(&TableRef::root()).unwrap();
    assert_eq!(root.row_count(), 1);
    assert_eq!(field(root, 0, "name"), Some(&scalar(KvValue::string("John"))));

    let meta_field = root.fields().next().unwrap();
    assert_eq!(meta_field.field_type(), FieldType::String);
    assert_eq!(meta_field.identifier(), "name_s");
}

#[test]
fn test_null_field_is_typed_null() {
    let info = meta_info("people");
    let data = translate_all(&info, &[doc(json!({"age": null}))]);

    let root = data.get(&TableRef::root()).unwrap();
    let meta_field = root.fields().next().unwrap();
    assert_eq!(meta_field.field_type(), FieldType::Null);
    assert_eq!(field(root, 0, "age"), Some(&scalar(KvValue::Null)));
}

#[test]
fn test_scalar_array_rows() {
    let info = meta_info("calendar");
    let data = translate_all(&info, &[doc(json!({"months": [1, 2]}))]);

    let root = data.get(&TableRef::root()).unwrap();
    assert_eq!(
        field(root, 0, "months"),
        Some(&CellValue::Child(ChildKind::IsArray))
    );

    let months = data.get(&TableRef::root().child("months")).unwrap();
    assert_eq!(months.row_count(), 2);
    for (i, row) in months.rows().iter().enumerate() {
        assert_eq!(row.did(), 0);
        assert_eq!(row.pid(), Some(0));
        assert_eq!(row.seq(), Some(i as i32));
    }
    assert_eq!(first_scalar(months, 0), Some(&scalar(KvValue::Integer(1))));
    assert_eq!(first_scalar(months, 1), Some(&scalar(KvValue::Integer(2))));
    assert_eq!(months.scalars().next().unwrap().identifier(), "v_i");
}

#[test]
fn test_sub_document_rows() {
    let info = meta_info("people");
    let data = translate_all(&info, &[doc(json!({"address": {"street": "X"}}))]);

    let root = data.get(&TableRef::root()).unwrap();
    assert_eq!(
        field(root, 0, "address"),
        Some(&CellValue::Child(ChildKind::IsDocument))
    );
    let root_rid = root.rows()[0].rid();

    let address = data.get(&TableRef::root().child("address")).unwrap();
    assert_eq!(address.row_count(), 1);
    let row = &address.rows()[0];
    assert_eq!(row.pid(), Some(root_rid));
    assert_eq!(row.seq(), None);
    assert_eq!(field(address, 0, "street"), Some(&scalar(KvValue::string("X"))));
    assert_eq!(address.meta_doc_part().identifier(), "people_address");
}

#[test]
fn test_document_and_array_share_one_table() {
    let info = meta_info("mixed");
    let data = translate_all(
        &info,
        &[doc(json!({"d": {"k": 1}})), doc(json!({"d": [{"k": 2}]}))],
    );

    let root = data.get(&TableRef::root()).unwrap();
    assert_eq!(root.row_count(), 2);
    assert_eq!(field(root, 0, "d"), Some(&CellValue::Child(ChildKind::IsDocument)));
    assert_eq!(field(root, 1, "d"), Some(&CellValue::Child(ChildKind::IsArray)));

    // one table, two rows, distinguished only by seq and parent
    let d = data.get(&TableRef::root().child("d")).unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(d.row_count(), 2);
    assert_eq!(d.field_count(), 1);
    assert_eq!((d.rows()[0].pid(), d.rows()[0].seq()), (Some(0), None));
    assert_eq!((d.rows()[1].pid(), d.rows()[1].seq()), (Some(1), Some(0)));
    assert_eq!(field(d, 0, "k"), Some(&scalar(KvValue::Integer(1))));
    assert_eq!(field(d, 1, "k"), Some(&scalar(KvValue::Integer(2))));
}

#[test]
fn test_array_of_arrays_uses_anonymous_level() {
    let info = meta_info("matrix");
    let data = translate_all(&info, &[doc(json!({"a": [[1, 2], [3]]}))]);

    let a_ref = TableRef::root().child("a");
    let a = data.get(&a_ref).unwrap();
    assert_eq!(a.row_count(), 2);
    for row_index in 0..2 {
        assert_eq!(
            first_scalar(a, row_index),
            Some(&CellValue::Child(ChildKind::IsArray))
        );
    }

    let inner_ref = a_ref.array_child(2);
    let inner = data.get(&inner_ref).unwrap();
    assert_eq!(inner.meta_doc_part().identifier(), "matrix_a$2");

    let summary: Vec<(Option<i32>, Option<i32>, Option<&CellValue>)> = inner
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| (row.pid(), row.seq(), first_scalar(inner, i)))
        .collect();
    let (one, two, three) = (
        scalar(KvValue::Integer(1)),
        scalar(KvValue::Integer(2)),
        scalar(KvValue::Integer(3)),
    );
    assert_eq!(
        summary,
        vec![
            (Some(a.rows()[0].rid()), Some(0), Some(&one)),
            (Some(a.rows()[0].rid()), Some(1), Some(&two)),
            (Some(a.rows()[1].rid()), Some(0), Some(&three)),
        ]
    );
}

#[test]
fn test_documents_in_array_store_members_on_element_rows() {
    let info = meta_info("orders");
    let data = translate_all(
        &info,
        &[doc(json!({"items": [{"sku": "a", "tags": ["x"]}, 7]}))],
    );

    let items_ref = TableRef::root().child("items");
    let items = data.get(&items_ref).unwrap();
    assert_eq!(items.row_count(), 2);
    assert_eq!(field(items, 0, "sku"), Some(&scalar(KvValue::string("a"))));
    assert_eq!(field(items, 0, "tags"), Some(&CellValue::Child(ChildKind::IsArray)));
    assert_eq!(first_scalar(items, 1), Some(&scalar(KvValue::Integer(7))));

    let tags = data.get(&items_ref.child("tags")).unwrap();
    assert_eq!(tags.rows()[0].pid(), Some(items.rows()[0].rid()));
}

#[test]
fn test_null_inside_array_is_a_null_scalar() {
    let info = meta_info("c");
    let data = translate_all(&info, &[doc(json!({"a": [1, null, {"x": 1}]}))]);

    let a = data.get(&TableRef::root().child("a")).unwrap();
    assert_eq!(a.rows()[1].seq(), Some(1));
    assert_eq!(first_scalar(a, 1), Some(&scalar(KvValue::Null)));
    let null_scalar = a
        .scalars()
        .find(|s| s.field_type() == FieldType::Null)
        .unwrap();
    assert_eq!(null_scalar.identifier(), "v_n");
}

#[test]
fn test_empty_containers() {
    let info = meta_info("c");
    let data = translate_all(&info, &[doc(json!({"list": [], "obj": {}}))]);

    let list = data.get(&TableRef::root().child("list")).unwrap();
    assert!(list.is_empty());
    let obj = data.get(&TableRef::root().child("obj")).unwrap();
    assert_eq!(obj.row_count(), 1);
    assert_eq!(obj.column_count(), 0);
}

// ============================================================================
// Ordering and Identity
// ============================================================================

#[test]
fn test_collection_data_is_parent_first() {
    let info = meta_info("deep");
    let data = translate_all(
        &info,
        &[
            doc(json!({"a": {"b": {"c": [1, [2]]}}})),
            doc(json!({"z": [{"y": {"x": 1}}]})),
        ],
    );

    let ordered = data.ordered_doc_part_data();
    assert_eq!(ordered.len(), data.len());
    assert!(ordered[0].table_ref().is_root());
    for (i, part) in ordered.iter().enumerate() {
        if let Some(parent) = part.parent_table_ref() {
            let parent_position = ordered
                .iter()
                .position(|p| p.table_ref() == parent)
                .unwrap();
            assert!(parent_position < i, "{} listed before its parent", part.table_ref());
        }
    }
}

#[test]
fn test_rids_strictly_increase_per_table() {
    let info = meta_info("ids");
    let docs: Vec<KvDocument> = (0..20)
        .map(|i| doc(json!({"n": i, "list": [i, i + 1], "sub": {"v": [[i]]}})))
        .collect();
    let data = translate_all(&info, &docs);

    for part in data.ordered_doc_part_data() {
        let rids: Vec<i32> = part.rows().iter().map(|r| r.rid()).collect();
        assert!(
            rids.windows(2).all(|w| w[0] < w[1]),
            "rids of {} not increasing: {rids:?}",
            part.table_ref()
        );
    }
    assert_eq!(data.dids(), (0..20).collect::<Vec<i32>>().as_slice());
}

#[test]
fn test_root_did_is_its_own_rid() {
    let info = meta_info("ids");
    let data = translate_all(&info, &[doc(json!({"a": 1})), doc(json!({"a": {"b": 2}}))]);
    let root = data.get(&TableRef::root()).unwrap();
    for row in root.rows() {
        assert_eq!(row.did(), row.rid());
        assert_eq!(row.pid(), None);
    }
    let a = data.get(&TableRef::root().child("a")).unwrap();
    assert_eq!(a.rows()[0].did(), 1);
}

#[test]
fn test_rows_are_padded_to_all_columns() {
    let info = meta_info("pad");
    let data = translate_all(&info, &[doc(json!({"a": 1})), doc(json!({"b": "x"}))]);
    let root = data.get(&TableRef::root()).unwrap();
    assert_eq!(root.field_count(), 2);
    for row in root.rows() {
        assert_eq!(row.field_values().len(), 2);
    }
    assert_eq!(field(root, 0, "b"), None);
    assert_eq!(field(root, 1, "a"), None);
}

#[test]
fn test_same_key_different_types_are_separate_columns() {
    let info = meta_info("types");
    let data = translate_all(&info, &[doc(json!({"val": 1})), doc(json!({"val": "one"}))]);
    let root = data.get(&TableRef::root()).unwrap();
    let identifiers: Vec<&str> = root.fields().map(|f| f.identifier()).collect();
    assert_eq!(identifiers, vec!["val_i", "val_s"]);
}

#[test]
fn test_schema_accumulates_across_translators() {
    let info = meta_info("shared");
    translate_all(&info, &[doc(json!({"a": 1}))]);
    let second = translate_all(&info, &[doc(json!({"b": 2}))]);

    let meta_root = info.meta_collection().get_doc_part(&TableRef::root()).unwrap();
    assert_eq!(meta_root.field_count(), 2);
    // a batch only carries the columns its rows use
    assert_eq!(second.get(&TableRef::root()).unwrap().field_count(), 1);
    assert_eq!(second.dids(), &[1]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_failed_document_leaves_no_rows_or_schema() {
    let info = meta_info("atomic");
    let config = TranslationConfig {
        max_nesting_depth: 3,
    };
    let mut translator = D2RTranslator::new(&info, &config);

    translator.translate(&doc(json!({"ok": 1}))).unwrap();
    let err = translator
        .translate(&doc(json!({"fresh": 1, "a": {"b": {"c": {"d": 1}}}})))
        .unwrap_err();
    assert!(matches!(err, TranslationError::NestingTooDeep { limit: 3, .. }));
    translator.translate(&doc(json!({"ok": 2}))).unwrap();

    let data = translator.into_collection_data();
    assert_eq!(data.document_count(), 2);
    assert_eq!(data.len(), 1);
    assert_eq!(data.get(&TableRef::root()).unwrap().row_count(), 2);

    let meta_root = info.meta_collection().get_doc_part(&TableRef::root()).unwrap();
    assert!(meta_root.get_field("fresh", FieldType::Integer).is_none());
    assert!(info
        .meta_collection()
        .get_doc_part(&TableRef::root().child("a"))
        .is_none());
}

#[test]
fn test_nesting_at_limit_is_accepted() {
    let info = meta_info("limit");
    let config = TranslationConfig {
        max_nesting_depth: 3,
    };
    let mut translator = D2RTranslator::new(&info, &config);
    // root, a, b: three containers
    assert!(translator.translate(&doc(json!({"a": {"b": {"c": 1}}}))).is_ok());
    assert!(translator.translate(&doc(json!({"a": [[1]]}))).is_ok());
    assert!(translator.translate(&doc(json!({"a": [[[1]]]}))).is_err());
}

struct FailingIdGenerator {
    remaining: AtomicUsize,
}

impl ReservedIdGenerator for FailingIdGenerator {
    fn next_rid(
        &self,
        _database: &str,
        _collection: &str,
        _table_ref: &TableRef,
    ) -> Result<i32, IdGeneratorError> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            return Err(IdGeneratorError::Unavailable("sequence table offline".to_string()));
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        Ok(left as i32)
    }
}

#[test]
fn test_id_source_failure_is_retryable_and_atomic() {
    let info = CollectionMetaInfo::new(
        "test",
        Arc::new(MetaCollection::new("flaky")),
        Arc::new(FailingIdGenerator {
            remaining: AtomicUsize::new(1),
        }),
        IdentifierFactory::default(),
    );
    let mut translator = D2RTranslator::new(&info, &TranslationConfig::default());

    let err = translator
        .translate(&doc(json!({"a": {"b": 1}})))
        .unwrap_err();
    assert!(matches!(
        err,
        TranslationError::RowId(IdGeneratorError::Unavailable(_))
    ));
    assert!(err.is_retryable());
    assert!(translator.collection_data().is_empty());
    assert!(info.meta_collection().is_empty());
}

#[test]
fn test_identifier_collisions_get_counters() {
    let info = meta_info("c");
    let data = translate_all(&info, &[doc(json!({"a.b": 1, "a_b": 2, "A_B": 3}))]);
    let root = data.get(&TableRef::root()).unwrap();
    let mut identifiers: HashMap<&str, &str> = HashMap::new();
    for f in root.fields() {
        identifiers.insert(f.name(), f.identifier());
    }
    // members arrive in key order: "A_B", "a.b", "a_b"
    assert_eq!(identifiers["A_B"], "a_b_i");
    assert_eq!(identifiers["a.b"], "a_b_1_i");
    assert_eq!(identifiers["a_b"], "a_b_2_i");
}
