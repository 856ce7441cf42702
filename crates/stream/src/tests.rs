use std::sync::{
    atomic::Ordering,
    Arc,
};

use cmd_util::env::config_test;
use common::runtime::MockClock;
use pretty_assertions::assert_eq;
use prost::Message;
use xxhash_rust::xxh64::xxh64;

use crate::{
    schema::{
        IndexRule,
        IndexRuleBinding,
        IndexRuleType,
        StreamSchema,
        TagFamilySpec,
        TagSpec,
    },
    tag::TagType,
    testing::MockSchemaRepo,
    types::SeriesId,
    write::{
        hash_element_id,
        marshal_series,
        BatchMessage,
        WriteHandler,
    },
};

/// Seconds matching the mock clock's epoch, so ingested timestamps sit at
/// zero drift from the handler's clock.
const TS_SECS: i64 = 1_700_000_000;
const TS_NANOS: i64 = TS_SECS * 1_000_000_000;

fn str_value(s: &str) -> pb::model::TagValue {
    pb::model::TagValue {
        value: Some(pb::model::tag_value::Value::Str(pb::model::Str {
            value: s.to_string(),
        })),
    }
}

fn int_value(v: i64) -> pb::model::TagValue {
    pb::model::TagValue {
        value: Some(pb::model::tag_value::Value::Int(pb::model::Int { value: v })),
    }
}

fn family(tags: Vec<pb::model::TagValue>) -> pb::model::TagFamilyForWrite {
    pb::model::TagFamilyForWrite { tags }
}

fn event(
    group: &str,
    name: &str,
    element_id: &str,
    ts_secs: i64,
    shard: u32,
    families: Vec<pb::model::TagFamilyForWrite>,
    entity_values: Vec<pb::model::TagValue>,
) -> pb::stream::InternalWriteRequest {
    pb::stream::InternalWriteRequest {
        shard_id: shard,
        entity_values,
        request: Some(pb::stream::WriteRequest {
            metadata: Some(pb::model::Metadata {
                group: group.to_string(),
                name: name.to_string(),
            }),
            element: Some(pb::stream::ElementValue {
                element_id: element_id.to_string(),
                timestamp: Some(prost_types::Timestamp {
                    seconds: ts_secs,
                    nanos: 0,
                }),
                tag_families: families,
            }),
            message_id: 0,
        }),
    }
}

fn simple_schema() -> StreamSchema {
    StreamSchema {
        group: "g".to_string(),
        name: "svc".to_string(),
        tag_families: vec![TagFamilySpec {
            name: "searchable".to_string(),
            tags: vec![TagSpec {
                name: "x".to_string(),
                tag_type: TagType::Str,
                indexed_only: false,
            }],
        }],
        entity: vec![],
    }
}

fn handler(repo: &Arc<MockSchemaRepo>) -> WriteHandler {
    WriteHandler::new(repo.clone(), Arc::new(MockClock::new()))
}

fn request(event: pb::stream::InternalWriteRequest) -> BatchMessage {
    BatchMessage::Request(Box::new(event))
}

#[tokio::test]
async fn test_single_event_new_group() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let handler = handler(&repo);

    let entity = vec![str_value("instance-1")];
    handler
        .handle_batch(vec![request(event(
            "g",
            "svc",
            "e1",
            TS_SECS,
            3,
            vec![family(vec![str_value("x")])],
            entity.clone(),
        ))])
        .await;

    assert_eq!(repo.tsdb_loads.load(Ordering::SeqCst), 1);
    let tsdb = repo.tsdb("g");
    assert_eq!(tsdb.segment_count(), 1);

    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    assert_eq!(segment.acquires.load(Ordering::SeqCst), 1);
    assert_eq!(segment.refs.load(Ordering::SeqCst), 0);

    let table = segment.table(3).unwrap();
    let rows = table.row_batches.lock();
    assert_eq!(rows.len(), 1);
    let batch = &rows[0];
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.timestamps[0], TS_NANOS);
    assert_eq!(batch.element_ids[0], hash_element_id("svc", "e1"));
    let series_id = SeriesId(xxh64(&marshal_series("svc", &entity).unwrap(), 0));
    assert_eq!(batch.series_ids[0], series_id);
    assert_eq!(batch.tag_families[0].len(), 1);
    assert_eq!(batch.tag_families[0][0].tags[0].value, Some(b"x".to_vec()));

    let element_docs = table.element_doc_writes.lock();
    assert_eq!(element_docs.len(), 1);
    assert_eq!(element_docs[0][0].doc_id, hash_element_id("svc", "e1"));
    assert_eq!(element_docs[0][0].timestamp, Some(TS_NANOS));

    let series_inserts = segment.series_inserts.lock();
    assert_eq!(series_inserts.len(), 1);
    assert_eq!(series_inserts[0].len(), 1);
    assert_eq!(series_inserts[0][0].doc_id, series_id.0);

    assert_eq!(*tsdb.ticks.lock(), vec![TS_NANOS]);
}

#[tokio::test]
async fn test_two_shards_share_one_segment() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let handler = handler(&repo);

    handler
        .handle_batch(vec![
            request(event(
                "g",
                "svc",
                "e1",
                TS_SECS,
                3,
                vec![family(vec![str_value("a")])],
                vec![str_value("instance-1")],
            )),
            request(event(
                "g",
                "svc",
                "e2",
                TS_SECS + 1,
                4,
                vec![family(vec![str_value("b")])],
                vec![str_value("instance-2")],
            )),
        ])
        .await;

    let tsdb = repo.tsdb("g");
    assert_eq!(tsdb.segment_count(), 1);
    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    // The second event reuses the accumulator's segment; one acquisition,
    // one release.
    assert_eq!(segment.acquires.load(Ordering::SeqCst), 1);
    assert_eq!(segment.refs.load(Ordering::SeqCst), 0);
    assert!(segment.table(3).is_some());
    assert!(segment.table(4).is_some());
    assert_eq!(segment.table(3).unwrap().rows_committed(), 1);
    assert_eq!(segment.table(4).unwrap().rows_committed(), 1);
    assert_eq!(*tsdb.ticks.lock(), vec![(TS_SECS + 1) * 1_000_000_000]);
}

#[tokio::test]
async fn test_empty_tag_families_drop_the_accumulator() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let handler = handler(&repo);

    handler
        .handle_batch(vec![request(event(
            "g",
            "svc",
            "bad",
            TS_SECS,
            3,
            vec![],
            vec![str_value("instance-1")],
        ))])
        .await;

    let tsdb = repo.tsdb("g");
    // The segment was acquired before validation failed; the discard must
    // have balanced the reference.
    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    assert_eq!(segment.refs.load(Ordering::SeqCst), 0);
    assert_eq!(segment.table(3).unwrap().rows_committed(), 0);
    assert!(tsdb.ticks.lock().is_empty());
    // The discarded batch went back to the pool.
    assert_eq!(handler.pool.free_count(), 1);
}

#[tokio::test]
async fn test_rejected_event_does_not_poison_later_events() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let handler = handler(&repo);

    handler
        .handle_batch(vec![
            request(event(
                "g",
                "svc",
                "bad",
                TS_SECS,
                3,
                vec![],
                vec![str_value("instance-1")],
            )),
            request(event(
                "g",
                "svc",
                "good",
                TS_SECS + 2,
                3,
                vec![family(vec![str_value("x")])],
                vec![str_value("instance-1")],
            )),
        ])
        .await;

    let tsdb = repo.tsdb("g");
    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    // Acquired once for the doomed accumulator, once for the fresh one.
    assert_eq!(segment.acquires.load(Ordering::SeqCst), 2);
    assert_eq!(segment.refs.load(Ordering::SeqCst), 0);
    assert_eq!(segment.table(3).unwrap().rows_committed(), 1);
    assert_eq!(*tsdb.ticks.lock(), vec![(TS_SECS + 2) * 1_000_000_000]);
}

#[tokio::test]
async fn test_malformed_bytes_are_skipped() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let handler = handler(&repo);

    let one = event(
        "g",
        "svc",
        "e1",
        TS_SECS,
        3,
        vec![family(vec![str_value("a")])],
        vec![str_value("instance-1")],
    );
    let two = event(
        "g",
        "svc",
        "e2",
        TS_SECS,
        3,
        vec![family(vec![str_value("b")])],
        vec![str_value("instance-2")],
    );
    handler
        .handle_batch(vec![
            BatchMessage::Encoded(one.encode_to_vec()),
            BatchMessage::Encoded(vec![0xff, 0xff, 0xff, 0xff]),
            BatchMessage::Encoded(two.encode_to_vec()),
        ])
        .await;

    let tsdb = repo.tsdb("g");
    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    assert_eq!(segment.table(3).unwrap().rows_committed(), 2);
    assert_eq!(tsdb.ticks.lock().len(), 1);
}

#[tokio::test]
async fn test_one_series_document_per_series() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let handler = handler(&repo);

    let entity = vec![str_value("instance-1")];
    handler
        .handle_batch(vec![
            request(event(
                "g",
                "svc",
                "e1",
                TS_SECS,
                3,
                vec![family(vec![str_value("a")])],
                entity.clone(),
            )),
            request(event(
                "g",
                "svc",
                "e2",
                TS_SECS + 1,
                3,
                vec![family(vec![str_value("b")])],
                entity.clone(),
            )),
            request(event(
                "g",
                "svc",
                "e3",
                TS_SECS + 2,
                3,
                vec![family(vec![str_value("c")])],
                vec![str_value("instance-2")],
            )),
        ])
        .await;

    let tsdb = repo.tsdb("g");
    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    assert_eq!(segment.table(3).unwrap().rows_committed(), 3);
    let series_inserts = segment.series_inserts.lock();
    assert_eq!(series_inserts.len(), 1);
    // Three rows, two distinct series.
    assert_eq!(series_inserts[0].len(), 2);
}

#[tokio::test]
async fn test_entity_and_indexed_only_tags_are_not_stored() {
    config_test();
    let schema = StreamSchema {
        group: "g".to_string(),
        name: "svc".to_string(),
        tag_families: vec![TagFamilySpec {
            name: "searchable".to_string(),
            tags: vec![
                TagSpec {
                    name: "trace_id".to_string(),
                    tag_type: TagType::Str,
                    indexed_only: false,
                },
                TagSpec {
                    name: "duration".to_string(),
                    tag_type: TagType::Int,
                    indexed_only: false,
                },
                TagSpec {
                    name: "raw_query".to_string(),
                    tag_type: TagType::Str,
                    indexed_only: true,
                },
            ],
        }],
        entity: vec!["trace_id".to_string()],
    };
    let bindings = vec![
        IndexRuleBinding {
            rule: IndexRule {
                rule_id: 1,
                rule_type: IndexRuleType::Inverted,
                analyzer: String::new(),
                no_sort: false,
            },
            tags: vec!["trace_id".to_string()],
        },
        IndexRuleBinding {
            rule: IndexRule {
                rule_id: 2,
                rule_type: IndexRuleType::Skipping,
                analyzer: String::new(),
                no_sort: false,
            },
            tags: vec!["duration".to_string()],
        },
    ];
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(schema, &bindings);
    let handler = handler(&repo);

    handler
        .handle_batch(vec![request(event(
            "g",
            "svc",
            "e1",
            TS_SECS,
            0,
            vec![family(vec![
                str_value("trace-abc"),
                int_value(1500),
                str_value("select 1"),
            ])],
            vec![str_value("trace-abc")],
        ))])
        .await;

    let tsdb = repo.tsdb("g");
    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    let table = segment.table(0).unwrap();
    let rows = table.row_batches.lock();
    let stored = &rows[0].tag_families[0];
    // trace_id is covered by the series key, raw_query is index-only; only
    // duration lands in column storage, flagged for its skipping index.
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].tags.len(), 1);
    assert_eq!(stored[0].tags[0].name, "duration");
    assert!(stored[0].tags[0].indexed);

    // The inverted rule on the entity tag still produces an index field.
    let element_docs = table.element_doc_writes.lock();
    let fields = &element_docs[0][0].fields;
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].key.index_rule_id, 1);
}

#[tokio::test]
async fn test_unknown_stream_releases_acquired_segment() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    let handler = handler(&repo);

    handler
        .handle_batch(vec![request(event(
            "g",
            "missing",
            "e1",
            TS_SECS,
            3,
            vec![family(vec![str_value("x")])],
            vec![str_value("instance-1")],
        ))])
        .await;

    let tsdb = repo.tsdb("g");
    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    assert_eq!(segment.refs.load(Ordering::SeqCst), 0);
    assert_eq!(segment.table(3).unwrap().rows_committed(), 0);
    assert!(tsdb.ticks.lock().is_empty());
}

#[tokio::test]
async fn test_timestamp_drift_is_rejected_before_any_storage_call() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let handler = handler(&repo);

    let two_days = 2 * 24 * 60 * 60;
    handler
        .handle_batch(vec![request(event(
            "g",
            "svc",
            "e1",
            TS_SECS + two_days,
            3,
            vec![family(vec![str_value("x")])],
            vec![str_value("instance-1")],
        ))])
        .await;

    assert_eq!(repo.tsdb_loads.load(Ordering::SeqCst), 0);
    assert_eq!(repo.tsdb("g").segment_count(), 0);
}

#[tokio::test]
async fn test_zero_timestamp_is_rejected() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let handler = handler(&repo);

    handler
        .handle_batch(vec![request(event(
            "g",
            "svc",
            "e1",
            0,
            3,
            vec![family(vec![str_value("x")])],
            vec![],
        ))])
        .await;
    assert_eq!(repo.tsdb_loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_index_write_failures_do_not_block_rows() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let tsdb = repo.tsdb("g");
    tsdb.failures.element_docs.store(true, Ordering::SeqCst);
    tsdb.failures.series_insert.store(true, Ordering::SeqCst);
    let handler = handler(&repo);

    handler
        .handle_batch(vec![request(event(
            "g",
            "svc",
            "e1",
            TS_SECS,
            3,
            vec![family(vec![str_value("x")])],
            vec![str_value("instance-1")],
        ))])
        .await;

    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    let table = segment.table(3).unwrap();
    // Rows committed even though both index writes failed.
    assert_eq!(table.rows_committed(), 1);
    assert!(table.element_doc_writes.lock().is_empty());
    assert!(segment.series_inserts.lock().is_empty());
    // Cleanup still ran.
    assert_eq!(segment.refs.load(Ordering::SeqCst), 0);
    assert_eq!(*tsdb.ticks.lock(), vec![TS_NANOS]);
}

#[tokio::test]
async fn test_groups_are_flushed_independently() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    repo.add_stream(simple_schema(), &[]);
    let mut other = simple_schema();
    other.group = "h".to_string();
    repo.add_stream(other, &[]);
    let handler = handler(&repo);

    handler
        .handle_batch(vec![
            request(event(
                "g",
                "svc",
                "e1",
                TS_SECS,
                1,
                vec![family(vec![str_value("a")])],
                vec![str_value("instance-1")],
            )),
            request(event(
                "h",
                "svc",
                "e2",
                TS_SECS + 5,
                1,
                vec![family(vec![str_value("b")])],
                vec![str_value("instance-1")],
            )),
        ])
        .await;

    assert_eq!(repo.tsdb_loads.load(Ordering::SeqCst), 2);
    assert_eq!(*repo.tsdb("g").ticks.lock(), vec![TS_NANOS]);
    assert_eq!(
        *repo.tsdb("h").ticks.lock(),
        vec![(TS_SECS + 5) * 1_000_000_000]
    );
    // Both tables' batches were recycled.
    assert_eq!(handler.pool.free_count(), 2);
}

#[tokio::test]
async fn test_locator_mismatch_is_metadata_corruption() {
    config_test();
    let repo = Arc::new(MockSchemaRepo::new());
    let stream = repo.add_stream(simple_schema(), &[]);
    // Publish a locator that no longer matches the schema's family count.
    stream.publish_raw(crate::schema::IndexRuleLocator::default());
    let handler = handler(&repo);

    handler
        .handle_batch(vec![request(event(
            "g",
            "svc",
            "e1",
            TS_SECS,
            3,
            vec![family(vec![str_value("x")])],
            vec![str_value("instance-1")],
        ))])
        .await;

    let tsdb = repo.tsdb("g");
    let segment = tsdb.segment_containing(TS_NANOS).unwrap();
    assert_eq!(segment.refs.load(Ordering::SeqCst), 0);
    assert_eq!(segment.table(3).unwrap().rows_committed(), 0);
    assert!(tsdb.ticks.lock().is_empty());
}
