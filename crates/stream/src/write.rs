//! The write pipeline entry: batch incoming events per group, segment, and
//! shard, then commit rows and index documents in one pass.

use std::{
    collections::{
        hash_map::Entry,
        HashMap,
        HashSet,
    },
    sync::Arc,
    time::UNIX_EPOCH,
};

use anyhow::Context;
use common::{
    errors::report_error,
    knobs::MAX_TIMESTAMP_DRIFT,
    runtime::Clock,
};
use errors::ErrorMetadata;
use pb::stream::InternalWriteRequest;
use prost::Message;
use xxhash_rust::xxh64::xxh64;

use crate::{
    batch::{
        BatchPool,
        ElementBatch,
    },
    index::{
        Document,
        FieldKey,
        IndexField,
    },
    metrics,
    schema::IndexRuleType,
    storage::{
        SchemaRepo,
        Segment,
        TimeRange,
        Tsdb,
        TsTable,
    },
    tag::{
        self,
        EncodedTagFamily,
        TagValue,
    },
    types::{
        SeriesId,
        ShardId,
        TimestampNanos,
    },
};

/// One element of an inbound batch: either an event the transport already
/// decoded, or its raw serialized payload.
pub enum BatchMessage {
    Request(Box<InternalWriteRequest>),
    Encoded(Vec<u8>),
}

/// Rows and element-index documents accumulated for one (segment, shard)
/// ts-table.
pub(crate) struct ElementsInTable {
    shard: ShardId,
    time_range: TimeRange,
    table: Arc<dyn TsTable>,
    elements: Box<ElementBatch>,
    element_docs: Vec<Document>,
}

/// Everything accumulated for one group during a batch. Holds one reference
/// per distinct segment acquired; the flush (or a discard) releases each
/// exactly once.
pub(crate) struct ElementsInGroup {
    tsdb: Arc<dyn Tsdb>,
    segments: Vec<Arc<dyn Segment>>,
    tables: Vec<ElementsInTable>,
    series_docs: Vec<Document>,
    series_doc_ids: HashSet<SeriesId>,
    latest_ts: TimestampNanos,
}

impl ElementsInGroup {
    fn new(tsdb: Arc<dyn Tsdb>) -> Self {
        Self {
            tsdb,
            segments: Vec::new(),
            tables: Vec::new(),
            series_docs: Vec::new(),
            series_doc_ids: HashSet::new(),
            latest_ts: 0,
        }
    }
}

pub(crate) type Groups = HashMap<String, ElementsInGroup>;

/// `element_id = hash64(name + "|" + clientElementId)`: globally unique as
/// long as clients keep element ids unique within a stream.
pub fn hash_element_id(stream_name: &str, element_id: &str) -> u64 {
    xxh64(format!("{stream_name}|{element_id}").as_bytes(), 0)
}

/// Canonical byte form of a series identity. Injective: every entity value
/// is tagged with its type and length, so the 64-bit series hash is stable
/// across runs and independent of anything but the values themselves.
pub fn marshal_series(
    subject: &str,
    entity_values: &[pb::model::TagValue],
) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(subject.len() + entity_values.len() * 16);
    buf.extend_from_slice(subject.as_bytes());
    for value in entity_values {
        buf.push(b'|');
        match TagValue::from_pb(value) {
            TagValue::Null => buf.push(0),
            TagValue::Str(s) => {
                buf.push(1);
                buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
                buf.extend_from_slice(s.as_bytes());
            },
            TagValue::Int(v) => {
                buf.push(2);
                buf.extend_from_slice(&v.to_be_bytes());
            },
            TagValue::Binary(b) => {
                buf.push(3);
                buf.extend_from_slice(&(b.len() as u32).to_be_bytes());
                buf.extend_from_slice(&b);
            },
            value @ (TagValue::IntArray(_) | TagValue::StrArray(_)) => {
                anyhow::bail!(ErrorMetadata::bad_request(
                    "InvalidEntityValue",
                    format!("entity values must be scalar, got {value:?}"),
                ));
            },
        }
    }
    Ok(buf)
}

/// Stateless per-batch walker. The transport may call `handle_batch` from
/// as many tasks as it likes; nothing is shared across calls but the
/// schema repo and the batch pool.
pub struct WriteHandler {
    schema_repo: Arc<dyn SchemaRepo>,
    clock: Arc<dyn Clock>,
    pub(crate) pool: BatchPool,
}

impl WriteHandler {
    pub fn new(schema_repo: Arc<dyn SchemaRepo>, clock: Arc<dyn Clock>) -> Self {
        Self {
            schema_repo,
            clock,
            pool: BatchPool::default(),
        }
    }

    /// Process one inbound batch end to end. Per-event failures are logged
    /// and counted, never propagated: undecodable payloads are skipped, and
    /// a batching error conservatively discards the accumulator before the
    /// walk continues with the next event.
    pub async fn handle_batch(&self, batch: Vec<BatchMessage>) {
        let mut groups = Groups::new();
        for message in batch {
            metrics::log_event_received();
            let event = match message {
                BatchMessage::Request(event) => event,
                BatchMessage::Encoded(bytes) => {
                    match InternalWriteRequest::decode(bytes.as_slice()) {
                        Ok(event) => Box::new(event),
                        Err(e) => {
                            metrics::log_event_malformed();
                            tracing::warn!("dropping write event whose payload does not decode: {e}");
                            continue;
                        },
                    }
                },
            };
            if let Err(mut e) = self.handle(&mut groups, &event).await {
                metrics::log_event_rejected();
                report_error(&mut e);
                // A failure mid-group may have left the accumulator partially
                // populated; throw it all away rather than commit a
                // half-written batch referencing freed resources.
                self.discard(std::mem::take(&mut groups));
            }
        }
        self.flush(groups).await;
    }

    /// Route one event into the accumulator: validate its timestamp, pin
    /// its group/segment/shard ts-table, and materialise the element plus
    /// its index documents.
    pub(crate) async fn handle(
        &self,
        groups: &mut Groups,
        event: &InternalWriteRequest,
    ) -> anyhow::Result<()> {
        let request = event
            .request
            .as_ref()
            .ok_or_else(|| missing_field("request"))?;
        let metadata = request
            .metadata
            .as_ref()
            .ok_or_else(|| missing_field("metadata"))?;
        let element = request
            .element
            .as_ref()
            .ok_or_else(|| missing_field("element"))?;
        let ts = self.element_timestamp(element)?;

        let eg = match groups.entry(metadata.group.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let tsdb = self
                    .schema_repo
                    .load_tsdb(&metadata.group)
                    .await
                    .with_context(|| {
                        format!("failed to load the tsdb of group {}", metadata.group)
                    })?;
                vacant.insert(ElementsInGroup::new(tsdb))
            },
        };
        eg.latest_ts = eg.latest_ts.max(ts);

        let shard = event.shard_id;
        let table_idx = match eg
            .tables
            .iter()
            .position(|t| t.shard == shard && t.time_range.contains(ts))
        {
            Some(idx) => idx,
            None => {
                let segment = match eg.segments.iter().find(|s| s.time_range().contains(ts)) {
                    Some(segment) => segment.clone(),
                    None => {
                        let segment = eg
                            .tsdb
                            .create_segment_if_not_exist(ts)
                            .await
                            .with_context(|| format!("failed to create a segment for ts {ts}"))?;
                        eg.segments.push(segment.clone());
                        segment
                    },
                };
                let table = segment
                    .create_ts_table_if_not_exist(shard)
                    .await
                    .with_context(|| format!("failed to create the ts-table of shard {shard}"))?;
                eg.tables.push(ElementsInTable {
                    shard,
                    time_range: segment.time_range(),
                    table,
                    elements: self.pool.acquire(),
                    element_docs: Vec::new(),
                });
                eg.tables.len() - 1
            },
        };

        let stream = self
            .schema_repo
            .load_stream(&metadata.group, &metadata.name)
            .ok_or_else(|| {
                anyhow::anyhow!(ErrorMetadata::not_found(
                    "UnknownStream",
                    format!(
                        "stream {}/{} is not known to the schema repo",
                        metadata.group, metadata.name
                    ),
                ))
            })?;
        let schema = stream.schema();
        let locator = stream.index_rule_locator();

        let provided_families = element.tag_families.len();
        anyhow::ensure!(
            provided_families >= 1 && provided_families <= schema.tag_families.len(),
            ErrorMetadata::bad_request(
                "InvalidTagFamilies",
                format!(
                    "expect [1, {}] tag families, got {provided_families}",
                    schema.tag_families.len()
                ),
            )
        );
        anyhow::ensure!(
            locator.tag_family_rules.len() == schema.tag_families.len(),
            "metadata crashed: the locator covers {} tag families but the schema declares {}",
            locator.tag_family_rules.len(),
            schema.tag_families.len()
        );

        let series_bytes = marshal_series(&metadata.name, &event.entity_values)?;
        let series_id = SeriesId(xxh64(&series_bytes, 0));
        let element_id = hash_element_id(&metadata.name, &element.element_id);

        let mut fields: Vec<IndexField> = Vec::new();
        let mut families: Vec<EncodedTagFamily> = Vec::new();
        for (family_idx, family_spec) in schema.tag_families.iter().enumerate() {
            let provided = element.tag_families.get(family_idx);
            let rules = &locator.tag_family_rules[family_idx];
            let mut encoded = EncodedTagFamily {
                name: family_spec.name.clone(),
                tags: Vec::new(),
            };
            for (tag_idx, tag_spec) in family_spec.tags.iter().enumerate() {
                let value = provided
                    .and_then(|family| family.tags.get(tag_idx))
                    .map(TagValue::from_pb)
                    .unwrap_or(TagValue::Null);
                let mut indexed = false;
                if let Some(rule) = rules.get(&tag_spec.name) {
                    match rule.rule_type {
                        IndexRuleType::Inverted => {
                            if !value.is_null() {
                                let key = FieldKey {
                                    index_rule_id: rule.rule_id,
                                    analyzer: rule.analyzer.clone(),
                                    series_id,
                                };
                                tag::append_index_fields(
                                    &mut fields,
                                    &key,
                                    tag_spec.tag_type,
                                    &value,
                                    rule.no_sort,
                                );
                            }
                        },
                        IndexRuleType::Skipping => indexed = true,
                    }
                }
                // Entity tags live in the series key and indexed-only tags
                // in the index; neither is stored as a column.
                if locator.entity_set.contains(&tag_spec.name) || tag_spec.indexed_only {
                    continue;
                }
                let mut packed = tag::encode_tag_value(&tag_spec.name, tag_spec.tag_type, &value);
                packed.indexed = indexed;
                encoded.tags.push(packed);
            }
            if !encoded.tags.is_empty() {
                families.push(encoded);
            }
        }

        let et = &mut eg.tables[table_idx];
        et.elements.timestamps.push(ts);
        et.elements.element_ids.push(element_id);
        et.elements.series_ids.push(series_id);
        et.elements.tag_families.push(families);
        et.element_docs.push(Document {
            doc_id: element_id,
            entity_values: None,
            fields,
            timestamp: Some(ts),
        });
        if eg.series_doc_ids.insert(series_id) {
            eg.series_docs.push(Document {
                doc_id: series_id.0,
                entity_values: Some(series_bytes),
                fields: Vec::new(),
                timestamp: None,
            });
        }
        Ok(())
    }

    fn element_timestamp(
        &self,
        element: &pb::stream::ElementValue,
    ) -> anyhow::Result<TimestampNanos> {
        let ts = element.timestamp.as_ref().ok_or_else(|| {
            anyhow::anyhow!(ErrorMetadata::bad_request(
                "MissingTimestamp",
                "element carries no timestamp",
            ))
        })?;
        anyhow::ensure!(
            (0..1_000_000_000).contains(&ts.nanos) && ts.seconds > 0,
            ErrorMetadata::bad_request(
                "InvalidTimestamp",
                format!("timestamp {}s {}ns is not a valid time", ts.seconds, ts.nanos),
            )
        );
        let nanos = ts
            .seconds
            .checked_mul(1_000_000_000)
            .and_then(|n| n.checked_add(i64::from(ts.nanos)))
            .ok_or_else(|| {
                anyhow::anyhow!(ErrorMetadata::bad_request(
                    "InvalidTimestamp",
                    format!("timestamp {}s does not fit in nanoseconds", ts.seconds),
                ))
            })?;
        let now = self
            .clock
            .now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as i64;
        anyhow::ensure!(
            u128::from(now.abs_diff(nanos)) <= MAX_TIMESTAMP_DRIFT.as_nanos(),
            ErrorMetadata::bad_request(
                "TimestampDrift",
                format!("timestamp {nanos} is more than {MAX_TIMESTAMP_DRIFT:?} away from now"),
            )
        );
        Ok(nanos)
    }

    /// Release everything an abandoned accumulator holds: pooled batches go
    /// back to the pool and each acquired segment gets its reference back.
    fn discard(&self, groups: Groups) {
        for (_, eg) in groups {
            for table in eg.tables {
                self.pool.release(table.elements);
            }
            for segment in eg.segments {
                segment.dec_ref();
            }
        }
    }

    /// Commit every group: rows first, element index documents best-effort
    /// after them, series documents into each segment's index, then one
    /// `dec_ref` per acquired segment and a single tick with the group's
    /// latest timestamp.
    async fn flush(&self, groups: Groups) {
        if groups.is_empty() {
            return;
        }
        let _timer = metrics::flush_timer();
        for (group, eg) in groups {
            for table in eg.tables {
                metrics::log_rows_flushed(table.elements.len() as u64);
                table.table.must_add_elements(&table.elements).await;
                self.pool.release(table.elements);
                if !table.element_docs.is_empty() {
                    if let Err(e) = table.table.write_element_docs(table.element_docs).await {
                        let mut e = e.context(format!(
                            "failed to write element index documents of group {group}"
                        ));
                        report_error(&mut e);
                    }
                }
            }
            if !eg.series_docs.is_empty() {
                metrics::log_series_docs_inserted(eg.series_docs.len() as u64);
                for segment in &eg.segments {
                    if let Err(e) = segment.insert_series_docs(eg.series_docs.clone()).await {
                        let mut e = e.context(format!(
                            "failed to insert series documents of group {group}"
                        ));
                        report_error(&mut e);
                    }
                }
            }
            for segment in &eg.segments {
                segment.dec_ref();
            }
            eg.tsdb.tick(eg.latest_ts);
        }
    }
}

fn missing_field(field: &str) -> anyhow::Error {
    anyhow::anyhow!(ErrorMetadata::bad_request(
        "MissingField",
        format!("write event carries no {field}"),
    ))
}
