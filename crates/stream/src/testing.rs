//! In-memory fakes for the storage contracts, instrumented so tests can
//! assert on exactly the calls the write pipeline makes.

use std::{
    collections::HashMap,
    sync::{
        atomic::{
            AtomicBool,
            AtomicI64,
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    batch::ElementBatch,
    index::Document,
    schema::{
        IndexRuleBinding,
        IndexRuleLocator,
        IndexSchemaSlot,
        StreamSchema,
    },
    storage::{
        SchemaRepo,
        Segment,
        StreamRef,
        TimeRange,
        Tsdb,
        TsTable,
    },
    types::{
        ShardId,
        TimestampNanos,
    },
};

pub const DAY_NANOS: TimestampNanos = 24 * 60 * 60 * 1_000_000_000;

#[derive(Clone, Default)]
pub struct FailureFlags {
    pub element_docs: Arc<AtomicBool>,
    pub series_insert: Arc<AtomicBool>,
}

pub struct MockTsTable {
    pub shard: ShardId,
    pub row_batches: Mutex<Vec<ElementBatch>>,
    pub element_doc_writes: Mutex<Vec<Vec<Document>>>,
    failures: FailureFlags,
}

impl MockTsTable {
    fn new(shard: ShardId, failures: FailureFlags) -> Self {
        Self {
            shard,
            row_batches: Mutex::new(Vec::new()),
            element_doc_writes: Mutex::new(Vec::new()),
            failures,
        }
    }

    pub fn rows_committed(&self) -> usize {
        self.row_batches.lock().iter().map(|b| b.len()).sum()
    }
}

#[async_trait]
impl TsTable for MockTsTable {
    async fn must_add_elements(&self, batch: &ElementBatch) {
        assert!(
            batch.is_aligned(),
            "element batch arrays are misaligned: {batch:?}"
        );
        self.row_batches.lock().push(batch.clone());
    }

    async fn write_element_docs(&self, docs: Vec<Document>) -> anyhow::Result<()> {
        if self.failures.element_docs.load(Ordering::SeqCst) {
            anyhow::bail!("element index unavailable");
        }
        self.element_doc_writes.lock().push(docs);
        Ok(())
    }
}

pub struct MockSegment {
    time_range: TimeRange,
    /// Outstanding references. Creation hands the segment out with one.
    pub refs: AtomicI64,
    /// How many times the segment was handed out ref-incremented.
    pub acquires: AtomicUsize,
    pub tables: Mutex<HashMap<ShardId, Arc<MockTsTable>>>,
    pub series_inserts: Mutex<Vec<Vec<Document>>>,
    failures: FailureFlags,
}

impl MockSegment {
    fn new(time_range: TimeRange, failures: FailureFlags) -> Self {
        Self {
            time_range,
            refs: AtomicI64::new(0),
            acquires: AtomicUsize::new(0),
            tables: Mutex::new(HashMap::new()),
            series_inserts: Mutex::new(Vec::new()),
            failures,
        }
    }

    pub fn table(&self, shard: ShardId) -> Option<Arc<MockTsTable>> {
        self.tables.lock().get(&shard).cloned()
    }
}

#[async_trait]
impl Segment for MockSegment {
    fn time_range(&self) -> TimeRange {
        self.time_range
    }

    async fn create_ts_table_if_not_exist(
        &self,
        shard: ShardId,
    ) -> anyhow::Result<Arc<dyn TsTable>> {
        let mut tables = self.tables.lock();
        let table = tables
            .entry(shard)
            .or_insert_with(|| Arc::new(MockTsTable::new(shard, self.failures.clone())))
            .clone();
        Ok(table)
    }

    async fn insert_series_docs(&self, docs: Vec<Document>) -> anyhow::Result<()> {
        if self.failures.series_insert.load(Ordering::SeqCst) {
            anyhow::bail!("series index unavailable");
        }
        self.series_inserts.lock().push(docs);
        Ok(())
    }

    fn dec_ref(&self) {
        let before = self.refs.fetch_sub(1, Ordering::SeqCst);
        assert!(before > 0, "segment reference released more often than acquired");
    }
}

pub struct MockTsdb {
    segment_span: TimestampNanos,
    pub segments: Mutex<Vec<Arc<MockSegment>>>,
    pub ticks: Mutex<Vec<TimestampNanos>>,
    pub failures: FailureFlags,
}

impl MockTsdb {
    pub fn new(segment_span: TimestampNanos) -> Self {
        Self {
            segment_span,
            segments: Mutex::new(Vec::new()),
            ticks: Mutex::new(Vec::new()),
            failures: FailureFlags::default(),
        }
    }

    pub fn segment_containing(&self, ts: TimestampNanos) -> Option<Arc<MockSegment>> {
        self.segments
            .lock()
            .iter()
            .find(|s| s.time_range.contains(ts))
            .cloned()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.lock().len()
    }
}

#[async_trait]
impl Tsdb for MockTsdb {
    async fn create_segment_if_not_exist(
        &self,
        ts: TimestampNanos,
    ) -> anyhow::Result<Arc<dyn Segment>> {
        let mut segments = self.segments.lock();
        let segment = match segments.iter().find(|s| s.time_range.contains(ts)) {
            Some(segment) => segment.clone(),
            None => {
                let start = ts - ts.rem_euclid(self.segment_span);
                let segment = Arc::new(MockSegment::new(
                    TimeRange {
                        start,
                        end: start + self.segment_span,
                    },
                    self.failures.clone(),
                ));
                segments.push(segment.clone());
                segment
            },
        };
        segment.refs.fetch_add(1, Ordering::SeqCst);
        segment.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(segment)
    }

    fn tick(&self, latest_ts: TimestampNanos) {
        self.ticks.lock().push(latest_ts);
    }
}

pub struct MockStream {
    schema: Arc<StreamSchema>,
    slot: IndexSchemaSlot,
}

impl MockStream {
    pub fn new(schema: StreamSchema, bindings: &[IndexRuleBinding]) -> Self {
        let locator = IndexRuleLocator::build(&schema, bindings);
        Self {
            schema: Arc::new(schema),
            slot: IndexSchemaSlot::new(locator),
        }
    }

    /// Publish a new locator snapshot, as a schema update would.
    pub fn publish(&self, bindings: &[IndexRuleBinding]) {
        self.slot
            .store(IndexRuleLocator::build(&self.schema, bindings));
    }

    /// Publish a raw locator, bypassing `build`. Lets tests violate the
    /// one-entry-per-family invariant on purpose.
    pub fn publish_raw(&self, locator: IndexRuleLocator) {
        self.slot.store(locator);
    }
}

impl StreamRef for MockStream {
    fn schema(&self) -> Arc<StreamSchema> {
        self.schema.clone()
    }

    fn index_rule_locator(&self) -> Arc<IndexRuleLocator> {
        self.slot.load()
    }
}

pub struct MockSchemaRepo {
    tsdbs: Mutex<HashMap<String, Arc<MockTsdb>>>,
    streams: Mutex<HashMap<(String, String), Arc<MockStream>>>,
    pub tsdb_loads: AtomicUsize,
}

impl MockSchemaRepo {
    pub fn new() -> Self {
        Self {
            tsdbs: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            tsdb_loads: AtomicUsize::new(0),
        }
    }

    pub fn add_stream(&self, schema: StreamSchema, bindings: &[IndexRuleBinding]) -> Arc<MockStream> {
        let key = (schema.group.clone(), schema.name.clone());
        let stream = Arc::new(MockStream::new(schema, bindings));
        self.streams.lock().insert(key, stream.clone());
        stream
    }

    /// The group's tsdb, created on first use with day-sized segments.
    pub fn tsdb(&self, group: &str) -> Arc<MockTsdb> {
        self.tsdbs
            .lock()
            .entry(group.to_string())
            .or_insert_with(|| Arc::new(MockTsdb::new(DAY_NANOS)))
            .clone()
    }
}

#[async_trait]
impl SchemaRepo for MockSchemaRepo {
    async fn load_tsdb(&self, group: &str) -> anyhow::Result<Arc<dyn Tsdb>> {
        self.tsdb_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.tsdb(group))
    }

    fn load_stream(&self, group: &str, name: &str) -> Option<Arc<dyn StreamRef>> {
        let streams = self.streams.lock();
        streams
            .get(&(group.to_string(), name.to_string()))
            .cloned()
            .map(|stream| stream as Arc<dyn StreamRef>)
    }
}
