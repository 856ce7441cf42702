//! Contracts of the storage layer below the write pipeline. The pipeline
//! consumes these; it never implements them. Real implementations live in
//! the segment/shard storage engine, fakes live in [`crate::testing`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch::ElementBatch,
    index::Document,
    schema::{
        IndexRuleLocator,
        StreamSchema,
    },
    types::{
        ShardId,
        TimestampNanos,
    },
};

/// Half-open nanosecond interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub start: TimestampNanos,
    pub end: TimestampNanos,
}

impl TimeRange {
    pub fn contains(&self, ts: TimestampNanos) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// Schema discovery facade. Read-concurrent; the batcher reads through it
/// on every event.
#[async_trait]
pub trait SchemaRepo: Send + Sync + 'static {
    async fn load_tsdb(&self, group: &str) -> anyhow::Result<Arc<dyn Tsdb>>;

    fn load_stream(&self, group: &str, name: &str) -> Option<Arc<dyn StreamRef>>;
}

/// A stream known to the schema repo: its schema plus the current index
/// rule locator snapshot.
pub trait StreamRef: Send + Sync + 'static {
    fn schema(&self) -> Arc<StreamSchema>;

    /// An atomic snapshot; stable for the duration of the call that loaded
    /// it even while schema updates publish new ones.
    fn index_rule_locator(&self) -> Arc<IndexRuleLocator>;
}

/// Per-group storage handle.
#[async_trait]
pub trait Tsdb: Send + Sync + 'static {
    /// Returns the segment containing `ts`, creating it if needed. The
    /// returned handle is ref-incremented; the caller owes one `dec_ref`.
    async fn create_segment_if_not_exist(
        &self,
        ts: TimestampNanos,
    ) -> anyhow::Result<Arc<dyn Segment>>;

    /// Hint the storage layer's time-monotonic structures with the largest
    /// timestamp of a committed batch.
    fn tick(&self, latest_ts: TimestampNanos);
}

/// A time-range partition of a group. Reference-counted: retention may race
/// with writes, so holders keep it alive until their flush completes.
#[async_trait]
pub trait Segment: Send + Sync + 'static {
    fn time_range(&self) -> TimeRange;

    async fn create_ts_table_if_not_exist(
        &self,
        shard: ShardId,
    ) -> anyhow::Result<Arc<dyn TsTable>>;

    /// Insert documents into the segment's series index.
    async fn insert_series_docs(&self, docs: Vec<Document>) -> anyhow::Result<()>;

    fn dec_ref(&self);
}

/// Per-shard element store inside a segment.
#[async_trait]
pub trait TsTable: Send + Sync + 'static {
    /// Commit a row batch. Infallible on its contract; a panic here is a
    /// storage engine bug, not an input error.
    async fn must_add_elements(&self, batch: &ElementBatch);

    /// Write documents into the table's element-level inverted index.
    async fn write_element_docs(&self, docs: Vec<Document>) -> anyhow::Result<()>;
}
