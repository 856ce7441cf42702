use std::fmt;

/// Horizontal partition inside a segment; one element store per shard.
pub type ShardId = u32;

/// Element timestamps are nanoseconds since the Unix epoch.
pub type TimestampNanos = i64;

/// Stable identity of a series: the hash of its canonical byte form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesId(pub u64);

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
