//! Record sinks for scraped job postings.
//!
//! A sink receives the whole batch of a run and upserts it keyed by source
//! URL. Failures are reported once for the batch.
//!
//! - `SupabaseSink`: remote PostgREST tables (`companies`, `jobs`)
//! - `JsonFileSink`: a local JSON array file, used for dry runs

pub mod local;
pub mod supabase;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::JobRecord;

// Re-export for convenience
pub use local::JsonFileSink;
pub use supabase::SupabaseSink;

/// Outcome of a successful batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    /// Records handed to the sink
    pub submitted: usize,
    /// Records the sink accepted
    pub upserted: usize,
}

/// Trait for record sink backends.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Upsert `records` keyed by source URL.
    async fn upsert(&self, records: &[JobRecord]) -> Result<SinkReport>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Writes every batch to a mirror sink before the primary one, so a
/// primary failure never loses the scraped records.
pub struct MirroredSink<M, P> {
    mirror: M,
    primary: P,
}

impl<M: RecordSink, P: RecordSink> MirroredSink<M, P> {
    pub fn new(mirror: M, primary: P) -> Self {
        Self { mirror, primary }
    }
}

#[async_trait]
impl<M: RecordSink, P: RecordSink> RecordSink for MirroredSink<M, P> {
    async fn upsert(&self, records: &[JobRecord]) -> Result<SinkReport> {
        if let Err(e) = self.mirror.upsert(records).await {
            log::warn!("Mirror sink '{}' failed: {}", self.mirror.name(), e);
        }
        self.primary.upsert(records).await
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}
