//! Local filesystem sink.
//!
//! Keeps every scraped posting in one pretty-printed JSON array, merged by
//! source URL. Writes are atomic (temp file, then rename).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::JobRecord;
use crate::storage::{RecordSink, SinkReport};

/// JSON file sink.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Create a sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored records; a missing file is an empty store.
    pub async fn load(&self) -> Result<Vec<JobRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Replace stored records by source URL and append new ones, keeping the
/// stored order.
fn merge(mut stored: Vec<JobRecord>, incoming: &[JobRecord]) -> Vec<JobRecord> {
    let mut index: HashMap<String, usize> = stored
        .iter()
        .enumerate()
        .map(|(i, r)| (r.source_url.clone(), i))
        .collect();

    for record in incoming {
        match index.get(&record.source_url) {
            Some(&i) => stored[i] = record.clone(),
            None => {
                index.insert(record.source_url.clone(), stored.len());
                stored.push(record.clone());
            }
        }
    }
    stored
}

#[async_trait]
impl RecordSink for JsonFileSink {
    async fn upsert(&self, records: &[JobRecord]) -> Result<SinkReport> {
        let stored = self.load().await?;
        let before = stored.len();
        let merged = merge(stored, records);

        self.write_bytes(&serde_json::to_vec_pretty(&merged)?).await?;
        log::info!(
            "Wrote {} records to {} ({} new)",
            merged.len(),
            self.path.display(),
            merged.len() - before
        );

        Ok(SinkReport {
            submitted: records.len(),
            upserted: records.len(),
        })
    }

    fn name(&self) -> &str {
        "json"
    }
}
