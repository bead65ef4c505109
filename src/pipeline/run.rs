// src/pipeline/run.rs

//! Run orchestrator.
//!
//! Acquires the browser, drives pagination on a blocking thread, then hands
//! the collected records to the record sink.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Config, JobRecord, RunStats};
use crate::services::{ChromeSession, PageFetcher, PageSource};
use crate::storage::{RecordSink, SinkReport};
use crate::utils;

use super::paginate::{StopReason, paginate};

/// Everything a finished run produced.
///
/// The records survive a sink failure; `sink` carries its outcome.
#[derive(Debug)]
pub struct RunSummary {
    pub records: Vec<JobRecord>,
    pub stats: RunStats,
    pub stop: StopReason,
    pub sink: Result<SinkReport>,
}

impl RunSummary {
    /// False when the sink failed or the run gave up on failing pages.
    pub fn is_success(&self) -> bool {
        self.sink.is_ok() && self.stop != StopReason::TooManyFailures
    }

    pub fn inserted(&self) -> usize {
        self.sink.as_ref().map_or(0, |report| report.upserted)
    }
}

/// Run the scraper against the live site with a headless Chrome session.
pub async fn run_scraper(config: Arc<Config>, sink: &dyn RecordSink) -> Result<RunSummary> {
    run_with_source(config, sink, |config| {
        let browser = ChromeSession::launch(&config.fetch)?;
        PageFetcher::new(browser, &config.fetch)
    })
    .await
}

/// Run the scraper with a page source built by `acquire`.
///
/// The source is created and dropped on the blocking scrape thread, so it
/// is released on every exit path. Failing to acquire it is fatal; a sink
/// failure is logged and reported in the summary.
pub async fn run_with_source<S, F>(
    config: Arc<Config>,
    sink: &dyn RecordSink,
    acquire: F,
) -> Result<RunSummary>
where
    S: PageSource + 'static,
    F: FnOnce(&Config) -> Result<S> + Send + 'static,
{
    let start_time = Utc::now();
    utils::log::header("Job scraper starting");
    log::info!("Search URL: {}", config.site.search_url);

    let scrape_config = Arc::clone(&config);
    let outcome = tokio::task::spawn_blocking(move || {
        let mut source = acquire(&scrape_config)?;
        paginate(&scrape_config, &mut source)
    })
    .await??;

    if outcome.stop == StopReason::TooManyFailures {
        log::error!(
            "Gave up after {} consecutive failed pages",
            config.limits.max_consecutive_failures
        );
    }

    log::info!(
        "Handing {} records to the {} sink",
        outcome.records.len(),
        sink.name()
    );
    let sink_result = if outcome.records.is_empty() {
        log::warn!("No records collected; nothing to store");
        Ok(SinkReport::default())
    } else {
        sink.upsert(&outcome.records).await
    };
    let sink_result = sink_result.map_err(|e| {
        log::error!("Storing records failed: {}", e);
        match e {
            AppError::Sink(_) => e,
            other => AppError::sink(other),
        }
    });

    let summary = RunSummary {
        records: outcome.records,
        stats: outcome.stats,
        stop: outcome.stop,
        sink: sink_result,
    };

    let elapsed = Utc::now() - start_time;
    utils::log::separator();
    utils::log::summary(
        "Run complete",
        &[
            ("pages visited", summary.stats.pages_visited.to_string()),
            ("pages skipped", summary.stats.pages_skipped.to_string()),
            ("jobs collected", summary.stats.jobs_collected.to_string()),
            ("duplicates dropped", summary.stats.duplicates.to_string()),
            ("rejected candidates", summary.stats.rejected.to_string()),
            ("detail pages", summary.stats.details_fetched.to_string()),
            ("jobs inserted", summary.inserted().to_string()),
            ("stopped", summary.stop.to_string()),
            ("elapsed", format!("{}s", elapsed.num_seconds())),
        ],
    );

    Ok(summary)
}
