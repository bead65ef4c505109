// src/pipeline/paginate.rs

//! Pagination controller.
//!
//! Walks result pages one at a time: fetch, extract (structured data first,
//! DOM fallback second), normalize, then decide whether to continue.

use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::models::{CandidatePartial, Config, JobField, JobRecord, PageFetchResult, RunState, RunStats};
use crate::services::{DomExtractor, PageSource, StructuredExtractor, normalize};
use crate::utils::{pause, random_delay};

/// Controller state. `Done` is absorbing.
#[derive(Debug)]
enum PageState {
    Start,
    Fetching(u32),
    Extracting(u32, PageFetchResult),
    Advancing(u32),
    Done(StopReason),
}

/// Why pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxPages,
    MaxJobs,
    EndOfResults,
    TooManyFailures,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::MaxPages => "page limit reached",
            StopReason::MaxJobs => "job limit reached",
            StopReason::EndOfResults => "end of results",
            StopReason::TooManyFailures => "too many consecutive failed pages",
        };
        f.write_str(text)
    }
}

/// Result of a pagination run.
#[derive(Debug)]
pub struct PaginationOutcome {
    pub records: Vec<JobRecord>,
    pub stats: RunStats,
    pub stop: StopReason,
}

/// Drives a `PageSource` across result pages.
pub struct Paginator<'a, S> {
    config: &'a Config,
    source: &'a mut S,
    structured: StructuredExtractor,
    dom: DomExtractor,
    run: RunState,
    records: Vec<JobRecord>,
    pages_attempted: u32,
    empty_streak: u32,
    failure_streak: u32,
}

impl<'a, S: PageSource> Paginator<'a, S> {
    pub fn new(config: &'a Config, source: &'a mut S) -> Result<Self> {
        Ok(Self {
            config,
            source,
            structured: StructuredExtractor::new(),
            dom: DomExtractor::new(&config.selectors)?,
            run: RunState::new(),
            records: Vec::new(),
            pages_attempted: 0,
            empty_streak: 0,
            failure_streak: 0,
        })
    }

    /// Run the state machine to completion.
    pub fn run(mut self) -> Result<PaginationOutcome> {
        let mut state = PageState::Start;

        let stop = loop {
            state = match state {
                PageState::Start => PageState::Fetching(self.config.site.start_page),
                PageState::Fetching(page) => self.fetch(page)?,
                PageState::Extracting(page, result) => self.extract(page, result),
                PageState::Advancing(next) => match self.stop_reason() {
                    Some(reason) => PageState::Done(reason),
                    None => {
                        pause(random_delay(
                            self.config.fetch.page_delay_min_ms,
                            self.config.fetch.page_delay_max_ms,
                        ));
                        PageState::Fetching(next)
                    }
                },
                PageState::Done(reason) => break reason,
            };
        };

        log::info!(
            "Pagination finished after {} pages: {}",
            self.pages_attempted,
            stop
        );
        self.run.stats.jobs_collected = self.records.len();
        Ok(PaginationOutcome {
            records: self.records,
            stats: self.run.stats,
            stop,
        })
    }

    fn fetch(&mut self, page: u32) -> Result<PageState> {
        let url = self.config.site.page_url(page)?;
        log::info!("Fetching page {}: {}", page, url);

        self.pages_attempted += 1;
        let result = self.source.fetch(&url);

        if result.is_success() {
            self.failure_streak = 0;
            self.run.stats.pages_visited += 1;
            return Ok(PageState::Extracting(page, result));
        }

        self.failure_streak += 1;
        self.run.stats.pages_skipped += 1;
        log::warn!(
            "Skipping page {} ({} after {} attempts): {}",
            page,
            result.status,
            result.attempts,
            result.reason.as_deref().unwrap_or("unknown")
        );
        Ok(PageState::Advancing(page + 1))
    }

    fn extract(&mut self, page: u32, result: PageFetchResult) -> PageState {
        let (mut candidates, list_found) =
            page_candidates(&self.structured, &self.dom, &result.html, &result.url);

        let capacity = self.remaining_capacity();
        if self.config.fetch.follow_details {
            self.enrich(&mut candidates, capacity);
        }

        let accepted = normalize(&mut self.run, candidates, capacity);
        let new = accepted.len();
        self.records.extend(accepted);

        if new == 0 && !list_found {
            self.empty_streak += 1;
        } else {
            self.empty_streak = 0;
        }

        log::info!(
            "Page {}: {} new jobs ({} total)",
            page,
            new,
            self.records.len()
        );
        PageState::Advancing(page + 1)
    }

    /// Fill remaining gaps from each posting's own page.
    fn enrich(&mut self, candidates: &mut [CandidatePartial], capacity: Option<usize>) {
        const DETAIL_FIELDS: [JobField; 3] =
            [JobField::Company, JobField::Location, JobField::Description];

        let mut eligible = 0;
        for candidate in candidates.iter_mut() {
            if capacity.is_some_and(|cap| eligible >= cap) {
                break;
            }
            let Some(url) = candidate.source_url.clone() else {
                continue;
            };
            if self.run.is_seen(&url) {
                continue;
            }
            eligible += 1;
            if DETAIL_FIELDS.iter().all(|f| !candidate.is_missing(*f)) {
                continue;
            }

            let detail = self.source.fetch_detail(&url);
            if !detail.is_success() {
                log::debug!("Detail page unavailable for {}: {}", url, detail.status);
                continue;
            }
            self.run.stats.details_fetched += 1;

            let extraction = self.structured.extract(&detail.html, &url);
            let posting = match extraction.candidates.as_slice() {
                [only] => Some(only),
                many => many
                    .iter()
                    .find(|c| c.source_url.as_deref() == Some(url.as_str())),
            };
            if let Some(posting) = posting {
                candidate.fill_gaps(posting);
            }
            self.dom
                .fill_gaps(&detail.html, &url, std::slice::from_mut(candidate));

            pause(random_delay(
                self.config.fetch.page_delay_min_ms,
                self.config.fetch.page_delay_max_ms,
            ));
        }
    }

    fn remaining_capacity(&self) -> Option<usize> {
        self.config
            .limits
            .job_limit()
            .map(|max| max.saturating_sub(self.records.len()))
    }

    fn stop_reason(&self) -> Option<StopReason> {
        let limits = &self.config.limits;
        if self.remaining_capacity() == Some(0) {
            Some(StopReason::MaxJobs)
        } else if limits.page_limit().is_some_and(|max| self.pages_attempted >= max) {
            Some(StopReason::MaxPages)
        } else if self.empty_streak >= limits.empty_page_limit {
            Some(StopReason::EndOfResults)
        } else if self.failure_streak >= limits.max_consecutive_failures {
            Some(StopReason::TooManyFailures)
        } else {
            None
        }
    }
}

/// Structured candidates gap-filled from the DOM, or DOM-only candidates
/// when the page has no structured postings. Also reports list presence.
fn page_candidates(
    structured: &StructuredExtractor,
    dom: &DomExtractor,
    html: &str,
    page_url: &str,
) -> (Vec<CandidatePartial>, bool) {
    let extraction = structured.extract(html, page_url);
    let mut candidates = extraction.candidates;

    if candidates.is_empty() {
        candidates = dom.extract(html, page_url);
        log::debug!(
            "No structured postings on {}; DOM produced {}",
            page_url,
            candidates.len()
        );
    } else {
        dom.fill_gaps(html, page_url, &mut candidates);
    }
    (candidates, extraction.list_found)
}

/// Extract and normalize the records of a single saved page.
pub fn extract_records(config: &Config, html: &str, page_url: &str) -> Result<Vec<JobRecord>> {
    let structured = StructuredExtractor::new();
    let dom = DomExtractor::new(&config.selectors)?;
    let (candidates, _) = page_candidates(&structured, &dom, html, page_url);
    Ok(normalize(&mut RunState::new(), candidates, None))
}

/// Collect records from `source`, starting at the configured start page.
pub fn paginate<S: PageSource>(config: &Config, source: &mut S) -> Result<PaginationOutcome> {
    Paginator::new(config, source)?.run()
}
