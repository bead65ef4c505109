//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

use super::SelectorConfig;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target site and pagination layout
    #[serde(default)]
    pub site: SiteConfig,

    /// Page and job limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Browser, retry and pacing behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// DOM fallback selectors
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Record sink settings
    #[serde(default)]
    pub sink: SinkConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, falling back to defaults on any failure.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let search_url = self.site.search_url.trim();
        if search_url.is_empty() {
            return Err(AppError::validation("site.search_url is empty"));
        }
        Url::parse(search_url)?;
        if self.site.start_page == 0 {
            return Err(AppError::validation("site.start_page must be >= 1"));
        }
        if self.fetch.max_retries == 0 {
            return Err(AppError::validation("fetch.max_retries must be >= 1"));
        }
        if self.fetch.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(AppError::validation("fetch.user_agents is empty"));
        }
        if self.fetch.settle_min_ms > self.fetch.settle_max_ms {
            return Err(AppError::validation(
                "fetch.settle_min_ms must not exceed fetch.settle_max_ms",
            ));
        }
        if self.fetch.page_delay_min_ms > self.fetch.page_delay_max_ms {
            return Err(AppError::validation(
                "fetch.page_delay_min_ms must not exceed fetch.page_delay_max_ms",
            ));
        }
        if self.limits.empty_page_limit == 0 {
            return Err(AppError::validation("limits.empty_page_limit must be >= 1"));
        }
        if self.limits.max_consecutive_failures == 0 {
            return Err(AppError::validation(
                "limits.max_consecutive_failures must be >= 1",
            ));
        }
        if self.selectors.fields.iter().all(|f| f.field != super::JobField::Title) {
            return Err(AppError::validation("selectors.fields has no title mapping"));
        }

        let selectors = self
            .selectors
            .card
            .iter()
            .chain(self.fetch.ready_selector.iter())
            .map(String::as_str)
            .chain(self.selectors.fields.iter().map(|f| f.selector.as_str()))
            .filter(|s| !s.trim().is_empty());
        for s in selectors {
            Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))?;
        }

        Ok(())
    }
}

/// Target site and pagination layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Search results URL; also the URL of the start page
    #[serde(default = "defaults::search_url")]
    pub search_url: String,

    /// Path of paginated result pages, relative to the site origin
    #[serde(default = "defaults::base_path")]
    pub base_path: String,

    /// Text placed between the base path and the page number
    #[serde(default = "defaults::page_separator")]
    pub page_separator: String,

    /// First page index
    #[serde(default = "defaults::start_page")]
    pub start_page: u32,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            search_url: defaults::search_url(),
            base_path: defaults::base_path(),
            page_separator: defaults::page_separator(),
            start_page: defaults::start_page(),
        }
    }
}

impl SiteConfig {
    /// URL of result page `page`.
    ///
    /// The start page is the search URL itself; later pages are built from
    /// the search URL's origin and the pagination base path.
    pub fn page_url(&self, page: u32) -> Result<String> {
        if page == self.start_page {
            return Ok(self.search_url.clone());
        }
        let base = Url::parse(&self.search_url)?;
        let path = format!("{}{}{}", self.base_path, self.page_separator, page);
        Ok(base.join(&path)?.to_string())
    }
}

/// Page and job limits. A limit of 0 means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Stop once this many jobs were collected
    #[serde(default = "defaults::max_jobs")]
    pub max_jobs: usize,

    /// Stop after this many result pages
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    /// Consecutive empty pages that signal the end of the result set
    #[serde(default = "defaults::empty_page_limit")]
    pub empty_page_limit: u32,

    /// Consecutive skipped pages after which the run gives up
    #[serde(default = "defaults::max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl LimitsConfig {
    pub fn job_limit(&self) -> Option<usize> {
        (self.max_jobs > 0).then_some(self.max_jobs)
    }

    pub fn page_limit(&self) -> Option<u32> {
        (self.max_pages > 0).then_some(self.max_pages)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_jobs: defaults::max_jobs(),
            max_pages: defaults::max_pages(),
            empty_page_limit: defaults::empty_page_limit(),
            max_consecutive_failures: defaults::max_consecutive_failures(),
        }
    }
}

/// Browser, retry and pacing behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Navigation attempts per page
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Backoff before the second attempt; doubles every attempt
    #[serde(default = "defaults::backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for the exponential part of the backoff
    #[serde(default = "defaults::backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Random offset added to every backoff
    #[serde(default = "defaults::jitter_ms")]
    pub jitter_ms: u64,

    /// Pause after a successful load (lower bound)
    #[serde(default = "defaults::settle_min_ms")]
    pub settle_min_ms: u64,

    /// Pause after a successful load (upper bound)
    #[serde(default = "defaults::settle_max_ms")]
    pub settle_max_ms: u64,

    /// Pause between result pages (lower bound)
    #[serde(default = "defaults::page_delay_min_ms")]
    pub page_delay_min_ms: u64,

    /// Pause between result pages (upper bound)
    #[serde(default = "defaults::page_delay_max_ms")]
    pub page_delay_max_ms: u64,

    /// Navigation and readiness wait timeout in seconds
    #[serde(default = "defaults::render_timeout")]
    pub render_timeout_secs: u64,

    /// Element whose presence marks a fully rendered page
    #[serde(default)]
    pub ready_selector: Option<String>,

    /// Substrings that identify an anti-bot or error page
    #[serde(default = "defaults::block_markers")]
    pub block_markers: Vec<String>,

    /// Identity strings rotated across attempts
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Run the browser without a window
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Explicit Chrome/Chromium binary
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Browser window size
    #[serde(default = "defaults::window_size")]
    pub window_size: (u32, u32),

    /// Visit posting pages to fill fields missing from the listing
    #[serde(default = "defaults::follow_details")]
    pub follow_details: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base_ms(),
            backoff_max_ms: defaults::backoff_max_ms(),
            jitter_ms: defaults::jitter_ms(),
            settle_min_ms: defaults::settle_min_ms(),
            settle_max_ms: defaults::settle_max_ms(),
            page_delay_min_ms: defaults::page_delay_min_ms(),
            page_delay_max_ms: defaults::page_delay_max_ms(),
            render_timeout_secs: defaults::render_timeout(),
            ready_selector: None,
            block_markers: defaults::block_markers(),
            user_agents: defaults::user_agents(),
            headless: defaults::headless(),
            chrome_path: None,
            window_size: defaults::window_size(),
            follow_details: defaults::follow_details(),
        }
    }
}

impl FetchConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Configuration with every pause set to zero.
    pub fn without_delays(mut self) -> Self {
        self.backoff_base_ms = 0;
        self.backoff_max_ms = 0;
        self.jitter_ms = 0;
        self.settle_min_ms = 0;
        self.settle_max_ms = 0;
        self.page_delay_min_ms = 0;
        self.page_delay_max_ms = 0;
        self
    }
}

/// Which sink receives the scraped records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Supabase,
    Json,
}

/// Record sink settings. Credentials come from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,

    /// JSON output file for the `json` sink and dry runs
    #[serde(default = "defaults::output")]
    pub output: PathBuf,

    /// Remote table receiving jobs
    #[serde(default = "defaults::jobs_table")]
    pub jobs_table: String,

    /// Remote table receiving company names
    #[serde(default = "defaults::companies_table")]
    pub companies_table: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::sink_timeout")]
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            output: defaults::output(),
            jobs_table: defaults::jobs_table(),
            companies_table: defaults::companies_table(),
            timeout_secs: defaults::sink_timeout(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Site defaults
    pub fn search_url() -> String {
        "https://www.foundit.in/search/job".into()
    }
    pub fn base_path() -> String {
        "/search/job".into()
    }
    pub fn page_separator() -> String {
        "-".into()
    }
    pub fn start_page() -> u32 {
        1
    }

    // Limit defaults
    pub fn max_jobs() -> usize {
        100
    }
    pub fn max_pages() -> u32 {
        5
    }
    pub fn empty_page_limit() -> u32 {
        2
    }
    pub fn max_consecutive_failures() -> u32 {
        3
    }

    // Fetch defaults
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base_ms() -> u64 {
        2_000
    }
    pub fn backoff_max_ms() -> u64 {
        30_000
    }
    pub fn jitter_ms() -> u64 {
        1_000
    }
    pub fn settle_min_ms() -> u64 {
        3_000
    }
    pub fn settle_max_ms() -> u64 {
        5_000
    }
    pub fn page_delay_min_ms() -> u64 {
        2_000
    }
    pub fn page_delay_max_ms() -> u64 {
        6_000
    }
    pub fn render_timeout() -> u64 {
        10
    }
    pub fn headless() -> bool {
        true
    }
    pub fn window_size() -> (u32, u32) {
        (1920, 1080)
    }
    pub fn follow_details() -> bool {
        true
    }
    pub fn block_markers() -> Vec<String> {
        [
            "403 Forbidden",
            "Access Denied",
            "cf-browser-verification",
            "cf-chl-",
            "Just a moment...",
            "Attention Required! | Cloudflare",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn user_agents() -> Vec<String> {
        [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:126.0) Gecko/20100101 Firefox/126.0",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36 Edg/109.0.1518.78",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.3 Safari/605.1.15",
            "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/109.0",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    // Sink defaults
    pub fn output() -> PathBuf {
        PathBuf::from("data/jobs.json")
    }
    pub fn jobs_table() -> String {
        "jobs".into()
    }
    pub fn companies_table() -> String {
        "companies".into()
    }
    pub fn sink_timeout() -> u64 {
        30
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}
