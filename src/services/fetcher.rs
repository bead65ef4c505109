//! Page fetcher with retry, exponential backoff and block detection.

use std::time::Duration;

use rand::Rng;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{FetchConfig, FetchStatus, PageFetchResult};
use crate::utils::{pause, random_delay};

use super::browser::{BrowserSession, NavigationError};

/// Anything that turns a URL into a `PageFetchResult`.
///
/// Implementations never fail: expected failures are reported through the
/// result's status.
pub trait PageSource {
    fn fetch(&mut self, url: &str) -> PageFetchResult;

    /// Fetch a posting's own page. Result-page landmarks do not apply.
    fn fetch_detail(&mut self, url: &str) -> PageFetchResult {
        self.fetch(url)
    }
}

/// Drives a browser session with retry and anti-bot handling.
pub struct PageFetcher<B> {
    browser: B,
    config: FetchConfig,
    ready: Option<(String, Selector)>,
    markers: Vec<String>,
    user_agents: Vec<String>,
    ua_cursor: usize,
}

impl<B: BrowserSession> PageFetcher<B> {
    /// Create a fetcher. Fails only if the readiness selector is invalid.
    pub fn new(browser: B, config: &FetchConfig) -> Result<Self> {
        let ready = config
            .ready_selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Selector::parse(s)
                    .map(|selector| (s.to_string(), selector))
                    .map_err(|e| AppError::selector(s, format!("{e:?}")))
            })
            .transpose()?;

        let user_agents: Vec<String> = config
            .user_agents
            .iter()
            .map(|ua| ua.trim().to_string())
            .filter(|ua| !ua.is_empty())
            .collect();
        if user_agents.is_empty() {
            return Err(AppError::config("fetch.user_agents is empty"));
        }

        // Random starting point, then round-robin.
        let ua_cursor = rand::thread_rng().gen_range(0..user_agents.len());

        Ok(Self {
            browser,
            config: config.clone(),
            ready,
            markers: config
                .block_markers
                .iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            user_agents,
            ua_cursor,
        })
    }

    #[cfg(test)]
    pub(crate) fn browser(&self) -> &B {
        &self.browser
    }

    /// Delay after failed attempt `attempt` (0-based):
    /// `min(base * 2^attempt, cap) + U(0, jitter)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let exp = self
            .config
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.config.backoff_max_ms);
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }

    fn next_user_agent(&mut self) -> String {
        let ua = self.user_agents[self.ua_cursor % self.user_agents.len()].clone();
        self.ua_cursor = (self.ua_cursor + 1) % self.user_agents.len();
        ua
    }

    /// Reason the document looks like an anti-bot or error page.
    fn detect_block(&self, html: &str, landmark: bool) -> Option<String> {
        let lower = html.to_lowercase();
        if let Some(marker) = self.markers.iter().find(|m| lower.contains(m.as_str())) {
            return Some(format!("block marker '{marker}'"));
        }
        if let Some((_, ready)) = self.ready.as_ref().filter(|_| landmark) {
            let document = Html::parse_document(html);
            if document.select(ready).next().is_none() {
                return Some("expected page landmark missing".to_string());
            }
        }
        None
    }

    /// Make one navigation attempt. `landmark` enables the readiness wait
    /// and check.
    fn attempt(&mut self, url: &str, attempt: u32, landmark: bool) -> PageFetchResult {
        let user_agent = self.next_user_agent();
        log::debug!("Attempt {} for {} as '{}'", attempt, url, user_agent);

        let ready = self
            .ready
            .as_ref()
            .filter(|_| landmark)
            .map(|(css, _)| css.as_str());
        match self.browser.load(url, &user_agent, ready) {
            Ok(html) if html.trim().is_empty() => {
                PageFetchResult::failed(url, FetchStatus::TransientError, attempt, "empty document")
            }
            Ok(html) => match self.detect_block(&html, landmark) {
                Some(reason) => {
                    PageFetchResult::failed(url, FetchStatus::Blocked, attempt, reason)
                }
                None => PageFetchResult::success(url, html, attempt),
            },
            Err(NavigationError::Timeout(msg)) => PageFetchResult::failed(
                url,
                FetchStatus::TransientError,
                attempt,
                format!("timeout: {msg}"),
            ),
            Err(NavigationError::Transport(msg)) => {
                PageFetchResult::failed(url, FetchStatus::TransientError, attempt, msg)
            }
        }
    }

    /// Retry loop shared by result pages and detail pages.
    fn fetch_with_retries(&mut self, url: &str, landmark: bool) -> PageFetchResult {
        let max = self.config.max_retries.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=max {
            let result = self.attempt(url, attempt, landmark);
            match result.status {
                FetchStatus::Success => {
                    pause(random_delay(
                        self.config.settle_min_ms,
                        self.config.settle_max_ms,
                    ));
                    return result;
                }
                FetchStatus::Blocked => log::warn!(
                    "Blocked on {} (attempt {}/{}): {}",
                    url,
                    attempt,
                    max,
                    result.reason.as_deref().unwrap_or("unknown")
                ),
                _ => log::warn!(
                    "Fetch failed for {} (attempt {}/{}): {}",
                    url,
                    attempt,
                    max,
                    result.reason.as_deref().unwrap_or("unknown")
                ),
            }
            last_reason = result.reason.unwrap_or_default();

            if attempt < max {
                pause(self.backoff_delay(attempt - 1));
            }
        }

        log::error!("Giving up on {} after {} attempts", url, max);
        PageFetchResult::failed(url, FetchStatus::ExhaustedRetries, max, last_reason)
    }
}

impl<B: BrowserSession> PageSource for PageFetcher<B> {
    fn fetch(&mut self, url: &str) -> PageFetchResult {
        self.fetch_with_retries(url, true)
    }

    fn fetch_detail(&mut self, url: &str) -> PageFetchResult {
        self.fetch_with_retries(url, false)
    }
}
