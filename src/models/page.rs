// src/models/page.rs

//! Outcome of fetching a single page.

use std::fmt;

/// Status tag of a fetch.
///
/// `Blocked` and `TransientError` describe a single attempt; a completed
/// fetch is either `Success` or `ExhaustedRetries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Success,
    Blocked,
    TransientError,
    ExhaustedRetries,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Success => write!(f, "success"),
            FetchStatus::Blocked => write!(f, "blocked"),
            FetchStatus::TransientError => write!(f, "transient error"),
            FetchStatus::ExhaustedRetries => write!(f, "exhausted retries"),
        }
    }
}

/// Rendered HTML plus the status of the fetch that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFetchResult {
    pub url: String,
    /// Rendered document; empty unless `status` is `Success`
    pub html: String,
    pub status: FetchStatus,
    /// Number of navigation attempts made
    pub attempts: u32,
    /// Reason for the last failed attempt
    pub reason: Option<String>,
}

impl PageFetchResult {
    pub fn success(url: impl Into<String>, html: impl Into<String>, attempts: u32) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            status: FetchStatus::Success,
            attempts,
            reason: None,
        }
    }

    pub fn failed(
        url: impl Into<String>,
        status: FetchStatus,
        attempts: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            html: String::new(),
            status,
            attempts,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}
