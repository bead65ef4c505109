//! In-memory browser and page sources for pipeline tests.

use std::collections::{HashMap, VecDeque};

use crate::models::{FetchStatus, PageFetchResult};

use super::browser::{BrowserSession, NavigationError};
use super::fetcher::PageSource;

/// Browser that replays scripted responses, then fails.
#[derive(Debug, Default)]
pub struct ScriptedBrowser {
    responses: VecDeque<Result<String, NavigationError>>,
    calls: Vec<(String, String)>,
    waits: Vec<Option<String>>,
}

impl ScriptedBrowser {
    pub fn new(responses: Vec<Result<String, NavigationError>>) -> Self {
        Self {
            responses: responses.into(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    /// `(url, user_agent)` of every load.
    pub fn calls(&self) -> &[(String, String)] {
        &self.calls
    }

    /// Readiness selector requested by every load.
    pub fn waits(&self) -> &[Option<String>] {
        &self.waits
    }
}

impl BrowserSession for ScriptedBrowser {
    fn load(
        &mut self,
        url: &str,
        user_agent: &str,
        ready: Option<&str>,
    ) -> Result<String, NavigationError> {
        self.calls.push((url.to_string(), user_agent.to_string()));
        self.waits.push(ready.map(str::to_string));
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(NavigationError::Transport("connection refused".into())))
    }
}

/// Page source serving fixed HTML per URL; unknown URLs exhaust retries.
#[derive(Debug, Default)]
pub struct StubSource {
    pages: HashMap<String, String>,
    requested: Vec<String>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }
}

impl PageSource for StubSource {
    fn fetch(&mut self, url: &str) -> PageFetchResult {
        self.requested.push(url.to_string());
        match self.pages.get(url) {
            Some(html) => PageFetchResult::success(url, html.clone(), 1),
            None => PageFetchResult::failed(url, FetchStatus::ExhaustedRetries, 3, "not scripted"),
        }
    }
}

/// JSON-LD ItemList page with one posting per `(title, url)` pair.
pub fn item_list_page(postings: &[(&str, &str)]) -> String {
    let items: Vec<serde_json::Value> = postings
        .iter()
        .enumerate()
        .map(|(i, (title, url))| {
            serde_json::json!({
                "@type": "ListItem",
                "position": i + 1,
                "item": {
                    "@type": "JobPosting",
                    "title": title,
                    "url": url,
                    "hiringOrganization": { "@type": "Organization", "name": "GreenGrid" },
                    "jobLocation": { "address": { "addressLocality": "Pune" } }
                }
            })
        })
        .collect();
    let list = serde_json::json!({
        "@context": "https://schema.org",
        "@type": "ItemList",
        "itemListElement": items
    });
    format!(
        "<html><head><script type=\"application/ld+json\">{list}</script></head><body></body></html>"
    )
}
