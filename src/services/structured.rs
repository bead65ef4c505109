//! Structured-data extractor for JobPosting / ItemList blocks.
//!
//! Reads `application/ld+json` scripts first and, when no list is found
//! there, an escaped ItemList embedded in a framework payload script.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::models::{CandidatePartial, Origin};
use crate::utils::resolve;

static LD_JSON: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("static selector")
});

static SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("static selector"));

/// `[1,"{...itemListElement...}"])` inside a streamed payload script.
static PAYLOAD_ITEM_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\[1,"(\{.*?itemListElement.*?\})"\]\)"#).expect("static regex")
});

/// Candidates found in a page's structured data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredExtraction {
    /// One candidate per posting, in document order
    pub candidates: Vec<CandidatePartial>,
    /// Whether a list-level block was present
    pub list_found: bool,
}

/// Extracts candidates from embedded structured data.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract postings from `html`; relative URLs resolve against `page_url`.
    ///
    /// Never fails: malformed blocks are skipped and a page without
    /// structured data yields an empty extraction.
    pub fn extract(&self, html: &str, page_url: &str) -> StructuredExtraction {
        let document = Html::parse_document(html);
        let mut out = StructuredExtraction::default();

        for script in document.select(&LD_JSON) {
            let text: String = script.text().collect();
            match serde_json::from_str::<Value>(text.trim()) {
                Ok(value) => {
                    for node in flatten(&value) {
                        collect_node(node, page_url, &mut out);
                    }
                }
                Err(e) => log::debug!("Skipping malformed ld+json block on {}: {}", page_url, e),
            }
        }

        if !out.list_found {
            for script in document.select(&SCRIPT) {
                let text: String = script.text().collect();
                if !text.contains("itemListElement") {
                    continue;
                }
                if let Some(list) = payload_item_list(&text) {
                    collect_node(&list, page_url, &mut out);
                    if out.list_found {
                        break;
                    }
                }
            }
        }

        log::debug!(
            "Structured data on {}: {} candidates (list: {})",
            page_url,
            out.candidates.len(),
            out.list_found
        );
        out
    }
}

/// Top-level nodes of a JSON-LD value: arrays and `@graph` are unwrapped.
fn flatten(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten).collect(),
        Value::Object(map) => match map.get("@graph") {
            Some(graph @ Value::Array(_)) => flatten(graph),
            _ => vec![value],
        },
        _ => Vec::new(),
    }
}

fn collect_node(node: &Value, page_url: &str, out: &mut StructuredExtraction) {
    if has_type(node, "ItemList") {
        out.list_found = true;
        let entries = node
            .get("itemListElement")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        out.candidates
            .extend(entries.iter().filter_map(|e| from_list_entry(e, page_url)));
    } else if has_type(node, "JobPosting") {
        out.candidates.push(from_posting(node, None, page_url));
    }
}

/// A list entry is either a `ListItem` wrapping the posting or the posting.
fn from_list_entry(entry: &Value, page_url: &str) -> Option<CandidatePartial> {
    match entry {
        Value::Object(_) => {
            let posting = match entry.get("item") {
                Some(item @ Value::Object(_)) => item,
                Some(Value::String(url)) => {
                    let mut candidate = CandidatePartial::new(Origin::Structured);
                    candidate.source_url = Some(resolve(page_url, url));
                    candidate.title = text(entry, "name");
                    return Some(candidate);
                }
                _ => entry,
            };
            Some(from_posting(posting, text(entry, "url"), page_url))
        }
        Value::String(url) => {
            let mut candidate = CandidatePartial::new(Origin::Structured);
            candidate.source_url = Some(resolve(page_url, url));
            Some(candidate)
        }
        _ => None,
    }
}

fn from_posting(posting: &Value, entry_url: Option<String>, page_url: &str) -> CandidatePartial {
    let url = text(posting, "url")
        .or(entry_url)
        .or_else(|| text(posting, "@id").filter(|id| id.contains('/')));

    CandidatePartial {
        title: text(posting, "title").or_else(|| text(posting, "name")),
        company: posting.get("hiringOrganization").and_then(organization),
        location: posting.get("jobLocation").and_then(locations),
        description: text(posting, "description"),
        source_url: url.map(|u| resolve(page_url, &u)),
        posted_at: text(posting, "datePosted").and_then(|d| parse_date(&d)),
        origin: Origin::Structured,
    }
}

fn organization(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Object(_) => text(value, "name"),
        Value::Array(items) => items.iter().find_map(organization),
        _ => None,
    }
}

fn locations(value: &Value) -> Option<String> {
    let places: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(place).collect(),
        other => place(other).into_iter().collect(),
    };
    (!places.is_empty()).then(|| places.join(", "))
}

fn place(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Object(_) => match value.get("address") {
            Some(Value::String(s)) => non_empty(s),
            Some(address @ Value::Object(_)) => text(address, "addressLocality")
                .or_else(|| text(address, "addressRegion"))
                .or_else(|| text(value, "name")),
            _ => text(value, "name"),
        },
        _ => None,
    }
}

fn has_type(node: &Value, wanted: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case(wanted),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.eq_ignore_ascii_case(wanted)),
        _ => false,
    }
}

fn text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Decode an ItemList carried as an escaped JSON string in a script payload.
fn payload_item_list(script: &str) -> Option<Value> {
    PAYLOAD_ITEM_LIST.captures_iter(script).find_map(|caps| {
        let raw = caps.get(1)?.as_str();
        let unescaped: String = serde_json::from_str(&format!("\"{raw}\"")).ok()?;
        let value: Value = serde_json::from_str(&unescaped).ok()?;
        has_type(&value, "ItemList").then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::item_list_page;

    const PAGE_URL: &str = "https://jobs.example.com/search/job";

    fn wrap(blocks: &[&str]) -> String {
        let scripts: String = blocks
            .iter()
            .map(|b| format!("<script type=\"application/ld+json\">{b}</script>"))
            .collect();
        format!("<html><head>{scripts}</head><body></body></html>")
    }

    #[test]
    fn test_item_list_yields_one_candidate_per_posting_in_order() {
        let html = item_list_page(&[
            ("Solar Technician", "https://jobs.example.com/job/solar-1"),
            ("Wind Analyst", "https://jobs.example.com/job/wind-2"),
        ]);

        let out = StructuredExtractor::new().extract(&html, PAGE_URL);

        assert!(out.list_found);
        assert_eq!(out.candidates.len(), 2);
        assert_eq!(out.candidates[0].title.as_deref(), Some("Solar Technician"));
        assert_eq!(out.candidates[1].title.as_deref(), Some("Wind Analyst"));
        assert_eq!(
            out.candidates[1].source_url.as_deref(),
            Some("https://jobs.example.com/job/wind-2")
        );
        assert_eq!(out.candidates[0].company.as_deref(), Some("GreenGrid"));
        assert_eq!(out.candidates[0].location.as_deref(), Some("Pune"));
    }

    #[test]
    fn test_list_entries_with_only_urls() {
        let html = wrap(&[r#"{"@type":"ItemList","itemListElement":[
            {"@type":"ListItem","position":1,"url":"/job/1","name":"Grid Engineer"},
            {"@type":"ListItem","position":2,"url":"/job/2"}
        ]}"#]);

        let out = StructuredExtractor::new().extract(&html, PAGE_URL);

        assert_eq!(out.candidates.len(), 2);
        assert_eq!(
            out.candidates[0].source_url.as_deref(),
            Some("https://jobs.example.com/job/1")
        );
        assert_eq!(out.candidates[0].title.as_deref(), Some("Grid Engineer"));
        assert!(out.candidates[1].title.is_none());
        assert!(out.candidates[1].company.is_none());
    }

    #[test]
    fn test_malformed_block_does_not_abort_others() {
        let html = wrap(&[
            "{ this is not json",
            r#"[{"@type":"Organization","name":"x"},
                {"@type":["ItemList"],"itemListElement":[{"item":{"@type":"JobPosting","title":"Battery Chemist","url":"/job/9"}}]}]"#,
        ]);

        let out = StructuredExtractor::new().extract(&html, PAGE_URL);

        assert!(out.list_found);
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].title.as_deref(), Some("Battery Chemist"));
    }

    #[test]
    fn test_graph_wrapper_is_unwrapped() {
        let html = wrap(&[r#"{"@context":"https://schema.org","@graph":[
            {"@type":"WebPage"},
            {"@type":"ItemList","itemListElement":[{"@type":"JobPosting","title":"Hydro Planner","url":"https://other.example.com/p/1"}]}
        ]}"#]);

        let out = StructuredExtractor::new().extract(&html, PAGE_URL);

        assert_eq!(out.candidates.len(), 1);
        assert_eq!(
            out.candidates[0].source_url.as_deref(),
            Some("https://other.example.com/p/1")
        );
    }

    #[test]
    fn test_no_structured_data_is_empty() {
        let out = StructuredExtractor::new()
            .extract("<html><body><h1>Jobs</h1></body></html>", PAGE_URL);
        assert!(out.candidates.is_empty());
        assert!(!out.list_found);
    }

    #[test]
    fn test_detail_page_job_posting() {
        let html = wrap(&[r#"{"@type":"JobPosting",
            "title":"Energy Auditor",
            "hiringOrganization":{"@type":"Organization","name":"Watt Works"},
            "jobLocation":[{"address":{"addressLocality":"Mumbai"}},{"address":{"addressLocality":"Delhi"}}],
            "description":"<p>Audit <b>buildings</b></p>",
            "datePosted":"2024-05-02",
            "url":"https://jobs.example.com/job/audit-7"}"#]);

        let out = StructuredExtractor::new().extract(&html, PAGE_URL);

        assert!(!out.list_found);
        let job = &out.candidates[0];
        assert_eq!(job.company.as_deref(), Some("Watt Works"));
        assert_eq!(job.location.as_deref(), Some("Mumbai, Delhi"));
        assert_eq!(job.description.as_deref(), Some("<p>Audit <b>buildings</b></p>"));
        assert_eq!(
            job.posted_at.map(|d| d.format("%Y-%m-%d").to_string()).as_deref(),
            Some("2024-05-02")
        );
    }

    #[test]
    fn test_payload_item_list_fallback() {
        let inner = r#"{\"@type\":\"ItemList\",\"itemListElement\":[{\"@type\":\"ListItem\",\"url\":\"https://jobs.example.com/job/p-1\",\"name\":\"Payload Job\"}]}"#;
        let html = format!(
            "<html><body><script>self.__next_f.push([1,\"{inner}\"])</script></body></html>"
        );

        let out = StructuredExtractor::new().extract(&html, PAGE_URL);

        assert!(out.list_found);
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].title.as_deref(), Some("Payload Job"));
    }

    #[test]
    fn test_parse_date_forms() {
        assert!(parse_date("2024-01-15T08:30:00+05:30").is_some());
        assert!(parse_date("2024-01-15").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
