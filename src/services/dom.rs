// src/services/dom.rs

//! DOM fallback extractor.
//!
//! Applies the configured field mapping to rendered result cards, either to
//! fill gaps left by structured data or as the sole source of candidates.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{CandidatePartial, Extract, JobField, Origin, SelectorConfig};
use crate::utils::{collapse_whitespace, resolve};

/// A field mapping entry with its selector compiled.
#[derive(Debug)]
struct CompiledField {
    field: JobField,
    selector: Selector,
    extract: Extract,
    multiple: bool,
    separator: String,
}

/// Reads candidates from rendered markup via CSS selectors.
#[derive(Debug)]
pub struct DomExtractor {
    card: Option<Selector>,
    fields: Vec<CompiledField>,
}

impl DomExtractor {
    /// Compile the mapping. Fails on the first invalid selector.
    pub fn new(config: &SelectorConfig) -> Result<Self> {
        let card = config
            .card
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_selector)
            .transpose()?;

        let fields = config
            .fields
            .iter()
            .map(|f| -> Result<CompiledField> {
                Ok(CompiledField {
                    field: f.field,
                    selector: parse_selector(&f.selector)?,
                    extract: f.extract.clone(),
                    multiple: f.multiple,
                    separator: f.separator.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { card, fields })
    }

    /// Fill missing fields of `candidates` from the rendered page.
    ///
    /// Cards are matched to candidates by source URL, or by position when the
    /// counts agree. A page without cards and a single candidate (a detail
    /// page) is read as a whole. Present values are never replaced. Returns
    /// the number of fields filled.
    pub fn fill_gaps(&self, html: &str, page_url: &str, candidates: &mut [CandidatePartial]) -> usize {
        if candidates.iter().all(CandidatePartial::is_complete) {
            return 0;
        }

        let document = Html::parse_document(html);
        let cards = self.read_cards(&document, page_url);

        let mut filled = 0;
        if cards.is_empty() {
            if let [only] = candidates {
                if let Some(whole) = self.read_document(&document, page_url) {
                    filled += only.fill_gaps(&whole);
                }
            }
        } else {
            let positional = cards.len() == candidates.len();
            for (index, candidate) in candidates.iter_mut().enumerate() {
                if candidate.is_complete() {
                    continue;
                }
                let by_url = candidate.source_url.as_deref().and_then(|url| {
                    cards
                        .iter()
                        .find(|card| card.source_url.as_deref() == Some(url))
                });
                let matched = by_url.or_else(|| positional.then(|| &cards[index]));
                if let Some(card) = matched {
                    filled += candidate.fill_gaps(card);
                }
            }
        }

        if filled > 0 {
            log::debug!("DOM fallback filled {} fields on {}", filled, page_url);
        }
        filled
    }

    /// Produce candidates from the DOM alone, one per result card.
    ///
    /// Without cards, the whole page yields one candidate when a title is
    /// found; its source URL is the page URL.
    pub fn extract(&self, html: &str, page_url: &str) -> Vec<CandidatePartial> {
        let document = Html::parse_document(html);
        let cards = self.read_cards(&document, page_url);
        if !cards.is_empty() {
            return cards;
        }
        self.read_document(&document, page_url)
            .filter(|c| !c.is_missing(JobField::Title))
            .into_iter()
            .collect()
    }

    fn read_cards(&self, document: &Html, page_url: &str) -> Vec<CandidatePartial> {
        let Some(card) = &self.card else {
            return Vec::new();
        };
        document
            .select(card)
            .map(|el| self.read_scope(el, page_url, true))
            .filter(|c| !c.is_missing(JobField::Title) || !c.is_missing(JobField::Url))
            .collect()
    }

    fn read_document(&self, document: &Html, page_url: &str) -> Option<CandidatePartial> {
        let mut candidate = self.read_scope(document.root_element(), page_url, false);
        candidate.source_url = Some(page_url.to_string());
        let found = JobField::ALL
            .into_iter()
            .filter(|f| *f != JobField::Url)
            .any(|f| !candidate.is_missing(f));
        found.then_some(candidate)
    }

    /// Apply the mapping within `scope`. The first mapping entry that yields
    /// a value wins for its field.
    fn read_scope(&self, scope: ElementRef<'_>, page_url: &str, with_url: bool) -> CandidatePartial {
        let mut candidate = CandidatePartial::new(Origin::Dom);
        for entry in &self.fields {
            if (entry.field == JobField::Url && !with_url) || !candidate.is_missing(entry.field) {
                continue;
            }
            if let Some(value) = read_field(scope, entry) {
                let value = match entry.field {
                    JobField::Url => resolve(page_url, &value),
                    _ => value,
                };
                candidate.set(entry.field, value);
            }
        }
        candidate
    }
}

fn read_field(scope: ElementRef<'_>, entry: &CompiledField) -> Option<String> {
    // The scope itself may match, e.g. a card that is an anchor.
    let mut values = std::iter::once(scope)
        .filter(|el| entry.selector.matches(el))
        .chain(scope.select(&entry.selector))
        .filter_map(|el| read_value(el, &entry.extract));

    if entry.multiple {
        let mut all: Vec<String> = Vec::new();
        for value in values {
            if !all.contains(&value) {
                all.push(value);
            }
        }
        (!all.is_empty()).then(|| all.join(&entry.separator))
    } else {
        values.next()
    }
}

fn read_value(el: ElementRef<'_>, extract: &Extract) -> Option<String> {
    let value = match extract {
        Extract::Text => collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")),
        Extract::Html => el.inner_html().trim().to_string(),
        Extract::Attr(name) => el.value().attr(name)?.trim().to_string(),
    };
    (!value.is_empty()).then_some(value)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldSelector;

    const PAGE_URL: &str = "https://jobs.example.com/search/job";

    fn mapping() -> SelectorConfig {
        SelectorConfig {
            card: Some("div.card".to_string()),
            fields: vec![
                FieldSelector::new(JobField::Title, "h2"),
                FieldSelector::new(JobField::Company, "span.company"),
                FieldSelector::new(JobField::Location, "span.loc").multiple(),
                FieldSelector::new(JobField::Description, "div.desc").extract(Extract::Html),
                FieldSelector::new(JobField::Url, "a[href]")
                    .extract(Extract::Attr("href".to_string())),
            ],
        }
    }

    const LISTING: &str = r#"
        <html><body>
          <div class="card">
            <h2> Solar   Technician </h2>
            <span class="company">SunCorp</span>
            <span class="loc">Pune</span><span class="loc">Mumbai</span><span class="loc">Pune</span>
            <a href="/job/solar-1">View</a>
          </div>
          <div class="card">
            <h2>Wind Analyst</h2>
            <span class="company">Breeze Ltd</span>
            <a href="/job/wind-2">View</a>
          </div>
        </body></html>
    "#;

    fn structured(title: &str, url: Option<&str>) -> CandidatePartial {
        CandidatePartial {
            title: Some(title.to_string()),
            company: Some(String::new()),
            source_url: url.map(str::to_string),
            ..CandidatePartial::default()
        }
    }

    #[test]
    fn test_standalone_one_candidate_per_card() {
        let dom = DomExtractor::new(&mapping()).unwrap();
        let jobs = dom.extract(LISTING, PAGE_URL);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].title.as_deref(), Some("Solar Technician"));
        assert_eq!(jobs[0].location.as_deref(), Some("Pune, Mumbai"));
        assert_eq!(
            jobs[0].source_url.as_deref(),
            Some("https://jobs.example.com/job/solar-1")
        );
        assert_eq!(jobs[1].company.as_deref(), Some("Breeze Ltd"));
        assert!(jobs[1].location.is_none());
        assert_eq!(jobs[1].origin, Origin::Dom);
    }

    #[test]
    fn test_gap_fill_by_url_is_additive() {
        let dom = DomExtractor::new(&mapping()).unwrap();
        let mut candidates = vec![structured(
            "Wind Analyst (Senior)",
            Some("https://jobs.example.com/job/wind-2"),
        )];

        let filled = dom.fill_gaps(LISTING, PAGE_URL, &mut candidates);

        assert!(filled >= 1);
        assert_eq!(candidates[0].title.as_deref(), Some("Wind Analyst (Senior)"));
        assert_eq!(candidates[0].company.as_deref(), Some("Breeze Ltd"));
        assert_eq!(candidates[0].origin, Origin::Structured);
    }

    #[test]
    fn test_gap_fill_by_position_when_counts_match() {
        let dom = DomExtractor::new(&mapping()).unwrap();
        let mut candidates = vec![structured("A", None), structured("B", None)];

        dom.fill_gaps(LISTING, PAGE_URL, &mut candidates);

        assert_eq!(candidates[0].company.as_deref(), Some("SunCorp"));
        assert_eq!(
            candidates[1].source_url.as_deref(),
            Some("https://jobs.example.com/job/wind-2")
        );
    }

    #[test]
    fn test_gap_fill_skips_unmatched_candidates() {
        let dom = DomExtractor::new(&mapping()).unwrap();
        let mut candidates = vec![structured("Lonely", Some("https://jobs.example.com/job/x"))];

        assert_eq!(dom.fill_gaps(LISTING, PAGE_URL, &mut candidates), 0);
        assert_eq!(candidates[0].company.as_deref(), Some(""));
    }

    #[test]
    fn test_detail_page_read_as_whole() {
        let html = r#"<html><body>
            <h2>Energy Auditor</h2>
            <span class="company">Watt Works</span>
            <div class="desc"><p>Audit buildings</p></div>
            <a href="/elsewhere">Other</a>
        </body></html>"#;
        let dom = DomExtractor::new(&mapping()).unwrap();
        let url = "https://jobs.example.com/job/audit-7";
        let mut candidates = vec![CandidatePartial {
            title: Some("Energy Auditor".to_string()),
            source_url: Some(url.to_string()),
            ..CandidatePartial::default()
        }];

        dom.fill_gaps(html, url, &mut candidates);

        assert_eq!(candidates[0].company.as_deref(), Some("Watt Works"));
        assert_eq!(candidates[0].description.as_deref(), Some("<p>Audit buildings</p>"));
        assert_eq!(candidates[0].source_url.as_deref(), Some(url));
    }

    #[test]
    fn test_whole_page_needs_a_title() {
        let dom = DomExtractor::new(&mapping()).unwrap();
        let url = "https://jobs.example.com/job/audit-7";

        let found = dom.extract("<html><body><h2>Energy Auditor</h2></body></html>", url);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source_url.as_deref(), Some(url));

        assert!(dom.extract("<html><body><p>nothing</p></body></html>", url).is_empty());
    }

    #[test]
    fn test_empty_card_selector_means_whole_document() {
        let config = SelectorConfig {
            card: Some("  ".to_string()),
            ..mapping()
        };
        let dom = DomExtractor::new(&config).unwrap();
        assert_eq!(dom.extract(LISTING, PAGE_URL).len(), 1);
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut config = mapping();
        config.fields.push(FieldSelector::new(JobField::Title, "[[invalid"));
        assert!(DomExtractor::new(&config).is_err());
    }
}
