// src/services/normalizer.rs

//! Record normalizer: cleans merged candidates into `JobRecord`s and
//! deduplicates them by source URL within a run.

use chrono::{DateTime, Utc};

use crate::models::{CandidatePartial, JobRecord, RunState};
use crate::utils::{collapse_whitespace, strip_markup};

/// Normalize `candidates` and accept those not seen before in this run.
///
/// At most `capacity` records are accepted (`None` for no limit); candidates
/// beyond it are left unmarked so a later run can still collect them.
/// Rejected and duplicate candidates are only counted in `state.stats`.
pub fn normalize(
    state: &mut RunState,
    candidates: Vec<CandidatePartial>,
    capacity: Option<usize>,
) -> Vec<JobRecord> {
    let retrieved_at = Utc::now();
    let mut accepted = Vec::new();

    for candidate in candidates {
        if capacity.is_some_and(|cap| accepted.len() >= cap) {
            break;
        }

        let Some(record) = to_record(candidate, retrieved_at) else {
            state.stats.rejected += 1;
            continue;
        };

        if !state.mark_seen(record.source_url.as_str()) {
            log::debug!("Duplicate posting dropped: {}", record.source_url);
            state.stats.duplicates += 1;
            continue;
        }

        accepted.push(record);
    }

    accepted
}

/// Clean a single candidate. Returns `None` if the title or source URL is
/// empty after cleaning.
pub fn to_record(candidate: CandidatePartial, retrieved_at: DateTime<Utc>) -> Option<JobRecord> {
    let clean = |value: Option<String>| value.as_deref().map(collapse_whitespace).unwrap_or_default();

    let title = clean(candidate.title);
    let source_url = candidate
        .source_url
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    if title.is_empty() || source_url.is_empty() {
        log::debug!(
            "Candidate rejected (title: {:?}, url: {:?})",
            title,
            source_url
        );
        return None;
    }

    Some(JobRecord {
        id: JobRecord::id_for(&source_url),
        title,
        company: clean(candidate.company),
        location: clean(candidate.location),
        description: candidate
            .description
            .as_deref()
            .map(strip_markup)
            .unwrap_or_default(),
        source_url,
        posted_at: candidate.posted_at,
        retrieved_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Origin;
    use std::collections::HashSet;

    fn candidate(title: &str, url: &str) -> CandidatePartial {
        CandidatePartial {
            title: Some(title.to_string()),
            source_url: Some(url.to_string()),
            ..CandidatePartial::new(Origin::Structured)
        }
    }

    #[test]
    fn test_cleans_fields() {
        let raw = CandidatePartial {
            company: Some("  Sun\n Corp ".to_string()),
            description: Some("<p>Install <b>panels</b></p>".to_string()),
            ..candidate("  Solar \t Technician ", " https://example.com/job/1 ")
        };

        let record = to_record(raw, Utc::now()).unwrap();

        assert_eq!(record.title, "Solar Technician");
        assert_eq!(record.company, "Sun Corp");
        assert_eq!(record.location, "");
        assert_eq!(record.description, "Install panels");
        assert_eq!(record.source_url, "https://example.com/job/1");
        assert_eq!(record.id, JobRecord::id_for("https://example.com/job/1"));
    }

    #[test]
    fn test_rejects_missing_title_or_url() {
        let mut state = RunState::new();
        let records = normalize(
            &mut state,
            vec![
                candidate("   ", "https://example.com/job/1"),
                CandidatePartial {
                    source_url: None,
                    ..candidate("Wind Analyst", "")
                },
                candidate("Grid Engineer", "https://example.com/job/3"),
            ],
            None,
        );

        assert_eq!(records.len(), 1);
        assert_eq!(state.stats.rejected, 2);
        assert!(!state.is_seen("https://example.com/job/1"));
    }

    #[test]
    fn test_no_two_records_share_a_url() {
        let mut state = RunState::new();
        let records = normalize(
            &mut state,
            vec![
                candidate("A", "https://example.com/job/1"),
                candidate("B", "https://example.com/job/2"),
                candidate("A again", "https://example.com/job/1"),
            ],
            None,
        );

        let urls: HashSet<_> = records.iter().map(|r| r.source_url.as_str()).collect();
        assert_eq!(urls.len(), records.len());
        assert_eq!(records.len(), 2);
        assert_eq!(state.stats.duplicates, 1);
    }

    #[test]
    fn test_second_pass_accepts_nothing() {
        let mut state = RunState::new();
        let batch = || {
            vec![
                candidate("Solar Technician", "https://example.com/job/1"),
                candidate("Wind Analyst", "https://example.com/job/2"),
            ]
        };

        assert_eq!(normalize(&mut state, batch(), None).len(), 2);
        assert!(normalize(&mut state, batch(), None).is_empty());
        assert_eq!(state.stats.duplicates, 2);
    }

    #[test]
    fn test_capacity_leaves_rest_unseen() {
        let mut state = RunState::new();
        let records = normalize(
            &mut state,
            vec![
                candidate("Solar Technician", "https://example.com/job/1"),
                candidate("Wind Analyst", "https://example.com/job/2"),
            ],
            Some(1),
        );

        assert_eq!(records.len(), 1);
        assert!(!state.is_seen("https://example.com/job/2"));
    }
}
