// src/models/job.rs

//! Job posting records: sparse extraction candidates and the canonical record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::JobField;

/// Which extraction strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Structured,
    Dom,
}

/// Field-sparse record produced by a single extractor.
///
/// `None` means the extractor found nothing for that field. A present but
/// blank value is treated the same way when merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidatePartial {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub origin: Origin,
}

impl CandidatePartial {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    pub fn get(&self, field: JobField) -> Option<&str> {
        match field {
            JobField::Title => self.title.as_deref(),
            JobField::Company => self.company.as_deref(),
            JobField::Location => self.location.as_deref(),
            JobField::Description => self.description.as_deref(),
            JobField::Url => self.source_url.as_deref(),
        }
    }

    pub fn set(&mut self, field: JobField, value: impl Into<String>) {
        let slot = match field {
            JobField::Title => &mut self.title,
            JobField::Company => &mut self.company,
            JobField::Location => &mut self.location,
            JobField::Description => &mut self.description,
            JobField::Url => &mut self.source_url,
        };
        *slot = Some(value.into());
    }

    /// True if the field is absent or blank after trimming.
    pub fn is_missing(&self, field: JobField) -> bool {
        self.get(field).is_none_or(|v| v.trim().is_empty())
    }

    /// Fields that a fallback strategy may still fill.
    pub fn missing_fields(&self) -> Vec<JobField> {
        JobField::ALL
            .into_iter()
            .filter(|f| self.is_missing(*f))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Copy fields from `other` into the gaps of `self`.
    ///
    /// Never overwrites a present value. Returns the number of fields filled.
    pub fn fill_gaps(&mut self, other: &CandidatePartial) -> usize {
        let mut filled = 0;
        for field in JobField::ALL {
            if !self.is_missing(field) {
                continue;
            }
            if let Some(value) = other.get(field).filter(|v| !v.trim().is_empty()) {
                self.set(field, value);
                filled += 1;
            }
        }
        if self.posted_at.is_none() && other.posted_at.is_some() {
            self.posted_at = other.posted_at;
        }
        filled
    }
}

/// Canonical, deduplicated job record handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Stable identifier derived from the source URL
    pub id: String,

    pub title: String,

    /// Empty string when no extractor found a value
    pub company: String,

    pub location: String,

    pub description: String,

    /// Absolute URL of the posting (dedup key)
    pub source_url: String,

    /// Publication date, when the page advertises one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,

    /// When this record was scraped
    pub retrieved_at: DateTime<Utc>,
}

impl JobRecord {
    /// Stable record id: first 16 hex chars of SHA-256 over the source URL.
    pub fn id_for(source_url: &str) -> String {
        let digest = Sha256::digest(source_url.as_bytes());
        hex::encode(digest)[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(title: Option<&str>, company: Option<&str>) -> CandidatePartial {
        CandidatePartial {
            title: title.map(str::to_string),
            company: company.map(str::to_string),
            ..CandidatePartial::default()
        }
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let p = partial(Some("Solar Technician"), Some("   "));
        assert!(!p.is_missing(JobField::Title));
        assert!(p.is_missing(JobField::Company));
        assert!(p.is_missing(JobField::Location));
    }

    #[test]
    fn test_fill_gaps_is_additive() {
        let mut primary = partial(Some("Solar Technician"), Some(""));
        let fallback = CandidatePartial {
            title: Some("Other Title".to_string()),
            company: Some("SunCorp".to_string()),
            location: Some("Pune".to_string()),
            ..CandidatePartial::new(Origin::Dom)
        };

        let filled = primary.fill_gaps(&fallback);

        assert_eq!(filled, 2);
        assert_eq!(primary.title.as_deref(), Some("Solar Technician"));
        assert_eq!(primary.company.as_deref(), Some("SunCorp"));
        assert_eq!(primary.location.as_deref(), Some("Pune"));
        assert_eq!(primary.origin, Origin::Structured);
    }

    #[test]
    fn test_fill_gaps_ignores_blank_fallback() {
        let mut primary = partial(Some("Wind Analyst"), None);
        let fallback = partial(None, Some("  "));
        assert_eq!(primary.fill_gaps(&fallback), 0);
        assert!(primary.company.is_none());
    }

    #[test]
    fn test_record_id_is_stable() {
        let a = JobRecord::id_for("https://example.com/job/1");
        let b = JobRecord::id_for("https://example.com/job/1");
        let c = JobRecord::id_for("https://example.com/job/2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }
}
