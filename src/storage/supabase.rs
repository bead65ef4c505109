//! Supabase (PostgREST) sink.
//!
//! Ensures every posting's company exists in the companies table, then
//! upserts the postings into the jobs table keyed by link.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{JobRecord, SinkConfig};
use crate::storage::{RecordSink, SinkReport};

const URL_VAR: &str = "SUPABASE_URL";
const KEY_VAR: &str = "SUPABASE_KEY";

#[derive(Debug, Serialize)]
struct CompanyRow<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct JobRow<'a> {
    title: &'a str,
    description: &'a str,
    business_name: &'a str,
    location: &'a str,
    link: &'a str,
}

impl<'a> From<&'a JobRecord> for JobRow<'a> {
    fn from(record: &'a JobRecord) -> Self {
        Self {
            title: &record.title,
            description: &record.description,
            business_name: &record.company,
            location: &record.location,
            link: &record.source_url,
        }
    }
}

/// Remote sink backed by Supabase's REST interface.
pub struct SupabaseSink {
    client: Client,
    base_url: String,
    key: String,
    jobs_table: String,
    companies_table: String,
}

impl SupabaseSink {
    /// Create a sink for the project at `base_url`.
    pub fn new(base_url: &str, key: &str, config: &SinkConfig) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        url::Url::parse(&base_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            key: key.trim().to_string(),
            jobs_table: config.jobs_table.clone(),
            companies_table: config.companies_table.clone(),
        })
    }

    /// Create a sink from `SUPABASE_URL` and `SUPABASE_KEY`.
    pub fn from_env(config: &SinkConfig) -> Result<Self> {
        Self::from_vars(
            std::env::var(URL_VAR).ok(),
            std::env::var(KEY_VAR).ok(),
            config,
        )
    }

    fn from_vars(url: Option<String>, key: Option<String>, config: &SinkConfig) -> Result<Self> {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match (non_blank(url), non_blank(key)) {
            (Some(url), Some(key)) => Self::new(&url, &key, config),
            _ => Err(AppError::config(format!(
                "{URL_VAR} and {KEY_VAR} must be set (environment or .env)"
            ))),
        }
    }

    fn endpoint(&self, table: &str, conflict: &str) -> String {
        format!("{}/rest/v1/{}?on_conflict={}", self.base_url, table, conflict)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        table: &str,
        conflict: &str,
        prefer: &str,
        rows: &T,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint(table, conflict))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", prefer)
            .json(rows)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::sink(format!(
                "{} upsert failed with HTTP {}: {}",
                table,
                status,
                body.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSink for SupabaseSink {
    async fn upsert(&self, records: &[JobRecord]) -> Result<SinkReport> {
        // Jobs reference their company by name; both columns are required.
        let (rows, skipped): (Vec<&JobRecord>, Vec<&JobRecord>) = records
            .iter()
            .partition(|r| !r.company.trim().is_empty() && !r.description.trim().is_empty());
        for record in &skipped {
            log::warn!(
                "Skipping job without company or description: {}",
                record.source_url
            );
        }

        if rows.is_empty() {
            return Ok(SinkReport {
                submitted: records.len(),
                upserted: 0,
            });
        }

        let mut seen = HashSet::new();
        let companies: Vec<CompanyRow<'_>> = rows
            .iter()
            .filter(|r| seen.insert(r.company.as_str()))
            .map(|r| CompanyRow { name: &r.company })
            .collect();
        self.post(
            &self.companies_table,
            "name",
            "resolution=ignore-duplicates,return=minimal",
            &companies,
        )
        .await?;
        log::info!("Ensured {} companies exist", companies.len());

        let jobs: Vec<JobRow<'_>> = rows.iter().map(|r| JobRow::from(*r)).collect();
        self.post(
            &self.jobs_table,
            "link",
            "resolution=merge-duplicates,return=minimal",
            &jobs,
        )
        .await?;
        log::info!("Upserted {} jobs into {}", jobs.len(), self.jobs_table);

        Ok(SinkReport {
            submitted: records.len(),
            upserted: jobs.len(),
        })
    }

    fn name(&self) -> &str {
        "supabase"
    }
}
