// src/models/mod.rs

//! Domain models for the scraper application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod job;
mod page;
mod run;
mod selectors;

// Re-export all public types
pub use config::{
    Config, FetchConfig, LimitsConfig, LoggingConfig, SinkConfig, SinkKind, SiteConfig,
};
pub use job::{CandidatePartial, JobRecord, Origin};
pub use page::{FetchStatus, PageFetchResult};
pub use run::{RunState, RunStats};
pub use selectors::{Extract, FieldSelector, JobField, SelectorConfig};
