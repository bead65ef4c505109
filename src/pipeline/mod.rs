//! Pipeline entry points for scraper operations.
//!
//! - `paginate`: Walk result pages and collect normalized records
//! - `run_scraper`: Own the browser, paginate, then store the records

pub mod paginate;
pub mod run;

pub use paginate::{PaginationOutcome, Paginator, StopReason, extract_records, paginate};
pub use run::{RunSummary, run_scraper, run_with_source};
