//! Service layer for the scraper.
//!
//! This module contains the pipeline leaves:
//! - Browser sessions (`BrowserSession`, `ChromeSession`)
//! - Page fetching with retry and block detection (`PageFetcher`)
//! - Structured-data extraction (`StructuredExtractor`)
//! - DOM selector fallback (`DomExtractor`)
//! - Record normalization (`normalize`)

mod browser;
mod dom;
mod fetcher;
mod normalizer;
mod structured;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::{BrowserSession, ChromeSession, NavigationError};
pub use dom::DomExtractor;
pub use fetcher::{PageFetcher, PageSource};
pub use normalizer::{normalize, to_record};
pub use structured::{StructuredExtraction, StructuredExtractor};
