//! vademecum - ANMAT drug registry scraper
//!
//! Drives the public PAMI/ANMAT vademecum lookup form once per laboratory of
//! the ANMAT registry, reads every page of the results grid and appends the
//! listings to a CSV file. Lost browser sessions are restarted and the run
//! can be resumed from any laboratory.
//!
//! # Architecture
//!
//! - [`config`] - Configuration management and settings
//! - [`driver`] - Browser capability interface and its Chrome implementation
//! - [`crawler`] - Per-organization search state machine and results reader
//! - [`coordinator`] - Run loop with retry, resume and finalization
//! - [`models`] - Core data structures and types
//! - [`input`] - Laboratory list loader
//! - [`storage`] - CSV output sink and run checkpoints
//! - [`utils`] - Common utilities, retry helpers and domain errors
//!
//! # Example
//!
//! ```no_run
//! use vademecum::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let organizations = load_organizations(&config.scraper.input_path)?;
//!     let sink = CsvSink::open(&config.scraper.output_path)?;
//!     let driver = ChromiumDriver::launch(config.browser.clone(), config.selectors.clone()).await?;
//!
//!     let mut coordinator = RunCoordinator::from_config(driver, sink, organizations, &config);
//!     let summary = coordinator.run(None, Some(10), CancellationToken::new()).await?;
//!     println!("{} records", summary.total_records);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod crawler;
pub mod driver;
pub mod error;
pub mod input;
pub mod models;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::coordinator::{CoordinatorSettings, ResumePoint, RunCoordinator};
    pub use crate::crawler::{OrganizationSearch, SearchController, SearchSettings};
    pub use crate::driver::{ChromiumDriver, Control, UiDriver};
    pub use crate::error::{Error, ErrorCategory, Result, ScrapeErrorTrait};
    pub use crate::input::load_organizations;
    pub use crate::models::{Availability, Organization, Record, RunSummary};
    pub use crate::storage::{CsvSink, RecordSink, RunCheckpoint};
}

// Direct re-exports for convenience
pub use error::{Error, Result};
pub use models::{Organization, Record, RunSummary};
