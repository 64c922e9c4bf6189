//! Registry lookup state machine
//!
//! [`search::SearchController`] drives the lookup form for one organization
//! and hands the loaded results grid to [`results::ResultExtractor`], which
//! reads every row and walks the paginator.

pub mod results;
pub mod search;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::driver::UiDriver;
use crate::models::{Organization, Record};
use crate::utils::error::SearchError;

pub use results::ResultExtractor;
pub use search::SearchController;

/// Timing and bounds of one organization search
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// URL of the lookup form, loaded fresh for every organization
    pub search_url: String,

    /// Bound for every wait on a form control
    pub wait_timeout: Duration,

    pub poll_interval: Duration,

    /// Pause after submitting the search and after each page turn
    pub inter_request_delay: Duration,

    /// Ceiling on result pages read per organization
    pub max_pages: u32,

    pub page_settle: Duration,
    pub picker_open: Duration,
    pub filter_typed: Duration,
    pub candidates_settle: Duration,
    pub picker_close: Duration,
    pub table_settle: Duration,
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        let timing = &config.timing;
        Self {
            search_url: config.scraper.search_url.clone(),
            wait_timeout: config.wait_timeout(),
            poll_interval: Duration::from_millis(timing.poll_interval_ms),
            inter_request_delay: config.inter_request_delay(),
            max_pages: config.scraper.max_pages,
            page_settle: Duration::from_millis(timing.page_settle_ms),
            picker_open: Duration::from_millis(timing.picker_open_ms),
            filter_typed: Duration::from_millis(timing.filter_typed_ms),
            candidates_settle: Duration::from_millis(timing.candidates_settle_ms),
            picker_close: Duration::from_millis(timing.picker_close_ms),
            table_settle: Duration::from_millis(timing.table_settle_ms),
        }
    }
}

/// One organization's full lookup, from a fresh form to the extracted rows.
///
/// An organization the picker does not list yields `Ok(vec![])`.
#[async_trait]
pub trait OrganizationSearch<D: UiDriver>: Send + Sync {
    async fn search(
        &self,
        driver: &D,
        organization: &Organization,
    ) -> Result<Vec<Record>, SearchError>;
}

/// Sleep unless the pause is configured away
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
