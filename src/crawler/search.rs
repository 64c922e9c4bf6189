//! Organization search controller
//!
//! Each search starts from a freshly loaded form: open the laboratory
//! picker, filter it by the organization name, pick the first candidate,
//! press "Buscar", then read the results grid.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{pause, OrganizationSearch, ResultExtractor, SearchSettings};
use crate::driver::{Control, Key, UiDriver};
use crate::models::{Organization, Record};
use crate::utils::error::{DriverError, SearchError};
use crate::utils::{starts_with_ignore_case, truncate_text};

/// Drives the lookup form for one organization at a time
#[derive(Debug)]
pub struct SearchController {
    settings: SearchSettings,
    candidate_mismatches: AtomicUsize,
}

impl SearchController {
    #[must_use]
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            candidate_mismatches: AtomicUsize::new(0),
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Searches whose first picker candidate did not match the query
    pub fn candidate_mismatches(&self) -> usize {
        self.candidate_mismatches.load(Ordering::Relaxed)
    }

    /// Pick the organization in the laboratory picker.
    ///
    /// Returns `false` when the picker lists no candidate for the query.
    async fn select_organization<D: UiDriver>(
        &self,
        driver: &D,
        organization: &Organization,
    ) -> Result<bool, SearchError> {
        let s = &self.settings;

        let picker = driver
            .wait_for(Control::OrganizationPicker, s.wait_timeout, s.poll_interval)
            .await?;
        driver.click(&picker).await?;
        pause(s.picker_open).await;

        let filter = driver
            .wait_for(Control::PickerFilter, s.wait_timeout, s.poll_interval)
            .await?;
        driver.clear(&filter).await?;

        let query = organization.query();
        driver.type_text(&filter, query).await?;
        pause(s.filter_typed).await;

        match driver.find(Control::PickerSearchIcon).await? {
            Some(icon) => driver.click(&icon).await?,
            None => driver.press_key(&filter, Key::Enter).await?,
        }
        pause(s.candidates_settle).await;

        let candidate = match driver
            .wait_for(Control::PickerCandidate, s.wait_timeout, s.poll_interval)
            .await
        {
            Ok(candidate) => candidate,
            Err(DriverError::Timeout { .. }) => {
                tracing::info!(
                    organization = %truncate_text(organization.name(), 60),
                    query = %query,
                    "Organization not listed by the picker"
                );
                self.dismiss_picker(driver).await?;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.check_candidate(driver, &candidate, query).await? {
            self.candidate_mismatches.fetch_add(1, Ordering::Relaxed);
        }

        driver.click(&candidate).await?;
        pause(s.picker_close).await;

        Ok(true)
    }

    /// Close the picker popup with Escape
    async fn dismiss_picker<D: UiDriver>(&self, driver: &D) -> Result<(), SearchError> {
        let result = match driver.find(Control::PageBody).await {
            Ok(Some(body)) => driver.press_key(&body, Key::Escape).await,
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        match result {
            Err(e) if e.is_session_lost() => Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to dismiss picker");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Warn when the first candidate does not look like the queried name.
    ///
    /// Returns `false` on a mismatch; unreadable text counts as a match.
    async fn check_candidate<D: UiDriver>(
        &self,
        driver: &D,
        candidate: &D::Element,
        query: &str,
    ) -> Result<bool, SearchError> {
        match driver.read_text(candidate).await {
            Ok(text) if !starts_with_ignore_case(&text, query) => {
                tracing::warn!(
                    query = %query,
                    candidate = %truncate_text(text.trim(), 60),
                    "First picker candidate does not match the query, selecting it anyway"
                );
                Ok(false)
            }
            Ok(_) => Ok(true),
            Err(e) if e.is_session_lost() => Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Could not read picker candidate text");
                Ok(true)
            }
        }
    }

    /// Whether the grid shows its "no results" marker
    async fn results_empty<D: UiDriver>(&self, driver: &D) -> Result<bool, SearchError> {
        match driver.find(Control::EmptyResultsMarker).await? {
            Some(marker) => Ok(driver.is_displayed(&marker).await?),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl<D: UiDriver> OrganizationSearch<D> for SearchController {
    async fn search(
        &self,
        driver: &D,
        organization: &Organization,
    ) -> Result<Vec<Record>, SearchError> {
        let s = &self.settings;

        tracing::debug!(organization = %organization, "Loading search form");
        driver.navigate(&s.search_url).await?;
        pause(s.page_settle).await;

        if !self.select_organization(driver, organization).await? {
            return Ok(Vec::new());
        }

        let button = driver
            .wait_for(Control::SearchButton, s.wait_timeout, s.poll_interval)
            .await?;
        driver.click(&button).await?;
        pause(s.inter_request_delay).await;

        if self.results_empty(driver).await? {
            tracing::info!(organization = %organization, "No results");
            return Ok(Vec::new());
        }

        ResultExtractor::new(driver, s).extract_all().await
    }
}
