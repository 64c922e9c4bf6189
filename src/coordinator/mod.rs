//! Run coordinator
//!
//! Walks the organization list in order, one organization at a time:
//!
//! ```text
//!  resume cursor ──► search ──► Ok(records) ──► append to sink ──► advance
//!                      │
//!                      ├─ SessionLost ──► restart browser ──► search again
//!                      │                  (up to max_attempts)
//!                      └─ Timeout / Other ──► count failure ──► advance
//! ```
//!
//! Whatever way the run ends, the summary is logged, the sink flushed, the
//! checkpoint written and the browser released.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::crawler::{pause, OrganizationSearch, SearchController, SearchSettings};
use crate::driver::UiDriver;
use crate::error::{Error, Result, ScrapeErrorTrait};
use crate::models::{Organization, Record, RunState, RunSummary};
use crate::storage::{RecordSink, RunCheckpoint};
use crate::utils::error::SearchError;

/// Retry and bookkeeping settings of a run
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Searches per organization when the browser session keeps dying
    pub max_attempts: u32,

    pub between_organizations: Duration,

    /// Pause after restarting a lost session
    pub session_restart_pause: Duration,

    /// Written at the end of every run when set
    pub checkpoint_path: Option<PathBuf>,

    /// Recorded in the checkpoint
    pub input_path: PathBuf,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.scraper.max_attempts,
            between_organizations: Duration::from_millis(config.timing.between_organizations_ms),
            session_restart_pause: Duration::from_millis(config.timing.session_restart_pause_ms),
            checkpoint_path: config.scraper.checkpoint_path.clone(),
            input_path: config.scraper.input_path.clone(),
        }
    }
}

/// Where a run starts in the organization list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePoint {
    /// First organization whose name matches exactly (surrounding whitespace ignored)
    Name(String),
    /// Position recorded by a checkpoint; the organization there must still
    /// carry `name`
    Index { index: usize, name: String },
}

impl ResumePoint {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Index { name, .. } => name,
        }
    }
}

impl fmt::Display for ResumePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name.trim()),
            Self::Index { index, name } => write!(f, "[{index}] {name}"),
        }
    }
}

/// Sequential driver of a whole run.
///
/// Owns the browser driver and the output sink; the searcher borrows the
/// driver for one organization at a time.
pub struct RunCoordinator<D, S, Q = SearchController> {
    driver: D,
    sink: S,
    searcher: Q,
    state: RunState,
    settings: CoordinatorSettings,
}

impl<D, S> RunCoordinator<D, S, SearchController>
where
    D: UiDriver,
    S: RecordSink,
{
    /// Coordinator using the lookup-form controller configured by `config`
    pub fn from_config(
        driver: D,
        sink: S,
        organizations: Vec<Organization>,
        config: &Config,
    ) -> Self {
        Self::new(
            driver,
            sink,
            SearchController::new(SearchSettings::from_config(config)),
            organizations,
            CoordinatorSettings::from_config(config),
        )
    }
}

impl<D, S, Q> RunCoordinator<D, S, Q>
where
    D: UiDriver,
    S: RecordSink,
    Q: OrganizationSearch<D>,
{
    pub fn new(
        driver: D,
        sink: S,
        searcher: Q,
        organizations: Vec<Organization>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            driver,
            sink,
            searcher,
            state: RunState::new(organizations),
            settings,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Current counters, also available after a failed run
    pub fn summary(&self) -> RunSummary {
        self.state.summary()
    }

    /// Process the organization list.
    ///
    /// `resume_from` skips every organization before the first exact match;
    /// `max_organizations` stops the run once that many organizations have
    /// been searched. Cancelling `cancel` stops the run before the next
    /// organization starts.
    pub async fn run(
        &mut self,
        resume_from: Option<&str>,
        max_organizations: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let start = resume_from.map(|name| ResumePoint::Name(name.to_string()));
        self.run_from(start, max_organizations, cancel).await
    }

    /// Like [`RunCoordinator::run`], starting at an explicit [`ResumePoint`].
    ///
    /// Checkpoints resume by index so that a name listed twice does not send
    /// the run back to its first occurrence.
    pub async fn run_from(
        &mut self,
        start: Option<ResumePoint>,
        max_organizations: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        tracing::info!(
            organizations = self.state.organizations().len(),
            resume_from = ?start.as_ref().map(ToString::to_string),
            max_organizations = ?max_organizations,
            "Starting run"
        );

        let outcome = self.process(start.as_ref(), max_organizations, &cancel).await;

        // A misconfigured run must not overwrite the checkpoint of a good one
        let save_checkpoint = !matches!(outcome, Err(Error::Config(_)));
        let summary = self.finalize(save_checkpoint).await;

        outcome.map(|()| summary)
    }

    /// Index of the first organization to search
    fn resolve(&self, start: &ResumePoint) -> Result<usize> {
        match start {
            ResumePoint::Name(name) => self.state.position_of(name).ok_or_else(|| {
                Error::config(format!(
                    "resume organization '{}' not found in the organization list",
                    name.trim()
                ))
            }),
            ResumePoint::Index { index, name } => {
                match self.state.organizations().get(*index) {
                    Some(org) if org.matches(name) => Ok(*index),
                    Some(org) => Err(Error::config(format!(
                        "organization {index} is '{org}', checkpoint expects '{}'",
                        name.trim()
                    ))),
                    None => Err(Error::config(format!(
                        "organization {index} is past the end of the list, checkpoint expects '{}'",
                        name.trim()
                    ))),
                }
            }
        }
    }

    async fn process(
        &mut self,
        start: Option<&ResumePoint>,
        max_organizations: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some(start) = start {
            let index = self.resolve(start)?;
            tracing::info!(organization = %start.name().trim(), index, "Resuming run");
            self.state.skip_to(index);
        }

        let total = self.state.organizations().len();

        while let Some(organization) = self.state.current().cloned() {
            if cancel.is_cancelled() {
                tracing::warn!("Run interrupted");
                self.state.mark_interrupted();
                break;
            }

            let index = self.state.cursor();
            self.state.begin_organization();
            tracing::info!(
                organization = %organization,
                index,
                total,
                "Processing organization"
            );

            match self.search_with_recovery(&organization).await {
                Some(records) => self.persist(&organization, &records)?,
                None => self.state.record_failure(),
            }
            self.state.advance();

            if let Some(max) = max_organizations {
                if self.state.organizations_processed() >= max {
                    tracing::info!(max_organizations = max, "Reached organization limit");
                    break;
                }
            }

            if self.state.current().is_some() && !self.pause_between(cancel).await {
                tracing::warn!("Run interrupted");
                self.state.mark_interrupted();
                break;
            }
        }

        // Ctrl-C during the last search ends the loop without another check
        if cancel.is_cancelled() && !self.state.is_interrupted() {
            tracing::warn!("Run interrupted");
            self.state.mark_interrupted();
        }

        Ok(())
    }

    /// Search one organization, restarting the browser on session loss.
    ///
    /// `None` means the organization was abandoned.
    async fn search_with_recovery(&mut self, organization: &Organization) -> Option<Vec<Record>> {
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let error: SearchError = match self.searcher.search(&self.driver, organization).await {
                Ok(records) => return Some(records),
                Err(e) => e,
            };

            if !error.is_recoverable() || attempt == max_attempts {
                tracing::error!(
                    organization = %organization,
                    attempt,
                    kind = ?error.kind(),
                    error = %error,
                    "Skipping organization"
                );
                return None;
            }

            tracing::warn!(
                organization = %organization,
                attempt,
                error = %error,
                "Browser session lost, restarting"
            );
            match self.driver.restart().await {
                Ok(()) => self.state.record_restart(),
                Err(e) => {
                    tracing::error!(
                        organization = %organization,
                        attempt,
                        error = %e,
                        "Browser restart failed"
                    );
                }
            }
            pause(self.settings.session_restart_pause).await;
        }

        None
    }

    fn persist(&mut self, organization: &Organization, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            tracing::info!(organization = %organization, "No records found");
            return Ok(());
        }

        self.sink.append(records)?;
        self.state.record_results(records.len());
        tracing::info!(
            organization = %organization,
            rows = records.len(),
            total_records = self.state.total_records(),
            "Records saved"
        );
        Ok(())
    }

    /// Returns `false` when the run was cancelled during the pause
    async fn pause_between(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = pause(self.settings.between_organizations) => !cancel.is_cancelled(),
        }
    }

    async fn finalize(&mut self, save_checkpoint: bool) -> RunSummary {
        let summary = self.state.summary();

        tracing::info!(
            processed = summary.organizations_processed,
            with_results = summary.organizations_with_results,
            total_records = summary.total_records,
            failed = summary.organizations_failed,
            session_restarts = summary.session_restarts,
            last_reached_index = ?summary.last_reached_index,
            last_reached = ?summary.last_reached,
            next_organization = ?summary.next_organization,
            interrupted = summary.interrupted,
            duration_secs = summary.duration_secs,
            "Run finished"
        );

        if let Err(e) = self.sink.flush() {
            tracing::error!(error = %e, "Failed to flush output");
        }

        if let (true, Some(path)) = (save_checkpoint, &self.settings.checkpoint_path) {
            let checkpoint = RunCheckpoint::new(&self.settings.input_path, summary.clone());
            match checkpoint.save(path) {
                Ok(()) => tracing::info!(path = %path.display(), "Checkpoint written"),
                Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to write checkpoint"),
            }
        }

        if let Err(e) = self.driver.quit().await {
            tracing::warn!(error = %e, "Failed to release browser");
        }

        summary
    }
}
