//! Error types for the vademecum scraper
//!
//! This module defines the failure taxonomy shared by the UI driver, the
//! organization search controller and the result extractor.

use std::time::Duration;

use thiserror::Error;

use crate::driver::Control;

/// Errors raised by a UI driver implementation
#[derive(Error, Debug)]
pub enum DriverError {
    /// A bounded wait for a control was not satisfied
    #[error("Timed out after {waited:?} waiting for {control}")]
    Timeout { control: Control, waited: Duration },

    /// The browser session is gone (socket closed, invalid session id)
    #[error("Browser session lost: {0}")]
    SessionLost(String),

    /// The browser could not be started
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// The locator kind cannot be used for this lookup
    #[error("Unsupported locator for {control}: {reason}")]
    UnsupportedLocator { control: Control, reason: String },

    /// Any other command failure reported by the browser
    #[error("Driver command failed: {0}")]
    Command(String),
}

impl DriverError {
    /// Whether the underlying session has to be replaced before continuing
    #[must_use]
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Self::SessionLost(_))
    }

    /// Classify a raw driver message.
    ///
    /// WebDriver and CDP clients report dead sessions through free-form
    /// messages, so the classification has to look at the text.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_session_loss_message(&message) {
            Self::SessionLost(message)
        } else {
            Self::Command(message)
        }
    }
}

/// Returns `true` when a driver message describes a dead browser session
pub fn is_session_loss_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "invalid session id",
        "disconnected",
        "connection closed",
        "browser closed",
        "target closed",
        "session closed",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// Coarse classification of a [`SearchError`], used by the run coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchErrorKind {
    Timeout,
    SessionLost,
    Other,
}

/// Unrecoverable outcome of one organization search
#[derive(Error, Debug)]
pub enum SearchError {
    /// A required control did not become available in time
    #[error("Timed out waiting for {control}")]
    Timeout { control: Control },

    /// The browser session died; the driver must be restarted
    #[error("Browser session lost: {0}")]
    SessionLost(String),

    /// Any other driver failure
    #[error("Search failed: {0}")]
    Other(String),
}

impl SearchError {
    #[must_use]
    pub fn kind(&self) -> SearchErrorKind {
        match self {
            Self::Timeout { .. } => SearchErrorKind::Timeout,
            Self::SessionLost(_) => SearchErrorKind::SessionLost,
            Self::Other(_) => SearchErrorKind::Other,
        }
    }
}

impl From<DriverError> for SearchError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Timeout { control, .. } => Self::Timeout { control },
            DriverError::SessionLost(msg) => Self::SessionLost(msg),
            other => Self::Other(other.to_string()),
        }
    }
}

/// Failure to read a single result row; never escapes the extractor
#[derive(Error, Debug)]
pub enum RowExtractionError {
    /// The row has fewer cells than the fixed column layout needs
    #[error("Row has {found} cells, expected at least {expected}")]
    MissingCells { found: usize, expected: usize },

    /// A required cell could not be read
    #[error("Failed to read column {column}: {source}")]
    Cell {
        column: usize,
        #[source]
        source: DriverError,
    },

    /// The row element itself could not be inspected
    #[error("Failed to read row: {0}")]
    Row(#[source] DriverError),
}

impl RowExtractionError {
    /// Session loss must escape the extractor even though row errors do not
    pub fn into_session_loss(self) -> Result<Self, DriverError> {
        match self {
            Self::Cell { source, .. } | Self::Row(source) if source.is_session_lost() => {
                Err(source)
            }
            other => Ok(other),
        }
    }
}
