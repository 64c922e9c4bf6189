//! UI driver capability interface
//!
//! The search state machine talks to the remote form only through
//! [`UiDriver`]. Controls are addressed by role ([`Control`]); the concrete
//! locator for each role lives in [`Selectors`] and is owned by the driver
//! implementation, so a change in the remote markup is a configuration change
//! rather than a change to the state machine.

pub mod chromium;
pub mod selectors;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::utils::error::DriverError;

pub use chromium::ChromiumDriver;
pub use selectors::{Locator, Selectors};

/// Result alias for driver operations
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Role of a control on the registry lookup form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Field that opens the laboratory picker popup
    OrganizationPicker,
    /// Text filter inside the picker popup
    PickerFilter,
    /// Magnifier icon that submits the picker filter
    PickerSearchIcon,
    /// Candidate rows listed by the picker after filtering
    PickerCandidate,
    /// Primary "Buscar" button of the form
    SearchButton,
    /// "No results" marker of the results grid
    EmptyResultsMarker,
    /// Data rows of the results grid
    ResultRow,
    /// Cells of a result row (relative to the row)
    RowCell,
    /// Icon inside the availability cell (relative to the cell)
    AvailabilityIcon,
    /// "Next page" control of the results paginator
    NextPage,
    /// Document body, target for keyboard shortcuts such as Escape
    PageBody,
}

impl Control {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrganizationPicker => "organization picker",
            Self::PickerFilter => "picker filter",
            Self::PickerSearchIcon => "picker search icon",
            Self::PickerCandidate => "picker candidate",
            Self::SearchButton => "search button",
            Self::EmptyResultsMarker => "empty results marker",
            Self::ResultRow => "result row",
            Self::RowCell => "row cell",
            Self::AvailabilityIcon => "availability icon",
            Self::NextPage => "next page control",
            Self::PageBody => "page body",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys the state machine needs to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
}

impl Key {
    /// Key name as understood by the DevTools input domain
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Escape => "Escape",
        }
    }
}

/// Capability set consumed by the organization search controller and the
/// result extractor.
///
/// Every method is bounded by the implementation's own command timeout; only
/// [`UiDriver::wait_for`] polls, and it is bounded by its `timeout` argument.
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Opaque handle to a located element
    type Element: Clone + Send + Sync;

    /// Load `url` in the current tab, discarding prior page state
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    /// All elements currently matching `control`, in document order
    async fn find_all(&self, control: Control) -> DriverResult<Vec<Self::Element>>;

    /// All descendants of `parent` matching `control`, in document order
    async fn find_within(
        &self,
        parent: &Self::Element,
        control: Control,
    ) -> DriverResult<Vec<Self::Element>>;

    async fn click(&self, element: &Self::Element) -> DriverResult<()>;

    /// Empty an input element
    async fn clear(&self, element: &Self::Element) -> DriverResult<()>;

    async fn type_text(&self, element: &Self::Element, text: &str) -> DriverResult<()>;

    async fn press_key(&self, element: &Self::Element, key: Key) -> DriverResult<()>;

    /// Rendered text of the element, untrimmed
    async fn read_text(&self, element: &Self::Element) -> DriverResult<String>;

    async fn attribute(&self, element: &Self::Element, name: &str)
        -> DriverResult<Option<String>>;

    async fn is_displayed(&self, element: &Self::Element) -> DriverResult<bool>;

    /// Discard the current browser session and start a fresh one
    async fn restart(&mut self) -> DriverResult<()>;

    /// Release the browser session
    async fn quit(&mut self) -> DriverResult<()>;

    /// First element matching `control`, if any
    async fn find(&self, control: Control) -> DriverResult<Option<Self::Element>> {
        Ok(self.find_all(control).await?.into_iter().next())
    }

    /// Poll for `control` until it appears or `timeout` elapses.
    ///
    /// The lookup is attempted at least once, so a zero timeout is a single
    /// probe.
    async fn wait_for(
        &self,
        control: Control,
        timeout: Duration,
        poll_interval: Duration,
    ) -> DriverResult<Self::Element> {
        let started = tokio::time::Instant::now();
        loop {
            if let Some(element) = self.find(control).await? {
                return Ok(element);
            }
            if started.elapsed() >= timeout {
                return Err(DriverError::Timeout {
                    control,
                    waited: timeout,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
