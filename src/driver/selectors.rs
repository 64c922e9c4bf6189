//! Locators for the vademecum lookup form
//!
//! The public lookup page is a ZK application whose component ids are
//! generated in page order. They are stable for a given deployment but change
//! whenever the form layout changes, so every locator can be overridden from
//! the `[selectors]` table of the configuration file:
//!
//! ```toml
//! [selectors]
//! search_button = { css = "#zk_comp_81" }
//! next_page = { xpath = "//a[@name='zk_comp_99-next']" }
//! ```

use serde::{Deserialize, Serialize};

use super::Control;

/// A concrete way of finding an element in the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    /// CSS selector
    Css(String),
    /// XPath expression (document-level lookups only)
    Xpath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::Xpath(expression.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Css(s) | Self::Xpath(s) => s.trim().is_empty(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css:{s}"),
            Self::Xpath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Role to locator map for every [`Control`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub organization_picker: Locator,
    pub picker_filter: Locator,
    pub picker_search_icon: Locator,
    pub picker_candidate: Locator,
    pub search_button: Locator,
    pub empty_results_marker: Locator,
    pub result_row: Locator,
    /// Relative to a result row
    pub row_cell: Locator,
    /// Relative to the availability cell
    pub availability_icon: Locator,
    pub next_page: Locator,
    pub page_body: Locator,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            organization_picker: Locator::css("#zk_comp_40-real"),
            picker_filter: Locator::css("#zk_comp_53"),
            picker_search_icon: Locator::css("#zk_comp_54"),
            picker_candidate: Locator::xpath(
                "//div[@id='zk_comp_56']//tr[contains(@class, 'z-listitem')]",
            ),
            search_button: Locator::css("#zk_comp_80"),
            empty_results_marker: Locator::xpath(
                "//td[@id='zk_comp_86-empty' and contains(text(), 'No se han encontrado resultados')]",
            ),
            result_row: Locator::xpath(
                "//div[@id='zk_comp_86-body']//tbody[@id='zk_comp_109']/tr[contains(@class, 'z-row')]",
            ),
            row_cell: Locator::css("td"),
            availability_icon: Locator::css("img"),
            next_page: Locator::xpath("//div[@id='zk_comp_98']//a[@name='zk_comp_98-next']"),
            page_body: Locator::css("body"),
        }
    }
}

impl Selectors {
    /// Locator configured for `control`
    pub fn locator(&self, control: Control) -> &Locator {
        match control {
            Control::OrganizationPicker => &self.organization_picker,
            Control::PickerFilter => &self.picker_filter,
            Control::PickerSearchIcon => &self.picker_search_icon,
            Control::PickerCandidate => &self.picker_candidate,
            Control::SearchButton => &self.search_button,
            Control::EmptyResultsMarker => &self.empty_results_marker,
            Control::ResultRow => &self.result_row,
            Control::RowCell => &self.row_cell,
            Control::AvailabilityIcon => &self.availability_icon,
            Control::NextPage => &self.next_page,
            Control::PageBody => &self.page_body,
        }
    }

    /// Controls that are looked up relative to another element.
    ///
    /// Element-relative lookups only support CSS.
    pub fn relative_controls() -> [Control; 2] {
        [Control::RowCell, Control::AvailabilityIcon]
    }

    /// Check that no locator is blank and relative locators are CSS
    pub fn validate(&self) -> Result<(), String> {
        let all = [
            Control::OrganizationPicker,
            Control::PickerFilter,
            Control::PickerSearchIcon,
            Control::PickerCandidate,
            Control::SearchButton,
            Control::EmptyResultsMarker,
            Control::ResultRow,
            Control::RowCell,
            Control::AvailabilityIcon,
            Control::NextPage,
            Control::PageBody,
        ];

        for control in all {
            if self.locator(control).is_empty() {
                return Err(format!("locator for {control} is empty"));
            }
        }

        for control in Self::relative_controls() {
            if let Locator::Xpath(_) = self.locator(control) {
                return Err(format!("locator for {control} must be a CSS selector"));
            }
        }

        Ok(())
    }
}
