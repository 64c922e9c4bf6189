//! Results grid reader with pagination
//!
//! Cell layout of a result row (zero-based):
//!
//! | index | content                           |
//! |-------|-----------------------------------|
//! | 0     | pack image                        |
//! | 1     | certificate number                |
//! | 2     | laboratory                        |
//! | 3     | commercial name                   |
//! | 4     | pharmaceutical form               |
//! | 5     | presentation                      |
//! | 6     | GTIN (hidden column)              |
//! | 7     | generic name                      |
//! | 8     | detail link                       |
//! | 9     | availability icon                 |

use chrono::Utc;

use super::{pause, SearchSettings};
use crate::driver::{Control, UiDriver};
use crate::models::{Availability, Record};
use crate::utils::error::{DriverError, RowExtractionError, SearchError};

/// Rows with fewer cells are skipped
pub const MIN_ROW_CELLS: usize = 9;

const CERTIFICATE_CELL: usize = 1;
const LABORATORY_CELL: usize = 2;
const COMMERCIAL_NAME_CELL: usize = 3;
const FORM_CELL: usize = 4;
const PRESENTATION_CELL: usize = 5;
const GTIN_CELL: usize = 6;
const GENERIC_NAME_CELL: usize = 7;
const AVAILABILITY_CELL: usize = 9;

/// Reads every page of an already loaded results grid
pub struct ResultExtractor<'a, D: UiDriver> {
    driver: &'a D,
    settings: &'a SearchSettings,
}

impl<'a, D: UiDriver> ResultExtractor<'a, D> {
    pub fn new(driver: &'a D, settings: &'a SearchSettings) -> Self {
        Self { driver, settings }
    }

    /// Collect the records of every page, in row and page order.
    ///
    /// Unreadable rows are skipped; only session loss aborts the extraction.
    pub async fn extract_all(&self) -> Result<Vec<Record>, SearchError> {
        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            pause(self.settings.table_settle).await;

            let rows = match self.driver.find_all(Control::ResultRow).await {
                Ok(rows) => rows,
                Err(e) if e.is_session_lost() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(page, error = %e, "Failed to read result rows");
                    break;
                }
            };

            if rows.is_empty() {
                tracing::debug!(page, "No rows on page, stopping pagination");
                break;
            }

            let before = records.len();
            for (index, row) in rows.iter().enumerate() {
                match self.extract_row(row).await {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        let e = e.into_session_loss()?;
                        tracing::warn!(page, row = index, error = %e, "Skipping unreadable row");
                    }
                }
            }

            tracing::debug!(
                page,
                rows = rows.len(),
                extracted = records.len() - before,
                "Page extracted"
            );

            if page >= self.settings.max_pages {
                tracing::warn!(
                    page,
                    max_pages = self.settings.max_pages,
                    "Reached maximum pages limit"
                );
                break;
            }

            if !self.next_page().await? {
                break;
            }
            page += 1;
        }

        tracing::debug!(pages = page, records = records.len(), "Extraction finished");
        Ok(records)
    }

    /// Click "next page" when it is present and enabled.
    ///
    /// Returns `false` when there are no more pages.
    async fn next_page(&self) -> Result<bool, SearchError> {
        let next = match self.driver.find(Control::NextPage).await {
            Ok(Some(next)) => next,
            Ok(None) => {
                tracing::debug!("No next page control");
                return Ok(false);
            }
            Err(e) => return pagination_failure(e),
        };

        match self.is_disabled(&next).await {
            Ok(true) => {
                tracing::debug!("Next page control disabled");
                return Ok(false);
            }
            Ok(false) => {}
            Err(e) => return pagination_failure(e),
        }

        if let Err(e) = self.driver.click(&next).await {
            return pagination_failure(e);
        }
        pause(self.settings.inter_request_delay).await;

        Ok(true)
    }

    async fn is_disabled(&self, next: &D::Element) -> Result<bool, DriverError> {
        if let Some(value) = self.driver.attribute(next, "disabled").await? {
            let value = value.trim().to_lowercase();
            if value == "true" || value == "disabled" {
                return Ok(true);
            }
        }

        Ok(self
            .driver
            .attribute(next, "class")
            .await?
            .is_some_and(|class| class.to_lowercase().contains("disabled")))
    }

    async fn extract_row(&self, row: &D::Element) -> Result<Record, RowExtractionError> {
        let cells = self
            .driver
            .find_within(row, Control::RowCell)
            .await
            .map_err(RowExtractionError::Row)?;

        if cells.len() < MIN_ROW_CELLS {
            return Err(RowExtractionError::MissingCells {
                found: cells.len(),
                expected: MIN_ROW_CELLS,
            });
        }

        let certificate_number = self.cell_text(&cells, CERTIFICATE_CELL).await?;
        let laboratory = self.cell_text(&cells, LABORATORY_CELL).await?;
        let commercial_name = self.cell_text(&cells, COMMERCIAL_NAME_CELL).await?;
        let pharmaceutical_form = self.cell_text(&cells, FORM_CELL).await?;
        let presentation = self.cell_text(&cells, PRESENTATION_CELL).await?;
        let generic_name = self.cell_text(&cells, GENERIC_NAME_CELL).await?;

        let gtin = match self.cell_text(&cells, GTIN_CELL).await {
            Ok(gtin) => gtin,
            Err(e) => match e.into_session_loss() {
                Err(lost) => return Err(RowExtractionError::Row(lost)),
                Ok(_) => String::new(),
            },
        };

        let availability = self.availability(&cells).await?;

        Ok(Record {
            commercial_name_presentation: Record::join_name_presentation(
                &commercial_name,
                &presentation,
            ),
            generic_name,
            laboratory,
            pharmaceutical_form,
            certificate_number,
            gtin,
            availability,
            extracted_at: Utc::now(),
        })
    }

    async fn cell_text(
        &self,
        cells: &[D::Element],
        column: usize,
    ) -> Result<String, RowExtractionError> {
        let cell = cells.get(column).ok_or(RowExtractionError::MissingCells {
            found: cells.len(),
            expected: column + 1,
        })?;

        self.driver
            .read_text(cell)
            .await
            .map(|text| text.trim().to_string())
            .map_err(|source| RowExtractionError::Cell { column, source })
    }

    /// Icon present means available; a missing or unreadable cell is unknown
    async fn availability(&self, cells: &[D::Element]) -> Result<Availability, RowExtractionError> {
        let Some(cell) = cells.get(AVAILABILITY_CELL) else {
            return Ok(Availability::Unknown);
        };

        match self.driver.find_within(cell, Control::AvailabilityIcon).await {
            Ok(icons) => Ok(Availability::from_icon_present(!icons.is_empty())),
            Err(e) if e.is_session_lost() => Err(RowExtractionError::Cell {
                column: AVAILABILITY_CELL,
                source: e,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Availability cell unreadable");
                Ok(Availability::Unknown)
            }
        }
    }
}

/// Pagination errors end the walk unless the session itself is gone
fn pagination_failure(err: DriverError) -> Result<bool, SearchError> {
    if err.is_session_lost() {
        return Err(err.into());
    }
    tracing::warn!(error = %err, "Pagination failed, keeping rows collected so far");
    Ok(false)
}
