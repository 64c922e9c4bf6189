//! Laboratory list loader
//!
//! The list is the ANMAT laboratory registry export: a comma separated file
//! with a header line, where the third column holds the company name
//! ("Razón Social").

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::Organization;

/// Zero-based column holding the organization name
pub const NAME_COLUMN: usize = 2;

/// Load the organization list from `path`, preserving file order
pub fn load_organizations(path: &Path) -> Result<Vec<Organization>> {
    let file = File::open(path).map_err(|e| {
        Error::with_source(
            format!("Failed to open organization list: {}", path.display()),
            e,
        )
    })?;

    let organizations = parse_organizations(file)?;

    tracing::info!(
        path = %path.display(),
        organizations = organizations.len(),
        "Loaded organization list"
    );

    Ok(organizations)
}

/// Parse an organization list from any reader.
///
/// The first line is a header. Lines with fewer than three fields, or whose
/// name is blank once quotes and whitespace are removed, are skipped.
pub fn parse_organizations<R: Read>(reader: R) -> Result<Vec<Organization>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut organizations = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;

        let Some(raw) = record.get(NAME_COLUMN) else {
            tracing::debug!(line = line + 2, fields = record.len(), "Skipping short line");
            continue;
        };

        let name = raw.replace('"', "");
        let name = name.trim();
        if name.is_empty() {
            tracing::debug!(line = line + 2, "Skipping line with blank name");
            continue;
        }

        organizations.push(Organization::new(name));
    }

    Ok(organizations)
}
