// Core data structures for the vademecum scraper

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters of an organization name sent to the remote picker.
///
/// The picker filter mismatches longer inputs.
pub const ORGANIZATION_QUERY_CHARS: usize = 30;

/// Separator between commercial name and presentation
pub const NAME_PRESENTATION_SEPARATOR: &str = " - ";

/// Output header, in column order
pub const RECORD_HEADER: [&str; 8] = [
    "Nombre_Comercial_Presentacion",
    "Monodroga_Generico",
    "Laboratorio",
    "Forma_Farmaceutica",
    "Numero_Certificado",
    "GTIN",
    "Disponibilidad",
    "Timestamp_Extraccion",
];

/// Availability flag of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Unavailable,
    Unknown,
}

impl Availability {
    /// Value written to the output file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Disponible",
            Self::Unavailable => "No disponible",
            Self::Unknown => "Desconocido",
        }
    }

    /// Availability is shown as an icon; no icon means unavailable
    pub fn from_icon_present(present: bool) -> Self {
        if present {
            Self::Available
        } else {
            Self::Unavailable
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One drug listing read from the results grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub commercial_name_presentation: String,
    pub generic_name: String,
    pub laboratory: String,
    pub pharmaceutical_form: String,
    pub certificate_number: String,
    pub gtin: String,
    pub availability: Availability,
    pub extracted_at: DateTime<Utc>,
}

impl Record {
    /// Join the commercial name and the presentation into the output column
    pub fn join_name_presentation(commercial_name: &str, presentation: &str) -> String {
        format!("{commercial_name}{NAME_PRESENTATION_SEPARATOR}{presentation}")
    }

    /// Fields in [`RECORD_HEADER`] order
    pub fn to_row(&self) -> [String; 8] {
        [
            self.commercial_name_presentation.clone(),
            self.generic_name.clone(),
            self.laboratory.clone(),
            self.pharmaceutical_form.clone(),
            self.certificate_number.clone(),
            self.gtin.clone(),
            self.availability.to_string(),
            self.extracted_at
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        ]
    }
}

/// Laboratory name as listed in the input file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Organization {
    name: String,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text typed into the remote picker filter
    pub fn query(&self) -> &str {
        match self.name.char_indices().nth(ORGANIZATION_QUERY_CHARS) {
            Some((idx, _)) => &self.name[..idx],
            None => &self.name,
        }
    }

    /// Exact resume-key comparison; surrounding whitespace of `name` is ignored
    pub fn matches(&self, name: &str) -> bool {
        self.name == name.trim()
    }
}

impl fmt::Display for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Progress of one run over the organization list
#[derive(Debug, Clone)]
pub struct RunState {
    organizations: Vec<Organization>,
    cursor: usize,
    total_records: u64,
    organizations_processed: usize,
    organizations_with_results: usize,
    organizations_failed: usize,
    session_restarts: usize,
    last_reached: Option<usize>,
    interrupted: bool,
    started_at: DateTime<Utc>,
}

impl RunState {
    /// Create run state over a loaded organization list
    pub fn new(organizations: Vec<Organization>) -> Self {
        Self {
            organizations,
            cursor: 0,
            total_records: 0,
            organizations_processed: 0,
            organizations_with_results: 0,
            organizations_failed: 0,
            session_restarts: 0,
            last_reached: None,
            interrupted: false,
            started_at: Utc::now(),
        }
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Organization under the cursor, `None` once the list is exhausted
    pub fn current(&self) -> Option<&Organization> {
        self.organizations.get(self.cursor)
    }

    /// Index of the first organization exactly matching `name`
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.organizations.iter().position(|org| org.matches(name))
    }

    /// Move the cursor forward to `index`; the cursor never moves back
    pub fn skip_to(&mut self, index: usize) {
        self.cursor = self.cursor.max(index.min(self.organizations.len()));
    }

    /// An organization under the cursor is about to be searched
    pub fn begin_organization(&mut self) {
        self.organizations_processed += 1;
        self.last_reached = Some(self.cursor);
    }

    /// Records of the current organization were persisted
    pub fn record_results(&mut self, count: usize) {
        if count > 0 {
            self.total_records += count as u64;
            self.organizations_with_results += 1;
        }
    }

    /// The current organization was abandoned
    pub fn record_failure(&mut self) {
        self.organizations_failed += 1;
    }

    pub fn record_restart(&mut self) {
        self.session_restarts += 1;
    }

    pub fn mark_interrupted(&mut self) {
        self.interrupted = true;
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Move past the current organization
    pub fn advance(&mut self) {
        if self.cursor < self.organizations.len() {
            self.cursor += 1;
        }
    }

    pub fn organizations_processed(&self) -> usize {
        self.organizations_processed
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Snapshot for reporting and checkpoints
    pub fn summary(&self) -> RunSummary {
        let last = self
            .last_reached
            .and_then(|idx| self.organizations.get(idx).map(|org| (idx, org)));

        RunSummary {
            organizations_total: self.organizations.len(),
            organizations_processed: self.organizations_processed,
            organizations_with_results: self.organizations_with_results,
            organizations_failed: self.organizations_failed,
            total_records: self.total_records,
            session_restarts: self.session_restarts,
            last_reached_index: last.map(|(idx, _)| idx),
            last_reached: last.map(|(_, org)| org.name().to_string()),
            next_index: self.current().map(|_| self.cursor),
            next_organization: self.current().map(|org| org.name().to_string()),
            interrupted: self.interrupted,
            duration_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }
}

/// Final counters of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub organizations_total: usize,
    pub organizations_processed: usize,
    pub organizations_with_results: usize,
    pub organizations_failed: usize,
    pub total_records: u64,
    pub session_restarts: usize,
    /// Index of the last organization whose search was started
    pub last_reached_index: Option<usize>,
    pub last_reached: Option<String>,
    /// First organization not yet completed; `None` when the list is done
    pub next_index: Option<usize>,
    pub next_organization: Option<String>,
    pub interrupted: bool,
    pub duration_secs: u64,
}

impl RunSummary {
    /// Whether every organization of the list has been handled
    pub fn is_complete(&self) -> bool {
        self.next_index.is_none()
    }
}
