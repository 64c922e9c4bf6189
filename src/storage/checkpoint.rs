//! Checkpoint of a run for resuming later
//!
//! At the end of every run (completed, interrupted or failed) the coordinator
//! records which organization should be processed next. `vademecum resume`
//! reads it back and restarts from that organization.
//!
//! # Example
//!
//! ```no_run
//! use vademecum::storage::RunCheckpoint;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! if let Some(checkpoint) = RunCheckpoint::load(Path::new("vademecum.checkpoint.json"))? {
//!     println!("Next organization: {:?}", checkpoint.summary.next_organization);
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::models::RunSummary;

/// Persisted resume point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// Organization list the indices refer to
    pub input_path: PathBuf,

    /// Counters and position at the end of the run
    pub summary: RunSummary,

    /// Checkpoint creation time
    pub saved_at: DateTime<Utc>,
}

impl RunCheckpoint {
    pub fn new(input_path: &Path, summary: RunSummary) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            summary,
            saved_at: Utc::now(),
        }
    }

    /// Name of the organization a resumed run should start from
    pub fn resume_from(&self) -> Option<&str> {
        self.summary.next_organization.as_deref()
    }

    /// Write the checkpoint atomically (temp file, then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create checkpoint directory: {}", parent.display())
            })?;
        }

        let temp_path = path.with_extension("tmp");

        let file = File::create(&temp_path).with_context(|| {
            format!("Failed to create checkpoint file: {}", temp_path.display())
        })?;

        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).context("Failed to serialize checkpoint")?;

        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename checkpoint file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Checkpoint saved");
        Ok(())
    }

    /// Read a checkpoint; `Ok(None)` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)
            .with_context(|| format!("Failed to open checkpoint file: {}", path.display()))?;

        let checkpoint = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse checkpoint file: {}", path.display()))?;

        Ok(Some(checkpoint))
    }
}
