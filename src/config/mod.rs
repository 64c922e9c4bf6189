//! Configuration management for the vademecum scraper
//!
//! This module handles loading and validating configuration from environment
//! variables, TOML files, and command-line overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::driver::Selectors;

/// Public lookup form of the PAMI/ANMAT vademecum
pub const DEFAULT_SEARCH_URL: &str =
    "https://servicios.pami.org.ar/vademecum/views/consultaPublica/listado.zul";

/// Default laboratory list
pub const DEFAULT_INPUT_PATH: &str = "LaboratoriosANMAT.txt";

/// Default output file
pub const DEFAULT_OUTPUT_PATH: &str = "medicamentos_anmat_completo.csv";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run configuration
    pub scraper: ScraperConfig,

    /// Browser configuration
    pub browser: BrowserSettings,

    /// Fixed pauses of the search protocol
    pub timing: TimingConfig,

    /// Locators of the lookup form
    pub selectors: Selectors,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Run-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// URL of the lookup form
    pub search_url: String,

    /// Laboratory list (CSV, name in the third column)
    pub input_path: PathBuf,

    /// Output CSV, appended to
    pub output_path: PathBuf,

    /// Pause after submitting a search or turning a page, in seconds
    pub inter_request_delay_secs: f64,

    /// Skip every organization before the first exact match
    pub resume_from: Option<String>,

    /// Stop after this many organizations
    pub max_organizations: Option<usize>,

    /// Attempts per organization when the browser session is lost
    pub max_attempts: u32,

    /// Safety ceiling on result pages per organization
    pub max_pages: u32,

    /// Where to record the resume point at the end of a run
    pub checkpoint_path: Option<PathBuf>,
}

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run Chrome without a window
    pub headless: bool,

    /// Chrome/Chromium executable; detected when unset
    pub executable: Option<PathBuf>,

    pub window_width: u32,

    pub window_height: u32,

    /// Bound for every wait on a form control, in seconds
    pub wait_timeout_secs: u64,

    /// Timeout of a single DevTools command, in seconds
    pub request_timeout_secs: u64,

    /// Additional launch attempts when Chrome fails to start
    pub launch_retries: u32,
}

/// Fixed pauses of the search protocol, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// After navigating to the form
    pub page_settle_ms: u64,

    /// After opening the picker
    pub picker_open_ms: u64,

    /// After typing the filter
    pub filter_typed_ms: u64,

    /// After submitting the picker filter
    pub candidates_settle_ms: u64,

    /// After selecting a candidate
    pub picker_close_ms: u64,

    /// Before reading each results page
    pub table_settle_ms: u64,

    /// Between organizations
    pub between_organizations_ms: u64,

    /// After restarting a lost browser session
    pub session_restart_pause_ms: u64,

    /// Poll interval of bounded waits
    pub poll_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            search_url: String::from(DEFAULT_SEARCH_URL),
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            inter_request_delay_secs: 2.0,
            resume_from: None,
            max_organizations: None,
            max_attempts: 3,
            max_pages: 1000,
            checkpoint_path: None,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window_width: 1920,
            window_height: 1080,
            wait_timeout_secs: 20,
            request_timeout_secs: 30,
            launch_retries: 2,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_settle_ms: 3000,
            picker_open_ms: 1000,
            filter_typed_ms: 500,
            candidates_settle_ms: 2000,
            picker_close_ms: 1000,
            table_settle_ms: 1000,
            between_organizations_ms: 500,
            session_restart_pause_ms: 2000,
            poll_interval_ms: 250,
        }
    }
}

impl TimingConfig {
    /// All pauses set to zero; used by tests and dry runs against fakes
    pub fn immediate() -> Self {
        Self {
            page_settle_ms: 0,
            picker_open_ms: 0,
            filter_typed_ms: 0,
            candidates_settle_ms: 0,
            picker_close_ms: 0,
            table_settle_ms: 0,
            between_organizations_ms: 0,
            session_restart_pause_ms: 0,
            poll_interval_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override values with `VADEMECUM_*` environment variables when set
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("VADEMECUM_SEARCH_URL") {
            self.scraper.search_url = url;
        }

        if let Ok(path) = std::env::var("VADEMECUM_INPUT") {
            self.scraper.input_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("VADEMECUM_OUTPUT") {
            self.scraper.output_path = PathBuf::from(path);
        }

        if let Ok(delay) = std::env::var("VADEMECUM_DELAY") {
            self.scraper.inter_request_delay_secs = delay
                .parse::<f64>()
                .with_context(|| format!("VADEMECUM_DELAY is not a number: {delay}"))?;
        }

        if let Ok(name) = std::env::var("VADEMECUM_RESUME_FROM") {
            self.scraper.resume_from = Some(name);
        }

        if let Ok(max) = std::env::var("VADEMECUM_MAX_ORGANIZATIONS") {
            self.scraper.max_organizations = Some(max.parse::<usize>().with_context(|| {
                format!("VADEMECUM_MAX_ORGANIZATIONS is not a count: {max}")
            })?);
        }

        if let Ok(path) = std::env::var("VADEMECUM_CHECKPOINT") {
            self.scraper.checkpoint_path = Some(PathBuf::from(path));
        }

        if let Ok(headless) = std::env::var("VADEMECUM_HEADLESS") {
            self.browser.headless = parse_bool(&headless)
                .with_context(|| format!("VADEMECUM_HEADLESS is not a boolean: {headless}"))?;
        }

        if let Ok(path) = std::env::var("VADEMECUM_CHROME") {
            self.browser.executable = Some(PathBuf::from(path));
        }

        if let Some(secs) = std::env::var("VADEMECUM_WAIT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.browser.wait_timeout_secs = secs;
        }

        if let Ok(level) = std::env::var("VADEMECUM_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("VADEMECUM_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.scraper.search_url)
            .with_context(|| format!("search_url is not a valid URL: {}", self.scraper.search_url))?;

        let delay = self.scraper.inter_request_delay_secs;
        if !delay.is_finite() || delay < 0.0 {
            anyhow::bail!("inter_request_delay_secs must be a non-negative number");
        }

        if self.scraper.max_attempts == 0 {
            anyhow::bail!("max_attempts must be greater than 0");
        }

        if self.scraper.max_pages == 0 {
            anyhow::bail!("max_pages must be greater than 0");
        }

        if self.scraper.max_organizations == Some(0) {
            anyhow::bail!("max_organizations must be greater than 0 when set");
        }

        if self
            .scraper
            .resume_from
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            anyhow::bail!("resume_from must not be blank");
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            anyhow::bail!("window size must be positive");
        }

        self.selectors
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid selectors: {e}"))?;

        Ok(())
    }

    /// Pause after submitting a search or turning a page
    #[must_use]
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.scraper.inter_request_delay_secs.max(0.0))
    }

    /// Bound for every wait on a form control
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.wait_timeout_secs)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognized boolean: {other}"),
    }
}
