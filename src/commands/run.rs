use anyhow::{Context, Result};
use std::path::Path;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vademecum::config::Config;
use vademecum::coordinator::{ResumePoint, RunCoordinator};
use vademecum::driver::ChromiumDriver;
use vademecum::input::load_organizations;
use vademecum::models::RunSummary;
use vademecum::storage::{CsvSink, RunCheckpoint};
use vademecum::error::{Error, ScrapeErrorTrait};

pub async fn run(config: Config) -> Result<RunSummary> {
    let start = config.scraper.resume_from.clone().map(ResumePoint::Name);
    execute(config, start).await
}

async fn execute(config: Config, start: Option<ResumePoint>) -> Result<RunSummary> {
    config
        .validate()
        .map_err(|e| Error::config(format!("{e:#}")))?;

    println!("Starting vademecum run");
    println!("======================");
    println!("Input: {}", config.scraper.input_path.display());
    println!("Output: {}", config.scraper.output_path.display());
    if let Some(start) = &start {
        println!("Resuming from: {start}");
    }

    let organizations = load_organizations(&config.scraper.input_path)?;
    if organizations.is_empty() {
        tracing::warn!(
            path = %config.scraper.input_path.display(),
            "Organization list is empty"
        );
    }

    let sink = CsvSink::open(&config.scraper.output_path)?;

    let driver = ChromiumDriver::launch(config.browser.clone(), config.selectors.clone())
        .await
        .map_err(Error::Driver)?;

    let mut coordinator = RunCoordinator::from_config(driver, sink, organizations, &config);

    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone());

    let result = coordinator
        .run_from(start, config.scraper.max_organizations, cancel)
        .await;
    watcher.abort();

    match result {
        Ok(summary) => {
            print_summary(&summary, &config);
            Ok(summary)
        }
        Err(e) => {
            tracing::error!(
                category = e.category().as_str(),
                recoverable = e.is_recoverable(),
                error = %e,
                "Run failed"
            );
            if !matches!(e, Error::Config(_)) {
                print_summary(&coordinator.summary(), &config);
            }
            Err(e.into())
        }
    }
}

/// Continue the run recorded in `checkpoint`.
///
/// Returns `None` when the recorded run already covered the whole list.
pub async fn resume(
    mut config: Config,
    checkpoint: &Path,
    max_organizations: Option<usize>,
) -> Result<Option<RunSummary>> {
    println!("Resuming run from checkpoint: {}", checkpoint.display());

    let saved = RunCheckpoint::load(checkpoint)?
        .with_context(|| format!("Checkpoint not found: {}", checkpoint.display()))?;

    println!("\nCheckpoint Stats");
    println!("----------------");
    println!("Saved at: {}", saved.saved_at.to_rfc3339());
    println!("Processed: {}", saved.summary.organizations_processed);
    println!("Records: {}", saved.summary.total_records);
    if let Some(last) = &saved.summary.last_reached {
        println!("Last organization: {last}");
    }

    let Some(next) = saved.resume_from() else {
        println!("\nThe recorded run completed the whole list, nothing to resume");
        return Ok(None);
    };
    let start = match saved.summary.next_index {
        Some(index) => ResumePoint::Index {
            index,
            name: next.to_string(),
        },
        None => ResumePoint::Name(next.to_string()),
    };

    config.scraper.input_path = saved.input_path.clone();
    config.scraper.resume_from = None;
    if max_organizations.is_some() {
        config.scraper.max_organizations = max_organizations;
    }
    if config.scraper.checkpoint_path.is_none() {
        config.scraper.checkpoint_path = Some(checkpoint.to_path_buf());
    }

    println!("\nContinuing from: {start}");
    execute(config, Some(start)).await.map(Some)
}

fn spawn_interrupt_watcher(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current organization");
            cancel.cancel();
        }
    })
}

fn print_summary(summary: &RunSummary, config: &Config) {
    println!("\nRun Summary");
    println!("===========");
    println!(
        "Organizations processed: {}/{}",
        summary.organizations_processed, summary.organizations_total
    );
    println!("With results: {}", summary.organizations_with_results);
    println!("Failed: {}", summary.organizations_failed);
    println!("Total records: {}", summary.total_records);
    println!("Session restarts: {}", summary.session_restarts);
    if let (Some(index), Some(name)) = (summary.last_reached_index, &summary.last_reached) {
        println!("Last organization reached: [{index}] {name}");
    }
    println!("Duration: {}s", summary.duration_secs);
    println!("Output: {}", config.scraper.output_path.display());

    if summary.interrupted {
        println!("\nRun interrupted");
    }

    if let Some(next) = &summary.next_organization {
        println!("\nTo resume: vademecum run --resume-from '{next}'");
        if let Some(path) = &config.scraper.checkpoint_path {
            println!("       or: vademecum resume --checkpoint {}", path.display());
        }
    }
}
