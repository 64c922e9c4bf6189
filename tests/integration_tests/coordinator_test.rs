//! Run coordinator scenarios
//!
//! Whole runs against the fake lookup form:
//! 1. Output and counters of a normal run
//! 2. Organization limit
//! 3. Session loss recovery and its retry bound
//! 4. Timeouts and not-found organizations
//! 5. Resume, interruption and checkpoints
//! 6. Output failures

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vademecum::coordinator::{CoordinatorSettings, ResumePoint, RunCoordinator};
use vademecum::crawler::{OrganizationSearch, SearchController};
use vademecum::error::{Error, SearchError};
use vademecum::models::{Organization, Record};
use vademecum::storage::{CsvSink, RunCheckpoint};

use crate::common::{
    fast_config, fast_coordinator_settings, fast_search_settings, organizations, FailingSink,
    FakeOrganization, FakeRow, FakeSite, MemorySink,
};

fn coordinator(
    site: &FakeSite,
    sink: &MemorySink,
    names: &[&str],
    settings: CoordinatorSettings,
) -> RunCoordinator<FakeSite, MemorySink> {
    RunCoordinator::new(
        site.clone(),
        sink.clone(),
        SearchController::new(fast_search_settings()),
        organizations(names),
        settings,
    )
}

/// Searcher that cancels the run while `trigger` is being searched
struct CancelDuring {
    inner: SearchController,
    trigger: &'static str,
    cancel: CancellationToken,
}

impl CancelDuring {
    fn new(trigger: &'static str, cancel: &CancellationToken) -> Self {
        Self {
            inner: SearchController::new(fast_search_settings()),
            trigger,
            cancel: cancel.clone(),
        }
    }
}

#[async_trait]
impl OrganizationSearch<FakeSite> for CancelDuring {
    async fn search(
        &self,
        driver: &FakeSite,
        organization: &Organization,
    ) -> Result<Vec<Record>, SearchError> {
        if organization.name() == self.trigger {
            self.cancel.cancel();
        }
        self.inner.search(driver, organization).await
    }
}

fn single_row_site(names: &[&str]) -> FakeSite {
    let mut catalog: Vec<FakeOrganization> = Vec::new();
    for name in names {
        if !catalog.iter().any(|org| org.name == *name) {
            catalog.push(FakeOrganization::new(name).with_rows(&["1"]));
        }
    }
    FakeSite::new(catalog)
}

// ============================================================================
// Normal runs
// ============================================================================

#[tokio::test]
async fn test_two_organizations_to_csv() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("medicamentos.csv");

    let site = FakeSite::new(vec![
        FakeOrganization::new("Lab A")
            .with_pages(vec![vec![FakeRow::listing("1"), FakeRow::listing("2")], Vec::new()]),
        FakeOrganization::new("Lab B"),
    ]);

    let mut config = fast_config();
    config.scraper.output_path = output.clone();

    let sink = CsvSink::open(&output).unwrap();
    let mut coordinator =
        RunCoordinator::from_config(site.clone(), sink, organizations(&["Lab A", "Lab B"]), &config);

    let summary = coordinator
        .run(None, None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.organizations_processed, 2);
    assert_eq!(summary.organizations_with_results, 1);
    assert_eq!(summary.total_records, 2);
    assert_eq!(summary.organizations_failed, 0);
    assert!(summary.is_complete());
    assert!(!summary.interrupted);

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3, "header plus two data rows");
    assert!(lines[0].starts_with("\u{FEFF}Nombre_Comercial_Presentacion"));
    assert!(lines[1].starts_with("PRODUCTO 1 - 500 mg x 16,paracetamol,Lab A,comprimido,1,"));

    assert_eq!(site.quits(), 1, "browser released at the end");
}

#[tokio::test]
async fn test_not_found_organization_advanced_once() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A").with_rows(&["1"])]);
    let sink = MemorySink::default();
    let mut coordinator =
        coordinator(&site, &sink, &["Lab X", "Lab A"], fast_coordinator_settings());

    let summary = coordinator
        .run(None, None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.organizations_processed, 2);
    assert_eq!(summary.organizations_with_results, 1);
    assert_eq!(summary.organizations_failed, 0);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(site.navigations(), 2);
    assert_eq!(sink.flushes(), 1);
}

#[tokio::test]
async fn test_organization_limit() {
    let catalog = (1..=5)
        .map(|i| FakeOrganization::new(&format!("Lab {i}")).with_rows(&["1"]))
        .collect();
    let site = FakeSite::new(catalog);
    let sink = MemorySink::default();
    let mut coordinator = coordinator(
        &site,
        &sink,
        &["Lab 1", "Lab 2", "Lab 3", "Lab 4", "Lab 5"],
        fast_coordinator_settings(),
    );

    let summary = coordinator
        .run(None, Some(1), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(site.queries(), vec!["Lab 1".to_string()]);
    assert_eq!(summary.organizations_processed, 1);
    assert_eq!(summary.next_organization.as_deref(), Some("Lab 2"));
    assert_eq!(sink.records().len(), 1);
}

// ============================================================================
// Session loss
// ============================================================================

#[tokio::test]
async fn test_session_loss_then_success() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A")
        .with_rows(&["1"])
        .with_session_failures(1)]);
    let sink = MemorySink::default();
    let mut coordinator = coordinator(&site, &sink, &["Lab A"], fast_coordinator_settings());

    let summary = coordinator
        .run(None, None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(sink.records().len(), 1, "exactly one record persisted");
    assert_eq!(summary.total_records, 1);
    assert_eq!(summary.session_restarts, 1);
    assert_eq!(site.restarts(), 1);
    assert_eq!(site.search_clicks(), 2);
}

#[tokio::test]
async fn test_session_loss_retry_bound() {
    let site = FakeSite::new(vec![
        FakeOrganization::new("Lab A")
            .with_rows(&["1"])
            .with_session_failures(u32::MAX),
        FakeOrganization::new("Lab B").with_rows(&["2"]),
    ]);
    let sink = MemorySink::default();
    let mut coordinator =
        coordinator(&site, &sink, &["Lab A", "Lab B"], fast_coordinator_settings());

    let summary = coordinator
        .run(None, None, CancellationToken::new())
        .await
        .unwrap();

    // Lab A: three searches and two restarts, then abandoned. Lab B starts
    // on the dead session, needs one more restart and succeeds.
    assert_eq!(summary.organizations_failed, 1);
    assert_eq!(summary.organizations_processed, 2);
    assert_eq!(summary.session_restarts, 3);
    assert_eq!(site.search_clicks(), 4);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].certificate_number, "2");
}

#[tokio::test]
async fn test_failed_restart_consumes_attempt() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A")
        .with_rows(&["1"])
        .with_session_failures(1)])
    .with_restart_failures(1);
    let sink = MemorySink::default();
    let mut coordinator = coordinator(&site, &sink, &["Lab A"], fast_coordinator_settings());

    let summary = coordinator
        .run(None, None, CancellationToken::new())
        .await
        .unwrap();

    // attempt 1 loses the session, the restart fails, attempt 2 hits the dead
    // session, the second restart works and attempt 3 succeeds
    assert_eq!(summary.session_restarts, 1);
    assert_eq!(site.search_clicks(), 2);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(summary.organizations_failed, 0);
}

// ============================================================================
// Non-retryable failures
// ============================================================================

#[tokio::test]
async fn test_timeout_is_not_retried() {
    let site = FakeSite::new(vec![
        FakeOrganization::new("Lab A")
            .with_rows(&["1"])
            .without_search_button(),
        FakeOrganization::new("Lab B").with_rows(&["2"]),
    ]);
    let sink = MemorySink::default();
    let mut coordinator =
        coordinator(&site, &sink, &["Lab A", "Lab B"], fast_coordinator_settings());

    let summary = coordinator
        .run(None, None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.organizations_failed, 1);
    assert_eq!(summary.organizations_processed, 2);
    assert_eq!(site.restarts(), 0);
    assert_eq!(site.navigations(), 2, "one navigation per organization");
    assert_eq!(sink.records()[0].certificate_number, "2");
}

#[tokio::test]
async fn test_command_failure_is_not_retried() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A")
        .with_rows(&["1"])
        .with_search_command_error()]);
    let sink = MemorySink::default();
    let mut coordinator = coordinator(&site, &sink, &["Lab A"], fast_coordinator_settings());

    let summary = coordinator
        .run(None, None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.organizations_failed, 1);
    assert_eq!(site.search_clicks(), 1);
}

// ============================================================================
// Resume, interruption, checkpoints
// ============================================================================

#[tokio::test]
async fn test_resume_processes_suffix() {
    let names = ["Lab A", "Lab B", "Lab C", "Lab D"];
    let catalog = names
        .iter()
        .map(|name| FakeOrganization::new(name).with_rows(&["1"]))
        .collect();
    let site = FakeSite::new(catalog);
    let sink = MemorySink::default();
    let mut coordinator = coordinator(&site, &sink, &names, fast_coordinator_settings());

    let summary = coordinator
        .run(Some("  Lab C "), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(site.queries(), vec!["Lab C".to_string(), "Lab D".to_string()]);
    assert_eq!(summary.organizations_processed, 2);
    assert_eq!(summary.last_reached_index, Some(3));
}

#[tokio::test]
async fn test_missing_resume_target_is_config_error() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("run.checkpoint.json");

    let site = FakeSite::new(vec![FakeOrganization::new("Lab A").with_rows(&["1"])]);
    let sink = MemorySink::default();
    let mut settings = fast_coordinator_settings();
    settings.checkpoint_path = Some(checkpoint.clone());
    let mut coordinator = coordinator(&site, &sink, &["Lab A"], settings);

    let err = coordinator
        .run(Some("Lab Z"), None, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)), "got: {err:?}");
    assert!(site.queries().is_empty());
    assert_eq!(site.quits(), 1);
    assert!(!checkpoint.exists());
}

#[tokio::test]
async fn test_cancelled_run_still_finalizes() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A").with_rows(&["1"])]);
    let sink = MemorySink::default();
    let mut coordinator = coordinator(&site, &sink, &["Lab A"], fast_coordinator_settings());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = coordinator.run(None, None, cancel).await.unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.organizations_processed, 0);
    assert_eq!(summary.next_organization.as_deref(), Some("Lab A"));
    assert_eq!(site.navigations(), 0);
    assert_eq!(site.quits(), 1);
    assert_eq!(sink.flushes(), 1);
}

#[tokio::test]
async fn test_cancel_after_first_organization() {
    let names = ["Lab A", "Lab B", "Lab C"];
    let site = single_row_site(&names);
    let sink = MemorySink::default();
    let cancel = CancellationToken::new();
    let mut coordinator = RunCoordinator::new(
        site.clone(),
        sink.clone(),
        CancelDuring::new("Lab A", &cancel),
        organizations(&names),
        fast_coordinator_settings(),
    );

    let summary = coordinator.run(None, None, cancel).await.unwrap();

    assert!(summary.interrupted);
    assert_eq!(site.queries(), vec!["Lab A".to_string()]);
    assert_eq!(sink.records().len(), 1, "finished organization is kept");
    assert_eq!(summary.next_organization.as_deref(), Some("Lab B"));
    assert_eq!(site.quits(), 1);
}

#[tokio::test]
async fn test_cancel_during_last_organization() {
    let site = single_row_site(&["Lab A"]);
    let sink = MemorySink::default();
    let cancel = CancellationToken::new();
    let mut coordinator = RunCoordinator::new(
        site.clone(),
        sink.clone(),
        CancelDuring::new("Lab A", &cancel),
        organizations(&["Lab A"]),
        fast_coordinator_settings(),
    );

    let summary = coordinator.run(None, None, cancel).await.unwrap();

    assert!(summary.interrupted);
    assert!(summary.is_complete());
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test]
async fn test_cancel_during_limit_organization() {
    let site = single_row_site(&["Lab A", "Lab B"]);
    let sink = MemorySink::default();
    let cancel = CancellationToken::new();
    let mut coordinator = RunCoordinator::new(
        site.clone(),
        sink.clone(),
        CancelDuring::new("Lab A", &cancel),
        organizations(&["Lab A", "Lab B"]),
        fast_coordinator_settings(),
    );

    let summary = coordinator.run(None, Some(1), cancel).await.unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.organizations_processed, 1);
}

#[tokio::test]
async fn test_checkpoint_resume_with_repeated_name() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("run.checkpoint.json");
    let names = ["Lab A", "Lab B", "Lab A", "Lab C"];

    let sink = MemorySink::default();
    let mut settings = fast_coordinator_settings();
    settings.checkpoint_path = Some(checkpoint.clone());

    let first = single_row_site(&names);
    coordinator(&first, &sink, &names, settings.clone())
        .run(None, Some(2), CancellationToken::new())
        .await
        .unwrap();

    let saved = RunCheckpoint::load(&checkpoint).unwrap().unwrap();
    assert_eq!(saved.summary.next_index, Some(2));
    assert_eq!(saved.resume_from(), Some("Lab A"));

    let start = ResumePoint::Index {
        index: 2,
        name: "Lab A".to_string(),
    };
    let second = single_row_site(&names);
    let summary = coordinator(&second, &sink, &names, settings)
        .run_from(Some(start), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.queries(), vec!["Lab A".to_string(), "Lab C".to_string()]);
    assert_eq!(summary.organizations_processed, 2);
    assert_eq!(sink.records().len(), 4, "one row per list entry, none repeated");
}

#[tokio::test]
async fn test_checkpoint_index_mismatch_is_config_error() {
    let names = ["Lab A", "Lab B", "Lab C"];
    let site = single_row_site(&names);
    let sink = MemorySink::default();

    let start = ResumePoint::Index {
        index: 1,
        name: "Lab C".to_string(),
    };
    let err = coordinator(&site, &sink, &names, fast_coordinator_settings())
        .run_from(Some(start), None, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)), "got: {err:?}");
    assert!(site.queries().is_empty());

    let past_end = ResumePoint::Index {
        index: 9,
        name: "Lab C".to_string(),
    };
    let err = coordinator(&single_row_site(&names), &sink, &names, fast_coordinator_settings())
        .run_from(Some(past_end), None, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got: {err:?}");
}

#[tokio::test]
async fn test_checkpoint_written_at_end() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("run.checkpoint.json");

    let site = FakeSite::new(vec![
        FakeOrganization::new("Lab A").with_rows(&["1"]),
        FakeOrganization::new("Lab B").with_rows(&["2"]),
    ]);
    let sink = MemorySink::default();
    let mut settings = fast_coordinator_settings();
    settings.checkpoint_path = Some(checkpoint.clone());
    let mut coordinator = coordinator(&site, &sink, &["Lab A", "Lab B"], settings);

    coordinator
        .run(None, Some(1), CancellationToken::new())
        .await
        .unwrap();

    let saved = RunCheckpoint::load(&checkpoint).unwrap().unwrap();
    assert_eq!(saved.resume_from(), Some("Lab B"));
    assert_eq!(saved.summary.next_index, Some(1));
    assert_eq!(saved.summary.total_records, 1);
}

// ============================================================================
// Output failures
// ============================================================================

#[tokio::test]
async fn test_sink_failure_is_fatal_after_finalization() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("run.checkpoint.json");

    let site = FakeSite::new(vec![
        FakeOrganization::new("Lab A").with_rows(&["1"]),
        FakeOrganization::new("Lab B").with_rows(&["2"]),
    ]);
    let mut settings = fast_coordinator_settings();
    settings.checkpoint_path = Some(checkpoint.clone());
    let mut coordinator = RunCoordinator::new(
        site.clone(),
        FailingSink,
        SearchController::new(fast_search_settings()),
        organizations(&["Lab A", "Lab B"]),
        settings,
    );

    let err = coordinator
        .run(None, None, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)), "got: {err:?}");
    assert_eq!(site.queries(), vec!["Lab A".to_string()]);
    assert_eq!(site.quits(), 1);

    let saved = RunCheckpoint::load(&checkpoint).unwrap().unwrap();
    assert_eq!(saved.resume_from(), Some("Lab A"), "failed organization is repeated");
}
