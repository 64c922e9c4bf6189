//! Organization search controller tests

use vademecum::crawler::{OrganizationSearch, SearchController};
use vademecum::driver::Control;
use vademecum::models::{Availability, Organization};
use vademecum::utils::error::{SearchError, SearchErrorKind};

use crate::common::{fast_search_settings, FakeOrganization, FakeSite};

fn controller() -> SearchController {
    SearchController::new(fast_search_settings())
}

#[tokio::test]
async fn test_search_returns_rows_in_order() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A").with_rows(&["100", "200"])]);

    let records = controller()
        .search(&site, &Organization::new("Lab A"))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].certificate_number, "100");
    assert_eq!(records[1].certificate_number, "200");
    assert_eq!(records[0].commercial_name_presentation, "PRODUCTO 100 - 500 mg x 16");
    assert_eq!(records[0].generic_name, "paracetamol");
    assert_eq!(records[0].gtin, "7790000100");
    assert_eq!(records[0].availability, Availability::Available);

    assert_eq!(site.queries(), vec!["Lab A".to_string()]);
    assert_eq!(site.navigations(), 1);
    assert_eq!(site.search_clicks(), 1);
}

#[tokio::test]
async fn test_unknown_organization_is_not_found() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A").with_rows(&["100"])]);

    let records = controller()
        .search(&site, &Organization::new("Lab Z"))
        .await
        .unwrap();

    assert!(records.is_empty());
    assert_eq!(site.escapes(), 1, "picker should be dismissed");
    assert_eq!(site.search_clicks(), 0);
}

#[tokio::test]
async fn test_filter_submitted_with_enter_without_icon() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A").with_rows(&["100"])])
        .without_search_icon();

    let records = controller()
        .search(&site, &Organization::new("Lab A"))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(site.queries().len(), 1);
}

#[tokio::test]
async fn test_query_truncated_to_thirty_chars() {
    let name = "LABORATORIOS INTERNACIONALES ARGENTINOS S.A.";
    let site = FakeSite::new(vec![FakeOrganization::new(name).with_rows(&["7"])]);

    let records = controller()
        .search(&site, &Organization::new(name))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    let queries = site.queries();
    assert_eq!(queries[0], "LABORATORIOS INTERNACIONALES A");
    assert_eq!(queries[0].chars().count(), 30);
}

#[tokio::test]
async fn test_no_results_marker() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab B")]);

    let records = controller()
        .search(&site, &Organization::new("Lab B"))
        .await
        .unwrap();

    assert!(records.is_empty());
    assert_eq!(site.search_clicks(), 1);
}

#[tokio::test]
async fn test_candidate_mismatch_still_selected() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A")
        .with_label("OTRA RAZON SOCIAL")
        .with_rows(&["1"])]);

    let controller = controller();
    let records = controller
        .search(&site, &Organization::new("Lab A"))
        .await
        .unwrap();

    assert_eq!(records.len(), 1, "first candidate still selected");
    assert_eq!(controller.candidate_mismatches(), 1);
}

#[tokio::test]
async fn test_matching_candidate_is_not_flagged() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A")
        .with_label("LAB A S.A.")
        .with_rows(&["1"])]);

    let controller = controller();
    controller
        .search(&site, &Organization::new("Lab A"))
        .await
        .unwrap();

    assert_eq!(controller.candidate_mismatches(), 0);
}

#[tokio::test]
async fn test_missing_search_button_times_out() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A")
        .with_rows(&["1"])
        .without_search_button()]);

    let err = controller()
        .search(&site, &Organization::new("Lab A"))
        .await
        .unwrap_err();

    match err {
        SearchError::Timeout { control } => assert_eq!(control, Control::SearchButton),
        other => panic!("Expected timeout, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_session_loss_propagates() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A")
        .with_rows(&["1"])
        .with_session_failures(1)]);

    let err = controller()
        .search(&site, &Organization::new("Lab A"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), SearchErrorKind::SessionLost);
}

#[tokio::test]
async fn test_dead_session_before_navigation() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A").with_rows(&["1"])]);
    site.kill_session();

    let err = controller()
        .search(&site, &Organization::new("Lab A"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), SearchErrorKind::SessionLost);
    assert_eq!(site.navigations(), 0);
}

#[tokio::test]
async fn test_command_failure_is_other() {
    let site = FakeSite::new(vec![FakeOrganization::new("Lab A")
        .with_rows(&["1"])
        .with_search_command_error()]);

    let err = controller()
        .search(&site, &Organization::new("Lab A"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), SearchErrorKind::Other);
    assert!(err.to_string().contains("not interactable"));
}
