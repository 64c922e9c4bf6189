//! Property tests for pagination and resume

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;
use vademecum::coordinator::RunCoordinator;
use vademecum::crawler::{ResultExtractor, SearchController};

use crate::common::{
    fast_coordinator_settings, fast_search_settings, organizations, FakeOrganization, FakeRow,
    FakeSite, MemorySink, NextMode,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn lab_name(i: usize) -> String {
    format!("Laboratorio {i:02}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pagination_visits_every_page_once(
        page_sizes in prop::collection::vec(1usize..5, 1..8),
        class_mode in any::<bool>(),
    ) {
        let mut serial = 0;
        let pages: Vec<Vec<FakeRow>> = page_sizes
            .iter()
            .map(|&size| {
                (0..size)
                    .map(|_| {
                        serial += 1;
                        FakeRow::listing(&serial.to_string())
                    })
                    .collect()
            })
            .collect();
        let mode = if class_mode { NextMode::DisabledClass } else { NextMode::DisabledAttribute };

        let site = FakeSite::new(vec![
            FakeOrganization::new("Lab A").with_pages(pages).with_next_mode(mode),
        ]);
        site.show_results("Lab A");

        let settings = fast_search_settings();
        let records = runtime()
            .block_on(ResultExtractor::new(&site, &settings).extract_all())
            .unwrap();

        let expected: Vec<String> = (1..=serial).map(|n| n.to_string()).collect();
        let got: Vec<String> = records.iter().map(|r| r.certificate_number.clone()).collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(site.next_clicks(), page_sizes.len() - 1);
    }

    #[test]
    fn prop_resume_processes_exact_suffix(
        (total, start) in (1usize..10).prop_flat_map(|n| (Just(n), 0..n)),
    ) {
        let names: Vec<String> = (0..total).map(lab_name).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let site = FakeSite::new(
            names
                .iter()
                .map(|name| FakeOrganization::new(name).with_rows(&["1"]))
                .collect(),
        );
        let sink = MemorySink::default();
        let mut coordinator = RunCoordinator::new(
            site.clone(),
            sink.clone(),
            SearchController::new(fast_search_settings()),
            organizations(&refs),
            fast_coordinator_settings(),
        );

        let summary = runtime()
            .block_on(coordinator.run(Some(&names[start]), None, CancellationToken::new()))
            .unwrap();

        prop_assert_eq!(site.queries(), names[start..].to_vec());
        prop_assert_eq!(summary.organizations_processed, total - start);
        prop_assert_eq!(sink.records().len(), total - start);
        prop_assert!(summary.is_complete());
    }
}
