mod common;

use std::sync::Arc;

use cataloger_core::{RunKind, ServerSpec};
use cataloger_engine::{CatalogEngine, EngineConfig, ServerOutcome};
use common::{memory_store, sample_catalog, MapFetcher, TestClock, FOLDER, LAYER, ROOT};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn engine(fetcher: Arc<MapFetcher>, clock: &TestClock, max_concurrent_servers: usize) -> CatalogEngine {
    let config = EngineConfig {
        max_concurrent_servers,
        clock: clock.clock(),
        ..EngineConfig::default()
    };
    CatalogEngine::new(fetcher, memory_store(clock), config)
}

#[tokio::test]
async fn crawl_registers_server_and_closes_the_run() {
    let clock = TestClock::at(2024, 8, 5);
    let engine = engine(Arc::new(sample_catalog()), &clock, 2);
    let spec = ServerSpec {
        short_name: "gis".into(),
        description: "Example county".into(),
        ..ServerSpec::new(ROOT).with_revisit_days(7)
    };

    let report = engine.crawl_server(&spec, &CancellationToken::new()).await;

    assert_eq!(report.kind, RunKind::Crawl);
    let ServerOutcome::Crawled(stats) = &report.outcome else {
        panic!("unexpected outcome {:?}", report.outcome);
    };
    assert_eq!(stats.nodes, 4);

    let store = engine.store();
    assert_eq!(
        store.server(ROOT).unwrap().unwrap().description.as_deref(),
        Some("Example county")
    );
    let runs = store.runs(RunKind::Crawl, ROOT).unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].end_timestamp.is_some());
}

#[tokio::test]
async fn server_within_its_interval_is_skipped() {
    let clock = TestClock::at(2024, 8, 5);
    let fetcher = Arc::new(sample_catalog());
    let engine = engine(fetcher.clone(), &clock, 2);
    let spec = ServerSpec::new(ROOT).with_revisit_days(3);

    engine.crawl_server(&spec, &CancellationToken::new()).await;
    let calls = fetcher.total_calls();
    clock.advance_days(2);
    let report = engine.crawl_server(&spec, &CancellationToken::new()).await;

    assert_eq!(report.outcome, ServerOutcome::Skipped);
    assert_eq!(fetcher.total_calls(), calls);
    assert_eq!(engine.store().runs(RunKind::Crawl, ROOT).unwrap().len(), 1);

    clock.advance_days(1);
    let report = engine.crawl_server(&spec, &CancellationToken::new()).await;
    assert!(matches!(report.outcome, ServerOutcome::Crawled(_)));
}

#[tokio::test]
async fn crawl_all_reports_in_server_order() {
    let other = "http://other.example.org/rest/services";
    let empty = "http://empty.example.org/rest/services";
    let fetcher = sample_catalog()
        .with_descriptor(other, json!({"folders": [], "services": []}))
        .with_descriptor(empty, json!({}));
    let clock = TestClock::at(2024, 8, 5);
    let engine = engine(Arc::new(fetcher), &clock, 2);

    let servers = vec![
        ServerSpec::new(ROOT),
        ServerSpec::new(other),
        ServerSpec::new(empty),
    ];
    let reports = engine.crawl_all(servers, CancellationToken::new()).await;

    let urls: Vec<_> = reports.iter().map(|r| r.server_url.as_str()).collect();
    assert_eq!(urls, vec![ROOT, other, empty]);
    let nodes: Vec<_> = reports
        .iter()
        .map(|r| match &r.outcome {
            ServerOutcome::Crawled(stats) => stats.nodes,
            outcome => panic!("unexpected outcome {outcome:?}"),
        })
        .collect();
    assert_eq!(nodes, vec![4, 1, 1]);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let clock = TestClock::at(2024, 8, 5);
    let fetcher = Arc::new(sample_catalog());
    let engine = engine(fetcher.clone(), &clock, 1);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let reports = engine
        .crawl_all(vec![ServerSpec::new(ROOT)], cancel)
        .await;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, ServerOutcome::NotStarted);
    assert_eq!(fetcher.total_calls(), 0);
    assert!(engine.store().runs(RunKind::Crawl, ROOT).unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_crawl_still_closes_its_run() {
    let clock = TestClock::at(2024, 8, 5);
    let fetcher = Arc::new(sample_catalog());
    let cancel = CancellationToken::new();
    fetcher.cancel_after(FOLDER, cancel.clone());
    let engine = engine(fetcher.clone(), &clock, 1);

    let report = engine.crawl_server(&ServerSpec::new(ROOT), &cancel).await;

    let ServerOutcome::Crawled(stats) = &report.outcome else {
        panic!("unexpected outcome {:?}", report.outcome);
    };
    assert!(stats.cancelled);
    let runs = engine.store().runs(RunKind::Crawl, ROOT).unwrap();
    assert!(runs[0].end_timestamp.is_some());
}

#[tokio::test]
async fn count_pass_follows_its_own_interval() {
    let clock = TestClock::at(2024, 8, 5);
    let fetcher = Arc::new(sample_catalog().with_count(LAYER, 77));
    let engine = engine(fetcher, &clock, 2);
    let spec = ServerSpec::new(ROOT)
        .with_revisit_days(30)
        .with_count_revisit_days(1);
    let cancel = CancellationToken::new();

    engine.crawl_all(vec![spec.clone()], cancel.clone()).await;
    let first = engine.count_all(vec![spec.clone()], cancel.clone()).await;
    let ServerOutcome::Counted(stats) = &first[0].outcome else {
        panic!("unexpected outcome {:?}", first[0].outcome);
    };
    assert_eq!(stats.total_records, 77);
    assert_eq!(first[0].kind, RunKind::Count);

    let again = engine.count_all(vec![spec.clone()], cancel.clone()).await;
    assert_eq!(again[0].outcome, ServerOutcome::Skipped);

    clock.advance_days(1);
    let crawl = engine.crawl_all(vec![spec.clone()], cancel.clone()).await;
    assert_eq!(crawl[0].outcome, ServerOutcome::Skipped);
    let next = engine.count_all(vec![spec], cancel).await;
    assert!(matches!(next[0].outcome, ServerOutcome::Counted(_)));
    assert_eq!(engine.store().count_snapshots(LAYER).unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_servers_share_one_store() {
    let hosts: Vec<String> = (0..6)
        .map(|n| format!("http://host{n}.example.org/rest/services"))
        .collect();
    let fetcher = hosts.iter().fold(MapFetcher::new(), |fetcher, host| {
        fetcher
            .with_descriptor(host, json!({"services": [{"name": "Svc", "type": "MapServer"}]}))
            .with_descriptor(
                &format!("{host}/Svc/MapServer"),
                json!({"layers": [{"id": 0}]}),
            )
            .with_descriptor(
                &format!("{host}/Svc/MapServer/0"),
                json!({"name": "Points", "fields": [{"name": "OID"}]}),
            )
    });
    let clock = TestClock::at(2024, 8, 5);
    let engine = engine(Arc::new(fetcher), &clock, 4);

    let servers = hosts.iter().map(ServerSpec::new).collect();
    let reports = engine.crawl_all(servers, CancellationToken::new()).await;

    assert_eq!(reports.len(), hosts.len());
    for (report, host) in reports.iter().zip(&hosts) {
        assert_eq!(&report.server_url, host);
        let ServerOutcome::Crawled(stats) = &report.outcome else {
            panic!("unexpected outcome {:?}", report.outcome);
        };
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.fields_inserted, 1);
        let runs = engine.store().runs(RunKind::Crawl, host).unwrap();
        assert!(runs[0].end_timestamp.is_some());
    }
    assert_eq!(engine.store().resource_row_count().unwrap(), 18);
}
