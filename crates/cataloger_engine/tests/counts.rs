mod common;

use std::sync::Arc;

use cataloger_engine::{CatalogStore, CountSampler, CrawlSession, EngineEvent, NullSink, TreeWalker};
use common::{memory_store, sample_catalog, MapFetcher, RecordingSink, TestClock, LAYER, ROOT};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

async fn crawl(fetcher: &MapFetcher, store: &Arc<CatalogStore>) {
    let mut session = CrawlSession::new(ROOT, 1, CancellationToken::new());
    TreeWalker::new(fetcher, store, &NullSink)
        .crawl(&mut session, ROOT, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn every_sample_supersedes_the_previous_count() {
    let clock = TestClock::at(2024, 6, 1);
    let store = memory_store(&clock);
    let fetcher = MapFetcher::new().with_count(LAYER, 120);
    let sampler = CountSampler::new(&fetcher, &store, &NullSink);

    let first = sampler.sample_layer(LAYER).await;
    sampler.record_count_snapshot(LAYER, first).await.unwrap();
    clock.advance_days(1);
    let second = sampler.sample_layer(LAYER).await;
    sampler.record_count_snapshot(LAYER, second).await.unwrap();

    let snapshots = store.count_snapshots(LAYER).unwrap();
    assert_eq!(snapshots.len(), 2);
    assert!(!snapshots[0].active);
    assert!(snapshots[1].active);
    assert_eq!(snapshots[1].record_count, 120);
    assert_eq!(store.active_count(LAYER).unwrap().unwrap().id, snapshots[1].id);
}

#[tokio::test]
async fn failed_sample_counts_as_zero() {
    let clock = TestClock::at(2024, 6, 1);
    let store = memory_store(&clock);
    let fetcher = MapFetcher::new();
    let sampler = CountSampler::new(&fetcher, &store, &NullSink);

    assert_eq!(sampler.sample_layer(LAYER).await, 0);
}

#[tokio::test]
async fn server_pass_samples_queryable_layers_with_fields() {
    let clock = TestClock::at(2024, 6, 1);
    let store = memory_store(&clock);
    let fetcher = sample_catalog().with_count(LAYER, 9);
    let raster = format!("{ROOT}/Fold1/Svc/MapServer/1");
    let no_fields = format!("{ROOT}/Fold1/Svc/MapServer/2");
    fetcher.set_descriptor(
        &format!("{ROOT}/Fold1/Svc/MapServer"),
        json!({"layers": [{"id": 0}, {"id": 1}, {"id": 2}]}),
    );
    fetcher.set_descriptor(
        &raster,
        json!({"name": "Imagery", "capabilities": "Map", "fields": [{"name": "OID"}]}),
    );
    fetcher.set_descriptor(&no_fields, json!({"name": "Group", "capabilities": "Query"}));
    crawl(&fetcher, &store).await;

    let sink = RecordingSink::default();
    let sampler = CountSampler::new(&fetcher, &store, &sink);
    assert_eq!(sampler.queryable_layers(ROOT).await.unwrap(), vec![LAYER.to_string()]);

    let stats = sampler
        .sample_server(ROOT, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.layers, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.total_records, 9);
    assert_eq!(store.active_count(LAYER).unwrap().unwrap().record_count, 9);
    assert!(store.active_count(&raster).unwrap().is_none());
    assert_eq!(
        sink.take(),
        vec![EngineEvent::LayerCounted {
            server_url: ROOT.to_string(),
            layer_url: LAYER.to_string(),
            count: 9,
            sampled: true,
        }]
    );
}

#[tokio::test]
async fn failing_layer_is_recorded_as_zero_and_pass_continues() {
    let clock = TestClock::at(2024, 6, 1);
    let store = memory_store(&clock);
    let fetcher = sample_catalog();
    crawl(&fetcher, &store).await;

    let stats = CountSampler::new(&fetcher, &store, &NullSink)
        .sample_server(ROOT, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.layers, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(store.active_count(LAYER).unwrap().unwrap().record_count, 0);
}

#[tokio::test]
async fn cancelled_pass_records_nothing() {
    let clock = TestClock::at(2024, 6, 1);
    let store = memory_store(&clock);
    let fetcher = sample_catalog().with_count(LAYER, 3);
    crawl(&fetcher, &store).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = CountSampler::new(&fetcher, &store, &NullSink)
        .sample_server(ROOT, &cancel)
        .await
        .unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.layers, 0);
    assert!(store.count_snapshots(LAYER).unwrap().is_empty());
}
