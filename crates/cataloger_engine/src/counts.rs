use std::sync::Arc;

use cataloger_core::descriptor;
use engine_logging::{engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::fetch::{Fetcher, ProgressSink};
use crate::store::{blocking, CatalogStore, StoreError};
use crate::{CountStats, EngineEvent, FetchError};

/// Periodic record-count sampling over layers already in the catalog.
pub struct CountSampler<'a> {
    fetcher: &'a dyn Fetcher,
    store: &'a Arc<CatalogStore>,
    sink: &'a dyn ProgressSink,
}

impl<'a> CountSampler<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        store: &'a Arc<CatalogStore>,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            fetcher,
            store,
            sink,
        }
    }

    /// Current record count of a layer; any failure counts as zero.
    pub async fn sample_layer(&self, layer_url: &str) -> u64 {
        self.try_sample(layer_url).await.unwrap_or(0)
    }

    async fn try_sample(&self, layer_url: &str) -> Result<u64, FetchError> {
        self.fetcher.fetch_count(layer_url).await.inspect_err(|err| {
            engine_warn!("Error querying {}: {}", layer_url, err);
        })
    }

    pub async fn record_count_snapshot(&self, layer_url: &str, count: u64) -> Result<(), StoreError> {
        let store = Arc::clone(self.store);
        let layer_url = layer_url.to_string();
        blocking(move || store.record_count_snapshot(&layer_url, count)).await
    }

    /// Active layers of `server_url` that have fields and advertise a query
    /// capability.
    pub async fn queryable_layers(&self, server_url: &str) -> Result<Vec<String>, StoreError> {
        let store = Arc::clone(self.store);
        let owner = server_url.to_string();
        let layers = blocking(move || store.count_candidates(&owner))
            .await?
            .into_iter()
            .filter(|(url, metadata)| match serde_json::from_str(metadata) {
                Ok(value) => descriptor::is_queryable(&value),
                Err(err) => {
                    engine_warn!("Unreadable metadata for {}: {}", url, err);
                    false
                }
            })
            .map(|(url, _)| url)
            .collect();
        Ok(layers)
    }

    /// Sample and record every queryable layer of one server. A failing layer
    /// is recorded as zero and never aborts the batch.
    pub async fn sample_server(
        &self,
        server_url: &str,
        cancel: &CancellationToken,
    ) -> Result<CountStats, StoreError> {
        let layers = self.queryable_layers(server_url).await?;
        engine_info!(
            "Processing {} feature layers for server: {}",
            layers.len(),
            server_url
        );

        let mut stats = CountStats::default();
        for layer_url in layers {
            if cancel.is_cancelled() {
                engine_info!("Count pass for {} cancelled", server_url);
                stats.cancelled = true;
                break;
            }
            let sampled = self.try_sample(&layer_url).await;
            let count = *sampled.as_ref().unwrap_or(&0);
            engine_info!("Layer: {} -> {} records", layer_url, count);
            self.record_count_snapshot(&layer_url, count).await?;

            stats.layers += 1;
            stats.total_records += count;
            if sampled.is_err() {
                stats.failed += 1;
            }
            self.sink.emit(EngineEvent::LayerCounted {
                server_url: server_url.to_string(),
                layer_url,
                count,
                sampled: sampled.is_ok(),
            });
        }
        Ok(stats)
    }
}
