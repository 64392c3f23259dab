use std::sync::Arc;

use cataloger_core::{RunKind, ServerSpec};
use engine_logging::{engine_error, engine_info};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::counts::CountSampler;
use crate::fetch::{Fetcher, NullSink, ProgressSink};
use crate::scheduler::RevisitScheduler;
use crate::store::{blocking, CatalogStore, StoreError};
use crate::walker::{CrawlSession, TreeWalker};
use crate::{ServerOutcome, ServerReport};

/// Runs crawl and count passes over a server list on a bounded worker pool.
///
/// Servers share nothing but the store. A store failure ends that server's
/// pass with its run left open; other servers continue.
#[derive(Clone)]
pub struct CatalogEngine {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<CatalogStore>,
    sink: Arc<dyn ProgressSink>,
    config: EngineConfig,
}

impl CatalogEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<CatalogStore>, config: EngineConfig) -> Self {
        Self {
            fetcher,
            store,
            sink: Arc::new(NullSink),
            config,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub async fn crawl_all(
        &self,
        servers: Vec<ServerSpec>,
        cancel: CancellationToken,
    ) -> Vec<ServerReport> {
        self.run_all(servers, cancel, RunKind::Crawl).await
    }

    pub async fn count_all(
        &self,
        servers: Vec<ServerSpec>,
        cancel: CancellationToken,
    ) -> Vec<ServerReport> {
        self.run_all(servers, cancel, RunKind::Count).await
    }

    /// Reports come back in server-list order.
    async fn run_all(
        &self,
        servers: Vec<ServerSpec>,
        cancel: CancellationToken,
        kind: RunKind,
    ) -> Vec<ServerReport> {
        let total = servers.len();
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_servers.max(1)));
        let mut tasks = JoinSet::new();

        for (index, server) in servers.into_iter().enumerate() {
            let engine = self.clone();
            let permits = permits.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let report = if cancel.is_cancelled() {
                    ServerReport::new(&server.url, kind, ServerOutcome::NotStarted)
                } else {
                    match kind {
                        RunKind::Crawl => engine.crawl_server(&server, &cancel).await,
                        RunKind::Count => engine.count_server(&server, &cancel).await,
                    }
                };
                (index, report)
            });
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => engine_error!("{} worker failed: {}", kind.as_str(), err),
            }
        }
        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }

    /// Crawl one server if its revisit interval allows.
    pub async fn crawl_server(&self, server: &ServerSpec, cancel: &CancellationToken) -> ServerReport {
        let outcome = match self.try_crawl_server(server, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                engine_error!("Crawl of {} failed: {}", server.url, err);
                ServerOutcome::Failed(err.to_string())
            }
        };
        ServerReport::new(&server.url, RunKind::Crawl, outcome)
    }

    async fn try_crawl_server(
        &self,
        server: &ServerSpec,
        cancel: &CancellationToken,
    ) -> Result<ServerOutcome, StoreError> {
        let store = self.store.clone();
        let entry = server.clone();
        blocking(move || store.register_server(&entry.url, &entry.short_name, &entry.description))
            .await?;

        let scheduler = RevisitScheduler::new(self.store.clone(), RunKind::Crawl);
        if !due(&scheduler, &server.url, server.revisit_days).await? {
            engine_info!(
                "Skipping crawl of {} as revisit_days requirement not met.",
                server.url
            );
            return Ok(ServerOutcome::Skipped);
        }

        let run_id = start_run(&scheduler, &server.url).await?;
        let mut session = CrawlSession::new(&server.url, run_id, cancel.child_token());
        TreeWalker::new(self.fetcher.as_ref(), &self.store, self.sink.as_ref())
            .crawl(&mut session, &server.url, None)
            .await?;
        end_run(&scheduler, run_id).await?;

        let stats = session.into_stats();
        engine_info!(
            "Crawl run {} of {}: {} nodes, {} new, {} superseded, {} unchanged, {} inaccessible",
            run_id,
            server.url,
            stats.nodes,
            stats.inserted,
            stats.superseded,
            stats.unchanged,
            stats.inaccessible
        );
        Ok(ServerOutcome::Crawled(stats))
    }

    /// Sample layer counts for one server if its count interval allows.
    pub async fn count_server(&self, server: &ServerSpec, cancel: &CancellationToken) -> ServerReport {
        let outcome = match self.try_count_server(server, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                engine_error!("Count pass for {} failed: {}", server.url, err);
                ServerOutcome::Failed(err.to_string())
            }
        };
        ServerReport::new(&server.url, RunKind::Count, outcome)
    }

    async fn try_count_server(
        &self,
        server: &ServerSpec,
        cancel: &CancellationToken,
    ) -> Result<ServerOutcome, StoreError> {
        let scheduler = RevisitScheduler::new(self.store.clone(), RunKind::Count);
        if !due(&scheduler, &server.url, server.count_revisit_days).await? {
            engine_info!(
                "Skipping count processing for {} as count_revisit_days requirement not met.",
                server.url
            );
            return Ok(ServerOutcome::Skipped);
        }

        let run_id = start_run(&scheduler, &server.url).await?;
        let stats = CountSampler::new(self.fetcher.as_ref(), &self.store, self.sink.as_ref())
            .sample_server(&server.url, cancel)
            .await?;
        end_run(&scheduler, run_id).await?;
        Ok(ServerOutcome::Counted(stats))
    }
}

async fn due(scheduler: &RevisitScheduler, server_url: &str, days: u32) -> Result<bool, StoreError> {
    let scheduler = scheduler.clone();
    let server_url = server_url.to_string();
    blocking(move || scheduler.should_run(&server_url, days)).await
}

async fn start_run(scheduler: &RevisitScheduler, server_url: &str) -> Result<i64, StoreError> {
    let scheduler = scheduler.clone();
    let server_url = server_url.to_string();
    blocking(move || scheduler.start_run(&server_url)).await
}

async fn end_run(scheduler: &RevisitScheduler, run_id: i64) -> Result<(), StoreError> {
    let scheduler = scheduler.clone();
    blocking(move || scheduler.end_run(run_id)).await
}
