mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use cataloger_engine::{
    CatalogEngine, CatalogStore, LogSink, ReqwestFetcher, ServerOutcome, ServerReport,
};
use clap::Parser;
use engine_logging::{engine_error, engine_info, engine_warn};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

use crate::cli::{CliArgs, Command};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(args.log.into(), level);

    let config = AppConfig::load(&args.config)?;
    let database = args.database.clone().unwrap_or_else(|| config.database.clone());
    let engine_config = config.engine_config();

    let store = CatalogStore::open(&database, engine_config.clock.clone())
        .with_context(|| format!("failed to open database {}", database.display()))?;
    let fetcher = ReqwestFetcher::new(engine_config.fetch.clone())
        .context("failed to build http client")?;
    let engine = CatalogEngine::new(Arc::new(fetcher), Arc::new(store), engine_config)
        .with_sink(Arc::new(LogSink));

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    engine_info!(
        "Starting {:?} with {} configured servers, database {}",
        args.command,
        config.servers.len(),
        database.display()
    );

    if matches!(args.command, Command::Crawl | Command::All) {
        let reports = engine.crawl_all(config.crawl_servers(), cancel.clone()).await;
        log_summary(&reports);
    }
    if matches!(args.command, Command::Count | Command::All) {
        if cancel.is_cancelled() {
            engine_warn!("Cancelled; skipping count pass");
        } else {
            let reports = engine.count_all(config.count_servers(), cancel.clone()).await;
            log_summary(&reports);
        }
    }
    Ok(())
}

/// First Ctrl-C stops new fetches; in-flight work finishes and runs are closed.
fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                engine_warn!("Interrupt received, finishing in-flight requests");
                cancel.cancel();
            }
            Err(err) => engine_error!("Unable to listen for Ctrl-C: {}", err),
        }
    });
}

fn log_summary(reports: &[ServerReport]) {
    for report in reports {
        let kind = report.kind.as_str();
        match &report.outcome {
            ServerOutcome::Skipped => {
                engine_info!("{} {}: skipped (revisit interval)", kind, report.server_url)
            }
            ServerOutcome::NotStarted => {
                engine_info!("{} {}: not started", kind, report.server_url)
            }
            ServerOutcome::Crawled(stats) => engine_info!(
                "{} {}: {} nodes ({} new, {} superseded, {} unchanged, {} inaccessible), {} field versions, {} domain entries{}",
                kind,
                report.server_url,
                stats.nodes,
                stats.inserted,
                stats.superseded,
                stats.unchanged,
                stats.inaccessible,
                stats.fields_inserted + stats.fields_superseded,
                stats.domain_entries,
                if stats.cancelled { ", cancelled" } else { "" }
            ),
            ServerOutcome::Counted(stats) => engine_info!(
                "{} {}: {} layers, {} failed, {} records{}",
                kind,
                report.server_url,
                stats.layers,
                stats.failed,
                stats.total_records,
                if stats.cancelled { ", cancelled" } else { "" }
            ),
            ServerOutcome::Failed(err) => {
                engine_error!("{} {}: failed: {}", kind, report.server_url, err)
            }
        }
    }
}
