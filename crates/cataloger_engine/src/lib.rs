//! Cataloger engine: catalog crawling, versioned persistence and count sampling.
mod config;
mod counts;
mod engine;
mod fetch;
mod scheduler;
pub mod store;
mod types;
mod walker;

pub use config::{system_clock, Clock, EngineConfig, DEFAULT_MAX_CONCURRENT_SERVERS};
pub use counts::CountSampler;
pub use engine::CatalogEngine;
pub use fetch::{FetchSettings, Fetcher, LogSink, NullSink, ProgressSink, ReqwestFetcher};
pub use scheduler::RevisitScheduler;
pub use store::{CatalogStore, NewResource, StoreError};
pub use types::{
    CountStats, CrawlStats, EngineEvent, FailureKind, FetchError, ServerOutcome, ServerReport,
    VersionChange,
};
pub use walker::{CrawlSession, TreeWalker};
