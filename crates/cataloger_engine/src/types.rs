use std::fmt;

use cataloger_core::{ResourceType, RunKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    InvalidJson,
    /// Error object embedded in a successful response body.
    ServiceError { code: Option<i64> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::InvalidJson => write!(f, "invalid json"),
            FailureKind::ServiceError { code: Some(code) } => write!(f, "service error {code}"),
            FailureKind::ServiceError { code: None } => write!(f, "service error"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// What an upsert did to the versioned history of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChange {
    /// First version for the key.
    Inserted,
    /// Content identical to the active version; nothing written.
    Unchanged,
    /// Active version end-dated and replaced.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    NodeVisited {
        server_url: String,
        url: String,
        kind: ResourceType,
        accessible: bool,
        change: VersionChange,
    },
    LayerCounted {
        server_url: String,
        layer_url: String,
        count: u64,
        sampled: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub nodes: usize,
    pub inaccessible: usize,
    pub inserted: usize,
    pub superseded: usize,
    pub unchanged: usize,
    pub fields_inserted: usize,
    pub fields_superseded: usize,
    pub domain_entries: usize,
    pub cancelled: bool,
}

impl CrawlStats {
    pub(crate) fn record_node(&mut self, accessible: bool, change: VersionChange) {
        self.nodes += 1;
        if !accessible {
            self.inaccessible += 1;
        }
        match change {
            VersionChange::Inserted => self.inserted += 1,
            VersionChange::Superseded => self.superseded += 1,
            VersionChange::Unchanged => self.unchanged += 1,
        }
    }

    pub(crate) fn record_field(&mut self, change: VersionChange) {
        match change {
            VersionChange::Inserted => self.fields_inserted += 1,
            VersionChange::Superseded => self.fields_superseded += 1,
            VersionChange::Unchanged => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountStats {
    pub layers: usize,
    pub failed: usize,
    pub total_records: u64,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerOutcome {
    /// Revisit interval not reached.
    Skipped,
    Crawled(CrawlStats),
    Counted(CountStats),
    /// Cancelled before the server was started.
    NotStarted,
    /// Store failure; the run was left open.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReport {
    pub server_url: String,
    pub kind: RunKind,
    pub outcome: ServerOutcome,
}

impl ServerReport {
    pub fn new(server_url: impl Into<String>, kind: RunKind, outcome: ServerOutcome) -> Self {
        Self {
            server_url: server_url.into(),
            kind,
            outcome,
        }
    }
}
