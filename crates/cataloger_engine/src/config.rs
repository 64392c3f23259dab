use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::fetch::FetchSettings;

/// Source of "now". Calendar-day scheduling uses the local date of this value.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Local::now)
}

pub const DEFAULT_MAX_CONCURRENT_SERVERS: usize = 4;

#[derive(Clone)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    /// Upper bound on servers crawled or counted at the same time.
    pub max_concurrent_servers: usize,
    pub clock: Clock,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            max_concurrent_servers: DEFAULT_MAX_CONCURRENT_SERVERS,
            clock: system_clock(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("fetch", &self.fetch)
            .field("max_concurrent_servers", &self.max_concurrent_servers)
            .finish_non_exhaustive()
    }
}
