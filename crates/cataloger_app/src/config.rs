//! RON configuration file: database location, fetch limits and the server list.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cataloger_core::ServerSpec;
use cataloger_engine::{EngineConfig, FetchSettings, DEFAULT_MAX_CONCURRENT_SERVERS};
use engine_logging::engine_warn;
use serde::{Deserialize, Serialize};

const DEFAULT_DATABASE: &str = "cataloger.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_max_concurrent_servers")]
    pub max_concurrent_servers: usize,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub count_timeout_secs: Option<u64>,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub url: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "enabled")]
    pub to_process: bool,
    #[serde(default)]
    pub revisit_days: u32,
    #[serde(default = "enabled")]
    pub count_to_process: bool,
    #[serde(default)]
    pub count_revisit_days: u32,
}

fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE)
}

fn default_max_concurrent_servers() -> usize {
    DEFAULT_MAX_CONCURRENT_SERVERS
}

fn enabled() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            max_concurrent_servers: default_max_concurrent_servers(),
            connect_timeout_secs: None,
            request_timeout_secs: None,
            count_timeout_secs: None,
            servers: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        Self::from_ron(&content)
            .with_context(|| format!("failed to parse configuration {}", path.display()))
    }

    pub fn from_ron(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Servers with crawling enabled.
    pub fn crawl_servers(&self) -> Vec<ServerSpec> {
        self.usable_servers()
            .filter(|entry| entry.to_process)
            .map(ServerEntry::to_spec)
            .collect()
    }

    /// Servers with count sampling enabled.
    pub fn count_servers(&self) -> Vec<ServerSpec> {
        self.usable_servers()
            .filter(|entry| entry.count_to_process)
            .map(ServerEntry::to_spec)
            .collect()
    }

    fn usable_servers(&self) -> impl Iterator<Item = &ServerEntry> {
        self.servers.iter().filter(|entry| {
            let usable = !entry.url.trim().trim_end_matches('/').is_empty();
            if !usable {
                engine_warn!(
                    "Ignoring server entry {:?} without a url",
                    entry.short_name
                );
            }
            usable
        })
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            connect_timeout: seconds_or(self.connect_timeout_secs, defaults.connect_timeout),
            request_timeout: seconds_or(self.request_timeout_secs, defaults.request_timeout),
            count_timeout: seconds_or(self.count_timeout_secs, defaults.count_timeout),
            ..defaults
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            fetch: self.fetch_settings(),
            max_concurrent_servers: self.max_concurrent_servers,
            ..EngineConfig::default()
        }
    }
}

impl ServerEntry {
    fn to_spec(&self) -> ServerSpec {
        ServerSpec {
            url: self.url.trim().trim_end_matches('/').to_string(),
            short_name: self.short_name.clone(),
            description: self.description.clone(),
            revisit_days: self.revisit_days,
            count_revisit_days: self.count_revisit_days,
        }
    }
}

fn seconds_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        (
            database: "catalog.sqlite",
            request_timeout_secs: Some(20),
            servers: [
                (
                    url: "https://gis.example.org/arcgis/rest/services/",
                    short_name: "county",
                    description: "County GIS",
                    revisit_days: 7,
                    count_revisit_days: 1,
                ),
                (
                    url: "https://maps.example.net/arcgis/rest/services",
                    to_process: false,
                ),
                (
                    url: "https://tiles.example.com/rest/services",
                    count_to_process: false,
                ),
                (url: "  ", short_name: "blank"),
            ],
        )
    "#;

    #[test]
    fn missing_values_take_defaults() {
        let config = AppConfig::from_ron("(servers: [(url: \"http://a.example/rest/services\")])")
            .unwrap();

        assert_eq!(config.database, PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(config.max_concurrent_servers, DEFAULT_MAX_CONCURRENT_SERVERS);
        let entry = &config.servers[0];
        assert!(entry.to_process);
        assert!(entry.count_to_process);
        assert_eq!(entry.revisit_days, 0);
        assert_eq!(entry.count_revisit_days, 0);
    }

    #[test]
    fn servers_are_filtered_per_pass() {
        let config = AppConfig::from_ron(SAMPLE).unwrap();

        let crawl: Vec<_> = config.crawl_servers().into_iter().map(|s| s.url).collect();
        assert_eq!(
            crawl,
            vec![
                "https://gis.example.org/arcgis/rest/services",
                "https://tiles.example.com/rest/services",
            ]
        );

        let count: Vec<_> = config.count_servers().into_iter().map(|s| s.url).collect();
        assert_eq!(
            count,
            vec![
                "https://gis.example.org/arcgis/rest/services",
                "https://maps.example.net/arcgis/rest/services",
            ]
        );

        let county = &config.crawl_servers()[0];
        assert_eq!(county.short_name, "county");
        assert_eq!(county.revisit_days, 7);
        assert_eq!(county.count_revisit_days, 1);
    }

    #[test]
    fn timeout_overrides_apply() {
        let config = AppConfig::from_ron(SAMPLE).unwrap();
        let settings = config.fetch_settings();

        assert_eq!(config.database, PathBuf::from("catalog.sqlite"));
        assert_eq!(settings.request_timeout, Duration::from_secs(20));
        assert_eq!(settings.count_timeout, FetchSettings::default().count_timeout);
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cataloger.ron");
        fs::write(&path, SAMPLE).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.servers.len(), 4);
        assert!(AppConfig::load(&dir.path().join("missing.ron")).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(AppConfig::from_ron("(servers: [(short_name: \"no url\")])").is_err());
    }
}
