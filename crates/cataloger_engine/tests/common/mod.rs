#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cataloger_engine::{
    CatalogStore, Clock, EngineEvent, FailureKind, FetchError, Fetcher, ProgressSink,
};
use chrono::{DateTime, Local, TimeDelta, TimeZone};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub const ROOT: &str = "http://gis.example.org/arcgis/rest/services";
pub const FOLDER: &str = "http://gis.example.org/arcgis/rest/services/Fold1";
pub const SERVICE: &str = "http://gis.example.org/arcgis/rest/services/Fold1/Svc/MapServer";
pub const LAYER: &str = "http://gis.example.org/arcgis/rest/services/Fold1/Svc/MapServer/0";

fn key(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// In-memory catalog. Unknown URLs answer 404, unknown counts time out.
#[derive(Default)]
pub struct MapFetcher {
    descriptors: Mutex<HashMap<String, Value>>,
    counts: Mutex<HashMap<String, u64>>,
    calls: Mutex<HashMap<String, usize>>,
    cancel_on: Mutex<Option<(String, CancellationToken)>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_descriptor(self, url: &str, descriptor: Value) -> Self {
        self.set_descriptor(url, descriptor);
        self
    }

    pub fn with_count(self, layer_url: &str, count: u64) -> Self {
        self.counts.lock().unwrap().insert(key(layer_url), count);
        self
    }

    pub fn set_descriptor(&self, url: &str, descriptor: Value) {
        self.descriptors.lock().unwrap().insert(key(url), descriptor);
    }

    pub fn remove_descriptor(&self, url: &str) {
        self.descriptors.lock().unwrap().remove(&key(url));
    }

    /// Cancel `token` once `url` has been fetched.
    pub fn cancel_after(&self, url: &str, token: CancellationToken) {
        *self.cancel_on.lock().unwrap() = Some((key(url), token));
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(&key(url)).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record_call(&self, url: &str) {
        *self.calls.lock().unwrap().entry(key(url)).or_default() += 1;
        if let Some((trigger, token)) = self.cancel_on.lock().unwrap().as_ref() {
            if *trigger == key(url) {
                token.cancel();
            }
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for MapFetcher {
    async fn fetch_descriptor(&self, url: &str) -> Result<Value, FetchError> {
        self.record_call(url);
        self.descriptors
            .lock()
            .unwrap()
            .get(&key(url))
            .cloned()
            .ok_or_else(|| FetchError::new(FailureKind::HttpStatus(404), "not found"))
    }

    async fn fetch_count(&self, layer_url: &str) -> Result<u64, FetchError> {
        self.record_call(layer_url);
        self.counts
            .lock()
            .unwrap()
            .get(&key(layer_url))
            .copied()
            .ok_or_else(|| FetchError::new(FailureKind::Timeout, "timed out"))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Manually advanced clock.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl TestClock {
    pub fn at(year: i32, month: u32, day: u32) -> Self {
        let now = Local
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("unambiguous local noon");
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || *now.lock().unwrap())
    }

    pub fn advance_days(&self, days: i64) {
        *self.now.lock().unwrap() += TimeDelta::days(days);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        *self.now.lock().unwrap() += TimeDelta::minutes(minutes);
    }
}

pub fn memory_store(clock: &TestClock) -> Arc<CatalogStore> {
    Arc::new(CatalogStore::open_in_memory(clock.clock()).expect("in-memory store"))
}

pub fn roads_layer() -> Value {
    json!({
        "id": 0,
        "name": "Roads",
        "type": "Feature Layer",
        "capabilities": "Map,Query,Data",
        "fields": [
            {"name": "OID", "type": "esriFieldTypeOID", "alias": "OBJECTID"},
            {
                "name": "CLASS",
                "type": "esriFieldTypeSmallInteger",
                "alias": "Road class",
                "domain": {
                    "type": "codedValue",
                    "codedValues": [
                        {"code": 1, "name": "Highway"},
                        {"code": 2, "name": "Local"}
                    ]
                }
            }
        ]
    })
}

/// Root -> Fold1 -> Svc/MapServer -> layer 0 (Roads).
pub fn sample_catalog() -> MapFetcher {
    MapFetcher::new()
        .with_descriptor(ROOT, json!({"currentVersion": 10.9, "folders": ["Fold1"], "services": []}))
        .with_descriptor(
            FOLDER,
            json!({"folders": [], "services": [{"name": "Fold1/Svc", "type": "MapServer"}]}),
        )
        .with_descriptor(
            SERVICE,
            json!({
                "mapName": "Svc",
                "serviceDescription": "Road network",
                "capabilities": "Map,Query",
                "layers": [{"id": 0, "name": "Roads"}],
                "tables": []
            }),
        )
        .with_descriptor(LAYER, roads_layer())
}
