use std::time::Duration;

use cataloger_core::{count_query_url, descriptor, descriptor_request_url};
use engine_logging::engine_debug;
use futures_util::StreamExt;
use serde_json::Value;
use url::Url;

use crate::{EngineEvent, FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Timeout for a single descriptor request.
    pub request_timeout: Duration,
    /// Timeout for a count query, which the server may have to compute.
    pub count_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            count_timeout: Duration::from_secs(45),
            redirect_limit: 5,
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Writes events to the debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::NodeVisited {
                url,
                kind,
                accessible,
                change,
                ..
            } => engine_debug!("{} {} accessible={} {:?}", kind, url, accessible, change),
            EngineEvent::LayerCounted {
                layer_url,
                count,
                sampled,
                ..
            } => engine_debug!("Layer: {} -> {} records (sampled={})", layer_url, count, sampled),
        }
    }
}

/// Retrieves catalog descriptors. Retry, caching and rate limiting policies
/// belong to implementations; callers treat every error as "node inaccessible".
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_descriptor(&self, url: &str) -> Result<Value, FetchError>;

    /// Record count of a layer via an unfiltered count query.
    async fn fetch_count(&self, layer_url: &str) -> Result<u64, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(concat!("cataloger/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    async fn get_json(&self, url: Url, timeout: Duration) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
        }

        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|err| FetchError::new(FailureKind::InvalidJson, err.to_string()))?;
        if body.is_null() {
            return Err(FetchError::new(FailureKind::InvalidJson, "empty document"));
        }
        if let Some(error) = descriptor::service_error(&body) {
            return Err(FetchError::new(
                FailureKind::ServiceError { code: error.code },
                error.message,
            ));
        }
        Ok(body)
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch_descriptor(&self, url: &str) -> Result<Value, FetchError> {
        let request_url = descriptor_request_url(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        self.get_json(request_url, self.settings.request_timeout)
            .await
    }

    async fn fetch_count(&self, layer_url: &str) -> Result<u64, FetchError> {
        let query_url = count_query_url(layer_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let body = self.get_json(query_url, self.settings.count_timeout).await?;
        descriptor::record_count(&body)
            .ok_or_else(|| FetchError::new(FailureKind::InvalidJson, "missing count"))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
