use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use spanview_core::config::Config;
use spanview_core::error::{Result, SpanviewError};
use spanview_core::ids::TraceId;
use spanview_core::model::otlp::TraceDocument;

#[derive(Debug, Clone)]
pub struct TempoConfig {
    pub base_url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl From<&Config> for TempoConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            base_url: cfg.tempo_url.clone(),
            headers: cfg.tempo_headers.clone(),
            timeout: cfg.tempo_timeout,
        }
    }
}

/// Client for Tempo's trace-by-id API. Every call goes to the backend; there
/// is no local cache.
#[derive(Clone)]
pub struct TempoClient {
    client: Client,
    base_url: String,
    headers: HeaderMap,
}

impl TempoClient {
    pub fn new(cfg: &TempoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| SpanviewError::Internal(format!("failed to build tempo client: {e}")))?;
        Ok(Self {
            client,
            base_url: normalize_base_url(&cfg.base_url),
            headers: build_http_headers(&cfg.headers),
        })
    }

    pub fn trace_url(&self, trace_id: &TraceId) -> String {
        format!("{}/api/traces/{trace_id}", self.base_url)
    }

    pub async fn fetch_trace(&self, trace_id: &TraceId) -> Result<TraceDocument> {
        let url = self.trace_url(trace_id);
        tracing::debug!(url = %url, "fetching trace");

        let resp = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| SpanviewError::Fetch(format!("GET {url} failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SpanviewError::NotFound(format!("trace {trace_id}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SpanviewError::Fetch(format!(
                "GET {url} returned {status}: {}",
                body.trim()
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| SpanviewError::Fetch(format!("reading body of {url} failed: {e}")))?;
        let doc = TraceDocument::from_json_slice(&body)?;
        tracing::debug!(spans = doc.span_count(), "trace fetched");
        Ok(doc)
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

fn build_http_headers(headers: &[(String, String)]) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (k, v) in headers {
        let name = HeaderName::try_from(k.as_str());
        let value = HeaderValue::try_from(v.as_str());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                out.insert(name, value);
            }
            _ => {
                tracing::warn!(header = %k, "ignored invalid tempo HTTP header");
            }
        }
    }
    out
}
