use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};

use super::{DataSource, RawDocument, Resource, TransportError};

/// `DataSource` backed by a shared reqwest client carrying the session cookie.
#[derive(Clone)]
pub struct HttpSource {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(
        base_url: String,
        golden_key: Option<&str>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = build_client(golden_key, user_agent, timeout)?;
        tracing::debug!(base_url = %base_url, authenticated = golden_key.is_some(), "HttpSource initialized");
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    pub fn url_for(&self, resource: &Resource) -> String {
        format!("{}{}", self.base_url, resource.path())
    }

    fn map_err(&self, e: reqwest::Error) -> TransportError {
        map_reqwest_error(e, self.timeout)
    }
}

pub(crate) fn build_client(
    golden_key: Option<&str>,
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("text/html,*/*"));
    if let Some(key) = golden_key.map(str::trim).filter(|k| !k.is_empty()) {
        let cookie = HeaderValue::from_str(&format!("golden_key={}", key))
            .map_err(|e| TransportError::Network(format!("bad session cookie: {}", e)))?;
        headers.insert(COOKIE, cookie);
    }

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .default_headers(headers)
        .build()
        .map_err(|e| TransportError::Network(format!("build http client: {}", e)))
}

pub(crate) fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout)
    } else if e.is_builder() {
        TransportError::InvalidUrl(e.to_string())
    } else if let Some(status) = e.status() {
        TransportError::Status { status: status.as_u16() }
    } else {
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn fetch(&self, resource: Resource) -> Result<RawDocument, TransportError> {
        let url = self.url_for(&resource);
        tracing::debug!(resource = %resource, url = %url, "fetching");

        let resp = self.http.get(&url).send().await.map_err(|e| self.map_err(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status { status: status.as_u16() });
        }

        let body = resp.text().await.map_err(|e| self.map_err(e))?;
        Ok(RawDocument { resource, body })
    }
}
