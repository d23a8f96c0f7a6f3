use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::Authenticator;
use crate::config::ClientConfig;
use crate::error::{ApiErrorBody, ClientError};

const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";

/// Shared handle to the management API. Cheap to clone.
#[derive(Clone)]
pub struct OktaClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    endpoint: Url,
    auth: Authenticator,
    limiter: Semaphore,
    config: ClientConfig,
}

/// One API call, independent of the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the org endpoint, or an absolute URL (pagination).
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed JSON, `Null` for empty bodies.
    pub body: Value,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        Ok(serde_json::from_value(self.body)?)
    }

    /// Target of the `Link: <...>; rel="next"` header, if any.
    pub fn next_link(&self) -> Option<String> {
        self.headers
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .find(|part| part.contains("rel=\"next\""))
            .and_then(|part| {
                let start = part.find('<')? + 1;
                let end = part.find('>')?;
                (start < end).then(|| part[start..end].to_string())
            })
    }
}

impl OktaClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let endpoint = config.endpoint()?;
        let auth = Authenticator::from_credentials(&config.credentials, &endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("oktaform/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let permits = config.max_parallel_requests.max(1);
        tracing::debug!(endpoint = %endpoint, max_parallel_requests = permits, "client configured");
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                endpoint,
                auth,
                limiter: Semaphore::new(permits),
                config,
            }),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Send `request`, retrying 429s up to `max_retries` times.
    ///
    /// Non-2xx responses become [`ClientError::Api`]. Cancellation aborts both
    /// the in-flight request and any throttle wait.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ClientError> {
        let mut throttled = 0u32;
        let mut reauthenticated = false;
        loop {
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                r = self.send_once(request) => r?,
            };

            if response.status == 429 && throttled < self.inner.config.max_retries {
                let wait = self.throttle_wait(&response.headers, throttled);
                throttled += 1;
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    attempt = throttled,
                    wait_ms = wait.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
                continue;
            }

            if response.status == 401
                && !reauthenticated
                && matches!(self.inner.auth, Authenticator::PrivateKey(_))
            {
                reauthenticated = true;
                self.inner.auth.invalidate().await;
                continue;
            }

            return into_result(request, response);
        }
    }

    /// GET every page of a collection by following `rel="next"` links.
    pub async fn list_all(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ClientError> {
        let mut items = Vec::new();
        let mut next = Some(request.clone());
        while let Some(page_request) = next.take() {
            let page = self.execute(&page_request, cancel).await?;
            if let Some(link) = page.next_link() {
                next = Some(ApiRequest::get(link));
            }
            match page.body {
                Value::Array(page_items) => items.extend(page_items),
                Value::Null => {}
                other => {
                    return Err(ClientError::Config(format!(
                        "expected a JSON array from {}, got {other}",
                        page_request.path
                    )));
                }
            }
        }
        Ok(items)
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let _permit = self
            .inner
            .limiter
            .acquire()
            .await
            .map_err(|_| ClientError::Config("request limiter closed".into()))?;

        let url = self.url_for(&request.path)?;
        let authorization = self.inner.auth.header(&self.inner.http).await?;
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, path = %request.path, "sending request");
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        Ok(self.inner.endpoint.join(path.trim_start_matches('/'))?)
    }

    /// Wait derived from the rate-limit headers, else exponential with jitter,
    /// clamped to `[min_wait, max_wait]`.
    fn throttle_wait(&self, headers: &HeaderMap, attempt: u32) -> Duration {
        let config = &self.inner.config;
        let from_headers = header_i64(headers, RATE_LIMIT_RESET)
            .map(|reset| {
                let now = jiff::Timestamp::now().as_second();
                Duration::from_secs((reset - now).max(0) as u64 + 1)
            })
            .or_else(|| header_i64(headers, RETRY_AFTER.as_str()).map(|s| Duration::from_secs(s.max(0) as u64)));

        let wait = from_headers.unwrap_or_else(|| {
            let base = config.min_wait.saturating_mul(1u32 << attempt.min(16));
            let jitter_ms = rand::rng().random_range(0..=config.min_wait.as_millis() as u64);
            base + Duration::from_millis(jitter_ms)
        });
        wait.clamp(config.min_wait, config.max_wait.max(config.min_wait))
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn into_result(request: &ApiRequest, response: ApiResponse) -> Result<ApiResponse, ClientError> {
    if response.status < 400 {
        return Ok(response);
    }
    let body = match &response.body {
        Value::Object(_) => serde_json::from_value(response.body.clone())
            .unwrap_or_else(|_| ApiErrorBody::from_text(response.body.to_string())),
        Value::Null => ApiErrorBody::from_text(String::new()),
        Value::String(text) => ApiErrorBody::from_text(text.clone()),
        other => ApiErrorBody::from_text(other.to_string()),
    };
    Err(ClientError::Api {
        status: response.status,
        method: request.method.to_string(),
        path: request.path.clone(),
        body,
    })
}
