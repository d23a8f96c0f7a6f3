use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "okta.com";

/// How the client authenticates.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Static API token sent as `Authorization: SSWS <token>`.
    ApiToken { token: String },
    /// OAuth 2.0 service app authenticating with a signed client assertion.
    PrivateKey {
        client_id: String,
        /// PEM-encoded RSA private key.
        private_key: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        private_key_id: Option<String>,
        scopes: Vec<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiToken { token } => f
                .debug_struct("ApiToken")
                .field("token", &redact_secret(token))
                .finish(),
            Self::PrivateKey {
                client_id,
                private_key_id,
                scopes,
                ..
            } => f
                .debug_struct("PrivateKey")
                .field("client_id", client_id)
                .field("private_key", &"****")
                .field("private_key_id", private_key_id)
                .field("scopes", scopes)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Org subdomain, e.g. `dev-123456`.
    pub org_name: Option<String>,
    /// Domain the org lives under (`okta.com`, `oktapreview.com`, ...).
    pub base_url: String,
    /// Full endpoint override. Takes precedence over `org_name`/`base_url`.
    pub endpoint: Option<Url>,
    pub credentials: Credentials,
    /// 429 retries before the throttle error is surfaced.
    pub max_retries: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
    pub request_timeout: Duration,
    /// Process-wide cap on in-flight requests.
    pub max_parallel_requests: usize,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            org_name: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint: None,
            credentials,
            max_retries: 5,
            min_wait: Duration::from_secs(30),
            max_wait: Duration::from_secs(300),
            request_timeout: Duration::from_secs(60),
            max_parallel_requests: 20,
        }
    }

    /// Resolve the API root: the explicit endpoint, else `https://{org}.{base_url}/`.
    pub fn endpoint(&self) -> Result<Url, ClientError> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        let org = self
            .org_name
            .as_deref()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| ClientError::Config("org_name or endpoint must be set".into()))?;
        let base = self.base_url.trim_matches('/');
        Ok(Url::parse(&format!("https://{org}.{base}/"))?)
    }
}

/// Keep the first and last four characters of a secret.
pub fn redact_secret(secret: &str) -> String {
    if secret.len() <= 8 {
        return "****".to_string();
    }
    let prefix = &secret[..4];
    let suffix = &secret[secret.len() - 4..];
    format!("{prefix}...{suffix}")
}
