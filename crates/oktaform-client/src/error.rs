use std::fmt;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{method} {path} returned {status}: {body}")]
    Api {
        status: u16,
        method: String,
        path: String,
        body: ApiErrorBody,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request cancelled")]
    Cancelled,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status for API errors, `None` for transport and local failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Api { body, .. } => body.error_code.as_deref(),
            _ => None,
        }
    }

    /// Case-insensitive search over the summary and every cause.
    pub fn message_contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        match self {
            Self::Api { body, .. } => body
                .messages()
                .any(|m| m.to_lowercase().contains(&needle)),
            other => other.to_string().to_lowercase().contains(&needle),
        }
    }
}

/// Error document returned by the platform on 4xx/5xx.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_summary: String,
    #[serde(default)]
    pub error_id: Option<String>,
    #[serde(default)]
    pub error_causes: Vec<ErrorCause>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCause {
    #[serde(default)]
    pub error_summary: String,
}

impl ApiErrorBody {
    /// Body for responses that were not a JSON error document.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            error_summary: text.into(),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.error_summary.as_str())
            .chain(self.error_causes.iter().map(|c| c.error_summary.as_str()))
    }
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(code) = &self.error_code {
            write!(f, "{code}: ")?;
        }
        f.write_str(&self.error_summary)?;
        for cause in &self.error_causes {
            write!(f, "; {}", cause.error_summary)?;
        }
        Ok(())
    }
}
