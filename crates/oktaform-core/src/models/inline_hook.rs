//! Inline hooks: the channel is either plain HTTP or OAuth-secured.

use serde::{Deserialize, Serialize};

use crate::status::LifecycleStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineHook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Hook point, e.g. `com.okta.oauth2.tokens.transform`.
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LifecycleStatus>,
    pub channel: HookChannel,
}

/// Discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HookChannel {
    #[serde(rename = "HTTP")]
    Http {
        version: String,
        config: HttpChannelConfig,
    },
    #[serde(rename = "OAUTH")]
    OAuth {
        version: String,
        config: OAuthChannelConfig,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpChannelConfig {
    pub uri: String,
    #[serde(default = "post_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_scheme: Option<HeaderAuth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderAuth {
    #[serde(rename = "type")]
    pub kind: String,
    pub key: String,
    /// Write-only; the API never echoes it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthChannelConfig {
    pub uri: String,
    #[serde(default = "post_method")]
    pub method: String,
    /// `client_secret_post` or `private_key_jwt`.
    pub auth_type: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub token_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn post_method() -> String {
    "POST".to_string()
}
