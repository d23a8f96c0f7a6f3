use serde::{Deserialize, Serialize};

/// Provisioning connection profile, discriminated by `authScheme`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "authScheme")]
pub enum ConnectionProfile {
    #[serde(rename = "TOKEN")]
    Token {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    #[serde(rename = "OAUTH2", rename_all = "camelCase")]
    OAuth2 {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub profile: ConnectionProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningConnection {
    pub auth_scheme: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// `ENABLED` or `DISABLED`.
    pub status: String,
    #[serde(default)]
    pub profile: Option<ConnectionProfile>,
}
