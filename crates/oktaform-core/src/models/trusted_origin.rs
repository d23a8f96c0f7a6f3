use serde::{Deserialize, Serialize};

use crate::status::LifecycleStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedOrigin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub origin: String,
    #[serde(default)]
    pub scopes: Vec<OriginScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LifecycleStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginScope {
    /// `CORS`, `REDIRECT` or `IFRAME_EMBED`.
    #[serde(rename = "type")]
    pub kind: String,
}
