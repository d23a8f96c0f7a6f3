use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::LifecycleStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LifecycleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_on_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<Accessibility>,
    #[serde(default)]
    pub settings: AppSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    #[serde(default)]
    pub auto_submit_toolbar: bool,
    #[serde(default)]
    pub hide: Hide,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hide {
    #[serde(default, rename = "iOS")]
    pub ios: bool,
    #[serde(default)]
    pub web: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessibility {
    #[serde(default)]
    pub self_service: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_redirect_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// App-template specific settings (`url`, `authURL`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_on: Option<SamlSignOn>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamlSignOn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso_acs_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name_id_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name_id_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_signed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion_signed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub honor_force_authn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authn_context_class_ref: Option<String>,
}

/// Group assignment on an app (`/apps/{appId}/groups/{groupId}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub profile: Value,
}
