//! Sign-on policy rules.

use serde::{Deserialize, Serialize};

use crate::status::LifecycleStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default = "sign_on_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LifecycleStatus>,
    /// Set on the catch-all rule the platform creates with every policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<RuleConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<RuleActions>,
}

fn sign_on_kind() -> String {
    "SIGN_ON".to_string()
}

impl PolicyRule {
    /// A system rule with no payload is how a removed rule reads back.
    pub fn is_tombstone(&self) -> bool {
        self.system == Some(true) && self.conditions.is_none() && self.actions.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkCondition {
    /// `ANYWHERE`, `ZONE`, `ON_NETWORK` or `OFF_NETWORK`.
    pub connection: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleActions {
    pub signon: SignOnAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOnAction {
    /// `ALLOW` or `DENY`.
    pub access: String,
    #[serde(default)]
    pub require_factor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor_lifetime: Option<i64>,
    #[serde(default)]
    pub session: SessionAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_session_idle_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_session_lifetime_minutes: Option<i64>,
    #[serde(default)]
    pub use_persistent_cookie: bool,
}
