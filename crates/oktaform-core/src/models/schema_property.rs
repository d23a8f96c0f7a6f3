//! Custom attributes of the user and group profile schemas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One custom schema attribute as posted to and read from the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaAttribute {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<EnumChoice>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<AttributePermission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<Master>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ArrayItems>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumChoice {
    #[serde(rename = "const")]
    pub value: Value,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributePermission {
    pub principal: String,
    pub action: String,
}

impl AttributePermission {
    /// `READ_ONLY`, `READ_WRITE` or `HIDE` for the end user.
    pub fn self_principal(action: &str) -> Self {
        Self {
            principal: "SELF".to_string(),
            action: action.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Master {
    /// `PROFILE_MASTER` or `OKTA`.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayItems {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Profile schema document, trimmed to the custom section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub definitions: Definitions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub custom: CustomSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomSection {
    #[serde(default = "custom_id")]
    pub id: String,
    #[serde(rename = "type", default = "object_kind")]
    pub kind: String,
    /// Attribute name to attribute body; `null` on write deletes it.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Default for CustomSection {
    fn default() -> Self {
        Self {
            id: custom_id(),
            kind: object_kind(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

fn custom_id() -> String {
    "#custom".to_string()
}

fn object_kind() -> String {
    "object".to_string()
}

impl ProfileSchema {
    /// Write body that sets (or, with `Value::Null`, removes) one attribute.
    pub fn single_property(name: &str, body: Value) -> Self {
        let mut custom = CustomSection::default();
        custom.properties.insert(name.to_string(), body);
        Self {
            id: None,
            definitions: Definitions { custom },
        }
    }

    pub fn custom_property(&self, name: &str) -> Option<&Value> {
        self.definitions
            .custom
            .properties
            .get(name)
            .filter(|v| !v.is_null())
    }
}
