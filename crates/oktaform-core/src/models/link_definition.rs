use serde::{Deserialize, Serialize};

/// Linked-object definition: a primary/associated relationship pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDefinition {
    pub primary: LinkSide,
    pub associated: LinkSide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSide {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default = "user_kind")]
    pub kind: String,
}

fn user_kind() -> String {
    "USER".to_string()
}
