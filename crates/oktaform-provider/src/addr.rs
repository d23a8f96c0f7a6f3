use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// `type.name` key for a resource in declarations and state.
///
/// Two declarations of the same type with different names (e.g. two
/// `okta_group_schema_property` entries) have distinct addresses.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceAddr {
    pub resource_type: String,
    pub resource_name: String,
}

impl ResourceAddr {
    pub fn new(resource_type: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
        }
    }
}

impl fmt::Display for ResourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.resource_name)
    }
}

impl FromStr for ResourceAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((t, n)) if !t.is_empty() && !n.is_empty() => Ok(Self::new(t, n)),
            _ => Err(format!("invalid resource address \"{s}\": expected \"type.name\"")),
        }
    }
}

impl TryFrom<String> for ResourceAddr {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceAddr> for String {
    fn from(addr: ResourceAddr) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_and_name() {
        let addr: ResourceAddr = "okta_network_zone.office".parse().unwrap();
        assert_eq!(addr.resource_type, "okta_network_zone");
        assert_eq!(addr.resource_name, "office");
        assert_eq!(addr.to_string(), "okta_network_zone.office");
    }

    #[test]
    fn rejects_missing_name() {
        assert!("okta_user".parse::<ResourceAddr>().is_err());
        assert!("okta_user.".parse::<ResourceAddr>().is_err());
    }

    #[test]
    fn serializes_as_string_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ResourceAddr::new("okta_user", "alice"), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"okta_user.alice":1}"#);
        let back: std::collections::BTreeMap<ResourceAddr, i32> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
