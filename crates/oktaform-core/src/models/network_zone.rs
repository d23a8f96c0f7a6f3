//! Network zones: one API surface, three concrete shapes.

use serde::{Deserialize, Serialize};

use crate::status::LifecycleStatus;

/// Discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NetworkZone {
    #[serde(rename = "IP")]
    Ip(IpZone),
    #[serde(rename = "DYNAMIC")]
    Dynamic(DynamicZone),
    #[serde(rename = "DYNAMIC_V2")]
    DynamicV2(EnhancedDynamicZone),
}

impl NetworkZone {
    pub fn common(&self) -> &ZoneCommon {
        match self {
            Self::Ip(z) => &z.common,
            Self::Dynamic(z) => &z.common,
            Self::DynamicV2(z) => &z.common,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ip(_) => "IP",
            Self::Dynamic(_) => "DYNAMIC",
            Self::DynamicV2(_) => "DYNAMIC_V2",
        }
    }
}

/// Fields every variant carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneCommon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LifecycleStatus>,
    /// `POLICY` or `BLOCKLIST`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    /// Built-in zones cannot be deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpZone {
    #[serde(flatten)]
    pub common: ZoneCommon,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<AddressEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<AddressEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicZone {
    #[serde(flatten)]
    pub common: ZoneCommon,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub asns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedDynamicZone {
    #[serde(flatten)]
    pub common: ZoneCommon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<IncludeExclude<Location>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_service_categories: Option<IncludeExclude<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asns: Option<IncludeExclude<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeExclude<T> {
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<T>,
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<T>,
}

impl<T> IncludeExclude<T> {
    /// `None` when both sides are empty, so the field is omitted on write.
    pub fn non_empty(include: Vec<T>, exclude: Vec<T>) -> Option<Self> {
        if include.is_empty() && exclude.is_empty() {
            None
        } else {
            Some(Self { include, exclude })
        }
    }
}

/// Gateway or proxy address: a CIDR block or an `a-b` range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl AddressEntry {
    pub fn parse(value: &str) -> Self {
        let kind = if value.contains('-') { "RANGE" } else { "CIDR" };
        Self {
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }
}

/// Country, optionally narrowed to a region (`US` or `US-CA`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Location {
    pub fn parse(value: &str) -> Self {
        match value.split_once('-') {
            Some((country, _)) => Self {
                country: country.to_string(),
                region: Some(value.to_string()),
            },
            None => Self {
                country: value.to_string(),
                region: None,
            },
        }
    }

    pub fn code(&self) -> String {
        self.region.clone().unwrap_or_else(|| self.country.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatches_on_type() {
        let zone: NetworkZone = serde_json::from_value(json!({
            "type": "DYNAMIC",
            "id": "nzo1",
            "name": "geo",
            "status": "ACTIVE",
            "locations": [{"country": "US", "region": "US-CA"}],
            "proxyType": "TorAnonymizer"
        }))
        .unwrap();
        let NetworkZone::Dynamic(z) = &zone else {
            panic!("expected a dynamic zone, got {zone:?}")
        };
        assert_eq!(z.common.name, "geo");
        assert_eq!(z.locations[0].code(), "US-CA");
        assert_eq!(zone.kind(), "DYNAMIC");
    }

    #[test]
    fn enhanced_zone_serializes_nested_include_exclude() {
        let zone = NetworkZone::DynamicV2(EnhancedDynamicZone {
            common: ZoneCommon {
                name: "v2".into(),
                ..Default::default()
            },
            locations: IncludeExclude::non_empty(vec![Location::parse("FR")], vec![]),
            ip_service_categories: None,
            asns: IncludeExclude::non_empty(vec!["13335".into()], vec![]),
        });
        let body = serde_json::to_value(&zone).unwrap();
        assert_eq!(body["type"], "DYNAMIC_V2");
        assert_eq!(body["locations"]["include"][0]["country"], "FR");
        assert!(body.get("ipServiceCategories").is_none());
        assert_eq!(body["asns"]["include"][0], "13335");
    }

    #[test]
    fn address_kind_follows_notation() {
        assert_eq!(AddressEntry::parse("1.2.3.4/24").kind, "CIDR");
        assert_eq!(AddressEntry::parse("1.2.3.4-1.2.3.9").kind, "RANGE");
    }
}
