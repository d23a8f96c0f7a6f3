use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use oktaform_core::ResourceData;

use crate::addr::ResourceAddr;
use crate::context::SiblingObservation;

pub const STATE_VERSION: u32 = 1;

/// Provider state, persisted as JSON next to the declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderState {
    pub version: u32,
    /// Bumped on every flush.
    #[serde(default)]
    pub serial: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<jiff::Timestamp>,
    #[serde(default)]
    pub resources: BTreeMap<ResourceAddr, ResourceRecord>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            updated_at: None,
            resources: BTreeMap::new(),
        }
    }
}

/// Last observed image of one managed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Kept so deletes of removed declarations still run in dependency order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceAddr>,
    #[serde(flatten)]
    pub data: ResourceData,
}

impl ProviderState {
    pub fn touch(&mut self) {
        self.serial += 1;
        self.updated_at = Some(jiff::Timestamp::now());
    }

    /// Apply a side effect another operation observed on a tracked
    /// resource, matched by type and remote ID. Returns how many records
    /// changed.
    pub fn apply_observation(
        &mut self,
        observation: &SiblingObservation,
        origin: &ResourceAddr,
    ) -> usize {
        let mut changed = 0;
        for (addr, record) in self.resources.iter_mut() {
            if addr == origin
                || addr.resource_type != observation.resource_type
                || record.data.id() != Some(observation.id.as_str())
            {
                continue;
            }
            if record.data.get(&observation.attribute) != Some(&observation.value) {
                tracing::debug!(
                    addr = %addr,
                    attribute = %observation.attribute,
                    value = %observation.value,
                    "recording sibling change"
                );
                record.data.set(&observation.attribute, observation.value.clone());
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, priority: i64) -> ResourceRecord {
        let mut data = ResourceData::with_id(id);
        data.set("priority", priority);
        ResourceRecord {
            depends_on: vec![],
            data,
        }
    }

    #[test]
    fn observation_updates_matching_sibling_only() {
        let mut state = ProviderState::default();
        let a = ResourceAddr::new("okta_policy_rule_signon", "a");
        let b = ResourceAddr::new("okta_policy_rule_signon", "b");
        let zone = ResourceAddr::new("okta_network_zone", "z");
        state.resources.insert(a.clone(), record("r1", 1));
        state.resources.insert(b.clone(), record("r2", 2));
        state.resources.insert(zone.clone(), record("r2", 2));

        let changed = state.apply_observation(
            &SiblingObservation {
                resource_type: "okta_policy_rule_signon".into(),
                id: "r2".into(),
                attribute: "priority".into(),
                value: json!(3),
            },
            &a,
        );
        assert_eq!(changed, 1);
        assert_eq!(state.resources[&b].data.get_i64("priority"), Some(3));
        assert_eq!(state.resources[&zone].data.get_i64("priority"), Some(2));
    }

    #[test]
    fn record_layout_is_flat() {
        let json = serde_json::to_value(record("r1", 1)).unwrap();
        assert_eq!(json, json!({"id": "r1", "attributes": {"priority": 1}}));
    }
}
