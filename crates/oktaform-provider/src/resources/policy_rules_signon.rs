//! `okta_policy_rules_signon`: every managed rule of one sign-on policy
//! declared as a single resource, identified by the policy ID.
//!
//! Rules are written one at a time in ascending declared priority under
//! the policy's arbiter lock. Afterwards the policy is re-listed and the
//! rules' relative order checked against the declaration; absolute
//! numbers may differ when unmanaged rules share the policy.

use std::collections::{BTreeMap, BTreeSet};

use oktaform_client::ApiRequest;
use oktaform_core::models::policy_rule::PolicyRule;
use oktaform_core::{AttrType, Attribute, AttributeChange, LifecycleStatus, ResourceData, Schema, api_paths};
use serde_json::Value;

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::priority::{self, PRIORITY};
use crate::resource::{OpResult, Resource};
use crate::transition::{self, Transition};

use super::policy_rule_signon::{
    NAME, POLICY_ID, lifecycle, observe_rule, policy_key, rule_attributes, rule_wire,
    validate_rule,
};
use super::{STATUS, status_of};

const RULES: &str = "rules";
const ID: &str = "id";

/// Single-rule resource type that may share a policy with this one.
const SINGLE_RULE_TYPE: &str = "okta_policy_rule_signon";

pub struct PolicyRulesSignOn {
    schema: Schema,
    rule_schema: Schema,
}

impl PolicyRulesSignOn {
    pub fn new() -> Self {
        let rule_schema = rule_attributes(Schema::new()).attr(ID, Attribute::computed(AttrType::String));
        let schema = Schema::new()
            .attr(POLICY_ID, Attribute::required(AttrType::String).force_new())
            .attr(
                RULES,
                Attribute::required(AttrType::block(rule_schema.clone()))
                    .describe("Rules in any order; priority decides evaluation order"),
            );
        Self {
            schema,
            rule_schema,
        }
    }

    /// Write `declared` in priority order and return the IDs, aligned
    /// with `declared`.
    async fn write_rules(
        &self,
        ctx: &OpContext,
        policy_id: &str,
        declared: &[ResourceData],
        existing: &BTreeMap<String, ResourceData>,
        order_changed: bool,
    ) -> Result<Vec<String>, ProvisionerError> {
        let mut order: Vec<usize> = (0..declared.len()).collect();
        priority::sort_by_priority(&mut order, |i| declared[*i].get_i64(PRIORITY));

        let mut ids = vec![String::new(); declared.len()];
        for i in order {
            let rule = &declared[i];
            let name = rule.require_str(NAME)?;
            let desired_status = status_of(rule, LifecycleStatus::Active)?;

            let id = match existing.get(name).and_then(|p| p.get_str(ID).map(|id| (p, id))) {
                None => {
                    let created: PolicyRule = ctx
                        .post_json(&api_paths::policy_rules(policy_id), &rule_wire(rule)?)
                        .await
                        .map_err(|e| e.prefixed(&format!("rule \"{name}\"")))?;
                    let id = created.id.clone().ok_or_else(|| {
                        ProvisionerError::Unknown(format!("rule \"{name}\" created without an id"))
                    })?;
                    if desired_status == LifecycleStatus::Inactive
                        && created.status != Some(desired_status)
                    {
                        ctx.send(lifecycle(policy_id, &id)(Transition::Deactivate))
                            .await
                            .map_err(|e| e.prefixed(&format!("rule \"{name}\" deactivate")))?;
                    }
                    tracing::info!(policy_id = %policy_id, rule_id = %id, name = %name, "rule created");
                    id
                }
                Some((prior, id)) => {
                    let changed = order_changed
                        || self.rule_schema.has_changes_except(rule, prior, &[STATUS, PRIORITY]);
                    let plan = transition::plan_binary(
                        status_of(prior, LifecycleStatus::Active)?,
                        desired_status,
                        changed,
                    );
                    transition::execute(ctx, &plan, lifecycle(policy_id, id), || async move {
                        let _: PolicyRule = ctx
                            .put_json(&api_paths::policy_rule(policy_id, id), &rule_wire(rule)?)
                            .await?;
                        Ok::<_, ProvisionerError>(())
                    })
                    .await
                    .map_err(|e| e.prefixed(&format!("rule \"{name}\"")))?;
                    if !plan.is_noop() {
                        tracing::info!(policy_id = %policy_id, rule_id = %id, name = %name, "rule updated");
                    }
                    id.to_string()
                }
            };
            ids[i] = id;
        }
        Ok(ids)
    }

    /// Re-list the policy, build state in declaration order and check the
    /// relative order the server settled on.
    async fn settle(
        &self,
        ctx: &OpContext,
        policy_id: &str,
        declared: &[ResourceData],
        ids: &[String],
    ) -> Result<ResourceData, ProvisionerError> {
        let listed =
            priority::observe_siblings(ctx, SINGLE_RULE_TYPE, policy_id, None).await?;
        let mut blocks = Vec::with_capacity(ids.len());
        for (rule, id) in declared.iter().zip(ids) {
            let current = listed
                .iter()
                .find(|r| r.id.as_deref() == Some(id.as_str()))
                .ok_or_else(|| {
                    ProvisionerError::Unknown(format!(
                        "rule \"{}\" is missing from policy {policy_id} after write",
                        rule.get_str(NAME).unwrap_or(id)
                    ))
                })?;
            blocks.push(block(current));
        }
        let observed = state_image(policy_id, blocks);

        if !order_matches(declared, &rule_blocks(&observed)) {
            return Err(ProvisionerError::Conflict(format!(
                "rules of policy {policy_id} did not settle in the declared order"
            )));
        }
        Ok(observed)
    }
}

impl Default for PolicyRulesSignOn {
    fn default() -> Self {
        Self::new()
    }
}

fn rule_blocks(data: &ResourceData) -> Vec<ResourceData> {
    data.get_list(RULES)
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| ResourceData::from_attributes(obj.clone()))
        .collect()
}

fn block(rule: &PolicyRule) -> Value {
    let mut data = ResourceData::new();
    observe_rule(rule, &mut data);
    if let Some(id) = &rule.id {
        data.set(ID, id.clone());
    }
    Value::Object(data.attributes)
}

fn state_image(policy_id: &str, blocks: Vec<Value>) -> ResourceData {
    let mut data = ResourceData::with_id(policy_id);
    data.set(POLICY_ID, policy_id);
    data.set(RULES, Value::Array(blocks));
    data
}

fn ranked(rules: &[ResourceData]) -> Vec<(&str, i64)> {
    rules
        .iter()
        .filter_map(|r| Some((r.get_str(NAME)?, r.get_i64(PRIORITY)?)))
        .collect()
}

fn order_matches(declared: &[ResourceData], observed: &[ResourceData]) -> bool {
    priority::relative_order_matches(&ranked(declared), &ranked(observed))
}

impl Resource for PolicyRulesSignOn {
    fn type_name(&self) -> &'static str {
        "okta_policy_rules_signon"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        let rules = rule_blocks(desired);
        if rules.is_empty() {
            return Err(ProvisionerError::PreconditionViolated(
                "at least one rule is required".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for rule in &rules {
            validate_rule(rule)?;
            let name = rule.require_str(NAME)?;
            if !seen.insert(name) {
                return Err(ProvisionerError::PreconditionViolated(format!(
                    "rule name \"{name}\" is declared more than once"
                )));
            }
        }
        Ok(())
    }

    /// Shifted absolute numbers are not drift as long as every rule
    /// matches and the relative order holds.
    fn suppress_diff(
        &self,
        change: &AttributeChange,
        desired: &ResourceData,
        state: &ResourceData,
    ) -> bool {
        if change.attribute != RULES {
            return false;
        }
        let want = rule_blocks(desired);
        let have = rule_blocks(state);
        want.len() == have.len()
            && want.iter().zip(&have).all(|(w, h)| {
                self.rule_schema
                    .diff(w, h)
                    .iter()
                    .all(|c| c.attribute == PRIORITY)
            })
            && order_matches(&want, &have)
    }

    fn import(&self, id: &str) -> Result<ResourceData, ProvisionerError> {
        Ok(state_image(id, Vec::new()))
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let policy_id = desired.require_str(POLICY_ID)?;
            let declared = rule_blocks(desired);
            ctx.serialized(&policy_key(policy_id), async {
                let ids = self
                    .write_rules(ctx, policy_id, &declared, &BTreeMap::new(), false)
                    .await?;
                self.settle(ctx, policy_id, &declared, &ids).await
            })
            .await
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let policy_id = state.require_id()?;
            let listed: Vec<PolicyRule> = match ctx
                .list(ApiRequest::get(api_paths::policy_rules(policy_id)))
                .await
            {
                Ok(rules) => rules,
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            };
            let live = |r: &&PolicyRule| !r.is_tombstone();

            let tracked = rule_blocks(state);
            let blocks: Vec<Value> = if tracked.is_empty() {
                // Freshly imported: adopt every non-system rule.
                let mut rules: Vec<&PolicyRule> = listed
                    .iter()
                    .filter(live)
                    .filter(|r| r.system != Some(true))
                    .collect();
                priority::sort_by_priority(&mut rules, |r| r.priority);
                rules.into_iter().map(block).collect()
            } else {
                tracked
                    .iter()
                    .filter_map(|t| {
                        let id = t.get_str(ID)?;
                        listed
                            .iter()
                            .filter(live)
                            .find(|r| r.id.as_deref() == Some(id))
                    })
                    .map(block)
                    .collect()
            };
            Ok(Some(state_image(policy_id, blocks)))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let policy_id = prior.require_str(POLICY_ID)?;
            let declared = rule_blocks(desired);
            let tracked = rule_blocks(prior);
            let order_changed = !order_matches(&declared, &tracked);
            let existing: BTreeMap<String, ResourceData> = tracked
                .into_iter()
                .filter_map(|r| Some((r.get_str(NAME)?.to_string(), r)))
                .collect();

            ctx.serialized(&policy_key(policy_id), async {
                for (name, rule) in &existing {
                    if declared.iter().any(|d| d.get_str(NAME) == Some(name.as_str())) {
                        continue;
                    }
                    if let Some(id) = rule.get_str(ID) {
                        ctx.delete(&api_paths::policy_rule(policy_id, id)).await?;
                        tracing::info!(policy_id = %policy_id, rule_id = %id, name = %name, "rule removed");
                    }
                }
                let ids = self
                    .write_rules(ctx, policy_id, &declared, &existing, order_changed)
                    .await?;
                self.settle(ctx, policy_id, &declared, &ids).await
            })
            .await
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let policy_id = state.require_str(POLICY_ID)?;
            ctx.serialized(&policy_key(policy_id), async {
                for rule in rule_blocks(state) {
                    if let Some(id) = rule.get_str(ID) {
                        ctx.delete(&api_paths::policy_rule(policy_id, id)).await?;
                    }
                }
                priority::observe_siblings(ctx, SINGLE_RULE_TYPE, policy_id, None).await?;
                tracing::info!(policy_id = %policy_id, "policy rules deleted");
                Ok::<_, ProvisionerError>(())
            })
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(v: Value) -> ResourceData {
        let resource = PolicyRulesSignOn::new();
        let mut d = ResourceData::from_attributes(v.as_object().cloned().unwrap());
        resource.schema().apply_defaults(&mut d);
        d
    }

    fn rules_change() -> AttributeChange {
        AttributeChange {
            attribute: RULES.into(),
            before: Value::Null,
            after: Value::Null,
            force_new: false,
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = PolicyRulesSignOn::new()
            .validate(&data(json!({
                "policy_id": "p1",
                "rules": [{"name": "a", "priority": 1}, {"name": "a", "priority": 2}],
            })))
            .unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn shifted_numbers_with_same_order_are_suppressed() {
        let resource = PolicyRulesSignOn::new();
        let desired = data(json!({
            "policy_id": "p1",
            "rules": [{"name": "a", "priority": 1}, {"name": "b", "priority": 2}],
        }));
        let state = data(json!({
            "policy_id": "p1",
            "rules": [
                {"id": "r1", "name": "a", "priority": 2},
                {"id": "r2", "name": "b", "priority": 3},
            ],
        }));
        assert!(resource.suppress_diff(&rules_change(), &desired, &state));

        let swapped = data(json!({
            "policy_id": "p1",
            "rules": [
                {"id": "r1", "name": "a", "priority": 3},
                {"id": "r2", "name": "b", "priority": 2},
            ],
        }));
        assert!(!resource.suppress_diff(&rules_change(), &desired, &swapped));
    }

    #[test]
    fn field_change_is_not_suppressed() {
        let resource = PolicyRulesSignOn::new();
        let desired = data(json!({
            "policy_id": "p1",
            "rules": [{"name": "a", "priority": 1, "access": "DENY"}],
        }));
        let state = data(json!({
            "policy_id": "p1",
            "rules": [{"id": "r1", "name": "a", "priority": 1}],
        }));
        assert!(!resource.suppress_diff(&rules_change(), &desired, &state));
    }

    #[test]
    fn import_seeds_policy_only() {
        let seed = PolicyRulesSignOn::new().import("00p1").unwrap();
        assert_eq!(seed.id(), Some("00p1"));
        assert_eq!(seed.get_str(POLICY_ID), Some("00p1"));
        assert!(rule_blocks(&seed).is_empty());
    }
}
