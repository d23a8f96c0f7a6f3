//! `okta_policy_rule_signon`: one rule of a sign-on policy.
//!
//! Every mutation holds the policy's arbiter lock, then re-lists the
//! policy so sibling priorities shifted by the server land in state.
//! State keeps the priority the user wrote (`declared_priority`) next to
//! the one the server assigned; a difference between the two is not
//! drift while the declaration is unchanged.
//!
//! The rule field mapping here is shared with `policy_rules_signon`.

use oktaform_client::ApiRequest;
use oktaform_core::models::policy_rule::{
    NetworkCondition, PolicyRule, RuleActions, RuleConditions, SessionAction, SignOnAction,
};
use oktaform_core::{
    AttrType, Attribute, AttributeChange, LifecycleStatus, ResourceData, Schema, api_paths,
    import_id,
};

use crate::arbiter;
use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::priority::{self, PRIORITY};
use crate::resource::{OpResult, Resource};
use crate::transition::Transition;

use super::{STATUS, binary_status, status_of, update_binary};

pub(super) const NAME: &str = "name";
const ACCESS: &str = "access";
const MFA_REQUIRED: &str = "mfa_required";
const MFA_LIFETIME: &str = "mfa_lifetime";
const SESSION_IDLE: &str = "session_idle";
const SESSION_LIFETIME: &str = "session_lifetime";
const SESSION_PERSISTENT: &str = "session_persistent";
const NETWORK_CONNECTION: &str = "network_connection";
const NETWORK_INCLUDES: &str = "network_includes";
const NETWORK_EXCLUDES: &str = "network_excludes";

pub(super) const POLICY_ID: &str = "policy_id";
const DECLARED_PRIORITY: &str = "declared_priority";
pub(super) const SYSTEM: &str = "system";

const ZONE: &str = "ZONE";

/// Arbiter key for everything that mutates the rules of one policy.
pub(super) fn policy_key(policy_id: &str) -> String {
    arbiter::parent_key("policy", policy_id)
}

pub(super) fn lifecycle<'a>(
    policy_id: &'a str,
    id: &'a str,
) -> impl Fn(Transition) -> ApiRequest + Send + Sync + 'a {
    move |t| ApiRequest::post(api_paths::policy_rule_lifecycle(policy_id, id, t.as_str()))
}

// ── Shared rule mapping ──────────────────────────────────────

/// Attributes of one sign-on rule, added to `schema`.
pub(super) fn rule_attributes(schema: Schema) -> Schema {
    let int = || Attribute::optional_computed(AttrType::Int);
    schema
        .attr(NAME, Attribute::required(AttrType::String))
        .attr(PRIORITY, int().describe("1 is evaluated first"))
        .attr(STATUS, binary_status())
        .attr(
            ACCESS,
            Attribute::optional(AttrType::String)
                .with_default("ALLOW")
                .one_of(&["ALLOW", "DENY"]),
        )
        .attr(MFA_REQUIRED, Attribute::optional(AttrType::Bool).with_default(false))
        .attr(MFA_LIFETIME, int().describe("Minutes before MFA is prompted again"))
        .attr(SESSION_IDLE, int().describe("Minutes"))
        .attr(SESSION_LIFETIME, int().describe("Minutes, 0 for unlimited"))
        .attr(SESSION_PERSISTENT, Attribute::optional(AttrType::Bool).with_default(false))
        .attr(
            NETWORK_CONNECTION,
            Attribute::optional(AttrType::String)
                .with_default("ANYWHERE")
                .one_of(&["ANYWHERE", ZONE, "ON_NETWORK", "OFF_NETWORK"]),
        )
        .attr(NETWORK_INCLUDES, Attribute::optional(AttrType::string_set()))
        .attr(NETWORK_EXCLUDES, Attribute::optional(AttrType::string_set()))
}

pub(super) fn validate_rule(rule: &ResourceData) -> Result<(), ProvisionerError> {
    let zoned = rule.get_str(NETWORK_CONNECTION) == Some(ZONE);
    let has_zones = rule.has(NETWORK_INCLUDES) || rule.has(NETWORK_EXCLUDES);
    if zoned && !has_zones {
        return Err(ProvisionerError::PreconditionViolated(
            "network_connection ZONE requires network_includes or network_excludes".into(),
        ));
    }
    if !zoned && has_zones {
        return Err(ProvisionerError::PreconditionViolated(
            "network_includes and network_excludes require network_connection ZONE".into(),
        ));
    }
    if rule.has(MFA_LIFETIME) && rule.get_bool(MFA_REQUIRED) != Some(true) {
        return Err(ProvisionerError::PreconditionViolated(
            "mfa_lifetime requires mfa_required".into(),
        ));
    }
    if let Some(p) = rule.get_i64(PRIORITY).filter(|p| *p < 1) {
        return Err(ProvisionerError::PreconditionViolated(format!(
            "priority must be at least 1, got {p}"
        )));
    }
    Ok(())
}

pub(super) fn rule_wire(rule: &ResourceData) -> Result<PolicyRule, ProvisionerError> {
    let network = NetworkCondition {
        connection: rule.get_str(NETWORK_CONNECTION).unwrap_or("ANYWHERE").to_string(),
        include: rule.get_string_set(NETWORK_INCLUDES).into_iter().collect(),
        exclude: rule.get_string_set(NETWORK_EXCLUDES).into_iter().collect(),
    };
    let signon = SignOnAction {
        access: rule.get_str(ACCESS).unwrap_or("ALLOW").to_string(),
        require_factor: rule.get_bool(MFA_REQUIRED).unwrap_or(false),
        factor_lifetime: rule.get_i64(MFA_LIFETIME),
        session: SessionAction {
            max_session_idle_minutes: rule.get_i64(SESSION_IDLE),
            max_session_lifetime_minutes: rule.get_i64(SESSION_LIFETIME),
            use_persistent_cookie: rule.get_bool(SESSION_PERSISTENT).unwrap_or(false),
        },
    };
    Ok(PolicyRule {
        id: None,
        name: rule.require_str(NAME)?.to_string(),
        kind: "SIGN_ON".to_string(),
        priority: rule.get_i64(PRIORITY),
        status: None,
        system: None,
        conditions: Some(RuleConditions {
            network: Some(network),
        }),
        actions: Some(RuleActions { signon }),
    })
}

/// Write every rule attribute the server reports into `data`.
pub(super) fn observe_rule(rule: &PolicyRule, data: &mut ResourceData) {
    if let Some(id) = &rule.id {
        data.set_id(id.clone());
    }
    data.set(NAME, rule.name.clone());
    data.set_opt(PRIORITY, rule.priority);
    data.set_opt(STATUS, rule.status.map(|s| s.as_str()));

    let network = rule.conditions.as_ref().and_then(|c| c.network.as_ref());
    data.set(
        NETWORK_CONNECTION,
        network.map_or("ANYWHERE", |n| n.connection.as_str()),
    );
    data.clear(NETWORK_INCLUDES);
    data.clear(NETWORK_EXCLUDES);
    if let Some(n) = network {
        if !n.include.is_empty() {
            data.set_strings(NETWORK_INCLUDES, n.include.iter().cloned());
        }
        if !n.exclude.is_empty() {
            data.set_strings(NETWORK_EXCLUDES, n.exclude.iter().cloned());
        }
    }

    if let Some(actions) = &rule.actions {
        let signon = &actions.signon;
        data.set(ACCESS, signon.access.clone());
        data.set(MFA_REQUIRED, signon.require_factor);
        data.set_opt(MFA_LIFETIME, signon.factor_lifetime);
        data.set_opt(SESSION_IDLE, signon.session.max_session_idle_minutes);
        data.set_opt(SESSION_LIFETIME, signon.session.max_session_lifetime_minutes);
        data.set(SESSION_PERSISTENT, signon.session.use_persistent_cookie);
    }
}

// ── Resource ─────────────────────────────────────────────────

pub struct PolicyRuleSignOn {
    schema: Schema,
}

impl PolicyRuleSignOn {
    pub fn new() -> Self {
        let schema = rule_attributes(
            Schema::new().attr(POLICY_ID, Attribute::required(AttrType::String).force_new()),
        )
        .attr(
            DECLARED_PRIORITY,
            Attribute::computed(AttrType::Int).describe("Priority as last written"),
        )
        .attr(SYSTEM, Attribute::computed(AttrType::Bool));
        Self { schema }
    }

    fn observed(&self, policy_id: &str, rule: &PolicyRule, prior: &ResourceData) -> ResourceData {
        let mut data = ResourceData::new();
        data.set(POLICY_ID, policy_id);
        observe_rule(rule, &mut data);
        data.set(SYSTEM, rule.system.unwrap_or(false));
        data.carry_over(prior, &[DECLARED_PRIORITY]);
        if !data.has(DECLARED_PRIORITY) {
            data.set_opt(DECLARED_PRIORITY, rule.priority);
        }
        data
    }
}

impl Default for PolicyRuleSignOn {
    fn default() -> Self {
        Self::new()
    }
}

/// The declaration to write on update. A priority the user has not
/// changed since the last write keeps the server's current number, so
/// editing another field never moves the rule.
fn effective_desired(desired: &ResourceData, prior: &ResourceData) -> ResourceData {
    let mut effective = desired.clone();
    if priority_unchanged(desired, prior) {
        effective.set_opt(PRIORITY, prior.get_i64(PRIORITY));
    }
    effective
}

fn priority_unchanged(desired: &ResourceData, state: &ResourceData) -> bool {
    match desired.get_i64(PRIORITY) {
        Some(p) => state.get_i64(DECLARED_PRIORITY) == Some(p),
        None => true,
    }
}

impl Resource for PolicyRuleSignOn {
    fn type_name(&self) -> &'static str {
        "okta_policy_rule_signon"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        validate_rule(desired)
    }

    fn suppress_diff(
        &self,
        change: &AttributeChange,
        desired: &ResourceData,
        state: &ResourceData,
    ) -> bool {
        change.attribute == PRIORITY && priority_unchanged(desired, state)
    }

    fn import(&self, id: &str) -> Result<ResourceData, ProvisionerError> {
        let parts = import_id::parse(id, &[POLICY_ID, "id"])?;
        let mut data = ResourceData::with_id(parts[1]);
        data.set(POLICY_ID, parts[0]);
        Ok(data)
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let policy_id = desired.require_str(POLICY_ID)?;
            ctx.serialized(&policy_key(policy_id), async {
                let created: PolicyRule = ctx
                    .post_json(&api_paths::policy_rules(policy_id), &rule_wire(desired)?)
                    .await?;
                let id = created
                    .id
                    .clone()
                    .ok_or_else(|| ProvisionerError::Unknown("rule created without an id".into()))?;
                tracing::info!(
                    policy_id = %policy_id,
                    rule_id = %id,
                    priority = ?created.priority,
                    "policy rule created"
                );

                let status = status_of(desired, LifecycleStatus::Active)?;
                if status == LifecycleStatus::Inactive && created.status != Some(status) {
                    ctx.send(lifecycle(policy_id, &id)(Transition::Deactivate))
                        .await
                        .map_err(|e| e.prefixed("deactivate"))?;
                }

                let siblings =
                    priority::observe_siblings(ctx, self.type_name(), policy_id, Some(&id)).await?;
                let current = siblings
                    .iter()
                    .find(|r| r.id.as_deref() == Some(id.as_str()))
                    .unwrap_or(&created);
                let mut observed = self.observed(policy_id, current, desired);
                observed.set(STATUS, status.as_str());
                observed.set_opt(DECLARED_PRIORITY, desired.get_i64(PRIORITY).or(current.priority));
                Ok::<_, ProvisionerError>(observed)
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
            let policy_id = state.require_str(POLICY_ID)?;
            let id = state.require_id()?;
            let found: Option<PolicyRule> =
                ctx.get_opt(&api_paths::policy_rule(policy_id, id)).await?;
            match found {
                Some(rule) if rule.is_tombstone() => {
                    tracing::debug!(rule_id = %id, "rule reads back as a tombstone");
                    Ok(None)
                }
                Some(rule) => Ok(Some(self.observed(policy_id, &rule, state))),
                None => Ok(None),
            }
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
            let id = prior.require_id()?;
            let effective = effective_desired(desired, prior);
            ctx.serialized(&policy_key(policy_id), async {
                let effective = &effective;
                let mut observed = update_binary(
                    ctx,
                    &self.schema,
                    effective,
                    prior,
                    lifecycle(policy_id, id),
                    || async move {
                        let updated: PolicyRule = ctx
                            .put_json(&api_paths::policy_rule(policy_id, id), &rule_wire(effective)?)
                            .await?;
                        Ok::<_, ProvisionerError>(self.observed(policy_id, &updated, prior))
                    },
                )
                .await?;

                let siblings =
                    priority::observe_siblings(ctx, self.type_name(), policy_id, Some(id)).await?;
                if let Some(current) = siblings.iter().find(|r| r.id.as_deref() == Some(id)) {
                    observed.set_opt(PRIORITY, current.priority);
                }
                let declared = desired
                    .get_i64(PRIORITY)
                    .or_else(|| prior.get_i64(DECLARED_PRIORITY));
                observed.set_opt(DECLARED_PRIORITY, declared);
                tracing::info!(policy_id = %policy_id, rule_id = %id, "policy rule updated");
                Ok::<_, ProvisionerError>(observed)
            })
            .await
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let id = state.require_id()?;
            if state.get_bool(SYSTEM) == Some(true) {
                tracing::info!(rule_id = %id, "system rule cannot be deleted, dropping from state only");
                return Ok(());
            }
            let policy_id = state.require_str(POLICY_ID)?;
            ctx.serialized(&policy_key(policy_id), async {
                ctx.delete(&api_paths::policy_rule(policy_id, id)).await?;
                priority::observe_siblings(ctx, self.type_name(), policy_id, None).await?;
                tracing::info!(policy_id = %policy_id, rule_id = %id, "policy rule deleted");
                Ok::<_, ProvisionerError>(())
            })
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn data(v: Value) -> ResourceData {
        ResourceData::from_attributes(v.as_object().cloned().unwrap())
    }

    #[test]
    fn server_shift_is_not_drift() {
        let resource = PolicyRuleSignOn::new();
        let desired = data(json!({"policy_id": "p1", "name": "r", "priority": 1}));
        let state = data(json!({"policy_id": "p1", "name": "r", "priority": 2, "declared_priority": 1}));
        let change = AttributeChange {
            attribute: PRIORITY.into(),
            before: json!(2),
            after: json!(1),
            force_new: false,
        };
        assert!(resource.suppress_diff(&change, &desired, &state));

        let moved = data(json!({"policy_id": "p1", "name": "r", "priority": 4}));
        assert!(!resource.suppress_diff(&change, &moved, &state));
    }

    #[test]
    fn unchanged_priority_keeps_server_position() {
        let desired = data(json!({"name": "r", "priority": 1, "access": "DENY"}));
        let prior = data(json!({"name": "r", "priority": 3, "declared_priority": 1}));
        assert_eq!(effective_desired(&desired, &prior).get_i64(PRIORITY), Some(3));

        let moved = data(json!({"name": "r", "priority": 2}));
        assert_eq!(effective_desired(&moved, &prior).get_i64(PRIORITY), Some(2));
    }

    #[test]
    fn zone_connection_needs_zones() {
        let err = validate_rule(&data(json!({"name": "r", "network_connection": "ZONE"}))).unwrap_err();
        assert!(matches!(err, ProvisionerError::PreconditionViolated(_)));
        validate_rule(&data(json!({
            "name": "r", "network_connection": "ZONE", "network_includes": ["nzo1"],
        })))
        .unwrap();
        assert!(validate_rule(&data(json!({"name": "r", "network_excludes": ["nzo1"]}))).is_err());
    }

    #[test]
    fn observed_rule_matches_declaration() {
        let resource = PolicyRuleSignOn::new();
        let mut desired = data(json!({
            "policy_id": "p1", "name": "office", "priority": 2, "mfa_required": true,
            "mfa_lifetime": 60, "network_connection": "ZONE", "network_includes": ["nzo1"],
        }));
        resource.schema().apply_defaults(&mut desired);
        let mut wire = serde_json::to_value(rule_wire(&desired).unwrap()).unwrap();
        wire["id"] = json!("rul1");
        wire["status"] = json!("ACTIVE");
        let rule: PolicyRule = serde_json::from_value(wire).unwrap();

        let observed = resource.observed("p1", &rule, &ResourceData::new());
        assert!(resource.schema().diff(&desired, &observed).is_empty());
        assert_eq!(observed.get_i64(DECLARED_PRIORITY), Some(2));
    }

    #[test]
    fn import_takes_policy_and_rule() {
        let seed = PolicyRuleSignOn::new().import("00p1/0pr2").unwrap();
        assert_eq!(seed.id(), Some("0pr2"));
        assert_eq!(seed.get_str(POLICY_ID), Some("00p1"));
    }
}
