//! `okta_user`
//!
//! Users move through a wider lifecycle than other entities. Transitions
//! are planned by `transition::plan_user`; `DEPROVISIONED` is a sink in
//! which only the status may change.

use std::collections::BTreeSet;

use oktaform_client::ApiRequest;
use oktaform_core::models::user::{RoleAssignment, TypeRef, User, UserProfile};
use oktaform_core::{AttrType, Attribute, LifecycleStatus, ResourceData, Schema, api_paths};
use serde_json::{Map, Value};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};
use crate::transition::{self, Transition};

use super::{STATUS, status_of};

const LOGIN: &str = "login";
const EMAIL: &str = "email";
const FIRST_NAME: &str = "first_name";
const LAST_NAME: &str = "last_name";
const DISPLAY_NAME: &str = "display_name";
const MOBILE_PHONE: &str = "mobile_phone";
const DEPARTMENT: &str = "department";
const TITLE: &str = "title";
const CUSTOM_PROFILE_ATTRIBUTES: &str = "custom_profile_attributes";
const USER_TYPE_ID: &str = "user_type_id";
const ADMIN_ROLES: &str = "admin_roles";

const USER_STATUSES: &[&str] = &["ACTIVE", "STAGED", "DEPROVISIONED", "SUSPENDED"];

pub struct UserResource {
    schema: Schema,
}

impl UserResource {
    pub fn new() -> Self {
        let schema = Schema::new()
            .attr(LOGIN, Attribute::required(AttrType::String))
            .attr(EMAIL, Attribute::required(AttrType::String))
            .attr(FIRST_NAME, Attribute::required(AttrType::String))
            .attr(LAST_NAME, Attribute::required(AttrType::String))
            .attr(DISPLAY_NAME, Attribute::optional(AttrType::String))
            .attr(MOBILE_PHONE, Attribute::optional(AttrType::String))
            .attr(DEPARTMENT, Attribute::optional(AttrType::String))
            .attr(TITLE, Attribute::optional(AttrType::String))
            .attr(
                CUSTOM_PROFILE_ATTRIBUTES,
                Attribute::optional(AttrType::String)
                    .describe("JSON object of custom profile attributes"),
            )
            .attr(
                USER_TYPE_ID,
                Attribute::optional_computed(AttrType::String).force_new(),
            )
            .attr(
                STATUS,
                Attribute::optional(AttrType::String)
                    .with_default("ACTIVE")
                    .one_of(USER_STATUSES),
            )
            .attr(
                ADMIN_ROLES,
                Attribute::computed(AttrType::string_set())
                    .describe("Admin roles assigned to the user; empty without permission to list them"),
            );
        Self { schema }
    }

    fn profile(&self, desired: &ResourceData) -> Result<UserProfile, ProvisionerError> {
        let text = |key| desired.get_str(key).map(String::from);
        Ok(UserProfile {
            login: desired.require_str(LOGIN)?.to_string(),
            email: desired.require_str(EMAIL)?.to_string(),
            first_name: desired.require_str(FIRST_NAME)?.to_string(),
            last_name: desired.require_str(LAST_NAME)?.to_string(),
            display_name: text(DISPLAY_NAME),
            mobile_phone: text(MOBILE_PHONE),
            department: text(DEPARTMENT),
            title: text(TITLE),
            custom: custom_attributes(desired)?.unwrap_or_default(),
        })
    }

    fn observed(&self, user: &User, prior: &ResourceData) -> ResourceData {
        let mut data = ResourceData::new();
        if let Some(id) = &user.id {
            data.set_id(id.clone());
        }
        let p = &user.profile;
        data.set(LOGIN, p.login.clone());
        data.set(EMAIL, p.email.clone());
        data.set(FIRST_NAME, p.first_name.clone());
        data.set(LAST_NAME, p.last_name.clone());
        data.set_opt(DISPLAY_NAME, p.display_name.clone());
        data.set_opt(MOBILE_PHONE, p.mobile_phone.clone());
        data.set_opt(DEPARTMENT, p.department.clone());
        data.set_opt(TITLE, p.title.clone());
        data.set_opt(STATUS, user.status.map(|s| s.settled().as_str()));
        data.set_opt(USER_TYPE_ID, user.user_type.as_ref().map(|t| t.id.clone()));

        // Only declared custom keys are tracked; the platform echoes every
        // schema attribute, mostly as null.
        let declared = custom_attributes(prior).ok().flatten();
        if let Some(declared) = declared {
            let observed: Map<String, Value> = declared
                .keys()
                .filter_map(|k| {
                    p.custom
                        .get(k)
                        .filter(|v| !v.is_null())
                        .map(|v| (k.clone(), v.clone()))
                })
                .collect();
            if observed == declared {
                data.carry_over(prior, &[CUSTOM_PROFILE_ATTRIBUTES]);
            } else if !observed.is_empty() {
                data.set(CUSTOM_PROFILE_ATTRIBUTES, Value::Object(observed).to_string());
            }
        }
        data.carry_over(prior, &[ADMIN_ROLES]);
        data
    }

    /// Admin roles are auxiliary: lacking permission to list them must not
    /// fail the user itself.
    async fn read_roles(
        &self,
        ctx: &OpContext,
        id: &str,
    ) -> Result<Option<BTreeSet<String>>, ProvisionerError> {
        match ctx
            .list::<RoleAssignment>(ApiRequest::get(api_paths::user_roles(id)))
            .await
        {
            Ok(roles) => Ok(Some(roles.into_iter().map(|r| r.kind).collect())),
            Err(e) if e.is_forbidden() => {
                tracing::warn!(user_id = %id, error = %e, "cannot list admin roles, skipping");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn transition(
        &self,
        ctx: &OpContext,
        id: &str,
        t: Transition,
    ) -> Result<(), ProvisionerError> {
        ctx.send(lifecycle(id)(t))
            .await
            .map(|_| ())
            .map_err(|e| e.prefixed(t.as_str()))
    }
}

impl Default for UserResource {
    fn default() -> Self {
        Self::new()
    }
}

fn custom_attributes(data: &ResourceData) -> Result<Option<Map<String, Value>>, ProvisionerError> {
    let Some(raw) = data.get_str(CUSTOM_PROFILE_ATTRIBUTES) else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        _ => Err(ProvisionerError::PreconditionViolated(format!(
            "\"{CUSTOM_PROFILE_ATTRIBUTES}\" must be a JSON object"
        ))),
    }
}

fn lifecycle(id: &str) -> impl Fn(Transition) -> ApiRequest + Send + Sync + '_ {
    move |t| {
        let request = ApiRequest::post(api_paths::user_lifecycle(id, t.as_str()));
        match t {
            Transition::Activate => request.query("sendEmail", false),
            _ => request,
        }
    }
}

impl Resource for UserResource {
    fn type_name(&self) -> &'static str {
        "okta_user"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        custom_attributes(desired).map(|_| ())
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let status = status_of(desired, LifecycleStatus::Active)?;
            let body = User {
                profile: self.profile(desired)?,
                user_type: desired.get_str(USER_TYPE_ID).map(|id| TypeRef { id: id.to_string() }),
                ..User::default()
            };
            let request = ApiRequest::post(api_paths::USERS)
                .query("activate", status != LifecycleStatus::Staged)
                .body(serde_json::to_value(&body)?);
            let mut user: User = ctx.send_json(request).await?;
            let id = user.id.clone().ok_or_else(|| {
                ProvisionerError::State("user create returned no ID".into())
            })?;
            tracing::info!(user_id = %id, login = %body.profile.login, "user created");

            let follow_up = match status {
                LifecycleStatus::Suspended => Some(Transition::Suspend),
                LifecycleStatus::Deprovisioned => Some(Transition::Deactivate),
                _ => None,
            };
            if let Some(t) = follow_up {
                self.transition(ctx, &id, t).await?;
                user.status = Some(status);
            }

            let mut observed = self.observed(&user, desired);
            if let Some(roles) = self.read_roles(ctx, &id).await? {
                observed.set_strings(ADMIN_ROLES, roles);
            }
            Ok(observed)
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let id = state.require_id()?;
            let Some(user) = ctx.get_opt::<User>(&api_paths::user(id)).await? else {
                return Ok(None);
            };
            let mut observed = self.observed(&user, state);
            if let Some(roles) = self.read_roles(ctx, id).await? {
                observed.set_strings(ADMIN_ROLES, roles);
            }
            Ok(Some(observed))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let id = prior.require_id()?;
            let from = status_of(prior, LifecycleStatus::Active)?;
            let to = status_of(desired, LifecycleStatus::Active)?;
            let changed = self.schema.has_changes_except(desired, prior, &[STATUS]);
            let plan = transition::plan_user(from, to, changed)?;

            let mutated = transition::execute(ctx, &plan, lifecycle(id), || async move {
                let body = User {
                    profile: self.profile(desired)?,
                    ..User::default()
                };
                let user: User = ctx.post_json(&api_paths::user(id), &body).await?;
                Ok::<_, ProvisionerError>(self.observed(&user, desired))
            })
            .await?;

            let mut observed = match mutated {
                Some(data) => data,
                None => {
                    let mut data = prior.clone();
                    data.carry_over(desired, &[CUSTOM_PROFILE_ATTRIBUTES]);
                    data
                }
            };
            observed.carry_over(prior, &[ADMIN_ROLES]);
            observed.set(STATUS, to.as_str());
            Ok(observed)
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let id = state.require_id()?;
            // The first DELETE only deprovisions; the second removes the user.
            if status_of(state, LifecycleStatus::Active)? != LifecycleStatus::Deprovisioned {
                match self.transition(ctx, id, Transition::Deactivate).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => return Ok(()),
                    Err(e) => return Err(e),
                }
            }
            ctx.delete(&api_paths::user(id)).await?;
            tracing::info!(user_id = %id, "user deleted");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(v: Value) -> ResourceData {
        ResourceData::from_attributes(v.as_object().cloned().unwrap())
    }

    #[test]
    fn only_declared_custom_attributes_are_tracked() {
        let resource = UserResource::new();
        let user: User = serde_json::from_value(json!({
            "id": "00u1",
            "status": "ACTIVE",
            "profile": {
                "login": "a@example.com",
                "email": "a@example.com",
                "firstName": "A",
                "lastName": "B",
                "nickName": "ab",
                "costCenter": null,
                "employeeNumber": "42",
            },
        }))
        .unwrap();
        let prior = data(json!({"custom_profile_attributes": "{\"nickName\": \"ab\"}"}));
        let observed = resource.observed(&user, &prior);
        assert_eq!(
            observed.get_str(CUSTOM_PROFILE_ATTRIBUTES),
            Some("{\"nickName\": \"ab\"}")
        );
        assert_eq!(observed.get_str(FIRST_NAME), Some("A"));
        assert_eq!(observed.get_str(STATUS), Some("ACTIVE"));
    }

    #[test]
    fn drifted_custom_attribute_is_reported() {
        let resource = UserResource::new();
        let user: User = serde_json::from_value(json!({
            "id": "00u1",
            "profile": {
                "login": "a", "email": "a", "firstName": "A", "lastName": "B",
                "nickName": "changed",
            },
        }))
        .unwrap();
        let prior = data(json!({"custom_profile_attributes": "{\"nickName\": \"ab\"}"}));
        let observed = resource.observed(&user, &prior);
        assert_eq!(
            observed.get_str(CUSTOM_PROFILE_ATTRIBUTES),
            Some("{\"nickName\":\"changed\"}")
        );
    }

    #[test]
    fn credential_states_are_recorded_as_active() {
        let resource = UserResource::new();
        for status in ["PROVISIONED", "RECOVERY", "LOCKED_OUT", "PASSWORD_EXPIRED"] {
            let user: User = serde_json::from_value(json!({
                "id": "00u1",
                "status": status,
                "profile": {"login": "a", "email": "a", "firstName": "A", "lastName": "B"},
            }))
            .unwrap();
            let observed = resource.observed(&user, &ResourceData::new());
            assert_eq!(observed.get_str(STATUS), Some("ACTIVE"), "{status}");
        }
    }

    #[test]
    fn activation_skips_welcome_email() {
        let request = lifecycle("00u1")(Transition::Activate);
        assert_eq!(request.path, "/api/v1/users/00u1/lifecycle/activate");
        assert_eq!(request.query, vec![("sendEmail".to_string(), "false".to_string())]);
    }
}
