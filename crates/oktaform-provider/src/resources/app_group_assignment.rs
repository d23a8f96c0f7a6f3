//! `okta_app_group_assignment`: assigns a group to an app.

use oktaform_core::models::app::GroupAssignment;
use oktaform_core::{AttrType, Attribute, ResourceData, Schema, api_paths, import_id};
use serde_json::Value;

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};

const APP_ID: &str = "app_id";
const GROUP_ID: &str = "group_id";
const PRIORITY: &str = "priority";
const PROFILE: &str = "profile";

const IMPORT_FIELDS: &[&str] = &[APP_ID, GROUP_ID];

pub struct AppGroupAssignment {
    schema: Schema,
}

impl AppGroupAssignment {
    pub fn new() -> Self {
        let schema = Schema::new()
            .attr(APP_ID, Attribute::required(AttrType::String).force_new())
            .attr(GROUP_ID, Attribute::required(AttrType::String).force_new())
            .attr(PRIORITY, Attribute::optional_computed(AttrType::Int))
            .attr(
                PROFILE,
                Attribute::optional(AttrType::String).describe("JSON app profile for the group"),
            );
        Self { schema }
    }

    fn observed(
        app_id: &str,
        group_id: &str,
        assignment: &GroupAssignment,
        prior: &ResourceData,
    ) -> ResourceData {
        let mut data = ResourceData::with_id(import_id::join(&[app_id, group_id]));
        data.set(APP_ID, app_id);
        data.set(GROUP_ID, group_id);
        data.set_opt(PRIORITY, assignment.priority);

        let empty = match &assignment.profile {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if !empty {
            // Keep the declared formatting when it decodes to the same JSON.
            let declared = prior
                .get_str(PROFILE)
                .filter(|raw| serde_json::from_str::<Value>(raw).ok().as_ref() == Some(&assignment.profile));
            match declared {
                Some(raw) => data.set(PROFILE, raw),
                None => data.set(PROFILE, assignment.profile.to_string()),
            }
        }
        data
    }

    async fn put(
        &self,
        ctx: &OpContext,
        desired: &ResourceData,
    ) -> Result<ResourceData, ProvisionerError> {
        let app_id = desired.require_str(APP_ID)?;
        let group_id = desired.require_str(GROUP_ID)?;
        let profile = match desired.get_str(PROFILE) {
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                ProvisionerError::PreconditionViolated(format!("\"{PROFILE}\" is not valid JSON: {e}"))
            })?,
            None => Value::Null,
        };
        let body = GroupAssignment {
            id: None,
            priority: desired.get_i64(PRIORITY),
            profile,
        };
        let assignment: GroupAssignment = ctx
            .put_json(&api_paths::app_group(app_id, group_id), &body)
            .await?;
        Ok(Self::observed(app_id, group_id, &assignment, desired))
    }
}

impl Default for AppGroupAssignment {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for AppGroupAssignment {
    fn type_name(&self) -> &'static str {
        "okta_app_group_assignment"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        if let Some(raw) = desired.get_str(PROFILE) {
            serde_json::from_str::<Value>(raw).map_err(|e| {
                ProvisionerError::PreconditionViolated(format!("\"{PROFILE}\" is not valid JSON: {e}"))
            })?;
        }
        Ok(())
    }

    fn import(&self, id: &str) -> Result<ResourceData, ProvisionerError> {
        let parts = import_id::parse(id, IMPORT_FIELDS)?;
        let mut data = ResourceData::with_id(id);
        data.set(APP_ID, parts[0]);
        data.set(GROUP_ID, parts[1]);
        Ok(data)
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let observed = self.put(ctx, desired).await?;
            tracing::info!(
                app_id = desired.get_str(APP_ID).unwrap_or_default(),
                group_id = desired.get_str(GROUP_ID).unwrap_or_default(),
                "group assigned to app"
            );
            Ok(observed)
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let app_id = state.require_str(APP_ID)?;
            let group_id = state.require_str(GROUP_ID)?;
            let assignment: Option<GroupAssignment> =
                ctx.get_opt(&api_paths::app_group(app_id, group_id)).await?;
            Ok(assignment.map(|a| Self::observed(app_id, group_id, &a, state)))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        _prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(self.put(ctx, desired))
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let app_id = state.require_str(APP_ID)?;
            let group_id = state.require_str(GROUP_ID)?;
            ctx.delete(&api_paths::app_group(app_id, group_id)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn import_splits_compound_id() {
        let data = AppGroupAssignment::new().import("0oa1/00g2").unwrap();
        assert_eq!(data.id(), Some("0oa1/00g2"));
        assert_eq!(data.get_str(APP_ID), Some("0oa1"));
        assert_eq!(data.get_str(GROUP_ID), Some("00g2"));
    }

    #[test]
    fn import_with_wrong_arity_names_format() {
        let err = AppGroupAssignment::new().import("0oa1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "precondition violated: invalid import ID \"0oa1\": expected format \"app_id/group_id\""
        );
    }

    #[test]
    fn empty_profile_is_not_recorded() {
        let assignment: GroupAssignment =
            serde_json::from_value(json!({"id": "00g2", "priority": 1, "profile": {}})).unwrap();
        let data = AppGroupAssignment::observed("0oa1", "00g2", &assignment, &ResourceData::new());
        assert!(!data.has(PROFILE));
        assert_eq!(data.get_i64(PRIORITY), Some(1));
    }
}
