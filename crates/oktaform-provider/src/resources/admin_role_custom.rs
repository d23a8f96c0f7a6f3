//! `okta_admin_role_custom`
//!
//! Permissions are sent in full on create and then managed one at a
//! time. Reads collapse the children the platform adds for workflow
//! permissions back to the declared form.

use std::collections::BTreeSet;

use oktaform_core::models::admin_role::{CustomRole, PermissionList};
use oktaform_core::{AttrType, Attribute, ResourceData, Schema, api_paths, permissions};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};

const LABEL: &str = "label";
const DESCRIPTION: &str = "description";
const PERMISSIONS: &str = "permissions";

pub struct AdminRoleCustom {
    schema: Schema,
}

impl AdminRoleCustom {
    pub fn new() -> Self {
        let schema = Schema::new()
            .attr(LABEL, Attribute::required(AttrType::String))
            .attr(DESCRIPTION, Attribute::required(AttrType::String))
            .attr(
                PERMISSIONS,
                Attribute::required(AttrType::string_set())
                    .describe("Dotted permission identifiers, e.g. okta.users.read"),
            );
        Self { schema }
    }

    fn observed(role: &CustomRole, granted: &PermissionList) -> ResourceData {
        let mut data = ResourceData::new();
        if let Some(id) = &role.id {
            data.set_id(id.clone());
        }
        data.set(LABEL, role.label.clone());
        data.set(DESCRIPTION, role.description.clone());
        data.set_strings(
            PERMISSIONS,
            permissions::normalize(granted.permissions.iter().map(|p| p.label.clone())),
        );
        data
    }

    async fn fetch(ctx: &OpContext, id: &str) -> Result<Option<ResourceData>, ProvisionerError> {
        let Some(role) = ctx.get_opt::<CustomRole>(&api_paths::admin_role(id)).await? else {
            return Ok(None);
        };
        let granted: PermissionList = ctx.get_json(&api_paths::admin_role_permissions(id)).await?;
        Ok(Some(Self::observed(&role, &granted)))
    }
}

impl Default for AdminRoleCustom {
    fn default() -> Self {
        Self::new()
    }
}

/// Grants and revocations that turn `current` into `desired`. A revoked
/// parent takes the children the platform implied for it.
fn permission_changes(
    current: &BTreeSet<String>,
    desired: &BTreeSet<String>,
) -> (Vec<String>, Vec<String>) {
    let grant = desired.difference(current).cloned().collect();
    let mut revoke: Vec<String> = Vec::new();
    for removed in current.difference(desired) {
        revoke.push(removed.clone());
        revoke.extend(
            permissions::implied_by(removed)
                .filter(|child| !desired.contains(*child))
                .map(String::from),
        );
    }
    (grant, revoke)
}

impl Resource for AdminRoleCustom {
    fn type_name(&self) -> &'static str {
        "okta_admin_role_custom"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let body = CustomRole {
                id: None,
                label: desired.require_str(LABEL)?.to_string(),
                description: desired.require_str(DESCRIPTION)?.to_string(),
                permissions: desired.get_string_set(PERMISSIONS).into_iter().collect(),
            };
            let created: CustomRole = ctx.post_json(api_paths::ADMIN_ROLES, &body).await?;
            let id = created.id.clone().ok_or_else(|| {
                ProvisionerError::Unknown("role created without an id".into())
            })?;
            tracing::info!(role_id = %id, label = %created.label, "custom admin role created");
            Self::fetch(ctx, &id)
                .await?
                .ok_or_else(|| ProvisionerError::NotFound(format!("custom role {id}")))
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move { Self::fetch(ctx, state.require_id()?).await })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let id = prior.require_id()?;
            let relabelled = self.schema.has_changes_except(desired, prior, &[PERMISSIONS]);
            let role: CustomRole = if relabelled {
                let body = CustomRole {
                    id: None,
                    label: desired.require_str(LABEL)?.to_string(),
                    description: desired.require_str(DESCRIPTION)?.to_string(),
                    permissions: Vec::new(),
                };
                ctx.put_json(&api_paths::admin_role(id), &body).await?
            } else {
                ctx.get_opt(&api_paths::admin_role(id))
                    .await?
                    .ok_or_else(|| ProvisionerError::NotFound(format!("custom role {id}")))?
            };

            let (grant, revoke) = permission_changes(
                &prior.get_string_set(PERMISSIONS),
                &desired.get_string_set(PERMISSIONS),
            );
            for permission in &grant {
                ctx.post_empty(&api_paths::admin_role_permission(id, permission))
                    .await
                    .map_err(|e| e.prefixed(&format!("grant {permission}")))?;
            }
            for permission in &revoke {
                ctx.delete(&api_paths::admin_role_permission(id, permission))
                    .await
                    .map_err(|e| e.prefixed(&format!("revoke {permission}")))?;
            }
            tracing::info!(
                role_id = %id,
                granted = grant.len(),
                revoked = revoke.len(),
                "custom admin role updated"
            );

            let granted: PermissionList =
                ctx.get_json(&api_paths::admin_role_permissions(id)).await?;
            Ok(Self::observed(&role, &granted))
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move { ctx.delete(&api_paths::admin_role(state.require_id()?)).await })
    }
}
