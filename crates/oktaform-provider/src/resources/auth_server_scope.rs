//! `okta_auth_server_scope`: a scope on a custom authorization server.
//! Imported as `auth_server_id/id`.

use oktaform_core::models::auth_server_scope::OAuthScope;
use oktaform_core::{AttrType, Attribute, ResourceData, Schema, api_paths, import_id};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};

const AUTH_SERVER_ID: &str = "auth_server_id";
const NAME: &str = "name";
const DESCRIPTION: &str = "description";
const DISPLAY_NAME: &str = "display_name";
const CONSENT: &str = "consent";
const METADATA_PUBLISH: &str = "metadata_publish";
const DEFAULT: &str = "default";
const SYSTEM: &str = "system";

pub struct AuthServerScope {
    schema: Schema,
}

impl AuthServerScope {
    pub fn new() -> Self {
        let schema = Schema::new()
            .attr(AUTH_SERVER_ID, Attribute::required(AttrType::String).force_new())
            .attr(NAME, Attribute::required(AttrType::String))
            .attr(DESCRIPTION, Attribute::optional(AttrType::String))
            .attr(DISPLAY_NAME, Attribute::optional(AttrType::String))
            .attr(
                CONSENT,
                Attribute::optional(AttrType::String)
                    .with_default("IMPLICIT")
                    .one_of(&["REQUIRED", "IMPLICIT", "FLEXIBLE"]),
            )
            .attr(
                METADATA_PUBLISH,
                Attribute::optional(AttrType::String)
                    .with_default("NO_CLIENTS")
                    .one_of(&["ALL_CLIENTS", "NO_CLIENTS"]),
            )
            .attr(DEFAULT, Attribute::optional(AttrType::Bool).with_default(false))
            .attr(SYSTEM, Attribute::computed(AttrType::Bool));
        Self { schema }
    }

    fn wire(desired: &ResourceData) -> Result<OAuthScope, ProvisionerError> {
        let optional = |key| desired.get_str(key).map(String::from);
        Ok(OAuthScope {
            id: None,
            name: desired.require_str(NAME)?.to_string(),
            description: optional(DESCRIPTION),
            display_name: optional(DISPLAY_NAME),
            consent: optional(CONSENT),
            metadata_publish: optional(METADATA_PUBLISH),
            default: desired.get_bool(DEFAULT),
            system: None,
        })
    }

    fn observed(auth_server_id: &str, scope: &OAuthScope) -> ResourceData {
        let mut data = ResourceData::new();
        if let Some(id) = &scope.id {
            data.set_id(id.clone());
        }
        data.set(AUTH_SERVER_ID, auth_server_id);
        data.set(NAME, scope.name.clone());
        data.set_opt(DESCRIPTION, scope.description.clone());
        data.set_opt(DISPLAY_NAME, scope.display_name.clone());
        data.set_opt(CONSENT, scope.consent.clone());
        data.set_opt(METADATA_PUBLISH, scope.metadata_publish.clone());
        data.set(DEFAULT, scope.default.unwrap_or(false));
        data.set(SYSTEM, scope.system.unwrap_or(false));
        data
    }
}

impl Default for AuthServerScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for AuthServerScope {
    fn type_name(&self) -> &'static str {
        "okta_auth_server_scope"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn import(&self, id: &str) -> Result<ResourceData, ProvisionerError> {
        let parts = import_id::parse(id, &[AUTH_SERVER_ID, "id"])?;
        let mut data = ResourceData::with_id(parts[1]);
        data.set(AUTH_SERVER_ID, parts[0]);
        Ok(data)
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let server = desired.require_str(AUTH_SERVER_ID)?;
            let created: OAuthScope = ctx
                .post_json(&api_paths::auth_server_scopes(server), &Self::wire(desired)?)
                .await?;
            tracing::info!(auth_server_id = %server, scope = %created.name, "scope created");
            Ok(Self::observed(server, &created))
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let server = state.require_str(AUTH_SERVER_ID)?;
            let found: Option<OAuthScope> = ctx
                .get_opt(&api_paths::auth_server_scope(server, state.require_id()?))
                .await?;
            Ok(found.map(|scope| Self::observed(server, &scope)))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let server = prior.require_str(AUTH_SERVER_ID)?;
            let updated: OAuthScope = ctx
                .put_json(
                    &api_paths::auth_server_scope(server, prior.require_id()?),
                    &Self::wire(desired)?,
                )
                .await?;
            Ok(Self::observed(server, &updated))
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let id = state.require_id()?;
            if state.get_bool(SYSTEM) == Some(true) {
                tracing::info!(scope_id = %id, "system scope cannot be deleted, dropping from state only");
                return Ok(());
            }
            let server = state.require_str(AUTH_SERVER_ID)?;
            ctx.delete(&api_paths::auth_server_scope(server, id)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_splits_server_and_scope() {
        let seed = AuthServerScope::new().import("aus1/scp2").unwrap();
        assert_eq!(seed.id(), Some("scp2"));
        assert_eq!(seed.get_str(AUTH_SERVER_ID), Some("aus1"));
    }

    #[test]
    fn import_rejects_wrong_arity() {
        let err = AuthServerScope::new().import("aus1/scp2/extra").unwrap_err();
        assert_eq!(
            err.to_string(),
            "precondition violated: invalid import ID \"aus1/scp2/extra\": expected format \"auth_server_id/id\""
        );
    }
}
