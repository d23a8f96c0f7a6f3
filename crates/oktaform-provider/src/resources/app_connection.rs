//! `okta_app_connection`: the default provisioning connection of an app.
//!
//! The connection profile is a union on `auth_scheme`: `TOKEN` carries a
//! bearer token, `OAUTH2` a client ID. Status is `ENABLED`/`DISABLED` and
//! moves through the connection's own lifecycle endpoints.

use oktaform_client::ApiRequest;
use oktaform_core::models::app_connection::{
    ConnectionProfile, ConnectionRequest, ProvisioningConnection,
};
use oktaform_core::{AttrType, Attribute, LifecycleStatus, ResourceData, Schema, api_paths};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};
use crate::transition::{self, Transition};

use super::STATUS;

const APP_ID: &str = "app_id";
const BASE_URL: &str = "base_url";
const AUTH_SCHEME: &str = "auth_scheme";
const TOKEN: &str = "token";
const CLIENT_ID: &str = "client_id";

const ENABLED: &str = "ENABLED";
const DISABLED: &str = "DISABLED";

pub struct AppConnection {
    schema: Schema,
}

impl AppConnection {
    pub fn new() -> Self {
        let schema = Schema::new()
            .attr(APP_ID, Attribute::required(AttrType::String).force_new())
            .attr(BASE_URL, Attribute::optional(AttrType::String))
            .attr(
                AUTH_SCHEME,
                Attribute::required(AttrType::String).one_of(&["TOKEN", "OAUTH2"]),
            )
            .attr(TOKEN, Attribute::optional(AttrType::String).sensitive())
            .attr(CLIENT_ID, Attribute::optional(AttrType::String))
            .attr(
                STATUS,
                Attribute::optional(AttrType::String)
                    .with_default(ENABLED)
                    .one_of(&[ENABLED, DISABLED]),
            );
        Self { schema }
    }

    fn profile(&self, desired: &ResourceData) -> Result<ConnectionProfile, ProvisionerError> {
        let text = |key| desired.get_str(key).map(String::from);
        match desired.require_str(AUTH_SCHEME)? {
            "TOKEN" => Ok(ConnectionProfile::Token { token: text(TOKEN) }),
            "OAUTH2" => Ok(ConnectionProfile::OAuth2 {
                client_id: text(CLIENT_ID),
            }),
            other => Err(ProvisionerError::PreconditionViolated(format!(
                "unsupported auth_scheme \"{other}\""
            ))),
        }
    }

    fn observed(&self, app_id: &str, conn: &ProvisioningConnection, prior: &ResourceData) -> ResourceData {
        let mut data = ResourceData::with_id(app_id);
        data.set(APP_ID, app_id);
        data.set(AUTH_SCHEME, conn.auth_scheme.clone());
        data.set_opt(BASE_URL, conn.base_url.clone());
        data.set(STATUS, conn.status.clone());
        match &conn.profile {
            Some(ConnectionProfile::OAuth2 { client_id }) => {
                data.set_opt(CLIENT_ID, client_id.clone());
            }
            Some(ConnectionProfile::Token { .. }) | None => {}
        }
        // The token is write-only.
        if conn.auth_scheme == "TOKEN" {
            data.carry_over(prior, &[TOKEN]);
        }
        data
    }

    async fn write(
        &self,
        ctx: &OpContext,
        app_id: &str,
        desired: &ResourceData,
        activate: bool,
    ) -> Result<ResourceData, ProvisionerError> {
        let body = ConnectionRequest {
            base_url: desired.get_str(BASE_URL).map(String::from),
            profile: self.profile(desired)?,
        };
        let request = ApiRequest::post(api_paths::app_connection(app_id))
            .query("activate", activate)
            .body(serde_json::to_value(&body)?);
        let conn: ProvisioningConnection = ctx.send_json(request).await?;
        Ok(self.observed(app_id, &conn, desired))
    }
}

impl Default for AppConnection {
    fn default() -> Self {
        Self::new()
    }
}

fn lifecycle_status(data: &ResourceData) -> LifecycleStatus {
    match data.get_str(STATUS) {
        Some(DISABLED) => LifecycleStatus::Inactive,
        _ => LifecycleStatus::Active,
    }
}

impl Resource for AppConnection {
    fn type_name(&self) -> &'static str {
        "okta_app_connection"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        let (needs, forbids) = match desired.get_str(AUTH_SCHEME) {
            Some("TOKEN") => (TOKEN, CLIENT_ID),
            Some("OAUTH2") => (CLIENT_ID, TOKEN),
            _ => return Ok(()),
        };
        let scheme = desired.get_str(AUTH_SCHEME).unwrap_or_default();
        if !desired.has(needs) {
            return Err(ProvisionerError::PreconditionViolated(format!(
                "auth_scheme {scheme} requires \"{needs}\""
            )));
        }
        if desired.has(forbids) {
            return Err(ProvisionerError::PreconditionViolated(format!(
                "\"{forbids}\" is not valid with auth_scheme {scheme}"
            )));
        }
        Ok(())
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let app_id = desired.require_str(APP_ID)?;
            let activate = lifecycle_status(desired) == LifecycleStatus::Active;
            let observed = self.write(ctx, app_id, desired, activate).await?;
            tracing::info!(app_id = %app_id, "provisioning connection configured");
            Ok(observed)
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let app_id = state.require_id()?;
            let conn: Option<ProvisioningConnection> =
                ctx.get_opt(&api_paths::app_connection(app_id)).await?;
            Ok(conn.map(|c| self.observed(app_id, &c, state)))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let app_id = prior.require_id()?;
            let from = lifecycle_status(prior);
            let to = lifecycle_status(desired);
            let changed = self.schema.has_changes_except(desired, prior, &[STATUS]);
            let plan = transition::plan_binary(from, to, changed);

            let lifecycle = |t: Transition| {
                ApiRequest::post(api_paths::app_connection_lifecycle(app_id, t.as_str()))
            };
            // Writing the profile must not flip the status on its own.
            let mutated = transition::execute(ctx, &plan, lifecycle, || {
                self.write(ctx, app_id, desired, from == LifecycleStatus::Active)
            })
            .await?;

            let mut observed = mutated.unwrap_or_else(|| prior.clone());
            observed.set(STATUS, if to == LifecycleStatus::Active { ENABLED } else { DISABLED });
            Ok(observed)
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            // Connections cannot be deleted, only disabled.
            let app_id = state.require_id()?;
            if lifecycle_status(state) == LifecycleStatus::Active {
                match ctx
                    .post_empty(&api_paths::app_connection_lifecycle(
                        app_id,
                        Transition::Deactivate.as_str(),
                    ))
                    .await
                {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
            }
            tracing::info!(app_id = %app_id, "provisioning connection released");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(v: serde_json::Value) -> ResourceData {
        ResourceData::from_attributes(v.as_object().cloned().unwrap())
    }

    #[test]
    fn token_scheme_rejects_client_id() {
        let resource = AppConnection::new();
        let err = resource
            .validate(&data(json!({
                "app_id": "0oa1",
                "auth_scheme": "TOKEN",
                "token": "t",
                "client_id": "c",
            })))
            .unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn oauth_scheme_requires_client_id() {
        let resource = AppConnection::new();
        assert!(
            resource
                .validate(&data(json!({"app_id": "0oa1", "auth_scheme": "OAUTH2"})))
                .is_err()
        );
    }

    #[test]
    fn profile_variant_follows_scheme() {
        let resource = AppConnection::new();
        let profile = resource
            .profile(&data(json!({"auth_scheme": "OAUTH2", "client_id": "cid"})))
            .unwrap();
        assert_eq!(
            serde_json::to_value(profile).unwrap(),
            json!({"authScheme": "OAUTH2", "clientId": "cid"})
        );
    }

    #[test]
    fn token_is_carried_over_on_read() {
        let resource = AppConnection::new();
        let conn: ProvisioningConnection = serde_json::from_value(json!({
            "authScheme": "TOKEN",
            "baseUrl": "https://scim.example.com",
            "status": "ENABLED",
            "profile": {"authScheme": "TOKEN"},
        }))
        .unwrap();
        let prior = data(json!({"token": "secret"}));
        let observed = resource.observed("0oa1", &conn, &prior);
        assert_eq!(observed.get_str(TOKEN), Some("secret"));
        assert_eq!(observed.get_str(STATUS), Some("ENABLED"));
    }
}
