//! `okta_trusted_origin`
//!
//! The trusted-origin set is one org-wide list on the platform side;
//! concurrent writes to it are serialized.

use oktaform_client::ApiRequest;
use oktaform_core::models::trusted_origin::{OriginScope, TrustedOrigin};
use oktaform_core::{AttrType, Attribute, LifecycleStatus, ResourceData, Schema, api_paths};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};
use crate::transition::Transition;

use super::{STATUS, binary_status, status_of, update_binary};

const NAME: &str = "name";
const ORIGIN: &str = "origin";
const SCOPES: &str = "scopes";

const ORIGINS_KEY: &str = "trusted_origins";

pub struct TrustedOriginResource {
    schema: Schema,
}

impl TrustedOriginResource {
    pub fn new() -> Self {
        let schema = Schema::new()
            .attr(NAME, Attribute::required(AttrType::String))
            .attr(ORIGIN, Attribute::required(AttrType::String))
            .attr(
                SCOPES,
                Attribute::required(AttrType::string_set()).one_of(&["CORS", "REDIRECT", "IFRAME_EMBED"]),
            )
            .attr(STATUS, binary_status());
        Self { schema }
    }

    fn wire(desired: &ResourceData) -> Result<TrustedOrigin, ProvisionerError> {
        Ok(TrustedOrigin {
            id: None,
            name: desired.require_str(NAME)?.to_string(),
            origin: desired.require_str(ORIGIN)?.to_string(),
            scopes: desired
                .get_string_set(SCOPES)
                .into_iter()
                .map(|kind| OriginScope { kind })
                .collect(),
            status: None,
        })
    }

    fn observed(origin: &TrustedOrigin) -> ResourceData {
        let mut data = ResourceData::new();
        if let Some(id) = &origin.id {
            data.set_id(id.clone());
        }
        data.set(NAME, origin.name.clone());
        data.set(ORIGIN, origin.origin.clone());
        data.set_strings(SCOPES, origin.scopes.iter().map(|s| s.kind.clone()));
        data.set_opt(STATUS, origin.status.map(|s| s.as_str()));
        data
    }
}

impl Default for TrustedOriginResource {
    fn default() -> Self {
        Self::new()
    }
}

fn lifecycle(id: &str) -> impl Fn(Transition) -> ApiRequest + Send + Sync + '_ {
    move |t| ApiRequest::post(api_paths::trusted_origin_lifecycle(id, t.as_str()))
}

impl Resource for TrustedOriginResource {
    fn type_name(&self) -> &'static str {
        "okta_trusted_origin"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        if desired.has(SCOPES) && desired.get_string_set(SCOPES).is_empty() {
            return Err(ProvisionerError::PreconditionViolated(
                "at least one scope is required".into(),
            ));
        }
        Ok(())
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(ctx.serialized(ORIGINS_KEY, async move {
            let created: TrustedOrigin = ctx
                .post_json(api_paths::TRUSTED_ORIGINS, &Self::wire(desired)?)
                .await?;
            let mut observed = Self::observed(&created);
            let id = observed.require_id()?.to_string();
            tracing::info!(origin_id = %id, origin = %created.origin, "trusted origin created");

            if status_of(desired, LifecycleStatus::Active)? == LifecycleStatus::Inactive {
                ctx.send(lifecycle(&id)(Transition::Deactivate))
                    .await
                    .map_err(|e| e.prefixed("deactivate"))?;
                observed.set(STATUS, LifecycleStatus::Inactive.as_str());
            }
            Ok::<_, ProvisionerError>(observed)
        }))
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let found: Option<TrustedOrigin> = ctx
                .get_opt(&api_paths::trusted_origin(state.require_id()?))
                .await?;
            Ok(found.as_ref().map(Self::observed))
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
            ctx.serialized(
                ORIGINS_KEY,
                update_binary(ctx, &self.schema, desired, prior, lifecycle(id), || async move {
                    let updated: TrustedOrigin = ctx
                        .put_json(&api_paths::trusted_origin(id), &Self::wire(desired)?)
                        .await?;
                    Ok::<_, ProvisionerError>(Self::observed(&updated))
                }),
            )
            .await
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let path = api_paths::trusted_origin(state.require_id()?);
            ctx.serialized(ORIGINS_KEY, ctx.delete(&path)).await
        })
    }
}
