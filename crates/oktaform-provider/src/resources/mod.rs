//! Resource kinds.
//!
//! Each module holds one `Resource` impl: its attribute schema, the
//! declaration/wire mapping in both directions, and the CRUD callbacks.

pub mod admin_role_custom;
pub mod app_basic_auth;
pub mod app_connection;
pub mod app_group_assignment;
pub mod app_saml;
pub mod auth_server_scope;
pub mod inline_hook;
pub mod link_definition;
pub mod network_zone;
pub mod policy_rule_signon;
pub mod policy_rules_signon;
pub mod schema_property;
pub mod trusted_origin;
pub mod user;
pub mod user_type;

mod app;

use std::future::Future;

use oktaform_client::ApiRequest;
use oktaform_core::status::BINARY_STATUSES;
use oktaform_core::{AttrType, Attribute, LifecycleStatus, ResourceData, Schema};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::transition::{self, Transition};

pub(crate) const STATUS: &str = "status";

/// `status` for entities with an ACTIVE/INACTIVE lifecycle.
pub(crate) fn binary_status() -> Attribute {
    Attribute::optional(AttrType::String)
        .with_default("ACTIVE")
        .one_of(BINARY_STATUSES)
        .describe("ACTIVE or INACTIVE")
}

/// Declared or recorded status, `fallback` when unset.
pub(crate) fn status_of(
    data: &ResourceData,
    fallback: LifecycleStatus,
) -> Result<LifecycleStatus, ProvisionerError> {
    match data.get_str(STATUS) {
        Some(s) => Ok(s.parse()?),
        None => Ok(fallback),
    }
}

/// Update an entity with a binary lifecycle.
///
/// Status moves through `lifecycle` endpoints, fields through `mutate`,
/// in the order `transition::plan_binary` decides. When nothing but the
/// status changes the prior image is returned with the new status.
pub(crate) async fn update_binary<L, M, Fut>(
    ctx: &OpContext,
    schema: &Schema,
    desired: &ResourceData,
    prior: &ResourceData,
    lifecycle: L,
    mutate: M,
) -> Result<ResourceData, ProvisionerError>
where
    L: Fn(Transition) -> ApiRequest,
    M: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResourceData, ProvisionerError>>,
{
    let from = status_of(prior, LifecycleStatus::Active)?;
    let to = status_of(desired, LifecycleStatus::Active)?;
    let fields_changed = schema.has_changes_except(desired, prior, &[STATUS]);
    let plan = transition::plan_binary(from, to, fields_changed);
    if plan.additional_changes {
        tracing::debug!(from = %from, to = %to, "status change carries field changes");
    }

    let mutated = transition::execute(ctx, &plan, lifecycle, mutate).await?;
    let mut observed = match mutated {
        Some(data) => data,
        None => {
            let mut data = prior.clone();
            for (key, value) in &desired.attributes {
                data.attributes.insert(key.clone(), value.clone());
            }
            data
        }
    };
    observed.set(STATUS, to.as_str());
    Ok(observed)
}
