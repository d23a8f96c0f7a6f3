//! Pieces every application resource shares.

use oktaform_client::ApiRequest;
use oktaform_core::models::app::{Application, Hide, Visibility};
use oktaform_core::{AttrType, Attribute, LifecycleStatus, ResourceData, Schema, api_paths};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::transition::Transition;

use super::{STATUS, binary_status, status_of};

pub(super) const LABEL: &str = "label";
pub(super) const NAME: &str = "name";
pub(super) const SIGN_ON_MODE: &str = "sign_on_mode";
pub(super) const AUTO_SUBMIT_TOOLBAR: &str = "auto_submit_toolbar";
pub(super) const HIDE_IOS: &str = "hide_ios";
pub(super) const HIDE_WEB: &str = "hide_web";

/// Attributes on every app kind.
pub(super) fn base_schema() -> Schema {
    Schema::new()
        .attr(LABEL, Attribute::required(AttrType::String))
        .attr(STATUS, binary_status())
        .attr(NAME, Attribute::computed(AttrType::String))
        .attr(SIGN_ON_MODE, Attribute::computed(AttrType::String))
        .attr(
            AUTO_SUBMIT_TOOLBAR,
            Attribute::optional(AttrType::Bool).with_default(false),
        )
        .attr(HIDE_IOS, Attribute::optional(AttrType::Bool).with_default(false))
        .attr(HIDE_WEB, Attribute::optional(AttrType::Bool).with_default(false))
}

/// Wire body carrying the shared attributes; callers fill `name`,
/// `sign_on_mode` and `settings`.
pub(super) fn base_wire(desired: &ResourceData) -> Result<Application, ProvisionerError> {
    Ok(Application {
        id: desired.id().map(String::from),
        label: desired.require_str(LABEL)?.to_string(),
        status: Some(status_of(desired, LifecycleStatus::Active)?),
        visibility: Some(Visibility {
            auto_submit_toolbar: desired.get_bool(AUTO_SUBMIT_TOOLBAR).unwrap_or(false),
            hide: Hide {
                ios: desired.get_bool(HIDE_IOS).unwrap_or(false),
                web: desired.get_bool(HIDE_WEB).unwrap_or(false),
            },
        }),
        ..Application::default()
    })
}

/// Shared attributes from an API response.
pub(super) fn base_observed(app: &Application) -> ResourceData {
    let mut data = ResourceData::new();
    if let Some(id) = &app.id {
        data.set_id(id.clone());
    }
    data.set(LABEL, app.label.clone());
    data.set_opt(STATUS, app.status.map(|s| s.as_str()));
    data.set_opt(NAME, app.name.clone());
    data.set_opt(SIGN_ON_MODE, app.sign_on_mode.clone());
    let visibility = app.visibility.clone().unwrap_or_default();
    data.set(AUTO_SUBMIT_TOOLBAR, visibility.auto_submit_toolbar);
    data.set(HIDE_IOS, visibility.hide.ios);
    data.set(HIDE_WEB, visibility.hide.web);
    data
}

pub(super) fn lifecycle(id: &str) -> impl Fn(Transition) -> ApiRequest + Send + Sync + '_ {
    move |t| ApiRequest::post(api_paths::app_lifecycle(id, t.as_str()))
}

/// Create, activating in the same call when the declared status is ACTIVE.
pub(super) async fn create(
    ctx: &OpContext,
    body: &Application,
) -> Result<Application, ProvisionerError> {
    let activate = body.status != Some(LifecycleStatus::Inactive);
    let request = ApiRequest::post(api_paths::APPS)
        .query("activate", activate)
        .body(serde_json::to_value(body)?);
    let app: Application = ctx.send_json(request).await?;
    tracing::info!(
        app_id = app.id.as_deref().unwrap_or_default(),
        label = %app.label,
        "application created"
    );
    Ok(app)
}

pub(super) async fn read(
    ctx: &OpContext,
    state: &ResourceData,
) -> Result<Option<Application>, ProvisionerError> {
    ctx.get_opt(&api_paths::app(state.require_id()?)).await
}

pub(super) async fn put(
    ctx: &OpContext,
    id: &str,
    body: &Application,
) -> Result<Application, ProvisionerError> {
    ctx.put_json(&api_paths::app(id), body).await
}

/// Apps must be INACTIVE before they can be deleted.
pub(super) async fn delete(ctx: &OpContext, state: &ResourceData) -> Result<(), ProvisionerError> {
    let id = state.require_id()?;
    if status_of(state, LifecycleStatus::Active)? == LifecycleStatus::Active {
        match ctx
            .post_empty(&api_paths::app_lifecycle(id, Transition::Deactivate.as_str()))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.prefixed("deactivate")),
        }
    }
    ctx.delete(&api_paths::app(id)).await?;
    tracing::info!(app_id = %id, "application deleted");
    Ok(())
}
