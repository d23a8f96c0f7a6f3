//! `okta_app_basic_auth`: an app that signs users in with a username and
//! password posted to the target site.

use oktaform_core::models::app::{AppSettings, Application};
use oktaform_core::{AttrType, Attribute, ResourceData, Schema};
use serde_json::{Map, Value};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};

use super::app;
use super::update_binary;

const URL: &str = "url";
const AUTH_URL: &str = "auth_url";

const TEMPLATE: &str = "template_basic_auth";
const SIGN_ON_MODE: &str = "BASIC_AUTH";

pub struct AppBasicAuth {
    schema: Schema,
}

impl AppBasicAuth {
    pub fn new() -> Self {
        let schema = app::base_schema()
            .attr(
                URL,
                Attribute::required(AttrType::String).describe("Login page URL"),
            )
            .attr(
                AUTH_URL,
                Attribute::required(AttrType::String).describe("URL credentials are posted to"),
            );
        Self { schema }
    }

    fn wire(&self, desired: &ResourceData) -> Result<Application, ProvisionerError> {
        let mut settings = Map::new();
        settings.insert("url".into(), Value::from(desired.require_str(URL)?));
        settings.insert("authURL".into(), Value::from(desired.require_str(AUTH_URL)?));
        Ok(Application {
            name: Some(TEMPLATE.to_string()),
            sign_on_mode: Some(SIGN_ON_MODE.to_string()),
            settings: AppSettings {
                app: Some(settings),
                sign_on: None,
            },
            ..app::base_wire(desired)?
        })
    }

    fn observed(&self, app: &Application) -> ResourceData {
        let mut data = app::base_observed(app);
        let settings = app.settings.app.clone().unwrap_or_default();
        data.set_opt(URL, settings.get("url").cloned());
        data.set_opt(AUTH_URL, settings.get("authURL").cloned());
        data
    }
}

impl Default for AppBasicAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for AppBasicAuth {
    fn type_name(&self) -> &'static str {
        "okta_app_basic_auth"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let created = app::create(ctx, &self.wire(desired)?).await?;
            Ok(self.observed(&created))
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move { Ok(app::read(ctx, state).await?.map(|a| self.observed(&a))) })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let id = prior.require_id()?;
            update_binary(ctx, &self.schema, desired, prior, app::lifecycle(id), || async move {
                let mut body = self.wire(desired)?;
                body.id = Some(id.to_string());
                let updated = app::put(ctx, id, &body).await?;
                Ok::<_, ProvisionerError>(self.observed(&updated))
            })
            .await
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(app::delete(ctx, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_carries_settings_and_visibility() {
        let resource = AppBasicAuth::new();
        let mut desired = ResourceData::from_attributes(
            json!({
                "label": "Intranet",
                "url": "https://intra.example.com/login",
                "auth_url": "https://intra.example.com/auth",
                "hide_ios": true,
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        resource.schema().apply_defaults(&mut desired);
        let body = serde_json::to_value(resource.wire(&desired).unwrap()).unwrap();
        assert_eq!(body["name"], "template_basic_auth");
        assert_eq!(body["signOnMode"], "BASIC_AUTH");
        assert_eq!(body["status"], "ACTIVE");
        assert_eq!(body["settings"]["app"]["authURL"], "https://intra.example.com/auth");
        assert_eq!(body["visibility"]["hide"]["iOS"], true);
    }

    #[test]
    fn observed_round_trips_declared_fields() {
        let resource = AppBasicAuth::new();
        let app: Application = serde_json::from_value(json!({
            "id": "0oa1",
            "name": "template_basic_auth",
            "label": "Intranet",
            "status": "INACTIVE",
            "signOnMode": "BASIC_AUTH",
            "settings": {"app": {"url": "https://a", "authURL": "https://b"}},
        }))
        .unwrap();
        let data = resource.observed(&app);
        assert_eq!(data.id(), Some("0oa1"));
        assert_eq!(data.get_str("status"), Some("INACTIVE"));
        assert_eq!(data.get_str("auth_url"), Some("https://b"));
        assert_eq!(data.get_bool("hide_web"), Some(false));
    }
}
