//! `okta_app_saml`: custom or catalog (preconfigured) SAML 2.0 apps.

use oktaform_core::models::app::{AppSettings, Application, SamlSignOn};
use oktaform_core::{AttrType, Attribute, ResourceData, Schema};
use serde_json::{Map, Value};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};

use super::app;
use super::update_binary;

const PRECONFIGURED_APP: &str = "preconfigured_app";
const SSO_URL: &str = "sso_url";
const RECIPIENT: &str = "recipient";
const DESTINATION: &str = "destination";
const AUDIENCE: &str = "audience";
const SUBJECT_NAME_ID_TEMPLATE: &str = "subject_name_id_template";
const SUBJECT_NAME_ID_FORMAT: &str = "subject_name_id_format";
const RESPONSE_SIGNED: &str = "response_signed";
const ASSERTION_SIGNED: &str = "assertion_signed";
const SIGNATURE_ALGORITHM: &str = "signature_algorithm";
const DIGEST_ALGORITHM: &str = "digest_algorithm";
const HONOR_FORCE_AUTHN: &str = "honor_force_authn";
const AUTHN_CONTEXT_CLASS_REF: &str = "authn_context_class_ref";
const APP_SETTINGS_JSON: &str = "app_settings_json";

/// Custom apps cannot be created without these.
const CUSTOM_APP_REQUIRED: &[&str] = &[SSO_URL, RECIPIENT, DESTINATION, AUDIENCE];

const SIGN_ON_MODE: &str = "SAML_2_0";

pub struct AppSaml {
    schema: Schema,
}

impl AppSaml {
    pub fn new() -> Self {
        let text = || Attribute::optional_computed(AttrType::String);
        let flag = || Attribute::optional_computed(AttrType::Bool);
        let schema = app::base_schema()
            .attr(
                PRECONFIGURED_APP,
                Attribute::optional(AttrType::String)
                    .force_new()
                    .describe("Catalog app name; omit for a custom SAML app"),
            )
            .attr(SSO_URL, text())
            .attr(RECIPIENT, text())
            .attr(DESTINATION, text())
            .attr(AUDIENCE, text())
            .attr(SUBJECT_NAME_ID_TEMPLATE, text())
            .attr(SUBJECT_NAME_ID_FORMAT, text())
            .attr(RESPONSE_SIGNED, flag())
            .attr(ASSERTION_SIGNED, flag())
            .attr(
                SIGNATURE_ALGORITHM,
                text().one_of(&["RSA_SHA256", "RSA_SHA1"]),
            )
            .attr(DIGEST_ALGORITHM, text().one_of(&["SHA256", "SHA1"]))
            .attr(HONOR_FORCE_AUTHN, flag())
            .attr(AUTHN_CONTEXT_CLASS_REF, text())
            .attr(
                APP_SETTINGS_JSON,
                Attribute::optional(AttrType::String)
                    .describe("JSON object of app-specific settings"),
            );
        Self { schema }
    }

    fn wire(&self, desired: &ResourceData) -> Result<Application, ProvisionerError> {
        let text = |key| desired.get_str(key).map(String::from);
        let sign_on = SamlSignOn {
            sso_acs_url: text(SSO_URL),
            recipient: text(RECIPIENT),
            destination: text(DESTINATION),
            audience: text(AUDIENCE),
            subject_name_id_template: text(SUBJECT_NAME_ID_TEMPLATE),
            subject_name_id_format: text(SUBJECT_NAME_ID_FORMAT),
            response_signed: desired.get_bool(RESPONSE_SIGNED),
            assertion_signed: desired.get_bool(ASSERTION_SIGNED),
            signature_algorithm: text(SIGNATURE_ALGORITHM),
            digest_algorithm: text(DIGEST_ALGORITHM),
            honor_force_authn: desired.get_bool(HONOR_FORCE_AUTHN),
            authn_context_class_ref: text(AUTHN_CONTEXT_CLASS_REF),
        };
        Ok(Application {
            name: text(PRECONFIGURED_APP),
            sign_on_mode: Some(SIGN_ON_MODE.to_string()),
            settings: AppSettings {
                app: app_settings(desired)?,
                sign_on: Some(sign_on),
            },
            ..app::base_wire(desired)?
        })
    }

    /// `prior` supplies the write-only pieces the API does not echo.
    fn observed(&self, app: &Application, prior: &ResourceData) -> ResourceData {
        let mut data = app::base_observed(app);
        let sign_on = app.settings.sign_on.clone().unwrap_or_default();
        data.set_opt(SSO_URL, sign_on.sso_acs_url);
        data.set_opt(RECIPIENT, sign_on.recipient);
        data.set_opt(DESTINATION, sign_on.destination);
        data.set_opt(AUDIENCE, sign_on.audience);
        data.set_opt(SUBJECT_NAME_ID_TEMPLATE, sign_on.subject_name_id_template);
        data.set_opt(SUBJECT_NAME_ID_FORMAT, sign_on.subject_name_id_format);
        data.set_opt(RESPONSE_SIGNED, sign_on.response_signed);
        data.set_opt(ASSERTION_SIGNED, sign_on.assertion_signed);
        data.set_opt(SIGNATURE_ALGORITHM, sign_on.signature_algorithm);
        data.set_opt(DIGEST_ALGORITHM, sign_on.digest_algorithm);
        data.set_opt(HONOR_FORCE_AUTHN, sign_on.honor_force_authn);
        data.set_opt(AUTHN_CONTEXT_CLASS_REF, sign_on.authn_context_class_ref);
        data.carry_over(prior, &[PRECONFIGURED_APP]);

        // Only keep the settings JSON when the server still agrees with it,
        // in the declared formatting.
        if let Some(declared) = prior.get_str(APP_SETTINGS_JSON) {
            let declared_map: Option<Map<String, Value>> = serde_json::from_str(declared).ok();
            if declared_map.is_some() && declared_map == app.settings.app {
                data.set(APP_SETTINGS_JSON, declared);
            } else if let Some(observed) = &app.settings.app {
                data.set(APP_SETTINGS_JSON, Value::Object(observed.clone()).to_string());
            }
        }
        data
    }
}

impl Default for AppSaml {
    fn default() -> Self {
        Self::new()
    }
}

fn app_settings(desired: &ResourceData) -> Result<Option<Map<String, Value>>, ProvisionerError> {
    let Some(raw) = desired.get_str(APP_SETTINGS_JSON) else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        _ => Err(ProvisionerError::PreconditionViolated(format!(
            "\"{APP_SETTINGS_JSON}\" must be a JSON object"
        ))),
    }
}

impl Resource for AppSaml {
    fn type_name(&self) -> &'static str {
        "okta_app_saml"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        app_settings(desired)?;
        if desired.has(PRECONFIGURED_APP) {
            return Ok(());
        }
        let missing: Vec<&str> = CUSTOM_APP_REQUIRED
            .iter()
            .copied()
            .filter(|key| !desired.has(key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProvisionerError::PreconditionViolated(format!(
                "custom SAML app requires {} when \"{PRECONFIGURED_APP}\" is not set",
                missing.join(", ")
            )))
        }
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let created = app::create(ctx, &self.wire(desired)?).await?;
            Ok(self.observed(&created, desired))
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            Ok(app::read(ctx, state)
                .await?
                .map(|a| self.observed(&a, state)))
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
            update_binary(ctx, &self.schema, desired, prior, app::lifecycle(id), || async move {
                let mut body = self.wire(desired)?;
                body.id = Some(id.to_string());
                let updated = app::put(ctx, id, &body).await?;
                Ok::<_, ProvisionerError>(self.observed(&updated, desired))
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

    fn data(v: Value) -> ResourceData {
        ResourceData::from_attributes(v.as_object().cloned().unwrap())
    }

    #[test]
    fn custom_app_requires_sso_fields() {
        let resource = AppSaml::new();
        let err = resource
            .validate(&data(json!({"label": "x", "sso_url": "https://a", "audience": "aud"})))
            .unwrap_err();
        assert!(matches!(err, ProvisionerError::PreconditionViolated(_)));
        assert!(err.to_string().contains("recipient, destination"));
    }

    #[test]
    fn preconfigured_app_skips_custom_requirements() {
        let resource = AppSaml::new();
        resource
            .validate(&data(json!({"label": "x", "preconfigured_app": "amazon_aws"})))
            .unwrap();
    }

    #[test]
    fn settings_json_must_be_an_object() {
        let resource = AppSaml::new();
        let err = resource
            .validate(&data(json!({
                "label": "x",
                "preconfigured_app": "amazon_aws",
                "app_settings_json": "[1, 2]",
            })))
            .unwrap_err();
        assert!(matches!(err, ProvisionerError::PreconditionViolated(_)));
    }

    #[test]
    fn declared_settings_formatting_survives_read() {
        let resource = AppSaml::new();
        let declared = r#"{ "awsEnvironmentType": "aws.amazon" }"#;
        let prior = data(json!({
            "label": "AWS",
            "preconfigured_app": "amazon_aws",
            "app_settings_json": declared,
        }));
        let app: Application = serde_json::from_value(json!({
            "id": "0oa9",
            "name": "amazon_aws",
            "label": "AWS",
            "status": "ACTIVE",
            "settings": {"app": {"awsEnvironmentType": "aws.amazon"}},
        }))
        .unwrap();
        let observed = resource.observed(&app, &prior);
        assert_eq!(observed.get_str(APP_SETTINGS_JSON), Some(declared));
        assert_eq!(observed.get_str(PRECONFIGURED_APP), Some("amazon_aws"));
    }
}
