//! `okta_inline_hook`
//!
//! The channel is either plain HTTP (optionally with a static auth
//! header) or OAuth-secured. Secrets are write-only and are carried over
//! from the declaration.

use oktaform_client::ApiRequest;
use oktaform_core::models::inline_hook::{
    HeaderAuth, HookChannel, HttpChannelConfig, InlineHook, OAuthChannelConfig,
};
use oktaform_core::{AttrType, Attribute, LifecycleStatus, ResourceData, Schema, api_paths};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};
use crate::transition::Transition;

use super::{STATUS, binary_status, status_of, update_binary};

const NAME: &str = "name";
const TYPE: &str = "type";
const VERSION: &str = "version";
const CHANNEL_TYPE: &str = "channel_type";
const CHANNEL_VERSION: &str = "channel_version";
const URI: &str = "uri";
const METHOD: &str = "method";
const AUTH_KEY: &str = "auth_key";
const AUTH_VALUE: &str = "auth_value";
const OAUTH_AUTH_TYPE: &str = "oauth_auth_type";
const CLIENT_ID: &str = "client_id";
const CLIENT_SECRET: &str = "client_secret";
const TOKEN_URL: &str = "token_url";
const SCOPE: &str = "scope";

const HTTP: &str = "HTTP";
const OAUTH: &str = "OAUTH";
const CLIENT_SECRET_POST: &str = "client_secret_post";

const HTTP_ONLY: &[&str] = &[AUTH_KEY, AUTH_VALUE];
const OAUTH_ONLY: &[&str] = &[OAUTH_AUTH_TYPE, CLIENT_ID, CLIENT_SECRET, TOKEN_URL, SCOPE];
const WRITE_ONLY: &[&str] = &[AUTH_VALUE, CLIENT_SECRET];

pub struct InlineHookResource {
    schema: Schema,
}

impl InlineHookResource {
    pub fn new() -> Self {
        let text = || Attribute::optional(AttrType::String);
        let schema = Schema::new()
            .attr(NAME, Attribute::required(AttrType::String))
            .attr(
                TYPE,
                Attribute::required(AttrType::String)
                    .force_new()
                    .describe("Hook point, e.g. com.okta.oauth2.tokens.transform"),
            )
            .attr(VERSION, Attribute::required(AttrType::String))
            .attr(STATUS, binary_status())
            .attr(
                CHANNEL_TYPE,
                text().with_default(HTTP).one_of(&[HTTP, OAUTH]),
            )
            .attr(CHANNEL_VERSION, text().with_default("1.0.0"))
            .attr(URI, Attribute::required(AttrType::String))
            .attr(METHOD, text().with_default("POST"))
            .attr(AUTH_KEY, text().describe("Header carrying the static secret"))
            .attr(AUTH_VALUE, text().sensitive())
            .attr(
                OAUTH_AUTH_TYPE,
                text().one_of(&[CLIENT_SECRET_POST, "private_key_jwt"]),
            )
            .attr(CLIENT_ID, text())
            .attr(CLIENT_SECRET, text().sensitive())
            .attr(TOKEN_URL, text())
            .attr(SCOPE, text());
        Self { schema }
    }

    fn wire(desired: &ResourceData) -> Result<InlineHook, ProvisionerError> {
        let uri = desired.require_str(URI)?.to_string();
        let method = desired.get_str(METHOD).unwrap_or("POST").to_string();
        let version = desired.get_str(CHANNEL_VERSION).unwrap_or("1.0.0").to_string();
        let optional = |key| desired.get_str(key).map(String::from);

        let channel = match desired.get_str(CHANNEL_TYPE).unwrap_or(HTTP) {
            OAUTH => HookChannel::OAuth {
                version,
                config: OAuthChannelConfig {
                    uri,
                    method,
                    auth_type: desired.require_str(OAUTH_AUTH_TYPE)?.to_string(),
                    client_id: desired.require_str(CLIENT_ID)?.to_string(),
                    client_secret: optional(CLIENT_SECRET),
                    token_url: desired.require_str(TOKEN_URL)?.to_string(),
                    scope: optional(SCOPE),
                },
            },
            _ => HookChannel::Http {
                version,
                config: HttpChannelConfig {
                    uri,
                    method,
                    auth_scheme: desired.get_str(AUTH_KEY).map(|key| HeaderAuth {
                        kind: "HEADER".to_string(),
                        key: key.to_string(),
                        value: optional(AUTH_VALUE),
                    }),
                },
            },
        };

        Ok(InlineHook {
            id: None,
            name: desired.require_str(NAME)?.to_string(),
            kind: desired.require_str(TYPE)?.to_string(),
            version: desired.require_str(VERSION)?.to_string(),
            status: None,
            channel,
        })
    }

    fn observed(hook: &InlineHook, prior: &ResourceData) -> ResourceData {
        let mut data = ResourceData::new();
        if let Some(id) = &hook.id {
            data.set_id(id.clone());
        }
        data.set(NAME, hook.name.clone());
        data.set(TYPE, hook.kind.clone());
        data.set(VERSION, hook.version.clone());
        data.set_opt(STATUS, hook.status.map(|s| s.as_str()));

        match &hook.channel {
            HookChannel::Http { version, config } => {
                data.set(CHANNEL_TYPE, HTTP);
                data.set(CHANNEL_VERSION, version.clone());
                data.set(URI, config.uri.clone());
                data.set(METHOD, config.method.clone());
                if let Some(auth) = &config.auth_scheme {
                    data.set(AUTH_KEY, auth.key.clone());
                }
            }
            HookChannel::OAuth { version, config } => {
                data.set(CHANNEL_TYPE, OAUTH);
                data.set(CHANNEL_VERSION, version.clone());
                data.set(URI, config.uri.clone());
                data.set(METHOD, config.method.clone());
                data.set(OAUTH_AUTH_TYPE, config.auth_type.clone());
                data.set(CLIENT_ID, config.client_id.clone());
                data.set(TOKEN_URL, config.token_url.clone());
                data.set_opt(SCOPE, config.scope.clone());
            }
        }
        let channel = data.get_str(CHANNEL_TYPE).unwrap_or(HTTP).to_string();
        let carried: Vec<&str> = WRITE_ONLY
            .iter()
            .copied()
            .filter(|key| {
                let own = if channel == OAUTH { OAUTH_ONLY } else { HTTP_ONLY };
                own.contains(key)
            })
            .collect();
        data.carry_over(prior, &carried);
        data
    }
}

impl Default for InlineHookResource {
    fn default() -> Self {
        Self::new()
    }
}

fn lifecycle(id: &str) -> impl Fn(Transition) -> ApiRequest + Send + Sync + '_ {
    move |t| ApiRequest::post(api_paths::inline_hook_lifecycle(id, t.as_str()))
}

impl Resource for InlineHookResource {
    fn type_name(&self) -> &'static str {
        "okta_inline_hook"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        let channel = desired.get_str(CHANNEL_TYPE).unwrap_or(HTTP);
        let foreign = if channel == OAUTH { HTTP_ONLY } else { OAUTH_ONLY };
        if let Some(key) = foreign.iter().find(|k| desired.has(k)) {
            return Err(ProvisionerError::PreconditionViolated(format!(
                "\"{key}\" is not valid for {channel} channels"
            )));
        }

        match channel {
            OAUTH => {
                for key in [OAUTH_AUTH_TYPE, CLIENT_ID, TOKEN_URL] {
                    if !desired.has(key) {
                        return Err(ProvisionerError::PreconditionViolated(format!(
                            "OAUTH channels require \"{key}\""
                        )));
                    }
                }
                if desired.get_str(OAUTH_AUTH_TYPE) == Some(CLIENT_SECRET_POST)
                    && !desired.has(CLIENT_SECRET)
                {
                    return Err(ProvisionerError::PreconditionViolated(
                        "client_secret_post requires \"client_secret\"".into(),
                    ));
                }
            }
            _ => {
                if desired.has(AUTH_VALUE) && !desired.has(AUTH_KEY) {
                    return Err(ProvisionerError::PreconditionViolated(
                        "\"auth_value\" requires \"auth_key\"".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let created: InlineHook = ctx.post_json(api_paths::INLINE_HOOKS, &Self::wire(desired)?).await?;
            let mut observed = Self::observed(&created, desired);
            let id = observed.require_id()?.to_string();
            tracing::info!(hook_id = %id, hook_type = %created.kind, "inline hook created");

            if status_of(desired, LifecycleStatus::Active)? == LifecycleStatus::Inactive
                && created.status != Some(LifecycleStatus::Inactive)
            {
                ctx.send(lifecycle(&id)(Transition::Deactivate))
                    .await
                    .map_err(|e| e.prefixed("deactivate"))?;
                observed.set(STATUS, LifecycleStatus::Inactive.as_str());
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
            let found: Option<InlineHook> = ctx
                .get_opt(&api_paths::inline_hook(state.require_id()?))
                .await?;
            Ok(found.map(|hook| Self::observed(&hook, state)))
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
            update_binary(ctx, &self.schema, desired, prior, lifecycle(id), || async move {
                let updated: InlineHook = ctx
                    .put_json(&api_paths::inline_hook(id), &Self::wire(desired)?)
                    .await?;
                Ok::<_, ProvisionerError>(Self::observed(&updated, desired))
            })
            .await
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let id = state.require_id()?;
            if status_of(state, LifecycleStatus::Active)? == LifecycleStatus::Active {
                match ctx.send(lifecycle(id)(Transition::Deactivate)).await {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => return Ok(()),
                    Err(e) => return Err(e.prefixed("deactivate")),
                }
            }
            ctx.delete(&api_paths::inline_hook(id)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn data(v: Value) -> ResourceData {
        let resource = InlineHookResource::new();
        let mut d = ResourceData::from_attributes(v.as_object().cloned().unwrap());
        resource.schema().apply_defaults(&mut d);
        d
    }

    #[test]
    fn oauth_channel_rejects_header_auth() {
        let err = InlineHookResource::new()
            .validate(&data(json!({
                "name": "h", "type": "com.okta.oauth2.tokens.transform", "version": "1.0.0",
                "uri": "https://hooks.example.com", "channel_type": "OAUTH",
                "auth_key": "Authorization",
            })))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "precondition violated: \"auth_key\" is not valid for OAUTH channels"
        );
    }

    #[test]
    fn client_secret_post_needs_a_secret() {
        let err = InlineHookResource::new()
            .validate(&data(json!({
                "name": "h", "type": "com.okta.import.transform", "version": "1.0.0",
                "uri": "https://hooks.example.com", "channel_type": "OAUTH",
                "oauth_auth_type": "client_secret_post", "client_id": "c",
                "token_url": "https://idp.example.com/token",
            })))
            .unwrap_err();
        assert!(matches!(err, ProvisionerError::PreconditionViolated(_)));
    }

    #[test]
    fn secret_is_carried_over_and_not_read_back() {
        let desired = data(json!({
            "name": "h", "type": "com.okta.import.transform", "version": "1.0.0",
            "uri": "https://hooks.example.com", "auth_key": "Authorization",
            "auth_value": "s3cret",
        }));
        let wire = serde_json::to_value(InlineHookResource::wire(&desired).unwrap()).unwrap();
        assert_eq!(wire["channel"]["type"], "HTTP");
        assert_eq!(wire["channel"]["config"]["authScheme"]["value"], "s3cret");

        let mut echoed = wire.clone();
        echoed["id"] = json!("cal1");
        echoed["status"] = json!("ACTIVE");
        echoed["channel"]["config"]["authScheme"]
            .as_object_mut()
            .unwrap()
            .remove("value");
        let hook: InlineHook = serde_json::from_value(echoed).unwrap();
        let observed = InlineHookResource::observed(&hook, &desired);
        assert_eq!(observed.get_str(AUTH_VALUE), Some("s3cret"));
        assert!(!observed.has(CLIENT_SECRET));
        assert!(InlineHookResource::new().schema().diff(&desired, &observed).is_empty());
    }
}
