#![allow(dead_code)]

use std::time::Duration;

use serde_json::Value;
use url::Url;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

use oktaform_client::{ClientConfig, Credentials, OktaClient};
use oktaform_core::ResourceData;
use oktaform_provider::retry::RetryPolicy;
use oktaform_provider::{OpContext, Operation, ProviderContext, ProviderSettings};

pub fn provider_for(server: &MockServer) -> ProviderContext {
    let mut config = ClientConfig::new(Credentials::ApiToken {
        token: "test-token".into(),
    });
    config.endpoint = Some(Url::parse(&server.uri()).unwrap());
    config.min_wait = Duration::from_millis(10);
    config.max_wait = Duration::from_millis(50);
    config.max_retries = 2;

    let fast = RetryPolicy {
        budget: Duration::from_secs(5),
        initial: Duration::from_millis(10),
        cap: Duration::from_millis(50),
    };
    let settings = ProviderSettings {
        schema_retry: fast,
        user_type_delete_retry: fast,
        ..ProviderSettings::default()
    };
    ProviderContext::new(OktaClient::new(config).unwrap(), settings)
}

pub fn op(ctx: &ProviderContext, operation: Operation) -> OpContext {
    ctx.operation(operation, Duration::from_secs(30))
}

/// Resource data from a JSON object; a top-level `"id"` becomes the remote ID.
pub fn data(v: Value) -> ResourceData {
    let mut attributes = v.as_object().cloned().unwrap();
    let id = attributes.remove("id");
    let mut data = ResourceData::from_attributes(attributes);
    if let Some(Value::String(id)) = id {
        data.set_id(id);
    }
    data
}

/// `METHOD /path` of every request the server saw, in arrival order.
pub async fn calls(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}

pub fn body(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

/// Responds with the request body, `id` filled in.
pub struct Echo(pub &'static str);

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut echoed = body(request);
        echoed["id"] = Value::from(self.0);
        ResponseTemplate::new(200).set_body_json(echoed)
    }
}
