mod common;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oktaform_provider::resources::admin_role_custom::AdminRoleCustom;
use oktaform_provider::{Operation, Resource};

use common::{calls, data, op, provider_for};

async fn role_with_permissions(server: &MockServer, granted: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/api/v1/iam/roles/cr0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cr0",
            "label": "Flow operators",
            "description": "Runs workflows",
        })))
        .mount(server)
        .await;
    let permissions: Vec<_> = granted.iter().map(|p| json!({"label": p})).collect();
    Mock::given(method("GET"))
        .and(path("/api/v1/iam/roles/cr0/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "permissions": permissions,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn read_collapses_platform_implied_permissions() {
    let server = MockServer::start().await;
    role_with_permissions(
        &server,
        &[
            "okta.workflows.read",
            "okta.workflows.flows.read",
            "okta.workflows.invoke",
            "okta.workflows.flows.invoke",
            "okta.users.read",
        ],
    )
    .await;

    let provider = provider_for(&server);
    let ctx = op(&provider, Operation::Read);
    let observed = AdminRoleCustom::new()
        .read(&ctx, &data(json!({"id": "cr0"})))
        .await
        .unwrap()
        .unwrap();

    let permissions: Vec<String> = observed.get_string_set("permissions").into_iter().collect();
    assert_eq!(
        permissions,
        ["okta.users.read", "okta.workflows.invoke", "okta.workflows.read"]
    );
    assert_eq!(observed.get_str("label"), Some("Flow operators"));
}

#[tokio::test]
async fn read_of_a_missing_role_reports_it_gone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/iam/roles/cr9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorCode": "E0000007",
            "errorSummary": "Not found: Resource not found: cr9 (Role)",
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let ctx = op(&provider, Operation::Read);
    let observed = AdminRoleCustom::new()
        .read(&ctx, &data(json!({"id": "cr9"})))
        .await
        .unwrap();
    assert!(observed.is_none());
}

#[tokio::test]
async fn update_grants_and_revokes_one_permission_at_a_time() {
    let server = MockServer::start().await;
    role_with_permissions(&server, &["okta.users.read", "okta.groups.read"]).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/iam/roles/cr0/permissions/okta.groups.read"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/iam/roles/cr0/permissions/okta.workflows.invoke"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/iam/roles/cr0/permissions/okta.workflows.flows.invoke"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let ctx = op(&provider, Operation::Update);
    let prior = data(json!({
        "id": "cr0",
        "label": "Flow operators",
        "description": "Runs workflows",
        "permissions": ["okta.users.read", "okta.workflows.invoke"],
    }));
    let desired = data(json!({
        "id": "cr0",
        "label": "Flow operators",
        "description": "Runs workflows",
        "permissions": ["okta.users.read", "okta.groups.read"],
    }));

    let observed = AdminRoleCustom::new()
        .update(&ctx, &desired, &prior)
        .await
        .unwrap();
    let permissions: Vec<String> = observed.get_string_set("permissions").into_iter().collect();
    assert_eq!(permissions, ["okta.groups.read", "okta.users.read"]);

    // Label and description are unchanged, so the role itself is never PUT.
    assert!(!calls(&server).await.iter().any(|c| c.starts_with("PUT")));
}

#[tokio::test]
async fn relabel_keeps_the_role_returned_by_the_write() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/iam/roles/cr0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cr0",
            "label": "Workflow operators",
            "description": "Runs workflows",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/iam/roles/cr0/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "permissions": [{"label": "okta.users.read"}],
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let ctx = op(&provider, Operation::Update);
    let prior = data(json!({
        "id": "cr0",
        "label": "Flow operators",
        "description": "Runs workflows",
        "permissions": ["okta.users.read"],
    }));
    let mut desired = prior.clone();
    desired.set("label", "Workflow operators");

    let observed = AdminRoleCustom::new()
        .update(&ctx, &desired, &prior)
        .await
        .unwrap();
    assert_eq!(observed.get_str("label"), Some("Workflow operators"));
    assert_eq!(
        calls(&server).await,
        ["PUT /api/v1/iam/roles/cr0", "GET /api/v1/iam/roles/cr0/permissions"]
    );
}
