mod common;

use serde_json::json;
use wiremock::MockServer;

use oktaform_provider::{
    Action, Declarations, ProviderState, ProvisionerError, Registry, ResourceAddr, plan,
};

use common::{calls, data};

fn declarations(resources: serde_json::Value) -> Declarations {
    serde_json::from_value(json!({"resources": resources})).unwrap()
}

#[tokio::test]
async fn blocklist_zone_with_proxies_fails_before_any_call() {
    let server = MockServer::start().await;
    let decls = declarations(json!([{
        "type": "okta_network_zone",
        "name": "blocked",
        "attributes": {
            "name": "Blocked",
            "type": "IP",
            "usage": "BLOCKLIST",
            "gateways": ["203.0.113.0/24"],
            "proxies": ["198.51.100.7"],
        },
    }]));

    let err = plan(&Registry::okta(), &decls, &ProviderState::default()).unwrap_err();
    match err {
        ProvisionerError::PreconditionViolated(msg) => {
            assert!(msg.starts_with("okta_network_zone.blocked (plan)"), "{msg}");
            assert!(msg.contains("proxies are not allowed on a BLOCKLIST zone"), "{msg}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(calls(&server).await.is_empty());
}

#[test]
fn foreign_variant_attribute_is_rejected() {
    let decls = declarations(json!([{
        "type": "okta_network_zone",
        "name": "office",
        "attributes": {
            "name": "Office",
            "type": "IP",
            "gateways": ["203.0.113.0/24"],
            "asns": ["64496"],
        },
    }]));
    let err = plan(&Registry::okta(), &decls, &ProviderState::default()).unwrap_err();
    assert!(err.to_string().contains("\"asns\" is not valid for IP zones"), "{err}");
}

#[test]
fn unknown_resource_type_is_rejected() {
    let decls = declarations(json!([{"type": "okta_widget", "name": "w", "attributes": {}}]));
    assert!(plan(&Registry::okta(), &decls, &ProviderState::default()).is_err());
}

#[test]
fn dependency_on_an_undeclared_address_is_rejected() {
    let decls = declarations(json!([{
        "type": "okta_trusted_origin",
        "name": "portal",
        "attributes": {"name": "Portal", "origin": "https://portal.example.com", "scopes": ["CORS"]},
        "depends_on": ["okta_network_zone.missing"],
    }]));
    let err = plan(&Registry::okta(), &decls, &ProviderState::default()).unwrap_err();
    assert!(matches!(err, ProvisionerError::PreconditionViolated(_)));
    assert!(err.to_string().contains("undeclared resource okta_network_zone.missing"), "{err}");
}

#[test]
fn classifies_create_update_replace_delete_and_noop() {
    let zone = |name: &str, kind: &str| {
        json!({
            "type": "okta_network_zone",
            "name": name,
            "attributes": {"name": name, "type": kind, "gateways": ["203.0.113.0/24"]},
        })
    };
    let decls = declarations(json!([
        zone("fresh", "IP"),
        zone("same", "IP"),
        {
            "type": "okta_network_zone",
            "name": "renamed",
            "attributes": {"name": "Renamed", "type": "IP", "gateways": ["203.0.113.0/24"]},
        },
        {
            "type": "okta_network_zone",
            "name": "retyped",
            "attributes": {"name": "retyped", "type": "DYNAMIC_V2", "asns": ["64496"]},
        },
    ]));

    let recorded = |name: &str, kind: &str, label: &str| {
        let mut attrs = json!({
            "id": format!("nzo-{name}"),
            "name": label,
            "type": kind,
            "status": "ACTIVE",
            "usage": "POLICY",
            "gateways": ["203.0.113.0/24"],
        });
        if kind != "IP" {
            attrs.as_object_mut().unwrap().remove("gateways");
            attrs["asns"] = json!(["64496"]);
        }
        oktaform_provider::state::ResourceRecord {
            depends_on: vec![],
            data: data(attrs),
        }
    };
    let mut state = ProviderState::default();
    let addr = |name: &str| ResourceAddr::new("okta_network_zone", name);
    state.resources.insert(addr("same"), recorded("same", "IP", "same"));
    state.resources.insert(addr("renamed"), recorded("renamed", "IP", "renamed"));
    state.resources.insert(addr("retyped"), recorded("retyped", "IP", "retyped"));
    state.resources.insert(addr("gone"), recorded("gone", "IP", "gone"));

    let planned = plan(&Registry::okta(), &decls, &state).unwrap();
    let action = |name: &str| planned.get(&addr(name)).map(|e| e.action);
    assert_eq!(action("fresh"), Some(Action::Create));
    assert_eq!(action("same"), Some(Action::NoOp));
    assert_eq!(action("renamed"), Some(Action::Update));
    assert_eq!(action("retyped"), Some(Action::Replace));
    assert_eq!(action("gone"), Some(Action::Delete));
}
