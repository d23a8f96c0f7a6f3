mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use oktaform_provider::{Action, Declarations, ProviderState, Registry, StatePersistence, apply, plan};

use common::{body, calls, provider_for};

const GROUP_SCHEMA: &str = "/api/v1/meta/schemas/group/default";

/// The group profile schema. POST merges custom properties into the
/// document. The first `lagging_reads` GETs serve no custom properties,
/// like a read that has not caught up with the write.
struct GroupSchemaFake {
    doc: Mutex<Value>,
    lagging_reads: AtomicUsize,
}

impl GroupSchemaFake {
    fn new(lagging_reads: usize) -> Self {
        Self {
            doc: Mutex::new(empty_document()),
            lagging_reads: AtomicUsize::new(lagging_reads),
        }
    }
}

fn empty_document() -> Value {
    json!({
        "id": "https://example.okta.com/meta/schemas/group/default",
        "definitions": {"custom": {"id": "#custom", "type": "object", "properties": {}}},
    })
}

impl Respond for GroupSchemaFake {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut doc = self.doc.lock();
        match request.method.as_str() {
            "POST" => {
                let posted = body(request);
                let written = posted["definitions"]["custom"]["properties"]
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                let properties = doc["definitions"]["custom"]["properties"]
                    .as_object_mut()
                    .unwrap();
                for (name, value) in written {
                    if value.is_null() {
                        properties.remove(&name);
                    } else {
                        properties.insert(name, value);
                    }
                }
                ResponseTemplate::new(200)
                    .set_body_json(&*doc)
                    .set_delay(Duration::from_millis(20))
            }
            "GET" => {
                let lagging = self
                    .lagging_reads
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if lagging {
                    ResponseTemplate::new(200).set_body_json(empty_document())
                } else {
                    ResponseTemplate::new(200).set_body_json(&*doc)
                }
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

fn declarations(permissions: &[&str]) -> Declarations {
    let resources: Vec<Value> = permissions
        .iter()
        .enumerate()
        .map(|(i, permission)| {
            json!({
                "type": "okta_group_schema_property",
                "name": format!("attr{i}"),
                "attributes": {
                    "index": format!("attr{i}"),
                    "title": format!("Attribute {i}"),
                    "type": "string",
                    "permissions": permission,
                },
            })
        })
        .collect();
    serde_json::from_value(json!({"resources": resources})).unwrap()
}

async fn mounted(fake: GroupSchemaFake) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(path(GROUP_SCHEMA))
        .respond_with(fake)
        .mount(&server)
        .await;
    server
}

async fn final_document(server: &MockServer) -> Value {
    let provider = provider_for(server);
    provider
        .client()
        .execute(
            &oktaform_client::ApiRequest::get(GROUP_SCHEMA),
            &tokio_util::sync::CancellationToken::new(),
        )
        .await
        .unwrap()
        .body
}

#[tokio::test]
async fn parallel_creates_on_one_schema_are_serialized() {
    let server = mounted(GroupSchemaFake::new(0)).await;
    let provider = provider_for(&server);
    let registry = Registry::okta();
    let dir = tempfile::tempdir().unwrap();
    let persistence = StatePersistence::new(dir.path().join("state.json"));
    let mut state = ProviderState::default();

    let permissions = ["READ_ONLY", "READ_WRITE", "HIDE", "READ_WRITE", "READ_ONLY"];
    let decls = declarations(&permissions);
    let planned = plan(&registry, &decls, &state).unwrap();
    assert_eq!(planned.count(Action::Create), 5);

    let report = apply(&provider, &registry, &decls, &planned, &mut state, &persistence)
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.created, 5);

    // Each write is followed by its own read-back before the next write.
    let seen = calls(&server).await;
    assert_eq!(seen.len(), 10);
    for pair in seen.chunks(2) {
        assert_eq!(pair, [format!("POST {GROUP_SCHEMA}"), format!("GET {GROUP_SCHEMA}")]);
    }

    let doc = final_document(&server).await;
    let properties = doc["definitions"]["custom"]["properties"].as_object().unwrap();
    assert_eq!(properties.len(), 5);
    for (i, permission) in permissions.iter().enumerate() {
        let attr = &properties[&format!("attr{i}")];
        assert_eq!(attr["permissions"], json!([{"principal": "SELF", "action": permission}]));
    }

    assert!(!plan(&registry, &decls, &state).unwrap().has_changes());
}

#[tokio::test]
async fn stale_read_back_is_retried_until_the_write_shows() {
    let server = mounted(GroupSchemaFake::new(2)).await;
    let provider = provider_for(&server);
    let registry = Registry::okta();
    let dir = tempfile::tempdir().unwrap();
    let persistence = StatePersistence::new(dir.path().join("state.json"));
    let mut state = ProviderState::default();

    let decls = declarations(&["READ_WRITE"]);
    let planned = plan(&registry, &decls, &state).unwrap();
    let report = apply(&provider, &registry, &decls, &planned, &mut state, &persistence)
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failures);

    let seen = calls(&server).await;
    assert_eq!(seen.len(), 6, "{seen:?}");
    let record = state.resources.values().next().unwrap();
    assert_eq!(record.data.get_str("permissions"), Some("READ_WRITE"));
}
