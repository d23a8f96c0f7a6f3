mod common;

use std::time::Duration;

use serde_json::json;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

use oktaform_provider::arbiter;
use oktaform_provider::resources::network_zone::{
    DEFAULT_ENHANCED_DYNAMIC_ZONE, NetworkZoneResource,
};
use oktaform_provider::{Operation, Resource};

use common::{Echo, calls, data, op, provider_for};

fn enhanced_zone(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "type": "DYNAMIC_V2",
        "status": "ACTIVE",
        "asns": ["64496"],
    })
}

#[tokio::test]
async fn creating_the_default_enhanced_zone_waits_for_its_lock() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/zones"))
        .respond_with(Echo("nzo1"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let (held_tx, held_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let holder = provider.arbiter().clone();
    let key = arbiter::parent_key("zone", DEFAULT_ENHANCED_DYNAMIC_ZONE);
    let blocker = tokio::spawn(async move {
        holder
            .serialize(&key, async move {
                let _ = held_tx.send(());
                let _ = release_rx.await;
            })
            .await
    });
    held_rx.await.unwrap();

    let ctx = op(&provider, Operation::Create);
    let resource = NetworkZoneResource::new();
    let desired = data(enhanced_zone(DEFAULT_ENHANCED_DYNAMIC_ZONE));
    let mut create = resource.create(&ctx, &desired);

    tokio::select! {
        _ = &mut create => panic!("create finished while the zone lock was held"),
        _ = tokio::time::sleep(Duration::from_millis(100)) => {}
    }
    assert!(calls(&server).await.is_empty());

    release_tx.send(()).unwrap();
    let observed = create.await.unwrap();
    blocker.await.unwrap();
    assert_eq!(observed.id(), Some("nzo1"));
    assert_eq!(calls(&server).await, ["POST /api/v1/zones"]);
}

#[tokio::test]
async fn other_zones_create_without_the_lock() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/zones"))
        .respond_with(Echo("nzo2"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let (held_tx, held_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let holder = provider.arbiter().clone();
    let key = arbiter::parent_key("zone", DEFAULT_ENHANCED_DYNAMIC_ZONE);
    let blocker = tokio::spawn(async move {
        holder
            .serialize(&key, async move {
                let _ = held_tx.send(());
                let _ = release_rx.await;
            })
            .await
    });
    held_rx.await.unwrap();

    let ctx = op(&provider, Operation::Create);
    let observed = NetworkZoneResource::new()
        .create(&ctx, &data(enhanced_zone("geo-asn")))
        .await
        .unwrap();
    assert_eq!(observed.id(), Some("nzo2"));

    release_tx.send(()).unwrap();
    blocker.await.unwrap();
}
