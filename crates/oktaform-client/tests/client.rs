use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oktaform_client::{ApiRequest, ClientConfig, ClientError, Credentials, OktaClient};

fn client_for(server: &MockServer) -> OktaClient {
    let mut config = ClientConfig::new(Credentials::ApiToken {
        token: "test-token".into(),
    });
    config.endpoint = Some(Url::parse(&server.uri()).unwrap());
    config.min_wait = Duration::from_millis(10);
    config.max_wait = Duration::from_millis(50);
    config.max_retries = 2;
    OktaClient::new(config).unwrap()
}

#[tokio::test]
async fn sends_ssws_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u1"))
        .and(header("authorization", "SSWS test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "00u1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client
        .execute(&ApiRequest::get("/api/v1/users/00u1"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.body["id"], "00u1");
}

#[tokio::test]
async fn retries_throttled_requests_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zones"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client
        .execute(&ApiRequest::get("/api/v1/zones"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn surfaces_throttle_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/zones"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "errorCode": "E0000047",
            "errorSummary": "API call exceeded rate limit due to too many requests."
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .execute(&ApiRequest::get("/api/v1/zones"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(429));
    // initial attempt plus two retries
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn follows_next_links() {
    let server = MockServer::start().await;
    let next = format!("<{}/api/v1/groups?after=g2>; rel=\"next\"", server.uri());
    Mock::given(method("GET"))
        .and(path("/api/v1/groups"))
        .and(query_param("after", "g2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "g3"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/groups"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", next.as_str())
                .set_body_json(json!([{"id": "g1"}, {"id": "g2"}])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let items = client
        .list_all(&ApiRequest::get("/api/v1/groups"), &CancellationToken::new())
        .await
        .unwrap();
    let ids: Vec<_> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["g1", "g2", "g3"]);
}

#[tokio::test]
async fn cancellation_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/apps"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let err = client
        .execute(&ApiRequest::get("/api/v1/apps"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
}

#[tokio::test]
async fn api_error_carries_summary_and_causes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/trustedOrigins"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorCode": "E0000001",
            "errorSummary": "Api validation failed: origin",
            "errorCauses": [{"errorSummary": "origin: An object with this field already exists"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .execute(
            &ApiRequest::post("/api/v1/trustedOrigins").body(json!({"name": "x"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.message_contains("already exists"));
    assert!(err.to_string().contains("E0000001"));
}
