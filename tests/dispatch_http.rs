//! HTTP compute provider tests against a mock platform endpoint.

use std::time::Duration;

use mockito::Matcher;
use serde_json::json;

use artifact_tasks::dispatch::http::HttpComputeProvider;
use artifact_tasks::dispatch::{ComputeProvider, DispatchConfig, DispatchError, SpawnRequest};
use artifact_tasks::TaskOptions;

fn spawn_request(task_id: &str) -> SpawnRequest {
    let mut config = DispatchConfig::new("https://tasks.example.com", "outputs");
    config.image = Some("worker:1".to_string());
    config.region = Some("ord".to_string());
    SpawnRequest::for_task(task_id, "X1", &TaskOptions::default(), &config).unwrap()
}

fn provider(server: &mockito::ServerGuard) -> HttpComputeProvider {
    HttpComputeProvider::new(format!("{}/v1/machines", server.url()), Duration::from_secs(5))
}

#[tokio::test]
async fn accepted_spawn_returns_handle() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/machines")
        .match_header("authorization", "Bearer secret-token")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "taskId": "t-1",
            "name": "task-t-1",
            "image": "worker:1",
            "region": "ord",
            "callbackUrl": "https://tasks.example.com/tasks/t-1/callback",
            "autoDestroy": true,
            "env": {
                "TASK_ID": "t-1",
                "SUBJECT": "X1",
                "ARTIFACT_BUCKET": "outputs",
                "ARTIFACT_PREFIX": "artifacts/t-1/"
            }
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"m-42","name":"task-t-1","region":"ord","state":"created"}"#)
        .create_async()
        .await;

    let handle = provider(&server)
        .with_token("secret-token")
        .spawn(&spawn_request("t-1"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(handle.provider, "http");
    assert_eq!(handle.id, "m-42");
    assert_eq!(handle.details["region"], "ord");
    assert_eq!(handle.details["state"], "created");
}

#[tokio::test]
async fn minimal_body_has_no_details() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/machines")
        .with_status(200)
        .with_body(r#"{"id":"m-1","extra":"ignored"}"#)
        .create_async()
        .await;

    let handle = provider(&server).spawn(&spawn_request("t-2")).await.unwrap();
    assert_eq!(handle.id, "m-1");
    assert!(handle.details.is_empty());
}

#[tokio::test]
async fn no_token_sends_no_authorization() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/machines")
        .match_header("authorization", Matcher::Missing)
        .with_status(201)
        .with_body(r#"{"id":"m-1"}"#)
        .create_async()
        .await;

    provider(&server).spawn(&spawn_request("t-3")).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/machines")
        .with_status(422)
        .with_body("image not found")
        .create_async()
        .await;

    let err = provider(&server)
        .spawn(&spawn_request("t-4"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::Rejected {
            status: 422,
            body: "image not found".to_string(),
        }
    );
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/machines")
        .with_status(201)
        .with_body("<html>ok</html>")
        .create_async()
        .await;

    let err = provider(&server)
        .spawn(&spawn_request("t-5"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::MalformedResponse { .. }), "{err}");
}

#[tokio::test]
async fn empty_id_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/machines")
        .with_status(201)
        .with_body(r#"{"id":"  "}"#)
        .create_async()
        .await;

    let err = provider(&server)
        .spawn(&spawn_request("t-6"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::MalformedResponse { .. }), "{err}");
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    let provider = HttpComputeProvider::new("http://127.0.0.1:1/v1/machines", Duration::from_secs(5));
    let err = provider.spawn(&spawn_request("t-7")).await.unwrap_err();
    assert!(
        matches!(err, DispatchError::Transport { .. } | DispatchError::Timeout),
        "{err}"
    );
}
