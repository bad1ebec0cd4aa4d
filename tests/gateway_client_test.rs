// ABOUTME: Integration tests for the LLM gateway client against a stub upstream server
// ABOUTME: Covers option discovery for guests and key holders, normalization, and submission errors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{spawn_stub_gateway, SubmitBehavior};
use parley_chat_server::config::environment::GatewayConfig;
use parley_chat_server::errors::ErrorCode;
use parley_chat_server::gateway::{GatewayClient, PromptMessage};
use serde_json::json;

fn client_for(base_url: &str) -> GatewayClient {
    GatewayClient::new(&GatewayConfig {
        base_url: base_url.to_owned(),
        request_timeout_secs: 5,
    })
    .unwrap()
}

fn prompt(content: &str) -> Vec<PromptMessage> {
    vec![PromptMessage {
        role: "user".to_owned(),
        content: content.to_owned(),
    }]
}

// ============================================================================
// Option Discovery
// ============================================================================

#[tokio::test]
async fn test_guest_sees_only_local_options() {
    let stub = spawn_stub_gateway().await;
    stub.set_llms(json!({
        "llms": [
            { "uuid": "local-1", "description": "Local", "llm_type": "local",
              "available_models": ["m1"], "internal_port": 11434 },
            { "uuid": "cloud-1", "description": "Cloud", "llm_type": "openai",
              "available_models": ["gpt"] },
        ]
    }));

    let client = client_for(&stub.base_url);
    let options = client.available_options(None).await.unwrap();

    assert_eq!(options.len(), 1);
    assert_eq!(options[0].uuid, "local-1");
    assert_eq!(options[0].llm_type, "local");
    assert_eq!(options[0].available_models, vec!["m1".to_owned()]);

    // Normalization drops fields beyond the four shared keys.
    let serialized = serde_json::to_value(&options[0]).unwrap();
    assert!(serialized.get("internal_port").is_none());
}

#[tokio::test]
async fn test_guest_without_local_backend_gets_no_backend_error() {
    let stub = spawn_stub_gateway().await;
    stub.set_llms(json!({
        "llms": [
            { "uuid": "cloud-1", "description": "Cloud", "llm_type": "openai",
              "available_models": ["gpt"] },
        ]
    }));

    let client = client_for(&stub.base_url);
    let err = client.available_options(None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NoBackendAvailable);
}

#[tokio::test]
async fn test_authenticated_caller_gets_keys_plus_local() {
    let stub = spawn_stub_gateway().await;
    stub.set_api_keys(json!({
        "llm_api_keys": [
            { "uuid": "key-1", "description": "My key", "llm_type": "openai",
              "available_models": ["gpt"] },
        ]
    }));
    stub.set_llms(json!({
        "llms": [
            { "uuid": "local-1", "description": "Local", "llm_type": "local",
              "available_models": ["m1"] },
        ]
    }));

    let client = client_for(&stub.base_url);
    let options = client.available_options(Some("token")).await.unwrap();

    let uuids: Vec<&str> = options.iter().map(|o| o.uuid.as_str()).collect();
    assert_eq!(uuids, vec!["key-1", "local-1"]);
}

#[tokio::test]
async fn test_local_failure_is_tolerated_when_keys_exist() {
    let stub = spawn_stub_gateway().await;
    stub.set_api_keys(json!({
        "llm_api_keys": [
            { "uuid": "key-1", "description": "My key", "llm_type": "openai",
              "available_models": ["gpt"] },
        ]
    }));
    // Local backend list is empty: the local lookup fails, but provider keys
    // are a usable outcome on their own.
    stub.set_llms(json!({ "llms": [] }));

    let client = client_for(&stub.base_url);
    let options = client.available_options(Some("token")).await.unwrap();

    assert_eq!(options.len(), 1);
    assert_eq!(options[0].uuid, "key-1");
}

#[tokio::test]
async fn test_no_keys_and_no_local_is_an_error() {
    let stub = spawn_stub_gateway().await;
    // Defaults: both lists empty.
    let client = client_for(&stub.base_url);
    let err = client.available_options(Some("token")).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NoBackendAvailable);
}

#[tokio::test]
async fn test_unreachable_gateway_is_a_gateway_error() {
    // Port 9 (discard) refuses connections.
    let client = client_for("http://127.0.0.1:9");
    let err = client.available_options(None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::GatewayUnavailable);
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn test_submit_extracts_reply_and_forwards_credential() {
    let stub = spawn_stub_gateway().await;
    stub.set_submit(SubmitBehavior::Reply("the reply".to_owned()));

    let client = client_for(&stub.base_url);
    let reply = client
        .submit(Some("secret-token"), "key-1", "gpt", &prompt("hello"))
        .await
        .unwrap();

    assert_eq!(reply, "the reply");

    let submits = stub.submits();
    assert_eq!(submits.len(), 1);
    assert_eq!(submits[0].provider, "key-1");
    assert_eq!(submits[0].model, "gpt");
    assert_eq!(
        submits[0].authorization.as_deref(),
        Some("Bearer secret-token")
    );
    assert_eq!(submits[0].prompt[0]["role"], "user");
    assert_eq!(submits[0].prompt[0]["content"], "hello");
}

#[tokio::test]
async fn test_submit_missing_reply_field_yields_empty_string() {
    let stub = spawn_stub_gateway().await;
    stub.set_submit(SubmitBehavior::EmptyResponse);

    let client = client_for(&stub.base_url);
    let reply = client.submit(None, "local-1", "m1", &prompt("hi")).await.unwrap();
    assert_eq!(reply, "");
}

#[tokio::test]
async fn test_submit_non_success_status_is_a_gateway_error() {
    let stub = spawn_stub_gateway().await;
    stub.set_submit(SubmitBehavior::Status(500));

    let client = client_for(&stub.base_url);
    let err = client
        .submit(None, "local-1", "m1", &prompt("hi"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::GatewayUnavailable);
}

#[tokio::test]
async fn test_submit_malformed_body_is_a_parse_error() {
    let stub = spawn_stub_gateway().await;
    stub.set_submit(SubmitBehavior::MalformedBody);

    let client = client_for(&stub.base_url);
    let err = client
        .submit(None, "local-1", "m1", &prompt("hi"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::GatewayResponseInvalid);
}

#[tokio::test]
async fn test_submit_sends_full_history_in_order() {
    let stub = spawn_stub_gateway().await;

    let history = vec![
        PromptMessage {
            role: "user".to_owned(),
            content: "first".to_owned(),
        },
        PromptMessage {
            role: "assistant".to_owned(),
            content: "second".to_owned(),
        },
        PromptMessage {
            role: "user".to_owned(),
            content: "third".to_owned(),
        },
    ];

    let client = client_for(&stub.base_url);
    client
        .submit(None, "local-1", "m1", &history)
        .await
        .unwrap();

    let submits = stub.submits();
    let prompt = submits[0].prompt.as_array().unwrap();
    assert_eq!(prompt.len(), 3);
    assert_eq!(prompt[0]["content"], "first");
    assert_eq!(prompt[1]["role"], "assistant");
    assert_eq!(prompt[2]["content"], "third");
}
