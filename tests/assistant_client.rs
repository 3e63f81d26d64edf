//! Gemini client behaviour against a mock provider.

use std::time::Duration;

use forcelink_lib::assistant::{
    prompts, AssistantConfig, AssistantError, AssistantSession, ChatMessage, Conversation,
    GeminiClient,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(AssistantConfig {
        api_key: Some("test-key".into()),
        base_url: server.uri(),
        ..AssistantConfig::default()
    })
}

fn reply(text: &str) -> serde_json::Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

#[tokio::test]
async fn generate_sends_prompt_and_generation_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "temperature": 0.7, "maxOutputTokens": 800 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Focus on the renewal.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let session = AssistantSession::new(Duration::ZERO);
    let history = [ChatMessage::ai("Earlier answer")];
    let text = client
        .generate(&session, "rules", "What next?", "ctx", &history)
        .await
        .expect("reply");
    assert_eq!(text, "Focus on the renewal.");

    let requests = server.received_requests().await.expect("recorded requests");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("json body");
    let contents = body["contents"].as_array().expect("contents");
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[0]["role"], "model");
    let prompt = contents[1]["parts"][0]["text"].as_str().expect("prompt text");
    assert!(prompt.contains("[USER_QUESTION]\nWhat next?"));
    assert!(prompt.contains("[CURRENT_CRM_DATA_CONTEXT]\nctx"));
}

#[tokio::test]
async fn rate_limit_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({ "error": { "message": "quota" } })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let session = AssistantSession::new(Duration::ZERO);
    let err = client
        .generate(&session, "rules", "hi", "ctx", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::RateLimited));
}

#[tokio::test]
async fn api_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": { "message": "API key not valid" } })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate(&AssistantSession::new(Duration::ZERO), "rules", "hi", "ctx", &[])
        .await
        .unwrap_err();
    match err {
        AssistantError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_candidates_fall_back_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let text = client
        .generate(&AssistantSession::new(Duration::ZERO), "rules", "hi", "ctx", &[])
        .await
        .expect("reply");
    assert_eq!(text, "No response generated.");
}

#[tokio::test]
async fn second_call_inside_interval_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let session = AssistantSession::new(Duration::from_secs(60));
    client
        .generate(&session, "rules", "first", "ctx", &[])
        .await
        .expect("first call");
    let err = client
        .generate(&session, "rules", "second", "ctx", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::CoolingDown));
}

#[tokio::test]
async fn conversation_records_reply_then_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Here is a follow-up template.")))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let session = AssistantSession::new(Duration::from_secs(60));
    let mut conversation = Conversation::new();

    let first = conversation
        .send(&client, &session, "Draft a follow-up email")
        .await
        .cloned();
    assert_eq!(first, Some(ChatMessage::ai("Here is a follow-up template.")));

    let second = conversation.send(&client, &session, "And another").await.cloned();
    assert_eq!(second, Some(ChatMessage::ai(prompts::UNAVAILABLE)));
    assert_eq!(conversation.messages().len(), 5);
}
