// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! End-to-end chat turns against a local HTTP server standing in for the
//! vendor APIs.

use std::sync::Arc;

use aibar::config::{AiSettings, ConfigSource};
use aibar::llm::providers::{ClaudeClient, OpenAiClient};
use aibar::llm::{ModelFamily, ProviderRegistry, ProviderTransport};
use aibar::session::{ChatController, ChatRequest, MemoryStorage, SessionStore, TurnOutcome};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn controller(server: &MockServer, settings: AiSettings) -> (ChatController, ConfigSource) {
    let source = ConfigSource::new(settings);
    let openai_url = format!("{}/v1/chat/completions", server.uri());
    let claude_url = format!("{}/v1/messages", server.uri());
    let registry = ProviderRegistry::with_factory(
        source.clone(),
        Box::new(
            move |model: &str, family: ModelFamily| -> Box<dyn ProviderTransport> {
                match family {
                    ModelFamily::OpenAi => Box::new(OpenAiClient::with_base_url(model, &openai_url)),
                    ModelFamily::Claude => Box::new(ClaudeClient::with_base_url(model, &claude_url)),
                }
            },
        ),
    );
    let store = SessionStore::open(Box::new(MemoryStorage::new()), "gpt-4").unwrap();
    (ChatController::new(store, Arc::new(registry)), source)
}

fn openai_key(key: &str) -> AiSettings {
    AiSettings {
        openai_api_key: Some(key.to_string()),
        ..Default::default()
    }
}

async fn ask(chat: &ChatController, text: &str, model: &str) -> TurnOutcome {
    chat.chat_with_ai(ChatRequest::new(text, model), None, &CancellationToken::new())
        .await
        .unwrap()
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_openai_turns_carry_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Use an iterator."}}]
        })))
        .mount(&server)
        .await;

    let (chat, _source) = controller(&server, openai_key("sk-test"));
    let first = ask(&chat, "How do I loop?", "gpt-4").await;
    assert!(matches!(first, TurnOutcome::Replied(ref m) if m.text == "Use an iterator."));
    ask(&chat, "And in reverse?", "gpt-4").await;

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["messages"].as_array().unwrap().len(), 2);
    let second = bodies[1]["messages"].as_array().unwrap();
    assert_eq!(second.len(), 4);
    assert_eq!(second[0]["role"], "system");
    assert_eq!(second[2]["content"], "Use an iterator.");
    assert_eq!(second[3]["content"], "And in reverse?");

    let store = chat.store();
    assert_eq!(store.current_session().unwrap().messages.len(), 4);
}

#[tokio::test]
async fn test_unauthorized_is_recorded_as_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let (chat, _source) = controller(&server, openai_key("sk-wrong"));
    let outcome = ask(&chat, "hello", "gpt-4").await;
    let TurnOutcome::Failed(message) = outcome else {
        panic!("expected a failure, got {:?}", outcome);
    };
    assert_eq!(message.text, "OpenAI API error: Incorrect API key provided");

    let store = chat.store();
    let session = store.current_session().unwrap();
    assert_eq!(session.messages.len(), 2);
    assert!(session.messages[1].is_error);
    assert!(!store.is_typing());
}

#[tokio::test]
async fn test_missing_key_never_reaches_the_network() {
    let server = MockServer::start().await;
    let (chat, _source) = controller(&server, AiSettings::default());

    let outcome = ask(&chat, "hello", "claude-3-opus").await;
    let TurnOutcome::Failed(message) = outcome else {
        panic!("expected a failure, got {:?}", outcome);
    };
    assert_eq!(message.text, "Anthropic API key is required");
    assert!(request_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn test_key_change_applies_without_losing_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}]
        })))
        .mount(&server)
        .await;

    let (chat, source) = controller(&server, openai_key("sk-old"));
    ask(&chat, "first", "gpt-4").await;
    source.update(openai_key("sk-new"));
    ask(&chat, "second", "gpt-4").await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers["authorization"], "Bearer sk-old");
    assert_eq!(requests[1].headers["authorization"], "Bearer sk-new");
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(second["messages"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_claude_turn_sends_system_separately() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Lifetimes tie borrows to scopes."}],
            "usage": {"input_tokens": 10, "output_tokens": 6}
        })))
        .mount(&server)
        .await;

    let settings = AiSettings {
        anthropic_api_key: Some("sk-ant".to_string()),
        ..Default::default()
    };
    let (chat, _source) = controller(&server, settings);
    let outcome = ask(&chat, "Explain lifetimes", "claude-3-opus").await;
    assert!(matches!(outcome, TurnOutcome::Replied(ref m) if m.text == "Lifetimes tie borrows to scopes."));

    let bodies = request_bodies(&server).await;
    assert!(bodies[0]["system"].as_str().is_some());
    let messages = bodies[0]["messages"].as_array().unwrap();
    assert!(messages.iter().all(|m| m["role"] != "system"));
}
