//! 補完ゲートウェイの結合テスト
//!
//! 127.0.0.1:0 にモックプロバイダを立て、実際の HTTP 往復を確認する。

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use vc_core::domain::settings::{CompletionSettings, DEFAULT_SYSTEM_PROMPT};
use vc_core::infra::completion::{
    ClaudeGateway, CompletionGateway, CompletionRequest, GatewayError, ProxyGateway,
};

struct Seen {
    headers: HeaderMap,
    body: Value,
}

#[derive(Clone)]
struct MockProvider {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Vec<Seen>>>,
}

async fn handle(
    State(mock): State<MockProvider>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    mock.seen.lock().push(Seen { headers, body });
    (mock.status, Json(mock.reply.clone()))
}

/// モックを起動し、ベース URL と受信記録を返す
async fn spawn_provider(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Seen>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mock = MockProvider {
        status,
        reply,
        seen: seen.clone(),
    };
    let app = Router::new()
        .route("/v1/messages", post(handle))
        .route("/api/chat-completion", post(handle))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

/// 応答前に delay だけ待つプロバイダ
async fn spawn_slow_provider(delay: Duration) -> String {
    let slow = move || async move {
        tokio::time::sleep(delay).await;
        Json(json!({"response": "too late"}))
    };
    let app = Router::new()
        .route("/v1/messages", post(slow))
        .route("/api/chat-completion", post(slow));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn claude(base: &str) -> ClaudeGateway {
    let settings = CompletionSettings {
        api_base: base.to_string(),
        timeout_secs: 5,
        ..Default::default()
    };
    ClaudeGateway::new(Some("test-key".to_string()), settings).unwrap()
}

fn text_reply(text: &str) -> Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn"
    })
}

#[tokio::test]
async fn test_claude_returns_first_text_block() {
    let (base, seen) = spawn_provider(StatusCode::OK, text_reply("The lights are off.")).await;

    let reply = claude(&base)
        .complete(&CompletionRequest::new("turn off the lights"))
        .await
        .unwrap();
    assert_eq!(reply, "The lights are off.");

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.headers["x-api-key"], "test-key");
    assert_eq!(request.headers["anthropic-version"], "2023-06-01");
    assert_eq!(request.body["model"], "claude-3-opus-20240229");
    assert_eq!(request.body["max_tokens"], 1024);
    assert_eq!(request.body["system"], DEFAULT_SYSTEM_PROMPT);
    assert_eq!(
        request.body["messages"],
        json!([{"role": "user", "content": "turn off the lights"}])
    );
}

#[tokio::test]
async fn test_claude_uses_requested_system_prompt() {
    let (base, seen) = spawn_provider(StatusCode::OK, text_reply("ok")).await;

    claude(&base)
        .complete(&CompletionRequest::new("hello").with_system_prompt("Answer in French."))
        .await
        .unwrap();

    assert_eq!(seen.lock()[0].body["system"], "Answer in French.");
}

#[tokio::test]
async fn test_claude_non_text_block_is_unexpected() {
    let reply = json!({
        "content": [{"type": "tool_use", "id": "toolu_01", "name": "lights", "input": {}}]
    });
    let (base, _) = spawn_provider(StatusCode::OK, reply).await;

    let err = claude(&base)
        .complete(&CompletionRequest::new("turn off the lights"))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::UnexpectedResponseKind("tool_use".to_string()));
}

#[tokio::test]
async fn test_claude_empty_content_is_unexpected() {
    let (base, _) = spawn_provider(StatusCode::OK, json!({"content": []})).await;

    let err = claude(&base)
        .complete(&CompletionRequest::new("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnexpectedResponseKind(_)));
}

#[tokio::test]
async fn test_claude_provider_error_carries_status_and_message() {
    let reply = json!({
        "type": "error",
        "error": {"type": "authentication_error", "message": "invalid x-api-key"}
    });
    let (base, _) = spawn_provider(StatusCode::UNAUTHORIZED, reply).await;

    let err = claude(&base)
        .complete(&CompletionRequest::new("hello"))
        .await
        .unwrap_err();
    match err {
        GatewayError::Provider { status, message } => {
            assert_eq!(status, Some(401));
            assert!(message.contains("invalid x-api-key"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_claude_unreachable_provider_is_transport_error() {
    let settings = CompletionSettings {
        api_base: "http://127.0.0.1:9".to_string(),
        timeout_secs: 2,
        ..Default::default()
    };
    let gateway = ClaudeGateway::new(Some("test-key".to_string()), settings).unwrap();

    let err = gateway
        .complete(&CompletionRequest::new("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn test_claude_timeout_is_transport_error() {
    let base = spawn_slow_provider(Duration::from_secs(3)).await;
    let settings = CompletionSettings {
        api_base: base,
        timeout_secs: 1,
        ..Default::default()
    };
    let gateway = ClaudeGateway::new(Some("test-key".to_string()), settings).unwrap();

    let err = gateway
        .complete(&CompletionRequest::new("hello"))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Transport("Request timed out".to_string()));
}

#[tokio::test]
async fn test_proxy_round_trip() {
    let (base, seen) = spawn_provider(StatusCode::OK, json!({"response": "Hi there."})).await;
    let gateway = ProxyGateway::new(base, Duration::from_secs(5)).unwrap();

    let reply = gateway
        .complete(&CompletionRequest::new("hello").with_system_prompt("Be terse."))
        .await
        .unwrap();
    assert_eq!(reply, "Hi there.");
    assert_eq!(
        seen.lock()[0].body,
        json!({"prompt": "hello", "systemPrompt": "Be terse."})
    );
}

#[tokio::test]
async fn test_proxy_error_body_is_surfaced() {
    let (base, _) = spawn_provider(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "Failed to process request"}),
    )
    .await;
    let gateway = ProxyGateway::new(base, Duration::from_secs(5)).unwrap();

    let err = gateway
        .complete(&CompletionRequest::new("hello"))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::provider(Some(500), "Failed to process request"));
}

#[tokio::test]
async fn test_proxy_timeout_is_transport_error() {
    let base = spawn_slow_provider(Duration::from_secs(2)).await;
    let gateway = ProxyGateway::new(base, Duration::from_millis(200)).unwrap();

    let err = gateway
        .complete(&CompletionRequest::new("hello"))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Transport("Request timed out".to_string()));
}

#[tokio::test]
async fn test_proxy_missing_response_field() {
    let (base, _) = spawn_provider(StatusCode::OK, json!({})).await;
    let gateway = ProxyGateway::new(base, Duration::from_secs(5)).unwrap();

    let err = gateway
        .complete(&CompletionRequest::new("hello"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        GatewayError::UnexpectedResponseKind("No response from AI".to_string())
    );
}
