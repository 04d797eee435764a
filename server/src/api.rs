//! チャット補完 HTTP エンドポイント

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use vc_core::domain::error::AppError;
use vc_core::infra::completion::{
    ClaudeGateway, CompletionGateway, CompletionRequest, GatewayError,
};
use vc_core::infra::metrics::{Metrics, MetricsSummary};

use crate::config::ServeArgs;
use crate::error::{Result, ServerError};

/// ハンドラ共有状態
#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<dyn CompletionGateway>,
    /// 認証情報が設定されているか（/api/health 用）
    pub has_credential: bool,
    pub metrics: Arc<Metrics>,
}

/// リクエストボディ。prompt の欠落は 400 で返すため Option で受ける
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionBody {
    pub prompt: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// ルーター（CORS なし）
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/chat-completion", post(chat_completion))
        .route("/api/health", get(health))
        .route("/api/metrics", get(metrics))
        .with_state(state)
}

/// フロントエンドのオリジンだけを許可する CORS レイヤー
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|_| ServerError::InvalidOrigin(allowed_origin.to_string()))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}

/// `serve` サブコマンド本体
pub async fn serve(args: ServeArgs) -> Result<()> {
    let gateway = ClaudeGateway::new(args.provider.api_key.clone(), args.provider.settings())?;
    let state = Arc::new(ApiState {
        has_credential: gateway.has_credential(),
        gateway: Arc::new(gateway),
        metrics: Arc::new(Metrics::new()),
    });

    let app = router(state).layer(cors_layer(&args.allowed_origin)?);
    let listener = TcpListener::bind(args.bind).await?;
    log::info!(
        "Chat completion endpoint listening on http://{} (origin {})",
        listener.local_addr()?,
        args.allowed_origin
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
    }
}

/// POST /api/chat-completion
async fn chat_completion(
    State(state): State<Arc<ApiState>>,
    body: std::result::Result<Json<ChatCompletionBody>, JsonRejection>,
) -> std::result::Result<Json<ChatCompletionResponse>, ApiError> {
    let Json(body) = body.map_err(|e| {
        log::debug!("Rejected request body: {e}");
        ApiError::BadRequest("Invalid request body")
    })?;

    let prompt = body
        .prompt
        .filter(|p| !p.is_empty())
        .ok_or(ApiError::BadRequest("Prompt is required"))?;

    let mut request = CompletionRequest::new(prompt);
    if let Some(system_prompt) = body.system_prompt {
        request = request.with_system_prompt(system_prompt);
    }

    let started = Instant::now();
    let result = state.gateway.complete(&request).await;
    state
        .metrics
        .record_latency("completion", started.elapsed().as_millis() as u64);

    match result {
        Ok(response) => {
            state.metrics.inc_completions_served();
            Ok(Json(ChatCompletionResponse { response }))
        }
        Err(e) => {
            state.metrics.inc_error(AppError::from(e.clone()).code);
            Err(ApiError::CompletionFailed(e))
        }
    }
}

/// GET /api/health
async fn health(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<HealthResponse>) {
    if state.has_credential {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                error: None,
            }),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
                status: "unhealthy",
                error: Some("Completion provider credential not configured"),
            }),
        )
    }
}

/// GET /api/metrics
async fn metrics(State(state): State<Arc<ApiState>>) -> Json<MetricsSummary> {
    Json(state.metrics.summary())
}

/// エンドポイントのエラー。詳細はログのみに出し、レスポンスには固定文言を返す
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    CompletionFailed(GatewayError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: &'static str,
        }

        let (status, error) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::CompletionFailed(e) => {
                log::error!("Chat completion failed: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to process request")
            }
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_rejects_invalid_origin() {
        assert!(cors_layer("http://localhost:3000").is_ok());
        assert!(matches!(
            cors_layer("http://bad\norigin"),
            Err(ServerError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn test_body_accepts_missing_fields() {
        let body: ChatCompletionBody = serde_json::from_str("{}").unwrap();
        assert!(body.prompt.is_none());

        let body: ChatCompletionBody =
            serde_json::from_str(r#"{"prompt":"hi","systemPrompt":"be brief"}"#).unwrap();
        assert_eq!(body.system_prompt.as_deref(), Some("be brief"));
    }
}
