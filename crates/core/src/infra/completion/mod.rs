pub mod claude;
pub mod prompts;
pub mod proxy;
mod scripted;

pub use claude::ClaudeGateway;
pub use proxy::ProxyGateway;
pub use scripted::ScriptedGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::AppError;

/// 補完リクエスト（1 回のやり取りだけ有効）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub prompt: String,
    /// 省略時は設定のペルソナを使う
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// 補完ゲートウェイのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// 通信失敗・タイムアウト
    #[error("Transport error: {0}")]
    Transport(String),
    /// プロバイダが成功以外を返した（認証情報なしも含む）
    #[error("Provider error: {message}")]
    Provider { status: Option<u16>, message: String },
    /// 先頭のコンテンツブロックがテキストではない
    #[error("Unexpected response kind: {0}")]
    UnexpectedResponseKind(String),
}

impl GatewayError {
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        let message = e.to_string();
        match e {
            GatewayError::Transport(_) => AppError::transport(message),
            GatewayError::Provider { .. } => AppError::provider(message),
            GatewayError::UnexpectedResponseKind(_) => AppError::unexpected_response(message),
        }
    }
}

/// 補完ゲートウェイ trait。リトライもキャッシュもしない。
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError>;

    fn name(&self) -> &str;
}
