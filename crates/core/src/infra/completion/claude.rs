use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompts;
use super::{CompletionGateway, CompletionRequest, GatewayError};
use crate::domain::settings::CompletionSettings;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude Messages API を使用した補完ゲートウェイ
pub struct ClaudeGateway {
    client: reqwest::Client,
    api_key: Option<String>,
    settings: CompletionSettings,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ClaudeGateway {
    /// api_key が None または空文字の場合でも生成できる（呼び出し毎に Provider エラー）
    pub fn new(api_key: Option<String>, settings: CompletionSettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {e}")))?;

        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            log::warn!("Completion provider credential is not configured; every request will fail");
        }

        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.settings.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionGateway for ClaudeGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::provider(None, "API key is not configured"))?;

        let system = prompts::resolve_system_prompt(
            request.system_prompt.as_deref(),
            &self.settings.system_prompt,
        );

        let body = MessageRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        log::debug!("Claude request: model={} prompt_len={}", body.model, request.prompt.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Transport("Request timed out".to_string())
                } else {
                    GatewayError::Transport(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .map(|env| env.error.message)
                .unwrap_or(raw);
            return Err(GatewayError::provider(
                Some(status.as_u16()),
                format!("Claude API error: {status} - {message}"),
            ));
        }

        let msg_response: MessageResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Transport("Request timed out".to_string())
            } else {
                GatewayError::UnexpectedResponseKind(format!("Response parse error: {e}"))
            }
        })?;

        let first = msg_response
            .content
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::UnexpectedResponseKind("empty content".to_string()))?;

        match (first.kind.as_str(), first.text) {
            ("text", Some(text)) => Ok(text),
            (kind, _) => Err(GatewayError::UnexpectedResponseKind(kind.to_string())),
        }
    }

    fn name(&self) -> &str {
        "claude"
    }
}
