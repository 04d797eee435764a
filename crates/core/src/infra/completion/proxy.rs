use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{CompletionGateway, CompletionRequest, GatewayError};

/// 自前の HTTP 境界（POST /api/chat-completion）経由で補完を得るゲートウェイ。
/// フロントエンドはプロバイダの認証情報を持たないため、こちらを使う。
pub struct ProxyGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ProxyResponse {
    response: Option<String>,
    error: Option<String>,
}

impl ProxyGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat-completion", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionGateway for ProxyGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(request)
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
        let body: Option<ProxyResponse> = match response.json().await {
            Ok(body) => Some(body),
            Err(e) if e.is_timeout() => {
                return Err(GatewayError::Transport("Request timed out".to_string()))
            }
            Err(_) => None,
        };

        if !status.is_success() {
            let message = body
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            return Err(GatewayError::provider(Some(status.as_u16()), message));
        }

        body.and_then(|b| b.response)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| GatewayError::UnexpectedResponseKind("No response from AI".to_string()))
    }

    fn name(&self) -> &str {
        "proxy"
    }
}
