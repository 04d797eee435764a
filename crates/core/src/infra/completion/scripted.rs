use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{CompletionGateway, CompletionRequest, GatewayError};

/// ScriptedGateway: 事前に積んだ結果を順に返すモック実装。
/// 受け取ったリクエストを記録する。
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// 成功応答を積む
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(text.into()));
        self
    }

    /// 失敗応答を積む
    pub fn fail(self, error: GatewayError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// 応答前に gate の permit を 1 つ待つ（進行中のリクエストを再現する）
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        self.requests.lock().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| GatewayError::Transport("gate closed".to_string()))?
                .forget();
        }

        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::provider(None, "no scripted reply")))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
