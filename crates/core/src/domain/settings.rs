use serde::{Deserialize, Serialize};

/// systemPrompt が省略された時のアシスタントペルソナ
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful voice assistant that processes commands and provides concise responses.";

/// 補完プロバイダ設定。起動時に一度だけ決まり、実行中は変更しない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// モデル ID
    pub model: String,
    /// 応答の最大トークン数
    pub max_tokens: u32,
    /// systemPrompt 省略時に使うペルソナ
    pub system_prompt: String,
    /// API のベース URL（テストではローカルサーバーに向ける）
    pub api_base: String,
    /// リクエストタイムアウト（秒）
    pub timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "claude-3-opus-20240229".to_string(),
            max_tokens: 1024,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            api_base: "https://api.anthropic.com".to_string(),
            timeout_secs: 30,
        }
    }
}
