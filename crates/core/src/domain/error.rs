use serde::Serialize;

/// アプリケーション共通エラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// 音声認識がこの環境で使えない（セッションにとって致命的）
    #[serde(rename = "E_CAPABILITY_UNAVAILABLE")]
    CapabilityUnavailable,
    /// 認識中にプラットフォームが報告したエラー
    #[serde(rename = "E_RECOGNITION")]
    Recognition,
    #[serde(rename = "E_TRANSPORT")]
    Transport,
    #[serde(rename = "E_PROVIDER")]
    Provider,
    #[serde(rename = "E_UNEXPECTED_RESPONSE")]
    UnexpectedResponse,
    #[serde(rename = "E_INVALID_STATE")]
    InvalidState,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapabilityUnavailable => "E_CAPABILITY_UNAVAILABLE",
            Self::Recognition => "E_RECOGNITION",
            Self::Transport => "E_TRANSPORT",
            Self::Provider => "E_PROVIDER",
            Self::UnexpectedResponse => "E_UNEXPECTED_RESPONSE",
            Self::InvalidState => "E_INVALID_STATE",
            Self::Internal => "E_INTERNAL",
        }
    }
}

/// アプリケーションエラー（イベントペイロード兼用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl AppError {
    pub fn capability_unavailable(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::CapabilityUnavailable,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn recognition(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Recognition,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Transport,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Provider,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn unexpected_response(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::UnexpectedResponse,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidState,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: msg.into(),
            recoverable: false,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {}
