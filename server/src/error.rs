use vc_core::domain::speech::SynthesisError;
use vc_core::infra::completion::GatewayError;

/// 起動・実行時エラー（致命的なものだけ）
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid allowed origin: {0}")]
    InvalidOrigin(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("synthesizer error: {0}")]
    Synthesis(#[from] SynthesisError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
