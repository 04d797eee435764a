//! コマンドライン・環境変数の設定

use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};
use vc_core::domain::settings::CompletionSettings;

/// Voice chat front end and completion proxy
#[derive(Debug, Parser)]
#[command(name = "voice-chat", version, about)]
pub struct Cli {
    /// Increase verbosity (-v for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Host the chat-completion HTTP endpoint
    Serve(ServeArgs),
    /// Run the terminal voice chat
    Chat(ChatArgs),
}

/// 補完プロバイダの設定（両サブコマンド共通）
#[derive(Debug, Clone, Args)]
pub struct ProviderArgs {
    /// Completion provider credential
    #[arg(long, env = "CLAUDE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier
    #[arg(long, env = "VC_MODEL")]
    pub model: Option<String>,

    /// Maximum tokens per reply
    #[arg(long, env = "VC_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// Default assistant persona
    #[arg(long, env = "VC_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Provider API base URL
    #[arg(long, env = "VC_API_BASE")]
    pub api_base: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "VC_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

impl ProviderArgs {
    /// 既定値に指定分だけ上書きする
    pub fn settings(&self) -> CompletionSettings {
        let mut settings = CompletionSettings::default();
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            settings.max_tokens = max_tokens;
        }
        if let Some(prompt) = self.system_prompt.as_ref().filter(|p| !p.trim().is_empty()) {
            settings.system_prompt = prompt.clone();
        }
        if let Some(api_base) = &self.api_base {
            settings.api_base = api_base.clone();
        }
        if let Some(timeout_secs) = self.timeout_secs {
            settings.timeout_secs = timeout_secs;
        }
        settings
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Address to listen on
    #[arg(long, env = "VC_BIND", default_value = "127.0.0.1:3001")]
    pub bind: SocketAddr,

    /// Front-end origin allowed by CORS
    #[arg(long, env = "VC_ALLOWED_ORIGIN", default_value = "http://localhost:3000")]
    pub allowed_origin: String,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Base URL of a running `serve` instance
    #[arg(long, env = "VC_SERVER_URL", default_value = "http://127.0.0.1:3001")]
    pub server_url: String,

    /// Call the provider directly instead of going through the server
    #[arg(long)]
    pub direct: bool,

    /// External text-to-speech command (e.g. "espeak -s 160")
    #[arg(long)]
    pub tts_command: Option<String>,

    /// Recognition language hint (e.g. "en-US")
    #[arg(long)]
    pub language: Option<String>,
}
