//! ターミナル版の音声チャット。
//!
//! マイクの代わりに標準入力を使う。空行で録音のトグル、録音中に入力した行は
//! 発話全体の途中結果として扱う。`/quit` で終了。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use vc_core::domain::error::ErrorCode;
use vc_core::domain::events::ChatEvent;
use vc_core::domain::session::SessionState;
use vc_core::domain::speech::{
    EndReason, RecognitionError, RecognitionSink, RecognizerConfig, RecognizerFactory,
    SpeechRecognizer, SpeechSynthesizer, SynthesisError,
};
use vc_core::infra::completion::{ClaudeGateway, CompletionGateway, ProxyGateway};
use vc_core::infra::metrics::Metrics;
use vc_core::usecase::conversation::ConversationController;
use vc_core::usecase::voice_chat::VoiceChat;

use crate::config::ChatArgs;
use crate::error::Result;

// ─── Line input (microphone stand-in) ────────────────────────────

/// 標準入力の行を認識結果として流す入力デバイス
#[derive(Default)]
pub struct LineInput {
    sink: Mutex<Option<RecognitionSink>>,
    listening: AtomicBool,
}

impl LineInput {
    /// 録音中なら行を途中結果として通知する。録音していなければ false
    pub fn feed(&self, line: &str) -> bool {
        if !self.is_listening() {
            return false;
        }
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.interim(line);
        }
        true
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

pub struct LineRecognizerFactory {
    input: Arc<LineInput>,
}

impl LineRecognizerFactory {
    pub fn new(input: Arc<LineInput>) -> Self {
        Self { input }
    }
}

struct LineRecognizer {
    input: Arc<LineInput>,
}

impl SpeechRecognizer for LineRecognizer {
    fn start(&self) -> std::result::Result<(), RecognitionError> {
        self.input.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        if !self.input.listening.swap(false, Ordering::SeqCst) {
            return;
        }
        let sink = self.input.sink.lock().clone();
        if let Some(sink) = sink {
            sink.ended(EndReason::StopRequested);
        }
    }

    fn abort(&self) {
        self.input.listening.store(false, Ordering::SeqCst);
        self.input.sink.lock().take();
    }
}

#[async_trait]
impl RecognizerFactory for LineRecognizerFactory {
    async fn create(
        &self,
        config: RecognizerConfig,
        sink: RecognitionSink,
    ) -> std::result::Result<Arc<dyn SpeechRecognizer>, RecognitionError> {
        log::debug!("Line input recognizer created (language {:?})", config.language);
        *self.input.sink.lock() = Some(sink);
        Ok(Arc::new(LineRecognizer {
            input: self.input.clone(),
        }))
    }

    fn name(&self) -> &str {
        "line-input"
    }
}

// ─── Console synthesizer ─────────────────────────────────────────

/// 返答を外部 TTS コマンドに渡す。コマンド未指定なら画面表示のみ
pub struct ConsoleSynthesizer {
    command: Option<(String, Vec<String>)>,
    child: Mutex<Option<Child>>,
}

impl ConsoleSynthesizer {
    pub fn new(command: Option<&str>) -> std::result::Result<Self, SynthesisError> {
        let command = match command {
            Some(line) => {
                let mut parts = line.split_whitespace().map(str::to_string);
                let program = parts
                    .next()
                    .ok_or_else(|| SynthesisError::Unavailable("empty TTS command".into()))?;
                Some((program, parts.collect()))
            }
            None => None,
        };
        Ok(Self {
            command,
            child: Mutex::new(None),
        })
    }

    /// 再生中のプロセスがあるか。終了済みのプロセスはここで回収する
    pub fn is_speaking(&self) -> bool {
        let mut slot = self.child.lock();
        let Some(child) = slot.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                log::debug!("TTS process finished: {status}");
                *slot = None;
                false
            }
            Err(e) => {
                log::warn!("Failed to poll TTS process: {e}");
                *slot = None;
                false
            }
        }
    }
}

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn speak(&self, text: &str) -> std::result::Result<(), SynthesisError> {
        let Some((program, args)) = &self.command else {
            log::debug!("No TTS command configured; reply shown only");
            return Ok(());
        };

        let child = Command::new(program)
            .args(args)
            .arg(text)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SynthesisError::Failed(format!("{program}: {e}")))?;

        // 前の発話は打ち切る
        let previous = self.child.lock().replace(child);
        if let Some(mut previous) = previous {
            if let Err(e) = previous.start_kill() {
                log::debug!("Previous TTS process already exited: {e}");
            }
        }
        Ok(())
    }

    fn cancel(&self) {
        if let Some(mut child) = self.child.lock().take() {
            if let Err(e) = child.start_kill() {
                log::debug!("TTS process already exited: {e}");
            }
        }
    }
}

// ─── Rendering ───────────────────────────────────────────────────

/// UI イベントを 1 行の表示に変換する
pub fn render_event(event: &ChatEvent) -> String {
    match event {
        ChatEvent::StateChanged { transition, .. } => match transition.new_state {
            SessionState::Listening => "[listening] type what you say, empty line to stop".into(),
            SessionState::Processing => "[processing]".into(),
            SessionState::Idle => "[idle] empty line to talk, /quit to exit".into(),
        },
        ChatEvent::TranscriptUpdated { text, .. } => format!("  ... {text}"),
        ChatEvent::MessageAppended { message, .. } => {
            format!("{}> {}", message.role.as_str(), message.content)
        }
        ChatEvent::Error { error, .. } => format!("! {}", error.message),
    }
}

// ─── Chat loop ───────────────────────────────────────────────────

/// `chat` サブコマンド本体
pub async fn run(args: ChatArgs) -> Result<()> {
    let settings = args.provider.settings();
    let gateway: Arc<dyn CompletionGateway> = if args.direct {
        Arc::new(ClaudeGateway::new(args.provider.api_key.clone(), settings.clone())?)
    } else {
        log::info!("Sending turns to {}", args.server_url);
        Arc::new(ProxyGateway::new(
            args.server_url.clone(),
            Duration::from_secs(settings.timeout_secs),
        )?)
    };

    let synthesizer = Arc::new(ConsoleSynthesizer::new(args.tts_command.as_deref())?);
    let mut controller =
        ConversationController::new(gateway, synthesizer, Arc::new(Metrics::new()));
    if !args.direct {
        // サーバー経由ではペルソナをリクエストごとに送る
        if let Some(prompt) = args.provider.system_prompt.as_ref().filter(|p| !p.trim().is_empty()) {
            controller = controller.with_system_prompt(prompt.clone());
        }
    }

    let input = Arc::new(LineInput::default());
    let config = RecognizerConfig {
        language: args.language.clone(),
        ..RecognizerConfig::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let chat = VoiceChat::new(
        Arc::new(LineRecognizerFactory::new(input.clone())),
        config,
        controller,
        Some(tx),
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{}", render_event(&event));
        }
    });

    println!("Voice chat ready. Press Enter to start talking, /quit to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "" => {
                if let Err(e) = chat.toggle().await {
                    // 認識エラーは履歴側に出るので、それ以外だけ表示する
                    if e.code == ErrorCode::InvalidState {
                        println!("! {}", e.message);
                    }
                }
            }
            text => {
                if !input.feed(text) {
                    println!("(not listening; press Enter to start)");
                }
            }
        }
    }

    chat.shutdown();
    if let Err(e) = printer.await {
        log::debug!("Printer task ended abnormally: {e}");
    }
    Ok(())
}
