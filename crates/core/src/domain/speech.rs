use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use super::error::AppError;

// ─── RecognitionError ────────────────────────────────────────────

/// 音声認識で発生するエラー。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionError {
    /// エラー種別
    pub kind: RecognitionErrorKind,
    /// 人間が読める詳細メッセージ
    pub detail: String,
    /// ユーザーが再度トグルすれば回復しうるか
    pub recoverable: bool,
}

impl std::fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecognitionError::{:?}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for RecognitionError {}

/// 音声認識エラー種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognitionErrorKind {
    /// この環境では音声認識が使えない
    Unsupported,
    /// 発話が検出されなかった
    NoSpeech,
    /// マイクからの取り込みに失敗
    AudioCapture,
    /// マイク権限が拒否された
    NotAllowed,
    /// 認識サービスへの通信エラー
    Network,
    /// プラットフォーム側で中断された
    Aborted,
    Other,
}

impl RecognitionErrorKind {
    /// プラットフォームが返すエラーコード文字列（"no-speech" 等）を種別に変換する。
    pub fn from_platform_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            "network" => Self::Network,
            "aborted" => Self::Aborted,
            "language-not-supported" => Self::Unsupported,
            _ => Self::Other,
        }
    }
}

impl RecognitionError {
    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self { kind: RecognitionErrorKind::Unsupported, detail: detail.into(), recoverable: false }
    }

    pub fn runtime(kind: RecognitionErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into(), recoverable: kind != RecognitionErrorKind::Unsupported }
    }

    /// プラットフォームのエラーコードからそのまま生成する。
    pub fn from_platform_code(code: &str) -> Self {
        Self::runtime(RecognitionErrorKind::from_platform_code(code), code)
    }
}

impl From<RecognitionError> for AppError {
    fn from(e: RecognitionError) -> Self {
        match e.kind {
            RecognitionErrorKind::Unsupported => AppError::capability_unavailable(e.detail),
            _ => AppError::recognition(e.detail),
        }
    }
}

// ─── EndReason / SessionEvent ────────────────────────────────────

/// プラットフォームが報告する認識終了の理由。
/// 会話側は全て同じ「停止」として扱うが、区別が必要になった時のためにそのまま伝搬する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// stop() 要求による終了
    StopRequested,
    /// 無音タイムアウト
    SilenceTimeout,
    /// abort() やリソース解放による終了
    Aborted,
    Unknown,
}

/// SpeechSession がオーナーに送るイベント（閉じた集合）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 発話全体の現時点での最良推定。断片ではない。
    TranscriptUpdated(String),
    /// 認識が終了した。オーナーは最後の TranscriptUpdated を確定発話として扱う。
    Stopped { reason: EndReason },
    Errored(AppError),
}

// ─── Recognizer seams ────────────────────────────────────────────

/// 認識器の生成パラメータ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// 連続認識（無音で即終了しない）
    pub continuous: bool,
    /// 途中結果を通知する
    pub interim_results: bool,
    /// 言語ヒント (例: "en-US")
    pub language: Option<String>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: true,
            language: None,
        }
    }
}

/// プラットフォームのコールバックを受け取る側。
pub trait RecognitionCallbacks: Send + Sync {
    fn on_interim(&self, transcript: &str);
    fn on_end(&self, reason: EndReason);
    fn on_error(&self, error: RecognitionError);
}

/// 認識器がイベントを報告するためのハンドル。
///
/// 受け手への弱参照しか持たないため、オーナーが破棄された後の
/// コールバックは何もしない。
#[derive(Clone)]
pub struct RecognitionSink {
    target: Weak<dyn RecognitionCallbacks>,
}

impl RecognitionSink {
    pub fn new(target: &Arc<dyn RecognitionCallbacks>) -> Self {
        Self {
            target: Arc::downgrade(target),
        }
    }

    pub fn interim(&self, transcript: &str) {
        if let Some(target) = self.target.upgrade() {
            target.on_interim(transcript);
        }
    }

    pub fn ended(&self, reason: EndReason) {
        if let Some(target) = self.target.upgrade() {
            target.on_end(reason);
        }
    }

    pub fn error(&self, error: RecognitionError) {
        if let Some(target) = self.target.upgrade() {
            target.on_error(error);
        }
    }

    /// オーナーがまだ生きているか
    pub fn is_attached(&self) -> bool {
        self.target.strong_count() > 0
    }
}

/// プラットフォームの音声認識リソース。
///
/// start/stop はブロックしない。終了は stop() の戻り値ではなく
/// `RecognitionSink::ended` で非同期に通知される。
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self) -> Result<(), RecognitionError>;

    fn stop(&self);

    /// リソースを即座に解放する（終了通知は不要）
    fn abort(&self);
}

/// 音声認識リソースの生成（非同期・失敗しうる）。
#[async_trait::async_trait]
pub trait RecognizerFactory: Send + Sync {
    async fn create(
        &self,
        config: RecognizerConfig,
        sink: RecognitionSink,
    ) -> Result<Arc<dyn SpeechRecognizer>, RecognitionError>;

    /// 実装名 (例: "line-input")
    fn name(&self) -> &str;
}

// ─── Synthesis ───────────────────────────────────────────────────

/// 音声合成エラー
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("Synthesizer not available: {0}")]
    Unavailable(String),
    #[error("Synthesis failed: {0}")]
    Failed(String),
}

/// 音声合成。speak は投げっぱなしで、再生完了を待たない。
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), SynthesisError>;

    /// 再生中・待機中の発話を全て取り消す
    fn cancel(&self);
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        interim: Mutex<Vec<String>>,
        ended: Mutex<Vec<EndReason>>,
    }

    impl RecognitionCallbacks for Recorder {
        fn on_interim(&self, transcript: &str) {
            self.interim.lock().push(transcript.to_string());
        }

        fn on_end(&self, reason: EndReason) {
            self.ended.lock().push(reason);
        }

        fn on_error(&self, _error: RecognitionError) {}
    }

    #[test]
    fn platform_codes_map_to_kinds() {
        assert_eq!(
            RecognitionErrorKind::from_platform_code("no-speech"),
            RecognitionErrorKind::NoSpeech
        );
        assert_eq!(
            RecognitionErrorKind::from_platform_code("service-not-allowed"),
            RecognitionErrorKind::NotAllowed
        );
        assert_eq!(
            RecognitionErrorKind::from_platform_code("bad-grammar"),
            RecognitionErrorKind::Other
        );
    }

    #[test]
    fn unsupported_maps_to_capability_unavailable() {
        let app: AppError = RecognitionError::unsupported("no engine").into();
        assert_eq!(app.code, ErrorCode::CapabilityUnavailable);
        assert!(!app.recoverable);

        let app: AppError = RecognitionError::from_platform_code("audio-capture").into();
        assert_eq!(app.code, ErrorCode::Recognition);
        assert!(app.recoverable);
    }

    #[test]
    fn sink_forwards_while_owner_alive() {
        let recorder = Arc::new(Recorder::default());
        let target: Arc<dyn RecognitionCallbacks> = recorder.clone();
        let sink = RecognitionSink::new(&target);

        sink.interim("hel");
        sink.interim("hello");
        sink.ended(EndReason::SilenceTimeout);

        assert_eq!(*recorder.interim.lock(), vec!["hel", "hello"]);
        assert_eq!(*recorder.ended.lock(), vec![EndReason::SilenceTimeout]);
        assert!(sink.is_attached());
    }

    #[test]
    fn sink_is_inert_after_owner_dropped() {
        let target: Arc<dyn RecognitionCallbacks> = Arc::new(Recorder::default());
        let sink = RecognitionSink::new(&target);
        drop(target);

        assert!(!sink.is_attached());
        sink.interim("late result");
        sink.ended(EndReason::Unknown);
    }

    #[test]
    fn recognizer_config_defaults_to_continuous_interim() {
        let config = RecognizerConfig::default();
        assert!(config.continuous);
        assert!(config.interim_results);
    }
}
