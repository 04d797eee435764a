//! 音声認識セッション。
//!
//! プラットフォームの認識リソースを録音中だけ保持し、書き起こしと停止通知を
//! 単一のリスナーへ `SessionEvent` として送る。認識リソースは最初の toggle で
//! 一度だけ生成され、以後は同じインスタンスを使い回す。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, OnceCell};

use crate::domain::error::AppError;
use crate::domain::session::{SessionState, SessionStateMachine};
use crate::domain::speech::{
    EndReason, RecognitionCallbacks, RecognitionError, RecognitionSink, RecognizerConfig,
    RecognizerFactory, SessionEvent, SpeechRecognizer,
};

type InitOutcome = Result<Arc<dyn SpeechRecognizer>, AppError>;

/// 停止を通知してから、オーナーがその発話を受け取るまで立っているフラグ。
///
/// 認識終了のコールバック内で `Stopped` を送る前に立つので、イベントが
/// まだキューにある間もオーナーは「確定待ちの発話がある」ことを知れる。
#[derive(Debug, Clone, Default)]
pub struct StopLatch(Arc<AtomicBool>);

impl StopLatch {
    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `Stopped` を処理し終えたオーナーが下ろす
    pub fn release(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct SpeechSession {
    shared: Arc<SessionShared>,
    factory: Arc<dyn RecognizerFactory>,
    config: RecognizerConfig,
    /// 初期化結果（失敗も含めて）を一度だけ記録する
    recognizer: OnceCell<InitOutcome>,
}

/// プラットフォームのコールバックから触る状態
struct SessionShared {
    machine: Mutex<SessionStateMachine>,
    transcript: Mutex<String>,
    listener: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    stop_latch: StopLatch,
}

impl SessionShared {
    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = self.listener.lock().as_ref() {
            if tx.send(event).is_err() {
                log::debug!("Session listener dropped; event discarded");
            }
        }
    }
}

impl RecognitionCallbacks for SessionShared {
    fn on_interim(&self, transcript: &str) {
        // 途中結果は発話全体の最新推定なので上書きする
        *self.transcript.lock() = transcript.to_string();
        self.emit(SessionEvent::TranscriptUpdated(transcript.to_string()));
    }

    fn on_end(&self, reason: EndReason) {
        let transition = self.machine.lock().stop_listening();
        match transition {
            Ok(_) => {
                log::debug!("Recognition ended: {reason:?}");
                self.stop_latch.set();
                self.emit(SessionEvent::Stopped { reason });
            }
            Err(_) => log::debug!("Recognition end ({reason:?}) while idle ignored"),
        }
    }

    fn on_error(&self, error: RecognitionError) {
        log::warn!("Speech recognition error: {error}");
        self.emit(SessionEvent::Errored(error.into()));
    }
}

impl SpeechSession {
    pub fn new(
        factory: Arc<dyn RecognizerFactory>,
        config: RecognizerConfig,
        listener: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                machine: Mutex::new(SessionStateMachine::new()),
                transcript: Mutex::new(String::new()),
                listener: Mutex::new(Some(listener)),
                stop_latch: StopLatch::default(),
            }),
            factory,
            config,
            recognizer: OnceCell::new(),
        }
    }

    /// Idle なら録音を開始し、Listening なら停止を要求する。
    ///
    /// 停止は非同期で、`SessionEvent::Stopped` が届いた時点で Idle に戻る。
    /// 戻り値は呼び出し直後の状態。
    pub async fn toggle(&self) -> Result<SessionState, AppError> {
        let recognizer = match self.recognizer().await {
            Ok(r) => r,
            Err(e) => {
                self.shared.emit(SessionEvent::Errored(e.clone()));
                return Err(e);
            }
        };

        let state = self.state();
        match state {
            SessionState::Idle => {
                self.shared.machine.lock().start_listening()?;
                self.shared.transcript.lock().clear();

                if let Err(e) = recognizer.start() {
                    // 開始できなかったので Idle に戻す
                    let _ = self.shared.machine.lock().stop_listening();
                    let err = AppError::from(e);
                    log::warn!("Failed to start recognition: {err}");
                    self.shared.emit(SessionEvent::Errored(err.clone()));
                    return Err(err);
                }
                log::debug!("Recognition started ({})", self.factory.name());
            }
            SessionState::Listening => {
                recognizer.stop();
            }
            SessionState::Processing => {
                return Err(AppError::internal("音声セッションが Processing 状態になっています"));
            }
        }

        Ok(self.state())
    }

    pub fn state(&self) -> SessionState {
        self.shared.machine.lock().state()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == SessionState::Listening
    }

    /// 最後に受け取った途中結果
    pub fn transcript(&self) -> String {
        self.shared.transcript.lock().clone()
    }

    /// 未処理の停止通知を示すラッチ。オーナーが `Stopped` を受け取ったら下ろす
    pub fn stop_latch(&self) -> StopLatch {
        self.shared.stop_latch.clone()
    }

    /// 認識リソースが生成済みか（失敗した場合も true）
    pub fn is_initialized(&self) -> bool {
        self.recognizer.initialized()
    }

    async fn recognizer(&self) -> InitOutcome {
        self.recognizer
            .get_or_init(|| async {
                let target: Arc<dyn RecognitionCallbacks> = self.shared.clone();
                let sink = RecognitionSink::new(&target);
                log::info!("Initializing speech recognizer: {}", self.factory.name());
                self.factory
                    .create(self.config.clone(), sink)
                    .await
                    .map_err(AppError::from)
            })
            .await
            .clone()
    }
}

impl Drop for SpeechSession {
    fn drop(&mut self) {
        // 先にリスナーを外し、解放中のコールバックがオーナーへ届かないようにする
        self.shared.listener.lock().take();
        if let Some(Ok(recognizer)) = self.recognizer.get() {
            recognizer.abort();
        }
    }
}
