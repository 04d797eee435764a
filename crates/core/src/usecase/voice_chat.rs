use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::domain::error::AppError;
use crate::domain::events::ChatEvent;
use crate::domain::message::ConversationHistory;
use crate::domain::session::{SessionState, StateTransition};
use crate::domain::speech::{RecognizerConfig, RecognizerFactory, SessionEvent};

use super::conversation::{ConversationController, TurnStart};
use super::speech_session::{SpeechSession, StopLatch};

/// 音声チャット画面 1 枚分。SpeechSession と ConversationController を
/// イベントポンプでつなぎ、破棄時に両方のリソースを解放する。
///
/// tokio ランタイム上で生成すること（ポンプタスクを spawn する）。
pub struct VoiceChat {
    session: SpeechSession,
    controller: Arc<ConversationController>,
    pump: JoinHandle<()>,
    events: Option<mpsc::UnboundedSender<ChatEvent>>,
}

impl VoiceChat {
    pub fn new(
        factory: Arc<dyn RecognizerFactory>,
        config: RecognizerConfig,
        controller: ConversationController,
        events: Option<mpsc::UnboundedSender<ChatEvent>>,
    ) -> Self {
        let controller = Arc::new(match &events {
            Some(tx) => controller.with_events(tx.clone()),
            None => controller,
        });

        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let session = SpeechSession::new(factory, config, session_tx);
        let pump = tokio::spawn(pump(
            session_rx,
            controller.clone(),
            session.stop_latch(),
            events.clone(),
        ));

        Self {
            session,
            controller,
            pump,
            events,
        }
    }

    /// マイクのトグル。
    ///
    /// 停止はいつでも通す。録音の開始は、直前の発話がまだポンプに渡っていない間と
    /// 応答処理中は `E_INVALID_STATE` で断る。
    pub async fn toggle(&self) -> Result<SessionState, AppError> {
        if !self.session.is_listening() {
            // ラッチを先に見る。ポンプは begin_turn の後でラッチを下ろすので、
            // 下りていれば Processing はすでに反映されている
            if self.session.stop_latch().is_set() || self.controller.is_processing() {
                return Err(AppError::invalid_state("応答を処理中のため録音を開始できません"));
            }
        }

        let prev_state = self.state();
        self.session.toggle().await?;
        let new_state = self.state();

        // Listening→Idle は Stopped を受けたポンプ側で通知する
        if prev_state != new_state && new_state == SessionState::Listening {
            emit(
                &self.events,
                ChatEvent::state_changed(StateTransition {
                    prev_state,
                    new_state,
                }),
            );
        }
        Ok(new_state)
    }

    pub fn state(&self) -> SessionState {
        SessionState::combine(self.session.is_listening(), self.controller.is_processing())
    }

    /// 表示中の途中書き起こし
    pub fn transcript(&self) -> String {
        self.controller.transcript()
    }

    pub fn history(&self) -> ConversationHistory {
        self.controller.history()
    }

    pub fn last_error(&self) -> Option<AppError> {
        self.controller.last_error()
    }

    pub fn controller(&self) -> &Arc<ConversationController> {
        &self.controller
    }

    /// 明示的な破棄。Drop と同じ。
    pub fn shutdown(self) {}
}

impl Drop for VoiceChat {
    fn drop(&mut self) {
        // 保留中のコールバックと進行中のターンを打ち切る
        self.pump.abort();
        self.controller.teardown();
        log::debug!("Voice chat torn down");
    }
}

async fn pump(
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
    controller: Arc<ConversationController>,
    stop_latch: StopLatch,
    events: Option<mpsc::UnboundedSender<ChatEvent>>,
) {
    let mut turns = JoinSet::new();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::TranscriptUpdated(text) => controller.on_transcript(&text),
                    SessionEvent::Stopped { reason } => {
                        log::debug!("Session stopped ({reason:?})");
                        emit(
                            &events,
                            ChatEvent::state_changed(StateTransition {
                                prev_state: SessionState::Listening,
                                new_state: SessionState::Idle,
                            }),
                        );
                        // バッファは同期的に確定し、ゲートウェイ呼び出しだけを別タスクにする
                        let start = controller.begin_turn();
                        stop_latch.release();
                        if let TurnStart::Started(turn) = start {
                            let controller = controller.clone();
                            turns.spawn(async move {
                                controller.run_turn(turn).await;
                            });
                        }
                    }
                    SessionEvent::Errored(error) => controller.on_recognition_error(error),
                }
            }
            Some(result) = turns.join_next(), if !turns.is_empty() => {
                if let Err(e) = result {
                    if e.is_panic() {
                        log::error!("Turn task panicked: {e}");
                    }
                }
            }
        }
    }

    // セッション側が閉じた後も進行中のターンは完了させる
    while turns.join_next().await.is_some() {}
}

fn emit(events: &Option<mpsc::UnboundedSender<ChatEvent>>, event: ChatEvent) {
    if let Some(tx) = events {
        if tx.send(event).is_err() {
            log::debug!("UI event receiver dropped");
        }
    }
}
