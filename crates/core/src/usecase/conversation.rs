use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::error::AppError;
use crate::domain::events::ChatEvent;
use crate::domain::message::{ConversationHistory, Message};
use crate::domain::session::{SessionState, SessionStateMachine, StateTransition};
use crate::domain::speech::SpeechSynthesizer;
use crate::infra::completion::{CompletionGateway, CompletionRequest};
use crate::infra::metrics::Metrics;

/// on_stop の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// 書き起こしが空（空白のみ）だったので何もしなかった
    Dropped,
    /// 別のターンを処理中だったので無視した
    Ignored,
    Completed { reply: String },
    Failed(AppError),
}

/// Processing に入ったがゲートウェイ呼び出し前のターン
#[derive(Debug)]
pub struct PendingTurn {
    id: uuid::Uuid,
    request: CompletionRequest,
    started: Instant,
}

impl PendingTurn {
    pub fn prompt(&self) -> &str {
        &self.request.prompt
    }
}

/// begin_turn の結果
#[derive(Debug)]
pub enum TurnStart {
    Started(PendingTurn),
    Skipped(TurnOutcome),
}

/// 会話コントローラ。1 ターン（発話→応答）の進行と履歴を所有する。
///
/// ゲートウェイ呼び出し中はロックを持たない。Processing 状態が
/// 同時に 2 つのターンが走らないことを保証する。
pub struct ConversationController {
    inner: Mutex<ConversationInner>,
    gateway: Arc<dyn CompletionGateway>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    metrics: Arc<Metrics>,
    system_prompt: Option<String>,
    events: Option<mpsc::UnboundedSender<ChatEvent>>,
}

#[derive(Default)]
struct ConversationInner {
    history: ConversationHistory,
    transcript: String,
    machine: SessionStateMachine,
    last_error: Option<AppError>,
}

impl ConversationController {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner: Mutex::new(ConversationInner::default()),
            gateway,
            synthesizer,
            metrics,
            system_prompt: None,
            events: None,
        }
    }

    /// 全ターンで使う systemPrompt（None ならゲートウェイ側の既定ペルソナ）
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// UI 通知先
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ChatEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// 途中結果で表示用バッファを上書きする
    pub fn on_transcript(&self, text: &str) {
        self.inner.lock().transcript = text.to_string();
        self.emit(ChatEvent::transcript_updated(text));
    }

    /// 認識停止の通知。バッファの内容で 1 ターンを実行する。
    pub async fn on_stop(&self) -> TurnOutcome {
        match self.begin_turn() {
            TurnStart::Started(turn) => self.run_turn(turn).await,
            TurnStart::Skipped(outcome) => outcome,
        }
    }

    /// ターン開始（同期部分）。user メッセージを追加して Processing に入る。
    ///
    /// 停止通知を受けたその場で呼べば、次のイベントより先に
    /// バッファの内容が確定する。
    pub fn begin_turn(&self) -> TurnStart {
        let (prompt, user_message, transition) = {
            let mut inner = self.inner.lock();

            if inner.machine.state() == SessionState::Processing {
                drop(inner);
                log::debug!("Stop notification ignored: a turn is already in flight");
                self.metrics.inc_stops_ignored();
                return TurnStart::Skipped(TurnOutcome::Ignored);
            }

            let prompt = inner.transcript.trim().to_string();
            if prompt.is_empty() {
                drop(inner);
                log::debug!("Empty utterance dropped");
                self.metrics.inc_utterances_dropped();
                return TurnStart::Skipped(TurnOutcome::Dropped);
            }

            let transition = match inner.machine.begin_processing() {
                Ok(t) => t,
                Err(e) => {
                    log::error!("Cannot begin turn: {e}");
                    return TurnStart::Skipped(TurnOutcome::Ignored);
                }
            };
            let user_message = Message::user(prompt.clone());
            inner.history.push(user_message.clone());
            inner.last_error = None;
            (prompt, user_message, transition)
        };

        let id = uuid::Uuid::new_v4();
        log::info!("Turn {id} started ({} chars)", prompt.len());
        self.metrics.inc_turns_started();
        self.emit(ChatEvent::message_appended(user_message));
        self.emit(ChatEvent::state_changed(transition));

        let mut request = CompletionRequest::new(prompt);
        request.system_prompt = self.system_prompt.clone();
        TurnStart::Started(PendingTurn {
            id,
            request,
            started: Instant::now(),
        })
    }

    /// ターンの非同期部分。ゲートウェイ呼び出しから Idle 復帰まで。
    pub async fn run_turn(&self, turn: PendingTurn) -> TurnOutcome {
        let PendingTurn {
            id: turn_id,
            request,
            started,
        } = turn;

        let start = Instant::now();
        let result = self.gateway.complete(&request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.metrics.record_latency("completion", elapsed_ms);

        let outcome = match result {
            Ok(reply) => {
                let assistant = Message::assistant(reply.clone());
                let transition = {
                    let mut inner = self.inner.lock();
                    inner.history.push(assistant.clone());
                    self.finish(&mut inner)
                };
                self.emit(ChatEvent::message_appended(assistant));

                // 合成失敗は会話エラーにしない
                if let Err(e) = self.synthesizer.speak(&reply) {
                    log::warn!("Speech synthesis failed: {e}");
                }

                self.emit_finish(transition);
                self.metrics.inc_turns_completed();
                log::info!("Turn {turn_id} completed in {elapsed_ms}ms via {}", self.gateway.name());
                TurnOutcome::Completed { reply }
            }
            Err(e) => {
                let err = AppError::from(e);
                let transition = {
                    let mut inner = self.inner.lock();
                    inner.last_error = Some(err.clone());
                    self.finish(&mut inner)
                };
                log::error!("Turn {turn_id} failed: {err}");
                self.emit(ChatEvent::error(err.clone()));
                self.emit_finish(transition);
                self.metrics.inc_turns_failed();
                self.metrics.inc_error(err.code);
                TurnOutcome::Failed(err)
            }
        };
        // 確定から Idle 復帰まで
        self.metrics
            .record_latency("turn", started.elapsed().as_millis() as u64);
        outcome
    }

    /// 認識エラーを会話上に error メッセージとして残す
    pub fn on_recognition_error(&self, error: AppError) {
        let message = Message::error(error.message.clone());
        {
            let mut inner = self.inner.lock();
            inner.history.push(message.clone());
            inner.last_error = Some(error.clone());
        }
        self.metrics.inc_error(error.code);
        self.emit(ChatEvent::message_appended(message));
        self.emit(ChatEvent::error(error));
    }

    /// 画面破棄時に呼ぶ。再生中の発話を止める。
    pub fn teardown(&self) {
        self.synthesizer.cancel();
    }

    pub fn history(&self) -> ConversationHistory {
        self.inner.lock().history.clone()
    }

    pub fn transcript(&self) -> String {
        self.inner.lock().transcript.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().machine.state()
    }

    pub fn is_processing(&self) -> bool {
        self.state() == SessionState::Processing
    }

    pub fn last_error(&self) -> Option<AppError> {
        self.inner.lock().last_error.clone()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// 成功・失敗どちらでもバッファを空にして Idle に戻す
    fn finish(&self, inner: &mut ConversationInner) -> Option<StateTransition> {
        inner.transcript.clear();
        match inner.machine.finish_processing() {
            Ok(t) => Some(t),
            Err(e) => {
                log::error!("Turn finished in unexpected state: {e}");
                None
            }
        }
    }

    fn emit_finish(&self, transition: Option<StateTransition>) {
        self.emit(ChatEvent::transcript_updated(""));
        if let Some(t) = transition {
            self.emit(ChatEvent::state_changed(t));
        }
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                log::debug!("UI event receiver dropped");
            }
        }
    }
}
