use serde::Serialize;

use super::error::AppError;

/// セッション状態（UI のボタン表示を決める）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Listening,
    Processing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
        }
    }

    /// 音声セッションと会話コントローラの状態から UI 向けの状態を合成する。
    /// 処理中は録音中より優先する。
    pub fn combine(listening: bool, processing: bool) -> Self {
        if processing {
            Self::Processing
        } else if listening {
            Self::Listening
        } else {
            Self::Idle
        }
    }
}

/// 状態遷移イベントペイロード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub prev_state: SessionState,
    pub new_state: SessionState,
}

/// 状態機械。SpeechSession は Idle⇔Listening、
/// ConversationController は Idle⇔Processing の遷移だけを使う。
#[derive(Debug)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Idle→Listening
    pub fn start_listening(&mut self) -> Result<StateTransition, AppError> {
        self.transition(SessionState::Idle, SessionState::Listening, "start_listening")
    }

    /// Listening→Idle（ユーザー停止・プラットフォーム終了の両方）
    pub fn stop_listening(&mut self) -> Result<StateTransition, AppError> {
        self.transition(SessionState::Listening, SessionState::Idle, "stop_listening")
    }

    /// Idle→Processing
    pub fn begin_processing(&mut self) -> Result<StateTransition, AppError> {
        self.transition(SessionState::Idle, SessionState::Processing, "begin_processing")
    }

    /// Processing→Idle（成功・失敗どちらでも）
    pub fn finish_processing(&mut self) -> Result<StateTransition, AppError> {
        self.transition(SessionState::Processing, SessionState::Idle, "finish_processing")
    }

    fn transition(
        &mut self,
        from: SessionState,
        to: SessionState,
        op: &str,
    ) -> Result<StateTransition, AppError> {
        if self.state != from {
            return Err(AppError::invalid_state(format!(
                "{op} は {} 状態では実行できません",
                self.state.as_str()
            )));
        }
        self.state = to;
        Ok(StateTransition {
            prev_state: from,
            new_state: to,
        })
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;

    #[test]
    fn test_idle_to_listening_and_back() {
        let mut sm = SessionStateMachine::new();
        let t = sm.start_listening().unwrap();
        assert_eq!(t.prev_state, SessionState::Idle);
        assert_eq!(t.new_state, SessionState::Listening);

        let t = sm.stop_listening().unwrap();
        assert_eq!(t.new_state, SessionState::Idle);
    }

    #[test]
    fn test_processing_cycle() {
        let mut sm = SessionStateMachine::new();
        sm.begin_processing().unwrap();
        assert_eq!(sm.state(), SessionState::Processing);
        sm.finish_processing().unwrap();
        assert_eq!(sm.state(), SessionState::Idle);
    }

    #[test]
    fn test_begin_processing_twice_is_rejected() {
        let mut sm = SessionStateMachine::new();
        sm.begin_processing().unwrap();
        let err = sm.begin_processing().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        assert_eq!(sm.state(), SessionState::Processing);
    }

    #[test]
    fn test_stop_listening_when_idle_is_rejected() {
        let mut sm = SessionStateMachine::new();
        assert!(sm.stop_listening().is_err());
    }

    #[test]
    fn test_combine_prefers_processing() {
        assert_eq!(SessionState::combine(true, true), SessionState::Processing);
        assert_eq!(SessionState::combine(true, false), SessionState::Listening);
        assert_eq!(SessionState::combine(false, false), SessionState::Idle);
    }

    #[test]
    fn test_session_state_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionState::Listening).unwrap(),
            "\"listening\""
        );
        let t = StateTransition {
            prev_state: SessionState::Idle,
            new_state: SessionState::Processing,
        };
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"prev_state\":\"idle\""));
        assert!(json.contains("\"new_state\":\"processing\""));
    }
}
