use serde::Serialize;

use super::error::AppError;
use super::message::Message;
use super::session::StateTransition;

/// UI へ通知するイベント
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChatEvent {
    StateChanged {
        transition: StateTransition,
        timestamp: String,
    },
    /// 表示用の途中書き起こし（上書き）
    TranscriptUpdated { text: String, timestamp: String },
    MessageAppended { message: Message, timestamp: String },
    Error { error: AppError, timestamp: String },
}

impl ChatEvent {
    pub fn state_changed(transition: StateTransition) -> Self {
        Self::StateChanged {
            transition,
            timestamp: now(),
        }
    }

    pub fn transcript_updated(text: impl Into<String>) -> Self {
        Self::TranscriptUpdated {
            text: text.into(),
            timestamp: now(),
        }
    }

    pub fn message_appended(message: Message) -> Self {
        Self::MessageAppended {
            message,
            timestamp: now(),
        }
    }

    pub fn error(error: AppError) -> Self {
        Self::Error {
            error,
            timestamp: now(),
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionState;

    #[test]
    fn test_chat_event_is_tagged() {
        let event = ChatEvent::message_appended(Message::assistant("Lights off."));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message_appended");
        assert_eq!(json["message"]["role"], "assistant");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_state_changed_payload() {
        let event = ChatEvent::state_changed(StateTransition {
            prev_state: SessionState::Idle,
            new_state: SessionState::Listening,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["transition"]["new_state"], "listening");
    }
}
