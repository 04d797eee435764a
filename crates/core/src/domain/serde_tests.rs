#[cfg(test)]
mod tests {
    use crate::domain::error::{AppError, ErrorCode};
    use crate::domain::events::ChatEvent;
    use crate::domain::message::{ConversationHistory, Message, Role};
    use crate::domain::session::SessionState;
    use crate::domain::settings::CompletionSettings;
    use crate::domain::speech::RecognizerConfig;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&Role::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_session_state_serialization() {
        assert_eq!(serde_json::to_string(&SessionState::Idle).unwrap(), "\"idle\"");
        assert_eq!(
            serde_json::to_string(&SessionState::Processing).unwrap(),
            "\"processing\""
        );
    }

    #[test]
    fn test_error_code_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::CapabilityUnavailable).unwrap(),
            "\"E_CAPABILITY_UNAVAILABLE\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::UnexpectedResponse).unwrap(),
            "\"E_UNEXPECTED_RESPONSE\""
        );
    }

    #[test]
    fn test_app_error_serialization() {
        let err = AppError::transport("Request timed out");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "E_TRANSPORT");
        assert_eq!(json["message"], "Request timed out");
        assert_eq!(json["recoverable"], true);
    }

    #[test]
    fn test_history_serializes_as_array() {
        let mut history = ConversationHistory::new();
        history.push(Message::user("hello"));
        history.push(Message::error("no-speech"));
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "user", "content": "hello"},
                {"role": "error", "content": "no-speech"}
            ])
        );
    }

    #[test]
    fn test_error_event_payload() {
        let event = ChatEvent::error(AppError::provider("Claude API error: 401"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["error"]["code"], "E_PROVIDER");
    }

    #[test]
    fn test_config_deserialization() {
        let config: RecognizerConfig = serde_json::from_str(
            r#"{"continuous":true,"interim_results":true,"language":"en-US"}"#,
        )
        .unwrap();
        assert_eq!(config.language.as_deref(), Some("en-US"));

        let settings: CompletionSettings =
            serde_json::from_str(&serde_json::to_string(&CompletionSettings::default()).unwrap())
                .unwrap();
        assert_eq!(settings.model, "claude-3-opus-20240229");
    }
}
