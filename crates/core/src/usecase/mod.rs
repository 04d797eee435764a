pub mod conversation;
pub mod speech_session;
pub mod voice_chat;
