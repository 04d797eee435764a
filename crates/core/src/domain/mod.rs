pub mod error;
pub mod events;
pub mod message;
pub mod session;
pub mod settings;
pub mod speech;
mod serde_tests;
