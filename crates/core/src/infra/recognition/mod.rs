mod scripted;
mod unsupported;

pub use scripted::{ScriptedPlatform, ScriptedRecognizerFactory};
pub use unsupported::UnsupportedRecognizerFactory;
