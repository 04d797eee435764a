pub mod api;
pub mod config;
pub mod console;
pub mod error;

pub use error::{Result, ServerError};
