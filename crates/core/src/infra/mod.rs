pub mod completion;
pub mod metrics;
pub mod recognition;
pub mod synthesis;
