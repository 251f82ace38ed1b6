//! Inspection pipeline: bounded retries against a scan engine.

pub mod health;
pub mod inspection;
pub mod retry;

pub use health::check_engine;
pub use inspection::{InspectionPipeline, PipelineConfig};
pub use retry::RetryConfig;
