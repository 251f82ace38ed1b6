//! Core types and traits for the clamgate library.
//!
//! - [`types`] - Engine verdicts, health statistics and failure kinds
//! - [`traits`] - The `ScanEngineClient` trait
//! - [`error`] - Structured error types
//! - [`hasher`] - Content digests for audit correlation
//! - [`result`] - The `InspectionOutcome` returned by the pipeline

pub mod error;
pub mod hasher;
pub mod result;
pub mod traits;
pub mod types;

pub use error::ScanError;
pub use hasher::{digest, BodyHasher, DigestAlgorithm};
pub use result::{InspectionOutcome, Verdict};
pub use traits::{ArcEngine, ScanEngineClient};
pub use types::{EngineHealth, FailureKind, ScanVerdict, VerdictStatus};
