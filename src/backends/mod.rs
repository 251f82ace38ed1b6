//! Engine client implementations.
//!
//! - [`mock`] - A scripted engine for tests
//! - [`clamav`] - clamd over TCP or a Unix socket (requires the `clamav` feature)
//!
//! ## Implementing a Custom Engine
//!
//! Implement [`ScanEngineClient`](crate::core::ScanEngineClient) and hand the
//! client to [`InspectionPipeline::connect`](crate::pipeline::InspectionPipeline::connect).

pub mod mock;

#[cfg(feature = "clamav")]
pub mod clamav;

pub use mock::{MockEngine, MockStep};

#[cfg(feature = "clamav")]
pub use clamav::{ClamdAddress, ClamdClient, ClamdConfig};
