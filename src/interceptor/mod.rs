//! HTTP request interception.
//!
//! [`RequestInterceptor`] captures a request body in full, runs it through an
//! [`InspectionPipeline`](crate::pipeline::InspectionPipeline) and either
//! forwards a faithful replay downstream or answers with a terminal status.
//! [`ScanLayer`] wraps the same logic as a tower layer.

mod body;
mod handler;
mod layer;

pub use body::{BoxError, ResponseBody};
pub use handler::{InterceptorConfig, RequestInterceptor, DEFAULT_MAX_BODY_BYTES};
pub use layer::{ScanLayer, ScanService};
