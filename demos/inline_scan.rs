//! Inline scanning example using the tower layer.
//!
//! This example shows how to:
//! - Install a JSON log subscriber filtered through RUST_LOG
//! - Wrap a downstream service with ScanLayer
//! - See a transient engine failure retried and a detection blocked
//!
//! Run with: RUST_LOG=info cargo run --example inline_scan

use bytes::Bytes;
use clamgate::backends::{MockEngine, MockStep};
use clamgate::interceptor::BoxError;
use clamgate::prelude::*;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use std::convert::Infallible;
use std::sync::Arc;
use tower::{Layer, ServiceExt};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // First scan hits a reset connection and recovers, second finds EICAR.
    let engine = MockEngine::new()
        .with_name("clamd")
        .then(MockStep::failure("connection reset by peer"))
        .then(MockStep::clean())
        .then(MockStep::infected("Win.Test.EICAR_HDB-1"));

    let config = ClamGateConfig::new().with_name("uploads");
    let pipeline = Arc::new(InspectionPipeline::connect(engine, config.pipeline_config()).await?);
    let layer = ScanLayer::new(pipeline, config.interceptor_config());

    let downstream = tower::service_fn(|request: Request<Full<Bytes>>| async move {
        let body = request.into_body().collect().await?.to_bytes();
        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(format!(
            "stored {} bytes",
            body.len()
        )))))
    });

    for body in ["quarterly-report.pdf contents", "X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR"] {
        let request = Request::post("http://uploads.local/files").body(Full::new(Bytes::from(body)))?;
        let response = layer.layer(downstream.clone()).oneshot(request).await?;

        let status = response.status();
        let text = response.into_body().collect().await?.to_bytes();
        println!("{} {}", status.as_u16(), String::from_utf8_lossy(&text));
    }

    Ok(())
}
