//! Custom engine example demonstrating how to plug in a new scan engine.
//!
//! This example shows how to:
//! - Implement the ScanEngineClient trait for a custom engine
//! - Run the startup health check through InspectionPipeline::connect
//! - Drive a RequestInterceptor with a plain async closure as downstream
//!
//! Run with: cargo run --example custom_engine

use async_trait::async_trait;
use bytes::Bytes;
use clamgate::core::digest;
use clamgate::prelude::*;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

/// Flags bodies whose SHA-256 is on a blocklist.
#[derive(Debug)]
struct DigestBlocklistEngine {
    blocked: HashSet<String>,
}

impl DigestBlocklistEngine {
    fn new() -> Self {
        Self {
            blocked: HashSet::new(),
        }
    }

    fn with_blocked(mut self, body: &[u8]) -> Self {
        self.blocked.insert(digest(DigestAlgorithm::Sha256, body));
        self
    }
}

#[async_trait]
impl ScanEngineClient for DigestBlocklistEngine {
    fn name(&self) -> &str {
        "digest-blocklist"
    }

    async fn probe(&self) -> Result<EngineHealth, ScanError> {
        // An in-memory lookup has one always-idle worker.
        Ok(EngineHealth {
            threads_idle: 1,
            threads_live: 0,
            threads_max: 1,
            ..Default::default()
        })
    }

    async fn scan_stream(&self, data: &[u8]) -> Result<Vec<ScanVerdict>, ScanError> {
        let body_digest = digest(DigestAlgorithm::Sha256, data);
        tracing::debug!(digest = %body_digest, "Checking digest against blocklist");

        if self.blocked.contains(&body_digest) {
            Ok(vec![ScanVerdict::infected("Blocklist.Sha256.Match")])
        } else {
            Ok(vec![ScanVerdict::clean()])
        }
    }
}

async fn store(request: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, Infallible> {
    let length = request
        .headers()
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("?");
    println!("  downstream received {length} bytes");
    Ok(Response::new(Full::new(Bytes::from_static(b"stored"))))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let known_bad: &[u8] = b"This content is known to be malicious!";
    let engine = DigestBlocklistEngine::new().with_blocked(known_bad);

    let pipeline = InspectionPipeline::connect(engine, PipelineConfig::new()).await?;
    println!("Engine health: {:?}\n", pipeline.health());

    let pipeline = Arc::new(pipeline);

    for mode in [PolicyMode::Enforce, PolicyMode::Observe] {
        println!("=== Mode: {mode} ===");
        let interceptor = RequestInterceptor::new(
            pipeline.clone(),
            InterceptorConfig::new().with_name("custom-engine-demo").with_mode(mode),
        );

        for body in [&b"A perfectly safe upload."[..], known_bad] {
            let request = Request::put("http://uploads.local/objects/1")
                .body(Full::new(Bytes::copy_from_slice(body)))?;
            let response = interceptor.handle(request, store).await?;
            let status = response.status();
            println!(
                "  -> {} {}",
                status.as_u16(),
                if status == StatusCode::OK { "forwarded" } else { "rejected" }
            );
        }
        println!();
    }

    Ok(())
}
