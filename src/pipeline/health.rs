//! Engine startup health check.

use crate::core::{EngineHealth, ScanEngineClient, ScanError};

/// Probes the engine once and rejects it if it is unreachable or reports no
/// scanning capacity.
pub async fn check_engine(engine: &dyn ScanEngineClient) -> Result<EngineHealth, ScanError> {
    let health = match engine.probe().await {
        Ok(health) => health,
        Err(e) => {
            tracing::error!(
                engine = engine.name(),
                error = %e,
                "Could not read engine stats, refusing to start"
            );
            return Err(ScanError::engine_startup(engine.name(), e.to_string()));
        }
    };

    crate::audit::emit_engine_health(engine.name(), &health);

    if !health.has_capacity() {
        tracing::error!(
            engine = engine.name(),
            threads_max = health.threads_max,
            "Engine reports zero scanning threads, refusing to start"
        );
        return Err(ScanError::engine_startup(
            engine.name(),
            "engine reports zero maximum scanning threads",
        ));
    }

    Ok(health)
}
