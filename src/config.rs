//! Host-facing configuration.
//!
//! [`ClamGateConfig`] is what a host deserializes from its own configuration
//! source. Missing fields take their defaults; the typed configurations used
//! by the engine client, the pipeline and the interceptor are derived from it.

use crate::core::{DigestAlgorithm, ScanError};
use crate::interceptor::{InterceptorConfig, DEFAULT_MAX_BODY_BYTES};
use crate::pipeline::{PipelineConfig, RetryConfig};
use crate::policy::PolicyMode;

#[cfg(feature = "clamav")]
use crate::backends::{ClamdAddress, ClamdClient, ClamdConfig};
#[cfg(feature = "clamav")]
use crate::pipeline::InspectionPipeline;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration.
///
/// Engine timeouts and the scan budget are given in seconds, the retry base
/// delay in milliseconds.
///
/// ```rust
/// use clamgate::ClamGateConfig;
///
/// let config: ClamGateConfig = serde_json::from_str(r#"{
///     "address": "clamd.internal:3310",
///     "alert_mode": true
/// }"#).unwrap();
///
/// assert_eq!(config.connect_timeout.as_secs(), 90);
/// assert!(config.alert_mode);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClamGateConfig {
    /// Middleware instance name recorded on log lines.
    pub name: String,

    /// clamd address: `host:port`, `tcp://host:port` or `unix:///path`.
    pub address: String,

    /// Bound on establishing an engine connection.
    #[serde(with = "secs")]
    pub connect_timeout: Duration,

    /// Bound on one engine exchange once connected.
    #[serde(with = "secs")]
    pub read_timeout: Duration,

    /// Forward detected bodies with a warning instead of rejecting them.
    pub alert_mode: bool,

    /// Overall deadline for one inspection, backoff included.
    #[serde(with = "secs")]
    pub scan_budget: Duration,

    /// Engine calls per inspection.
    pub max_attempts: u32,

    /// Backoff unit; the wait after attempt `n` is `n` times this.
    #[serde(with = "millis")]
    pub retry_base_delay: Duration,

    /// Largest body that will be captured. `null` disables the cap.
    pub max_body_bytes: Option<usize>,

    /// Digest attached to outcomes. Unknown names mean SHA-256.
    #[serde(with = "digest_name")]
    pub digest: DigestAlgorithm,
}

impl Default for ClamGateConfig {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            name: "clamgate".to_string(),
            address: "localhost:3310".to_string(),
            connect_timeout: Duration::from_secs(90),
            read_timeout: Duration::from_secs(3600),
            alert_mode: false,
            scan_budget: retry.budget,
            max_attempts: retry.max_attempts,
            retry_base_delay: retry.base_delay,
            max_body_bytes: Some(DEFAULT_MAX_BODY_BYTES),
            digest: DigestAlgorithm::default(),
        }
    }
}

impl ClamGateConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the middleware name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the engine address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Enables or disables alert mode.
    pub fn with_alert_mode(mut self, alert_mode: bool) -> Self {
        self.alert_mode = alert_mode;
        self
    }

    /// Sets the overall scan budget.
    pub fn with_scan_budget(mut self, budget: Duration) -> Self {
        self.scan_budget = budget;
        self
    }

    /// Sets the number of engine calls per inspection.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the backoff unit.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Sets the body size cap.
    pub fn with_max_body_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Sets the digest algorithm.
    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Checks values that cannot be defaulted away.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.name.trim().is_empty() {
            return Err(ScanError::configuration("name must not be empty"));
        }
        if self.max_attempts == 0 {
            return Err(ScanError::configuration("max_attempts must be at least 1"));
        }
        if self.scan_budget.is_zero() {
            return Err(ScanError::configuration("scan_budget must be positive"));
        }
        if self.address.trim().is_empty() {
            return Err(ScanError::configuration("address must not be empty"));
        }
        Ok(())
    }

    /// Returns the policy mode selected by `alert_mode`.
    pub fn policy_mode(&self) -> PolicyMode {
        PolicyMode::from_alert_mode(self.alert_mode)
    }

    /// Returns the retry configuration.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(self.retry_base_delay)
            .with_budget(self.scan_budget)
    }

    /// Returns the pipeline configuration.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_retry(self.retry_config())
            .with_digest(self.digest)
    }

    /// Returns the interceptor configuration.
    pub fn interceptor_config(&self) -> InterceptorConfig {
        InterceptorConfig::new()
            .with_name(self.name.clone())
            .with_mode(self.policy_mode())
            .with_max_body_bytes(self.max_body_bytes)
    }

    /// Returns the clamd client configuration.
    #[cfg(feature = "clamav")]
    pub fn clamd_config(&self) -> Result<ClamdConfig, ScanError> {
        Ok(ClamdConfig::new()
            .with_address(ClamdAddress::parse(&self.address)?)
            .with_connect_timeout(self.connect_timeout)
            .with_read_timeout(self.read_timeout))
    }

    /// Validates the configuration, connects to clamd and runs the startup
    /// health check.
    #[cfg(feature = "clamav")]
    pub async fn connect(&self) -> Result<InspectionPipeline, ScanError> {
        self.validate()?;
        let client = ClamdClient::new(self.clamd_config()?);
        InspectionPipeline::connect(client, self.pipeline_config()).await
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod digest_name {
    use crate::core::DigestAlgorithm;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(algorithm: &DigestAlgorithm, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(algorithm.name())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DigestAlgorithm, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(DigestAlgorithm::from_name(&name))
    }
}
