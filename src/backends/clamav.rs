//! clamd engine client.
//!
//! Speaks the clamd socket protocol over TCP or a Unix domain socket. Every
//! command opens its own connection, so nothing is shared between calls.
//!
//! # Protocol
//!
//! - `zINSTREAM\0` followed by chunks framed as a big-endian `u32` length
//!   and the chunk bytes, terminated by a zero-length chunk. The reply is
//!   one line per match, e.g. `stream: OK` or
//!   `stream: Eicar-Test-Signature FOUND`.
//! - `zSTATS\0` returns a multi-line report ending in `END`; the `THREADS`,
//!   `QUEUE` and `MEMSTATS` lines are parsed into [`EngineHealth`].

use crate::core::{EngineHealth, ScanEngineClient, ScanError, ScanVerdict};

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const ENGINE: &str = "clamd";

/// Where clamd listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClamdAddress {
    /// `host:port`.
    Tcp(String),
    /// Path to a Unix domain socket.
    #[cfg(unix)]
    Unix(std::path::PathBuf),
}

impl ClamdAddress {
    /// Parses `host:port`, `tcp://host:port` or `unix:///path/to/clamd.sock`.
    pub fn parse(address: &str) -> Result<Self, ScanError> {
        let address = address.trim();
        if let Some(path) = address.strip_prefix("unix://") {
            #[cfg(unix)]
            {
                if path.is_empty() {
                    return Err(ScanError::configuration("empty unix socket path"));
                }
                return Ok(Self::Unix(path.into()));
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(ScanError::configuration(
                    "unix sockets are not supported on this platform",
                ));
            }
        }

        let host_port = address.strip_prefix("tcp://").unwrap_or(address);
        match host_port.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Self::Tcp(host_port.to_string()))
            }
            _ => Err(ScanError::configuration(format!(
                "invalid clamd address '{address}', expected host:port or unix:///path"
            ))),
        }
    }
}

impl std::fmt::Display for ClamdAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// clamd client configuration.
#[derive(Debug, Clone)]
pub struct ClamdConfig {
    /// Engine address.
    pub address: ClamdAddress,

    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,

    /// Timeout for the whole command exchange once connected.
    pub read_timeout: Duration,

    /// Size of each INSTREAM chunk.
    pub chunk_size: usize,
}

impl Default for ClamdConfig {
    fn default() -> Self {
        Self {
            address: ClamdAddress::Tcp("localhost:3310".to_string()),
            connect_timeout: Duration::from_secs(90),
            read_timeout: Duration::from_secs(3600),
            chunk_size: 64 * 1024,
        }
    }
}

impl ClamdConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a TCP connection.
    pub fn with_tcp(mut self, address: impl Into<String>) -> Self {
        self.address = ClamdAddress::Tcp(address.into());
        self
    }

    /// Uses a Unix socket.
    #[cfg(unix)]
    pub fn with_socket(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.address = ClamdAddress::Unix(path.into());
        self
    }

    /// Sets the address.
    pub fn with_address(mut self, address: ClamdAddress) -> Self {
        self.address = address;
        self
    }

    /// Sets the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the INSTREAM chunk size, clamped to what a `u32` frame header
    /// can describe.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, u32::MAX as usize);
        self
    }
}

trait ClamdStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ClamdStream for T {}

/// clamd engine client.
///
/// # Example
///
/// ```rust,no_run
/// use clamgate::backends::{ClamdClient, ClamdConfig};
/// use clamgate::core::ScanEngineClient;
///
/// # async fn run() -> Result<(), clamgate::ScanError> {
/// let client = ClamdClient::new(ClamdConfig::new().with_tcp("127.0.0.1:3310"));
/// let health = client.probe().await?;
/// println!("clamd has {} scanning threads", health.threads_max);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClamdClient {
    config: ClamdConfig,
}

impl ClamdClient {
    /// Creates a client with the given configuration.
    pub fn new(config: ClamdConfig) -> Self {
        Self { config }
    }

    /// Creates a client with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ClamdConfig::default())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClamdConfig {
        &self.config
    }

    async fn connect(&self) -> Result<Box<dyn ClamdStream>, ScanError> {
        let connect = async {
            match &self.config.address {
                ClamdAddress::Tcp(addr) => tokio::net::TcpStream::connect(addr)
                    .await
                    .map(|s| Box::new(s) as Box<dyn ClamdStream>),
                #[cfg(unix)]
                ClamdAddress::Unix(path) => tokio::net::UnixStream::connect(path)
                    .await
                    .map(|s| Box::new(s) as Box<dyn ClamdStream>),
            }
        };

        match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ScanError::engine_unreachable(ENGINE, e.to_string())),
            Err(_) => Err(ScanError::engine_unreachable(
                ENGINE,
                format!("connect timed out after {:?}", self.config.connect_timeout),
            )),
        }
    }

    /// Sends one command (and optional INSTREAM payload) and reads the reply.
    async fn exchange(&self, command: &[u8], payload: Option<&[u8]>) -> Result<String, ScanError> {
        let mut stream = self.connect().await?;
        let chunk_size = self.config.chunk_size;

        let io = async {
            stream.write_all(command).await?;
            if let Some(data) = payload {
                for chunk in data.chunks(chunk_size) {
                    stream.write_all(&(chunk.len() as u32).to_be_bytes()).await?;
                    stream.write_all(chunk).await?;
                }
                stream.write_all(&0u32.to_be_bytes()).await?;
            }
            stream.flush().await?;

            let mut response = Vec::new();
            stream.read_to_end(&mut response).await?;
            Ok::<_, std::io::Error>(response)
        };

        let response = match tokio::time::timeout(self.config.read_timeout, io).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ScanError::transport(ENGINE, e.to_string())),
            Err(_) => return Err(ScanError::read_timeout(ENGINE, self.config.read_timeout)),
        };

        String::from_utf8(response)
            .map_err(|_| ScanError::malformed(ENGINE, "response is not valid UTF-8"))
    }
}

#[async_trait]
impl ScanEngineClient for ClamdClient {
    fn name(&self) -> &str {
        ENGINE
    }

    async fn probe(&self) -> Result<EngineHealth, ScanError> {
        let response = self.exchange(b"zSTATS\0", None).await?;
        parse_stats(&response)
    }

    async fn scan_stream(&self, data: &[u8]) -> Result<Vec<ScanVerdict>, ScanError> {
        let response = self.exchange(b"zINSTREAM\0", Some(data)).await?;
        parse_scan_response(&response)
    }
}

/// Parses an INSTREAM reply into verdicts.
fn parse_scan_response(response: &str) -> Result<Vec<ScanVerdict>, ScanError> {
    let verdicts = response
        .split(['\0', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_verdict_line)
        .collect::<Result<Vec<_>, _>>()?;

    if verdicts.is_empty() {
        return Err(ScanError::malformed(ENGINE, "empty reply"));
    }
    Ok(verdicts)
}

fn parse_verdict_line(line: &str) -> Result<ScanVerdict, ScanError> {
    if let Some(message) = line.strip_suffix("ERROR") {
        let message = message.trim().trim_end_matches(':').trim();
        return Err(ScanError::engine_error(ENGINE, message));
    }

    // "stream: <result>"
    let result = line.split_once(": ").map_or(line, |(_, rest)| rest).trim();
    if result == "OK" {
        Ok(ScanVerdict::clean())
    } else if let Some(signature) = result.strip_suffix("FOUND") {
        Ok(ScanVerdict::infected(signature.trim()))
    } else {
        Ok(ScanVerdict::unknown(result))
    }
}

/// Parses a STATS reply into engine health.
fn parse_stats(response: &str) -> Result<EngineHealth, ScanError> {
    let mut health = EngineHealth::default();
    let mut saw_threads = false;

    for line in response.lines().map(|l| l.trim_matches(|c: char| c == '\0' || c.is_whitespace())) {
        if let Some(rest) = line.strip_prefix("THREADS:") {
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            health.threads_live = token_value(&tokens, "live")?;
            health.threads_idle = token_value(&tokens, "idle")?;
            health.threads_max = token_value(&tokens, "max")?;
            saw_threads = true;
        } else if let Some(rest) = line.strip_prefix("QUEUE:") {
            health.queue_items = rest
                .split_whitespace()
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("MEMSTATS:") {
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            health.mem_used_mb = token_after(&tokens, "used").and_then(parse_megabytes);
            health.mem_free_mb = token_after(&tokens, "free").and_then(parse_megabytes);
        }
    }

    if !saw_threads {
        return Err(ScanError::malformed(ENGINE, "STATS reply has no THREADS line"));
    }
    Ok(health)
}

fn token_after<'a>(tokens: &[&'a str], key: &str) -> Option<&'a str> {
    tokens
        .windows(2)
        .find(|pair| pair[0] == key)
        .map(|pair| pair[1])
}

fn token_value(tokens: &[&str], key: &str) -> Result<u32, ScanError> {
    token_after(tokens, key)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ScanError::malformed(ENGINE, format!("THREADS line has no '{key}' value")))
}

/// "1306.837M" -> 1306.837; "N/A" -> None.
fn parse_megabytes(value: &str) -> Option<f64> {
    value.trim_end_matches('M').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VerdictStatus;
    use tokio::net::TcpListener;

    const STATS: &str = "POOLS: 1\n\nSTATE: VALID PRIMARY\n\
        THREADS: live 1  idle 3 max 12 idle-timeout 30\n\
        QUEUE: 2 items\n\tSTATS 0.000394\n\n\
        MEMSTATS: heap N/A mmap N/A used 15.250M free 2.500M releasable N/A pools 1 pools_used 1306.837M pools_total 1306.882M\n\
        END\0";

    /// A single-connection clamd stand-in. Returns the reassembled INSTREAM
    /// payload once the exchange completes.
    async fn fake_clamd(reply: &'static [u8]) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut command = Vec::new();
            loop {
                let byte = socket.read_u8().await.unwrap();
                if byte == 0 {
                    break;
                }
                command.push(byte);
            }

            let mut payload = Vec::new();
            if command == b"zINSTREAM" {
                loop {
                    let len = socket.read_u32().await.unwrap();
                    if len == 0 {
                        break;
                    }
                    let mut chunk = vec![0u8; len as usize];
                    socket.read_exact(&mut chunk).await.unwrap();
                    payload.extend_from_slice(&chunk);
                }
            }

            socket.write_all(reply).await.unwrap();
            socket.shutdown().await.unwrap();
            payload
        });

        (addr, handle)
    }

    #[test]
    fn test_chunk_size_fits_frame_header() {
        let config = ClamdConfig::new().with_chunk_size(usize::MAX);
        assert_eq!(config.chunk_size, u32::MAX as usize);
        assert_eq!(ClamdConfig::new().with_chunk_size(0).chunk_size, 1);
    }

    #[test]
    fn test_parse_response_clean() {
        let verdicts = parse_scan_response("stream: OK\0").unwrap();
        assert_eq!(verdicts, vec![ScanVerdict::clean()]);
    }

    #[test]
    fn test_parse_response_infected() {
        let verdicts = parse_scan_response("stream: Eicar-Test-Signature FOUND\0").unwrap();
        assert_eq!(verdicts, vec![ScanVerdict::infected("Eicar-Test-Signature")]);
    }

    #[test]
    fn test_parse_response_multiple_matches() {
        let verdicts =
            parse_scan_response("stream: Sig.One FOUND\nstream: Sig.Two FOUND\0").unwrap();
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[1].signature, "Sig.Two");
    }

    #[test]
    fn test_parse_response_error_line() {
        let err = parse_scan_response("INSTREAM size limit exceeded. ERROR\0").unwrap_err();
        assert!(matches!(err, ScanError::EngineError { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_parse_response_unknown_status() {
        let verdicts = parse_scan_response("stream: SOMETHING ELSE").unwrap();
        assert_eq!(
            verdicts[0].status,
            VerdictStatus::Unknown("SOMETHING ELSE".into())
        );
        assert!(!verdicts[0].is_clean());
    }

    #[test]
    fn test_parse_response_empty() {
        assert!(matches!(
            parse_scan_response("\0"),
            Err(ScanError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_parse_stats() {
        let health = parse_stats(STATS).unwrap();
        assert_eq!(health.threads_live, 1);
        assert_eq!(health.threads_idle, 3);
        assert_eq!(health.threads_max, 12);
        assert_eq!(health.queue_items, 2);
        assert_eq!(health.mem_used_mb, Some(15.25));
        assert_eq!(health.mem_free_mb, Some(2.5));
    }

    #[test]
    fn test_parse_stats_not_available_memory() {
        let health =
            parse_stats("THREADS: live 0 idle 0 max 0 idle-timeout 30\nMEMSTATS: used N/A free N/A\nEND")
                .unwrap();
        assert_eq!(health.mem_used_mb, None);
        assert!(!health.has_capacity());
    }

    #[test]
    fn test_parse_stats_without_threads() {
        assert!(parse_stats("POOLS: 1\nEND").is_err());
    }

    #[test]
    fn test_address_parsing() {
        assert_eq!(
            ClamdAddress::parse("localhost:3310").unwrap(),
            ClamdAddress::Tcp("localhost:3310".into())
        );
        assert_eq!(
            ClamdAddress::parse("tcp://10.0.0.5:3310").unwrap(),
            ClamdAddress::Tcp("10.0.0.5:3310".into())
        );
        #[cfg(unix)]
        assert_eq!(
            ClamdAddress::parse("unix:///var/run/clamav/clamd.ctl").unwrap(),
            ClamdAddress::Unix("/var/run/clamav/clamd.ctl".into())
        );
        assert!(ClamdAddress::parse("localhost").is_err());
        assert!(ClamdAddress::parse("localhost:notaport").is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ClamdConfig::new()
            .with_tcp("clamav:3310")
            .with_connect_timeout(Duration::from_secs(5))
            .with_read_timeout(Duration::from_secs(60))
            .with_chunk_size(0);

        assert_eq!(config.address, ClamdAddress::Tcp("clamav:3310".into()));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.chunk_size, 1);
    }

    #[tokio::test]
    async fn test_instream_round_trip() {
        let (addr, server) = fake_clamd(b"stream: OK\0").await;
        let client = ClamdClient::new(ClamdConfig::new().with_tcp(addr).with_chunk_size(7));

        let body: Vec<u8> = (0..100u8).collect();
        let verdicts = client.scan_stream(&body).await.unwrap();

        assert_eq!(verdicts, vec![ScanVerdict::clean()]);
        assert_eq!(server.await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_instream_empty_body() {
        let (addr, server) = fake_clamd(b"stream: OK\0").await;
        let client = ClamdClient::new(ClamdConfig::new().with_tcp(addr));

        assert!(client.scan_stream(b"").await.unwrap()[0].is_clean());
        assert!(server.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_instream_detection() {
        let (addr, _server) = fake_clamd(b"stream: Win.Test.EICAR_HDB-1 FOUND\0").await;
        let client = ClamdClient::new(ClamdConfig::new().with_tcp(addr));

        let verdicts = client.scan_stream(b"X5O!P%@AP").await.unwrap();
        assert_eq!(verdicts[0].signature, "Win.Test.EICAR_HDB-1");
    }

    #[tokio::test]
    async fn test_probe() {
        let (addr, _server) = fake_clamd(STATS.as_bytes()).await;
        let client = ClamdClient::new(ClamdConfig::new().with_tcp(addr));

        let health = client.probe().await.unwrap();
        assert_eq!(health.threads_max, 12);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = ClamdClient::new(ClamdConfig::new().with_tcp(addr));
        let err = client.scan_stream(b"data").await.unwrap_err();
        assert!(matches!(err, ScanError::EngineUnreachable { .. }));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let client = ClamdClient::new(
            ClamdConfig::new()
                .with_tcp(addr)
                .with_read_timeout(Duration::from_millis(50)),
        );
        let err = client.scan_stream(b"data").await.unwrap_err();
        assert!(matches!(err, ScanError::ReadTimeout { .. }));
    }
}
