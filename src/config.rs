// src/config.rs

//! Manages proxy configuration: loading, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Which DTN transport strategy carries proxied requests.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Datagram gateway over a bundle-layer peer socket.
    #[default]
    BpSocket,
    /// Shell out to the ION CLI tools (`bpsendfile`/`bprecvfile`).
    IonCli,
    /// Direct HTTP to the origin, for development without a bundle link.
    LocalHttp,
}

/// HTTP listener settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8082
}

/// Datagram peer endpoints for the `bp_socket` transport.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatagramConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_peer_addr")]
    pub peer_addr: String,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            peer_addr: default_peer_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:14900".to_string()
}
fn default_peer_addr() -> String {
    "127.0.0.1:15000".to_string()
}

/// ION endpoint ids and scratch directory for the `ion_cli` transport.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IonCliConfig {
    #[serde(default = "default_recv_eid")]
    pub recv_eid: String,
    #[serde(default = "default_source_eid")]
    pub source_eid: String,
    #[serde(default = "default_dest_eid")]
    pub dest_eid: String,
    #[serde(default = "default_request_dir")]
    pub request_dir: String,
}

impl Default for IonCliConfig {
    fn default() -> Self {
        Self {
            recv_eid: default_recv_eid(),
            source_eid: default_source_eid(),
            dest_eid: default_dest_eid(),
            request_dir: default_request_dir(),
        }
    }
}

fn default_recv_eid() -> String {
    "ipn:149.2".to_string()
}
fn default_source_eid() -> String {
    "ipn:149.1".to_string()
}
fn default_dest_eid() -> String {
    "ipn:150.1".to_string()
}
fn default_request_dir() -> String {
    "./request".to_string()
}

/// DTN gateway settings shared by all transport strategies.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GatewayConfig {
    #[serde(default)]
    pub mode: TransportMode,
    /// Per-request timeout awaiting the correlated response.
    #[serde(with = "humantime_serde", default = "default_gateway_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub datagram: DatagramConfig,
    #[serde(default)]
    pub ion: IonCliConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            timeout: default_gateway_timeout(),
            datagram: DatagramConfig::default(),
            ion: IonCliConfig::default(),
        }
    }
}

fn default_gateway_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Keyspace key names, scan paging and snapshot persistence.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KeyspaceConfig {
    #[serde(default = "default_reserved_requests_key")]
    pub reserved_requests_key: String,
    #[serde(default = "default_pending_requests_key")]
    pub pending_requests_key: String,
    #[serde(default = "default_cache_meta_prefix")]
    pub cache_meta_prefix: String,
    /// Page size for expired-record scans. `0` falls back to 100.
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    #[serde(with = "humantime_serde", default = "default_snapshot_interval")]
    pub snapshot_interval: Duration,
}

impl Default for KeyspaceConfig {
    fn default() -> Self {
        Self {
            reserved_requests_key: default_reserved_requests_key(),
            pending_requests_key: default_pending_requests_key(),
            cache_meta_prefix: default_cache_meta_prefix(),
            scan_count: default_scan_count(),
            snapshot_path: default_snapshot_path(),
            snapshot_interval: default_snapshot_interval(),
        }
    }
}

fn default_reserved_requests_key() -> String {
    "bp:reserved:requests".to_string()
}
fn default_pending_requests_key() -> String {
    "bp:pending:requests".to_string()
}
fn default_cache_meta_prefix() -> String {
    "bp:cache:meta:".to_string()
}
fn default_scan_count() -> usize {
    100
}
fn default_snapshot_path() -> String {
    "bundlecache_data/keyspace.snapshot".to_string()
}
fn default_snapshot_interval() -> Duration {
    Duration::from_secs(60)
}

/// Content cache location and lifetimes.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    /// Root directory for cached body files.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub default_ttl: Duration,
    #[serde(with = "humantime_serde", default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            default_ttl: default_cache_ttl(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_cache_dir() -> String {
    "bundlecache_data/cache".to_string()
}
fn default_cache_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}
fn default_cleanup_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Worker pool sizing.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// How long a single blocking pop on the reserved queue waits.
    #[serde(with = "humantime_serde", default = "default_queue_watch_timeout")]
    pub queue_watch_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_watch_timeout: default_queue_watch_timeout(),
        }
    }
}

fn default_workers() -> usize {
    10
}
fn default_queue_watch_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Placeholder asset location.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaceholderConfig {
    #[serde(default = "default_placeholder_dir")]
    pub dir: String,
    #[serde(default = "default_placeholder_file")]
    pub default_file: String,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            dir: default_placeholder_dir(),
            default_file: default_placeholder_file(),
        }
    }
}

fn default_placeholder_dir() -> String {
    "pages".to_string()
}
fn default_placeholder_file() -> String {
    "default.html".to_string()
}

/// Certificate material for the TLS-intercept middleware. The middleware
/// itself lives outside this crate; the paths are validated here so a
/// misconfiguration fails at startup.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TlsInterceptConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cert_path")]
    pub cert_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

fn default_cert_path() -> String {
    "certs/bundlecache.crt".to_string()
}
fn default_key_path() -> String {
    "certs/bundlecache.key".to_string()
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

/// The full, validated proxy configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub keyspace: KeyspaceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub placeholder: PlaceholderConfig,
    #[serde(default)]
    pub tls_intercept: TlsInterceptConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            gateway: GatewayConfig::default(),
            keyspace: KeyspaceConfig::default(),
            cache: CacheConfig::default(),
            worker: WorkerConfig::default(),
            placeholder: PlaceholderConfig::default(),
            tls_intercept: TlsInterceptConfig::default(),
            metrics: MetricsConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("server.port cannot be 0"));
        }
        if self.server.host.trim().is_empty() {
            return Err(anyhow!("server.host cannot be empty"));
        }
        if self.worker.workers == 0 {
            return Err(anyhow!("worker.workers cannot be 0"));
        }
        if self.gateway.timeout.is_zero() {
            return Err(anyhow!("gateway.timeout cannot be 0"));
        }
        if self.cache.default_ttl.is_zero() {
            return Err(anyhow!("cache.default_ttl cannot be 0"));
        }
        if self.cache.cleanup_interval.is_zero() {
            return Err(anyhow!("cache.cleanup_interval cannot be 0"));
        }
        if self.cache.dir.trim().is_empty() {
            return Err(anyhow!("cache.dir cannot be empty"));
        }

        match self.gateway.mode {
            TransportMode::BpSocket => {
                if self.gateway.datagram.bind_addr.trim().is_empty()
                    || self.gateway.datagram.peer_addr.trim().is_empty()
                {
                    return Err(anyhow!(
                        "gateway.datagram bind/peer addresses are required in bp_socket mode"
                    ));
                }
            }
            TransportMode::IonCli => {
                if self.gateway.ion.recv_eid.trim().is_empty()
                    || self.gateway.ion.source_eid.trim().is_empty()
                    || self.gateway.ion.dest_eid.trim().is_empty()
                {
                    return Err(anyhow!("gateway.ion endpoint ids are required in ion_cli mode"));
                }
            }
            TransportMode::LocalHttp => {}
        }

        if self.tls_intercept.enabled {
            if self.tls_intercept.cert_path.trim().is_empty() {
                return Err(anyhow!(
                    "tls_intercept.cert_path cannot be empty when interception is enabled"
                ));
            }
            if self.tls_intercept.key_path.trim().is_empty() {
                return Err(anyhow!(
                    "tls_intercept.key_path cannot be empty when interception is enabled"
                ));
            }
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.server.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}
