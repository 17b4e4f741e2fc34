use std::env;
use std::fmt;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::eligibility::EngineConfig;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let engine = match env::var("ENGINE_CONFIG_PATH") {
            Ok(path) if !path.trim().is_empty() => load_engine_config(PathBuf::from(path))?,
            _ => EngineConfig::default(),
        };

        let rate_limit = RateLimitConfig {
            max_requests: parse_positive("RATE_LIMIT_REQUESTS", RateLimitConfig::DEFAULT_REQUESTS)?,
            window: Duration::from_secs(parse_positive(
                "RATE_LIMIT_WINDOW_SECS",
                RateLimitConfig::DEFAULT_WINDOW_SECS,
            )?),
        };

        let cache = CacheConfig {
            ttl: Duration::from_secs(parse_positive(
                "CACHE_TTL_SECS",
                CacheConfig::DEFAULT_TTL_SECS,
            )?),
            capacity: CacheConfig::DEFAULT_CAPACITY,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine,
            rate_limit,
            cache,
        })
    }
}

fn load_engine_config(path: PathBuf) -> Result<EngineConfig, ConfigError> {
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::EngineFile {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::EngineFormat { path, source })
}

fn parse_positive(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(ConfigError::InvalidNumber { var, value }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Fixed-window request budget per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window: Duration,
}

impl RateLimitConfig {
    pub const DEFAULT_REQUESTS: u64 = 30;
    pub const DEFAULT_WINDOW_SECS: u64 = 60;
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: Self::DEFAULT_REQUESTS,
            window: Duration::from_secs(Self::DEFAULT_WINDOW_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
}

impl CacheConfig {
    pub const DEFAULT_TTL_SECS: u64 = 1800;
    pub const DEFAULT_CAPACITY: usize = 1000;
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(Self::DEFAULT_TTL_SECS),
            capacity: Self::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidNumber {
        var: &'static str,
        value: String,
    },
    EngineFile {
        path: PathBuf,
        source: std::io::Error,
    },
    EngineFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a positive integer, found '{value}'")
            }
            ConfigError::EngineFile { path, .. } => {
                write!(f, "unable to read engine config at {}", path.display())
            }
            ConfigError::EngineFormat { path, source } => {
                write!(f, "engine config at {} is malformed: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::EngineFile { source, .. } => Some(source),
            ConfigError::EngineFormat { source, .. } => Some(source),
        }
    }
}
