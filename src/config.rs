use h3o::Resolution;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Which spatial index backs the segment store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    RTree,
    Hex,
}

impl FromStr for IndexKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rtree" | "r-tree" => Ok(Self::RTree),
            "h3" | "hex" => Ok(Self::Hex),
            _ => Err(ConfigError::InvalidIndex(value.to_string())),
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub segments: SegmentConfig,
}

impl AppConfig {
    /// Reads `.env` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = AppEnvironment::parse(&var("APP_ENV", "development"));

        let host = var("APP_HOST", "0.0.0.0");
        let port = var("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var("APP_LOG_LEVEL", "info");

        let data_path = PathBuf::from(var("SEGMENT_DATA_PATH", "assets/street_segment_risk.csv"));
        let index = var("SEGMENT_INDEX", "rtree").parse::<IndexKind>()?;
        let search_radius_m = var("SEGMENT_SEARCH_RADIUS_M", "100")
            .parse::<f64>()
            .ok()
            .filter(|radius| radius.is_finite() && *radius > 0.0)
            .ok_or(ConfigError::InvalidRadius)?;
        let h3_resolution = var("SEGMENT_H3_RESOLUTION", "9")
            .parse::<u8>()
            .ok()
            .and_then(|level| Resolution::try_from(level).ok())
            .ok_or(ConfigError::InvalidResolution)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            segments: SegmentConfig {
                data_path,
                index,
                search_radius_m,
                h3_resolution,
            },
        })
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

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where segment risk data comes from and how it is searched.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    pub data_path: PathBuf,
    pub index: IndexKind,
    pub search_radius_m: f64,
    pub h3_resolution: Resolution,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("SEGMENT_INDEX must be 'rtree' or 'h3', got '{0}'")]
    InvalidIndex(String),
    #[error("SEGMENT_SEARCH_RADIUS_M must be a positive number of meters")]
    InvalidRadius,
    #[error("SEGMENT_H3_RESOLUTION must be between 0 and 15")]
    InvalidResolution,
}
