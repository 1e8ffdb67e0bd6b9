use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::listings::query::MAX_PAGE_LIMIT;

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
    pub listings: ListingConfig,
    pub media: MediaConfig,
    pub verification: VerificationConfig,
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

        let listings = ListingConfig {
            default_limit: page_limit_var("LISTING_DEFAULT_LIMIT", 20)?,
            pending_limit: page_limit_var("LISTING_PENDING_LIMIT", 50)?,
        };

        let media = MediaConfig {
            root: PathBuf::from(env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string())),
            base_url: env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            max_image_bytes: numeric_var("MEDIA_MAX_IMAGE_BYTES", 10 * 1024 * 1024)?,
        };

        let verification = VerificationConfig {
            code_ttl: seconds_var("VERIFICATION_CODE_TTL_SECS", 600)?,
            resend_cooldown: seconds_var("VERIFICATION_RESEND_COOLDOWN_SECS", 60)?,
            max_attempts: numeric_var("VERIFICATION_MAX_ATTEMPTS", 5u32)?.max(1),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            listings,
            media,
            verification,
        })
    }
}

fn numeric_var<T: FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        Err(_) => Ok(default),
    }
}

fn seconds_var(variable: &'static str, default: u32) -> Result<chrono::Duration, ConfigError> {
    let seconds = numeric_var(variable, default)?;
    Ok(chrono::Duration::seconds(i64::from(seconds)))
}

fn page_limit_var(variable: &'static str, default: usize) -> Result<usize, ConfigError> {
    let value = numeric_var(variable, default)?;
    if (1..=MAX_PAGE_LIMIT).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::LimitOutOfRange { variable, value })
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

/// Page sizes applied when a list request omits `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingConfig {
    pub default_limit: usize,
    pub pending_limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            pending_limit: 50,
        }
    }
}

/// Where listing images live and how large they may be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub base_url: String,
    pub max_image_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("media"),
            base_url: "http://localhost:3000".to_string(),
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Phone verification code lifetime, resend throttle, and wrong-code allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationConfig {
    pub code_ttl: chrono::Duration,
    pub resend_cooldown: chrono::Duration,
    /// Wrong guesses tolerated before the outstanding code is discarded.
    pub max_attempts: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl: chrono::Duration::minutes(10),
            resend_cooldown: chrono::Duration::seconds(60),
            max_attempts: 5,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
    LimitOutOfRange { variable: &'static str, value: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a non-negative integer")
            }
            ConfigError::LimitOutOfRange { variable, value } => {
                write!(
                    f,
                    "{variable} must lie between 1 and {MAX_PAGE_LIMIT} (found {value})"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::LimitOutOfRange { .. } => None,
        }
    }
}
