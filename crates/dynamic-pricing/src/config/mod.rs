use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::FixedOffset;

use crate::pricing::composer::{DEFAULT_MAX_ADJUSTMENT, DEFAULT_MIN_ADJUSTMENT};
use crate::pricing::{AdjustmentBounds, BoundsError, PricingSettings};

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
    pub pricing: PricingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => {
                LogFormat::from_str(&raw).ok_or(ConfigError::InvalidLogFormat { value: raw })?
            }
            Err(_) if environment == AppEnvironment::Production => LogFormat::Json,
            Err(_) => LogFormat::Compact,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            pricing: PricingConfig::from_env()?,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Engine settings plus where the markup tables and clock hour come from.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub settings: PricingSettings,
    pub markup_tables: Option<PathBuf>,
    /// Offset used to read the wall-clock hour; server-local time when unset.
    pub utc_offset: Option<FixedOffset>,
}

impl PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let min_adjustment = float_var("PRICING_MIN_ADJUSTMENT", DEFAULT_MIN_ADJUSTMENT)?;
        let max_adjustment = float_var("PRICING_MAX_ADJUSTMENT", DEFAULT_MAX_ADJUSTMENT)?;
        let bounds = AdjustmentBounds::new(min_adjustment, max_adjustment)
            .map_err(|source| ConfigError::InvalidBounds { source })?;

        let case_insensitive = match env::var("PRICING_CASE_INSENSITIVE") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                var: "PRICING_CASE_INSENSITIVE",
                value: raw,
            })?,
            Err(_) => false,
        };

        let markup_tables = env::var("PRICING_MARKUP_TABLES")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let utc_offset = match env::var("PRICING_UTC_OFFSET") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<FixedOffset>()
                    .map_err(|_| ConfigError::InvalidUtcOffset { value: raw })?,
            ),
            _ => None,
        };

        Ok(Self {
            settings: PricingSettings {
                bounds,
                case_insensitive,
            },
            markup_tables,
            utc_offset,
        })
    }
}

fn float_var(var: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str, value: String },
    InvalidFlag { var: &'static str, value: String },
    InvalidBounds { source: BoundsError },
    InvalidUtcOffset { value: String },
    InvalidLogFormat { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a number (got '{value}')")
            }
            ConfigError::InvalidFlag { var, value } => {
                write!(f, "{var} must be true or false (got '{value}')")
            }
            ConfigError::InvalidBounds { source } => {
                write!(f, "invalid pricing adjustment bounds: {source}")
            }
            ConfigError::InvalidUtcOffset { value } => {
                write!(f, "PRICING_UTC_OFFSET must look like +05:30 (got '{value}')")
            }
            ConfigError::InvalidLogFormat { value } => {
                write!(f, "APP_LOG_FORMAT must be compact or json (got '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidBounds { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidUtcOffset { .. }
            | ConfigError::InvalidLogFormat { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "PRICING_MIN_ADJUSTMENT",
            "PRICING_MAX_ADJUSTMENT",
            "PRICING_CASE_INSENSITIVE",
            "PRICING_MARKUP_TABLES",
            "PRICING_UTC_OFFSET",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.pricing.settings, PricingSettings::default());
        assert!(config.pricing.markup_tables.is_none());
        assert!(config.pricing.utc_offset.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8080));
        reset_env();
    }

    #[test]
    fn reads_pricing_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PRICING_MIN_ADJUSTMENT", "-0.05");
        env::set_var("PRICING_MAX_ADJUSTMENT", "0.25");
        env::set_var("PRICING_CASE_INSENSITIVE", "yes");
        env::set_var("PRICING_MARKUP_TABLES", "/etc/pricing/tables.json");
        env::set_var("PRICING_UTC_OFFSET", "+05:30");

        let config = AppConfig::load().expect("config loads");
        reset_env();

        let pricing = config.pricing;
        assert_eq!(pricing.settings.bounds.min_adjustment(), -0.05);
        assert_eq!(pricing.settings.bounds.max_adjustment(), 0.25);
        assert!(pricing.settings.case_insensitive);
        assert_eq!(
            pricing.markup_tables,
            Some(PathBuf::from("/etc/pricing/tables.json"))
        );
        assert_eq!(
            pricing.utc_offset,
            FixedOffset::east_opt(5 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn production_defaults_to_json_logs() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "prod");
        let config = AppConfig::load().expect("config loads");
        env::set_var("APP_LOG_FORMAT", "compact");
        let overridden = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.telemetry.format, LogFormat::Json);
        assert_eq!(overridden.telemetry.format, LogFormat::Compact);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PRICING_MIN_ADJUSTMENT", "0.5");
        env::set_var("PRICING_MAX_ADJUSTMENT", "0.1");

        let error = AppConfig::load().expect_err("inverted bounds");
        reset_env();

        assert!(matches!(error, ConfigError::InvalidBounds { .. }));
    }

    #[test]
    fn rejects_unparseable_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PRICING_CASE_INSENSITIVE", "sometimes");
        let flag = AppConfig::load().expect_err("bad flag");
        reset_env();
        env::set_var("PRICING_MAX_ADJUSTMENT", "forty");
        let number = AppConfig::load().expect_err("bad number");
        reset_env();
        env::set_var("PRICING_UTC_OFFSET", "IST");
        let offset = AppConfig::load().expect_err("bad offset");
        reset_env();

        assert!(matches!(flag, ConfigError::InvalidFlag { .. }));
        assert!(matches!(
            number,
            ConfigError::InvalidNumber {
                var: "PRICING_MAX_ADJUSTMENT",
                ..
            }
        ));
        assert!(matches!(offset, ConfigError::InvalidUtcOffset { .. }));
    }
}
