use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::access::DisclosureConfig;
use crate::enforcement::EnforcementConfig;
use crate::monitoring::MonitorConfig;

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

/// Top-level configuration for the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scheduler: SchedulerConfig,
    pub engine: EngineConfig,
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

        let tick_seconds: u64 = parse_var("SWEEP_TICK_SECONDS", 30)?;
        if tick_seconds == 0 {
            return Err(ConfigError::OutOfRange {
                key: "SWEEP_TICK_SECONDS",
                value: tick_seconds.to_string(),
            });
        }

        let defaults = EngineConfig::default();
        let success_fee_percent: u8 = parse_var(
            "SUCCESS_FEE_PERCENT",
            defaults.enforcement.success_fee_percent,
        )?;
        if success_fee_percent == 0 || success_fee_percent > 100 {
            return Err(ConfigError::OutOfRange {
                key: "SUCCESS_FEE_PERCENT",
                value: success_fee_percent.to_string(),
            });
        }
        let payment_terms_days: i64 =
            parse_var("PAYMENT_TERMS_DAYS", defaults.enforcement.payment_terms_days)?;
        if payment_terms_days < 0 {
            return Err(ConfigError::OutOfRange {
                key: "PAYMENT_TERMS_DAYS",
                value: payment_terms_days.to_string(),
            });
        }
        let local_utc_offset_minutes: i32 = parse_var(
            "LOCAL_UTC_OFFSET_MINUTES",
            defaults.monitor.local_utc_offset_minutes,
        )?;
        if !(-720..=840).contains(&local_utc_offset_minutes) {
            return Err(ConfigError::OutOfRange {
                key: "LOCAL_UTC_OFFSET_MINUTES",
                value: local_utc_offset_minutes.to_string(),
            });
        }
        let video_cap_seconds: u32 =
            parse_var("VIDEO_CAP_SECONDS", defaults.disclosure.video_cap_seconds)?;
        if video_cap_seconds == 0 {
            return Err(ConfigError::OutOfRange {
                key: "VIDEO_CAP_SECONDS",
                value: video_cap_seconds.to_string(),
            });
        }

        let engine = EngineConfig {
            disclosure: DisclosureConfig {
                video_cap_seconds,
                ..defaults.disclosure
            },
            monitor: MonitorConfig {
                local_utc_offset_minutes,
                suspend_on_critical: parse_flag(
                    "SUSPEND_ON_CRITICAL",
                    defaults.monitor.suspend_on_critical,
                )?,
                ..defaults.monitor
            },
            enforcement: EnforcementConfig {
                success_fee_percent,
                bypass_penalty_pence: parse_var(
                    "BYPASS_PENALTY_PENCE",
                    defaults.enforcement.bypass_penalty_pence,
                )?,
                confirmed_hire_penalty_pence: parse_var(
                    "CONFIRMED_HIRE_PENALTY_PENCE",
                    defaults.enforcement.confirmed_hire_penalty_pence,
                )?,
                payment_terms_days,
            },
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scheduler: SchedulerConfig { tick_seconds },
            engine,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key, value: raw }),
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

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub tick_seconds: u64,
}

/// Tuning for the engine components. Defaults are the production values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub disclosure: DisclosureConfig,
    pub monitor: MonitorConfig,
    pub enforcement: EnforcementConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidFlag { key: &'static str, value: String },
    OutOfRange { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a number (got '{value}')")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be true or false (got '{value}')")
            }
            ConfigError::OutOfRange { key, value } => {
                write!(f, "{key} is out of range (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
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
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "SWEEP_TICK_SECONDS",
            "SUCCESS_FEE_PERCENT",
            "BYPASS_PENALTY_PENCE",
            "CONFIRMED_HIRE_PENALTY_PENCE",
            "PAYMENT_TERMS_DAYS",
            "LOCAL_UTC_OFFSET_MINUTES",
            "SUSPEND_ON_CRITICAL",
            "VIDEO_CAP_SECONDS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.scheduler.tick_seconds, 30);
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.enforcement.success_fee_percent, 15);
        assert!(config.engine.monitor.suspend_on_critical);
    }

    #[test]
    fn engine_overrides_are_read_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SUCCESS_FEE_PERCENT", "20");
        env::set_var("SUSPEND_ON_CRITICAL", "false");
        env::set_var("LOCAL_UTC_OFFSET_MINUTES", "60");
        env::set_var("VIDEO_CAP_SECONDS", "90");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.engine.enforcement.success_fee_percent, 20);
        assert!(!config.engine.monitor.suspend_on_critical);
        assert_eq!(config.engine.monitor.local_utc_offset_minutes, 60);
        assert_eq!(config.engine.disclosure.video_cap_seconds, 90);
        reset_env();
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SUCCESS_FEE_PERCENT", "150");
        let err = AppConfig::load().unwrap_err();
        assert!(err.to_string().contains("SUCCESS_FEE_PERCENT"));

        reset_env();
        env::set_var("SUSPEND_ON_CRITICAL", "maybe");
        let err = AppConfig::load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlag { key: "SUSPEND_ON_CRITICAL", .. }));
        reset_env();
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }
}
