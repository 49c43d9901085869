//! Application configuration loaded from environment variables.

use inventory::{DEFAULT_MAX_UPDATE_RETRIES, ReservationConfig};
use saga::{DEFAULT_PICK_PRIORITY, SagaConfig};

use crate::error::{Result, ServiceError};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ServiceError::Config(format!(
                "LOG_FORMAT must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Engine configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `PICK_PRIORITY`: priority of pick tasks, 1 to 10 (default: `7`)
/// - `SEND_NOTIFICATIONS`: whether the notification step runs (default: `true`)
/// - `RESERVATION_TTL_SECS`: reservation lifetime; unset means no expiry
/// - `INVENTORY_UPDATE_RETRIES`: retries on ledger version conflicts (default: `3`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub pick_priority: u8,
    pub send_notifications: bool,
    pub reservation_ttl_secs: Option<u64>,
    pub inventory_update_retries: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Missing or empty keys take their default. Present but malformed values
    /// are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let pick_priority = match get("PICK_PRIORITY") {
            Some(raw) => parse::<u8>("PICK_PRIORITY", &raw)?,
            None => defaults.pick_priority,
        };
        if !(1..=10).contains(&pick_priority) {
            return Err(ServiceError::Config(format!(
                "PICK_PRIORITY must be between 1 and 10, got {pick_priority}"
            )));
        }

        Ok(Self {
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match get("LOG_FORMAT") {
                Some(raw) => raw.parse()?,
                None => defaults.log_format,
            },
            pick_priority,
            send_notifications: match get("SEND_NOTIFICATIONS") {
                Some(raw) => parse_bool("SEND_NOTIFICATIONS", &raw)?,
                None => defaults.send_notifications,
            },
            reservation_ttl_secs: get("RESERVATION_TTL_SECS")
                .map(|raw| parse("RESERVATION_TTL_SECS", &raw))
                .transpose()?,
            inventory_update_retries: match get("INVENTORY_UPDATE_RETRIES") {
                Some(raw) => parse("INVENTORY_UPDATE_RETRIES", &raw)?,
                None => defaults.inventory_update_retries,
            },
        })
    }

    /// Returns the orchestrator settings.
    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig {
            pick_priority: self.pick_priority,
            send_notifications: self.send_notifications,
        }
    }

    /// Returns the reservation manager settings.
    pub fn reservation_config(&self) -> ReservationConfig {
        ReservationConfig {
            max_update_retries: self.inventory_update_retries,
            reservation_ttl: self
                .reservation_ttl_secs
                .and_then(|secs| i64::try_from(secs).ok())
                .map(chrono::Duration::seconds),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            pick_priority: DEFAULT_PICK_PRIORITY,
            send_notifications: true,
            reservation_ttl_secs: None,
            inventory_update_retries: DEFAULT_MAX_UPDATE_RETRIES,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ServiceError::Config(format!("{key} has invalid value '{raw}'")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ServiceError::Config(format!(
            "{key} has invalid value '{raw}'"
        ))),
    }
}
