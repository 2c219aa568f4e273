//! Server configuration.
//!
//! Configuration is loaded once from environment variables with fallback to
//! defaults, then shared read-only through the router state.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// JWT secret used by debug builds when none is configured.
const DEV_JWT_SECRET: &str = "kiosk-dev-secret-change-in-production";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// Secret for signing session tokens
    pub jwt_secret: String,

    /// Session lifetime in days
    pub jwt_ttl_days: i64,

    /// Set the `Secure` flag on the session cookie
    pub cookie_secure: bool,

    /// Allowed browser origin (credentials enabled); `None` disables CORS
    pub cors_origin: Option<String>,

    /// Bootstrap admin, created when the user table is empty
    pub admin_username: String,
    pub admin_password: String,

    /// Telegram delivery; both must be set, otherwise messages are logged
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_base: String,

    /// Outbox poll interval
    pub notify_poll: Duration,

    /// Hour (UTC) on the first of the month when the monthly report is due
    pub report_hour_utc: u32,

    /// Scheduler tick interval
    pub scheduler_tick: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => DEV_JWT_SECRET.to_string(),
            None => return Err(ConfigError::MissingRequired("JWT_SECRET".to_string())),
        };

        let config = AppConfig {
            http_port: parse(&var, "KIOSK_HTTP_PORT", 4000)?,
            database_path: var("KIOSK_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/kiosk.db")),
            db_max_connections: parse(&var, "KIOSK_DB_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            jwt_ttl_days: parse(&var, "JWT_TTL_DAYS", 7)?,
            cookie_secure: parse(&var, "COOKIE_SECURE", false)?,
            cors_origin: var("CORS_ORIGIN"),
            admin_username: var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            admin_password: var("ADMIN_PASSWORD").unwrap_or_else(|| "admin123".to_string()),
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: var("TELEGRAM_CHAT_ID"),
            telegram_api_base: var("TELEGRAM_API_BASE")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            notify_poll: Duration::from_secs(parse(&var, "NOTIFY_POLL_SECS", 5)?),
            report_hour_utc: parse(&var, "REPORT_HOUR_UTC", 9)?,
            scheduler_tick: Duration::from_secs(parse(&var, "SCHEDULER_TICK_SECS", 60)?),
        };

        if config.jwt_ttl_days < 1 {
            return Err(ConfigError::InvalidValue("JWT_TTL_DAYS".to_string()));
        }
        if config.report_hour_utc > 23 {
            return Err(ConfigError::InvalidValue("REPORT_HOUR_UTC".to_string()));
        }
        if config.notify_poll.is_zero() {
            return Err(ConfigError::InvalidValue("NOTIFY_POLL_SECS".to_string()));
        }
        if config.scheduler_tick.is_zero() {
            return Err(ConfigError::InvalidValue("SCHEDULER_TICK_SECS".to_string()));
        }

        Ok(config)
    }

    /// Telegram credentials, when both are configured.
    pub fn telegram(&self) -> Option<(&str, &str)> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Some((token, chat_id)),
            _ => None,
        }
    }
}

fn parse<T, F>(var: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", "s")]).unwrap();
        assert_eq!(config.http_port, 4000);
        assert_eq!(config.jwt_ttl_days, 7);
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.report_hour_utc, 9);
        assert_eq!(config.scheduler_tick, Duration::from_secs(60));
        assert!(config.telegram().is_none());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = load(&[("JWT_SECRET", "s"), ("KIOSK_HTTP_PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "KIOSK_HTTP_PORT"));

        let err = load(&[("JWT_SECRET", "s"), ("REPORT_HOUR_UTC", "24")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_telegram_needs_both_values() {
        let config = load(&[("JWT_SECRET", "s"), ("TELEGRAM_BOT_TOKEN", "t")]).unwrap();
        assert!(config.telegram().is_none());

        let config = load(&[
            ("JWT_SECRET", "s"),
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", "-100"),
        ])
        .unwrap();
        assert_eq!(config.telegram(), Some(("t", "-100")));
    }
}
