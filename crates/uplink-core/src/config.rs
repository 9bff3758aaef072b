//! Configuration module
//!
//! Everything the service reads from the environment lives here: listen port,
//! CORS, store backend, business registry, upload directory, TTLs and the four
//! rate-limit classes.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

const SERVER_PORT: u16 = 8080;
const UPLOAD_TOKEN_TTL_SECS: u64 = 900;
const UPLOAD_SESSION_TTL_SECS: u64 = 86_400;
const TRUSTED_PROXY_COUNT: usize = 1;
const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;
const ENGINE_EVENT_BUFFER: usize = 256;
const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

/// Ephemeral key-value store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid store backend: {}", s)),
        }
    }
}

impl Display for StoreBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StoreBackend::Redis => write!(f, "redis"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

/// A fixed-window quota: at most `limit` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitClass {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitClass {
    pub const fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_secs),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    /// `LOG_FORMAT=json` switches console logs to one JSON object per line.
    pub log_json: bool,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub store_backend: StoreBackend,
    pub redis_addr: String,
    pub redis_password: Option<String>,
    pub database_url: String,
    pub upload_dir: String,
    pub upload_token_ttl: Duration,
    pub upload_session_ttl: Duration,
    pub session_rate_limit: RateLimitClass,
    pub business_rate_limit: RateLimitClass,
    pub token_rate_limit: RateLimitClass,
    pub ws_rate_limit: RateLimitClass,
    pub trusted_proxy_count: usize,
    pub subscriber_queue_capacity: usize,
    pub engine_event_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        let number = |name: &str, default: u64| -> u64 {
            lookup(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let class = |limit_var: &str, window_var: &str, default_limit: u32| -> RateLimitClass {
            let limit = lookup(limit_var)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default_limit);
            RateLimitClass::new(limit, number(window_var, DEFAULT_RATE_WINDOW_SECS))
        };

        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port = var("PORT", &SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let store_backend = var("STORE_BACKEND", "redis").parse::<StoreBackend>()?;

        let log_json = lookup("LOG_FORMAT")
            .map(|f| f.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Config {
            environment,
            log_json,
            server_port,
            cors_origins,
            store_backend,
            redis_addr: var("REDIS_ADDR", "localhost:6379"),
            redis_password: lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()),
            database_url: var("DATABASE_URL", "sqlite://uplink.db?mode=rwc"),
            upload_dir: var("UPLOAD_DIR", "./uploads_data"),
            upload_token_ttl: Duration::from_secs(number(
                "UPLOAD_TOKEN_TTL_SECS",
                UPLOAD_TOKEN_TTL_SECS,
            )),
            upload_session_ttl: Duration::from_secs(number(
                "UPLOAD_SESSION_TTL_SECS",
                UPLOAD_SESSION_TTL_SECS,
            )),
            session_rate_limit: class("SESSION_RATE_LIMIT", "SESSION_RATE_WINDOW_SECS", 10),
            business_rate_limit: class("BUSINESS_RATE_LIMIT", "BUSINESS_RATE_WINDOW_SECS", 10),
            token_rate_limit: class("TOKEN_RATE_LIMIT", "TOKEN_RATE_WINDOW_SECS", 60),
            ws_rate_limit: class("WS_RATE_LIMIT", "WS_RATE_WINDOW_SECS", 30),
            trusted_proxy_count: number("TRUSTED_PROXY_COUNT", TRUSTED_PROXY_COUNT as u64)
                as usize,
            subscriber_queue_capacity: number(
                "SUBSCRIBER_QUEUE_CAPACITY",
                SUBSCRIBER_QUEUE_CAPACITY as u64,
            ) as usize,
            engine_event_buffer: number("ENGINE_EVENT_BUFFER", ENGINE_EVENT_BUFFER as u64)
                as usize,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.store_backend == StoreBackend::Redis && self.redis_addr.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "REDIS_ADDR must be set when using the redis store backend"
            ));
        }

        if !self.database_url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid SQLite connection string"
            ));
        }

        if self.upload_token_ttl.is_zero() || self.upload_session_ttl.is_zero() {
            return Err(anyhow::anyhow!(
                "UPLOAD_TOKEN_TTL_SECS and UPLOAD_SESSION_TTL_SECS must be positive"
            ));
        }

        for (name, class) in [
            ("SESSION", self.session_rate_limit),
            ("BUSINESS", self.business_rate_limit),
            ("TOKEN", self.token_rate_limit),
            ("WS", self.ws_rate_limit),
        ] {
            if class.limit == 0 || class.window.is_zero() {
                return Err(anyhow::anyhow!(
                    "{name}_RATE_LIMIT and {name}_RATE_WINDOW_SECS must be positive"
                ));
            }
        }

        if self.subscriber_queue_capacity == 0 || self.engine_event_buffer == 0 {
            return Err(anyhow::anyhow!(
                "SUBSCRIBER_QUEUE_CAPACITY and ENGINE_EVENT_BUFFER must be positive"
            ));
        }

        Ok(())
    }

    /// Redis connection URL built from address and optional password.
    pub fn redis_url(&self) -> String {
        match &self.redis_password {
            Some(password) => format!(
                "redis://:{}@{}",
                urlencoding::encode(password),
                self.redis_addr
            ),
            None => format!("redis://{}", self.redis_addr),
        }
    }

    pub fn upload_token_ttl_secs(&self) -> u64 {
        self.upload_token_ttl.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(config.upload_token_ttl_secs(), 900);
        assert_eq!(config.upload_session_ttl, Duration::from_secs(86_400));
        assert_eq!(config.session_rate_limit, RateLimitClass::new(10, 60));
        assert_eq!(config.token_rate_limit, RateLimitClass::new(60, 60));
        assert_eq!(config.ws_rate_limit, RateLimitClass::new(30, 60));
        assert_eq!(config.trusted_proxy_count, 1);
        assert_eq!(config.redis_url(), "redis://localhost:6379");
        assert!(!config.is_production());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("STORE_BACKEND", "memory"),
            ("BUSINESS_RATE_LIMIT", "3"),
            ("BUSINESS_RATE_WINDOW_SECS", "5"),
            ("REDIS_PASSWORD", "secret"),
            ("APP_ENV", "staging"),
        ])
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.business_rate_limit, RateLimitClass::new(3, 5));
        assert_eq!(config.redis_url(), "redis://:secret@localhost:6379");
        assert_eq!(config.environment, "staging");
        assert!(!config.log_json);
        assert!(config_from(&[("LOG_FORMAT", "JSON")]).unwrap().log_json);
    }

    #[test]
    fn test_redis_password_is_percent_encoded() {
        let config = config_from(&[("REDIS_PASSWORD", "p@ss:w/rd")]).unwrap();
        assert_eq!(config.redis_url(), "redis://:p%40ss%3Aw%2Frd@localhost:6379");
    }

    #[test]
    fn test_invalid_backend_rejected() {
        assert!(config_from(&[("STORE_BACKEND", "etcd")]).is_err());
        assert!(config_from(&[("PORT", "not-a-port")]).is_err());
    }

    #[test]
    fn test_validate_rejects_wildcard_cors_in_production() {
        let config = config_from(&[("ENVIRONMENT", "production")]).unwrap();
        assert!(config.is_production());
        assert!(config.validate().is_err());

        let config = config_from(&[
            ("ENVIRONMENT", "production"),
            ("CORS_ORIGINS", "https://app.example.com"),
        ])
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = config_from(&[("TOKEN_RATE_LIMIT", "0")]).unwrap();
        assert!(config.validate().is_err());
    }
}
