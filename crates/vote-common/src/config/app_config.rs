//! Application configuration structs
//!
//! Loads configuration from environment variables or from a config file
//! with `VOTE__`-prefixed environment overrides.

use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;

use super::retry::RetryPolicy;
use crate::telemetry::TracingConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    pub database: DatabaseConfig,
    /// Absent means single-instance mode: no cross-instance relay
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub votes: VoteSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: default_env(),
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            _ => Err(ConfigError::InvalidValue("APP_ENV", s.to_string())),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// JWT configuration for session tokens
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_session_token_expiry")]
    pub session_token_expiry: i64,
}

/// Reaction coordinator tuning
#[derive(Debug, Clone, Deserialize)]
pub struct VoteSettings {
    /// Total attempts per cast, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// How long a cast waits for an unresolved session
    #[serde(default = "default_auth_ready_timeout_ms")]
    pub auth_ready_timeout_ms: u64,
}

impl Default for VoteSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            auth_ready_timeout_ms: default_auth_ready_timeout_ms(),
        }
    }
}

impl VoteSettings {
    /// Check the values make a usable retry loop
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "votes.max_attempts",
                "must be at least 1".to_string(),
            ));
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(
                "votes.backoff_multiplier",
                self.backoff_multiplier.to_string(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ConfigError::InvalidValue(
                "votes.max_backoff_ms",
                format!(
                    "{} is below initial_backoff_ms {}",
                    self.max_backoff_ms, self.initial_backoff_ms
                ),
            ));
        }
        Ok(())
    }

    /// Build the coordinator's retry policy
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            self.initial_backoff_ms,
            self.max_backoff_ms,
            self.backoff_multiplier,
        )
    }

    #[must_use]
    pub fn auth_ready_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.auth_ready_timeout_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl TelemetrySettings {
    /// Convert to a tracing config, falling back to `info` on an unknown level
    #[must_use]
    pub fn tracing_config(&self, env: Environment) -> TracingConfig {
        let mut config = if env.is_production() {
            TracingConfig::production()
        } else {
            TracingConfig::development()
        };
        config.level = self.level.parse().unwrap_or(tracing::Level::INFO);
        config.json = self.json;
        config
    }
}

// Default value functions
fn default_app_name() -> String {
    "vote-engine".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_session_token_expiry() -> i64 {
    3600 // 1 hour
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    10
}

fn default_max_backoff_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_auth_ready_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Read an optional variable, rejecting values that fail to parse
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let redis = match env::var("REDIS_URL") {
            Ok(url) => Some(RedisConfig {
                url,
                max_connections: parse_var("REDIS_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_redis_max_connections),
            }),
            Err(_) => None,
        };

        let config = Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: parse_var("APP_ENV")?.unwrap_or_default(),
            },
            database: DatabaseConfig {
                url: require_var("DATABASE_URL")?,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_max_connections),
                min_connections: parse_var("DATABASE_MIN_CONNECTIONS")?
                    .unwrap_or_else(default_min_connections),
            },
            redis,
            jwt: JwtConfig {
                secret: require_var("JWT_SECRET")?,
                session_token_expiry: parse_var("JWT_SESSION_TOKEN_EXPIRY")?
                    .unwrap_or_else(default_session_token_expiry),
            },
            votes: VoteSettings {
                max_attempts: parse_var("VOTE_MAX_ATTEMPTS")?.unwrap_or_else(default_max_attempts),
                initial_backoff_ms: parse_var("VOTE_INITIAL_BACKOFF_MS")?
                    .unwrap_or_else(default_initial_backoff_ms),
                max_backoff_ms: parse_var("VOTE_MAX_BACKOFF_MS")?
                    .unwrap_or_else(default_max_backoff_ms),
                backoff_multiplier: parse_var("VOTE_BACKOFF_MULTIPLIER")?
                    .unwrap_or_else(default_backoff_multiplier),
                auth_ready_timeout_ms: parse_var("VOTE_AUTH_READY_TIMEOUT_MS")?
                    .unwrap_or_else(default_auth_ready_timeout_ms),
            },
            telemetry: TelemetrySettings {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
                json: parse_var("LOG_JSON")?.unwrap_or(false),
            },
        };

        config.votes.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, with `VOTE__SECTION__KEY` overrides
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a section is malformed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("VOTE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.votes.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
