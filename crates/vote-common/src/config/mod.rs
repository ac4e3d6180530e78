//! Configuration structs

mod app_config;
mod retry;

pub use app_config::{
    AppConfig, AppSettings, ConfigError, DatabaseConfig, Environment, JwtConfig, RedisConfig,
    TelemetrySettings, VoteSettings,
};
pub use retry::RetryPolicy;
