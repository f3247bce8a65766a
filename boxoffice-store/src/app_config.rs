use serde::Deserialize;
use std::env;
use std::time::Duration;

use boxoffice_core::ReservationSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub reservation: ReservationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub mode: StorageMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ReservationConfig {
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
    #[serde(default = "default_lock_ttl_ms")]
    pub lock_ttl_ms: u64,
    #[serde(default = "default_lock_retries")]
    pub lock_retries: u32,
    #[serde(default = "default_lock_backoff_ms")]
    pub lock_backoff_ms: u64,
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,
    #[serde(default = "default_sweeper_interval")]
    pub sweeper_interval_seconds: u64,
}

fn default_hold_seconds() -> u64 { 300 }
fn default_lock_ttl_ms() -> u64 { 10_000 }
fn default_lock_retries() -> u32 { 3 }
fn default_lock_backoff_ms() -> u64 { 100 }
fn default_reaper_interval() -> u64 { 30 }
fn default_sweeper_interval() -> u64 { 60 }

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            lock_ttl_ms: default_lock_ttl_ms(),
            lock_retries: default_lock_retries(),
            lock_backoff_ms: default_lock_backoff_ms(),
            reaper_interval_seconds: default_reaper_interval(),
            sweeper_interval_seconds: default_sweeper_interval(),
        }
    }
}

impl ReservationConfig {
    pub fn settings(&self) -> ReservationSettings {
        ReservationSettings {
            hold_duration: Duration::from_secs(self.hold_seconds),
            lock_ttl: Duration::from_millis(self.lock_ttl_ms),
            // zero attempts would make every hold a lock conflict
            lock_retries: self.lock_retries.max(1),
            lock_backoff: Duration::from_millis(self.lock_backoff_ms),
            reaper_interval: Duration::from_secs(self.reaper_interval_seconds.max(1)),
            sweeper_interval: Duration::from_secs(self.sweeper_interval_seconds.max(1)),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Profile overrides, e.g. config/test.toml shortens the hold
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `BOXOFFICE__RESERVATION__HOLD_SECONDS=10`
            .add_source(config::Environment::with_prefix("BOXOFFICE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
