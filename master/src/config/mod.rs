use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use utilities::error::GfsError;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub id: String,
    pub listen_addrs: String,
    pub files_metadata_path: String,
    pub servers_path: String,
    pub health_check_interval_secs: u64,
    pub probe_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_request_bytes: usize,
    pub log_level: String,
    pub log_base: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            id: "master_0".to_string(),
            listen_addrs: "127.0.0.1:5000".to_string(),
            files_metadata_path: "./metadata/files_metadata.json".to_string(),
            servers_path: "./metadata/servers.json".to_string(),
            health_check_interval_secs: 10,
            probe_timeout_ms: 2000,
            request_timeout_ms: 5000,
            max_request_bytes: 64 * 1024,
            log_level: "info".to_string(),
            log_base: "./temp/logs".to_string(),
        }
    }
}

pub static CONFIG: Lazy<Result<Config, GfsError>> = Lazy::new(Config::load);

impl Config {
    /// Defaults, then `./master/config/{ENV}.yaml` (or `CONFIG_PATH`), then
    /// `GFS_MASTER_*` environment variables.
    pub fn load() -> Result<Self, GfsError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
        let config_file_path = std::env::var("CONFIG_PATH")
            .unwrap_or_else(|_| format!("./master/config/{}.yaml", env));
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Yaml::file(config_file_path))
                .merge(Env::prefixed("GFS_MASTER_")),
        )
    }
    fn from_figment(figment: Figment) -> Result<Self, GfsError> {
        let config: Config = figment
            .extract()
            .map_err(|e| GfsError::Config(e.to_string()))?;
        if config.health_check_interval_secs == 0 {
            return Err(GfsError::Config(
                "health_check_interval_secs must be positive".to_owned(),
            ));
        }
        Ok(config)
    }
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
