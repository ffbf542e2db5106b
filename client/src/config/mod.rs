use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use utilities::{error::GfsError, retry_policy::RetryPolicy};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub id: String,
    pub master_addrs: String,
    // -1 retries forever
    pub retry_attempts: i64,
    pub retry_delay_secs: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_response_bytes: usize,
    pub output_path: String,
    pub log_level: String,
    pub log_base: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            id: "client_0".to_string(),
            master_addrs: "127.0.0.1:5000".to_string(),
            retry_attempts: 5,
            retry_delay_secs: 3,
            connect_timeout_secs: 5,
            read_timeout_secs: 10,
            max_response_bytes: 64 * 1024 * 1024,
            output_path: "temp_output_file.txt".to_string(),
            log_level: "info".to_string(),
            log_base: "./temp/logs".to_string(),
        }
    }
}

pub static CONFIG: Lazy<Result<Config, GfsError>> = Lazy::new(Config::load);

impl Config {
    pub fn load() -> Result<Self, GfsError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
        // giving default path relative to the workspace root
        let config_file_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| format!("./client/config/{}.yaml", env));
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_file_path))
            .merge(Env::prefixed("GFS_CLIENT_"))
            .extract()
            .map_err(|e| GfsError::Config(e.to_string()))
    }
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_attempts(
            self.retry_attempts,
            Duration::from_secs(self.retry_delay_secs),
        )
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
    /// Bound on a whole request/response exchange once connected.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
