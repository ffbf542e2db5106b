use std::{path::PathBuf, time::Duration};

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
    // every id listed here is served by this process on its registered port
    pub server_ids: Vec<String>,
    pub storage_root: String,
    pub files_metadata_path: String,
    pub servers_path: String,
    pub replication_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_request_bytes: usize,
    pub log_level: String,
    pub log_base: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            id: "chunkserver_0".to_string(),
            server_ids: vec![],
            storage_root: "./temp/storage".to_string(),
            files_metadata_path: "./metadata/files_metadata.json".to_string(),
            servers_path: "./metadata/servers.json".to_string(),
            replication_timeout_ms: 5000,
            request_timeout_ms: 5000,
            max_request_bytes: 64 * 1024 * 1024,
            log_level: "info".to_string(),
            log_base: "./temp/logs".to_string(),
        }
    }
}

pub static CONFIG: Lazy<Result<Config, GfsError>> = Lazy::new(Config::load);

impl Config {
    pub fn load() -> Result<Self, GfsError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
        let config_file_path = std::env::var("CONFIG_PATH")
            .unwrap_or_else(|_| format!("./chunkserver/config/{}.yaml", env));
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Yaml::file(config_file_path))
                .merge(Env::prefixed("GFS_CHUNKSERVER_")),
        )
    }
    fn from_figment(figment: Figment) -> Result<Self, GfsError> {
        let config: Config = figment
            .extract()
            .map_err(|e| GfsError::Config(e.to_string()))?;
        if config.server_ids.is_empty() {
            return Err(GfsError::Config("server_ids can't be empty".to_owned()));
        }
        Ok(config)
    }
    /// `<storage_root>/<server_id>_files`
    pub fn storage_dir(&self, server_id: &str) -> PathBuf {
        PathBuf::from(&self.storage_root).join(format!("{server_id}_files"))
    }
    pub fn replication_timeout(&self) -> Duration {
        Duration::from_millis(self.replication_timeout_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_dir_is_per_server() {
        let config = Config::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Yaml::string(
                    "server_ids: [server1, server2]\nstorage_root: /data\n",
                )),
        )
        .unwrap();
        assert_eq!(config.storage_dir("server2"), PathBuf::from("/data/server2_files"));
        assert_eq!(config.max_request_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn needs_at_least_one_server() {
        let config =
            Config::from_figment(Figment::new().merge(Serialized::defaults(Config::default())));
        assert!(matches!(config, Err(GfsError::Config(_))));
    }
}
