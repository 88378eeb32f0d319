use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PolisError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.polis-labs.org/v1";

/// Which association store backend this session talks to. Chosen once at
/// construction from config, never per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Remote,
    Local,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub backend: Option<StoreBackend>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub staleness_minutes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub backend: StoreBackend,
    pub api_base_url: String,
    pub user_id: String,
    pub staleness: Duration,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PolisError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("polis-rm.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(PolisError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PolisError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PolisError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PolisError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let backend = config.backend.unwrap_or(StoreBackend::Remote);
        let api_base_url = config
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let user_id = config.user_id.unwrap_or_else(|| "anonymous".to_string());
        let staleness = Duration::from_secs(config.staleness_minutes.unwrap_or(5) * 60);

        Ok(ResolvedConfig {
            schema_version,
            backend,
            api_base_url,
            user_id,
            staleness,
        })
    }
}
