/// Configuration for the Corkboard backend.
/// Reads server.json from ~/.config/corkboard/server.json (or platform
/// equivalent); `CORKBOARD_CONFIG` points at another file.
use corkboard_core::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "CORKBOARD_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Request header carrying the authenticated user id, set by the
    /// fronting identity provider.
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    #[serde(flatten)]
    pub store: StoreConfig,
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_identity_header() -> String {
    "x-corkboard-user".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            identity_header: default_identity_header(),
            store: StoreConfig::default(),
        }
    }
}

/// `$CORKBOARD_CONFIG`, else ~/.config/corkboard/server.json
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("corkboard")
        .join("server.json")
}

/// Load config from path. Returns defaults if the file is missing or malformed.
pub fn load_config(path: &Path) -> ServerConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(target: "corkboard.config", "Failed to parse config {}: {}", path.display(), e);
            ServerConfig::default()
        }),
        Err(_) => {
            log::info!(target: "corkboard.config", "No config at {}, using defaults", path.display());
            ServerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/corkboard/server.json"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.identity_header, "x-corkboard-user");
        assert_eq!(config.store.pool_size, 8);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 9090, "pool_size": 2, "database_path": "/tmp/cb.db"}}"#).unwrap();
        let config = load_config(file.path());
        assert_eq!(config.port, 9090);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.store.pool_size, 2);
        assert_eq!(config.store.database_path, PathBuf::from("/tmp/cb.db"));
        assert_eq!(config.store.max_batch, 1000);
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert_eq!(load_config(file.path()).port, 8080);
    }
}
