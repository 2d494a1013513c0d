/// Client configuration.
/// Reads client.json from ~/.config/corkboard/client.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Id forwarded in `identity_header` on every request.
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    /// Durable copy of the cached board; `None` uses the platform cache dir.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_identity_header() -> String {
    "x-corkboard-user".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_id: String::new(),
            identity_header: default_identity_header(),
            cache_path: None,
        }
    }
}

impl ClientConfig {
    pub fn cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("corkboard")
                .join("board-cache.json")
        })
    }
}

/// Default config path: ~/.config/corkboard/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("corkboard")
        .join("client.json")
}

/// Load config from path. Returns defaults if the file is missing or malformed.
pub fn load_config(path: &Path) -> ClientConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(target: "corkboard.client.config", "Failed to parse config {}: {}", path.display(), e);
            ClientConfig::default()
        }),
        Err(_) => {
            log::info!(target: "corkboard.client.config", "No config at {}, using defaults", path.display());
            ClientConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"user_id": "alice", "cache_path": "/tmp/cb-cache.json"}}"#).unwrap();
        let config = load_config(file.path());
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/cb-cache.json"));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/corkboard/client.json"));
        assert!(config.user_id.is_empty());
        assert!(config.cache_path().ends_with("board-cache.json"));
    }
}
