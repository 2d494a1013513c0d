/// Store configuration shared by the backend and by embedders of the core.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Upper bound on open SQLite connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// How long a request waits for a free connection before failing.
    #[serde(default = "default_pool_timeout_ms")]
    pub pool_timeout_ms: u64,
    /// Largest reorder batch accepted in one call.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("corkboard.db")
}

fn default_pool_size() -> usize {
    8
}

fn default_pool_timeout_ms() -> u64 {
    5_000
}

fn default_max_batch() -> usize {
    1_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            pool_size: default_pool_size(),
            pool_timeout_ms: default_pool_timeout_ms(),
            max_batch: default_max_batch(),
        }
    }
}

impl StoreConfig {
    pub fn at(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size.max(1)
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }
}
