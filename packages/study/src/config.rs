use std::path::PathBuf;

use crate::catalog::{PartitionKey, StudyMode};
use crate::storage::StoreBackend;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,
    pub store_path: PathBuf,
    pub store_backend: StoreBackend,
    pub seed: Option<u64>,
    pub default_level: String,
    pub default_mode: StudyMode,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset or unparsable values fall back
    /// to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_path = lookup("HSK_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("assets/data.json"));

        let store_backend = lookup("HSK_STORE_BACKEND")
            .and_then(|value| value.parse::<StoreBackend>().ok())
            .unwrap_or(StoreBackend::Json);

        let store_path = lookup("HSK_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_store_path(store_backend));

        let seed = lookup("HSK_SEED").and_then(|value| value.parse::<u64>().ok());

        let default_level = lookup("HSK_DEFAULT_LEVEL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "HSK1".to_string());

        let default_mode = lookup("HSK_DEFAULT_MODE")
            .and_then(|value| value.parse::<StudyMode>().ok())
            .unwrap_or(StudyMode::Text);

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "warn".to_string());

        Self {
            data_path,
            store_path,
            store_backend,
            seed,
            default_level,
            default_mode,
            log_level,
        }
    }

    /// Switch backend; a store path that was still the default follows it
    pub fn set_backend(&mut self, backend: StoreBackend) {
        if self.store_path == default_store_path(self.store_backend) {
            self.store_path = default_store_path(backend);
        }
        self.store_backend = backend;
    }

    pub fn default_partition(&self) -> PartitionKey {
        PartitionKey::new(self.default_level.clone(), self.default_mode)
    }
}

fn default_store_path(backend: StoreBackend) -> PathBuf {
    let file = match backend {
        StoreBackend::Sqlite => "weights.db",
        StoreBackend::Json | StoreBackend::Memory => "weights.json",
    };
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hsk-drill")
        .join(file)
}
