//! 键值持久化模块
//!
//! 权重表和学习偏好都以字符串形式存放在一个简单的键值存储中：
//! - `MemoryStore` - 进程内存储（测试注入用）
//! - `JsonFileStore` - 单个 JSON 文件（默认后端）
//! - `SqliteStore` - SQLite `kv_store` 表

// ============================================================
// 子模块声明
// ============================================================

pub mod json_file;
pub mod migrations;
pub mod sqlite;

// ============================================================
// 重新导出主要类型
// ============================================================

pub use json_file::JsonFileStore;
pub use migrations::run_migrations;
pub use sqlite::SqliteStore;

// ============================================================
// 依赖导入
// ============================================================

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use thiserror::Error;

// ============================================================
// 错误类型定义
// ============================================================

/// 存储模块错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("lock poisoned: {0}")]
    LockError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================
// KeyValueStore
// ============================================================

/// Persistence provider contract.
///
/// Missing keys are not errors (`Ok(None)`); writes are whole-value,
/// last-write-wins.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Returns true if a value was removed
    fn remove(&self, key: &str) -> StorageResult<bool>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        (**self).remove(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        (**self).remove(key)
    }
}

// ============================================================
// MemoryStore
// ============================================================

/// In-process store; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }
}

// ============================================================
// Backend selection
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Json,
    Sqlite,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Json => "json",
            StoreBackend::Sqlite => "sqlite",
            StoreBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" | "file" => Ok(StoreBackend::Json),
            "sqlite" | "db" => Ok(StoreBackend::Sqlite),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend `{other}` (expected json, sqlite or memory)")),
        }
    }
}

/// Open the configured backend at `path` (ignored for `Memory`)
pub fn open_store(backend: StoreBackend, path: &Path) -> StorageResult<Box<dyn KeyValueStore>> {
    tracing::debug!(backend = %backend, path = %path.display(), "opening store");
    let store: Box<dyn KeyValueStore> = match backend {
        StoreBackend::Json => Box::new(JsonFileStore::open(path)?),
        StoreBackend::Sqlite => Box::new(SqliteStore::open(path)?),
        StoreBackend::Memory => Box::new(MemoryStore::new()),
    };
    Ok(store)
}
