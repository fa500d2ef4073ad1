// src/storage.rs
//! Small JSON documents kept in the data directory, one file per key.
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error accessing local storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize local storage data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Reads `key`, falling back to `default` when the document is missing,
    /// unreadable or not valid JSON for `T`.
    pub fn load_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored '{}' at {}", key, path.display());
                return default;
            }
            Err(e) => {
                warn!("Could not read stored '{}' ({}); starting fresh", key, e);
                return default;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("Stored '{}' is corrupt ({}); starting fresh", key, e);
                default
            }
        }
    }

    /// Like [`load_or`](Self::load_or) but tells the caller whether a stored value was used.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let content = fs::read_to_string(self.path_for(key)).ok()?;
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Stored '{}' is corrupt ({})", key, e);
                None
            }
        }
    }

    /// Rewrites the whole document for `key`.
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        let content = serde_json::to_string_pretty(value)?;
        fs::write(self.path_for(key), content)?;
        Ok(())
    }
}
