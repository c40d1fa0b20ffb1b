use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::{write_atomic, StorageError};

/// Vault key holding the remote provider's API key
pub const REMOTE_API_KEY_SECRET: &str = "nbchat.remoteApiKey";

/// Secret vault addressed by key name only
pub trait SecretStore: Send {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&mut self, name: &str) -> Result<(), StorageError>;
}

/// Secrets in a JSON file only the owner can read
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    secrets: BTreeMap<String, String>,
}

impl FileSecretStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let secrets = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        Ok(Self { path, secrets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, secrets: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(secrets).map_err(|source| {
            StorageError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        write_atomic(&self.path, json.as_bytes(), true)
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, name: &str) -> Option<String> {
        self.secrets.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), StorageError> {
        let mut candidate = self.secrets.clone();
        candidate.insert(name.to_string(), value.to_string());
        self.flush(&candidate)?;
        self.secrets = candidate;
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        let mut candidate = self.secrets.clone();
        if candidate.remove(name).is_some() {
            self.flush(&candidate)?;
            self.secrets = candidate;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemorySecretStore {
    secrets: BTreeMap<String, String>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, name: &str) -> Option<String> {
        self.secrets.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), StorageError> {
        self.secrets.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        self.secrets.remove(name);
        Ok(())
    }
}
