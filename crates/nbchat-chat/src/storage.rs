use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("value under `{key}` could not be converted: {source}")]
    Value {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One key update; `None` removes the key
pub type Change = (String, Option<Value>);

/// Key-value state that survives restarts.
///
/// Writes are all-or-nothing: when persisting fails, `get` keeps returning
/// what it returned before the call.
pub trait StateStore: Send {
    fn get(&self, key: &str) -> Option<&Value>;

    /// Apply every change and persist them together
    fn apply(&mut self, changes: Vec<Change>) -> Result<(), StorageError>;

    /// Store `value` under `key`, persisting immediately
    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        self.apply(vec![(key.to_string(), Some(value))])
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.apply(vec![(key.to_string(), None)])
    }
}

fn with_changes(entries: &BTreeMap<String, Value>, changes: Vec<Change>) -> BTreeMap<String, Value> {
    let mut candidate = entries.clone();
    for (key, value) in changes {
        match value {
            Some(value) => {
                candidate.insert(key, value);
            }
            None => {
                candidate.remove(&key);
            }
        }
    }
    candidate
}

/// Read and deserialize the value under `key`
pub fn read_value<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    store
        .get(key)
        .map(|value| {
            serde_json::from_value(value.clone()).map_err(|source| StorageError::Value {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
}

/// Serialize `value` and store it under `key`
pub fn write_value<T: Serialize + ?Sized>(
    store: &mut dyn StateStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let value = encode_value(key, value)?;
    store.set(key, value)
}

pub(crate) fn encode_value<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value).map_err(|source| StorageError::Value {
        key: key.to_string(),
        source,
    })
}

/// State kept in a single JSON object on disk; every write rewrites the file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries).map_err(|source| {
            StorageError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        write_atomic(&self.path, json.as_bytes(), false)
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    fn apply(&mut self, changes: Vec<Change>) -> Result<(), StorageError> {
        let candidate = with_changes(&self.entries, changes);
        if candidate == self.entries {
            return Ok(());
        }
        self.flush(&candidate)?;
        self.entries = candidate;
        Ok(())
    }
}

/// Volatile state, for tests and one-shot commands
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    fn apply(&mut self, changes: Vec<Change>) -> Result<(), StorageError> {
        self.entries = with_changes(&self.entries, changes);
        Ok(())
    }
}

/// Write `bytes` to `path` through a temp file and a rename.
///
/// With `private` set the file is created readable by the owner only (Unix).
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], private: bool) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut tmp_file = File::create(&tmp_path).map_err(io_err)?;
    if private {
        restrict_permissions(&tmp_file).map_err(io_err)?;
    }
    tmp_file.write_all(bytes).map_err(io_err)?;
    tmp_file.sync_all().map_err(io_err)?;
    drop(tmp_file);

    fs::rename(&tmp_path, path).map_err(io_err)
}

#[cfg(unix)]
fn restrict_permissions(file: &File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &File) -> std::io::Result<()> {
    Ok(())
}
