//! Session persistence: the conversation store, the key-value state file it
//! writes through, the secret vault, and persisted provider settings.

pub mod secrets;
pub mod settings;
pub mod storage;
pub mod store;

pub use secrets::{FileSecretStore, MemorySecretStore, SecretStore, REMOTE_API_KEY_SECRET};
pub use settings::{load_provider_config, save_provider_config, PROVIDER_CONFIG_KEY};
pub use storage::{Change, JsonFileStore, MemoryStore, StateStore, StorageError};
pub use store::{SessionStore, StoreError, CURRENT_SESSION_KEY, SESSIONS_KEY};
