use nbchat_types::ProviderConfig;

use crate::storage::{read_value, write_value, StateStore, StorageError};

pub const PROVIDER_CONFIG_KEY: &str = "nbchat.providerConfig";

/// Persisted provider configuration, or the defaults when none is stored or
/// the stored value is unreadable
pub fn load_provider_config(store: &dyn StateStore) -> ProviderConfig {
    match read_value::<ProviderConfig>(store, PROVIDER_CONFIG_KEY) {
        Ok(Some(config)) => config,
        Ok(None) => ProviderConfig::default(),
        Err(e) => {
            log::warn!("ignoring stored provider config: {}", e);
            ProviderConfig::default()
        }
    }
}

pub fn save_provider_config(
    store: &mut dyn StateStore,
    config: &ProviderConfig,
) -> Result<(), StorageError> {
    write_value(store, PROVIDER_CONFIG_KEY, config)
}
