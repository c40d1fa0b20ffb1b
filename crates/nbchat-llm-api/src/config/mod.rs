use std::time::Duration;

use nbchat_types::{ProviderKind, DEFAULT_REMOTE_API_URL};

pub mod factory;
pub use factory::ClientFactory;

/// Local inference daemon. One port above the daemon's stock 11434 so a
/// separately managed instance keeps its default port.
pub const LOCAL_BASE_URL: &str = "http://127.0.0.1:11435";

/// Local generation runs on the user's hardware and may take minutes
pub const LOCAL_QUERY_TIMEOUT: Duration = Duration::from_secs(180);

/// Remote servers answer faster or not at all
pub const REMOTE_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Model listings are cheap; don't hold the UI up waiting for them
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request time limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub local_query: Duration,
    pub remote_query: Duration,
    pub catalog: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            local_query: LOCAL_QUERY_TIMEOUT,
            remote_query: REMOTE_QUERY_TIMEOUT,
            catalog: CATALOG_TIMEOUT,
        }
    }
}

impl Timeouts {
    /// Same limit for every request, mostly useful in tests
    pub fn uniform(limit: Duration) -> Self {
        Self {
            local_query: limit,
            remote_query: limit,
            catalog: limit,
        }
    }

    pub fn query_for(&self, provider: ProviderKind) -> Duration {
        match provider {
            ProviderKind::Local => self.local_query,
            ProviderKind::Remote => self.remote_query,
        }
    }
}

/// Get the default base URL for a given provider
pub fn get_default_url_for_provider(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Local => LOCAL_BASE_URL,
        ProviderKind::Remote => DEFAULT_REMOTE_API_URL,
    }
}

/// Normalize a base URL so endpoint paths can be appended with a single '/'
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
