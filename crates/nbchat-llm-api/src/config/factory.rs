use std::sync::Arc;

use nbchat_types::ProviderKind;

use crate::client::{local::LocalClient, remote::RemoteClient, ProviderClient};
use crate::config::{normalize_base_url, Timeouts, LOCAL_BASE_URL};

/// Client factory for creating provider clients
///
/// Holds one shared `reqwest::Client` so connection pools survive across
/// queries, plus the local endpoint and timeouts every client is built with.
#[derive(Clone)]
pub struct ClientFactory {
    http: reqwest::Client,
    local_base_url: String,
    timeouts: Timeouts,
    verbose: bool,
}

impl ClientFactory {
    pub fn new(local_base_url: impl AsRef<str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            local_base_url: normalize_base_url(local_base_url.as_ref()),
            timeouts: Timeouts::default(),
            verbose: false,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Print request/response dumps for every call
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn local_base_url(&self) -> &str {
        &self.local_base_url
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Create a client for `provider`
    ///
    /// # Arguments
    /// * `provider` - Which backend to talk to
    /// * `remote_api_url` - Base URL of the remote server (ignored for the local provider)
    ///
    /// # Returns
    /// Arc-wrapped client implementing the ProviderClient trait
    pub fn create(&self, provider: ProviderKind, remote_api_url: &str) -> Arc<dyn ProviderClient> {
        match provider {
            ProviderKind::Local => Arc::new(LocalClient::with_http_client(
                self.http.clone(),
                &self.local_base_url,
                self.timeouts,
                self.verbose,
            )),
            ProviderKind::Remote => Arc::new(RemoteClient::with_http_client(
                self.http.clone(),
                remote_api_url,
                self.timeouts,
                self.verbose,
            )),
        }
    }
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new(LOCAL_BASE_URL)
    }
}
