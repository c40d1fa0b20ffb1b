use std::time::Duration;

use nbchat_models::ShapeError;
use nbchat_types::{ProviderKind, UnknownProvider};

/// Failures surfaced by the provider clients.
///
/// Configuration variants carry a remediation hint in their message;
/// transport and HTTP variants describe what the endpoint did.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error(
        "No API key is stored for the remote provider. \
         Set one with `nbchat key set <KEY>` or the setCredential command."
    )]
    MissingCredential,

    #[error("{0}. Switch with `nbchat config --provider local|remote`.")]
    UnsupportedProvider(#[from] UnknownProvider),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Request to {url} timed out after {}s", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    #[error("Could not reach {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("{provider} provider returned HTTP {status}: {detail}")]
    Http {
        provider: ProviderKind,
        status: u16,
        detail: String,
    },

    #[error("Unexpected response from {url}: {source}")]
    Shape {
        url: String,
        #[source]
        source: ShapeError,
    },
}

impl LlmError {
    /// Wrap a reqwest failure, keeping timeouts distinguishable
    pub(crate) fn from_reqwest(url: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Errors the user fixes by changing settings rather than retrying
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential | Self::UnsupportedProvider(_) | Self::InvalidConfig(_)
        )
    }

    /// Errors caused by the network or the endpoint not answering in time
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }
}
