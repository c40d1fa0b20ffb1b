use std::time::Duration;

use async_trait::async_trait;
use nbchat_logging::log_response;
use nbchat_models::error_detail;
use nbchat_types::ProviderKind;

use crate::error::LlmError;

pub mod local;
pub mod remote;

/// Answer substituted when the local daemon replies without a `response` field
pub const NO_RESPONSE: &str = "No response from model";

/// Answer substituted when a reply does not have the documented shape
pub const UNEXPECTED_RESPONSE_FORMAT: &str = "Unexpected response format from API";

/// Provider client trait - unified interface for the local and remote backends
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Send a fully built prompt to `model` and return its answer as plain text
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, LlmError>;

    /// Identifiers of the models this provider can serve
    async fn list_models(&self, credential: Option<&str>) -> Result<Vec<String>, LlmError>;
}

/// Treat empty or whitespace-only keys as absent
pub(crate) fn usable_credential(credential: Option<&str>) -> Option<&str> {
    credential.map(str::trim).filter(|k| !k.is_empty())
}

/// Send a request and read the whole body, mapping non-2xx statuses to `LlmError::Http`
pub(crate) async fn read_body(
    provider: ProviderKind,
    url: &str,
    request: reqwest::RequestBuilder,
    timeout: Duration,
    verbose: bool,
) -> Result<String, LlmError> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| LlmError::from_reqwest(url, timeout, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| LlmError::from_reqwest(url, timeout, e))?;
    log_response(status, &body, verbose);

    if !status.is_success() {
        return Err(LlmError::Http {
            provider,
            status: status.as_u16(),
            detail: error_detail(&body),
        });
    }

    Ok(body)
}
