use async_trait::async_trait;
use nbchat_logging::log_request;
use nbchat_models::{parse_body, ChatRequest, ChatResponse, ModelsResponse};
use nbchat_types::ProviderKind;

use crate::client::{read_body, usable_credential, ProviderClient, UNEXPECTED_RESPONSE_FORMAT};
use crate::config::{normalize_base_url, Timeouts};
use crate::error::LlmError;

/// Client for an authenticated OpenAI-style chat server
pub struct RemoteClient {
    base_url: String,
    client: reqwest::Client,
    timeouts: Timeouts,
    verbose: bool,
}

impl RemoteClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url, Timeouts::default(), false)
    }

    pub fn with_http_client(
        client: reqwest::Client,
        base_url: &str,
        timeouts: Timeouts,
        verbose: bool,
    ) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client,
            timeouts,
            verbose,
        }
    }

    fn endpoint(&self, path: &str) -> Result<String, LlmError> {
        if self.base_url.is_empty() {
            return Err(LlmError::InvalidConfig(
                "remote API URL is empty; set it with `nbchat config --url <URL>`".to_string(),
            ));
        }
        Ok(format!("{}{}", self.base_url, path))
    }
}

#[async_trait]
impl ProviderClient for RemoteClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Remote
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, LlmError> {
        // Checked before anything touches the network
        let api_key = usable_credential(credential).ok_or(LlmError::MissingCredential)?;
        let url = self.endpoint("/api/chat/completions")?;

        let request = ChatRequest::single_user(model, prompt);
        log_request("POST", &url, Some(&request), Some(api_key), self.verbose);

        let body = read_body(
            ProviderKind::Remote,
            &url,
            self.client.post(&url).bearer_auth(api_key).json(&request),
            self.timeouts.remote_query,
            self.verbose,
        )
        .await?;

        let content = parse_body::<ChatResponse>(&body).and_then(|parsed| {
            if let Some(usage) = &parsed.usage {
                log::debug!(
                    "{} used {} prompt + {} completion = {} tokens",
                    model,
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens
                );
            }
            parsed.first_content().map(str::to_string)
        });
        match content {
            Ok(answer) => Ok(answer),
            Err(e) => {
                log::warn!("remote chat completion had an unexpected shape: {}", e);
                Ok(UNEXPECTED_RESPONSE_FORMAT.to_string())
            }
        }
    }

    async fn list_models(&self, credential: Option<&str>) -> Result<Vec<String>, LlmError> {
        let api_key = usable_credential(credential).ok_or(LlmError::MissingCredential)?;
        let url = self.endpoint("/api/models")?;
        log_request::<()>("GET", &url, None, Some(api_key), self.verbose);

        let body = read_body(
            ProviderKind::Remote,
            &url,
            self.client.get(&url).bearer_auth(api_key),
            self.timeouts.catalog,
            self.verbose,
        )
        .await?;

        parse_body::<ModelsResponse>(&body)
            .and_then(ModelsResponse::model_ids)
            .map_err(|source| LlmError::Shape { url, source })
    }
}
