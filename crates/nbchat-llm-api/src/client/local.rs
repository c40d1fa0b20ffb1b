use async_trait::async_trait;
use nbchat_logging::log_request;
use nbchat_models::{parse_body, GenerateRequest, GenerateResponse, TagsResponse};
use nbchat_types::ProviderKind;

use crate::client::{read_body, ProviderClient, NO_RESPONSE, UNEXPECTED_RESPONSE_FORMAT};
use crate::config::{normalize_base_url, Timeouts};
use crate::error::LlmError;

/// Client for the local inference daemon
pub struct LocalClient {
    base_url: String,
    client: reqwest::Client,
    timeouts: Timeouts,
    verbose: bool,
}

impl LocalClient {
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

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }
}

#[async_trait]
impl ProviderClient for LocalClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        _credential: Option<&str>,
    ) -> Result<String, LlmError> {
        let url = self.generate_url();
        let request = GenerateRequest::new(model, prompt);
        log_request("POST", &url, Some(&request), None, self.verbose);

        let body = read_body(
            ProviderKind::Local,
            &url,
            self.client.post(&url).json(&request),
            self.timeouts.local_query,
            self.verbose,
        )
        .await?;

        match parse_body::<GenerateResponse>(&body) {
            Ok(parsed) => Ok(parsed
                .answer()
                .filter(|answer| !answer.is_empty())
                .unwrap_or(NO_RESPONSE)
                .to_string()),
            Err(e) => {
                log::warn!("local generate returned an unexpected body: {}", e);
                Ok(UNEXPECTED_RESPONSE_FORMAT.to_string())
            }
        }
    }

    async fn list_models(&self, _credential: Option<&str>) -> Result<Vec<String>, LlmError> {
        let url = self.tags_url();
        log_request::<()>("GET", &url, None, None, self.verbose);

        let body = read_body(
            ProviderKind::Local,
            &url,
            self.client.get(&url),
            self.timeouts.catalog,
            self.verbose,
        )
        .await?;

        parse_body::<TagsResponse>(&body)
            .and_then(TagsResponse::model_names)
            .map_err(|source| LlmError::Shape { url, source })
    }
}
