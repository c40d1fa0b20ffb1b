use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// A provider answered with JSON that does not have the expected shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("response is not valid JSON for this endpoint: {0}")]
    Malformed(String),
    #[error("response has no '{0}' field")]
    MissingField(&'static str),
    #[error("response contains an empty '{0}' list")]
    Empty(&'static str),
}

/// Deserialize a response body, reporting any mismatch as a `ShapeError`
pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ShapeError> {
    serde_json::from_str(body).map_err(|e| ShapeError::Malformed(e.to_string()))
}

/// Pull a human-readable error detail out of an error response body.
///
/// Servers disagree on where they put the message, so the usual spots are
/// tried in order before falling back to the raw body.
pub fn error_detail(body: &str) -> String {
    let trimmed = body.trim();
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return trimmed.to_string();
    };

    let candidates = [
        value.pointer("/error/message"),
        value.get("error"),
        value.get("detail"),
        value.get("message"),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Some(text) = candidate.as_str() {
            return text.to_string();
        }
    }

    trimmed.to_string()
}

// ============================================================================
// Local Inference Daemon
// ============================================================================

/// Response of `POST /api/generate`
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: Option<String>,
}

impl GenerateResponse {
    pub fn answer(&self) -> Option<&str> {
        self.response.as_deref()
    }
}

/// Response of `GET /api/tags`
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Option<Vec<TagEntry>>,
}

/// One installed model in a tags listing
#[derive(Debug, Deserialize)]
pub struct TagEntry {
    #[serde(default)]
    pub name: Option<String>,
}

impl TagsResponse {
    /// Names of the installed models, skipping nameless entries
    pub fn model_names(self) -> Result<Vec<String>, ShapeError> {
        let models = self.models.ok_or(ShapeError::MissingField("models"))?;
        Ok(models.into_iter().filter_map(|m| m.name).collect())
    }
}

// ============================================================================
// Remote Chat Server
// ============================================================================

/// Token usage information from API response
#[derive(Debug, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: usize,
    #[serde(default)]
    pub completion_tokens: usize,
    #[serde(default)]
    pub total_tokens: usize,
}

/// Response of `POST /api/chat/completions`
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Choice structure within chat response
#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

/// Message structure within a choice
#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Content of the first choice's message
    pub fn first_content(&self) -> Result<&str, ShapeError> {
        let choices = self
            .choices
            .as_ref()
            .ok_or(ShapeError::MissingField("choices"))?;
        let first = choices.first().ok_or(ShapeError::Empty("choices"))?;
        let message = first
            .message
            .as_ref()
            .ok_or(ShapeError::MissingField("message"))?;
        message
            .content
            .as_deref()
            .ok_or(ShapeError::MissingField("content"))
    }
}

/// Response of `GET /api/models`
#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub data: Option<Vec<ModelEntry>>,
}

/// One id-bearing record in a model listing
#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    #[serde(default)]
    pub id: Option<String>,
}

impl ModelsResponse {
    /// Identifiers of the listed models, skipping records without an id
    pub fn model_ids(self) -> Result<Vec<String>, ShapeError> {
        let data = self.data.ok_or(ShapeError::MissingField("data"))?;
        Ok(data.into_iter().filter_map(|m| m.id).collect())
    }
}
