use serde::{Deserialize, Serialize};

/// Sampling temperature sent to both providers
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Context window requested from the local daemon
pub const LOCAL_CONTEXT_WINDOW: u32 = 4096;

/// Completion budget requested from the remote server
pub const REMOTE_MAX_TOKENS: u32 = 2000;

// ============================================================================
// Local Inference Daemon
// ============================================================================

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

/// Sampling options within a generate request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub temperature: f64,
    pub num_ctx: u32,
}

impl GenerateRequest {
    /// Non-streaming request with the default sampling options
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            options: GenerateOptions {
                temperature: DEFAULT_TEMPERATURE,
                num_ctx: LOCAL_CONTEXT_WINDOW,
            },
        }
    }
}

// ============================================================================
// Remote Chat Server
// ============================================================================

/// Chat message structure (OpenAI-compatible format)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of `POST /api/chat/completions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Single-turn request carrying one user message
    pub fn single_user(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: content.into(),
            }],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: REMOTE_MAX_TOKENS,
        }
    }
}
