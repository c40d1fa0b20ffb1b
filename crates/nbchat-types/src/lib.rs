//! Core types and structures for nbchat
//!
//! This crate provides the foundational types shared by every nbchat crate:
//! conversation sessions, chat messages and the provider configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Title given to a session before its first user message arrives
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Number of characters of the first user message kept in a session title
pub const TITLE_MAX_CHARS: usize = 30;

/// Suffix appended to titles cut at `TITLE_MAX_CHARS`
pub const TITLE_ELLIPSIS: &str = "…";

/// Model used until the user picks one
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Remote server used until the user configures one
pub const DEFAULT_REMOTE_API_URL: &str = "http://localhost:3000";

pub type SessionId = Uuid;

// ============================================================================
// Message Types
// ============================================================================

/// A single chat transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    pub is_user: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
        }
    }

    pub fn role(&self) -> &'static str {
        if self.is_user {
            "user"
        } else {
            "assistant"
        }
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// One persisted conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// True until a user message has been appended
    pub fn awaiting_first_user_message(&self) -> bool {
        !self.messages.iter().any(|m| m.is_user)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            title: self.title.clone(),
            message_count: self.messages.len(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight session view used for list rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub message_count: usize,
}

/// Derive a session title from the first user message.
///
/// Keeps the first `TITLE_MAX_CHARS` characters and appends `TITLE_ELLIPSIS`
/// when the message was longer than that.
pub fn derive_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}{}", head, TITLE_ELLIPSIS)
    } else {
        text.to_string()
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Backend that answers prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Inference daemon on the loopback interface
    Local,
    /// Authenticated OpenAI-style server
    Remote,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    pub fn requires_credential(&self) -> bool {
        matches!(self, Self::Remote)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported provider '{0}' (expected 'local' or 'remote')")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "ollama" => Ok(Self::Local),
            "remote" | "openwebui" | "open-webui" => Ok(Self::Remote),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Process-wide provider selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default = "default_remote_api_url")]
    pub remote_api_url: String,
}

fn default_remote_api_url() -> String {
    DEFAULT_REMOTE_API_URL.to_string()
}

impl ProviderConfig {
    /// Apply a user edit. A missing or blank model or URL keeps the current value.
    pub fn updated(&self, provider: ProviderKind, model: Option<&str>, url: Option<&str>) -> Self {
        let keep_or = |value: Option<&str>, current: &str| match value.map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => current.to_string(),
        };
        Self {
            provider,
            model: keep_or(model, &self.model),
            remote_api_url: keep_or(url, &self.remote_api_url),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Local,
            model: DEFAULT_MODEL.to_string(),
            remote_api_url: default_remote_api_url(),
        }
    }
}
