use serde::{Deserialize, Serialize};

use nbchat_types::{Message, ProviderKind, SessionId, SessionSummary};

/// Identifies one submitted question for the lifetime of a controller
pub type QueryId = u64;

/// Messages sent from the UI to the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    // Chat interaction
    Submit { text: String },
    GetContext,

    // Session management
    GetSessions,
    SwitchSession { session_id: SessionId },
    CreateSession,
    DeleteSession { session_id: SessionId },
    ClearSession {
        /// Defaults to the current session
        #[serde(default)]
        session_id: Option<SessionId>,
        #[serde(default)]
        reset_title: bool,
    },

    // Provider configuration
    GetConfig,
    /// `provider` stays a string so unknown names reach the controller and
    /// come back as a readable error
    UpdateConfig {
        provider: String,
        model: String,
        url: String,
    },
    SetCredential { api_key: String },
    RefreshModels,
}

/// Messages pushed from the controller to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    ContextUpdate {
        context: String,
    },
    UpdateSessions {
        sessions: Vec<SessionSummary>,
        current_session_id: Option<SessionId>,
    },
    UpdateHistory {
        history: Vec<Message>,
    },
    UpdateModels {
        models: Vec<String>,
    },
    ConfigUpdate {
        provider: ProviderKind,
        model: String,
        url: String,
        has_credential: bool,
    },
    QueryStarted {
        session_id: SessionId,
        query_id: QueryId,
    },
    /// Pushed after the answer has been recorded in its session
    QueryAnswered {
        session_id: SessionId,
        query_id: QueryId,
        answer: String,
    },
    QueryFailed {
        session_id: SessionId,
        query_id: QueryId,
        error: String,
    },
    Notice {
        message: String,
    },
    Error {
        message: String,
    },
}
