use nbchat_types::{derive_title, Message, Session, SessionId, SessionSummary, DEFAULT_SESSION_TITLE};

use crate::storage::{encode_value, read_value, StateStore, StorageError};

/// Key holding the JSON array of session records
pub const SESSIONS_KEY: &str = "nbchat.sessions";

/// Key holding the id of the selected session
pub const CURRENT_SESSION_KEY: &str = "nbchat.currentSession";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Owns every conversation thread and the current selection.
///
/// All mutation goes through the methods below. Each one builds the new
/// state on a copy and adopts it only after storage accepted it, so a failed
/// write leaves memory and disk agreeing. The current id, when set, always
/// names a session in the list.
pub struct SessionStore {
    storage: Box<dyn StateStore>,
    sessions: Vec<Session>,
    current: Option<SessionId>,
}

impl SessionStore {
    /// Load persisted sessions, creating a first one when none exist
    pub fn load(storage: Box<dyn StateStore>) -> Result<Self, StoreError> {
        let sessions: Vec<Session> =
            read_value(storage.as_ref(), SESSIONS_KEY)?.unwrap_or_default();
        let saved_current: Option<SessionId> =
            match read_value(storage.as_ref(), CURRENT_SESSION_KEY) {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("ignoring stored current session: {}", e);
                    None
                }
            };

        let current = saved_current
            .filter(|id| sessions.iter().any(|s| s.id == *id))
            .or_else(|| sessions.first().map(|s| s.id));

        let mut store = Self {
            storage,
            sessions,
            current,
        };

        if store.sessions.is_empty() {
            log::debug!("no stored sessions, starting a new one");
            store.create_session()?;
        }

        Ok(store)
    }

    /// Start a new empty session at the top of the list and select it
    pub fn create_session(&mut self) -> Result<SessionId, StoreError> {
        let session = Session::new();
        let id = session.id;
        let mut sessions = self.sessions.clone();
        sessions.insert(0, session);
        self.commit(sessions, Some(id))?;
        Ok(id)
    }

    /// Remove a session; deleting the current one selects the first remaining
    pub fn delete_session(&mut self, id: SessionId) -> Result<(), StoreError> {
        let index = self.index_of(id)?;
        let mut sessions = self.sessions.clone();
        sessions.remove(index);
        let current = if self.current == Some(id) {
            sessions.first().map(|s| s.id)
        } else {
            self.current
        };
        self.commit(sessions, current)
    }

    /// Drop every message of a session, optionally restoring the default title
    pub fn clear_session(&mut self, id: SessionId, reset_title: bool) -> Result<(), StoreError> {
        let index = self.index_of(id)?;
        let mut sessions = self.sessions.clone();
        let session = &mut sessions[index];
        session.messages.clear();
        if reset_title {
            session.title = DEFAULT_SESSION_TITLE.to_string();
        }
        self.commit(sessions, self.current)
    }

    /// Append to a session's transcript.
    ///
    /// The first user message of a session also becomes its title.
    pub fn append_message(&mut self, id: SessionId, message: Message) -> Result<(), StoreError> {
        let index = self.index_of(id)?;
        let mut sessions = self.sessions.clone();
        let session = &mut sessions[index];
        if message.is_user && session.awaiting_first_user_message() {
            session.title = derive_title(&message.text);
        }
        session.messages.push(message);
        self.commit(sessions, self.current)
    }

    pub fn switch_current(&mut self, id: SessionId) -> Result<(), StoreError> {
        self.index_of(id)?;
        self.commit(self.sessions.clone(), Some(id))
    }

    /// The current session id, creating a session when none is selected
    pub fn ensure_current(&mut self) -> Result<SessionId, StoreError> {
        match self.current {
            Some(id) => Ok(id),
            None => self.create_session(),
        }
    }

    /// Write sessions and the current selection to storage
    pub fn persist(&mut self) -> Result<(), StoreError> {
        write_state(self.storage.as_mut(), &self.sessions, self.current)
    }

    fn commit(&mut self, sessions: Vec<Session>, current: Option<SessionId>) -> Result<(), StoreError> {
        write_state(self.storage.as_mut(), &sessions, current)?;
        self.sessions = sessions;
        self.current = current;
        Ok(())
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.current
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.and_then(|id| self.session(id))
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.session(id).is_some()
    }

    /// Transcript of a session, empty for unknown ids
    pub fn history(&self, id: SessionId) -> &[Message] {
        self.session(id).map(|s| s.messages.as_slice()).unwrap_or(&[])
    }

    /// Transcript of the current session
    pub fn current_history(&self) -> &[Message] {
        self.current.map(|id| self.history(id)).unwrap_or(&[])
    }

    /// Newest first
    pub fn session_summaries(&self) -> Vec<SessionSummary> {
        self.sessions.iter().map(Session::summary).collect()
    }

    /// Backing key-value store, shared with other persisted settings
    pub fn storage(&self) -> &dyn StateStore {
        self.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> &mut dyn StateStore {
        self.storage.as_mut()
    }

    fn index_of(&self, id: SessionId) -> Result<usize, StoreError> {
        self.sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or(StoreError::SessionNotFound(id))
    }

}

fn write_state(
    storage: &mut dyn StateStore,
    sessions: &[Session],
    current: Option<SessionId>,
) -> Result<(), StoreError> {
    let sessions = encode_value(SESSIONS_KEY, sessions)?;
    let current = current
        .map(|id| encode_value(CURRENT_SESSION_KEY, &id))
        .transpose()?;
    storage.apply(vec![
        (SESSIONS_KEY.to_string(), Some(sessions)),
        (CURRENT_SESSION_KEY.to_string(), current),
    ])?;
    Ok(())
}
