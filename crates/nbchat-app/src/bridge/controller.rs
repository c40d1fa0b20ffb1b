use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};

use nbchat_chat::{
    load_provider_config, save_provider_config, SecretStore, SessionStore, REMOTE_API_KEY_SECRET,
};
use nbchat_context::{ContextExtractor, NotebookSource};
use nbchat_llm_api::{reconcile_model, Dispatcher, LlmError, ModelReconciliation};
use nbchat_logging::ConversationLogger;
use nbchat_types::{Message, ProviderConfig, ProviderKind, SessionId};

use crate::bridge::protocol::{ClientMessage, QueryId, ServerMessage};

/// The controller task has stopped
#[derive(Debug, thiserror::Error)]
#[error("the chat controller has shut down")]
pub struct BridgeClosed;

struct Inbound {
    message: ClientMessage,
    handled: Option<oneshot::Sender<()>>,
}

/// Cloneable sender side of the View Bridge
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl BridgeHandle {
    /// Queue a message without waiting for it to be processed
    pub fn send(&self, message: ClientMessage) -> Result<(), BridgeClosed> {
        self.tx
            .send(Inbound {
                message,
                handled: None,
            })
            .map_err(|_| BridgeClosed)
    }

    /// Queue a message and wait until the controller has handled it.
    ///
    /// Every push the message causes is already in the event channel when
    /// this returns. Answers to `submit` arrive later.
    pub async fn request(&self, message: ClientMessage) -> Result<(), BridgeClosed> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Inbound {
                message,
                handled: Some(done_tx),
            })
            .map_err(|_| BridgeClosed)?;
        done_rx.await.map_err(|_| BridgeClosed)
    }
}

/// Work finished by a spawned task
enum Completion {
    Answer {
        session_id: SessionId,
        query_id: QueryId,
        model: String,
        result: Result<String, LlmError>,
    },
    Catalog {
        provider: ProviderKind,
        models: Vec<String>,
    },
}

/// Single owner of the session store and the provider configuration.
///
/// Processes UI messages one at a time. Provider calls run in spawned tasks
/// that report back through the completion channel, each carrying the id of
/// the session it was submitted from.
pub struct Controller {
    store: SessionStore,
    config: ProviderConfig,
    secrets: Box<dyn SecretStore>,
    env_credential: Option<String>,
    dispatcher: Dispatcher,
    notebook: Arc<dyn NotebookSource>,
    extractor: ContextExtractor,
    models: Vec<String>,
    next_query: QueryId,
    logger: Option<ConversationLogger>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    completion_tx: mpsc::UnboundedSender<Completion>,
}

impl Controller {
    /// Configure a controller; `ControllerBuilder::start` spawns its loop
    pub fn builder(
        store: SessionStore,
        secrets: Box<dyn SecretStore>,
        dispatcher: Dispatcher,
        notebook: Arc<dyn NotebookSource>,
    ) -> ControllerBuilder {
        ControllerBuilder {
            store,
            secrets,
            dispatcher,
            notebook,
            env_credential: None,
            extractor: ContextExtractor::default(),
            logger: None,
        }
    }

    async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<Inbound>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            tokio::select! {
                received = inbound.recv() => {
                    let Some(Inbound { message, handled }) = received else {
                        break;
                    };
                    self.handle(message).await;
                    if let Some(handled) = handled {
                        let _ = handled.send(());
                    }
                }
                Some(completion) = completions.recv() => {
                    self.complete(completion).await;
                }
            }
        }

        log::debug!("bridge closed, controller stopping");
        if let Some(logger) = &mut self.logger {
            logger.shutdown().await;
        }
    }

    async fn handle(&mut self, message: ClientMessage) {
        log::debug!("handling {:?}", message);
        let result = match message {
            ClientMessage::Submit { text } => self.submit(text).await,
            ClientMessage::GetContext => {
                self.push_context();
                Ok(())
            }
            ClientMessage::GetSessions => {
                self.push_sessions();
                Ok(())
            }
            ClientMessage::SwitchSession { session_id } => self.switch_session(session_id),
            ClientMessage::CreateSession => self.create_session(),
            ClientMessage::DeleteSession { session_id } => self.delete_session(session_id),
            ClientMessage::ClearSession {
                session_id,
                reset_title,
            } => self.clear_session(session_id, reset_title),
            ClientMessage::GetConfig => {
                self.push_config();
                Ok(())
            }
            ClientMessage::UpdateConfig {
                provider,
                model,
                url,
            } => self.update_config(&provider, &model, &url),
            ClientMessage::SetCredential { api_key } => self.set_credential(&api_key),
            ClientMessage::RefreshModels => {
                self.refresh_models();
                Ok(())
            }
        };

        if let Err(e) = result {
            log::warn!("{}", e);
            self.push(ServerMessage::Error {
                message: e.to_string(),
            });
        }
    }

    async fn submit(&mut self, text: String) -> Result<()> {
        if text.trim().is_empty() {
            log::debug!("ignoring empty prompt");
            return Ok(());
        }

        let session_id = self.store.ensure_current()?;
        self.store.append_message(session_id, Message::user(text.clone()))?;
        self.push_sessions();
        if let Some(logger) = &mut self.logger {
            logger.log(session_id, "user", &text, None).await;
        }

        let context = self.extractor.extract(self.notebook.as_ref());
        self.push(ServerMessage::ContextUpdate {
            context: context.clone(),
        });

        let config = self.config.clone();
        let credential = self.credential();
        let dispatcher = self.dispatcher.clone();
        let completions = self.completion_tx.clone();

        let query_id = self.next_query;
        self.next_query += 1;
        self.push(ServerMessage::QueryStarted {
            session_id,
            query_id,
        });
        tokio::spawn(async move {
            let result = dispatcher
                .query(&text, &context, &config, credential.as_deref())
                .await;
            let _ = completions.send(Completion::Answer {
                session_id,
                query_id,
                model: config.model,
                result,
            });
        });

        Ok(())
    }

    async fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Answer {
                session_id,
                query_id,
                model,
                result,
            } => self.finish_query(session_id, query_id, &model, result).await,
            Completion::Catalog { provider, models } => self.finish_catalog(provider, models),
        }
    }

    async fn finish_query(
        &mut self,
        session_id: SessionId,
        query_id: QueryId,
        model: &str,
        result: Result<String, LlmError>,
    ) {
        if !self.store.contains(session_id) {
            log::info!("session {} was deleted, dropping its answer", session_id);
            return;
        }

        match result {
            Ok(answer) => {
                if let Err(e) = self
                    .store
                    .append_message(session_id, Message::assistant(answer.clone()))
                {
                    log::warn!("could not record answer: {}", e);
                    self.push(ServerMessage::Error {
                        message: e.to_string(),
                    });
                    return;
                }
                if let Some(logger) = &mut self.logger {
                    logger.log(session_id, "assistant", &answer, Some(model)).await;
                }

                self.push_session_list();
                if self.store.current_id() == Some(session_id) {
                    self.push_history();
                }
                self.push(ServerMessage::QueryAnswered {
                    session_id,
                    query_id,
                    answer,
                });
            }
            Err(e) => {
                log::warn!("query for session {} failed: {}", session_id, e);
                self.push(ServerMessage::QueryFailed {
                    session_id,
                    query_id,
                    error: e.to_string(),
                });
            }
        }
    }

    fn switch_session(&mut self, session_id: SessionId) -> Result<()> {
        self.store.switch_current(session_id)?;
        self.push_sessions();
        Ok(())
    }

    fn create_session(&mut self) -> Result<()> {
        self.store.create_session()?;
        self.push_sessions();
        Ok(())
    }

    fn delete_session(&mut self, session_id: SessionId) -> Result<()> {
        self.store.delete_session(session_id)?;
        self.push_sessions();
        Ok(())
    }

    fn clear_session(&mut self, session_id: Option<SessionId>, reset_title: bool) -> Result<()> {
        let id = session_id
            .or_else(|| self.store.current_id())
            .ok_or_else(|| anyhow::anyhow!("No session is selected"))?;
        self.store.clear_session(id, reset_title)?;
        self.push_sessions();
        Ok(())
    }

    fn update_config(&mut self, provider: &str, model: &str, url: &str) -> Result<()> {
        let provider: ProviderKind = provider.parse().map_err(LlmError::from)?;

        let updated = self.config.updated(provider, Some(model), Some(url));

        save_provider_config(self.store.storage_mut(), &updated)?;
        log::info!("provider set to {} / {}", updated.provider, updated.model);
        self.config = updated;
        self.push_config();
        Ok(())
    }

    fn set_credential(&mut self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            self.secrets.delete(REMOTE_API_KEY_SECRET)?;
        } else {
            self.secrets.set(REMOTE_API_KEY_SECRET, api_key)?;
        }
        self.push_config();
        Ok(())
    }

    fn refresh_models(&self) {
        let provider = self.config.provider;
        let config = self.config.clone();
        let credential = self.credential();
        let dispatcher = self.dispatcher.clone();
        let completions = self.completion_tx.clone();

        tokio::spawn(async move {
            let models = dispatcher
                .list_models(provider, &config, credential.as_deref())
                .await;
            let _ = completions.send(Completion::Catalog { provider, models });
        });
    }

    fn finish_catalog(&mut self, provider: ProviderKind, models: Vec<String>) {
        if provider != self.config.provider {
            log::debug!("discarding {} model list, provider changed meanwhile", provider);
            return;
        }

        self.models = models;
        self.push(ServerMessage::UpdateModels {
            models: self.models.clone(),
        });

        if let ModelReconciliation::Replaced { previous, selected } =
            reconcile_model(&self.config.model, &self.models)
        {
            let mut updated = self.config.clone();
            updated.model = selected.clone();
            if let Err(e) = save_provider_config(self.store.storage_mut(), &updated) {
                log::warn!("could not save model selection: {}", e);
                self.push(ServerMessage::Error {
                    message: e.to_string(),
                });
                return;
            }
            self.config = updated;
            self.push(ServerMessage::Notice {
                message: format!(
                    "Model '{}' is not offered by the {} provider; switched to '{}'.",
                    previous, provider, selected
                ),
            });
            self.push_config();
        }
    }

    /// Vault key first, then the environment fallback
    fn credential(&self) -> Option<String> {
        self.secrets
            .get(REMOTE_API_KEY_SECRET)
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.env_credential.clone())
    }

    fn push(&self, message: ServerMessage) {
        if self.outbound.send(message).is_err() {
            log::debug!("no UI attached, dropping push");
        }
    }

    fn push_context(&self) {
        self.push(ServerMessage::ContextUpdate {
            context: self.extractor.extract(self.notebook.as_ref()),
        });
    }

    fn push_session_list(&self) {
        self.push(ServerMessage::UpdateSessions {
            sessions: self.store.session_summaries(),
            current_session_id: self.store.current_id(),
        });
    }

    fn push_history(&self) {
        self.push(ServerMessage::UpdateHistory {
            history: self.store.current_history().to_vec(),
        });
    }

    fn push_sessions(&self) {
        self.push_session_list();
        self.push_history();
    }

    fn push_config(&self) {
        self.push(ServerMessage::ConfigUpdate {
            provider: self.config.provider,
            model: self.config.model.clone(),
            url: self.config.remote_api_url.clone(),
            has_credential: self.credential().is_some(),
        });
    }
}

/// Optional controller settings, applied before the loop starts
pub struct ControllerBuilder {
    store: SessionStore,
    secrets: Box<dyn SecretStore>,
    dispatcher: Dispatcher,
    notebook: Arc<dyn NotebookSource>,
    env_credential: Option<String>,
    extractor: ContextExtractor,
    logger: Option<ConversationLogger>,
}

impl ControllerBuilder {
    /// Credential used when the vault holds none
    pub fn env_credential(mut self, credential: Option<String>) -> Self {
        self.env_credential = credential.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn extractor(mut self, extractor: ContextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn logger(mut self, logger: Option<ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Spawn the controller loop on the current tokio runtime.
    ///
    /// Returns the handle for inbound messages and the receiver of every
    /// push. The loop ends once all handles are dropped.
    pub fn start(self) -> (BridgeHandle, mpsc::UnboundedReceiver<ServerMessage>) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let config = load_provider_config(self.store.storage());
        let controller = Controller {
            store: self.store,
            config,
            secrets: self.secrets,
            env_credential: self.env_credential,
            dispatcher: self.dispatcher,
            notebook: self.notebook,
            extractor: self.extractor,
            models: Vec::new(),
            next_query: 1,
            logger: self.logger,
            outbound: outbound_tx,
            completion_tx,
        };
        tokio::spawn(controller.run(inbound_rx, completion_rx));

        (BridgeHandle { tx: inbound_tx }, outbound_rx)
    }
}
