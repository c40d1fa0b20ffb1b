use std::sync::Arc;
use std::time::Duration;

use nbchat::bridge::{BridgeHandle, ClientMessage, Controller, QueryId, ServerMessage};
use nbchat::ask_once;
use nbchat_chat::{
    save_provider_config, MemorySecretStore, MemoryStore, SecretStore, SessionStore,
    REMOTE_API_KEY_SECRET,
};
use nbchat_context::{Cell, NoNotebook, Notebook, NotebookSource, StaticNotebook};
use nbchat_llm_api::{ClientFactory, Dispatcher};
use nbchat_types::{Message, ProviderConfig, ProviderKind, SessionId};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{any, body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    handle: BridgeHandle,
    events: UnboundedReceiver<ServerMessage>,
}

fn start(
    local_url: &str,
    config: Option<ProviderConfig>,
    secrets: MemorySecretStore,
    notebook: Arc<dyn NotebookSource>,
) -> Harness {
    let mut storage = MemoryStore::new();
    if let Some(config) = config {
        save_provider_config(&mut storage, &config).unwrap();
    }
    let store = SessionStore::load(Box::new(storage)).unwrap();
    let dispatcher = Dispatcher::new(ClientFactory::new(local_url));

    let (handle, events) =
        Controller::builder(store, Box::new(secrets), dispatcher, notebook).start();
    Harness { handle, events }
}

impl Harness {
    /// Send and collect everything the message pushed synchronously
    async fn request(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        self.handle.request(message).await.unwrap();
        let mut pushed = Vec::new();
        while let Ok(message) = self.events.try_recv() {
            pushed.push(message);
        }
        pushed
    }

    /// Wait for the first push matching `pred`, collecting everything before it
    async fn wait_for(
        &mut self,
        pred: impl Fn(&ServerMessage) -> bool,
    ) -> (ServerMessage, Vec<ServerMessage>) {
        let mut seen = Vec::new();
        let found = tokio::time::timeout(WAIT, async {
            while let Some(message) = self.events.recv().await {
                if pred(&message) {
                    return Some(message);
                }
                seen.push(message);
            }
            None
        })
        .await
        .expect("timed out waiting for a push")
        .expect("controller stopped");
        (found, seen)
    }

    /// Send `message` and wait for the first push matching `pred`, whether the
    /// controller produced it while handling the message or afterwards
    async fn request_until(
        &mut self,
        message: ClientMessage,
        pred: impl Fn(&ServerMessage) -> bool,
    ) -> (ServerMessage, Vec<ServerMessage>) {
        let mut pushed = self.request(message).await;
        if let Some(index) = pushed.iter().position(&pred) {
            let found = pushed.remove(index);
            pushed.truncate(index);
            return (found, pushed);
        }
        let (found, mut seen) = self.wait_for(pred).await;
        pushed.append(&mut seen);
        (found, pushed)
    }

    async fn current_session(&mut self) -> SessionId {
        self.request(ClientMessage::GetSessions)
            .await
            .into_iter()
            .find_map(|m| match m {
                ServerMessage::UpdateSessions {
                    current_session_id, ..
                } => current_session_id,
                _ => None,
            })
            .expect("a current session")
    }
}

async fn mock_generate(server: &MockServer, answer: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": answer, "done": true }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

fn history_of(messages: &[ServerMessage]) -> Option<Vec<Message>> {
    messages.iter().rev().find_map(|m| match m {
        ServerMessage::UpdateHistory { history } => Some(history.clone()),
        _ => None,
    })
}

#[tokio::test]
async fn test_answer_lands_in_session_it_was_asked_from() {
    let server = MockServer::start().await;
    mock_generate(&server, "It merges on the index.", Duration::from_millis(300)).await;

    let mut h = start(&server.uri(), None, MemorySecretStore::new(), Arc::new(NoNotebook));
    let asked_from = h.current_session().await;

    let pushed = h
        .request(ClientMessage::Submit {
            text: "What does the merge do?".to_string(),
        })
        .await;
    assert!(pushed.iter().any(|m| matches!(
        m,
        ServerMessage::QueryStarted { session_id, .. } if *session_id == asked_from
    )));

    // Switch away while the query is in flight
    let pushed = h.request(ClientMessage::CreateSession).await;
    assert_eq!(history_of(&pushed), Some(Vec::new()));

    let (update, before) = h
        .wait_for(|m| match m {
            ServerMessage::UpdateSessions { sessions, .. } => sessions
                .iter()
                .any(|s| s.id == asked_from && s.message_count == 2),
            _ => false,
        })
        .await;
    assert!(history_of(&before).is_none());
    if let ServerMessage::UpdateSessions {
        current_session_id, ..
    } = update
    {
        assert_ne!(current_session_id, Some(asked_from));
    }

    let pushed = h
        .request(ClientMessage::SwitchSession {
            session_id: asked_from,
        })
        .await;
    assert_eq!(
        history_of(&pushed),
        Some(vec![
            Message::user("What does the merge do?"),
            Message::assistant("It merges on the index."),
        ])
    );
}

#[tokio::test]
async fn test_answer_for_deleted_session_is_dropped() {
    let server = MockServer::start().await;
    mock_generate(&server, "too late", Duration::from_millis(200)).await;

    let mut h = start(&server.uri(), None, MemorySecretStore::new(), Arc::new(NoNotebook));
    let asked_from = h.current_session().await;

    h.request(ClientMessage::Submit {
        text: "hello".to_string(),
    })
    .await;
    h.request(ClientMessage::DeleteSession {
        session_id: asked_from,
    })
    .await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(1));

    let pushed = h.request(ClientMessage::GetSessions).await;
    let sessions = pushed.iter().find_map(|m| match m {
        ServerMessage::UpdateSessions {
            sessions,
            current_session_id,
        } => Some((sessions.clone(), *current_session_id)),
        _ => None,
    });
    assert_eq!(sessions, Some((Vec::new(), None)));
    assert!(!pushed
        .iter()
        .any(|m| matches!(m, ServerMessage::QueryFailed { .. })));
}

#[tokio::test]
async fn test_answers_are_tagged_with_their_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("Question: first?"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "first answer" }))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("Question: second?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "second answer" })))
        .mount(&server)
        .await;

    let mut h = start(&server.uri(), None, MemorySecretStore::new(), Arc::new(NoNotebook));
    let mut pushed = h
        .request(ClientMessage::Submit {
            text: "first?".to_string(),
        })
        .await;
    pushed.extend(
        h.request(ClientMessage::Submit {
            text: "second?".to_string(),
        })
        .await,
    );
    let started: Vec<QueryId> = pushed
        .iter()
        .filter_map(|m| match m {
            ServerMessage::QueryStarted { query_id, .. } => Some(*query_id),
            _ => None,
        })
        .collect();
    let [first, second] = started[..] else {
        panic!("expected two started queries, got {:?}", started);
    };
    assert_ne!(first, second);

    let answered = |m: &ServerMessage| match m {
        ServerMessage::QueryAnswered { query_id, answer, .. } => Some((*query_id, answer.clone())),
        _ => None,
    };
    let mut answers: Vec<_> = pushed.iter().filter_map(answered).collect();
    while answers.len() < 2 {
        let (message, _) = h
            .wait_for(|m| matches!(m, ServerMessage::QueryAnswered { .. }))
            .await;
        answers.extend(answered(&message));
    }
    assert_eq!(
        answers,
        vec![
            (second, "second answer".to_string()),
            (first, "first answer".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_prompt_carries_notebook_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.2",
            "prompt": "Code Cell 1 (python):\n```python\nx = 41 + 1\n```\n\nQuestion: What is x?\n\nAnswer:"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "42" })))
        .expect(1)
        .mount(&server)
        .await;

    let notebook = StaticNotebook(Some(Notebook::new(vec![Cell::code("x = 41 + 1")])));
    let mut h = start(&server.uri(), None, MemorySecretStore::new(), Arc::new(notebook));

    let answer = ask_once(&h.handle, &mut h.events, "What is x?").await.unwrap();
    assert_eq!(answer, "42");
}

#[tokio::test]
async fn test_remote_without_key_fails_without_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = ProviderConfig {
        provider: ProviderKind::Remote,
        model: "gpt-4o".to_string(),
        remote_api_url: server.uri(),
    };
    let mut h = start(&server.uri(), Some(config), MemorySecretStore::new(), Arc::new(NoNotebook));
    let session_id = h.current_session().await;

    let (failed, _) = h
        .request_until(
            ClientMessage::Submit {
                text: "why?".to_string(),
            },
            |m| matches!(m, ServerMessage::QueryFailed { .. }),
        )
        .await;

    match failed {
        ServerMessage::QueryFailed {
            session_id: failed_id,
            error,
            ..
        } => {
            assert_eq!(failed_id, session_id);
            assert!(error.contains("nbchat key set"), "{}", error);
        }
        _ => unreachable!(),
    }

    // The question stays in the transcript
    let pushed = h.request(ClientMessage::GetSessions).await;
    assert_eq!(history_of(&pushed), Some(vec![Message::user("why?")]));
}

#[tokio::test]
async fn test_refresh_replaces_unavailable_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "qwen2.5:7b" }, { "name": "phi3" }]
        })))
        .mount(&server)
        .await;

    let mut h = start(&server.uri(), None, MemorySecretStore::new(), Arc::new(NoNotebook));
    let (config, before) = h
        .request_until(ClientMessage::RefreshModels, |m| {
            matches!(m, ServerMessage::ConfigUpdate { .. })
        })
        .await;
    assert!(before.contains(&ServerMessage::UpdateModels {
        models: vec!["qwen2.5:7b".to_string(), "phi3".to_string()],
    }));
    assert!(before
        .iter()
        .any(|m| matches!(m, ServerMessage::Notice { message } if message.contains("llama3.2"))));
    assert!(matches!(config, ServerMessage::ConfigUpdate { ref model, .. } if model == "qwen2.5:7b"));

    let pushed = h.request(ClientMessage::GetConfig).await;
    assert!(matches!(
        pushed.as_slice(),
        [ServerMessage::ConfigUpdate { model, .. }] if model == "qwen2.5:7b"
    ));
}

#[tokio::test]
async fn test_failed_refresh_keeps_model() {
    let mut h = start(
        "http://127.0.0.1:9",
        None,
        MemorySecretStore::new(),
        Arc::new(NoNotebook),
    );
    let (models, _) = h
        .request_until(ClientMessage::RefreshModels, |m| {
            matches!(m, ServerMessage::UpdateModels { .. })
        })
        .await;
    assert_eq!(models, ServerMessage::UpdateModels { models: Vec::new() });

    let pushed = h.request(ClientMessage::GetConfig).await;
    assert!(matches!(
        pushed.as_slice(),
        [ServerMessage::ConfigUpdate { model, .. }] if model == "llama3.2"
    ));
}

#[tokio::test]
async fn test_config_and_credential_updates() {
    let mut secrets = MemorySecretStore::new();
    secrets.set(REMOTE_API_KEY_SECRET, "sk-stored").unwrap();
    let mut h = start("http://127.0.0.1:9", None, secrets, Arc::new(NoNotebook));

    let pushed = h
        .request(ClientMessage::UpdateConfig {
            provider: "remote".to_string(),
            model: "gpt-4o".to_string(),
            url: "https://chat.example.org/".to_string(),
        })
        .await;
    assert_eq!(
        pushed,
        vec![ServerMessage::ConfigUpdate {
            provider: ProviderKind::Remote,
            model: "gpt-4o".to_string(),
            url: "https://chat.example.org/".to_string(),
            has_credential: true,
        }]
    );

    let pushed = h
        .request(ClientMessage::SetCredential {
            api_key: "  ".to_string(),
        })
        .await;
    assert!(matches!(
        pushed.as_slice(),
        [ServerMessage::ConfigUpdate { has_credential: false, .. }]
    ));

    let pushed = h
        .request(ClientMessage::UpdateConfig {
            provider: "carrier-pigeon".to_string(),
            model: String::new(),
            url: String::new(),
        })
        .await;
    assert!(matches!(
        pushed.as_slice(),
        [ServerMessage::Error { message }] if message.contains("Unsupported provider")
    ));
}

#[tokio::test]
async fn test_session_commands_push_state() {
    let mut h = start("http://127.0.0.1:9", None, MemorySecretStore::new(), Arc::new(NoNotebook));
    let first = h.current_session().await;

    let pushed = h.request(ClientMessage::CreateSession).await;
    let (sessions, current) = pushed
        .iter()
        .find_map(|m| match m {
            ServerMessage::UpdateSessions {
                sessions,
                current_session_id,
            } => Some((sessions.clone(), *current_session_id)),
            _ => None,
        })
        .unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(current, Some(sessions[0].id));
    assert_eq!(sessions[1].id, first);

    let pushed = h
        .request(ClientMessage::DeleteSession {
            session_id: sessions[0].id,
        })
        .await;
    assert!(pushed.iter().any(|m| matches!(
        m,
        ServerMessage::UpdateSessions { current_session_id: Some(id), .. } if *id == first
    )));

    let pushed = h
        .request(ClientMessage::SwitchSession {
            session_id: sessions[0].id,
        })
        .await;
    assert!(matches!(
        pushed.as_slice(),
        [ServerMessage::Error { message }] if message.contains("not found")
    ));
}

#[tokio::test]
async fn test_context_placeholder_without_notebook() {
    let mut h = start("http://127.0.0.1:9", None, MemorySecretStore::new(), Arc::new(NoNotebook));
    let pushed = h.request(ClientMessage::GetContext).await;
    assert_eq!(
        pushed,
        vec![ServerMessage::ContextUpdate {
            context: "No active notebook.".to_string()
        }]
    );
}
