use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

use nbchat_types::{Message, ProviderKind, SessionId, SessionSummary};

use crate::bridge::{BridgeHandle, ClientMessage, QueryId, ServerMessage};

/// Longest wait for a model listing; the catalog request itself gives up earlier
const MODELS_WAIT: Duration = Duration::from_secs(15);

const HELP: &str = "\
/new                      start a new chat
/sessions                 list chats
/switch <n>               switch to chat n
/delete [n]               delete chat n (default: current)
/clear                    clear the current chat
/reset                    clear the current chat and its title
/context                  show the notebook context
/models                   refresh the model list
/config [provider model url]  show or change the provider
/key <value>              store the remote API key
/help                     this help
/quit                     exit";

/// Client-side copy of what the controller last pushed
#[derive(Default)]
struct ReplView {
    sessions: Vec<SessionSummary>,
    current: Option<SessionId>,
    history: Vec<Message>,
    provider: Option<ProviderKind>,
    model: String,
}

enum QueryOutcome {
    Answered(String),
    Failed(String),
}

impl ReplView {
    /// Apply a push and print whatever the user should see right away
    fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::UpdateSessions {
                sessions,
                current_session_id,
            } => {
                self.sessions = sessions;
                self.current = current_session_id;
            }
            ServerMessage::UpdateHistory { history } => self.history = history,
            ServerMessage::ContextUpdate { .. } => {}
            ServerMessage::UpdateModels { models } => {
                if models.is_empty() {
                    println!("{}", "No models could be listed.".yellow());
                }
                for model in models {
                    if model == self.model {
                        println!("* {}", model.green());
                    } else {
                        println!("  {}", model);
                    }
                }
            }
            ServerMessage::ConfigUpdate {
                provider,
                model,
                url,
                has_credential,
            } => {
                self.provider = Some(provider);
                self.model = model;
                println!(
                    "{}",
                    format!(
                        "provider {} • model {} • url {} • api key {}",
                        provider,
                        self.model,
                        url,
                        if has_credential { "set" } else { "not set" }
                    )
                    .bright_black()
                );
            }
            ServerMessage::QueryStarted { .. } => {
                println!("{}", "Thinking...".bright_black());
            }
            ServerMessage::QueryAnswered { .. } => {
                println!(
                    "{}",
                    "An earlier question was answered; the reply is saved in its chat.".bright_black()
                );
            }
            ServerMessage::QueryFailed { error, .. } => {
                eprintln!("{} {}\n", "Error:".bright_red().bold(), error);
            }
            ServerMessage::Notice { message } => {
                println!("{} {}", "ℹ".bright_cyan(), message.yellow());
            }
            ServerMessage::Error { message } => {
                eprintln!("{} {}", "Error:".bright_red().bold(), message);
            }
        }
    }

    fn print_sessions(&self) {
        for (idx, session) in self.sessions.iter().enumerate() {
            let marker = if Some(session.id) == self.current { "*" } else { " " };
            println!(
                "{} {:>2}. {} {}",
                marker,
                idx + 1,
                session.title,
                format!("({} messages)", session.message_count).bright_black()
            );
        }
    }

    fn session_at(&self, number: &str) -> Option<SessionId> {
        let index: usize = number.trim().parse().ok()?;
        self.sessions.get(index.checked_sub(1)?).map(|s| s.id)
    }

    fn prompt(&self) -> String {
        let model = if self.model.is_empty() { "?" } else { self.model.as_str() };
        format!("{} {} ", format!("[{}]", model).bright_magenta(), "You:".bright_green().bold())
    }
}

/// Apply everything already pushed, returning the id of a query that started
fn drain(view: &mut ReplView, events: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Option<QueryId> {
    let mut started = None;
    while let Ok(message) = events.try_recv() {
        if let ServerMessage::QueryStarted { query_id, .. } = &message {
            started = Some(*query_id);
        }
        view.apply(message);
    }
    started
}

/// Wait for the outcome of `query_id`, applying every other push on the way.
///
/// Answers to earlier, interrupted questions can arrive first; they are
/// matched by id and never reported as this query's answer.
async fn wait_for_answer(
    view: &mut ReplView,
    events: &mut mpsc::UnboundedReceiver<ServerMessage>,
    query_id: QueryId,
) -> Option<QueryOutcome> {
    while let Some(message) = events.recv().await {
        match message {
            ServerMessage::QueryAnswered {
                query_id: answered,
                answer,
                ..
            } if answered == query_id => return Some(QueryOutcome::Answered(answer)),
            ServerMessage::QueryFailed {
                query_id: failed,
                error,
                ..
            } if failed == query_id => return Some(QueryOutcome::Failed(error)),
            other => view.apply(other),
        }
    }
    None
}

/// Submit one question and return the answer
pub async fn ask_once(
    handle: &BridgeHandle,
    events: &mut mpsc::UnboundedReceiver<ServerMessage>,
    question: &str,
) -> Result<String> {
    let mut view = ReplView::default();
    handle.request(ClientMessage::GetSessions).await?;
    drain(&mut view, events);

    handle
        .request(ClientMessage::Submit {
            text: question.to_string(),
        })
        .await?;

    let mut started = None;
    while let Ok(message) = events.try_recv() {
        match message {
            ServerMessage::QueryStarted { query_id, .. } => started = Some(query_id),
            ServerMessage::Error { message } => anyhow::bail!(message),
            other => view.apply(other),
        }
    }
    let query_id = started.context("The question was not submitted")?;

    match wait_for_answer(&mut view, events, query_id).await {
        Some(QueryOutcome::Answered(answer)) => Ok(answer),
        Some(QueryOutcome::Failed(error)) => Err(anyhow::anyhow!(error)),
        None => anyhow::bail!("The chat controller stopped before answering"),
    }
}

/// Run interactive REPL mode
pub async fn run_repl_mode(
    handle: BridgeHandle,
    mut events: mpsc::UnboundedReceiver<ServerMessage>,
) -> Result<()> {
    println!("{}", "📓 nbchat - ask about your notebook".bright_cyan().bold());
    println!("{}", "Type /help for commands, /quit to exit\n".bright_black());

    let mut view = ReplView::default();
    handle.request(ClientMessage::GetConfig).await?;
    handle.request(ClientMessage::GetSessions).await?;
    drain(&mut view, &mut events);
    if let Some(session) = view.sessions.iter().find(|s| Some(s.id) == view.current) {
        println!(
            "{}",
            format!("Chat: {} ({} messages)\n", session.title, session.message_count).bright_black()
        );
    }

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(&view.prompt());
        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".bright_black());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".bright_cyan());
                break;
            }
            Err(err) => {
                eprintln!("{} {}", "Error:".bright_red().bold(), err);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rl.add_history_entry(line)?;

        if let Some(command) = line.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            let name = parts.next().unwrap_or_default();
            let args: Vec<&str> = parts.collect();

            let message = match (name, args.as_slice()) {
                ("quit" | "exit", _) => break,
                ("help", _) => {
                    println!("{}", HELP);
                    continue;
                }
                ("new", _) => ClientMessage::CreateSession,
                ("sessions", _) => {
                    handle.request(ClientMessage::GetSessions).await?;
                    drain(&mut view, &mut events);
                    view.print_sessions();
                    continue;
                }
                ("switch", [number]) => match view.session_at(number) {
                    Some(session_id) => ClientMessage::SwitchSession { session_id },
                    None => {
                        eprintln!("{} no chat number {}", "Error:".bright_red().bold(), number);
                        continue;
                    }
                },
                ("delete", []) => match view.current {
                    Some(session_id) => ClientMessage::DeleteSession { session_id },
                    None => {
                        eprintln!("{} no chat is selected", "Error:".bright_red().bold());
                        continue;
                    }
                },
                ("delete", [number]) => match view.session_at(number) {
                    Some(session_id) => ClientMessage::DeleteSession { session_id },
                    None => {
                        eprintln!("{} no chat number {}", "Error:".bright_red().bold(), number);
                        continue;
                    }
                },
                ("clear", _) => ClientMessage::ClearSession {
                    session_id: None,
                    reset_title: false,
                },
                ("reset", _) => ClientMessage::ClearSession {
                    session_id: None,
                    reset_title: true,
                },
                ("context", _) => {
                    handle.request(ClientMessage::GetContext).await?;
                    while let Ok(message) = events.try_recv() {
                        match message {
                            ServerMessage::ContextUpdate { context } => println!("{}\n", context),
                            other => view.apply(other),
                        }
                    }
                    continue;
                }
                ("models", _) => {
                    handle.request(ClientMessage::RefreshModels).await?;
                    wait_for_models(&mut view, &mut events).await;
                    continue;
                }
                ("config", []) => ClientMessage::GetConfig,
                ("config", [provider, rest @ ..]) => ClientMessage::UpdateConfig {
                    provider: provider.to_string(),
                    model: rest.first().map(|s| s.to_string()).unwrap_or_default(),
                    url: rest.get(1).map(|s| s.to_string()).unwrap_or_default(),
                },
                ("key", [value]) => ClientMessage::SetCredential {
                    api_key: value.to_string(),
                },
                _ => {
                    eprintln!("{} unknown command /{} (try /help)", "Error:".bright_red().bold(), name);
                    continue;
                }
            };

            let switching = matches!(
                message,
                ClientMessage::SwitchSession { .. }
                    | ClientMessage::CreateSession
                    | ClientMessage::DeleteSession { .. }
            );
            handle.request(message).await?;
            drain(&mut view, &mut events);
            if switching {
                print_current(&view);
            }
            continue;
        }

        handle
            .request(ClientMessage::Submit {
                text: line.to_string(),
            })
            .await?;
        let Some(query_id) = drain(&mut view, &mut events) else {
            continue;
        };

        tokio::select! {
            outcome = wait_for_answer(&mut view, &mut events, query_id) => match outcome {
                Some(QueryOutcome::Answered(answer)) => {
                    println!("\n{} {}\n", "Assistant:".bright_blue().bold(), answer);
                }
                Some(QueryOutcome::Failed(error)) => {
                    eprintln!("{} {}\n", "Error:".bright_red().bold(), error);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "^C - the answer will still be saved to this chat".bright_yellow());
            }
        }
    }

    Ok(())
}

async fn wait_for_models(view: &mut ReplView, events: &mut mpsc::UnboundedReceiver<ServerMessage>) {
    let wait = async {
        while let Some(message) = events.recv().await {
            let done = matches!(message, ServerMessage::UpdateModels { .. });
            view.apply(message);
            if done {
                break;
            }
        }
    };
    if tokio::time::timeout(MODELS_WAIT, wait).await.is_err() {
        eprintln!("{}", "Model list did not arrive in time".yellow());
    }
    // A replaced model arrives right after the list
    tokio::time::sleep(Duration::from_millis(50)).await;
    drain(view, events);
}

fn print_current(view: &ReplView) {
    match view.sessions.iter().find(|s| Some(s.id) == view.current) {
        Some(session) => {
            println!("{}", format!("Chat: {}", session.title).bright_cyan());
            for message in view.history.iter().rev().take(4).rev() {
                let label = if message.is_user {
                    "You:".bright_green().bold()
                } else {
                    "Assistant:".bright_blue().bold()
                };
                println!("{} {}", label, message.text);
            }
        }
        None => println!("{}", "No chat selected; your next question starts one.".bright_black()),
    }
}
