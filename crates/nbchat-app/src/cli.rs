use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;

use nbchat_chat::{save_provider_config, SecretStore, REMOTE_API_KEY_SECRET};
use nbchat_llm_api::{LlmError, LOCAL_BASE_URL};
use nbchat_types::ProviderKind;

use crate::app::AppContext;

/// CLI arguments for nbchat
#[derive(Parser)]
#[command(name = "nbchat")]
#[command(about = "Ask a local or remote language model about the notebook you are working on")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Generate shell completions
    #[arg(long, value_enum)]
    pub generate: Option<Shell>,

    /// Enable verbose debug output (request/response dumps, debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Directory holding state.json, secrets.json and logs (default: ~/.nbchat)
    #[arg(long, value_name = "PATH", env = "NBCHAT_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the local inference daemon
    #[arg(
        long,
        value_name = "URL",
        env = "NBCHAT_LOCAL_URL",
        default_value = LOCAL_BASE_URL,
        global = true
    )]
    pub local_url: String,

    /// Notebook (.ipynb) whose cells are sent as context
    #[arg(long, value_name = "PATH", env = "NBCHAT_NOTEBOOK", global = true)]
    pub notebook: Option<PathBuf>,

    /// Remote API key used when none is stored
    #[arg(long, value_name = "KEY", env = "NBCHAT_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Leave out cell numbers in the notebook context
    #[arg(long, global = true)]
    pub no_cell_numbers: bool,

    /// Write a JSONL transcript of every message to <data-dir>/logs
    #[arg(long, global = true)]
    pub log: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat in the terminal (default)
    Chat,
    /// Serve the chat bridge over WebSocket
    Serve {
        /// Address to listen on
        #[arg(long, value_name = "ADDR", env = "NBCHAT_BIND", default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Ask one question about the notebook and print the answer
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// List the models the provider offers
    Models {
        /// Provider to query (defaults to the configured one)
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,
    },
    /// Print the notebook context that would be sent with a question
    Context,
    /// Show or change the provider configuration
    Config {
        /// local or remote
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,
        /// Model name
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,
        /// Base URL of the remote server
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
    /// Manage the stored remote API key
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
pub enum KeyCommands {
    /// Store the remote API key
    Set {
        /// The key
        key: String,
    },
    /// Remove the stored key
    Clear,
}

impl Commands {
    /// Run a one-shot subcommand and return what it prints.
    ///
    /// `chat`, `serve` and `ask` drive the controller and are run by the binary.
    pub async fn execute(&self, app: &mut AppContext) -> Result<String> {
        match self {
            Commands::Models { provider } => {
                let provider = match provider {
                    Some(name) => name.parse::<ProviderKind>().map_err(LlmError::from)?,
                    None => app.config.provider,
                };
                let credential = app.credential();
                let models = app
                    .dispatcher
                    .list_models(provider, &app.config, credential.as_deref())
                    .await;
                if models.is_empty() {
                    Ok(format!(
                        "{}",
                        format!("Could not list {} models (see --verbose for details)", provider)
                            .yellow()
                    ))
                } else {
                    Ok(models
                        .iter()
                        .map(|model| {
                            if *model == app.config.model {
                                format!("* {}", model.green())
                            } else {
                                format!("  {}", model)
                            }
                        })
                        .collect::<Vec<_>>()
                        .join("\n"))
                }
            }
            Commands::Context => Ok(app.extractor.extract(app.notebook.as_ref())),
            Commands::Config {
                provider,
                model,
                url,
            } => {
                if provider.is_some() || model.is_some() || url.is_some() {
                    let provider = match provider {
                        Some(name) => name.parse().map_err(LlmError::from)?,
                        None => app.config.provider,
                    };
                    let updated = app
                        .config
                        .updated(provider, model.as_deref(), url.as_deref());
                    save_provider_config(app.store.storage_mut(), &updated)
                        .context("Failed to save provider configuration")?;
                    app.config = updated;
                }
                Ok(app.describe_config())
            }
            Commands::Key { command } => match command {
                KeyCommands::Set { key } => {
                    let key = key.trim();
                    if key.is_empty() {
                        anyhow::bail!("API key is empty");
                    }
                    app.secrets
                        .set(REMOTE_API_KEY_SECRET, key)
                        .context("Failed to store API key")?;
                    Ok(format!("{}", "✓ Remote API key stored".green()))
                }
                KeyCommands::Clear => {
                    app.secrets
                        .delete(REMOTE_API_KEY_SECRET)
                        .context("Failed to remove API key")?;
                    Ok(format!("{}", "✓ Remote API key removed".green()))
                }
            },
            Commands::Chat | Commands::Serve { .. } | Commands::Ask { .. } => {
                anyhow::bail!("this command runs through the chat controller")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::setup_from_cli;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["nbchat", "ask", "what", "does", "cell", "2", "do?"]).unwrap();
        match cli.command {
            Some(Commands::Ask { question }) => assert_eq!(question.join(" "), "what does cell 2 do?"),
            _ => panic!("expected ask"),
        }

        let cli = Cli::try_parse_from([
            "nbchat", "config", "--provider", "remote", "--url", "http://h:3000",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config { provider: Some(_), model: None, url: Some(_) })
        ));

        let cli = Cli::try_parse_from(["nbchat", "key", "set", "sk-123"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Key { command: KeyCommands::Set { .. } })
        ));
    }

    #[tokio::test]
    async fn test_config_blank_values_keep_previous() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();

        let cli = Cli::try_parse_from([
            "nbchat", "--data-dir", data_dir, "config", "--provider", "remote", "--model", "gpt-4o",
        ])
        .unwrap();
        let mut app = setup_from_cli(&cli).unwrap();
        cli.command.as_ref().unwrap().execute(&mut app).await.unwrap();
        let url_before = app.config.remote_api_url.clone();

        let cli = Cli::try_parse_from([
            "nbchat", "--data-dir", data_dir, "config", "--model", "", "--url", " ",
        ])
        .unwrap();
        let mut app = setup_from_cli(&cli).unwrap();
        cli.command.as_ref().unwrap().execute(&mut app).await.unwrap();

        let reloaded = setup_from_cli(&cli).unwrap();
        assert_eq!(reloaded.config.provider, ProviderKind::Remote);
        assert_eq!(reloaded.config.model, "gpt-4o");
        assert_eq!(reloaded.config.remote_api_url, url_before);
        assert!(!url_before.is_empty());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["nbchat", "context", "--notebook", "a.ipynb", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.notebook, Some(PathBuf::from("a.ipynb")));
    }
}
