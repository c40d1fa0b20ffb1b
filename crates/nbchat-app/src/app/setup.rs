use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::sync::mpsc;

use nbchat_chat::{
    load_provider_config, FileSecretStore, JsonFileStore, SecretStore, SessionStore,
    REMOTE_API_KEY_SECRET,
};
use nbchat_context::{ContextExtractor, IpynbFile, NoNotebook, NotebookSource};
use nbchat_llm_api::{ClientFactory, Dispatcher};
use nbchat_logging::{default_data_dir, get_logs_dir, ConversationLogger};
use nbchat_types::ProviderConfig;

use crate::bridge::{BridgeHandle, Controller, ServerMessage};
use crate::cli::Cli;

pub const STATE_FILE: &str = "state.json";
pub const SECRETS_FILE: &str = "secrets.json";

/// Everything the binary needs, resolved from CLI arguments and environment
pub struct AppContext {
    pub data_dir: PathBuf,
    pub store: SessionStore,
    pub secrets: Box<dyn SecretStore>,
    pub config: ProviderConfig,
    pub dispatcher: Dispatcher,
    pub notebook: Arc<dyn NotebookSource>,
    pub extractor: ContextExtractor,
    /// `NBCHAT_API_KEY` / `--api-key`, used when the vault holds no key
    pub env_credential: Option<String>,
    pub log_transcripts: bool,
}

/// Set up application state from CLI arguments
pub fn setup_from_cli(cli: &Cli) -> Result<AppContext> {
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir().context("Cannot determine a data directory; pass --data-dir")?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let state = JsonFileStore::open(data_dir.join(STATE_FILE))
        .with_context(|| format!("Failed to open {}", data_dir.join(STATE_FILE).display()))?;
    let store = SessionStore::load(Box::new(state)).context("Failed to load sessions")?;
    let config = load_provider_config(store.storage());

    let secrets = FileSecretStore::open(data_dir.join(SECRETS_FILE))
        .with_context(|| format!("Failed to open {}", data_dir.join(SECRETS_FILE).display()))?;

    let dispatcher = Dispatcher::new(ClientFactory::new(&cli.local_url).with_verbose(cli.verbose));

    let notebook: Arc<dyn NotebookSource> = match &cli.notebook {
        Some(path) => Arc::new(IpynbFile::new(path)),
        None => Arc::new(NoNotebook),
    };

    log::debug!(
        "data dir {}, provider {} / {}",
        data_dir.display(),
        config.provider,
        config.model
    );

    Ok(AppContext {
        data_dir,
        store,
        secrets: Box::new(secrets),
        config,
        dispatcher,
        notebook,
        extractor: ContextExtractor::new(!cli.no_cell_numbers),
        env_credential: cli.api_key.clone().filter(|key| !key.trim().is_empty()),
        log_transcripts: cli.log,
    })
}

impl AppContext {
    /// Stored key first, then the environment fallback
    pub fn credential(&self) -> Option<String> {
        self.secrets
            .get(REMOTE_API_KEY_SECRET)
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.env_credential.clone())
    }

    pub fn describe_config(&self) -> String {
        let key_state = if self.secrets.get(REMOTE_API_KEY_SECRET).is_some() {
            "stored".green()
        } else if self.env_credential.is_some() {
            "from environment".green()
        } else {
            "not set".yellow()
        };
        format!(
            "provider: {}\nmodel:    {}\nurl:      {}\napi key:  {}",
            self.config.provider.to_string().cyan(),
            self.config.model.cyan(),
            self.config.remote_api_url,
            key_state
        )
    }

    /// Hand state over to a running controller
    pub async fn start_bridge(self) -> (BridgeHandle, mpsc::UnboundedReceiver<ServerMessage>) {
        let logger = if self.log_transcripts {
            match open_transcript(&self.data_dir).await {
                Ok(logger) => {
                    log::info!("writing transcript to {}", logger.path().display());
                    Some(logger)
                }
                Err(e) => {
                    eprintln!("{} Logging disabled: {}", "⚠️".yellow(), e);
                    None
                }
            }
        } else {
            None
        };

        Controller::builder(self.store, self.secrets, self.dispatcher, self.notebook)
            .env_credential(self.env_credential)
            .extractor(self.extractor)
            .logger(logger)
            .start()
    }
}

async fn open_transcript(data_dir: &Path) -> Result<ConversationLogger> {
    let logs_dir = get_logs_dir(data_dir)?;
    ConversationLogger::new(&logs_dir).await
}
