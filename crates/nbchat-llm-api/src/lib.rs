//! # nbchat-llm-api
//!
//! Provider-abstracted access to the two backends nbchat can talk to:
//! - a local inference daemon on the loopback interface (`/api/generate`, `/api/tags`)
//! - a remote OpenAI-style server behind a bearer token
//!   (`/api/chat/completions`, `/api/models`)
//!
//! ## Features
//!
//! - **Unified Interface**: a single `ProviderClient` trait for both providers
//! - **Normalized Answers**: both response shapes come back as plain text
//! - **Model Catalog**: best-effort model listing that never fails
//! - **Bounded Waits**: every request carries a per-provider timeout
//!
//! ## Example
//!
//! ```rust,no_run
//! use nbchat_llm_api::{ClientFactory, Dispatcher};
//! use nbchat_types::ProviderConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), nbchat_llm_api::LlmError> {
//!     let dispatcher = Dispatcher::new(ClientFactory::default());
//!     let config = ProviderConfig::default();
//!
//!     let answer = dispatcher
//!         .query("What does the last cell print?", "Notebook is empty.", &config, None)
//!         .await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod prompt;


// Re-export commonly used types
pub use catalog::{list_models, reconcile_model, ModelReconciliation};
pub use client::{
    local::LocalClient, remote::RemoteClient, ProviderClient, NO_RESPONSE,
    UNEXPECTED_RESPONSE_FORMAT,
};
pub use config::{
    get_default_url_for_provider, normalize_base_url, ClientFactory, Timeouts, LOCAL_BASE_URL,
};
pub use dispatcher::Dispatcher;
pub use error::LlmError;
pub use prompt::build_prompt;
