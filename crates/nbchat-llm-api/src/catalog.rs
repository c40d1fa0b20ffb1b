use crate::client::ProviderClient;
use crate::error::LlmError;

/// List the models `client` can serve.
///
/// Never fails: any error is logged and reported as an empty list, so an
/// empty result means "could not determine", not "no models".
pub async fn list_models(client: &dyn ProviderClient, credential: Option<&str>) -> Vec<String> {
    match client.list_models(credential).await {
        Ok(models) => models,
        Err(LlmError::MissingCredential) => {
            log::debug!("skipping {} model listing: no credential", client.kind());
            Vec::new()
        }
        Err(e) => {
            log::warn!("could not list {} models: {}", client.kind(), e);
            Vec::new()
        }
    }
}

/// Outcome of checking the configured model against a refreshed catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReconciliation {
    /// The catalog is empty, so nothing can be said about the model
    Unverified,
    /// The configured model is listed
    Confirmed,
    /// The configured model is missing; the first listed model replaces it
    Replaced { previous: String, selected: String },
}

/// Check `configured` against `catalog`, picking the first listed model when
/// the configured one is unavailable.
pub fn reconcile_model(configured: &str, catalog: &[String]) -> ModelReconciliation {
    match catalog.first() {
        None => ModelReconciliation::Unverified,
        Some(_) if catalog.iter().any(|m| m == configured) => ModelReconciliation::Confirmed,
        Some(first) => ModelReconciliation::Replaced {
            previous: configured.to_string(),
            selected: first.clone(),
        },
    }
}
