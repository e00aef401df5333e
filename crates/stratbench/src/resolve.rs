//! Credential resolution: which provider, model id and key a unit will use.
//!
//! Pure function of (ModelSpec, CredentialSet) — no I/O, independently
//! testable. A model whose direct vendor has no key is silently rerouted
//! through the OpenRouter aggregator when that key exists; when neither
//! exists resolution fails and the dispatch core fails the unit without a
//! network call.

use thiserror::Error;
use tracing::debug;

use crate::catalog::{ModelSpec, Provider};
use crate::config::CredentialSet;

/// The provider, model id and key a dispatch unit will actually call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub provider: Provider,
    pub model_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Neither the declared provider nor the aggregator has a key.
    #[error("no API key for provider '{0}'")]
    NoCredential(Provider),
}

/// Resolve a model to its call target.
pub fn resolve(spec: &ModelSpec, creds: &CredentialSet) -> Result<ResolvedTarget, ResolutionError> {
    let direct_key = creds.key_for(spec.provider);
    if !direct_key.is_empty() {
        return Ok(ResolvedTarget {
            provider: spec.provider,
            model_id: spec.model_id.clone(),
            api_key: direct_key.to_string(),
        });
    }

    if spec.provider != Provider::OpenRouter && creds.has(Provider::OpenRouter) {
        debug!(
            model = %spec.name,
            from = %spec.provider,
            "no direct key, rerouting through openrouter"
        );
        return Ok(ResolvedTarget {
            provider: Provider::OpenRouter,
            model_id: spec.openrouter_id.clone(),
            api_key: creds.key_for(Provider::OpenRouter).to_string(),
        });
    }

    Err(ResolutionError::NoCredential(spec.provider))
}
