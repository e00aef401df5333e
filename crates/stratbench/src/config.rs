//! Environment-driven run configuration and credential set.
//!
//! All knobs come from the environment (a `.env` file is loaded by the
//! binary before this is read) with built-in defaults, so a bare
//! `stratbench` invocation works against whatever keys are present.

use std::env;
use std::path::PathBuf;

use crate::catalog::Provider;

/// Benchmark run configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Sampling temperature sent to every provider.
    pub temperature: f64,
    /// Max output tokens per request.
    pub max_tokens: u32,
    /// Runs per (model, task) pair.
    pub num_runs: u32,
    /// Global in-flight request ceiling across all providers.
    pub max_concurrent: usize,
    /// Fallback pacing base delay (seconds) for providers without a
    /// provider-specific value.
    pub request_delay: f64,
    /// Directory holding the task reference documents.
    pub docs_dir: PathBuf,
    /// Root directory for run output; each run creates a timestamped subdir.
    pub output_dir: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            temperature: env_parse("TEMPERATURE", 0.0),
            max_tokens: env_parse("MAX_TOKENS", 4096),
            num_runs: env_parse("NUM_RUNS", 10),
            max_concurrent: env_parse("MAX_CONCURRENT", 3),
            request_delay: env_parse("REQUEST_DELAY", 2.0),
            docs_dir: env::var("DOCS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./documents")),
            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./results")),
        }
    }
}

impl BenchConfig {
    /// Build from environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Validate ranges; returns an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "TEMPERATURE must be in [0, 2], got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            return Err("MAX_TOKENS must be > 0".to_string());
        }
        if self.num_runs == 0 {
            return Err("NUM_RUNS must be > 0".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("MAX_CONCURRENT must be > 0".to_string());
        }
        if self.request_delay < 0.0 {
            return Err(format!(
                "REQUEST_DELAY must be >= 0, got {}",
                self.request_delay
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// API keys for the four providers. Empty string = not configured.
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
    pub anthropic: String,
    pub openai: String,
    pub google: String,
    pub openrouter: String,
}

impl CredentialSet {
    /// Read all four `*_API_KEY` variables.
    pub fn from_env() -> Self {
        Self {
            anthropic: env::var(Provider::Anthropic.key_env()).unwrap_or_default(),
            openai: env::var(Provider::OpenAi.key_env()).unwrap_or_default(),
            google: env::var(Provider::Google.key_env()).unwrap_or_default(),
            openrouter: env::var(Provider::OpenRouter.key_env()).unwrap_or_default(),
        }
    }

    pub fn key_for(&self, provider: Provider) -> &str {
        match provider {
            Provider::Anthropic => &self.anthropic,
            Provider::OpenAi => &self.openai,
            Provider::Google => &self.google,
            Provider::OpenRouter => &self.openrouter,
        }
    }

    pub fn has(&self, provider: Provider) -> bool {
        !self.key_for(provider).is_empty()
    }

    /// True when no provider has any key — the only run-fatal condition.
    pub fn is_empty(&self) -> bool {
        Provider::ALL.iter().all(|p| !self.has(*p))
    }
}
