//! Result records: per-request, per-group aggregate, and run metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Provider;

/// The atomic unit of work output: one (model, task, run) dispatch attempt.
///
/// Created exactly once per unit by the dispatch core and never mutated
/// afterwards; `error.is_empty()` marks success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleResult {
    pub model_name: String,
    /// Resolved model id — the OpenRouter id when fallback routing applied.
    pub model_id: String,
    /// Resolved provider — may differ from the declared one on fallback.
    pub provider: Provider,
    pub task_id: String,
    pub task_title: String,
    /// 1-based run number.
    pub run_number: u32,
    /// ISO-8601 UTC timestamp taken at dispatch start.
    pub timestamp: String,
    /// Model response text; empty on failure.
    pub response: String,
    /// The exact rendered user message, kept for the prompt archive.
    pub user_content: String,
    pub use_system_prompt: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub latency_seconds: f64,
    /// Raw provider JSON body for audit; empty when unavailable.
    pub raw_response: String,
    /// Empty string = success.
    pub error: String,
}

impl SingleResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

/// Derived statistics over all `SingleResult`s sharing (model, task).
///
/// All statistics cover the successful subset only and are zero when that
/// subset is empty. Invariant: `num_successful + num_failed == num_runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub model_name: String,
    pub model_id: String,
    pub provider: Provider,
    pub task_id: String,
    pub task_title: String,
    pub num_runs: u32,
    pub num_successful: u32,
    pub num_failed: u32,
    pub latency_mean: f64,
    pub latency_stdev: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub input_tokens_mean: f64,
    pub input_tokens_stdev: f64,
    pub output_tokens_mean: f64,
    pub output_tokens_stdev: f64,
    pub response_length_mean: f64,
    pub response_length_stdev: f64,
    pub response_length_cv: f64,
}

/// Append-only audit record of a full run, written once at run end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub benchmark: String,
    pub timestamp: String,
    pub config: RunConfigMeta,
    pub providers_used: Vec<String>,
    pub models: Vec<String>,
    pub tasks: Vec<String>,
    pub stats: RunTotals,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub document_checksums: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub prompt_hashes: BTreeMap<String, String>,
}

/// The configuration knobs that affect reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfigMeta {
    pub temperature: f64,
    pub max_tokens: u32,
    pub num_runs: u32,
    pub max_concurrent: usize,
}

/// Terminal counters of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTotals {
    pub total_requests: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_tokens: u64,
    pub wall_clock_seconds: f64,
}
