//! The benchmark execution core.
//!
//! Builds the (model × task × run) work set, resolves each model to a
//! provider, and drives every unit through the same lifecycle:
//!
//! ```text
//! resolve credential
//!   ├─ none → synthesized failure, no network call
//!   └─ ok   → render content → acquire global + provider gates
//!             → adapter call through the retry wrapper (300 s bound)
//!             → release gates → pacing delay with jitter → SingleResult
//! ```
//!
//! Failures are unit-local: every unit runs to completion and records its
//! outcome; only a completely empty credential set aborts before dispatch.
//! The two admission gates are the only shared mutable state, held
//! strictly around the network call — never across pacing or result
//! construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::catalog::{ModelSpec, Provider, Task};
use crate::config::{BenchConfig, CredentialSet};
use crate::content::build_user_content;
use crate::error::{CallError, REQUEST_TIMEOUT_SECS};
use crate::providers::CompletionBackend;
use crate::resolve::resolve;
use crate::results::SingleResult;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::stats::round2;

/// How units are interleaved.
///
/// Both topologies honor the same gates and pacing; `Sequential` minimizes
/// cross-provider interleaving so externally observed rate consumption
/// stays simple, `Parallel` fans out all models of a (run, task) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    #[default]
    Sequential,
    Parallel,
}

/// The two nested admission gates: one global ceiling, one per provider.
/// Cheap to clone; all fields are shared handles.
#[derive(Clone)]
pub struct Gates {
    global: Arc<Semaphore>,
    per_provider: HashMap<Provider, Arc<Semaphore>>,
}

impl Gates {
    /// Gates with the given global ceiling and per-provider defaults.
    pub fn new(global_limit: usize) -> Self {
        let per_provider = Provider::ALL
            .iter()
            .map(|p| (*p, Arc::new(Semaphore::new(p.max_concurrent()))))
            .collect();
        Self {
            global: Arc::new(Semaphore::new(global_limit)),
            per_provider,
        }
    }

    fn provider_gate(&self, provider: Provider) -> &Arc<Semaphore> {
        // Every variant is inserted in `new`; the map is total.
        &self.per_provider[&provider]
    }
}

/// Everything a spawned unit needs, shared across the whole run.
struct RunContext {
    backend: Arc<dyn CompletionBackend>,
    cfg: BenchConfig,
    creds: CredentialSet,
    gates: Gates,
    policy: RetryPolicy,
}

/// Execute the full work set and return one `SingleResult` per unit.
///
/// Aborts (the only fatal condition) when no provider has any key.
pub async fn run_benchmark(
    backend: Arc<dyn CompletionBackend>,
    models: &[ModelSpec],
    tasks: &[Task],
    cfg: &BenchConfig,
    creds: &CredentialSet,
    topology: Topology,
) -> anyhow::Result<Vec<SingleResult>> {
    if creds.is_empty() {
        bail!("no API keys configured for any provider; set *_API_KEY in the environment or .env");
    }

    let total = models.len() * tasks.len() * cfg.num_runs as usize;
    info!(
        models = models.len(),
        tasks = tasks.len(),
        runs = cfg.num_runs,
        total,
        topology = ?topology,
        "benchmark starting"
    );

    let ctx = Arc::new(RunContext {
        backend,
        cfg: cfg.clone(),
        creds: creds.clone(),
        gates: Gates::new(cfg.max_concurrent),
        policy: RetryPolicy::default(),
    });

    let mut all_results = Vec::with_capacity(total);
    for run_number in 1..=cfg.num_runs {
        for task in tasks {
            let task = Arc::new(task.clone());
            match topology {
                Topology::Sequential => {
                    for model in models {
                        let result =
                            execute_unit(ctx.clone(), model.clone(), task.clone(), run_number)
                                .await;
                        all_results.push(result);
                    }
                }
                Topology::Parallel => {
                    // Structured gather: results land in the collection via
                    // join, never through shared-vec appends.
                    let mut set = JoinSet::new();
                    for model in models {
                        set.spawn(execute_unit(
                            ctx.clone(),
                            model.clone(),
                            task.clone(),
                            run_number,
                        ));
                    }
                    while let Some(joined) = set.join_next().await {
                        match joined {
                            Ok(result) => all_results.push(result),
                            // A panicked unit would break the ok+failed==all
                            // invariant, so surface it instead of dropping it.
                            Err(e) => bail!("dispatch task panicked: {e}"),
                        }
                    }
                }
            }
        }
    }

    Ok(all_results)
}

/// Run one (model, task, run) unit to a recorded outcome.
async fn execute_unit(
    ctx: Arc<RunContext>,
    model: ModelSpec,
    task: Arc<Task>,
    run_number: u32,
) -> SingleResult {
    let user_content = build_user_content(&task, &ctx.cfg.docs_dir);
    let use_system = task.use_system_prompt;

    let mut result = SingleResult {
        model_name: model.name.clone(),
        model_id: model.model_id.clone(),
        provider: model.provider,
        task_id: task.id.clone(),
        task_title: task.title.clone(),
        run_number,
        timestamp: Utc::now().to_rfc3339(),
        response: String::new(),
        user_content,
        use_system_prompt: use_system,
        input_tokens: 0,
        output_tokens: 0,
        total_tokens: 0,
        latency_seconds: 0.0,
        raw_response: String::new(),
        error: String::new(),
    };

    // (a)/(b): resolve credential; missing key fails the unit immediately,
    // retry-free, without touching the network.
    let target = match resolve(&model, &ctx.creds) {
        Ok(target) => target,
        Err(e) => {
            result.error = e.to_string();
            error!(model = %model.name, run = run_number, error = %result.error, "unit failed");
            return result;
        }
    };
    result.model_id = target.model_id.clone();
    result.provider = target.provider;

    // (d): both gates before the network call. Closed semaphores cannot
    // occur (nothing closes them), but record rather than panic if they do.
    let global_permit = match ctx.gates.global.clone().acquire_owned().await {
        Ok(p) => p,
        Err(_) => {
            result.error = "global concurrency gate closed".into();
            return result;
        }
    };
    let provider_permit = match ctx
        .gates
        .provider_gate(target.provider)
        .clone()
        .acquire_owned()
        .await
    {
        Ok(p) => p,
        Err(_) => {
            result.error = "provider concurrency gate closed".into();
            return result;
        }
    };

    info!(
        model = %model.name,
        provider = %target.provider,
        task = %task.title,
        run = run_number,
        "dispatching"
    );
    let start = Instant::now();

    // (e)/(f): retried adapter call under the total 300 s bound.
    let call = call_with_retry(&ctx.policy, || {
        ctx.backend.complete(&target, &result.user_content, use_system)
    });
    let outcome = tokio::time::timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), call).await;
    result.latency_seconds = round2(start.elapsed().as_secs_f64());

    match outcome {
        Ok(Ok(completion)) => {
            result.input_tokens = completion.input_tokens;
            result.output_tokens = completion.output_tokens;
            result.total_tokens = completion.input_tokens + completion.output_tokens;
            result.response = completion.text;
            result.raw_response = completion.raw_json;
            info!(
                model = %model.name,
                run = run_number,
                latency_s = result.latency_seconds,
                tokens = result.total_tokens,
                "unit ok"
            );
        }
        Ok(Err(e)) => {
            result.error = e.to_string();
            error!(
                model = %model.name,
                run = run_number,
                error = %result.error,
                "unit failed"
            );
        }
        Err(_elapsed) => {
            result.error = CallError::Timeout {
                secs: REQUEST_TIMEOUT_SECS,
            }
            .to_string();
            error!(model = %model.name, run = run_number, "unit timed out");
        }
    }

    // (g): release both gates before pacing so the delay never blocks
    // other slots.
    drop(provider_permit);
    drop(global_permit);

    // (h): per-provider pacing with uniform jitter in [0, base/2].
    let base = target
        .provider
        .pacing_delay_secs()
        .unwrap_or(ctx.cfg.request_delay);
    if base > 0.0 {
        let jittered = base + fastrand::f64() * base * 0.5;
        tokio::time::sleep(Duration::from_secs_f64(jittered)).await;
    }

    result
}

/// Log the end-of-run summary: ok/fail counts and every failed unit.
pub fn log_summary(results: &[SingleResult], elapsed_secs: f64) {
    let ok: Vec<&SingleResult> = results.iter().filter(|r| r.is_ok()).collect();
    let failed: Vec<&SingleResult> = results.iter().filter(|r| !r.is_ok()).collect();
    let total_tokens: u64 = ok.iter().map(|r| r.total_tokens).sum();

    info!(
        ok = ok.len(),
        total = results.len(),
        total_tokens,
        minutes = format!("{:.1}", elapsed_secs / 60.0),
        "benchmark finished"
    );
    if !failed.is_empty() {
        warn!(failures = failed.len(), "failed units:");
        for r in &failed {
            warn!(
                model = %r.model_name,
                provider = %r.provider,
                task = %r.task_title,
                run = r.run_number,
                error = %r.error,
                "  failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates_cover_every_provider() {
        let gates = Gates::new(3);
        for p in Provider::ALL {
            assert_eq!(
                gates.provider_gate(p).available_permits(),
                p.max_concurrent()
            );
        }
        assert_eq!(gates.global.available_permits(), 3);
    }

    #[test]
    fn default_topology_is_sequential() {
        assert_eq!(Topology::default(), Topology::Sequential);
    }
}
