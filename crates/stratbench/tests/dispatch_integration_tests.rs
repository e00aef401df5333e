//! End-to-end dispatch tests over a stubbed backend: the full
//! (model × task × run) lifecycle without any network.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use stratbench::catalog::{ModelSpec, Provider, Task, Variant};
use stratbench::config::{BenchConfig, CredentialSet};
use stratbench::dispatch::{run_benchmark, Topology};
use stratbench::error::CallError;
use stratbench::providers::{Completion, CompletionBackend};
use stratbench::resolve::ResolvedTarget;
use stratbench::stats::aggregate;

fn config(num_runs: u32, max_concurrent: usize) -> BenchConfig {
    BenchConfig {
        temperature: 0.0,
        max_tokens: 4096,
        num_runs,
        max_concurrent,
        request_delay: 0.0,
        docs_dir: PathBuf::from("/nonexistent"),
        output_dir: PathBuf::from("/nonexistent"),
    }
}

fn task(id: &str) -> Task {
    Task {
        id: id.into(),
        title: format!("Task {id}"),
        variant: Variant::Normal,
        category: "test".into(),
        docs: vec![],
        measures: vec![],
        use_system_prompt: false,
        prompt: "Assess the plan.".into(),
    }
}

fn model(name: &str, provider: Provider) -> ModelSpec {
    let id = name.to_lowercase().replace(' ', "-");
    ModelSpec::new(name, provider, &id, &format!("router/{id}"))
}

/// Stub backend: fails the first `fail_first` calls with HTTP 429, then
/// succeeds; records every resolved target it was handed.
struct StubBackend {
    calls: AtomicU32,
    fail_first: u32,
    targets: Mutex<Vec<ResolvedTarget>>,
}

impl StubBackend {
    fn new(fail_first: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail_first,
            targets: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionBackend for StubBackend {
    async fn complete(
        &self,
        target: &ResolvedTarget,
        _content: &str,
        _use_system: bool,
    ) -> Result<Completion, CallError> {
        self.targets.lock().unwrap().push(target.clone());
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(CallError::http(429, "rate limited"));
        }
        Ok(Completion {
            text: "A considered answer.".into(),
            input_tokens: 100,
            output_tokens: 50,
            raw_json: r#"{"stub":true}"#.into(),
        })
    }
}

/// Tracks concurrent in-flight calls and the high-water mark.
struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    max_seen: AtomicUsize,
}

#[async_trait]
impl CompletionBackend for ConcurrencyProbe {
    async fn complete(
        &self,
        _target: &ResolvedTarget,
        _content: &str,
        _use_system: bool,
    ) -> Result<Completion, CallError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Completion {
            text: "ok".into(),
            input_tokens: 1,
            output_tokens: 1,
            raw_json: String::new(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failures_within_budget_recover() {
    let backend = StubBackend::new(2); // budget of 2 retries covers 2 failures
    let creds = CredentialSet {
        anthropic: "ak".into(),
        ..CredentialSet::default()
    };
    let models = vec![model("Claude Test", Provider::Anthropic)];
    let tasks = vec![task("A1_memo_n")];

    let start = tokio::time::Instant::now();
    let results = run_benchmark(
        backend.clone(),
        &models,
        &tasks,
        &config(1, 3),
        &creds,
        Topology::Sequential,
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].is_ok(), "error: {}", results[0].error);
    assert_eq!(results[0].total_tokens, 150);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    // Backoff of 2s then 6s must actually have elapsed.
    assert!(start.elapsed() >= Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_records_the_last_error() {
    let backend = StubBackend::new(10); // never recovers within budget
    let creds = CredentialSet {
        anthropic: "ak".into(),
        ..CredentialSet::default()
    };
    let models = vec![model("Claude Test", Provider::Anthropic)];
    let tasks = vec![task("A1_memo_n")];

    let results = run_benchmark(
        backend.clone(),
        &models,
        &tasks,
        &config(1, 3),
        &creds,
        Topology::Sequential,
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].error.starts_with("HTTP 429"));
    // 1 initial attempt + 2 retries, then the unit fails without aborting the run.
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn missing_direct_key_reroutes_through_openrouter() {
    let backend = StubBackend::new(0);
    let creds = CredentialSet {
        openrouter: "or-key".into(),
        ..CredentialSet::default()
    };
    let models = vec![model("Gemini Test", Provider::Google)];
    let tasks = vec![task("A1_memo_n")];

    let results = run_benchmark(
        backend.clone(),
        &models,
        &tasks,
        &config(1, 3),
        &creds,
        Topology::Sequential,
    )
    .await
    .unwrap();

    // The recorded result and the target the adapter saw both carry the
    // rerouted provider and the aggregator-side model id.
    assert_eq!(results[0].provider, Provider::OpenRouter);
    assert_eq!(results[0].model_id, "router/gemini-test");
    let targets = backend.targets.lock().unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].provider, Provider::OpenRouter);
    assert_eq!(targets[0].api_key, "or-key");
}

#[tokio::test(start_paused = true)]
async fn global_gate_bounds_parallel_fanout() {
    let probe = Arc::new(ConcurrencyProbe {
        in_flight: AtomicUsize::new(0),
        max_seen: AtomicUsize::new(0),
    });
    let creds = CredentialSet {
        openrouter: "or-key".into(),
        ..CredentialSet::default()
    };
    let models: Vec<ModelSpec> = (0..6)
        .map(|i| model(&format!("Router Model {i}"), Provider::OpenRouter))
        .collect();
    let tasks = vec![task("A1_memo_n")];

    let results = run_benchmark(
        probe.clone(),
        &models,
        &tasks,
        &config(2, 2), // global ceiling 2, below the provider ceiling of 3
        &creds,
        Topology::Parallel,
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 12);
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(probe.max_seen.load(Ordering::SeqCst) <= 2);
}

#[tokio::test(start_paused = true)]
async fn provider_gate_bounds_parallel_fanout() {
    let probe = Arc::new(ConcurrencyProbe {
        in_flight: AtomicUsize::new(0),
        max_seen: AtomicUsize::new(0),
    });
    let creds = CredentialSet {
        openrouter: "or-key".into(),
        ..CredentialSet::default()
    };
    let models: Vec<ModelSpec> = (0..8)
        .map(|i| model(&format!("Router Model {i}"), Provider::OpenRouter))
        .collect();
    let tasks = vec![task("A1_memo_n")];

    let results = run_benchmark(
        probe.clone(),
        &models,
        &tasks,
        &config(1, 100), // global wide open; openrouter's own ceiling is 3
        &creds,
        Topology::Parallel,
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 8);
    assert!(probe.max_seen.load(Ordering::SeqCst) <= 3);
}

#[tokio::test(start_paused = true)]
async fn empty_credential_set_aborts_before_dispatch() {
    let backend = StubBackend::new(0);
    let models = vec![model("Claude Test", Provider::Anthropic)];
    let tasks = vec![task("A1_memo_n")];

    let err = run_benchmark(
        backend.clone(),
        &models,
        &tasks,
        &config(1, 3),
        &CredentialSet::default(),
        Topology::Sequential,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("no API keys configured"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn credential_less_model_fails_its_units_without_network() {
    // Two models, two tasks, three runs. Only anthropic has a key and there
    // is no aggregator fallback, so every openai unit fails locally.
    let backend = StubBackend::new(0);
    let creds = CredentialSet {
        anthropic: "ak".into(),
        ..CredentialSet::default()
    };
    let models = vec![
        model("Claude Test", Provider::Anthropic),
        model("GPT Test", Provider::OpenAi),
    ];
    let tasks = vec![task("A1_memo_n"), task("A3_review_n")];
    let cfg = config(3, 3);

    let results = run_benchmark(
        backend.clone(),
        &models,
        &tasks,
        &cfg,
        &creds,
        Topology::Sequential,
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 12);
    let ok: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    let failed: Vec<_> = results.iter().filter(|r| !r.is_ok()).collect();
    assert_eq!(ok.len() + failed.len(), results.len());
    assert_eq!(ok.len(), 6);
    assert_eq!(failed.len(), 6);
    assert!(failed
        .iter()
        .all(|r| r.error == "no API key for provider 'openai'"));
    // Only the resolvable units reached the backend.
    assert_eq!(backend.calls.load(Ordering::SeqCst), 6);

    // One aggregate row per (model, task), failed groups fully zeroed.
    let agg = aggregate(&results);
    assert_eq!(agg.len(), 4);
    for row in &agg {
        assert_eq!(row.num_runs, 3);
        if row.model_name == "GPT Test" {
            assert_eq!(row.num_successful, 0);
            assert_eq!(row.num_failed, 3);
            assert_eq!(row.latency_mean, 0.0);
        } else {
            assert_eq!(row.num_successful, 3);
            assert_eq!(row.num_failed, 0);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn run_numbers_cover_the_full_range() {
    let backend = StubBackend::new(0);
    let creds = CredentialSet {
        anthropic: "ak".into(),
        ..CredentialSet::default()
    };
    let models = vec![model("Claude Test", Provider::Anthropic)];
    let tasks = vec![task("A1_memo_n")];

    let results = run_benchmark(
        backend,
        &models,
        &tasks,
        &config(4, 3),
        &creds,
        Topology::Sequential,
    )
    .await
    .unwrap();

    let mut runs: Vec<u32> = results.iter().map(|r| r.run_number).collect();
    runs.sort_unstable();
    assert_eq!(runs, vec![1, 2, 3, 4]);
}
