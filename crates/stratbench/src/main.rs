use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use stratbench::catalog::{builtin_models, builtin_tasks, Provider, SYSTEM_PROMPT};
use stratbench::config::{BenchConfig, CredentialSet};
use stratbench::content::{build_user_content, document_checksums, sha256_hex};
use stratbench::dispatch::{log_summary, run_benchmark, Topology};
use stratbench::providers::HttpBackend;
use stratbench::resolve::resolve;
use stratbench::sink;
use stratbench::stats::aggregate;

/// Benchmark a model catalog against a task catalog across providers.
#[derive(Parser, Debug)]
#[command(name = "stratbench", version, about)]
struct Cli {
    /// Runs per (model, task) pair; overrides NUM_RUNS.
    #[arg(long)]
    runs: Option<u32>,

    /// Only models whose display name contains one of these (case-insensitive).
    #[arg(long, value_delimiter = ',')]
    models: Vec<String>,

    /// Only tasks whose id starts with one of these prefixes, e.g. `A1`.
    #[arg(long, value_delimiter = ',')]
    tasks: Vec<String>,

    /// Only models homed on these providers (anthropic, openai, google, openrouter).
    #[arg(long, value_delimiter = ',')]
    providers: Vec<Provider>,

    /// Print the execution plan and cost estimate, then exit without calling anyone.
    #[arg(long)]
    dry_run: bool,

    /// Fan all models of a (run, task) pair out concurrently.
    #[arg(long)]
    parallel: bool,

    /// Override OUTPUT_DIR.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = BenchConfig::from_env();
    if let Some(runs) = cli.runs {
        cfg.num_runs = runs;
    }
    if let Some(dir) = &cli.output_dir {
        cfg.output_dir = dir.clone();
    }
    if let Err(msg) = cfg.validate() {
        bail!("invalid configuration: {msg}");
    }

    let models = select_models(&cli)?;
    let tasks = select_tasks(&cli)?;
    let creds = CredentialSet::from_env();

    if cli.dry_run {
        print_plan(&models, &tasks, &cfg, &creds);
        return Ok(());
    }

    let checksums = document_checksums(&tasks, &cfg.docs_dir);
    let mut prompt_hashes: BTreeMap<String, String> = BTreeMap::new();
    prompt_hashes.insert("system_prompt".into(), sha256_hex(SYSTEM_PROMPT));
    for task in &tasks {
        prompt_hashes.insert(task.id.clone(), sha256_hex(&build_user_content(task, &cfg.docs_dir)));
    }

    let topology = if cli.parallel {
        Topology::Parallel
    } else {
        Topology::Sequential
    };
    let backend = Arc::new(HttpBackend::new(&cfg));

    let started = Instant::now();
    let results = run_benchmark(backend, &models, &tasks, &cfg, &creds, topology).await?;
    let elapsed = started.elapsed().as_secs_f64();

    let agg = aggregate(&results);
    let run_dir = sink::create_run_dir(&cfg.output_dir)?;
    sink::write_all(&results, &agg, &cfg, elapsed, checksums, prompt_hashes, &run_dir)?;
    info!(dir = %run_dir.display(), "artifacts written");

    log_summary(&results, elapsed);
    Ok(())
}

fn select_models(cli: &Cli) -> Result<Vec<stratbench::ModelSpec>> {
    let mut models = builtin_models();
    if !cli.models.is_empty() {
        let needles: Vec<String> = cli.models.iter().map(|m| m.to_lowercase()).collect();
        models.retain(|m| {
            let name = m.name.to_lowercase();
            needles.iter().any(|n| name.contains(n))
        });
    }
    if !cli.providers.is_empty() {
        models.retain(|m| cli.providers.contains(&m.provider));
    }
    if models.is_empty() {
        let available = builtin_models()
            .iter()
            .map(|m| m.name.clone())
            .collect::<Vec<_>>()
            .join(", ");
        bail!("no models match the given filters; available: {available}");
    }
    Ok(models)
}

fn select_tasks(cli: &Cli) -> Result<Vec<stratbench::Task>> {
    let mut tasks = builtin_tasks();
    if !cli.tasks.is_empty() {
        tasks.retain(|t| cli.tasks.iter().any(|p| t.id.starts_with(p.as_str())));
    }
    if tasks.is_empty() {
        let available = builtin_tasks()
            .iter()
            .map(|t| t.id.clone())
            .collect::<Vec<_>>()
            .join(", ");
        bail!("no tasks match the given filters; available: {available}");
    }
    Ok(tasks)
}

/// Execution plan: per-model routing and key status, plus a rough token
/// estimate. Word count × 1.3 approximates input tokens; output is taken
/// at a flat 800 per request.
fn print_plan(
    models: &[stratbench::ModelSpec],
    tasks: &[stratbench::Task],
    cfg: &BenchConfig,
    creds: &CredentialSet,
) {
    let total = models.len() * tasks.len() * cfg.num_runs as usize;
    println!("stratbench dry run");
    println!(
        "  {} models × {} tasks × {} runs = {} requests",
        models.len(),
        tasks.len(),
        cfg.num_runs,
        total
    );
    println!("  temperature {} | max_tokens {}", cfg.temperature, cfg.max_tokens);
    println!();

    for model in models {
        match resolve(model, creds) {
            Ok(target) if target.provider == model.provider => {
                println!("  ✓ {} → {} ({})", model.name, target.provider, target.model_id);
            }
            Ok(target) => {
                println!(
                    "  ✓ {} → {} ({}) [fallback from {}]",
                    model.name, target.provider, target.model_id, model.provider
                );
            }
            Err(_) => {
                println!("  ✗ {} → no key for {} and no openrouter key", model.name, model.provider);
            }
        }
    }
    println!();

    for task in tasks {
        if task.docs.is_empty() {
            println!("  task {} (no documents)", task.id);
            continue;
        }
        for doc in &task.docs {
            let present = cfg.docs_dir.join(doc).exists()
                || cfg
                    .docs_dir
                    .join("extracts")
                    .join(format!(
                        "{}.txt",
                        std::path::Path::new(doc)
                            .file_stem()
                            .unwrap_or_default()
                            .to_string_lossy()
                    ))
                    .exists();
            let mark = if present { '✓' } else { '✗' };
            println!("  task {} document {} {}", task.id, doc, mark);
        }
    }
    println!();

    let input_per_pass: f64 = tasks
        .iter()
        .map(|t| build_user_content(t, &cfg.docs_dir).split_whitespace().count() as f64 * 1.3)
        .sum();
    let input_total = input_per_pass * models.len() as f64 * cfg.num_runs as f64;
    let output_total = (total * 800) as f64;
    println!(
        "  estimated tokens: ~{:.0}k input, ~{:.0}k output",
        input_total / 1000.0,
        output_total / 1000.0
    );
    println!(
        "  rough cost band: {:.0}–{:.0} USD at 1–15 USD per million tokens",
        (input_total + output_total) / 1e6,
        (input_total + output_total) * 15.0 / 1e6
    );
}
