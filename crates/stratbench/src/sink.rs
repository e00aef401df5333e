//! Result sink: persists raw per-request artifacts and the derived
//! aggregate tables for downstream tooling.
//!
//! Everything lands under a timestamped run directory:
//!
//! ```text
//! results/run_20260206_143000/
//!   responses/<model-slug>/<task>_runNN.md          response + metadata header
//!   responses/<model-slug>/<task>_runNN_prompt.md   archived prompt + SHA-256
//!   responses/<model-slug>/<task>_runNN_raw.json    raw wire body (when present)
//!   aggregated_stats.csv                            one row per (model, task)
//!   scoring_template.csv                            aggregate rows, empty scores
//!   consistency_report.md                           CV bands per group
//!   leaderboard.md                                  skeleton for manual scores
//!   provider_summary.md                             volume per provider
//!   run_meta.json                                   config + totals + checksums
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, Utc};

use crate::catalog::{Provider, SYSTEM_PROMPT};
use crate::config::BenchConfig;
use crate::content::sha256_hex;
use crate::results::{AggregatedResult, RunConfigMeta, RunMeta, RunTotals, SingleResult};
use crate::stats::calc_stats;

/// Create `output_dir/run_<timestamp>/`.
pub fn create_run_dir(output_dir: &Path) -> Result<PathBuf> {
    let dir = output_dir.join(format!("run_{}", Local::now().format("%Y%m%d_%H%M%S")));
    fs::create_dir_all(&dir).with_context(|| format!("creating run dir {}", dir.display()))?;
    Ok(dir)
}

/// Filesystem-safe model name: spaces to underscores, dots to dashes.
fn model_slug(name: &str) -> String {
    name.replace(' ', "_").replace('.', "-")
}

fn response_dir(run_dir: &Path, model_name: &str) -> Result<PathBuf> {
    let dir = run_dir.join("responses").join(model_slug(model_name));
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(dir)
}

/// One markdown file per request: metadata header + response body.
pub fn write_single_responses(results: &[SingleResult], run_dir: &Path) -> Result<()> {
    for r in results {
        let dir = response_dir(run_dir, &r.model_name)?;
        let path = dir.join(format!("{}_run{:02}.md", r.task_id, r.run_number));
        let error = if r.error.is_empty() { "-" } else { &r.error };
        let body = format!(
            "# {} – Run {}\n\
             **Model:** {} (`{}`) via {}\n\
             **Timestamp:** {}\n\
             **Latency:** {}s | **Tokens:** {} in / {} out\n\
             **Error:** {}\n\n---\n\n{}\n",
            r.task_title,
            r.run_number,
            r.model_name,
            r.model_id,
            r.provider,
            r.timestamp,
            r.latency_seconds,
            r.input_tokens,
            r.output_tokens,
            error,
            r.response,
        );
        fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// The exact prompt sent for each request, with its SHA-256, so a run can
/// be audited for prompt identity across models.
pub fn write_prompt_archive(results: &[SingleResult], run_dir: &Path) -> Result<()> {
    for r in results {
        let dir = response_dir(run_dir, &r.model_name)?;
        let path = dir.join(format!("{}_run{:02}_prompt.md", r.task_id, r.run_number));
        let system_section = if r.use_system_prompt {
            format!("\n---\n## System prompt\n\n{SYSTEM_PROMPT}\n")
        } else {
            String::new()
        };
        let body = format!(
            "# Prompt: {} – Run {}\n\
             **Model:** {} (`{}`) via {}\n\
             **System prompt:** {}\n\
             **Timestamp:** {}\n\
             **Prompt hash (SHA-256):** {}\n\
             {}\n---\n## User prompt\n\n{}\n",
            r.task_title,
            r.run_number,
            r.model_name,
            r.model_id,
            r.provider,
            if r.use_system_prompt { "yes" } else { "no" },
            r.timestamp,
            sha256_hex(&r.user_content),
            system_section,
            r.user_content,
        );
        fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Raw provider JSON bodies, skipped when a request produced none.
pub fn write_raw_responses(results: &[SingleResult], run_dir: &Path) -> Result<()> {
    for r in results {
        if r.raw_response.is_empty() {
            continue;
        }
        let dir = response_dir(run_dir, &r.model_name)?;
        let path = dir.join(format!("{}_run{:02}_raw.json", r.task_id, r.run_number));
        fs::write(&path, &r.raw_response).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

const CSV_HEADER: &str = "model_name;model_id;provider;task_id;task_title;\
num_runs;num_successful;num_failed;\
latency_mean;latency_stdev;latency_min;latency_max;\
input_tokens_mean;input_tokens_stdev;\
output_tokens_mean;output_tokens_stdev;\
response_length_mean;response_length_stdev;response_length_cv";

/// Flat tabular aggregate: semicolon-delimited, one row per (model, task).
pub fn write_aggregated_csv(agg: &[AggregatedResult], run_dir: &Path) -> Result<()> {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for a in agg {
        out.push_str(&format!(
            "{};{};{};{};{};{};{};{};{};{};{};{};{};{};{};{};{};{};{}\n",
            a.model_name,
            a.model_id,
            a.provider,
            a.task_id,
            a.task_title,
            a.num_runs,
            a.num_successful,
            a.num_failed,
            a.latency_mean,
            a.latency_stdev,
            a.latency_min,
            a.latency_max,
            a.input_tokens_mean,
            a.input_tokens_stdev,
            a.output_tokens_mean,
            a.output_tokens_stdev,
            a.response_length_mean,
            a.response_length_stdev,
            a.response_length_cv,
        ));
    }
    let path = run_dir.join("aggregated_stats.csv");
    fs::write(&path, out).with_context(|| format!("writing {}", path.display()))
}

/// Template for manual scoring: aggregate rows with empty score columns.
pub fn write_scoring_template(agg: &[AggregatedResult], run_dir: &Path) -> Result<()> {
    let mut out = String::from(
        "model_name;provider;task_id;task_title;\
         score_substance;score_precision;score_practicality;\
         score_judgement;score_language;score_weighted;notes\n",
    );
    for a in agg {
        out.push_str(&format!(
            "{};{};{};{};;;;;;;\n",
            a.model_name, a.provider, a.task_id, a.task_title
        ));
    }
    let path = run_dir.join("scoring_template.csv");
    fs::write(&path, out).with_context(|| format!("writing {}", path.display()))
}

/// Three-tier response-length reproducibility bands per (model, task).
pub fn write_consistency_report(
    results: &[SingleResult],
    cfg: &BenchConfig,
    run_dir: &Path,
) -> Result<()> {
    let mut groups: BTreeMap<(String, String), Vec<&SingleResult>> = BTreeMap::new();
    for r in results.iter().filter(|r| r.is_ok()) {
        groups
            .entry((r.model_name.clone(), r.task_id.clone()))
            .or_default()
            .push(r);
    }

    let mut lines = vec![
        "# Consistency report".to_string(),
        format!(
            "**{} runs | temp {} | {}**",
            cfg.num_runs,
            cfg.temperature,
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        ),
        String::new(),
        "CV: 🟢 <5% | 🟡 5–15% | 🔴 >15%".to_string(),
        String::new(),
        "| Model | Provider | Task | Runs | Length Ø | CV | Tokens Ø | Latency Ø |".to_string(),
        "|-------|----------|------|------|----------|-----|----------|-----------|".to_string(),
    ];
    for ((model, task_id), group) in &groups {
        let len = calc_stats(
            &group
                .iter()
                .map(|r| r.response.chars().count() as f64)
                .collect::<Vec<_>>(),
        );
        let tok = calc_stats(&group.iter().map(|r| r.output_tokens as f64).collect::<Vec<_>>());
        let lat = calc_stats(&group.iter().map(|r| r.latency_seconds).collect::<Vec<_>>());
        let band = if len.cv < 5.0 {
            "🟢"
        } else if len.cv < 15.0 {
            "🟡"
        } else {
            "🔴"
        };
        lines.push(format!(
            "| {} | {} | {} | {} | {:.0} | {} {}% | {:.0} | {:.1}s |",
            model,
            group[0].provider,
            task_id,
            group.len(),
            len.mean,
            band,
            len.cv,
            tok.mean,
            lat.mean,
        ));
    }
    let path = run_dir.join("consistency_report.md");
    fs::write(&path, lines.join("\n")).with_context(|| format!("writing {}", path.display()))
}

/// Leaderboard skeleton — scores stay empty until the manual rubric is
/// filled in; only the row/column structure is generated.
pub fn write_leaderboard(
    agg: &[AggregatedResult],
    cfg: &BenchConfig,
    run_dir: &Path,
) -> Result<()> {
    let mut models: Vec<&str> = agg.iter().map(|a| a.model_name.as_str()).collect();
    models.sort_unstable();
    models.dedup();
    let mut task_ids: Vec<&str> = agg.iter().map(|a| a.task_id.as_str()).collect();
    task_ids.sort_unstable();
    task_ids.dedup();

    let cols = task_ids
        .iter()
        .map(|t| t.split('_').next().unwrap_or(t))
        .collect::<Vec<_>>()
        .join(" | ");
    let dashes = task_ids.iter().map(|_| "---").collect::<Vec<_>>().join(" | ");

    let mut lines = vec![
        "# Leaderboard".to_string(),
        String::new(),
        format!(
            "**{} runs × {} tasks × {} models** | temp {} | {}",
            cfg.num_runs,
            task_ids.len(),
            models.len(),
            cfg.temperature,
            Local::now().format("%d.%m.%Y")
        ),
        String::new(),
        format!("| Rank | Model | Provider | Ø Score | Class | {cols} |"),
        format!("|------|-------|----------|---------|-------|{dashes}|"),
    ];

    let provider_of: BTreeMap<&str, Provider> = agg
        .iter()
        .map(|a| (a.model_name.as_str(), a.provider))
        .collect();
    for m in &models {
        let scores = task_ids.iter().map(|_| "–").collect::<Vec<_>>().join(" | ");
        let provider = provider_of
            .get(m)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".into());
        lines.push(format!("| – | {m} | {provider} | –/5.0 | – | {scores} |"));
    }

    lines.extend([
        String::new(),
        "## Result classes".to_string(),
        String::new(),
        "| Score | Class |".to_string(),
        "|-------|-------|".to_string(),
        "| 4.5–5.0 | Sparring partner |".to_string(),
        "| 3.5–4.4 | Qualified contributor |".to_string(),
        "| 2.5–3.4 | Diligent assistant |".to_string(),
        "| 1.0–2.4 | Not recommended |".to_string(),
    ]);

    let path = run_dir.join("leaderboard.md");
    fs::write(&path, lines.join("\n")).with_context(|| format!("writing {}", path.display()))
}

/// Per-provider volume summary: models, successful requests, token and
/// latency totals, plus the direct-vs-routed split.
pub fn write_provider_summary(results: &[SingleResult], run_dir: &Path) -> Result<()> {
    let mut providers: BTreeMap<Provider, Vec<&SingleResult>> = BTreeMap::new();
    for r in results.iter().filter(|r| r.is_ok()) {
        providers.entry(r.provider).or_default().push(r);
    }

    let mut lines = vec![
        "# Provider summary".to_string(),
        String::new(),
        "| Provider | Models | Requests OK | Total tokens | Ø Latency |".to_string(),
        "|----------|--------|-------------|--------------|-----------|".to_string(),
    ];
    for (provider, group) in &providers {
        let mut names: Vec<&str> = group.iter().map(|r| r.model_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        let tokens: u64 = group.iter().map(|r| r.total_tokens).sum();
        let lat = calc_stats(&group.iter().map(|r| r.latency_seconds).collect::<Vec<_>>());
        lines.push(format!(
            "| {} | {} | {} | {} | {:.1}s |",
            provider,
            names.len(),
            group.len(),
            tokens,
            lat.mean,
        ));
    }

    let direct = results
        .iter()
        .filter(|r| r.is_ok() && r.provider != Provider::OpenRouter)
        .count();
    let routed = results
        .iter()
        .filter(|r| r.is_ok() && r.provider == Provider::OpenRouter)
        .count();
    lines.push(String::new());
    lines.push(format!(
        "**Direct API:** {direct} requests | **OpenRouter:** {routed} requests"
    ));

    let path = run_dir.join("provider_summary.md");
    fs::write(&path, lines.join("\n")).with_context(|| format!("writing {}", path.display()))
}

/// The append-only run audit record.
pub fn write_run_meta(
    results: &[SingleResult],
    cfg: &BenchConfig,
    elapsed_secs: f64,
    document_checksums: BTreeMap<String, String>,
    prompt_hashes: BTreeMap<String, String>,
    run_dir: &Path,
) -> Result<()> {
    let ok: Vec<&SingleResult> = results.iter().filter(|r| r.is_ok()).collect();

    let mut providers_used: Vec<String> = ok.iter().map(|r| r.provider.to_string()).collect();
    providers_used.sort_unstable();
    providers_used.dedup();
    let mut models: Vec<String> = results.iter().map(|r| r.model_name.clone()).collect();
    models.sort_unstable();
    models.dedup();
    let mut tasks: Vec<String> = results.iter().map(|r| r.task_id.clone()).collect();
    tasks.sort_unstable();
    tasks.dedup();

    let meta = RunMeta {
        benchmark: format!("stratbench v{}", env!("CARGO_PKG_VERSION")),
        timestamp: Utc::now().to_rfc3339(),
        config: RunConfigMeta {
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            num_runs: cfg.num_runs,
            max_concurrent: cfg.max_concurrent,
        },
        providers_used,
        models,
        tasks,
        stats: RunTotals {
            total_requests: results.len(),
            successful: ok.len(),
            failed: results.len() - ok.len(),
            total_tokens: ok.iter().map(|r| r.total_tokens).sum(),
            wall_clock_seconds: (elapsed_secs * 10.0).round() / 10.0,
        },
        document_checksums,
        prompt_hashes,
    };

    let path = run_dir.join("run_meta.json");
    let json = serde_json::to_string_pretty(&meta).context("serializing run_meta")?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
}

/// Write every artifact for a finished run.
#[allow(clippy::too_many_arguments)]
pub fn write_all(
    results: &[SingleResult],
    agg: &[AggregatedResult],
    cfg: &BenchConfig,
    elapsed_secs: f64,
    document_checksums: BTreeMap<String, String>,
    prompt_hashes: BTreeMap<String, String>,
    run_dir: &Path,
) -> Result<()> {
    write_single_responses(results, run_dir)?;
    write_prompt_archive(results, run_dir)?;
    write_raw_responses(results, run_dir)?;
    write_aggregated_csv(agg, run_dir)?;
    write_scoring_template(agg, run_dir)?;
    write_consistency_report(results, cfg, run_dir)?;
    write_leaderboard(agg, cfg, run_dir)?;
    write_provider_summary(results, run_dir)?;
    write_run_meta(
        results,
        cfg,
        elapsed_secs,
        document_checksums,
        prompt_hashes,
        run_dir,
    )
}
