//! Pure statistics over per-request outcomes.
//!
//! `calc_stats` is a total function — no error path, no I/O. Aggregation
//! groups by (model, task) and computes statistics over the successful
//! subset only, so a group of pure failures yields all-zero statistics
//! rather than a division by zero.

use std::collections::BTreeMap;

use crate::results::{AggregatedResult, SingleResult};

/// Summary statistics for one sample set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    /// Coefficient of variation, stdev/mean × 100. Zero when mean <= 0.
    pub cv: f64,
}

/// Mean, sample stdev, min, max and CV over `values`.
///
/// Empty input yields all zeros; a single value has stdev 0 (sample stdev
/// is undefined for n = 1 and treated as 0, not an error). Results are
/// rounded to 2 decimals (CV to 1) — every consumer reports the same
/// figures.
pub fn calc_stats(values: &[f64]) -> Stats {
    if values.is_empty() {
        return Stats::default();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let stdev = if values.len() > 1 {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    } else {
        0.0
    };
    let cv = if mean > 0.0 { stdev / mean * 100.0 } else { 0.0 };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Stats {
        mean: round2(mean),
        stdev: round2(stdev),
        min: round2(min),
        max: round2(max),
        cv: round1(cv),
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Partition `results` by (model, task) and compute one aggregate row per
/// partition. Output is sorted by (model_name, task_id); the grouping key
/// makes the outcome independent of completion order.
pub fn aggregate(results: &[SingleResult]) -> Vec<AggregatedResult> {
    let mut groups: BTreeMap<(String, String), Vec<&SingleResult>> = BTreeMap::new();
    for r in results {
        groups
            .entry((r.model_name.clone(), r.task_id.clone()))
            .or_default()
            .push(r);
    }

    groups
        .into_iter()
        .map(|((model_name, task_id), group)| {
            let ok: Vec<&SingleResult> = group.iter().copied().filter(|r| r.is_ok()).collect();
            let lat = calc_stats(&ok.iter().map(|r| r.latency_seconds).collect::<Vec<_>>());
            let itok = calc_stats(&ok.iter().map(|r| r.input_tokens as f64).collect::<Vec<_>>());
            let otok = calc_stats(&ok.iter().map(|r| r.output_tokens as f64).collect::<Vec<_>>());
            let rlen = calc_stats(
                &ok.iter()
                    .map(|r| r.response.chars().count() as f64)
                    .collect::<Vec<_>>(),
            );
            AggregatedResult {
                model_name,
                model_id: group[0].model_id.clone(),
                provider: group[0].provider,
                task_id,
                task_title: group[0].task_title.clone(),
                num_runs: group.len() as u32,
                num_successful: ok.len() as u32,
                num_failed: (group.len() - ok.len()) as u32,
                latency_mean: lat.mean,
                latency_stdev: lat.stdev,
                latency_min: lat.min,
                latency_max: lat.max,
                input_tokens_mean: itok.mean,
                input_tokens_stdev: itok.stdev,
                output_tokens_mean: otok.mean,
                output_tokens_stdev: otok.stdev,
                response_length_mean: rlen.mean,
                response_length_stdev: rlen.stdev,
                response_length_cv: rlen.cv,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Provider;

    fn result(model: &str, task: &str, run: u32, latency: f64, error: &str) -> SingleResult {
        SingleResult {
            model_name: model.to_string(),
            model_id: format!("{}-id", model.to_ascii_lowercase()),
            provider: Provider::OpenAi,
            task_id: task.to_string(),
            task_title: task.to_string(),
            run_number: run,
            timestamp: "2026-02-06T12:00:00Z".into(),
            response: if error.is_empty() {
                "a response body".into()
            } else {
                String::new()
            },
            user_content: "prompt".into(),
            use_system_prompt: false,
            input_tokens: if error.is_empty() { 100 } else { 0 },
            output_tokens: if error.is_empty() { 50 } else { 0 },
            total_tokens: if error.is_empty() { 150 } else { 0 },
            latency_seconds: latency,
            raw_response: String::new(),
            error: error.to_string(),
        }
    }

    #[test]
    fn empty_input_is_all_zero() {
        assert_eq!(calc_stats(&[]), Stats::default());
    }

    #[test]
    fn single_value_has_zero_spread() {
        let s = calc_stats(&[4.2]);
        assert_eq!(s.mean, 4.2);
        assert_eq!(s.stdev, 0.0);
        assert_eq!(s.cv, 0.0);
        assert_eq!(s.min, 4.2);
        assert_eq!(s.max, 4.2);
    }

    #[test]
    fn known_sample_statistics() {
        // Sample stdev of [2, 4, 6] is 2.0; mean 4.0; CV 50%.
        let s = calc_stats(&[2.0, 4.0, 6.0]);
        assert_eq!(s.mean, 4.0);
        assert_eq!(s.stdev, 2.0);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 6.0);
        assert_eq!(s.cv, 50.0);
    }

    #[test]
    fn zero_mean_has_zero_cv() {
        let s = calc_stats(&[0.0, 0.0, 0.0]);
        assert_eq!(s.cv, 0.0);
    }

    #[test]
    fn aggregate_separates_ok_and_failed() {
        let results = vec![
            result("M", "T", 1, 2.0, ""),
            result("M", "T", 2, 4.0, ""),
            result("M", "T", 3, 0.0, "HTTP 500: boom"),
        ];
        let agg = aggregate(&results);
        assert_eq!(agg.len(), 1);
        let row = &agg[0];
        assert_eq!(row.num_runs, 3);
        assert_eq!(row.num_successful, 2);
        assert_eq!(row.num_failed, 1);
        assert_eq!(row.num_successful + row.num_failed, row.num_runs);
        // Failed run's zero latency must not drag the mean down.
        assert_eq!(row.latency_mean, 3.0);
    }

    #[test]
    fn all_failed_group_is_all_zero() {
        let results = vec![
            result("M", "T", 1, 0.0, "no API key for provider 'openai'"),
            result("M", "T", 2, 0.0, "no API key for provider 'openai'"),
        ];
        let agg = aggregate(&results);
        assert_eq!(agg.len(), 1);
        let row = &agg[0];
        assert_eq!(row.num_successful, 0);
        assert_eq!(row.latency_mean, 0.0);
        assert_eq!(row.output_tokens_stdev, 0.0);
        assert_eq!(row.response_length_cv, 0.0);
    }

    #[test]
    fn aggregate_sorted_by_model_then_task() {
        let results = vec![
            result("Zeta", "A1", 1, 1.0, ""),
            result("Alpha", "A2", 1, 1.0, ""),
            result("Alpha", "A1", 1, 1.0, ""),
        ];
        let agg = aggregate(&results);
        let keys: Vec<_> = agg
            .iter()
            .map(|a| (a.model_name.as_str(), a.task_id.as_str()))
            .collect();
        assert_eq!(keys, vec![("Alpha", "A1"), ("Alpha", "A2"), ("Zeta", "A1")]);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let results = vec![
            result("M", "T", 1, 1.5, ""),
            result("M", "T", 2, 2.5, ""),
            result("N", "T", 1, 3.0, "HTTP 429: limited"),
        ];
        let a = aggregate(&results);
        let b = aggregate(&results);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.model_name, y.model_name);
            assert_eq!(x.latency_mean, y.latency_mean);
            assert_eq!(x.num_failed, y.num_failed);
        }
    }
}
