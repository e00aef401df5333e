//! Multi-provider LLM benchmark runner.
//!
//! Fans a fixed (model × task × run) work set out across four provider
//! APIs, under nested concurrency gates and per-provider pacing, then
//! aggregates per-group statistics and persists every artifact of the run.
//!
//! Module map:
//!
//! | Module      | Responsibility                                        |
//! |-------------|-------------------------------------------------------|
//! | [`catalog`] | Provider enum, model and task catalogs                |
//! | [`config`]  | Env-driven run config and credential set              |
//! | [`content`] | Prompt rendering, document loading, audit hashes      |
//! | [`resolve`] | Model → (provider, key) resolution with fallback      |
//! | [`error`]   | Call error taxonomy and transience classification     |
//! | [`retry`]   | Bounded exponential-backoff retry wrapper             |
//! | [`providers`] | Wire adapters behind the `CompletionBackend` seam   |
//! | [`dispatch`]| Work-set execution: gates, timeout, pacing            |
//! | [`stats`]   | Descriptive statistics and (model, task) aggregation  |
//! | [`results`] | Result record types and the run audit record          |
//! | [`sink`]    | Artifact writers for the run directory                |

pub mod catalog;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod providers;
pub mod resolve;
pub mod results;
pub mod retry;
pub mod sink;
pub mod stats;

pub use catalog::{builtin_models, builtin_tasks, ModelSpec, Provider, Task};
pub use config::{BenchConfig, CredentialSet};
pub use dispatch::{run_benchmark, Topology};
pub use error::CallError;
pub use providers::{CompletionBackend, HttpBackend};
pub use results::{AggregatedResult, SingleResult};
pub use stats::{aggregate, calc_stats};
