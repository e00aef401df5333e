//! Provider enumeration and the model/task catalogs.
//!
//! Providers are a closed enum so an invalid provider/model combination is
//! unrepresentable. The model and task universes are plain functions
//! returning owned data — callers hand explicit catalogs to the dispatch
//! core, there is no module-level mutable state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four supported backends.
///
/// `OpenRouter` doubles as the aggregator: models declared for a direct
/// vendor are rerouted through it when the direct credential is missing
/// (see [`crate::resolve`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAi,
    Google,
    OpenRouter,
}

impl Provider {
    /// All providers, in stable order.
    pub const ALL: [Provider; 4] = [
        Provider::Anthropic,
        Provider::OpenAi,
        Provider::Google,
        Provider::OpenRouter,
    ];

    /// API endpoint. For Google this is the model-family base; the adapter
    /// appends `/{model}:generateContent`.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/models",
            Self::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Google => "GOOGLE_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    /// Per-provider concurrency ceiling. Providers differ in rate-limit
    /// tolerance; Google free-tier is the strictest.
    pub fn max_concurrent(&self) -> usize {
        match self {
            Self::Anthropic => 2,
            Self::OpenAi => 2,
            Self::Google => 1,
            Self::OpenRouter => 3,
        }
    }

    /// Provider-specific pacing base delay in seconds, where one applies.
    /// `None` falls back to the configured global `REQUEST_DELAY`.
    pub fn pacing_delay_secs(&self) -> Option<f64> {
        match self {
            Self::Google => Some(5.0),
            Self::OpenRouter => Some(1.0),
            Self::Anthropic | Self::OpenAi => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
            Self::Google => write!(f, "google"),
            Self::OpenRouter => write!(f, "openrouter"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "google" => Ok(Self::Google),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(format!(
                "unknown provider '{other}' (expected anthropic, openai, google, openrouter)"
            )),
        }
    }
}

/// Immutable catalog entry for one benchmarked model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Display name used in reports and CLI filters.
    pub name: String,
    /// Declared home provider.
    pub provider: Provider,
    /// Provider-native model identifier.
    pub model_id: String,
    /// Identifier under the OpenRouter aggregator, used on fallback.
    pub openrouter_id: String,
}

impl ModelSpec {
    pub fn new(name: &str, provider: Provider, model_id: &str, openrouter_id: &str) -> Self {
        Self {
            name: name.to_string(),
            provider,
            model_id: model_id.to_string(),
            openrouter_id: openrouter_id.to_string(),
        }
    }
}

/// Which prompt-engineering tier a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// A plain question, as a non-specialist would ask it.
    Normal,
    /// An engineered prompt with explicit structure and the system prompt.
    Power,
}

/// One benchmark task. Immutable, loaded once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier, e.g. `A1_decision_memo_p`. CLI task filters
    /// match on prefixes of this id.
    pub id: String,
    pub title: String,
    pub variant: Variant,
    /// Measurement-criteria category for the manual scoring rubric.
    pub category: String,
    /// Documents embedded into the user message, by filename under DOCS_DIR.
    pub docs: Vec<String>,
    /// Labels the human scorer rates this task on.
    pub measures: Vec<String>,
    /// Whether the system-level instruction prefix is attached.
    pub use_system_prompt: bool,
    pub prompt: String,
}

/// System-level instruction attached to power-variant requests only.
pub const SYSTEM_PROMPT: &str = "\
You are an experienced strategy consultant advising owner-managed, \
mid-sized companies. Your client is a managing director who needs a \
grounded assessment, not validation of existing opinions.

GROUND RULES:

1. FORMAT: answer in flowing prose with paragraphs. No bullet points, no \
numbered lists, no markdown markup. Plain-text subheadings are allowed.

2. LENGTH: between 400 and 800 words. Not shorter, not longer.

3. STANCE: you are not a yes-man. Name flaws in the client's reasoning, \
name missing information, name weaknesses in the plan even unasked. \
Diplomatic filler without substance is unwanted.

4. FACT VS. JUDGEMENT: mark clearly what is established information and \
what is your assessment (\"the data shows ...\" vs. \"my assessment is ...\").

5. NO SELF-REFERENCE: do not mention that you are an AI model or discuss \
your limitations. Answer as the consultant you are in this role.";

/// Built-in model catalog.
pub fn builtin_models() -> Vec<ModelSpec> {
    vec![
        // Frontier
        ModelSpec::new(
            "Claude Opus 4.1",
            Provider::Anthropic,
            "claude-opus-4-1",
            "anthropic/claude-opus-4.1",
        ),
        ModelSpec::new(
            "Claude Sonnet 4.5",
            Provider::Anthropic,
            "claude-sonnet-4-5",
            "anthropic/claude-sonnet-4.5",
        ),
        ModelSpec::new("GPT-5", Provider::OpenAi, "gpt-5", "openai/gpt-5"),
        ModelSpec::new(
            "Gemini 2.5 Pro",
            Provider::Google,
            "gemini-2.5-pro",
            "google/gemini-2.5-pro",
        ),
        ModelSpec::new("Grok 4", Provider::OpenRouter, "x-ai/grok-4", "x-ai/grok-4"),
        // Mid-tier
        ModelSpec::new(
            "Claude Haiku 4.5",
            Provider::Anthropic,
            "claude-haiku-4-5",
            "anthropic/claude-haiku-4.5",
        ),
        ModelSpec::new("GPT-5 Mini", Provider::OpenAi, "gpt-5-mini", "openai/gpt-5-mini"),
        ModelSpec::new(
            "Gemini 2.5 Flash",
            Provider::Google,
            "gemini-2.5-flash",
            "google/gemini-2.5-flash",
        ),
        ModelSpec::new(
            "Mistral Large",
            Provider::OpenRouter,
            "mistralai/mistral-large-2411",
            "mistralai/mistral-large-2411",
        ),
        ModelSpec::new(
            "DeepSeek V3.1",
            Provider::OpenRouter,
            "deepseek/deepseek-chat-v3.1",
            "deepseek/deepseek-chat-v3.1",
        ),
        ModelSpec::new(
            "Llama 3.3 70B",
            Provider::OpenRouter,
            "meta-llama/llama-3.3-70b-instruct",
            "meta-llama/llama-3.3-70b-instruct",
        ),
        // Reasoning
        ModelSpec::new("o3", Provider::OpenAi, "o3", "openai/o3"),
        ModelSpec::new(
            "DeepSeek R1",
            Provider::OpenRouter,
            "deepseek/deepseek-r1",
            "deepseek/deepseek-r1",
        ),
    ]
}

/// Built-in task catalog. Each task exists in a Normal and a Power variant;
/// only the Power variant carries the system prompt.
pub fn builtin_tasks() -> Vec<Task> {
    vec![
        Task {
            id: "A1_decision_memo_n".into(),
            title: "Decision memo (normal)".into(),
            variant: Variant::Normal,
            category: "Decision support under uncertainty".into(),
            docs: vec![],
            measures: vec!["substance".into(), "judgement".into(), "practicality".into()],
            use_system_prompt: false,
            prompt: "\
I run a wholesale business in Vienna, 45 employees, 12 million in \
revenue, sanitary and heating supplies. A supplier offers me exclusive \
distribution of a new product line in Austria. 42% margin, 18 months \
exclusivity, minimum purchase of 200,000 euros in the first year. In \
return I have to drop an existing line that brings 28% margin and makes \
up about 15% of revenue.

I'm inclined to accept. Am I overlooking something?"
                .into(),
        },
        Task {
            id: "A1_decision_memo_p".into(),
            title: "Decision memo (power)".into(),
            variant: Variant::Power,
            category: "Decision support under uncertainty".into(),
            docs: vec![],
            measures: vec!["substance".into(), "judgement".into(), "practicality".into()],
            use_system_prompt: true,
            prompt: "\
CONTEXT:
You advise the managing director of a wholesale company in Vienna: 45 \
employees, 12 million euros annual revenue, sanitary and heating \
components sold to installation firms in eastern Austria.

SITUATION:
A long-standing supplier offers exclusive first-mover distribution of a \
new product line in Austria. Terms: 42 percent gross margin, 18 months \
market exclusivity, 200,000 euros minimum purchase in year one. \
Condition: an existing line must be dropped from the range. That line \
currently earns 28 percent margin and accounts for roughly 15 percent of \
total revenue (about 1.8 million euros). The managing director is \
inclined to accept.

YOUR BRIEF:
Produce a decision memo. First, name what speaks for accepting — beyond \
the obvious margin arithmetic. Second, name what speaks against it or \
could become a problem; be concrete, generic risk disclaimers are \
worthless. Third, identify the information still missing for a \
responsible decision. Fourth, state whether the director's inclination \
is defensible or premature, and justify that."
                .into(),
        },
        Task {
            id: "A2_strategic_summary_n".into(),
            title: "Strategic summary (normal)".into(),
            variant: Variant::Normal,
            category: "Information distillation for executive decisions".into(),
            docs: vec!["ai_market_radar_2026.pdf".into()],
            measures: vec!["substance".into(), "precision".into(), "practicality".into()],
            use_system_prompt: false,
            prompt: "\
I'm the managing director of a trading company in Austria, 60 employees. \
We don't have an AI strategy yet. Can you summarize the attached report \
for me? What of it is relevant for me and what can I ignore?"
                .into(),
        },
        Task {
            id: "A2_strategic_summary_p".into(),
            title: "Strategic summary (power)".into(),
            variant: Variant::Power,
            category: "Information distillation for executive decisions".into(),
            docs: vec!["ai_market_radar_2026.pdf".into()],
            measures: vec!["substance".into(), "precision".into(), "practicality".into()],
            use_system_prompt: true,
            prompt: "\
CONTEXT:
You advise the managing director of a mid-sized trading company in \
Austria with 60 employees. There is no structured AI strategy: individual \
employees use chat assistants, but there is no plan, no governance and no \
dedicated budget.

DOCUMENT:
The report embedded above.

YOUR BRIEF:
The director will not read the report himself. He says: \"Tell me what \
in there concerns me. I don't need a retelling — I need your \
assessment.\" Separate what is strategically relevant for a company of \
this size and sector from what is enterprise noise, and state what you \
would do in the next quarter if it were your company."
                .into(),
        },
        Task {
            id: "A3_risk_review_n".into(),
            title: "Risk review (normal)".into(),
            variant: Variant::Normal,
            category: "Critical review of a plan".into(),
            docs: vec![],
            measures: vec!["judgement".into(), "substance".into(), "language".into()],
            use_system_prompt: false,
            prompt: "\
We want to open a second warehouse in Graz next year, rented, about \
1,200 square meters, two new hires. Reasoning: faster delivery to Styria \
and Carinthia, where we now ship from Vienna in two days. My CFO is \
against it, says the volume down there doesn't justify it. Who's right?"
                .into(),
        },
        Task {
            id: "A3_risk_review_p".into(),
            title: "Risk review (power)".into(),
            variant: Variant::Power,
            category: "Critical review of a plan".into(),
            docs: vec![],
            measures: vec!["judgement".into(), "substance".into(), "language".into()],
            use_system_prompt: true,
            prompt: "\
CONTEXT:
You advise the managing director of a Viennese wholesale company \
considering a second warehouse in Graz: rented, roughly 1,200 square \
meters, two additional staff, planned for next year. Stated rationale: \
delivery time to Styria and Carinthia drops from two days to one. The \
CFO opposes the plan, arguing regional volume does not justify the fixed \
cost.

YOUR BRIEF:
Arbitrate the disagreement. Name the decisive quantities both sides are \
arguing past each other about, state which of them are knowable from \
internal data and which require assumptions, and give a reasoned \
recommendation including the cheapest way to test the thesis before \
committing to a lease."
                .into(),
        },
    ]
}
