//! Provider adapters: one request/response mapping per backend.
//!
//! Every adapter satisfies the same contract: given a resolved target and
//! the rendered user content, return either a [`Completion`] or a
//! classified [`CallError`]. A non-2xx HTTP status is always surfaced as
//! `CallError::Http` — never a panic — so the dispatch core treats
//! "didn't complete" uniformly across vendors. Retry/backoff is layered
//! outside, in [`crate::retry`].

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::catalog::{Provider, SYSTEM_PROMPT};
use crate::config::BenchConfig;
use crate::error::{CallError, REQUEST_TIMEOUT_SECS};
use crate::resolve::ResolvedTarget;

/// Successful adapter payload.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Raw wire JSON body, kept for the audit archive.
    pub raw_json: String,
}

/// Uniform call contract over the four wire formats.
///
/// The seam the integration tests stub: the dispatch core only ever talks
/// to this trait.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        target: &ResolvedTarget,
        content: &str,
        use_system: bool,
    ) -> Result<Completion, CallError>;
}

/// Real HTTP backend over a shared connection pool.
pub struct HttpBackend {
    client: reqwest::Client,
    temperature: f64,
    max_tokens: u32,
}

impl HttpBackend {
    /// Build the shared client with the per-request call bound.
    pub fn new(cfg: &BenchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            // Builder only fails on TLS backend misconfiguration, which is
            // a process-level setup error, not a per-unit failure.
            .unwrap_or_default();
        Self {
            client,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }

    async fn call_anthropic(
        &self,
        target: &ResolvedTarget,
        content: &str,
        use_system: bool,
    ) -> Result<Completion, CallError> {
        let mut payload = json!({
            "model": target.model_id,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": content}],
        });
        if use_system {
            payload["system"] = json!(SYSTEM_PROMPT);
        }

        let resp = self
            .client
            .post(Provider::Anthropic.endpoint())
            .header("x-api-key", &target.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await?;
        let (status, body) = split_response(resp).await?;
        if !(200..300).contains(&status) {
            return Err(CallError::http(status, &body));
        }

        let data: Value = parse_body(status, &body)?;
        let mut text = String::new();
        for block in data["content"].as_array().unwrap_or(&vec![]) {
            if block["type"] == "text" {
                text.push_str(block["text"].as_str().unwrap_or_default());
            }
        }
        Ok(Completion {
            text,
            input_tokens: data["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: data["usage"]["output_tokens"].as_u64().unwrap_or(0),
            raw_json: body,
        })
    }

    /// OpenAI Chat Completions; also serves OpenRouter, which speaks the
    /// same schema with two extra attribution headers.
    async fn call_openai_compatible(
        &self,
        target: &ResolvedTarget,
        content: &str,
        use_system: bool,
    ) -> Result<Completion, CallError> {
        let mut messages = Vec::with_capacity(2);
        if use_system {
            messages.push(json!({"role": "system", "content": SYSTEM_PROMPT}));
        }
        messages.push(json!({"role": "user", "content": content}));
        let payload = json!({
            "model": target.model_id,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": messages,
        });

        let mut req = self
            .client
            .post(target.provider.endpoint())
            .bearer_auth(&target.api_key)
            .json(&payload);
        if target.provider == Provider::OpenRouter {
            req = req
                .header("HTTP-Referer", "https://github.com/stratbench")
                .header("X-Title", "stratbench");
        }

        let resp = req.send().await?;
        let (status, body) = split_response(resp).await?;
        if !(200..300).contains(&status) {
            return Err(CallError::http(status, &body));
        }

        let data: Value = parse_body(status, &body)?;
        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(Completion {
            text,
            input_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            output_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            raw_json: body,
        })
    }

    async fn call_google(
        &self,
        target: &ResolvedTarget,
        content: &str,
        use_system: bool,
    ) -> Result<Completion, CallError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            Provider::Google.endpoint(),
            target.model_id,
            target.api_key
        );
        let mut payload = json!({
            "contents": [{"parts": [{"text": content}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        });
        if use_system {
            payload["systemInstruction"] = json!({"parts": [{"text": SYSTEM_PROMPT}]});
        }

        let resp = self.client.post(&url).json(&payload).send().await?;
        let (status, body) = split_response(resp).await?;
        if !(200..300).contains(&status) {
            return Err(CallError::http(status, &body));
        }

        let data: Value = parse_body(status, &body)?;
        let mut text = String::new();
        for candidate in data["candidates"].as_array().unwrap_or(&vec![]) {
            for part in candidate["content"]["parts"].as_array().unwrap_or(&vec![]) {
                text.push_str(part["text"].as_str().unwrap_or_default());
            }
        }
        Ok(Completion {
            text,
            input_tokens: data["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0),
            output_tokens: data["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0),
            raw_json: body,
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(
        &self,
        target: &ResolvedTarget,
        content: &str,
        use_system: bool,
    ) -> Result<Completion, CallError> {
        match target.provider {
            Provider::Anthropic => self.call_anthropic(target, content, use_system).await,
            Provider::OpenAi | Provider::OpenRouter => {
                self.call_openai_compatible(target, content, use_system).await
            }
            Provider::Google => self.call_google(target, content, use_system).await,
        }
    }
}

/// Read out status and body; body read failures are connection-level.
async fn split_response(resp: reqwest::Response) -> Result<(u16, String), CallError> {
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok((status, body))
}

/// Parse a 2xx body as JSON; a malformed success body is a permanent
/// provider error, not a transient one.
fn parse_body(status: u16, body: &str) -> Result<Value, CallError> {
    serde_json::from_str(body).map_err(|e| CallError::Http {
        status,
        body: format!("unparseable response body: {e}"),
    })
}
