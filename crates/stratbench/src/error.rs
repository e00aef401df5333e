//! Provider call error taxonomy with transient/permanent classification.
//!
//! Every failure mode of a single benchmark request is represented here.
//! The retry wrapper and dispatch core query `is_transient()` instead of
//! string-matching on error text — classification happens exactly once,
//! at the adapter boundary.
//!
//! | Variant            | Retried | Typical cause                          |
//! |--------------------|---------|----------------------------------------|
//! | `Http` (429/5xx)   | yes     | rate limit, overload, unavailable      |
//! | `Http` (other 4xx) | no      | bad request, auth failure, bad model   |
//! | `Network`          | yes     | connection reset, broken pipe          |
//! | `Timeout`          | no      | 300 s call bound elapsed               |
//! | `MissingCredential`| no      | no key for the resolved provider       |

use thiserror::Error;

use crate::catalog::Provider;

/// Total seconds a single provider call may take before it is abandoned.
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Maximum number of error-body characters carried into diagnostics.
const MAX_BODY_CHARS: usize = 500;

/// A failed provider call, classified at the adapter boundary.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Non-2xx HTTP status with a truncated response body for diagnosis.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The per-call time bound elapsed. Never retried by the wrapper —
    /// a fresh attempt would have to be a new unit of work.
    #[error("Timeout ({secs}s)")]
    Timeout { secs: u64 },

    /// Connection-level failure below the HTTP layer.
    #[error("network error: {0}")]
    Network(String),

    /// No credential resolvable for the provider; no network call was made.
    #[error("no API key for provider '{0}'")]
    MissingCredential(Provider),
}

impl CallError {
    /// Build an `Http` error from a status and raw body, truncating the body.
    pub fn http(status: u16, body: &str) -> Self {
        Self::Http {
            status,
            body: truncate_chars(body, MAX_BODY_CHARS),
        }
    }

    /// Whether the retry wrapper may re-attempt after this error.
    ///
    /// Only rate-limit/overload/unavailable statuses and connection-level
    /// failures qualify. Timeouts and permanent rejections never do.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 529),
            Self::Network(_) => true,
            Self::Timeout { .. } | Self::MissingCredential(_) => false,
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                secs: REQUEST_TIMEOUT_SECS,
            }
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Truncate on a char boundary so multi-byte provider error bodies
/// (the upstream payloads are not ASCII-only) cannot split a code point.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
