//! Backend configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). A missing `GEMINI_API_KEY` is not an
//! error; it leaves the generation capability unconfigured.

use std::net::SocketAddr;
use std::time::Duration;

use crate::llm::GeminiConfig;
use crate::service::FailurePolicy;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
/// Default Gemini API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level backend configuration.
///
/// Loaded once at startup via [`ChatConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8000`).
    pub listen_addr: SocketAddr,

    /// Gemini API key. `None` disables every AI feature.
    pub gemini_api_key: Option<String>,

    /// Gemini model id.
    pub gemini_model: String,

    /// Gemini API root.
    pub gemini_base_url: String,

    /// Per-call timeout for generation requests, in seconds.
    pub generation_timeout_secs: u64,

    /// Bounded outbound queue size per connection.
    pub outbound_queue_capacity: usize,

    /// Reject messages when the classifier errors instead of allowing them.
    pub moderation_fail_closed: bool,

    /// MIME type assumed for binary (audio) frames.
    pub default_audio_mime: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            generation_timeout_secs: 30,
            outbound_queue_capacity: 256,
            moderation_fail_closed: false,
            default_audio_mime: "audio/webm".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ChatConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr: SocketAddr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            gemini_api_key,
            gemini_model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            generation_timeout_secs: parse_env(
                "GENERATION_TIMEOUT_SECS",
                defaults.generation_timeout_secs,
            ),
            outbound_queue_capacity: parse_env(
                "OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            ),
            moderation_fail_closed: parse_env_bool(
                "MODERATION_FAIL_CLOSED",
                defaults.moderation_fail_closed,
            ),
            default_audio_mime: std::env::var("DEFAULT_AUDIO_MIME")
                .unwrap_or(defaults.default_audio_mime),
            log_format,
        })
    }

    /// Gemini settings, or `None` when no API key is configured.
    #[must_use]
    pub fn gemini(&self) -> Option<GeminiConfig> {
        self.gemini_api_key.as_ref().map(|api_key| GeminiConfig {
            api_key: api_key.clone(),
            model: self.gemini_model.clone(),
            base_url: self.gemini_base_url.clone(),
            timeout: Duration::from_secs(self.generation_timeout_secs),
        })
    }

    /// Classifier failure policy derived from `moderation_fail_closed`.
    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        if self.moderation_fail_closed {
            FailurePolicy::Closed
        } else {
            FailurePolicy::Open
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}
