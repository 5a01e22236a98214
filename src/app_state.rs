//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::ChatConfig;
use crate::domain::{ConnectionRegistry, SharedRegistry};
use crate::error::ChatError;
use crate::llm::{Capability, GeminiClient};
use crate::service::{Augmenter, ModerationGate};

/// Per-session tunables copied out of [`ChatConfig`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Bounded outbound queue size per connection.
    pub outbound_queue_capacity: usize,
    /// MIME type assumed for binary frames.
    pub default_audio_mime: String,
}

impl From<&ChatConfig> for SessionSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            outbound_queue_capacity: config.outbound_queue_capacity,
            default_audio_mime: config.default_audio_mime.clone(),
        }
    }
}

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live connections.
    pub registry: SharedRegistry,
    /// Safety check for every inbound message.
    pub gate: ModerationGate,
    /// Summaries, transcripts and opening questions.
    pub augmenter: Augmenter,
    /// Per-session tunables.
    pub settings: SessionSettings,
}

impl AppState {
    /// Assembles state around an existing capability.
    #[must_use]
    pub fn new(capability: Capability, config: &ChatConfig) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            gate: ModerationGate::new(capability.clone(), config.failure_policy()),
            augmenter: Augmenter::new(capability),
            settings: SessionSettings::from(config),
        }
    }

    /// Assembles state from configuration, building the Gemini client when
    /// an API key is present.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Capability`] if the HTTP client cannot be built.
    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        let capability = match config.gemini() {
            Some(gemini) => Capability::new(Arc::new(GeminiClient::new(&gemini)?)),
            None => {
                tracing::warn!("GEMINI_API_KEY not set, using blocklist-only moderation");
                Capability::none()
            }
        };
        Ok(Self::new(capability, config))
    }
}
