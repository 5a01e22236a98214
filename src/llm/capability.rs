//! The external text-generation boundary.
//!
//! Every AI-backed feature goes through a [`Capability`]. A capability may
//! be absent (no API key configured), in which case every call returns
//! [`CapabilityError::Unavailable`] and callers pattern-match into their
//! fallback exactly as they do for runtime failures.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// Failure of a generation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// No generation backend is configured.
    #[error("generation capability not configured")]
    Unavailable,

    /// The request could not be sent or timed out.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("api error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The backend answered but the payload could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Effort hint forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effort {
    /// Fast, shallow reasoning. Used for every chat-path call.
    Low,
    /// Backend default.
    #[default]
    Standard,
}

/// Binary audio attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInput {
    /// Raw encoded audio.
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `audio/webm`.
    pub mime_type: String,
}

/// One generation call: a prompt, optional audio and an effort hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Instruction text.
    pub prompt: String,
    /// Optional audio part, sent before the prompt.
    pub audio: Option<AudioInput>,
    /// Effort hint.
    pub effort: Effort,
}

impl GenerationRequest {
    /// A text-only request with the default effort.
    #[must_use]
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            audio: None,
            effort: Effort::Standard,
        }
    }

    /// Attaches an audio part.
    #[must_use]
    pub fn with_audio(mut self, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.audio = Some(AudioInput {
            bytes,
            mime_type: mime_type.into(),
        });
        self
    }

    /// Requests the low-effort mode.
    #[must_use]
    pub const fn low_effort(mut self) -> Self {
        self.effort = Effort::Low;
        self
    }
}

/// A backend able to turn a prompt into text.
#[async_trait]
pub trait Generator: Send + Sync + fmt::Debug {
    /// Runs one generation call.
    ///
    /// # Errors
    ///
    /// Returns a [`CapabilityError`] describing why no text was produced.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError>;
}

/// Optional generation backend shared by the moderation gate and the
/// augmenter. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Capability {
    backend: Option<Arc<dyn Generator>>,
}

impl Capability {
    /// A capability with no backend.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Wraps a configured backend.
    #[must_use]
    pub fn new(backend: Arc<dyn Generator>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Returns `true` when a backend is present.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Forwards to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Unavailable`] without a backend, or the
    /// backend's own error.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        match &self.backend {
            Some(backend) => backend.generate(request).await,
            None => Err(CapabilityError::Unavailable),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::llm::fake::ScriptedGenerator;

    #[tokio::test]
    async fn absent_backend_is_unavailable() {
        let cap = Capability::none();
        assert!(!cap.is_configured());
        let result = cap.generate(&GenerationRequest::text("hi")).await;
        assert_eq!(result, Err(CapabilityError::Unavailable));
    }

    #[tokio::test]
    async fn configured_backend_is_called() {
        let backend = Arc::new(ScriptedGenerator::replying("pong"));
        let cap = Capability::new(Arc::clone(&backend) as Arc<dyn Generator>);
        let result = cap.generate(&GenerationRequest::text("ping")).await;
        assert_eq!(result, Ok("pong".to_string()));
        assert_eq!(backend.prompts(), vec!["ping".to_string()]);
    }

    #[test]
    fn builder_sets_audio_and_effort() {
        let req = GenerationRequest::text("t")
            .with_audio(vec![1, 2, 3], "audio/wav")
            .low_effort();
        assert_eq!(req.effort, Effort::Low);
        let Some(audio) = req.audio else {
            panic!("audio missing");
        };
        assert_eq!(audio.mime_type, "audio/wav");
        assert_eq!(audio.bytes, vec![1, 2, 3]);
    }
}
