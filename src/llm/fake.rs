//! Scripted in-memory [`Generator`] for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CapabilityError, GenerationRequest, Generator};

/// Replies with a fixed outcome and records every request it sees.
#[derive(Debug)]
pub(crate) struct ScriptedGenerator {
    outcome: Result<String, CapabilityError>,
    delay: Option<Duration>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            delay: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(error: CapabilityError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Waits `delay` before every reply.
    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
