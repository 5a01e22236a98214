//! Two-stage content moderation.
//!
//! Stage one is a deterministic, case-insensitive substring blocklist. Only
//! text that passes it reaches stage two, the external classifier. Whether
//! the classifier is absent or failing, the gate degrades to blocklist-only
//! and lets the text through (fail-open). A fail-closed mode can be opted
//! into for runtime classifier errors.

use crate::llm::{Capability, CapabilityError, GenerationRequest};

/// Prohibited terms and phrases, matched as lower-case substrings.
pub const BLOCKLIST: &[&str] = &[
    "n-word",
    "k-word",
    "racial slur",
    "kill all",
    "death to",
    "genocide",
    "mass shooting",
    "white supremacy",
    "nazi",
    "holocaust denial",
];

/// Reason attached to blocklist rejections.
pub const BLOCKLIST_REASON: &str = "Content contains prohibited terms.";

/// Reason used when the classifier says `UNSAFE` without a reason line.
pub const CLASSIFIER_FALLBACK_REASON: &str = "Content flagged by AI.";

/// Reason used by [`FailurePolicy::Closed`] when the classifier errors.
pub const FAIL_CLOSED_REASON: &str = "Moderation temporarily unavailable.";

/// Verdict for one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationResult {
    /// The text may be broadcast.
    Safe,
    /// The text must not be broadcast.
    Unsafe {
        /// Human-readable reason, sent privately to the author.
        reason: String,
    },
}

impl ModerationResult {
    fn unsafe_because(reason: impl Into<String>) -> Self {
        Self::Unsafe {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`ModerationResult::Safe`].
    #[must_use]
    pub const fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    /// Rejection reason, empty when safe.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Safe => "",
            Self::Unsafe { reason } => reason,
        }
    }

}

/// What to do when the classifier is configured but fails at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Treat the text as safe (blocklist-only moderation).
    #[default]
    Open,
    /// Reject the text.
    Closed,
}

/// Stage one: blocklist lookup. Pure.
#[must_use]
pub fn check_blocklist(text: &str) -> ModerationResult {
    let lowered = text.to_lowercase();
    if BLOCKLIST.iter().any(|term| lowered.contains(term)) {
        ModerationResult::unsafe_because(BLOCKLIST_REASON)
    } else {
        ModerationResult::Safe
    }
}

/// Interprets a classifier reply.
///
/// `UNSAFE` as the first token (any case, trailing punctuation ignored)
/// means unsafe, with the next non-blank line as reason. Anything else,
/// including unparseable output, is safe.
#[must_use]
pub fn parse_verdict(response: &str) -> ModerationResult {
    let trimmed = response.trim();
    let first_token = trimmed
        .split_whitespace()
        .next()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .unwrap_or_default();
    if !first_token.eq_ignore_ascii_case("UNSAFE") {
        return ModerationResult::Safe;
    }
    let reason = trimmed
        .lines()
        .skip(1)
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(CLASSIFIER_FALLBACK_REASON);
    ModerationResult::unsafe_because(reason)
}

fn classifier_prompt(text: &str) -> String {
    format!(
        "You are a content moderator. Analyze this text:\n\"{text}\"\n\n\
         Flag as UNSAFE if it contains hate speech, violence, discrimination, or illegal activity.\n\
         Respond with ONLY: SAFE or UNSAFE\n\
         If UNSAFE, add a brief reason on the next line."
    )
}

/// Safety check applied to every inbound message. Holds no mutable state.
#[derive(Debug, Clone, Default)]
pub struct ModerationGate {
    classifier: Capability,
    policy: FailurePolicy,
}

impl ModerationGate {
    /// Creates a gate using `classifier` for stage two.
    #[must_use]
    pub const fn new(classifier: Capability, policy: FailurePolicy) -> Self {
        Self { classifier, policy }
    }

    /// A gate that only runs the blocklist.
    #[must_use]
    pub fn blocklist_only() -> Self {
        Self::default()
    }

    /// Returns `true` if a classifier backend is configured.
    #[must_use]
    pub const fn has_classifier(&self) -> bool {
        self.classifier.is_configured()
    }

    /// Moderates `text`.
    pub async fn moderate(&self, text: &str) -> ModerationResult {
        let verdict = check_blocklist(text);
        if !verdict.is_safe() {
            tracing::debug!("blocklist rejected message");
            return verdict;
        }

        let request = GenerationRequest::text(classifier_prompt(text)).low_effort();
        match self.classifier.generate(&request).await {
            Ok(response) => parse_verdict(&response),
            Err(CapabilityError::Unavailable) => ModerationResult::Safe,
            Err(e) => match self.policy {
                FailurePolicy::Open => {
                    tracing::warn!(error = %e, "classifier failed, falling back to blocklist only");
                    ModerationResult::Safe
                }
                FailurePolicy::Closed => {
                    tracing::warn!(error = %e, "classifier failed, rejecting message");
                    ModerationResult::unsafe_because(FAIL_CLOSED_REASON)
                }
            },
        }
    }
}
