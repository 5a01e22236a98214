//! AI-generated derived content: summaries, transcripts and opening
//! questions.
//!
//! Every operation returns plain values and never an error. Capability
//! failures are matched into a fallback at each call site so a failed
//! summary can never end a chat session.

use crate::llm::{Capability, CapabilityError, GenerationRequest};

/// Marker preceding the transcript in transcription replies.
pub const TRANSCRIPT_MARKER: &str = "TRANSCRIPT:";
/// Marker preceding the summary in transcription replies.
pub const SUMMARY_MARKER: &str = "SUMMARY:";
/// Summary placeholder when audio arrives but no capability is configured.
pub const AUDIO_UNAVAILABLE: &str = "Audio processing unavailable.";

/// Longest text echoed back as its own "summary" without a capability.
const OFFLINE_SUMMARY_CHARS: usize = 100;

/// One-shot augmentation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AugmentationRequest {
    /// Bullet-point summary of free text.
    TextSummary {
        /// Text to summarize.
        text: String,
    },
    /// Transcription plus summary of an audio clip.
    AudioTranscribe {
        /// Encoded audio.
        audio: Vec<u8>,
        /// Audio MIME type.
        mime_type: String,
    },
    /// Neutral opening question for a debate topic.
    OpeningQuestion {
        /// Debate topic.
        topic: String,
    },
}

/// Result paired with its [`AugmentationRequest`] variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AugmentationResult {
    /// Summary text or placeholder.
    TextSummary(String),
    /// Transcript (possibly empty) and summary.
    AudioTranscribe {
        /// Transcript, empty when unavailable.
        transcript: String,
        /// Summary text or placeholder.
        summary: String,
    },
    /// Question text.
    OpeningQuestion(String),
}

/// Stateless front-end to the generation capability.
#[derive(Debug, Clone, Default)]
pub struct Augmenter {
    capability: Capability,
}

impl Augmenter {
    /// Creates an augmenter over `capability`.
    #[must_use]
    pub const fn new(capability: Capability) -> Self {
        Self { capability }
    }

    /// Runs any [`AugmentationRequest`].
    pub async fn run(&self, request: AugmentationRequest) -> AugmentationResult {
        match request {
            AugmentationRequest::TextSummary { text } => {
                AugmentationResult::TextSummary(self.summarize(&text).await)
            }
            AugmentationRequest::AudioTranscribe { audio, mime_type } => {
                let (transcript, summary) =
                    self.transcribe_and_summarize(audio, &mime_type).await;
                AugmentationResult::AudioTranscribe {
                    transcript,
                    summary,
                }
            }
            AugmentationRequest::OpeningQuestion { topic } => {
                AugmentationResult::OpeningQuestion(self.opening_question(&topic).await)
            }
        }
    }

    /// Summarizes `text` into a few short bullet points.
    pub async fn summarize(&self, text: &str) -> String {
        let prompt = format!(
            "Summarize this into 2-3 bullet points (under 15 words each):\n\"{text}\"\n\
             Return only bullet points."
        );
        let request = GenerationRequest::text(prompt).low_effort();
        match self.capability.generate(&request).await {
            Ok(summary) => summary.trim().to_string(),
            Err(CapabilityError::Unavailable) => offline_summary(text),
            Err(e) => {
                tracing::warn!(error = %e, "summary generation failed");
                format!("Summary unavailable: {e}")
            }
        }
    }

    /// Transcribes `audio` and summarizes it in one call.
    ///
    /// Returns `(transcript, summary)`. Without both markers in the reply
    /// the whole reply is the summary and the transcript is empty.
    pub async fn transcribe_and_summarize(
        &self,
        audio: Vec<u8>,
        mime_type: &str,
    ) -> (String, String) {
        let prompt = format!(
            "Transcribe this audio, then summarize in 2-3 bullet points. Format:\n\
             {TRANSCRIPT_MARKER} [text]\n{SUMMARY_MARKER}\n\u{2022} [point 1]\n\u{2022} [point 2]"
        );
        let request = GenerationRequest::text(prompt)
            .with_audio(audio, mime_type)
            .low_effort();
        match self.capability.generate(&request).await {
            Ok(reply) => split_transcript(&reply),
            Err(CapabilityError::Unavailable) => (String::new(), AUDIO_UNAVAILABLE.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, mime_type, "audio processing failed");
                (String::new(), format!("Error: {e}"))
            }
        }
    }

    /// Produces a neutral, perspective-inviting question about `topic`.
    pub async fn opening_question(&self, topic: &str) -> String {
        let prompt = format!(
            "Generate a thought-provoking opening question for this debate topic:\n\"{topic}\"\n\
             Be neutral, invite multiple perspectives, under 20 words. Return only the question."
        );
        let request = GenerationRequest::text(prompt).low_effort();
        match self.capability.generate(&request).await {
            Ok(question) if !question.trim().is_empty() => question.trim().to_string(),
            Ok(_) | Err(CapabilityError::Unavailable) => fallback_question(topic),
            Err(e) => {
                tracing::warn!(error = %e, "opening question generation failed");
                fallback_question(topic)
            }
        }
    }
}

/// Splits a transcription reply on its markers.
///
/// The summary is everything after the first `SUMMARY:` marker, including
/// any later repetition of the marker, so no bullet is ever dropped.
#[must_use]
pub fn split_transcript(reply: &str) -> (String, String) {
    let reply = reply.trim();
    if !(reply.contains(TRANSCRIPT_MARKER) && reply.contains(SUMMARY_MARKER)) {
        return (String::new(), reply.to_string());
    }
    match reply.split_once(SUMMARY_MARKER) {
        Some((head, tail)) => (
            head.replace(TRANSCRIPT_MARKER, "").trim().to_string(),
            tail.trim().to_string(),
        ),
        None => (String::new(), reply.to_string()),
    }
}

/// Templated question used whenever generation is unavailable.
#[must_use]
pub fn fallback_question(topic: &str) -> String {
    format!("What are your thoughts on: {topic}?")
}

fn offline_summary(text: &str) -> String {
    if text.chars().count() > OFFLINE_SUMMARY_CHARS {
        let head: String = text.chars().take(OFFLINE_SUMMARY_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
