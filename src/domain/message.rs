//! Outbound chat messages.
//!
//! A [`BroadcastMessage`] is rendered to its wire text exactly once, at
//! construction, and then shared by reference with every recipient. The
//! client protocol is plain UTF-8 text, so rendering is the whole codec.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::ConnectionId;

/// Who a broadcast originates from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A connected chat client.
    Client {
        /// Server-assigned connection id.
        id: ConnectionId,
        /// Client-chosen display name.
        name: String,
    },
    /// The server itself (REST-triggered announcements).
    Host,
}

impl Origin {
    /// Returns the connection id for client origins.
    #[must_use]
    pub const fn connection_id(&self) -> Option<ConnectionId> {
        match self {
            Self::Client { id, .. } => Some(*id),
            Self::Host => None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client { name, .. } => write!(f, "Client #{name}"),
            Self::Host => f.write_str("Moderator"),
        }
    }
}

/// What happened, independent of who receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// An accepted chat message.
    Said {
        /// Message body.
        text: String,
    },
    /// The sender disconnected.
    Left,
    /// Bullet-point summary of text submitted by the sender.
    Summary {
        /// Summary text or placeholder.
        summary: String,
    },
    /// Transcribed and summarized voice message.
    Voice {
        /// Transcript, empty when unavailable.
        transcript: String,
        /// Summary text or placeholder.
        summary: String,
    },
    /// Opening question generated for a debate topic.
    OpeningQuestion {
        /// Topic as submitted.
        topic: String,
        /// Generated or templated question.
        question: String,
    },
}

impl ChatEvent {
    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Said { .. } => "said",
            Self::Left => "left",
            Self::Summary { .. } => "summary",
            Self::Voice { .. } => "voice",
            Self::OpeningQuestion { .. } => "opening_question",
        }
    }
}

/// Immutable message fanned out to every registered connection.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    origin: Origin,
    event: ChatEvent,
    timestamp: DateTime<Utc>,
    text: Arc<str>,
}

impl BroadcastMessage {
    /// Builds and renders a broadcast.
    #[must_use]
    pub fn new(origin: Origin, event: ChatEvent) -> Self {
        let text: Arc<str> = Arc::from(render(&origin, &event));
        Self {
            origin,
            event,
            timestamp: Utc::now(),
            text,
        }
    }

    /// Origin of the message.
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Structured event.
    #[must_use]
    pub const fn event(&self) -> &ChatEvent {
        &self.event
    }

    /// Construction time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Rendered wire text, shared with every recipient.
    #[must_use]
    pub fn text(&self) -> &Arc<str> {
        &self.text
    }
}

fn render(origin: &Origin, event: &ChatEvent) -> String {
    match event {
        ChatEvent::Said { text } => format!("{origin} says: {text}"),
        ChatEvent::Left => format!("{origin} left the chat"),
        ChatEvent::Summary { summary } => format!("{origin} summary:\n{summary}"),
        ChatEvent::Voice {
            transcript,
            summary,
        } if transcript.is_empty() => format!("{origin} (voice) summary:\n{summary}"),
        ChatEvent::Voice {
            transcript,
            summary,
        } => format!("{origin} (voice): {transcript}\nSummary:\n{summary}"),
        ChatEvent::OpeningQuestion { topic, question } => {
            format!("{origin} opened the topic \"{topic}\": {question}")
        }
    }
}

/// Message addressed to a single connection only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateNotice {
    /// The sender's input failed moderation and was not broadcast.
    Rejected {
        /// Moderation reason.
        reason: String,
    },
    /// A command was sent without its argument.
    Usage {
        /// The command, e.g. `/topic`.
        command: &'static str,
    },
}

impl PrivateNotice {
    /// Renders the notice to wire text.
    #[must_use]
    pub fn render(&self) -> Arc<str> {
        match self {
            Self::Rejected { reason } => Arc::from(format!("Message not delivered: {reason}")),
            Self::Usage { command } => Arc::from(format!("Usage: {command} <text>")),
        }
    }
}
