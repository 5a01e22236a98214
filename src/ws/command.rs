//! Classification of inbound text frames.
//!
//! The wire format stays opaque UTF-8. A leading slash command selects an
//! augmentation; everything else is a chat message.

/// Prefix requesting an opening question for a debate topic.
pub const TOPIC_COMMAND: &str = "/topic";
/// Prefix requesting a bullet-point summary of the given text.
pub const SUMMARIZE_COMMAND: &str = "/summarize";

/// What a text frame asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Broadcast as a chat message.
    Chat(String),
    /// Generate and broadcast an opening question.
    Topic(String),
    /// Summarize and broadcast.
    Summarize(String),
    /// A known command without an argument.
    MissingArgument(&'static str),
    /// Whitespace only; ignored.
    Blank,
}

impl Inbound {
    /// Classifies one text frame.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::Blank;
        }
        for (command, build) in [
            (TOPIC_COMMAND, Self::Topic as fn(String) -> Self),
            (SUMMARIZE_COMMAND, Self::Summarize),
        ] {
            if let Some(rest) = strip_command(trimmed, command) {
                let arg = rest.trim();
                return if arg.is_empty() {
                    Self::MissingArgument(command)
                } else {
                    build(arg.to_string())
                };
            }
        }
        Self::Chat(text.to_string())
    }
}

/// Matches `command` only as a whole word.
fn strip_command<'a>(text: &'a str, command: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(command)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
}
