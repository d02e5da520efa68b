use serde::{Deserialize, Serialize};

/// Stream event emitted by the NDJSON parser after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerateStreamEvent {
    /// One `response` text fragment, possibly empty.
    Fragment { text: String },
    /// The service marked the generation as complete.
    Done { done_reason: Option<String> },
    /// The service reported a failure inside the stream body.
    Error { message: String },
}

impl GenerateStreamEvent {
    /// Returns the fragment text when this event carries one.
    pub fn fragment(&self) -> Option<&str> {
        match self {
            Self::Fragment { text } => Some(text),
            _ => None,
        }
    }
}
