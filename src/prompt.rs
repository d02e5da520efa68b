//! Prompt construction from the dialogue history.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of most recent turns carried into a new prompt.
pub const HISTORY_WINDOW: usize = 5;

pub const FORMATTING_INSTRUCTIONS: &str = "\
Please format your response with <think> tags for your thinking process and <output> tags for the final response. \
If you need to include any chart, please use Mermaid syntax within <mermaid> tags or a ```mermaid fenced block.

Example format:
<think>
Here's my thinking process...
</think>
<output>
Here's my final response...
(Can include mermaid diagrams like this:)
<mermaid>
graph TD
    A-->B
</mermaid>
</output>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry of the dialogue history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Older turns beyond [`HISTORY_WINDOW`] are dropped.
pub fn build_prompt(history: &[ConversationTurn], user_text: &str) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let history_text = history[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Previous conversation:\n{history_text}\n\n{FORMATTING_INSTRUCTIONS}\n\nUser: {user_text}"
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{build_prompt, ConversationTurn, Role, FORMATTING_INSTRUCTIONS};

    #[test]
    fn only_last_five_turns_are_kept() {
        let history: Vec<_> = (0..7)
            .map(|index| {
                if index % 2 == 0 {
                    ConversationTurn::user(format!("q{index}"))
                } else {
                    ConversationTurn::assistant(format!("a{index}"))
                }
            })
            .collect();

        let prompt = build_prompt(&history, "next");
        assert!(prompt.starts_with("Previous conversation:\nuser: q2\nassistant: a3\n"));
        assert!(!prompt.contains("q0"));
        assert!(!prompt.contains("a1"));
        assert!(prompt.contains("user: q6\n\n"));
        assert!(prompt.ends_with("\n\nUser: next"));
    }

    #[test]
    fn empty_history_still_carries_instructions() {
        assert_eq!(
            build_prompt(&[], "hi"),
            format!("Previous conversation:\n\n\n{FORMATTING_INSTRUCTIONS}\n\nUser: hi")
        );
        assert!(FORMATTING_INSTRUCTIONS.contains("<think>"));
        assert!(FORMATTING_INSTRUCTIONS.contains("<output>"));
        assert!(FORMATTING_INSTRUCTIONS.contains("<mermaid>"));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ConversationTurn::assistant("x")).expect("serialize");
        assert_eq!(json, "{\"role\":\"assistant\",\"content\":\"x\"}");
        assert_eq!(Role::User.to_string(), "user");
    }
}
