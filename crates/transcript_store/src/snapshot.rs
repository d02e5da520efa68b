use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stream_formatter::ConversationTurn;
use tracing::info;

use crate::error::TranscriptError;

/// Saved conversation: the selected model plus the full turn history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub model: String,
    pub history: Vec<ConversationTurn>,
}

impl ConversationSnapshot {
    pub fn new(model: impl Into<String>, history: Vec<ConversationTurn>) -> Self {
        Self {
            model: model.into(),
            history,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), TranscriptError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| TranscriptError::io("creating snapshot directory", parent, source))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|source| TranscriptError::json_serialize(path, source))?;
        fs::write(path, json)
            .map_err(|source| TranscriptError::io("writing conversation", path, source))?;

        info!(path = %path.display(), turns = self.history.len(), "conversation saved");
        Ok(())
    }

    /// Roles other than `user` and `assistant` are rejected by the parser.
    pub fn load(path: &Path) -> Result<Self, TranscriptError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| TranscriptError::io("reading conversation", path, source))?;
        let snapshot: Self = serde_json::from_str(&raw)
            .map_err(|source| TranscriptError::json_parse(path, source))?;

        if snapshot.model.trim().is_empty() {
            return Err(TranscriptError::MissingModel {
                path: path.to_path_buf(),
            });
        }
        Ok(snapshot)
    }
}
