use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use stream_formatter::{split_sections, ConversationTurn, Role};
use time::OffsetDateTime;
use tracing::info;

use crate::error::TranscriptError;
use crate::paths::{export_file_name, export_root, header_timestamp, now};

/// Render the transcript document. Assistant turns are split into their
/// reasoning and answer sections; turns with neither are written verbatim.
pub fn render_markdown(
    model: &str,
    history: &[ConversationTurn],
    at: OffsetDateTime,
) -> Result<String, TranscriptError> {
    let mut out = String::new();
    let _ = write!(out, "# Chat History - {}\n\n", header_timestamp(at)?);
    let _ = write!(out, "Model: {model}\n\n");

    for turn in history {
        match turn.role {
            Role::User => {
                out.push_str("## User Input\n");
                let _ = write!(out, "{}\n\n", turn.content);
            }
            Role::Assistant => {
                out.push_str("## Assistant Response\n");
                let sections = split_sections(&turn.content);
                if !sections.reasoning.is_empty() {
                    let _ = write!(out, "### Thinking Process\n{}\n\n", sections.reasoning);
                }
                if !sections.answer.is_empty() {
                    let _ = write!(out, "### Output\n{}\n\n", sections.answer);
                }
                if sections.is_empty() {
                    let _ = write!(out, "{}\n\n", turn.content);
                }
            }
        }
        out.push_str("---\n\n");
    }

    Ok(out)
}

/// Write `conversations/chat_{stamp}.md` under `base`. An empty history
/// writes nothing and returns `None`.
pub fn export_markdown(
    base: &Path,
    model: &str,
    history: &[ConversationTurn],
) -> Result<Option<PathBuf>, TranscriptError> {
    export_markdown_at(base, model, history, now())
}

pub fn export_markdown_at(
    base: &Path,
    model: &str,
    history: &[ConversationTurn],
    at: OffsetDateTime,
) -> Result<Option<PathBuf>, TranscriptError> {
    if history.is_empty() {
        return Ok(None);
    }

    let dir = export_root(base);
    fs::create_dir_all(&dir)
        .map_err(|source| TranscriptError::io("creating export directory", &dir, source))?;

    let path = dir.join(export_file_name(at)?);
    let document = render_markdown(model, history, at)?;
    fs::write(&path, document)
        .map_err(|source| TranscriptError::io("writing transcript", &path, source))?;

    info!(path = %path.display(), turns = history.len(), "transcript exported");
    Ok(Some(path))
}
