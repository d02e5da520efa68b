//! Conversation persistence: Markdown transcript export and JSON snapshots.

mod error;
mod export;
mod paths;
mod snapshot;

pub use error::TranscriptError;
pub use export::{export_markdown, export_markdown_at, render_markdown};
pub use paths::{export_file_name, export_root, EXPORT_DIR};
pub use snapshot::ConversationSnapshot;
