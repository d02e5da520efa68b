use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stream_formatter::{ConversationTurn, FormatRequest, RequestId, StreamOrchestrator};
use tracing::{debug, warn};
use transcript_store::{export_markdown, ConversationSnapshot};

use crate::app::HostOps;
use crate::document::{render_document, Palette};

/// Host backed by a live orchestrator and the local filesystem.
pub struct CliHost {
    orchestrator: Arc<StreamOrchestrator>,
    /// Relative save/load paths and the export directory resolve against this.
    base_dir: PathBuf,
    html_out: Option<PathBuf>,
    palette: Palette,
}

impl CliHost {
    pub fn new(
        orchestrator: Arc<StreamOrchestrator>,
        base_dir: impl Into<PathBuf>,
        html_out: Option<PathBuf>,
    ) -> Self {
        Self {
            orchestrator,
            base_dir: base_dir.into(),
            html_out,
            palette: Palette::default(),
        }
    }

    pub fn orchestrator(&self) -> &Arc<StreamOrchestrator> {
        &self.orchestrator
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl HostOps for CliHost {
    fn submit(&mut self, request: FormatRequest) -> Result<RequestId, String> {
        self.orchestrator
            .submit(request)
            .map_err(|error| error.to_string())
    }

    fn cancel(&mut self) -> Option<RequestId> {
        self.orchestrator.cancel()
    }

    fn save(&mut self, path: &Path, snapshot: &ConversationSnapshot) -> Result<(), String> {
        snapshot
            .save(&self.resolve(path))
            .map_err(|error| error.to_string())
    }

    fn load(&mut self, path: &Path) -> Result<ConversationSnapshot, String> {
        ConversationSnapshot::load(&self.resolve(path)).map_err(|error| error.to_string())
    }

    fn export(
        &mut self,
        model: &str,
        history: &[ConversationTurn],
    ) -> Result<Option<PathBuf>, String> {
        export_markdown(&self.base_dir, model, history).map_err(|error| error.to_string())
    }

    fn write_document(&mut self, answer_html: &str) {
        let Some(path) = self.html_out.as_ref() else {
            return;
        };

        let page = render_document(answer_html, &self.palette);
        match fs::write(path, page) {
            Ok(()) => debug!(path = %path.display(), bytes = answer_html.len(), "answer document updated"),
            Err(error) => warn!(path = %path.display(), %error, "failed to write answer document"),
        }
    }
}
