//! Streaming structured-response formatter.
//!
//! Invariant: every answer pass resolves all of its placeholders before it
//! returns; protected code and diagram text never reaches the markdown
//! compiler.
//!
//! # Public API Overview
//! - Split accumulated model output into reasoning and answer regions with
//!   [`SectionExtractor`] / [`split_sections`].
//! - Render one answer region to an HTML fragment with [`ResponseFormatter`].
//! - Drive a streaming generation and receive [`StreamEvent`]s through
//!   [`StreamOrchestrator`].
//! - Build prompts from the dialogue history with [`build_prompt`].

pub mod change;
pub mod config;
pub mod formatter;
pub mod lists;
pub mod logging;
pub mod orchestrator;
pub mod prompt;
pub mod protect;
pub mod render;
pub mod sections;

mod fence;

/// Pipeline stages.
pub use crate::change::{ChangeDetector, SectionChanges};
pub use crate::lists::ListNormalizer;
pub use crate::protect::{BlockKind, ContentProtector, ProtectedBlock, ProtectedText};
pub use crate::render::{CodeHighlighter, MarkupRenderer};
pub use crate::sections::{split_sections, SectionExtractor, Sections};

/// One-pass facade and its output.
pub use crate::formatter::{RenderedSections, ResponseFormatter};

/// Streaming orchestration.
pub use crate::orchestrator::{
    sink_fn, EventSink, FnSink, FormatRequest, OrchestratorError, StreamEvent, StreamOrchestrator,
    StreamPhase, StreamState,
};

/// Dialogue history and prompt construction.
pub use crate::prompt::{build_prompt, ConversationTurn, Role, FORMATTING_INSTRUCTIONS, HISTORY_WINDOW};

/// Environment configuration.
pub use crate::config::{EnvConfig, FormatterConfig, ProviderKind};

/// Provider contract re-exported for front ends.
pub use generation_provider::{GenerationProvider, RequestId, TransportError};
