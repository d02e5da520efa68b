//! One full pipeline pass over the accumulated response text.

use tracing::warn;

use crate::config::FormatterConfig;
use crate::lists::ListNormalizer;
use crate::protect::{count_placeholders, BlockKind, ContentProtector};
use crate::render::{render_diagram, CodeHighlighter, MarkupRenderer};
use crate::sections::{SectionExtractor, Sections};

/// Externally observable output of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedSections {
    pub reasoning: String,
    pub answer_html: String,
}

/// Stateless facade over the formatting stages. Identical input always
/// yields identical output.
#[derive(Debug, Clone, Default)]
pub struct ResponseFormatter {
    extractor: SectionExtractor,
    normalizer: ListNormalizer,
    protector: ContentProtector,
    renderer: MarkupRenderer,
    highlighter: CodeHighlighter,
}

impl ResponseFormatter {
    pub fn new(config: &FormatterConfig) -> Self {
        Self {
            extractor: SectionExtractor,
            normalizer: ListNormalizer,
            protector: ContentProtector,
            renderer: MarkupRenderer::new(config.allow_raw_html),
            highlighter: CodeHighlighter::new(config.highlight_theme.clone()),
        }
    }

    pub fn format(&self, accumulated: &str) -> RenderedSections {
        let Sections { reasoning, answer } = self.split_sections(accumulated);
        RenderedSections {
            reasoning,
            answer_html: self.render_answer(&answer),
        }
    }

    pub fn split_sections(&self, accumulated: &str) -> Sections {
        self.extractor.extract(accumulated)
    }

    /// Normalize lists, lift protected blocks out, compile, then restore
    /// code and diagrams.
    pub fn render_answer(&self, answer: &str) -> String {
        if answer.trim().is_empty() {
            return String::new();
        }

        let normalized = self.normalizer.normalize(answer);
        let protected = self.protector.protect(&normalized);
        let html = self.renderer.render(&protected.text);
        let restored = self
            .protector
            .restore_with(&html, &protected.blocks, |block| match block.kind {
                BlockKind::Code => self
                    .highlighter
                    .render_block(&block.raw, block.language.as_deref()),
                BlockKind::Diagram => render_diagram(&block.raw),
            });

        let leftover = count_placeholders(&restored);
        if leftover > 0 {
            warn!(leftover, "unresolved placeholders after restore");
        }
        restored
    }
}
