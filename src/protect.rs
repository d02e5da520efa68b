//! Placeholder substitution for code and diagram blocks.
//!
//! Protected blocks are lifted out of the answer before markdown compilation
//! and replaced by alphanumeric tokens the compiler passes through verbatim.
//! Each token sits alone on its own paragraph so it comes back either bare
//! or wrapped in a single `<p>`.

use std::fmt;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::fence::{strip_indent, Fence};

static DIAGRAM_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<mermaid>(.*?)(?:</mermaid>|\z)").expect("diagram tag regex must compile")
});
static DIAGRAM_TAG_EDGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?mermaid>").expect("diagram tag edge regex must compile"));
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^( *)([-*+]|\d{1,9}[.)])( +)\S").expect("list item regex must compile")
});
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ZZ(?:CODEBLOCK|DIAGRAM)\d+ZZ").expect("placeholder regex must compile")
});

/// Fence labels treated as diagram sources.
const DIAGRAM_LANGUAGES: &[&str] = &["mermaid"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Diagram,
    Code,
}

/// One lifted block. Lives only for a single render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedBlock {
    pub id: usize,
    pub kind: BlockKind,
    pub language: Option<String>,
    pub raw: String,
}

impl ProtectedBlock {
    pub fn placeholder(&self) -> String {
        placeholder(self.kind, self.id)
    }
}

/// Working text plus the blocks its placeholders stand for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedText {
    pub text: String,
    pub blocks: Vec<ProtectedBlock>,
}

impl ProtectedText {
    pub fn blocks_of(&self, kind: BlockKind) -> impl Iterator<Item = &ProtectedBlock> {
        self.blocks.iter().filter(move |block| block.kind == kind)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diagram => f.write_str("diagram"),
            Self::Code => f.write_str("code"),
        }
    }
}

fn placeholder(kind: BlockKind, id: usize) -> String {
    match kind {
        BlockKind::Diagram => format!("ZZDIAGRAM{id}ZZ"),
        BlockKind::Code => format!("ZZCODEBLOCK{id}ZZ"),
    }
}

/// Number of placeholder tokens still present in `text`.
pub fn count_placeholders(text: &str) -> usize {
    PLACEHOLDER.find_iter(text).count()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentProtector;

impl ContentProtector {
    /// Lift diagrams first, then every remaining fenced block as code.
    pub fn protect(&self, text: &str) -> ProtectedText {
        let mut blocks = Vec::new();

        let text = protect_diagram_tags(text, &mut blocks);
        let text = protect_fences(&text, &mut blocks, BlockKind::Diagram);
        let text = protect_fences(&text, &mut blocks, BlockKind::Code);

        ProtectedText { text, blocks }
    }

    /// Put rendered blocks back in place of their placeholders, code first
    /// and diagrams second.
    pub fn restore_with<F>(&self, html: &str, blocks: &[ProtectedBlock], mut render: F) -> String
    where
        F: FnMut(&ProtectedBlock) -> String,
    {
        let mut restored = html.to_string();
        for kind in [BlockKind::Code, BlockKind::Diagram] {
            for block in blocks.iter().filter(|block| block.kind == kind) {
                let token = block.placeholder();
                let rendered = render(block);
                let wrapped = format!("<p>{token}</p>");
                if restored.contains(&wrapped) {
                    restored = restored.replacen(&wrapped, &rendered, 1);
                } else if restored.contains(&token) {
                    restored = restored.replacen(&token, &rendered, 1);
                } else {
                    warn!(kind = %block.kind, id = block.id, "placeholder lost during markdown compilation");
                }
            }
        }
        restored
    }
}

/// Replace `<mermaid>` tag regions outside fenced blocks. Fences inside an
/// open tag belong to the diagram.
fn protect_diagram_tags(text: &str, blocks: &mut Vec<ProtectedBlock>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prose = String::new();
    let mut in_tag = false;
    let mut lines = text.split_inclusive('\n');

    while let Some(line) = lines.next() {
        if !in_tag {
            if let Some(fence) = Fence::open(line) {
                out.push_str(&replace_diagram_tags(&prose, blocks));
                prose.clear();
                out.push_str(line);
                for inner in lines.by_ref() {
                    out.push_str(inner);
                    if fence.is_closed_by(inner) {
                        break;
                    }
                }
                continue;
            }
        }
        prose.push_str(line);
        let spans = code_span_ranges(line);
        if let Some(last) = DIAGRAM_TAG_EDGE
            .find_iter(line)
            .filter(|edge| !in_code_span(&spans, edge.start()))
            .last()
        {
            in_tag = !last.as_str().starts_with("</");
        }
    }
    out.push_str(&replace_diagram_tags(&prose, blocks));
    out
}

/// Tags quoted inside inline code spans are prose, not diagram openers.
fn replace_diagram_tags(prose: &str, blocks: &mut Vec<ProtectedBlock>) -> String {
    let mut next_id = next_id(blocks, BlockKind::Diagram);
    let spans = code_span_ranges(prose);
    let mut out = String::with_capacity(prose.len());
    let mut copied = 0;
    let mut search = 0;

    while let Some(captures) = DIAGRAM_TAG.captures_at(prose, search) {
        let Some(whole) = captures.get(0) else {
            break;
        };
        if let Some(span) = spans.iter().find(|span| span.contains(&whole.start())) {
            search = span.end;
            continue;
        }

        let body = captures.get(1).map_or("", |body| body.as_str());
        let block = ProtectedBlock {
            id: next_id,
            kind: BlockKind::Diagram,
            language: Some("mermaid".to_string()),
            raw: unwrap_inner_fence(body),
        };
        next_id += 1;
        out.push_str(&prose[copied..whole.start()]);
        out.push_str(&format!("\n\n{}\n\n", block.placeholder()));
        blocks.push(block);
        copied = whole.end();
        search = whole.end();
    }

    out.push_str(&prose[copied..]);
    out
}

/// Byte ranges of inline code spans: a backtick run closed by the next run
/// of the same length. Unmatched runs are literal backticks.
fn code_span_ranges(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let run_end = |mut at: usize| {
        while at < bytes.len() && bytes[at] == b'`' {
            at += 1;
        }
        at
    };

    let mut ranges = Vec::new();
    let mut at = 0;
    while at < bytes.len() {
        if bytes[at] != b'`' {
            at += 1;
            continue;
        }
        let start = at;
        at = run_end(at);
        let width = at - start;

        let mut scan = at;
        while scan < bytes.len() {
            if bytes[scan] != b'`' {
                scan += 1;
                continue;
            }
            let close_start = scan;
            scan = run_end(scan);
            if scan - close_start == width {
                ranges.push(start..scan);
                at = scan;
                break;
            }
        }
    }
    ranges
}

fn in_code_span(spans: &[Range<usize>], at: usize) -> bool {
    spans.iter().any(|span| span.contains(&at))
}

/// `<mermaid>` bodies that wrap a complete fenced block keep only the
/// fence contents.
fn unwrap_inner_fence(body: &str) -> String {
    let trimmed = body.trim();
    let Some((first, rest)) = trimmed.split_once('\n') else {
        return body.to_string();
    };
    let Some(fence) = Fence::open(first) else {
        return body.to_string();
    };
    let (inner, last) = match rest.rfind('\n') {
        Some(split) => (&rest[..=split], &rest[split + 1..]),
        None => ("", rest),
    };
    if fence.is_closed_by(last) {
        inner.to_string()
    } else {
        body.to_string()
    }
}

/// Replace fenced blocks whose label classifies as `kind`. An unclosed fence
/// runs to the end of the text. Fences of the other kind are skipped whole.
///
/// The token keeps the fence's indent only as far as an enclosing list item
/// needs it; anywhere else four spaces would turn it into an indented code
/// block.
fn protect_fences(text: &str, blocks: &mut Vec<ProtectedBlock>, kind: BlockKind) -> String {
    let mut next_id = next_id(blocks, kind);
    let mut out = String::with_capacity(text.len());
    let mut lines = text.split_inclusive('\n');
    let mut list_content_indent: Option<usize> = None;

    while let Some(line) = lines.next() {
        let Some(fence) = Fence::open(line) else {
            track_list_context(line, &mut list_content_indent);
            out.push_str(line);
            continue;
        };

        let language = fence.language();
        let matches_kind = classify(language.as_deref()) == kind;
        let mut inner_lines = Vec::new();
        let mut closing = None;
        for inner in lines.by_ref() {
            if fence.is_closed_by(inner) {
                closing = Some(inner);
                break;
            }
            inner_lines.push(inner);
        }

        if !matches_kind {
            out.push_str(line);
            out.extend(inner_lines);
            if let Some(closing) = closing {
                out.push_str(closing);
            }
            continue;
        }

        let body: String = inner_lines
            .into_iter()
            .map(|inner| strip_indent(inner, fence.indent))
            .collect();
        let block = ProtectedBlock {
            id: next_id,
            kind,
            language,
            raw: body,
        };
        next_id += 1;
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&" ".repeat(token_indent(fence.indent, list_content_indent)));
        out.push_str(&block.placeholder());
        out.push_str("\n\n");
        blocks.push(block);
    }

    out
}

/// Follow the content column of the innermost list item. Unindented prose
/// ends the list.
fn track_list_context(line: &str, list_content_indent: &mut Option<usize>) {
    if line.trim().is_empty() {
        return;
    }
    if let Some(captures) = LIST_ITEM.captures(line) {
        let width = |group: usize| captures.get(group).map_or(0, |m| m.as_str().len());
        *list_content_indent = Some(width(1) + width(2) + width(3));
    } else if !line.starts_with(' ') {
        *list_content_indent = None;
    }
}

fn token_indent(fence_indent: usize, list_content_indent: Option<usize>) -> usize {
    match list_content_indent {
        Some(content) => fence_indent.min(content + 3),
        None => 0,
    }
}

fn classify(language: Option<&str>) -> BlockKind {
    match language {
        Some(language) if DIAGRAM_LANGUAGES.contains(&language) => BlockKind::Diagram,
        _ => BlockKind::Code,
    }
}

fn next_id(blocks: &[ProtectedBlock], kind: BlockKind) -> usize {
    blocks.iter().filter(|block| block.kind == kind).count()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{count_placeholders, BlockKind, ContentProtector};

    #[test]
    fn diagram_fence_is_protected_as_diagram_not_code() {
        let protected =
            ContentProtector.protect("Intro\n```mermaid\ngraph TD\n    A-->B\n```\nafter\n");

        assert_eq!(protected.blocks.len(), 1);
        let block = &protected.blocks[0];
        assert_eq!(block.kind, BlockKind::Diagram);
        assert_eq!(block.raw, "graph TD\n    A-->B\n");
        assert_eq!(protected.text, "Intro\n\nZZDIAGRAM0ZZ\n\nafter\n");
    }

    #[test]
    fn diagram_tags_and_code_fences_get_separate_sequences() {
        let text = "<mermaid>\ngraph LR\n</mermaid>\n\n```python\nprint(1)\n```\n\n```\nplain\n```\n";
        let protected = ContentProtector.protect(text);

        let diagrams: Vec<_> = protected.blocks_of(BlockKind::Diagram).collect();
        let code: Vec<_> = protected.blocks_of(BlockKind::Code).collect();
        assert_eq!(diagrams.len(), 1);
        assert_eq!(code.len(), 2);
        assert_eq!(code[0].id, 0);
        assert_eq!(code[0].language.as_deref(), Some("python"));
        assert_eq!(code[1].id, 1);
        assert_eq!(code[1].language, None);
        assert!(protected.text.contains("ZZDIAGRAM0ZZ"));
        assert!(protected.text.contains("ZZCODEBLOCK1ZZ"));
        assert!(!protected.text.contains("print(1)"));
    }

    #[test]
    fn unclosed_blocks_run_to_end_of_text() {
        let protected = ContentProtector.protect("text\n```rust\nfn main() {");
        assert_eq!(protected.blocks[0].raw, "fn main() {");

        let protected = ContentProtector.protect("<mermaid>\ngraph TD\n  A");
        assert_eq!(protected.blocks[0].kind, BlockKind::Diagram);
        assert_eq!(protected.blocks[0].raw, "\ngraph TD\n  A");
    }

    #[test]
    fn indented_fence_content_is_dedented_and_token_keeps_indent() {
        let protected = ContentProtector.protect("1. step\n   ```sh\n   ls -la\n   ```\n");
        assert_eq!(protected.blocks[0].raw, "ls -la\n");
        assert_eq!(protected.text, "1. step\n\n   ZZCODEBLOCK0ZZ\n\n");
    }

    #[test]
    fn top_level_indented_fence_token_is_dedented() {
        let protected = ContentProtector.protect("Run this:\n\n    ```sh\n    ls\n    ```\n");
        assert_eq!(protected.blocks[0].raw, "ls\n");
        assert_eq!(protected.text, "Run this:\n\n\nZZCODEBLOCK0ZZ\n\n");
    }

    #[test]
    fn nested_list_fence_keeps_item_indent() {
        let text = "- outer\n  - inner\n    ```sh\n    ls\n    ```\n";
        let protected = ContentProtector.protect(text);
        assert!(protected.text.ends_with("  - inner\n\n    ZZCODEBLOCK0ZZ\n\n"));
    }

    #[test]
    fn diagram_tag_quoted_in_inline_code_is_prose() {
        let text = "Wrap diagrams in `<mermaid>` tags.\n\n## Next\n\nMore text.";
        let protected = ContentProtector.protect(text);

        assert!(protected.blocks.is_empty());
        assert_eq!(protected.text, text);
    }

    #[test]
    fn quoted_tag_does_not_hide_a_real_diagram() {
        let text = "Use ``<mermaid>`` like this:\n\n<mermaid>\ngraph TD\n</mermaid>\n";
        let protected = ContentProtector.protect(text);

        assert_eq!(protected.blocks.len(), 1);
        assert_eq!(protected.blocks[0].raw, "\ngraph TD\n");
        assert!(protected.text.starts_with("Use ``<mermaid>`` like this:"));
    }

    #[test]
    fn diagram_tags_inside_code_fences_stay_code() {
        let text = "```js\nconst s = \"<mermaid>x</mermaid>\";\n```\n";
        let protected = ContentProtector.protect(text);

        assert_eq!(protected.blocks.len(), 1);
        assert_eq!(protected.blocks[0].kind, BlockKind::Code);
        assert_eq!(protected.blocks[0].raw, "const s = \"<mermaid>x</mermaid>\";\n");
    }

    #[test]
    fn fenced_diagram_wrapped_in_tags_is_unwrapped() {
        let protected =
            ContentProtector.protect("<mermaid>\n```mermaid\ngraph TD\n```\n</mermaid>\n");

        assert_eq!(protected.blocks.len(), 1);
        assert_eq!(protected.blocks[0].kind, BlockKind::Diagram);
        assert_eq!(protected.blocks[0].raw, "graph TD\n");
    }

    #[test]
    fn restore_replaces_wrapped_and_bare_tokens() {
        let protected = ContentProtector.protect("```\na\n```\n\n<mermaid>b</mermaid>");
        let html = "<p>ZZCODEBLOCK0ZZ</p>\n<li>ZZDIAGRAM0ZZ</li>";
        let restored = ContentProtector.restore_with(html, &protected.blocks, |block| {
            format!("[{}:{}]", block.kind, block.raw)
        });

        assert_eq!(restored, "[code:a\n]\n<li>[diagram:b]</li>");
        assert_eq!(count_placeholders(&restored), 0);
    }
}
