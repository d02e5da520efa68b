//! Textual list repair ahead of markdown compilation.
//!
//! Models routinely indent a bullet under a numbered item by two spaces,
//! which CommonMark reads as a sibling list, and run a paragraph straight
//! into the last list item. This pass rewrites indentation and inserts
//! blank separators so the compiler sees the intended structure. Fenced
//! blocks and `<mermaid>` regions pass through untouched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::fence::Fence;

static NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)\d+\.\s+").expect("numbered item regex must compile"));
static BULLET_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)[-*]\s").expect("bullet item regex must compile"));
static DIAGRAM_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<mermaid>").expect("diagram open regex must compile"));
static DIAGRAM_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</mermaid>").expect("diagram close regex must compile"));

#[derive(Debug, Clone, PartialEq, Eq)]
struct ListContext {
    /// Shallowest indentation seen for the current list.
    indent: usize,
    numbered: Option<NumberedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NumberedItem {
    indent: usize,
    /// Column where the item's text starts.
    content_indent: usize,
    /// Shift applied to the first bullet nested under this item, reused for
    /// the bullets that follow so their relative depth survives.
    bullet_shift: Option<isize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListNormalizer;

impl ListNormalizer {
    pub fn normalize(&self, text: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut context: Option<ListContext> = None;
        let mut fence: Option<Fence> = None;
        let mut in_diagram = false;

        for line in text.split('\n') {
            if let Some(open) = &fence {
                if open.is_closed_by(line) {
                    fence = None;
                }
                out.push(line.to_string());
                continue;
            }

            if in_diagram {
                if DIAGRAM_CLOSE.is_match(line) {
                    in_diagram = false;
                }
                out.push(line.to_string());
                continue;
            }

            if line.trim().is_empty() {
                context = None;
                out.push(line.to_string());
                continue;
            }

            let indent = indent_width(line);

            if let Some(captures) = NUMBERED_ITEM.captures(line) {
                let marker_end = captures.get(0).map_or(indent, |marker| marker.end());
                let numbered = NumberedItem {
                    indent,
                    content_indent: marker_end,
                    bullet_shift: None,
                };
                match context.as_mut() {
                    Some(active) => {
                        active.indent = active.indent.min(indent);
                        active.numbered = Some(numbered);
                    }
                    None => {
                        context = Some(ListContext {
                            indent,
                            numbered: Some(numbered),
                        });
                    }
                }
                out.push(line.to_string());
                continue;
            }

            if BULLET_ITEM.is_match(line) {
                let nested = context
                    .as_mut()
                    .and_then(|active| active.numbered.as_mut())
                    .filter(|numbered| indent > numbered.indent);

                match nested {
                    Some(numbered) => {
                        let shift = *numbered.bullet_shift.get_or_insert(
                            numbered.content_indent as isize - indent as isize,
                        );
                        let target = (indent as isize + shift).max(numbered.content_indent as isize);
                        out.push(reindent(line, target as usize));
                    }
                    None => {
                        match context.as_mut() {
                            Some(active) => {
                                active.indent = active.indent.min(indent);
                                active.numbered = None;
                            }
                            None => {
                                context = Some(ListContext {
                                    indent,
                                    numbered: None,
                                });
                            }
                        }
                        out.push(line.to_string());
                    }
                }
                continue;
            }

            if let Some(active) = &context {
                if indent <= active.indent {
                    context = None;
                    if out.last().is_some_and(|last| !last.trim().is_empty()) {
                        out.push(String::new());
                    }
                }
            }

            if let Some(open) = Fence::open(line) {
                fence = Some(open);
            } else if let Some(open) = DIAGRAM_OPEN.find(line) {
                in_diagram = !DIAGRAM_CLOSE.is_match(&line[open.end()..]);
            }
            out.push(line.to_string());
        }

        out.join("\n")
    }
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|ch| ch.is_whitespace())
        .map(|ch| if ch == '\t' { 4 } else { 1 })
        .sum()
}

fn reindent(line: &str, indent: usize) -> String {
    format!("{}{}", " ".repeat(indent), line.trim_start())
}
