//! Markdown to HTML conversion for the protected answer text.

mod highlight;
mod nesting;

use markdown::{to_html_with_options, Options};
use tracing::warn;

pub use highlight::CodeHighlighter;

/// Compiles GFM markdown (tables, strikethrough, autolinks) to HTML and runs
/// the list post-pass. Placeholder tokens pass through as plain text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkupRenderer {
    allow_raw_html: bool,
}

impl MarkupRenderer {
    pub fn new(allow_raw_html: bool) -> Self {
        Self { allow_raw_html }
    }

    pub fn allows_raw_html(&self) -> bool {
        self.allow_raw_html
    }

    fn options(&self) -> Options {
        let mut options = Options::gfm();
        options.compile.allow_dangerous_html = self.allow_raw_html;
        options
    }

    pub fn render(&self, text: &str) -> String {
        match to_html_with_options(text, &self.options()) {
            Ok(html) => nesting::post_process(&html),
            Err(error) => {
                warn!(%error, "markdown compilation failed, emitting escaped text");
                format!("<p>{}</p>", escape_html(text))
            }
        }
    }
}

/// Diagram container. The source is left unescaped for the client-side
/// renderer; blank edge lines and trailing spaces are dropped.
pub fn render_diagram(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|line| !line.is_empty());
    let end = lines.iter().rposition(|line| !line.is_empty());
    let body = match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    };
    format!("<div class=\"mermaid\">{body}</div>")
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
