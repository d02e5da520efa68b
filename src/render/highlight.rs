//! syntect-backed highlighting for protected code blocks.

use once_cell::sync::OnceCell;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::{debug, warn};

use super::escape_html;
use crate::config::DEFAULT_HIGHLIGHT_THEME;

static SYNTAXES: OnceCell<SyntaxSet> = OnceCell::new();
static THEMES: OnceCell<ThemeSet> = OnceCell::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn themes() -> &'static ThemeSet {
    THEMES.get_or_init(ThemeSet::load_defaults)
}

/// Renders one code block to `<pre><code class="language-…">` with inline
/// styled spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeHighlighter {
    theme_name: String,
}

impl Default for CodeHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_THEME)
    }
}

impl CodeHighlighter {
    pub fn new(theme_name: impl Into<String>) -> Self {
        let theme_name = theme_name.into();
        if !themes().themes.contains_key(&theme_name) {
            warn!(theme = %theme_name, fallback = DEFAULT_HIGHLIGHT_THEME, "unknown highlight theme");
        }
        Self { theme_name }
    }

    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    fn theme(&self) -> Option<&'static Theme> {
        let themes = themes();
        themes
            .themes
            .get(&self.theme_name)
            .or_else(|| themes.themes.get(DEFAULT_HIGHLIGHT_THEME))
            .or_else(|| themes.themes.values().next())
    }

    /// The label wins when syntect knows it. Otherwise the content is sniffed,
    /// and anything still unresolved is emitted as escaped plain text.
    pub fn render_block(&self, raw: &str, language: Option<&str>) -> String {
        let syntaxes = syntax_set();
        let label = language
            .map(|label| label.trim().to_ascii_lowercase())
            .filter(|label| !label.is_empty());
        let detected = autodetect_lang(raw);

        let syntax = label
            .as_deref()
            .and_then(|label| try_syntax_for_lang(syntaxes, label))
            .or_else(|| detected.and_then(|lang| try_syntax_for_lang(syntaxes, lang)));
        let class = label
            .clone()
            .or_else(|| detected.map(ToString::to_string))
            .unwrap_or_else(|| "text".to_string());

        let body = syntax
            .and_then(|syntax| self.highlight(raw, syntax))
            .unwrap_or_else(|| escape_html(raw));

        format!(
            "<pre><code class=\"language-{}\">{body}</code></pre>",
            escape_html(&class)
        )
    }

    fn highlight(&self, raw: &str, syntax: &SyntaxReference) -> Option<String> {
        let syntaxes = syntax_set();
        let theme = self.theme()?;
        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut out = String::with_capacity(raw.len() * 2);

        for line in LinesWithEndings::from(raw) {
            let regions = match highlighter.highlight_line(line, syntaxes) {
                Ok(regions) => regions,
                Err(error) => {
                    debug!(%error, syntax = %syntax.name, "highlighting failed, using plain text");
                    return None;
                }
            };
            match styled_line_to_highlighted_html(&regions, IncludeBackground::No) {
                Ok(html) => out.push_str(&html),
                Err(error) => {
                    debug!(%error, "styled html conversion failed, using plain text");
                    return None;
                }
            }
        }
        Some(out)
    }
}

fn try_syntax_for_lang<'a>(syntaxes: &'a SyntaxSet, lang: &str) -> Option<&'a SyntaxReference> {
    let lang = normalize_lang(lang);
    syntaxes
        .find_syntax_by_token(&lang)
        .or_else(|| syntaxes.find_syntax_by_extension(&lang))
        .or_else(|| syntaxes.find_syntax_by_name(&lang))
}

// Aliases resolved to names syntect's default set understands.
fn normalize_lang(lang: &str) -> String {
    let lang = lang
        .trim()
        .trim_matches(|c: char| c == '.' || c == '#')
        .to_ascii_lowercase();
    let alias = match lang.as_str() {
        "sh" | "bash" | "zsh" | "shell" | "console" | "shellsession" => "bash",
        "html" | "htm" | "xhtml" => "html",
        "js" | "javascript" | "mjs" | "cjs" | "jsx" => "js",
        "ts" | "typescript" | "tsx" => "ts",
        "yaml" | "yml" => "yaml",
        "rs" | "rust" => "rust",
        "py" | "python" | "py3" => "python",
        "h" => "c",
        "cpp" | "c++" | "cxx" | "cc" | "hpp" | "hh" => "cpp",
        "objc" | "objective-c" | "m" | "mm" => "objective-c",
        "cs" | "csharp" => "cs",
        "rb" | "ruby" => "ruby",
        "kt" | "kts" | "kotlin" => "kotlin",
        "make" | "makefile" | "mk" => "make",
        "md" | "markdown" => "markdown",
        "ini" | "cfg" | "conf" | "dotenv" => "ini",
        _ => return lang,
    };
    alias.to_string()
}

/// Best-effort language sniffing for unlabeled blocks.
fn autodetect_lang(content: &str) -> Option<&'static str> {
    let s = content.trim_start();
    if s.is_empty() {
        return None;
    }

    if let Some(rest) = s.lines().next().and_then(|first| first.strip_prefix("#!")) {
        let interpreter = rest.to_ascii_lowercase();
        if interpreter.contains("python") {
            return Some("python");
        }
        if interpreter.contains("node") {
            return Some("javascript");
        }
        if interpreter.contains("ruby") {
            return Some("ruby");
        }
        if interpreter.contains("sh") {
            return Some("bash");
        }
    }

    let sample: String = s.lines().take(24).collect::<Vec<_>>().join("\n");
    let lower = sample.to_ascii_lowercase();
    let trimmed = s.trim();

    if trimmed.starts_with("diff --git ")
        || sample.lines().take(6).any(|line| line.starts_with("--- "))
            && sample.lines().take(6).any(|line| line.starts_with("+++ "))
    {
        return Some("diff");
    }

    let json_shaped = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if json_shaped && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some("json");
    }

    if trimmed.starts_with('<') && trimmed.contains('>') {
        let l = lower.trim_start();
        if ["<!doctype html", "<html", "<head", "<body"]
            .iter()
            .any(|prefix| l.starts_with(prefix))
        {
            return Some("html");
        }
        if l.starts_with("<?xml") || l.starts_with("<svg") {
            return Some("xml");
        }
    }

    let rust_hits = ["fn ", "let ", "mod ", "impl ", "use ", "pub "]
        .iter()
        .filter(|keyword| lower.contains(**keyword))
        .count();
    if rust_hits >= 2 && sample.contains('{') {
        return Some("rust");
    }

    if (lower.contains("def ") || lower.contains("class ") || lower.contains("import "))
        && !sample.contains(';')
    {
        return Some("python");
    }

    if sample
        .lines()
        .take(8)
        .any(|line| line.trim_start().starts_with("$ ") || line.trim_start().starts_with("echo "))
        || sample.contains(" && ")
    {
        return Some("bash");
    }

    if ["select ", "insert ", "update ", "delete ", "create table"]
        .iter()
        .any(|keyword| lower.contains(keyword))
        && sample.contains(';')
    {
        return Some("sql");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{autodetect_lang, normalize_lang, CodeHighlighter};

    #[test]
    fn labeled_python_block_gets_class_and_spans() {
        let html = CodeHighlighter::default().render_block("def f():\n    return 1\n", Some("python"));

        assert!(html.starts_with("<pre><code class=\"language-python\">"));
        assert!(html.ends_with("</code></pre>"));
        assert!(html.contains("<span style="));
        assert!(html.contains("return"));
    }

    #[test]
    fn unlabeled_json_is_detected() {
        let html = CodeHighlighter::default().render_block("{\"a\": [1, 2]}\n", None);
        assert!(html.starts_with("<pre><code class=\"language-json\">"));
    }

    #[test]
    fn unknown_label_keeps_class_and_escapes_text() {
        let html = CodeHighlighter::default().render_block("x <- 1 & y\n", Some("brainlang"));
        assert_eq!(
            html,
            "<pre><code class=\"language-brainlang\">x &lt;- 1 &amp; y\n</code></pre>"
        );
    }

    #[test]
    fn unlabeled_prose_falls_back_to_text() {
        let html = CodeHighlighter::default().render_block("just words\n", None);
        assert_eq!(html, "<pre><code class=\"language-text\">just words\n</code></pre>");
    }

    #[test]
    fn markup_in_code_is_escaped_inside_spans() {
        let html = CodeHighlighter::default().render_block("print('<b>')\n", Some("python"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn unknown_theme_falls_back() {
        let highlighter = CodeHighlighter::new("no-such-theme");
        assert_eq!(highlighter.theme_name(), "no-such-theme");
        assert!(highlighter
            .render_block("fn main() {}\n", Some("rust"))
            .contains("<span style="));
    }

    #[test]
    fn aliases_and_sniffing() {
        assert_eq!(normalize_lang("Py"), "python");
        assert_eq!(normalize_lang(".sh"), "bash");
        assert_eq!(normalize_lang("lua"), "lua");
        assert_eq!(autodetect_lang("#!/usr/bin/env python3\nprint(1)"), Some("python"));
        assert_eq!(autodetect_lang("fn main() {\n    let x = 1;\n}"), Some("rust"));
        assert_eq!(autodetect_lang("hello there"), None);
    }
}
