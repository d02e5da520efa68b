//! Fenced-block line recognition shared by the list normalizer and the
//! content protector.

/// An opening code fence: ```` ```lang ```` or `~~~lang`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fence {
    pub indent: usize,
    pub marker: char,
    pub len: usize,
    pub info: String,
}

impl Fence {
    /// Recognize `line` as an opening fence.
    pub fn open(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let trimmed = line.trim_start_matches(' ');
        let indent = line.len() - trimmed.len();
        let marker = trimmed.chars().next().filter(|ch| matches!(ch, '`' | '~'))?;
        let len = trimmed.chars().take_while(|ch| *ch == marker).count();
        if len < 3 {
            return None;
        }

        let info = trimmed[len..].trim();
        if marker == '`' && info.contains('`') {
            return None;
        }

        Some(Self {
            indent,
            marker,
            len,
            info: info.to_string(),
        })
    }

    /// Whether `line` closes this fence.
    pub fn is_closed_by(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let run = trimmed.chars().take_while(|ch| *ch == self.marker).count();
        run >= self.len && trimmed.len() == run * self.marker.len_utf8()
    }

    /// First word of the info string, lowercased. `{python}` and `.python`
    /// style labels are unwrapped.
    pub fn language(&self) -> Option<String> {
        let word = self.info.split_whitespace().next()?;
        let word = word
            .trim_start_matches('{')
            .trim_end_matches('}')
            .trim_start_matches('.');
        if word.is_empty() {
            None
        } else {
            Some(word.to_ascii_lowercase())
        }
    }
}

/// Remove up to `indent` leading spaces from `line`.
pub(crate) fn strip_indent(line: &str, indent: usize) -> &str {
    let spaces = line
        .bytes()
        .take(indent)
        .take_while(|byte| *byte == b' ')
        .count();
    &line[spaces..]
}
