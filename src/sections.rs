//! Reasoning / final-answer region extraction.
//!
//! Extraction re-scans the whole accumulated buffer on every call. Regions
//! only become non-empty once both delimiters of a pair are present, so a tag
//! split across fragments simply yields an empty region until it closes.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>(.*?)</think>").expect("think regex must compile"));
static OUTPUT_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<output>(.*?)</output>").expect("output regex must compile"));
static THINK_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<think>").expect("think open regex must compile"));
static OUTPUT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<output>").expect("output open regex must compile"));

const PARTIAL_TAG_CANDIDATES: &[&str] = &["<think>", "<output>"];

/// The two regions derived from one accumulated buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub reasoning: String,
    /// Answer markdown source, before any rendering.
    pub answer: String,
}

impl Sections {
    pub fn is_empty(&self) -> bool {
        self.reasoning.is_empty() && self.answer.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SectionExtractor;

impl SectionExtractor {
    /// Split `text` into its reasoning and answer regions.
    ///
    /// Repeated spans of the same kind are concatenated in order of
    /// appearance. When no `<output>` tag exists outside the reasoning but
    /// reasoning is present, the answer is everything outside the reasoning spans; an
    /// unclosed trailing `<think>` and whatever follows it is excluded from
    /// that fallback.
    pub fn extract(&self, text: &str) -> Sections {
        let reasoning = concat_captures(&THINK_SPAN, text);
        let mut answer = concat_captures(&OUTPUT_SPAN, text);

        if answer.is_empty() && !reasoning.is_empty() {
            // Tags mentioned while reasoning do not count as an answer opener.
            let outside = text_outside_reasoning(text);
            if !OUTPUT_OPEN.is_match(&outside) {
                answer = outside;
            }
        }

        Sections { reasoning, answer }
    }
}

/// Exporter utility: split stored turn content the same way the stream does.
pub fn split_sections(text: &str) -> Sections {
    SectionExtractor.extract(text)
}

fn concat_captures(pattern: &Regex, text: &str) -> String {
    pattern
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|span| span.as_str())
        .collect()
}

fn text_outside_reasoning(text: &str) -> String {
    let stripped = THINK_SPAN.replace_all(text, "");
    let visible = match THINK_OPEN.find(&stripped) {
        Some(open) => &stripped[..open.start()],
        None => stripped.as_ref(),
    };
    strip_partial_tag(visible).to_string()
}

/// Drop a trailing `<`, `<out`, `<thin`... that may still grow into a tag.
fn strip_partial_tag(text: &str) -> &str {
    let Some(start) = text.rfind('<') else {
        return text;
    };
    let tail = text[start..].to_ascii_lowercase();
    let is_prefix = PARTIAL_TAG_CANDIDATES
        .iter()
        .any(|tag| tag.len() > tail.len() && tag.starts_with(tail.as_str()));
    if is_prefix {
        &text[..start]
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::{split_sections, strip_partial_tag, SectionExtractor};

    fn extract(text: &str) -> (String, String) {
        let sections = SectionExtractor.extract(text);
        (sections.reasoning, sections.answer)
    }

    #[test]
    fn tagged_regions_are_extracted() {
        let (reasoning, answer) = extract("<think>plan</think>\n<output>**done**</output>");
        assert_eq!(reasoning, "plan");
        assert_eq!(answer, "**done**");
    }

    #[test]
    fn repeated_spans_concatenate_in_order() {
        let (reasoning, _) = extract("<think>A</think><think>B</think>");
        assert_eq!(reasoning, "AB");
    }

    #[test]
    fn matching_is_case_insensitive_and_spans_newlines() {
        let (reasoning, answer) = extract("<THINK>line one\nline two</Think><Output>\nok\n</OUTPUT>");
        assert_eq!(reasoning, "line one\nline two");
        assert_eq!(answer, "\nok\n");
    }

    #[test]
    fn unclosed_regions_stay_empty() {
        assert_eq!(extract("<think>still going"), (String::new(), String::new()));
        let (reasoning, answer) = extract("<think>x</think><output>partial");
        assert_eq!(reasoning, "x");
        assert_eq!(answer, "");
    }

    #[test]
    fn fallback_uses_text_outside_reasoning() {
        let (reasoning, answer) = extract("prefix<think>X</think>suffix");
        assert_eq!(reasoning, "X");
        assert_eq!(answer, "prefixsuffix");
    }

    #[test]
    fn output_tag_mentioned_while_reasoning_keeps_fallback() {
        let (reasoning, answer) =
            extract("<think>I will wrap the answer in <output> tags.</think>The answer is 42.");
        assert_eq!(reasoning, "I will wrap the answer in <output> tags.");
        assert_eq!(answer, "The answer is 42.");
    }

    #[test]
    fn output_tag_in_unclosed_reasoning_tail_is_ignored() {
        let (_, answer) = extract("<think>a</think>shown<think>then <output> maybe");
        assert_eq!(answer, "shown");
    }

    #[test]
    fn fallback_requires_reasoning() {
        assert_eq!(
            extract("Some random text without any tags"),
            (String::new(), String::new())
        );
    }

    #[test]
    fn fallback_never_counts_an_unclosed_reasoning_tail() {
        let (reasoning, answer) = extract("<think>a</think>shown<think>hidden");
        assert_eq!(reasoning, "a");
        assert_eq!(answer, "shown");
    }

    #[test]
    fn fallback_hides_a_tag_that_is_still_arriving() {
        let (_, answer) = extract("<think>a</think>\nintro <out");
        assert_eq!(answer, "\nintro ");
    }

    #[test]
    fn nested_same_tags_keep_outer_and_inner_text() {
        let content = "<think>\n    Outer think\n    <think>Inner think</think>\n</think>\n<output>\n    Outer output\n    <output>Inner output</output>\n</output>";
        let sections = split_sections(content);
        assert!(sections.reasoning.contains("Outer think"));
        assert!(sections.reasoning.contains("Inner think"));
        assert!(sections.answer.contains("Outer output"));
        assert!(sections.answer.contains("Inner output"));
    }

    #[test]
    fn partial_tag_stripping_only_targets_known_tags() {
        assert_eq!(strip_partial_tag("a <"), "a ");
        assert_eq!(strip_partial_tag("a <OUTP"), "a ");
        assert_eq!(strip_partial_tag("a < b"), "a < b");
        assert_eq!(strip_partial_tag("x <div"), "x <div");
        assert_eq!(strip_partial_tag("done <output>"), "done <output>");
    }
}
