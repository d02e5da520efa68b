//! Per-request suppression of redundant section emissions.

use crate::sections::Sections;

/// Sections that differ from what was last emitted for the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionChanges {
    pub reasoning: Option<String>,
    pub answer_html: Option<String>,
}

impl SectionChanges {
    pub fn is_empty(&self) -> bool {
        self.reasoning.is_none() && self.answer_html.is_none()
    }
}

/// Remembers the last emitted values of one request.
///
/// An empty value means the section is not present yet, so it is never
/// reported as a change and never overwrites what was emitted before.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    last_reasoning: String,
    last_answer_source: String,
    last_answer_html: String,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detect(&mut self, reasoning: &str, answer_html: &str) -> SectionChanges {
        SectionChanges {
            reasoning: update(&mut self.last_reasoning, reasoning),
            answer_html: update(&mut self.last_answer_html, answer_html),
        }
    }

    /// Like [`ChangeDetector::detect`], but only renders the answer when its
    /// source text moved since the previous call.
    pub fn observe<F>(&mut self, sections: &Sections, render: F) -> SectionChanges
    where
        F: FnOnce(&str) -> String,
    {
        let reasoning = update(&mut self.last_reasoning, &sections.reasoning);

        let answer_html = if sections.answer.is_empty() || sections.answer == self.last_answer_source
        {
            None
        } else {
            self.last_answer_source.clone_from(&sections.answer);
            let html = render(&sections.answer);
            update(&mut self.last_answer_html, &html)
        };

        SectionChanges {
            reasoning,
            answer_html,
        }
    }

    pub fn last_reasoning(&self) -> &str {
        &self.last_reasoning
    }

    pub fn last_answer_html(&self) -> &str {
        &self.last_answer_html
    }
}

fn update(last: &mut String, next: &str) -> Option<String> {
    if next.is_empty() || next == last.as_str() {
        return None;
    }
    next.clone_into(last);
    Some(next.to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::{ChangeDetector, SectionChanges};
    use crate::sections::Sections;

    #[test]
    fn repeated_input_reports_no_change() {
        let mut detector = ChangeDetector::new();
        let first = detector.detect("thinking", "<p>hi</p>");
        assert_eq!(first.reasoning.as_deref(), Some("thinking"));
        assert_eq!(first.answer_html.as_deref(), Some("<p>hi</p>"));

        assert!(detector.detect("thinking", "<p>hi</p>").is_empty());
    }

    #[test]
    fn empty_values_are_not_yet_present() {
        let mut detector = ChangeDetector::new();
        assert_eq!(detector.detect("", ""), SectionChanges::default());

        detector.detect("r", "");
        let changes = detector.detect("", "<p>a</p>");
        assert_eq!(changes.reasoning, None);
        assert_eq!(changes.answer_html.as_deref(), Some("<p>a</p>"));
        assert_eq!(detector.last_reasoning(), "r");
    }

    #[test]
    fn sections_change_independently() {
        let mut detector = ChangeDetector::new();
        detector.detect("a", "<p>x</p>");
        let changes = detector.detect("ab", "<p>x</p>");
        assert_eq!(changes.reasoning.as_deref(), Some("ab"));
        assert_eq!(changes.answer_html, None);
    }

    #[test]
    fn observe_skips_rendering_unchanged_answer_source() {
        let mut detector = ChangeDetector::new();
        let renders = Cell::new(0);
        let sections = Sections {
            reasoning: "why".to_string(),
            answer: "**bold**".to_string(),
        };
        let render = |text: &str| {
            renders.set(renders.get() + 1);
            format!("<p>{text}</p>")
        };

        let first = detector.observe(&sections, render);
        assert_eq!(first.answer_html.as_deref(), Some("<p>**bold**</p>"));
        assert!(detector.observe(&sections, render).is_empty());
        assert_eq!(renders.get(), 1);
        assert_eq!(detector.last_answer_html(), "<p>**bold**</p>");
    }
}
