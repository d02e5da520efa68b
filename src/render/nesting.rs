//! Post-pass over compiled HTML that repairs and tags nested lists.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static LIST_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)(ul|ol)(\s[^>]*)?>").expect("list tag regex must compile")
});

pub(crate) const NESTED_LIST_CLASS: &str = "nested-list";

pub(crate) fn post_process(html: &str) -> String {
    annotate_nested_lists(&lift_flattened_bullets(html))
}

/// Bullet lines that ended up as plain text inside an ordered item become a
/// real child `<ul>`.
pub(crate) fn lift_flattened_bullets(html: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut in_pre = false;

    for line in html.lines() {
        if !in_pre && stack.last().map(String::as_str) == Some("ol") {
            if let Some(item) = flattened_bullet(line) {
                if pending.is_empty() {
                    if let Some(previous) = out.last_mut() {
                        if let Some(stripped) = previous.strip_suffix("<br />") {
                            *previous = stripped.to_string();
                        }
                    }
                }
                match item.strip_suffix("</li>") {
                    Some(text) => {
                        pending.push(text.to_string());
                        flush_bullets(&mut pending, &mut out);
                        out.push("</li>".to_string());
                    }
                    None => pending.push(item.to_string()),
                }
                continue;
            }
        }
        flush_bullets(&mut pending, &mut out);

        if line.contains("<pre") {
            in_pre = true;
        }
        if !in_pre {
            track_list_tags(line, &mut stack);
        }
        if line.contains("</pre>") {
            in_pre = false;
        }
        out.push(line.to_string());
    }
    flush_bullets(&mut pending, &mut out);

    let mut joined = out.join("\n");
    if html.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

fn flattened_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .filter(|rest| !rest.trim().is_empty())
}

fn flush_bullets(pending: &mut Vec<String>, out: &mut Vec<String>) {
    if pending.is_empty() {
        return;
    }
    out.push("<ul>".to_string());
    out.extend(pending.drain(..).map(|item| format!("<li>{item}</li>")));
    out.push("</ul>".to_string());
}

fn track_list_tags(line: &str, stack: &mut Vec<String>) {
    for captures in LIST_TAG.captures_iter(line) {
        let closing = !captures[1].is_empty();
        if closing {
            stack.pop();
        } else {
            stack.push(captures[2].to_string());
        }
    }
}

/// Tag a list whose nearest enclosing list is of the same kind.
pub(crate) fn annotate_nested_lists(html: &str) -> String {
    let mut stack: Vec<String> = Vec::new();
    LIST_TAG
        .replace_all(html, |captures: &Captures<'_>| {
            let kind = &captures[2];
            if !captures[1].is_empty() {
                stack.pop();
                return captures[0].to_string();
            }

            let nested = stack.last().map(String::as_str) == Some(kind);
            stack.push(kind.to_string());
            let attrs = captures.get(3).map_or("", |attrs| attrs.as_str());
            if !nested || attrs.contains(NESTED_LIST_CLASS) {
                return captures[0].to_string();
            }
            format!("<{kind}{attrs} class=\"{NESTED_LIST_CLASS}\">")
        })
        .into_owned()
}
