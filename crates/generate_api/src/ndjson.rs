use serde_json::Value;
use tracing::debug;

use crate::events::GenerateStreamEvent;

/// Incremental parser for newline-delimited JSON response bodies.
///
/// Bytes are buffered until a `\n` arrives, so chunks may split a line or a
/// UTF-8 sequence anywhere. Lines that are not JSON objects, or that carry
/// neither `response`, `done` nor `error`, are skipped.
#[derive(Debug, Default)]
pub struct NdjsonStreamParser {
    buffer: Vec<u8>,
}

impl NdjsonStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<GenerateStreamEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=split).collect();
            map_line(&line[..line.len() - 1], &mut events);
        }

        events
    }

    /// Drain a trailing line that was not newline-terminated before stream end.
    pub fn finish(&mut self) -> Vec<GenerateStreamEvent> {
        let mut events = Vec::new();
        let line = std::mem::take(&mut self.buffer);
        map_line(&line, &mut events);
        events
    }

    /// Parse a complete body in one shot.
    pub fn parse_body(input: &str) -> Vec<GenerateStreamEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn map_line(line: &[u8], events: &mut Vec<GenerateStreamEvent>) {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let value = match serde_json::from_str::<Value>(line) {
        Ok(value) => value,
        Err(error) => {
            debug!(%error, "skipping malformed stream line");
            return;
        }
    };

    if let Some(message) = value.get("error").and_then(Value::as_str) {
        events.push(GenerateStreamEvent::Error {
            message: message.to_string(),
        });
        return;
    }

    let mut recognized = false;
    if let Some(text) = value.get("response").and_then(Value::as_str) {
        events.push(GenerateStreamEvent::Fragment {
            text: text.to_string(),
        });
        recognized = true;
    }

    if value.get("done").and_then(Value::as_bool) == Some(true) {
        let done_reason = value
            .get("done_reason")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        events.push(GenerateStreamEvent::Done { done_reason });
        recognized = true;
    }

    if !recognized {
        debug!("skipping stream line without a response field");
    }
}

#[cfg(test)]
mod tests {
    use super::NdjsonStreamParser;
    use crate::events::GenerateStreamEvent;

    #[test]
    fn parse_lines_incrementally() {
        let mut parser = NdjsonStreamParser::default();
        let mut events = Vec::new();

        events.extend(parser.feed(b"{\"response\":\"Hel\"}\n{\"respo"));
        assert_eq!(events.len(), 1);

        events.extend(parser.feed(b"nse\":\"lo\"}\n"));
        assert_eq!(events.len(), 2);
        assert!(parser.is_empty_buffer());
        assert_eq!(events[1].fragment(), Some("lo"));
    }

    #[test]
    fn split_utf8_sequence_is_reassembled() {
        let line = "{\"response\":\"caf\u{e9}\"}\n".as_bytes();
        let split = line.len() - 4;
        let mut parser = NdjsonStreamParser::default();

        assert!(parser.feed(&line[..split]).is_empty());
        let events = parser.feed(&line[split..]);
        assert_eq!(
            events,
            vec![GenerateStreamEvent::Fragment {
                text: "caf\u{e9}".to_string(),
            }]
        );
    }

    #[test]
    fn finish_drains_unterminated_line() {
        let mut parser = NdjsonStreamParser::default();
        assert!(parser.feed(b"{\"response\":\"tail\"}").is_empty());
        assert!(!parser.is_empty_buffer());
        assert_eq!(parser.finish()[0].fragment(), Some("tail"));
        assert!(parser.is_empty_buffer());
    }
}
