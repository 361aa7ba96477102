//! Pattern buffer over cleaned terminal text.
//!
//! Raw device output goes through a persistent `vte` parser, so escape
//! sequences split across reads are still removed. Backspaces erase the
//! previous character, which undoes the cursor dance IOS performs when
//! it redraws a line.

use regex::Regex;
use vte::{Parser, Perform};

/// Text captured by a successful pattern match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    /// Text received before the match.
    pub before: String,

    /// The matched text itself.
    pub after: String,

    /// Index of the pattern that matched.
    pub index: usize,
}

impl Captured {
    /// Full text consumed by this match (`before` followed by `after`).
    pub fn raw(&self) -> String {
        format!("{}{}", self.before, self.after)
    }
}

/// `vte` sink collecting printable text.
#[derive(Debug, Default)]
struct TextSink {
    text: String,
}

impl Perform for TextSink {
    fn print(&mut self, c: char) {
        self.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | b'\r' | b'\t' => self.text.push(byte as char),
            0x08 => {
                self.text.pop();
            }
            _ => {}
        }
    }
}

/// Buffer accumulating cleaned output until a pattern consumes it.
pub struct PatternBuffer {
    parser: Parser,
    sink: TextSink,
}

impl std::fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("text", &self.sink.text)
            .finish()
    }
}

impl PatternBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            sink: TextSink::default(),
        }
    }

    /// Feed raw bytes, stripping escape sequences and applying backspaces.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(&mut self.sink, data);
    }

    /// Find the earliest match among `patterns` and consume through it.
    ///
    /// When two patterns match at the same offset the one listed first wins.
    pub fn take_match(&mut self, patterns: &[&Regex]) -> Option<Captured> {
        let text = &self.sink.text;
        let mut best: Option<(usize, usize, usize)> = None;

        for (index, pattern) in patterns.iter().enumerate() {
            if let Some(m) = pattern.find(text) {
                let better = match best {
                    Some((start, _, _)) => m.start() < start,
                    None => true,
                };
                if better {
                    best = Some((m.start(), m.end(), index));
                }
            }
        }

        let (start, end, index) = best?;
        let consumed: String = self.sink.text.drain(..end).collect();
        Some(Captured {
            before: consumed[..start].to_string(),
            after: consumed[start..].to_string(),
            index,
        })
    }

    /// Take everything buffered so far.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.sink.text)
    }

    /// Pending, unmatched text.
    pub fn as_str(&self) -> &str {
        &self.sink.text
    }

    /// Last `chars` characters of pending text, for error reports.
    pub fn tail(&self, chars: usize) -> String {
        let text = &self.sink.text;
        let skip = text.chars().count().saturating_sub(chars);
        text.chars().skip(skip).collect()
    }

    /// Whether no text is pending.
    pub fn is_empty(&self) -> bool {
        self.sink.text.is_empty()
    }

    /// Drop all pending text.
    pub fn clear(&mut self) {
        self.sink.text.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"\x1b[32mGreen text\x1b[0m");
        assert_eq!(buffer.as_str(), "Green text");
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"router\x1b[");
        buffer.extend(b"0m#");
        assert_eq!(buffer.as_str(), "router#");
    }

    #[test]
    fn test_backspace_erases() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"--More--\x08\x08\x08\x08\x08\x08\x08\x08interface");
        assert_eq!(buffer.as_str(), "interface");
    }

    #[test]
    fn test_take_match_leftmost_wins() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"Delete flash:old.bin? [confirm]\r\nrouter#");

        let prompt = Regex::new(r"router#").unwrap();
        let confirm = Regex::new(r"\[confirm\]").unwrap();
        let captured = buffer.take_match(&[&prompt, &confirm]).unwrap();

        assert_eq!(captured.index, 1);
        assert_eq!(captured.before, "Delete flash:old.bin? ");
        assert_eq!(captured.after, "[confirm]");
        assert_eq!(buffer.as_str(), "\r\nrouter#");

        let captured = buffer.take_match(&[&prompt, &confirm]).unwrap();
        assert_eq!(captured.index, 0);
        assert_eq!(captured.raw(), "\r\nrouter#");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_match_tie_prefers_first() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"router(config)#");

        let submode = Regex::new(r"router\([^)]*\)#").unwrap();
        let hostname = Regex::new(r"router").unwrap();
        let captured = buffer.take_match(&[&submode, &hostname]).unwrap();
        assert_eq!(captured.index, 0);
        assert_eq!(captured.after, "router(config)#");
    }

    #[test]
    fn test_no_match_keeps_text() {
        let mut buffer = PatternBuffer::new();
        buffer.extend(b"Building configuration...");
        let prompt = Regex::new(r"router#").unwrap();
        assert!(buffer.take_match(&[&prompt]).is_none());
        assert_eq!(buffer.tail(8), "ation...");
    }
}
