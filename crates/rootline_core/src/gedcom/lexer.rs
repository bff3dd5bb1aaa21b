//! Line tokenizer for the depth-tagged text format.
//!
//! # Responsibility
//! - Split document text into leveled lines `(depth, xref, tag, value)`.
//! - Reject lines that break the grammar or jump more than one level.
//!
//! # Invariants
//! - Blank lines are skipped but still counted for line numbers.
//! - No semantic validation happens here.

use crate::gedcom::error::{ParseError, ParseResult};
use once_cell::sync::Lazy;
use regex::Regex;

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[ \t]+(?:(@[^@\s]+@)[ \t]+)?([A-Za-z0-9_]+)(?:[ \t](.*))?$")
        .expect("valid line regex")
});

const BYTE_ORDER_MARK: char = '\u{feff}';

/// One tokenized line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeveledLine {
    pub depth: usize,
    /// Cross-reference id with `@` delimiters stripped.
    pub xref: Option<String>,
    pub tag: String,
    pub value: String,
    /// 1-based line number in the source document.
    pub line_number: usize,
}

impl LeveledLine {
    /// Pointer target when the value is a `@xref@` reference.
    pub fn pointer(&self) -> Option<String> {
        parse_pointer(&self.value)
    }
}

/// Strips `@` delimiters from a pointer value.
pub fn parse_pointer(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let inner = trimmed.strip_prefix('@')?.strip_suffix('@')?;
    if inner.is_empty() || inner.contains('@') {
        return None;
    }
    Some(inner.to_string())
}

/// Incremental tokenizer that keeps the depth state between lines.
#[derive(Debug, Default)]
pub struct Tokenizer {
    previous_depth: Option<usize>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenizes one physical line. Returns `None` for blank lines.
    pub fn next_line(&mut self, line_number: usize, raw: &str) -> ParseResult<Option<LeveledLine>> {
        let raw = if line_number == 1 {
            raw.trim_start_matches(BYTE_ORDER_MARK)
        } else {
            raw
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let caps = LINE_RE
            .captures(trimmed)
            .ok_or_else(|| ParseError::malformed(line_number, trimmed))?;
        let depth = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .ok_or_else(|| ParseError::malformed(line_number, trimmed))?;

        match self.previous_depth {
            None if depth != 0 => {
                return Err(ParseError::DepthJump {
                    line: line_number,
                    depth,
                    previous: 0,
                });
            }
            Some(previous) if depth > previous + 1 => {
                return Err(ParseError::DepthJump {
                    line: line_number,
                    depth,
                    previous,
                });
            }
            _ => {}
        }
        self.previous_depth = Some(depth);

        Ok(Some(LeveledLine {
            depth,
            xref: caps.get(2).and_then(|m| parse_pointer(m.as_str())),
            tag: caps.get(3).map_or_else(String::new, |m| m.as_str().to_ascii_uppercase()),
            value: caps.get(4).map_or_else(String::new, |m| m.as_str().to_string()),
            line_number,
        }))
    }
}

/// Iterates physical lines with 1-based numbers, accepting `\n`, `\r\n` and `\r`.
pub fn physical_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    split_terminated(text)
        .enumerate()
        .map(|(index, (line, _))| (index + 1, line))
}

/// Splits text into `(content, terminator)` pairs.
///
/// The last pair has an empty terminator and may have empty content.
pub fn split_terminated(text: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(|c: char| c == '\n' || c == '\r') {
            Some(index) => {
                let width = if current[index..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&current[index + width..]);
                Some((&current[..index], &current[index..index + width]))
            }
            None => {
                rest = None;
                Some((current, ""))
            }
        }
    })
}

/// Tokenizes a whole document.
pub fn tokenize(text: &str) -> ParseResult<Vec<LeveledLine>> {
    let mut tokenizer = Tokenizer::new();
    let mut lines = Vec::new();
    for (line_number, raw) in physical_lines(text) {
        if let Some(line) = tokenizer.next_line(line_number, raw)? {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(lines)
}
