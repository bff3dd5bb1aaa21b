//! Parse errors and run-scoped diagnostics.
//!
//! # Invariants
//! - Structural errors always carry the 1-based source line number.
//! - Diagnostics are owned by one parse run; "warn once" state never leaks
//!   across runs.

use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_LINE_EXCERPT_CHARS: usize = 60;

pub type ParseResult<T> = Result<T, ParseError>;

/// Structural failure that aborts parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line does not match `depth [@xref@] TAG [value]`.
    MalformedLine { line: usize, excerpt: String },
    /// Depth increased by more than one level.
    DepthJump {
        line: usize,
        depth: usize,
        previous: usize,
    },
    /// Document does not start with a `0 HEAD` record.
    MissingHeader { line: usize },
    /// A mandatory value (e.g. record cross-reference id) is missing or invalid.
    InvalidValue {
        line: usize,
        tag: String,
        message: String,
    },
    /// Document contains no lines at all.
    Empty,
}

impl ParseError {
    pub(crate) fn malformed(line: usize, content: &str) -> Self {
        Self::MalformedLine {
            line,
            excerpt: content.chars().take(MAX_LINE_EXCERPT_CHARS).collect(),
        }
    }

    /// 1-based line number of the failure, `0` for empty documents.
    pub fn line(&self) -> usize {
        match self {
            Self::MalformedLine { line, .. }
            | Self::DepthJump { line, .. }
            | Self::MissingHeader { line }
            | Self::InvalidValue { line, .. } => *line,
            Self::Empty => 0,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedLine { line, excerpt } => {
                write!(f, "line {line}: malformed line `{excerpt}`")
            }
            Self::DepthJump {
                line,
                depth,
                previous,
            } => write!(
                f,
                "line {line}: level {depth} cannot follow level {previous}"
            ),
            Self::MissingHeader { line } => {
                write!(f, "line {line}: document must start with `0 HEAD`")
            }
            Self::InvalidValue { line, tag, message } => {
                write!(f, "line {line}: invalid `{tag}` value: {message}")
            }
            Self::Empty => write!(f, "document is empty"),
        }
    }
}

impl Error for ParseError {}

/// Classes of non-fatal parse warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    UnsupportedVersion,
    MissingTrailer,
    ContentAfterTrailer,
    UnknownRecord,
    DuplicateRecord,
    OrphanContinuation,
}

impl WarningCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedVersion => "unsupported_version",
            Self::MissingTrailer => "missing_trailer",
            Self::ContentAfterTrailer => "content_after_trailer",
            Self::UnknownRecord => "unknown_record",
            Self::DuplicateRecord => "duplicate_record",
            Self::OrphanContinuation => "orphan_continuation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub code: WarningCode,
    pub line: Option<usize>,
    pub message: String,
}

/// Run-scoped warning sink.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<ParseWarning>,
    reported_classes: BTreeSet<WarningCode>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, code: WarningCode, line: Option<usize>, message: impl Into<String>) {
        self.reported_classes.insert(code);
        self.warnings.push(ParseWarning {
            code,
            line,
            message: message.into(),
        });
    }

    /// Records the warning only for the first occurrence of its class.
    pub fn warn_once(
        &mut self,
        code: WarningCode,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> bool {
        if self.reported_classes.contains(&code) {
            return false;
        }
        self.warn(code, line, message);
        true
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ParseWarning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::{Diagnostics, ParseError, WarningCode};

    #[test]
    fn warn_once_suppresses_repeated_class() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.warn_once(WarningCode::UnknownRecord, Some(3), "first"));
        assert!(!diagnostics.warn_once(WarningCode::UnknownRecord, Some(9), "second"));
        assert_eq!(diagnostics.warnings().len(), 1);
    }

    #[test]
    fn malformed_error_truncates_excerpt() {
        let error = ParseError::malformed(7, &"x".repeat(200));
        assert_eq!(error.line(), 7);
        assert!(error.to_string().starts_with("line 7:"));
        assert!(error.to_string().len() < 120);
    }
}
