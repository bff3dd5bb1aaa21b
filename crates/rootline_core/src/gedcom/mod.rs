//! Text-hierarchy ingestion pipeline.
//!
//! # Responsibility
//! - Run preprocessor -> tokenizer -> assembler -> linking pass.
//! - Offer a chunked variant that yields after a bounded number of lines.
//!
//! # Invariants
//! - Parsing is synchronous and side-effect free over its input.
//! - Structural errors abort the whole parse; warnings never do.

pub mod assembler;
pub mod error;
pub mod lexer;
pub mod link;
pub mod preprocess;

pub use assembler::Assembler;
pub use error::{Diagnostics, ParseError, ParseResult, ParseWarning, WarningCode};
pub use lexer::{tokenize, LeveledLine, Tokenizer};
pub use link::{link_graph, LinkReport};
pub use preprocess::{preprocess, DetectionReason, PreprocessMode, PreprocessReport, Preprocessed};

use crate::model::graph::{EventKind, Graph};
use log::info;
use serde::{Deserialize, Serialize};

/// Default number of lines handled per cooperative step.
pub const DEFAULT_CHUNK_LINES: usize = 2_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    #[serde(default)]
    pub preprocess: PreprocessMode,
}

/// Result of a completed parse.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub graph: Graph,
    pub warnings: Vec<ParseWarning>,
    pub preprocess: PreprocessReport,
    pub link: LinkReport,
    pub line_count: usize,
}

/// Progress of a chunked operation, in physical lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParseProgress {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug)]
pub enum ParseStep {
    Pending(ParseProgress),
    Done(Box<ParseOutcome>),
}

/// Cooperative parser; call `step` until it returns `Done`.
#[derive(Debug)]
pub struct ChunkedParser {
    lines: Vec<String>,
    cursor: usize,
    /// Source line per entry of `lines`, when preprocessing rewrote the text.
    line_map: Option<Vec<usize>>,
    tokenizer: Tokenizer,
    assembler: Option<Assembler>,
    preprocess: PreprocessReport,
}

impl ChunkedParser {
    pub fn new(text: &str, options: &ParseOptions) -> Self {
        let prepared = preprocess(text, options.preprocess);
        let lines = lexer::physical_lines(&prepared.text)
            .map(|(_, line)| line.to_string())
            .collect();
        Self {
            lines,
            cursor: 0,
            line_map: prepared.line_map,
            tokenizer: Tokenizer::new(),
            assembler: Some(Assembler::new()),
            preprocess: prepared.report,
        }
    }

    pub fn progress(&self) -> ParseProgress {
        ParseProgress {
            current: self.cursor,
            total: self.lines.len(),
        }
    }

    /// Processes at most `max_lines` lines.
    ///
    /// Calling `step` again after `Done` yields an empty-document error.
    pub fn step(&mut self, max_lines: usize) -> ParseResult<ParseStep> {
        let end = self.cursor.saturating_add(max_lines.max(1)).min(self.lines.len());
        let Some(assembler) = self.assembler.as_mut() else {
            return Err(ParseError::Empty);
        };
        while self.cursor < end {
            let line_number = preprocess::source_line(self.line_map.as_deref(), self.cursor + 1);
            if let Some(line) = self
                .tokenizer
                .next_line(line_number, &self.lines[self.cursor])?
            {
                assembler.feed(&line)?;
            }
            self.cursor += 1;
        }
        if self.cursor < self.lines.len() {
            return Ok(ParseStep::Pending(self.progress()));
        }

        let Some(assembler) = self.assembler.take() else {
            return Err(ParseError::Empty);
        };
        if self.lines.iter().all(|line| line.trim().is_empty()) {
            return Err(ParseError::Empty);
        }
        let (mut graph, diagnostics) = assembler.finish();
        let link = link_graph(&mut graph);
        info!(
            "event=parse module=gedcom status=ok lines={} individuals={} families={} sources={} warnings={}",
            self.lines.len(),
            graph.individuals.len(),
            graph.families.len(),
            graph.sources.len(),
            diagnostics.warnings().len()
        );
        Ok(ParseStep::Done(Box::new(ParseOutcome {
            graph,
            warnings: diagnostics.into_warnings(),
            preprocess: std::mem::take(&mut self.preprocess),
            link,
            line_count: self.lines.len(),
        })))
    }
}

/// Parses a whole document in one call.
pub fn parse_document(text: &str, options: &ParseOptions) -> ParseResult<ParseOutcome> {
    let mut parser = ChunkedParser::new(text, options);
    loop {
        match parser.step(usize::MAX)? {
            ParseStep::Pending(_) => continue,
            ParseStep::Done(outcome) => return Ok(*outcome),
        }
    }
}

/// Counts family events (`MARR`, `DIV`...) without assembling records.
#[derive(Debug)]
pub struct FamilyEventCounter {
    lines: Vec<String>,
    cursor: usize,
    tokenizer: Tokenizer,
    in_family: bool,
    count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountStep {
    Pending(ParseProgress),
    Done(usize),
}

impl FamilyEventCounter {
    pub fn new(text: &str) -> Self {
        let body = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self {
            lines: lexer::physical_lines(body)
                .map(|(_, line)| line.to_string())
                .collect(),
            cursor: 0,
            tokenizer: Tokenizer::new(),
            in_family: false,
            count: 0,
        }
    }

    pub fn step(&mut self, max_lines: usize) -> ParseResult<CountStep> {
        let end = self.cursor.saturating_add(max_lines.max(1)).min(self.lines.len());
        while self.cursor < end {
            if let Some(line) = self
                .tokenizer
                .next_line(self.cursor + 1, &self.lines[self.cursor])?
            {
                match line.depth {
                    0 => self.in_family = line.tag == "FAM",
                    1 if self.in_family && EventKind::from_family_tag(&line.tag).is_some() => {
                        self.count += 1;
                    }
                    _ => {}
                }
            }
            self.cursor += 1;
        }
        if self.cursor < self.lines.len() {
            Ok(CountStep::Pending(ParseProgress {
                current: self.cursor,
                total: self.lines.len(),
            }))
        } else {
            Ok(CountStep::Done(self.count))
        }
    }
}

/// Counts family events in one call.
pub fn count_family_events(text: &str) -> ParseResult<usize> {
    let mut counter = FamilyEventCounter::new(text);
    loop {
        if let CountStep::Done(count) = counter.step(usize::MAX)? {
            return Ok(count);
        }
    }
}
