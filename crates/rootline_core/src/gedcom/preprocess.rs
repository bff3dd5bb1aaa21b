//! Compatibility preprocessor for malformed vendor exports.
//!
//! # Responsibility
//! - Detect known export malformations from a bounded document prefix.
//! - Normalize byte-order marks, `CONC` runs, broken line wraps, double
//!   escaped entities and inline markup before tokenization.
//! - Report per-category fix counts.
//!
//! # Invariants
//! - Idempotent: preprocessing clean output reports zero fixes.
//! - When no fix applies the input is returned unchanged (borrowed).
//! - Lines no fix touches are copied byte for byte, terminators included.
//! - Every output line maps back to its 1-based source line.
//! - Detection never scans more than `DETECTION_SAMPLE_BYTES` bytes.

use crate::gedcom::lexer::split_terminated;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

const DETECTION_SAMPLE_BYTES: usize = 64 * 1024;
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Header `SOUR` values of vendors known to emit the malformations above.
const KNOWN_PROBLEM_VENDORS: &[&str] = &["MYHERITAGE", "FAMILYTREEBUILDER", "FTB"];

static LOOSE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2})[ \t]+(?:(@[^@\s]+@)[ \t]+)?([A-Za-z0-9_]+)(?:[ \t](.*))?$")
        .expect("valid loose line regex")
});
static VENDOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*1[ \t]+SOUR[ \t]+(\S+)").expect("valid vendor regex"));
static DOUBLE_ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&amp;(?:lt|gt|amp|quot|apos|nbsp|#\d{1,5});").expect("valid double entity regex")
});
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(lt|gt|amp|quot|apos|nbsp|#\d{1,5});").expect("valid entity regex")
});
static BREAK_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*br\s*/?\s*>").expect("valid break regex"));
static DECORATIVE_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?\s*(?:b|i|u|em|strong|span|font|p|div|small|big)(?:\s[^<>]*)?>")
        .expect("valid decorative tag regex")
});
static ESCAPED_NEWLINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\\r)?\\n").expect("valid escaped newline regex"));

/// When the preprocessor runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessMode {
    /// Never modify input.
    Off,
    /// Always apply fixes.
    Forced,
    /// Apply fixes only when detection fires.
    #[default]
    Auto,
}

/// Why fixes were applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum DetectionReason {
    Forced,
    ByteOrderMark,
    KnownVendor(String),
    DoubleEscapedEntities,
}

/// Fix counts per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessReport {
    pub mode: Option<PreprocessMode>,
    pub reasons: Vec<DetectionReason>,
    pub applied: bool,
    pub bom_removed: bool,
    pub continuations_joined: usize,
    pub embedded_breaks_repaired: usize,
    pub entities_repaired: usize,
    pub breaks_converted: usize,
    pub tags_stripped: usize,
    pub escaped_newlines_collapsed: usize,
}

impl PreprocessReport {
    pub fn total_fixes(&self) -> usize {
        usize::from(self.bom_removed)
            + self.continuations_joined
            + self.embedded_breaks_repaired
            + self.entities_repaired
            + self.breaks_converted
            + self.tags_stripped
            + self.escaped_newlines_collapsed
    }
}

/// Preprocessor output.
#[derive(Debug, Clone)]
pub struct Preprocessed<'a> {
    pub text: Cow<'a, str>,
    pub report: PreprocessReport,
    /// Source line of each output line; `None` when the text is unchanged.
    pub line_map: Option<Vec<usize>>,
}

impl Preprocessed<'_> {
    /// Source line number for a 1-based output line.
    pub fn source_line(&self, output_line: usize) -> usize {
        source_line(self.line_map.as_deref(), output_line)
    }
}

pub(crate) fn source_line(line_map: Option<&[usize]>, output_line: usize) -> usize {
    line_map
        .and_then(|map| map.get(output_line.checked_sub(1)?).copied())
        .unwrap_or(output_line)
}

/// Runs detection on a bounded prefix of the document.
pub fn detect(text: &str) -> Vec<DetectionReason> {
    let mut reasons = Vec::new();
    if text.starts_with(BYTE_ORDER_MARK) {
        reasons.push(DetectionReason::ByteOrderMark);
    }
    let sample = bounded_sample(text, DETECTION_SAMPLE_BYTES);
    if let Some(vendor) = VENDOR_RE
        .captures(sample)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
    {
        if KNOWN_PROBLEM_VENDORS
            .iter()
            .any(|known| vendor.starts_with(known))
        {
            reasons.push(DetectionReason::KnownVendor(vendor));
        }
    }
    if DOUBLE_ENTITY_RE.is_match(sample) {
        reasons.push(DetectionReason::DoubleEscapedEntities);
    }
    reasons
}

/// Applies compatibility fixes according to `mode`.
pub fn preprocess(text: &str, mode: PreprocessMode) -> Preprocessed<'_> {
    let mut report = PreprocessReport {
        mode: Some(mode),
        ..PreprocessReport::default()
    };
    match mode {
        PreprocessMode::Off => {
            return Preprocessed {
                text: Cow::Borrowed(text),
                report,
                line_map: None,
            };
        }
        PreprocessMode::Forced => report.reasons.push(DetectionReason::Forced),
        PreprocessMode::Auto => {
            report.reasons = detect(text);
            if report.reasons.is_empty() {
                debug!("event=preprocess module=gedcom status=skipped reason=not_detected");
                return Preprocessed {
                    text: Cow::Borrowed(text),
                    report,
                    line_map: None,
                };
            }
        }
    }

    let body = match text.strip_prefix(BYTE_ORDER_MARK) {
        Some(rest) => {
            report.bom_removed = true;
            rest
        }
        None => text,
    };

    let mut entries = collect_entries(body, &mut report);
    for entry in &mut entries {
        let repaired = repair_value(&entry.value, &mut report);
        if repaired != entry.value {
            entry.value = repaired;
            entry.rewrite = true;
        }
    }

    report.applied = report.total_fixes() > 0;
    if !report.applied {
        return Preprocessed {
            text: Cow::Borrowed(text),
            report,
            line_map: None,
        };
    }

    let mut output = Output {
        text: String::with_capacity(body.len()),
        line_map: Vec::new(),
    };
    for entry in &entries {
        entry.write_to(&mut output);
    }
    info!(
        "event=preprocess module=gedcom status=ok fixes={} bom={} conc={} breaks={} entities={} markup_breaks={} tags={} escaped_newlines={}",
        report.total_fixes(),
        report.bom_removed,
        report.continuations_joined,
        report.embedded_breaks_repaired,
        report.entities_repaired,
        report.breaks_converted,
        report.tags_stripped,
        report.escaped_newlines_collapsed
    );
    Preprocessed {
        text: Cow::Owned(output.text),
        report,
        line_map: Some(output.line_map),
    }
}

struct Output {
    text: String,
    line_map: Vec<usize>,
}

impl Output {
    fn push_line(&mut self, content: &str, terminator: &str, source_line: usize) {
        self.text.push_str(content);
        self.text.push_str(terminator);
        self.line_map.push(source_line);
    }
}

/// One physical source line.
#[derive(Debug)]
struct SourceLine {
    number: usize,
    content: String,
    terminator: String,
}

/// One logical line: base line plus its joined continuations.
#[derive(Debug)]
struct Entry {
    depth: usize,
    xref: Option<String>,
    tag: String,
    /// Logical value; `\n` marks a `CONT` boundary.
    value: String,
    has_value: bool,
    /// Unparseable line kept verbatim (only before the first record).
    verbatim: bool,
    /// Every physical line folded into this entry, blank ones included.
    source: Vec<SourceLine>,
    /// Set when a fix changed the entry.
    rewrite: bool,
}

impl Entry {
    fn new(line: SourceLine) -> Self {
        Self {
            depth: 0,
            xref: None,
            tag: String::new(),
            value: String::new(),
            has_value: false,
            verbatim: true,
            source: vec![line],
            rewrite: false,
        }
    }

    fn write_to(&self, output: &mut Output) {
        if !self.rewrite {
            for line in &self.source {
                output.push_line(&line.content, &line.terminator, line.number);
            }
            return;
        }
        let Some(first_line) = self.source.first() else {
            return;
        };
        let terminator = match first_line.terminator.as_str() {
            "" => "\n",
            other => other,
        };
        let mut segments = self.value.split('\n');
        let first = segments.next().unwrap_or_default();
        let mut head = self.depth.to_string();
        head.push(' ');
        if let Some(xref) = &self.xref {
            head.push_str(xref);
            head.push(' ');
        }
        head.push_str(&self.tag);
        if self.has_value && !first.is_empty() {
            head.push(' ');
            head.push_str(first);
        }
        output.push_line(&head, terminator, first_line.number);
        for segment in segments {
            let mut line = format!("{} CONT", self.depth + 1);
            if !segment.is_empty() {
                line.push(' ');
                line.push_str(segment);
            }
            output.push_line(&line, terminator, first_line.number);
        }
        // Blank lines carry no data but keep their bytes.
        for blank in self.source.iter().filter(|line| line.content.trim().is_empty()) {
            output.push_line(&blank.content, &blank.terminator, blank.number);
        }
    }
}

fn collect_entries(body: &str, report: &mut PreprocessReport) -> Vec<Entry> {
    let mut entries: Vec<Entry> = Vec::new();
    for (index, (content, terminator)) in split_terminated(body).enumerate() {
        let source = SourceLine {
            number: index + 1,
            content: content.to_string(),
            terminator: terminator.to_string(),
        };
        if content.trim().is_empty() {
            match entries.last_mut() {
                Some(previous) => previous.source.push(source),
                None if content.is_empty() && terminator.is_empty() => {}
                None => entries.push(Entry::new(source)),
            }
            continue;
        }
        let Some(caps) = LOOSE_LINE_RE.captures(content) else {
            match entries.last_mut() {
                Some(previous) if !previous.verbatim => {
                    // Vendor wrapped a value onto a new physical line.
                    previous.value.push('\n');
                    previous.value.push_str(content.trim_end());
                    previous.has_value = true;
                    previous.rewrite = true;
                    previous.source.push(source);
                    report.embedded_breaks_repaired += 1;
                }
                _ => entries.push(Entry::new(source)),
            }
            continue;
        };

        let depth = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or_default();
        let tag = caps.get(3).map_or("", |m| m.as_str());
        let value = caps.get(4).map(|m| m.as_str());
        let upper_tag = tag.to_ascii_uppercase();

        if upper_tag == "CONC" || upper_tag == "CONT" {
            if let Some(owner) = entries
                .last_mut()
                .filter(|owner| !owner.verbatim && owner.depth + 1 == depth)
            {
                if upper_tag == "CONC" {
                    owner.value.push_str(value.unwrap_or_default());
                    owner.rewrite = true;
                    report.continuations_joined += 1;
                } else {
                    owner.value.push('\n');
                    owner.value.push_str(value.unwrap_or_default());
                }
                owner.has_value = true;
                owner.source.push(source);
                continue;
            }
        }

        entries.push(Entry {
            depth,
            xref: caps.get(2).map(|m| m.as_str().to_string()),
            tag: tag.to_string(),
            value: value.unwrap_or_default().to_string(),
            has_value: value.is_some(),
            verbatim: false,
            source: vec![source],
            rewrite: false,
        });
    }
    entries
}

fn repair_value(value: &str, report: &mut PreprocessReport) -> String {
    if value.is_empty() {
        return String::new();
    }
    let mut current = value.to_string();

    // Double escaping needs repeated decoding until nothing changes.
    loop {
        let count = ENTITY_RE.find_iter(&current).count();
        if count == 0 {
            break;
        }
        report.entities_repaired += count;
        current = ENTITY_RE
            .replace_all(&current, |caps: &regex::Captures<'_>| decode_entity(&caps[1]))
            .into_owned();
    }
    if current.contains('\r') {
        current = current.replace("\r\n", "\n").replace('\r', "\n");
    }

    let breaks = BREAK_TAG_RE.find_iter(&current).count();
    if breaks > 0 {
        report.breaks_converted += breaks;
        current = BREAK_TAG_RE.replace_all(&current, "\n").into_owned();
    }

    let tags = DECORATIVE_TAG_RE.find_iter(&current).count();
    if tags > 0 {
        report.tags_stripped += tags;
        current = DECORATIVE_TAG_RE.replace_all(&current, "").into_owned();
    }

    let escaped = ESCAPED_NEWLINE_RE.find_iter(&current).count();
    if escaped > 0 {
        report.escaped_newlines_collapsed += escaped;
        current = ESCAPED_NEWLINE_RE.replace_all(&current, " ").into_owned();
    }
    current
}

fn decode_entity(name: &str) -> String {
    match name {
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "amp" => "&".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        "nbsp" => " ".to_string(),
        numeric => match numeric
            .strip_prefix('#')
            .and_then(|digits| digits.parse::<u32>().ok())
            .and_then(char::from_u32)
        {
            // Line breaks become value breaks, emitted later as `CONT`.
            Some(ch @ ('\r' | '\n')) => ch.to_string(),
            Some(ch) if ch.is_control() && ch != '\t' => String::new(),
            Some(ch) => ch.to_string(),
            None => String::new(),
        },
    }
}

fn bounded_sample(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
