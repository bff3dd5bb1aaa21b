//! Text-format anonymizer for shareable test documents.
//!
//! # Responsibility
//! - Replace names, places, dates and free text with stable placeholders
//!   while keeping levels, tags and cross-references intact.
//!
//! # Invariants
//! - The same input value always maps to the same placeholder within a run.
//! - Lines that are not `level [@xref@] TAG [value]` pass through untouched.
//! - Blank lines are kept; a leading byte-order mark is dropped.

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s+(@[^@]+@\s+)?(\w+)(\s+(.*))?$").expect("valid line regex")
});
static FULL_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}\s+\w{3}\s+\d{4}").expect("valid full date regex"));
static QUALIFIED_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(ABT|BEF|AFT|CAL|EST)\s+\d{4}").expect("valid qualified year regex")
});
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}").expect("valid year regex"));

const PLACEHOLDER_DATE: &str = "1 JAN 1900";
const PLACEHOLDER_YEAR: &str = "1900";
const PLACEHOLDER_TEXT: &str = "[anonymized text]";
const PLACEHOLDER_FIELD: &str = "[anonymized]";

const TEXT_TAGS: &[&str] = &["NOTE", "TEXT", "CONT", "CONC"];
const FIELD_TAGS: &[&str] = &[
    "GIVN", "SURN", "NPFX", "NSFX", "NICK", "ADDR", "ADR1", "ADR2", "CITY", "STAE", "POST",
    "CTRY", "PHON", "EMAIL", "WWW", "FAX",
];
/// Unmatched lines this close to the top are reported; they usually mean a
/// broken header.
const HEADER_WARNING_LINES: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizeOptions {
    pub keep_dates: bool,
    pub keep_places: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnonymizeReport {
    pub lines: usize,
    pub unique_names: usize,
    pub unique_places: usize,
    pub dates_replaced: usize,
    pub fields_replaced: usize,
    /// 1-based numbers of unmatched lines near the top of the document.
    pub suspicious_lines: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnonymizeOutput {
    pub text: String,
    pub report: AnonymizeReport,
}

/// Stable value -> `"<prefix> N"` mapping.
#[derive(Debug, Default)]
struct PlaceholderMap {
    prefix: &'static str,
    values: BTreeMap<String, String>,
}

impl PlaceholderMap {
    fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            values: BTreeMap::new(),
        }
    }

    fn get(&mut self, value: &str) -> String {
        let next = self.values.len() + 1;
        self.values
            .entry(value.to_string())
            .or_insert_with(|| format!("{} {next}", self.prefix))
            .clone()
    }
}

/// Anonymizes a whole document. Output lines end with `\n`.
pub fn anonymize(text: &str, options: &AnonymizeOptions) -> AnonymizeOutput {
    let mut run = Anonymizer {
        options: *options,
        names: PlaceholderMap::new("Person"),
        places: PlaceholderMap::new("Place"),
        report: AnonymizeReport::default(),
    };
    let mut out = String::with_capacity(text.len());
    for (index, line) in text.trim_start_matches('\u{feff}').lines().enumerate() {
        if line.trim().is_empty() {
            out.push_str(line);
        } else {
            out.push_str(&run.line(line, index));
        }
        out.push('\n');
        run.report.lines += 1;
    }
    run.report.unique_names = run.names.values.len();
    run.report.unique_places = run.places.values.len();
    info!(
        "event=anonymize module=anonymize status=ok lines={} names={} places={} dates={} fields={} suspicious={}",
        run.report.lines,
        run.report.unique_names,
        run.report.unique_places,
        run.report.dates_replaced,
        run.report.fields_replaced,
        run.report.suspicious_lines.len()
    );
    AnonymizeOutput {
        text: out,
        report: run.report,
    }
}

struct Anonymizer {
    options: AnonymizeOptions,
    names: PlaceholderMap,
    places: PlaceholderMap,
    report: AnonymizeReport,
}

impl Anonymizer {
    fn line(&mut self, line: &str, index: usize) -> String {
        let line = line.trim_start_matches('\u{feff}');
        let Some(captures) = LINE_RE.captures(line) else {
            if index < HEADER_WARNING_LINES {
                self.report.suspicious_lines.push(index + 1);
            }
            return line.to_string();
        };
        let level = &captures[1];
        let xref = captures.get(2).map_or("", |m| m.as_str());
        let tag = &captures[3];
        let value = captures.get(5).map_or("", |m| m.as_str());
        let base = format!("{level} {xref}{tag}");

        let replaced = match tag {
            "NAME" if !value.is_empty() => Some(self.names.get(value)),
            "PLAC" if !value.is_empty() && !self.options.keep_places => {
                Some(self.places.get(value))
            }
            "DATE" if !self.options.keep_dates => self.date(value),
            _ if TEXT_TAGS.contains(&tag) => self.field(value, PLACEHOLDER_TEXT),
            _ if FIELD_TAGS.contains(&tag) => self.field(value, PLACEHOLDER_FIELD),
            "TITL" if level == "1" => self.field(value, PLACEHOLDER_FIELD),
            _ => None,
        };
        let value = replaced.as_deref().unwrap_or(value);
        if value.is_empty() {
            base
        } else {
            format!("{base} {value}")
        }
    }

    /// Placeholder keeping the date's shape; unknown shapes stay as they are.
    fn date(&mut self, value: &str) -> Option<String> {
        let replacement = if FULL_DATE_RE.is_match(value) {
            PLACEHOLDER_DATE.to_string()
        } else if let Some(captures) = QUALIFIED_YEAR_RE.captures(value) {
            format!("{} {PLACEHOLDER_YEAR}", &captures[1])
        } else if YEAR_RE.is_match(value) {
            PLACEHOLDER_YEAR.to_string()
        } else {
            return None;
        };
        self.report.dates_replaced += 1;
        Some(replacement)
    }

    fn field(&mut self, value: &str, placeholder: &str) -> Option<String> {
        if value.trim().is_empty() {
            return Some(String::new());
        }
        self.report.fields_replaced += 1;
        Some(placeholder.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{anonymize, AnonymizeOptions};

    const DOCUMENT: &str = "\u{feff}0 HEAD\n\
        1 GEDC\n\
        2 VERS 5.5.1\n\
        0 @I1@ INDI\n\
        1 NAME John /Smith/\n\
        2 GIVN John\n\
        1 BIRT\n\
        2 DATE 15 MAR 1950\n\
        2 PLAC Boston, Massachusetts\n\
        1 DEAT\n\
        2 DATE ABT 2001\n\
        2 PLAC Boston, Massachusetts\n\
        1 NOTE Loved gardening\n\
        2 CONT and fishing\n\
        1 FAMS @F1@\n\
        0 @I2@ INDI\n\
        1 NAME John /Smith/\n\
        1 BIRT\n\
        2 DATE 1952\n\
        \n\
        0 @S1@ SOUR\n\
        1 TITL Parish register\n\
        0 TRLR\n";

    #[test]
    fn replaces_identifying_values_and_keeps_structure() {
        let output = anonymize(DOCUMENT, &AnonymizeOptions::default());
        let lines: Vec<&str> = output.text.lines().collect();
        assert_eq!(lines[0], "0 HEAD");
        assert_eq!(lines[3], "0 @I1@ INDI");
        assert_eq!(lines[4], "1 NAME Person 1");
        assert_eq!(lines[5], "2 GIVN [anonymized]");
        assert_eq!(lines[7], "2 DATE 1 JAN 1900");
        assert_eq!(lines[8], "2 PLAC Place 1");
        assert_eq!(lines[10], "2 DATE ABT 1900");
        assert_eq!(lines[11], "2 PLAC Place 1");
        assert_eq!(lines[12], "1 NOTE [anonymized text]");
        assert_eq!(lines[13], "2 CONT [anonymized text]");
        assert_eq!(lines[14], "1 FAMS @F1@");
        assert_eq!(lines[16], "1 NAME Person 1");
        assert_eq!(lines[18], "2 DATE 1900");
        assert_eq!(lines[19], "");
        assert_eq!(lines[21], "1 TITL [anonymized]");
        assert_eq!(output.report.unique_names, 1);
        assert_eq!(output.report.unique_places, 1);
        assert_eq!(output.report.dates_replaced, 3);
        assert_eq!(output.report.lines, 23);
    }

    #[test]
    fn keep_flags_preserve_dates_and_places() {
        let options = AnonymizeOptions {
            keep_dates: true,
            keep_places: true,
        };
        let output = anonymize(DOCUMENT, &options);
        assert!(output.text.contains("2 DATE 15 MAR 1950\n"));
        assert!(output.text.contains("2 PLAC Boston, Massachusetts\n"));
        assert!(!output.text.contains("John"));
        assert_eq!(output.report.unique_places, 0);
    }

    #[test]
    fn unknown_lines_and_date_shapes_pass_through() {
        let input = "garbage line\n0 HEAD\n1 DATE BET 1900 AND 1910\n";
        let output = anonymize(input, &AnonymizeOptions::default());
        assert_eq!(output.text, input);
        assert_eq!(output.report.suspicious_lines, vec![1]);
    }
}
