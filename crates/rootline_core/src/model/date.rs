//! Genealogical date model.
//!
//! # Responsibility
//! - Classify interchange date text by qualifier and range shape.
//! - Normalize calendar points to `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
//! - Format normalized dates back into the text-hierarchy date grammar.
//!
//! # Invariants
//! - `raw` always keeps the original text, even when parsing fails.
//! - `start`/`end` are only set to validated calendar points.
//! - Unparseable text falls back to year-only precision when a year is present.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

static ISO_POINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3,4})(?:-(\d{1,2})(?:-(\d{1,2}))?)?$").expect("valid iso regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{3,4})\b").expect("valid year regex"));
static DUAL_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3,4})/\d{1,2}$").expect("valid dual year regex"));

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Qualifier classification of one date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
    Exact,
    About,
    Before,
    After,
    Estimated,
    Calculated,
    Range,
    Unknown,
}

impl DatePrecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::About => "about",
            Self::Before => "before",
            Self::After => "after",
            Self::Estimated => "estimated",
            Self::Calculated => "calculated",
            Self::Range => "range",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "about" => Some(Self::About),
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            "estimated" => Some(Self::Estimated),
            "calculated" => Some(Self::Calculated),
            "range" => Some(Self::Range),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    fn gedcom_prefix(self) -> Option<&'static str> {
        match self {
            Self::About => Some("ABT"),
            Self::Before => Some("BEF"),
            Self::After => Some("AFT"),
            Self::Estimated => Some("EST"),
            Self::Calculated => Some("CAL"),
            _ => None,
        }
    }
}

/// Shape of a two-endpoint date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStyle {
    /// `BET x AND y`: the event happened at some point inside the window.
    Between,
    /// `FROM x TO y`: the state lasted for the whole window.
    Period,
}

/// Parsed genealogical date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenDate {
    pub precision: DatePrecision,
    /// Original text as it appeared in the source document.
    pub raw: String,
    /// First (or only) normalized calendar point.
    pub start: Option<String>,
    /// Second calendar point, only for ranges.
    pub end: Option<String>,
    pub range_style: Option<RangeStyle>,
}

impl GenDate {
    /// Parses one date value. Never fails; see module invariants.
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        let mut date = Self {
            precision: DatePrecision::Unknown,
            raw: text.to_string(),
            start: None,
            end: None,
            range_style: None,
        };
        if text.is_empty() {
            return date;
        }

        let upper = text.to_ascii_uppercase();
        // Interpreted dates carry a trailing phrase: `INT 1950 (about then)`.
        let without_phrase = match upper.find('(') {
            Some(index) => upper[..index].trim().to_string(),
            None => upper.clone(),
        };
        let tokens: Vec<&str> = without_phrase.split_whitespace().collect();
        if tokens.is_empty() {
            return date;
        }

        let (qualifier, rest) = split_qualifier(&tokens);
        match qualifier {
            Qualifier::Between | Qualifier::From => {
                let separator = if qualifier == Qualifier::Between {
                    "AND"
                } else {
                    "TO"
                };
                let style = if qualifier == Qualifier::Between {
                    RangeStyle::Between
                } else {
                    RangeStyle::Period
                };
                match rest.iter().position(|token| *token == separator) {
                    Some(split) => {
                        match (parse_point(&rest[..split]), parse_point(&rest[split + 1..])) {
                            (Some(start), Some(end)) => {
                                date.start = Some(start);
                                date.end = Some(end);
                                date.precision = DatePrecision::Range;
                                date.range_style = Some(style);
                            }
                            // Half-readable ranges keep the readable endpoint.
                            (Some(start), None) => {
                                date.start = Some(start);
                                date.precision = match style {
                                    RangeStyle::Between => DatePrecision::About,
                                    RangeStyle::Period => DatePrecision::After,
                                };
                            }
                            (None, Some(end)) => {
                                date.start = Some(end);
                                date.precision = DatePrecision::Before;
                            }
                            (None, None) => date.precision = DatePrecision::Range,
                        }
                    }
                    None if qualifier == Qualifier::From => {
                        date.start = parse_point(rest);
                        date.precision = DatePrecision::After;
                    }
                    None => {
                        date.start = parse_point(rest);
                        date.precision = DatePrecision::About;
                    }
                }
            }
            Qualifier::To => {
                date.start = parse_point(rest);
                date.precision = DatePrecision::Before;
            }
            Qualifier::Simple(precision) => {
                date.start = parse_point(rest);
                date.precision = precision;
            }
        }

        if date.start.is_none() {
            // Year-only fallback for free text such as `Spring 1950`.
            date.start = YEAR_RE
                .captures(&without_phrase)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<i32>().ok())
                .map(|year| format!("{year:04}"));
            date.end = None;
            date.range_style = None;
            if date.precision == DatePrecision::Exact || date.precision == DatePrecision::Range {
                date.precision = DatePrecision::Unknown;
            }
        }
        date
    }

    /// Builds an exact date from an already-normalized point.
    pub fn from_normalized(point: &str) -> Self {
        let mut date = Self::parse(point);
        if date.start.is_none() {
            date.precision = DatePrecision::Unknown;
        }
        date
    }

    pub fn year(&self) -> Option<i32> {
        self.start.as_deref().and_then(point_year)
    }

    pub fn end_year(&self) -> Option<i32> {
        self.end.as_deref().and_then(point_year).or_else(|| self.year())
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.start.is_none()
    }

    /// Returns the normalized single-string form, e.g. `1950-03-15`.
    pub fn normalized(&self) -> Option<String> {
        let start = self.start.as_deref()?;
        match (self.precision, self.end.as_deref()) {
            (DatePrecision::Range, Some(end)) => Some(format!("{start}/{end}")),
            _ => Some(start.to_string()),
        }
    }

    /// Formats the date in the text-hierarchy grammar, preserving qualifiers.
    pub fn to_gedcom(&self) -> String {
        let Some(start) = self.start.as_deref() else {
            return if self.raw.is_empty() {
                String::new()
            } else {
                format!("({})", self.raw.trim_matches(['(', ')']))
            };
        };
        let start_text = format_point(start);
        match self.precision {
            DatePrecision::Range => match (self.end.as_deref().map(format_point), self.range_style) {
                (Some(end_text), Some(RangeStyle::Period)) => format!("FROM {start_text} TO {end_text}"),
                (Some(end_text), _) => format!("BET {start_text} AND {end_text}"),
                (None, Some(RangeStyle::Period)) => format!("FROM {start_text}"),
                (None, _) => format!("ABT {start_text}"),
            },
            // Unknown precision degrades to the year only.
            DatePrecision::Unknown => self.year().map(|y| y.to_string()).unwrap_or_default(),
            precision => match precision.gedcom_prefix() {
                Some(prefix) => format!("{prefix} {start_text}"),
                None => start_text,
            },
        }
    }

    /// Formal date string used by the JSON document format (`+1950-03-15`).
    pub fn to_formal(&self) -> Option<String> {
        let start = format!("+{}", self.start.as_deref()?);
        let formal = match self.precision {
            DatePrecision::Exact => start,
            DatePrecision::About | DatePrecision::Estimated | DatePrecision::Calculated => {
                format!("A{start}")
            }
            DatePrecision::Before => format!("/{start}"),
            DatePrecision::After => format!("{start}/"),
            DatePrecision::Range => match self.end.as_deref() {
                Some(end) => format!("{start}/+{end}"),
                None => start,
            },
            DatePrecision::Unknown => format!("+{:04}", self.year()?),
        };
        Some(formal)
    }

    /// Parses a formal date string produced by [`GenDate::to_formal`].
    pub fn from_formal(formal: &str, original: Option<&str>) -> Self {
        let text = formal.trim();
        let (approximate, body) = match text.strip_prefix('A') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let mut date = if let Some(rest) = body.strip_prefix('/') {
            let mut date = Self::from_normalized(rest.trim_start_matches('+'));
            date.precision = DatePrecision::Before;
            date
        } else if let Some((left, right)) = body.split_once('/') {
            if right.is_empty() {
                let mut date = Self::from_normalized(left.trim_start_matches('+'));
                date.precision = DatePrecision::After;
                date
            } else {
                let mut date = Self::from_normalized(left.trim_start_matches('+'));
                date.end = Self::from_normalized(right.trim_start_matches('+')).start;
                date.precision = DatePrecision::Range;
                date.range_style = Some(RangeStyle::Between);
                date
            }
        } else {
            Self::from_normalized(body.trim_start_matches('+'))
        };
        if approximate {
            date.precision = DatePrecision::About;
        }
        if let Some(original) = original {
            date.raw = original.trim().to_string();
        }
        date
    }
}

impl Display for GenDate {
    /// Human-readable form used by tabular output, e.g. `about 1950`.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Some(start) = self.start.as_deref() else {
            return write!(f, "{}", self.raw);
        };
        match self.precision {
            DatePrecision::Exact => write!(f, "{start}"),
            DatePrecision::Unknown => match self.year() {
                Some(year) => write!(f, "{year}"),
                None => write!(f, "{}", self.raw),
            },
            DatePrecision::Range => write!(
                f,
                "between {start} and {}",
                self.end.as_deref().unwrap_or("?")
            ),
            precision => write!(f, "{} {start}", precision.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Qualifier {
    Simple(DatePrecision),
    Between,
    From,
    To,
}

fn split_qualifier<'a>(tokens: &'a [&'a str]) -> (Qualifier, &'a [&'a str]) {
    let first = tokens[0].trim_end_matches('.');
    let qualifier = match first {
        "ABT" | "ABOUT" | "CIRCA" | "CA" | "C" | "APPROX" => Qualifier::Simple(DatePrecision::About),
        "BEF" | "BEFORE" => Qualifier::Simple(DatePrecision::Before),
        "AFT" | "AFTER" => Qualifier::Simple(DatePrecision::After),
        "EST" | "ESTIMATED" => Qualifier::Simple(DatePrecision::Estimated),
        "CAL" | "CALCULATED" => Qualifier::Simple(DatePrecision::Calculated),
        "INT" => Qualifier::Simple(DatePrecision::Estimated),
        "BET" | "BETWEEN" => Qualifier::Between,
        "FROM" => Qualifier::From,
        "TO" => Qualifier::To,
        _ => return (Qualifier::Simple(DatePrecision::Exact), tokens),
    };
    (qualifier, &tokens[1..])
}

/// Parses one calendar point from upper-cased tokens.
fn parse_point(tokens: &[&str]) -> Option<String> {
    match tokens {
        [single] => parse_single_token(single),
        [month, year] => {
            let month = month_number(month)?;
            let year = parse_year(year)?;
            Some(format!("{year:04}-{month:02}"))
        }
        [day, month, year] => {
            let day = day.parse::<u32>().ok()?;
            let month = month_number(month)?;
            let year = parse_year(year)?;
            NaiveDate::from_ymd_opt(year, month, day)?;
            Some(format!("{year:04}-{month:02}-{day:02}"))
        }
        _ => None,
    }
}

fn parse_single_token(token: &str) -> Option<String> {
    if let Some(caps) = DUAL_YEAR_RE.captures(token) {
        let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
        return Some(format!("{year:04}"));
    }
    let caps = ISO_POINT_RE.captures(token)?;
    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    match (caps.get(2), caps.get(3)) {
        (None, _) => Some(format!("{year:04}")),
        (Some(month), None) => {
            let month = month.as_str().parse::<u32>().ok()?;
            if !(1..=12).contains(&month) {
                return None;
            }
            Some(format!("{year:04}-{month:02}"))
        }
        (Some(month), Some(day)) => {
            let month = month.as_str().parse::<u32>().ok()?;
            let day = day.as_str().parse::<u32>().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)?;
            Some(format!("{year:04}-{month:02}-{day:02}"))
        }
    }
}

fn parse_year(token: &str) -> Option<i32> {
    if let Some(caps) = DUAL_YEAR_RE.captures(token) {
        return caps.get(1)?.as_str().parse().ok();
    }
    if token.len() < 3 || token.len() > 4 || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn month_number(token: &str) -> Option<u32> {
    let prefix: String = token.chars().take(3).collect();
    MONTHS
        .iter()
        .position(|month| *month == prefix)
        .map(|index| index as u32 + 1)
}

fn point_year(point: &str) -> Option<i32> {
    point.split('-').next()?.parse().ok()
}

fn format_point(point: &str) -> String {
    let mut parts = point.split('-');
    let year = parts.next().unwrap_or_default().trim_start_matches('0');
    let year = if year.is_empty() { "0" } else { year };
    let month = parts
        .next()
        .and_then(|value| value.parse::<usize>().ok())
        .and_then(|value| MONTHS.get(value.wrapping_sub(1)));
    let day = parts.next().and_then(|value| value.parse::<u32>().ok());
    match (day, month) {
        (Some(day), Some(month)) => format!("{day} {month} {year}"),
        (None, Some(month)) => format!("{month} {year}"),
        _ => year.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{DatePrecision, GenDate, RangeStyle};

    #[test]
    fn parses_full_gedcom_date() {
        let date = GenDate::parse("15 MAR 1950");
        assert_eq!(date.precision, DatePrecision::Exact);
        assert_eq!(date.start.as_deref(), Some("1950-03-15"));
        assert_eq!(date.to_gedcom(), "15 MAR 1950");
    }

    #[test]
    fn iso_points_round_trip_without_precision_loss() {
        for input in ["1950", "1950-03", "1950-03-15"] {
            let normalized = GenDate::parse(input);
            let reparsed = GenDate::parse(&normalized.to_gedcom());
            assert_eq!(reparsed.start.as_deref(), Some(input), "input {input}");
        }
    }

    #[test]
    fn qualifiers_and_ranges_are_preserved() {
        assert_eq!(GenDate::parse("ABT 1950").to_gedcom(), "ABT 1950");
        assert_eq!(GenDate::parse("abt 1950").precision, DatePrecision::About);
        let range = GenDate::parse("BET 1940 AND 1950");
        assert_eq!(range.precision, DatePrecision::Range);
        assert_eq!(range.range_style, Some(RangeStyle::Between));
        assert_eq!(range.end.as_deref(), Some("1950"));
        assert_eq!(range.to_gedcom(), "BET 1940 AND 1950");
        assert_eq!(
            GenDate::parse("FROM 1 JAN 1900 TO 1910").to_gedcom(),
            "FROM 1 JAN 1900 TO 1910"
        );
    }

    #[test]
    fn half_readable_ranges_keep_the_readable_endpoint() {
        let between = GenDate::parse("BET 1940 AND sometime");
        assert_eq!(between.precision, DatePrecision::About);
        assert_eq!(between.end, None);
        assert_eq!(between.to_gedcom(), "ABT 1940");

        let period = GenDate::parse("FROM 1940 TO ?");
        assert_eq!(period.precision, DatePrecision::After);
        assert_eq!(period.to_gedcom(), "AFT 1940");

        let open_start = GenDate::parse("BET someday AND 12 MAY 1950");
        assert_eq!(open_start.precision, DatePrecision::Before);
        assert_eq!(open_start.to_gedcom(), "BEF 12 MAY 1950");
    }

    #[test]
    fn invalid_day_is_not_treated_as_exact() {
        let date = GenDate::parse("31 FEB 1950");
        assert_eq!(date.precision, DatePrecision::Unknown);
        assert_eq!(date.year(), Some(1950));
        assert_eq!(date.to_gedcom(), "1950");
    }

    #[test]
    fn free_text_falls_back_to_year() {
        let date = GenDate::parse("Spring of 1872");
        assert_eq!(date.year(), Some(1872));
        assert_eq!(date.raw, "Spring of 1872");
        let phrase = GenDate::parse("(unknown)");
        assert_eq!(phrase.year(), None);
        assert_eq!(phrase.to_gedcom(), "(unknown)");
    }

    #[test]
    fn formal_dates_follow_qualifier() {
        assert_eq!(
            GenDate::parse("ABT 1950").to_formal().as_deref(),
            Some("A+1950")
        );
        assert_eq!(
            GenDate::parse("BET 1940 AND 1950").to_formal().as_deref(),
            Some("+1940/+1950")
        );
        let back = GenDate::from_formal("+1940/+1950", None);
        assert_eq!(back.precision, DatePrecision::Range);
        assert_eq!(back.end.as_deref(), Some("1950"));
    }
}
