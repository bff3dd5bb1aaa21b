//! Import engines.
//!
//! # Responsibility
//! - Read text-hierarchy, JSON and tabular documents into a `Graph`.
//! - Materialize the graph into a note store in two passes.
//!
//! # Invariants
//! - Document-level failures abort before any write (`ImportError`).
//! - Record-level write failures never abort the batch; they are collected
//!   as `RecordFailure`s and clear `ImportResult::success`.

pub mod csv;
pub mod gedcomx;
pub mod materialize;
pub mod places;

pub use self::csv::read_csv;
pub use gedcomx::read_gedcomx;
pub use materialize::import_graph;
pub use places::{normalize_place, plan_places, PlaceType, PlannedPlace};

use crate::gedcom::{parse_document, ParseError, ParseOptions, PreprocessMode, PreprocessReport};
use crate::repo::{AliasResolver, NoteStore};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fatal import failure; nothing was written.
#[derive(Debug)]
pub enum ImportError {
    Parse(ParseError),
    Json(serde_json::Error),
    Csv { line: usize, message: String },
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "invalid json document: {err}"),
            Self::Csv { line, message } => write!(f, "line {line}: {message}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Csv { .. } => None,
        }
    }
}

impl From<ParseError> for ImportError {
    fn from(value: ParseError) -> Self {
        Self::Parse(value)
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// How note file names are derived from display names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenameFormat {
    /// `John Smith`
    #[default]
    Original,
    /// `john-smith`
    Kebab,
    /// `john_smith`
    Snake,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub people_folder: String,
    pub places_folder: String,
    pub events_folder: String,
    pub sources_folder: String,
    pub notes_folder: String,
    pub create_place_notes: bool,
    pub create_event_notes: bool,
    pub create_source_notes: bool,
    /// Free-standing note records; their text is always copied onto people.
    pub create_note_notes: bool,
    pub filename_format: FilenameFormat,
    /// Replace documents left by an earlier import instead of adding ` (n)`.
    pub overwrite_existing: bool,
    /// Compatibility preprocessor mode for text-hierarchy input.
    pub compatibility_mode: PreprocessMode,
    /// Field delimiter for tabular input.
    pub csv_delimiter: char,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            people_folder: "People".to_string(),
            places_folder: "Places".to_string(),
            events_folder: "Events".to_string(),
            sources_folder: "Sources".to_string(),
            notes_folder: "Notes".to_string(),
            create_place_notes: true,
            create_event_notes: true,
            create_source_notes: true,
            create_note_notes: false,
            filename_format: FilenameFormat::Original,
            overwrite_existing: false,
            compatibility_mode: PreprocessMode::Auto,
            csv_delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Places,
    Sources,
    Notes,
    People,
    Events,
    Relationships,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    pub phase: ImportPhase,
    pub current: usize,
    pub total: usize,
}

/// Progress callback invoked once per record and phase boundary.
pub type ProgressFn<'a> = &'a mut dyn FnMut(&ImportProgress);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub individuals: usize,
    pub places: usize,
    pub events: usize,
    pub sources: usize,
    pub notes: usize,
    pub overwritten: usize,
    pub references_resolved: usize,
    pub references_unresolved: usize,
}

/// One record that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Display identity, e.g. `John Smith (I1)`.
    pub record: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    /// False whenever any record failed.
    pub success: bool,
    pub counts: ImportCounts,
    pub errors: Vec<RecordFailure>,
    pub warnings: Vec<String>,
    pub preprocess: Option<PreprocessReport>,
}

/// Imports a text-hierarchy document.
pub fn import_gedcom(
    text: &str,
    store: &mut dyn NoteStore,
    options: &ImportOptions,
    aliases: &dyn AliasResolver,
    progress: Option<ProgressFn<'_>>,
) -> Result<ImportResult, ImportError> {
    let outcome = parse_document(
        text,
        &ParseOptions {
            preprocess: options.compatibility_mode,
        },
    )?;
    let mut result = import_graph(&outcome.graph, store, options, aliases, progress);
    let mut warnings: Vec<String> = outcome
        .warnings
        .iter()
        .map(|warning| match warning.line {
            Some(line) => format!("line {line}: {}", warning.message),
            None => warning.message.clone(),
        })
        .collect();
    warnings.append(&mut result.warnings);
    result.warnings = warnings;
    result.preprocess = Some(outcome.preprocess);
    Ok(result)
}

/// Imports a JSON (GEDCOM X) document.
pub fn import_gedcomx(
    text: &str,
    store: &mut dyn NoteStore,
    options: &ImportOptions,
    aliases: &dyn AliasResolver,
    progress: Option<ProgressFn<'_>>,
) -> Result<ImportResult, ImportError> {
    let graph = read_gedcomx(text)?;
    Ok(import_graph(&graph, store, options, aliases, progress))
}

/// Imports a tabular document with a header row.
pub fn import_csv(
    text: &str,
    store: &mut dyn NoteStore,
    options: &ImportOptions,
    aliases: &dyn AliasResolver,
    progress: Option<ProgressFn<'_>>,
) -> Result<ImportResult, ImportError> {
    let graph = read_csv(text, options.csv_delimiter)?;
    Ok(import_graph(&graph, store, options, aliases, progress))
}
