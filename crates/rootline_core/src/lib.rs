//! Genealogical interchange engine.
//!
//! Parses depth-tagged genealogy documents into a linked record graph,
//! analyzes data quality, exports to text, JSON and tabular formats, and
//! materializes imports into a note store.

pub mod anonymize;
pub mod db;
pub mod export;
pub mod gedcom;
pub mod import;
pub mod logging;
pub mod model;
pub mod quality;
pub mod repo;

pub use anonymize::{anonymize, AnonymizeOptions, AnonymizeOutput, AnonymizeReport};
pub use export::{
    export_csv, export_gedcom, export_gedcomx, CsvColumn, CsvExportOptions, ExportContext,
    ExportError, ExportOutput, ExportStats, GedcomExportOptions, GedcomxExportOptions,
    LivingPrivacyPolicy, PrivacyPolicy,
};
pub use gedcom::{
    parse_document, preprocess, ChunkedParser, ParseError, ParseOptions, ParseOutcome,
    PreprocessMode, PreprocessReport,
};
pub use import::{
    import_csv, import_gedcom, import_gedcomx, import_graph, FilenameFormat, ImportError,
    ImportOptions, ImportProgress, ImportResult,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{Graph, Individual, RecordId};
pub use quality::{analyze, apply_fixes, AnalyzerOptions, FixChoices, QualityReport};
pub use repo::{
    load_graph, AliasTable, NoAliases, NoteDocument, NoteKind, NoteStore, SqliteNoteStore,
    StorePlaceHierarchy,
};

/// Health-check probe for host bindings.
pub fn ping() -> &'static str {
    "pong"
}

/// Core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
