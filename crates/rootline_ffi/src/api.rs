//! FFI use-case API for host (Flutter) calls.
//!
//! # Responsibility
//! - Expose document-level operations as sync FRB functions.
//! - Carry options and structured results as JSON strings.
//!
//! # Invariants
//! - Exported functions never panic across the boundary.
//! - Every failure is reported in the response envelope, never thrown.

use rootline_core::db::open_db;
use rootline_core::export::ExportContext;
use rootline_core::{
    analyze, anonymize, core_version as core_version_inner, export_csv, export_gedcom,
    export_gedcomx, import_csv, import_gedcom, import_gedcomx, init_logging as init_logging_inner,
    load_graph, parse_document, ping as ping_inner, preprocess, AnalyzerOptions,
    AnonymizeOptions, CsvExportOptions, ExportOutput, GedcomExportOptions, GedcomxExportOptions,
    Graph, ImportOptions, LivingPrivacyPolicy, NoAliases, ParseOptions, PreprocessMode,
    SqliteNoteStore, StorePlaceHierarchy,
};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Response envelope shared by document operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreResponse {
    /// Whether the operation produced its output.
    pub ok: bool,
    /// Primary text output (document, report JSON); empty on failure.
    pub text: String,
    /// JSON object with counts and diagnostics; `{}` when none.
    pub details_json: String,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl CoreResponse {
    fn success(text: String, details: &impl Serialize, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            text,
            details_json: to_json(details),
            message: message.into(),
        }
    }

    fn failure(operation: &str, message: impl Into<String>) -> Self {
        warn!("event=ffi_call module=ffi status=error op={operation}");
        Self {
            ok: false,
            text: String::new(),
            details_json: "{}".to_string(),
            message: message.into(),
        }
    }
}

/// Health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Core crate version.
///
/// # FFI contract
/// - Sync call, non-blocking.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory for rolling logs.
///
/// # FFI contract
/// - Idempotent for the same `level + log_dir`.
/// - Returns empty string on success and the error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Runs the compatibility preprocessor.
///
/// `mode` is `off|forced|auto`; empty means `auto`.
#[flutter_rust_bridge::frb(sync)]
pub fn preprocess_document(text: String, mode: String) -> CoreResponse {
    let mode = match parse_mode(&mode) {
        Ok(mode) => mode,
        Err(err) => return CoreResponse::failure("preprocess_document", err),
    };
    let output = preprocess(&text, mode);
    let message = if output.report.applied {
        "Compatibility fixes applied."
    } else {
        "No changes."
    };
    CoreResponse::success(output.text.into_owned(), &output.report, message)
}

/// Parses and analyzes a document; `text` of the response is the quality
/// report JSON.
///
/// `options_json` decodes `AnalyzerOptions`; empty uses defaults.
#[flutter_rust_bridge::frb(sync)]
pub fn analyze_document(text: String, options_json: String) -> CoreResponse {
    let result = (|| {
        let options: AnalyzerOptions = decode(&options_json)?;
        let graph = parse(&text)?;
        let report = analyze(&graph, &options);
        Ok::<_, String>((report, graph.individuals.len()))
    })();
    match result {
        Ok((report, individuals)) => CoreResponse::success(
            to_json(&report),
            &serde_json::json!({ "individuals": individuals, "issues": report.issues.len() }),
            format!("{} issue(s).", report.issues.len()),
        ),
        Err(err) => CoreResponse::failure("analyze_document", format!("analyze_document failed: {err}")),
    }
}

/// Parses a document and exports it as `gedcom|gedcomx|csv`.
///
/// `options_json` decodes the format's options; `privacy_json`, when
/// non-empty, decodes a `LivingPrivacyPolicy`.
#[flutter_rust_bridge::frb(sync)]
pub fn export_document(
    text: String,
    format: String,
    options_json: String,
    privacy_json: String,
) -> CoreResponse {
    let result = parse(&text)
        .and_then(|graph| export_graph(&graph, &format, &options_json, &privacy_json, None));
    export_response("export_document", result)
}

/// Anonymizes a text-format document.
#[flutter_rust_bridge::frb(sync)]
pub fn anonymize_document(text: String, keep_dates: bool, keep_places: bool) -> CoreResponse {
    let output = anonymize(
        &text,
        &AnonymizeOptions {
            keep_dates,
            keep_places,
        },
    );
    CoreResponse::success(output.text, &output.report, "Anonymization complete.")
}

/// Imports a `gedcom|gedcomx|csv` document into the store at `db_path`.
///
/// `options_json` decodes `ImportOptions`; empty uses defaults. The
/// response `text` is the import result JSON.
#[flutter_rust_bridge::frb(sync)]
pub fn import_document(
    db_path: String,
    text: String,
    format: String,
    options_json: String,
) -> CoreResponse {
    let result = (|| {
        let options: ImportOptions = decode(&options_json)?;
        let conn = open_db(db_path.trim()).map_err(|err| format!("store open failed: {err}"))?;
        let mut store = SqliteNoteStore::new(&conn);
        let outcome = match format.trim().to_ascii_lowercase().as_str() {
            "gedcom" | "ged" => import_gedcom(&text, &mut store, &options, &NoAliases, None),
            "gedcomx" | "json" => import_gedcomx(&text, &mut store, &options, &NoAliases, None),
            "csv" => import_csv(&text, &mut store, &options, &NoAliases, None),
            other => return Err(format!("unsupported import format `{other}`")),
        };
        outcome.map_err(|err| err.to_string())
    })();
    match result {
        Ok(result) => {
            let message = if result.success {
                format!("Imported {} individual(s).", result.counts.individuals)
            } else {
                format!("Imported with {} record failure(s).", result.errors.len())
            };
            CoreResponse {
                ok: true,
                text: to_json(&result),
                details_json: to_json(&result.counts),
                message,
            }
        }
        Err(err) => CoreResponse::failure("import_document", format!("import_document failed: {err}")),
    }
}

/// Exports everything stored at `db_path`; place notes serve as the place
/// hierarchy.
#[flutter_rust_bridge::frb(sync)]
pub fn export_store(
    db_path: String,
    format: String,
    options_json: String,
    privacy_json: String,
) -> CoreResponse {
    let result = (|| {
        let conn = open_db(db_path.trim()).map_err(|err| format!("store open failed: {err}"))?;
        let store = SqliteNoteStore::new(&conn);
        let graph = load_graph(&store, &NoAliases).map_err(|err| err.to_string())?;
        let places = StorePlaceHierarchy::load(&store).map_err(|err| err.to_string())?;
        export_graph(&graph, &format, &options_json, &privacy_json, Some(&places))
    })();
    export_response("export_store", result)
}

fn export_response(operation: &str, result: Result<ExportOutput, String>) -> CoreResponse {
    match result {
        Ok(output) => CoreResponse::success(
            output.text,
            &output.stats,
            format!("Exported {} individual(s).", output.stats.individuals),
        ),
        Err(err) => CoreResponse::failure(operation, format!("{operation} failed: {err}")),
    }
}

fn export_graph(
    graph: &Graph,
    format: &str,
    options_json: &str,
    privacy_json: &str,
    places: Option<&StorePlaceHierarchy>,
) -> Result<ExportOutput, String> {
    let privacy: Option<LivingPrivacyPolicy> = if privacy_json.trim().is_empty() {
        None
    } else {
        Some(decode(privacy_json)?)
    };
    let context = ExportContext {
        privacy: privacy
            .as_ref()
            .map(|policy| policy as &dyn rootline_core::PrivacyPolicy),
        places: places.map(|places| places as &dyn rootline_core::repo::PlaceHierarchy),
    };
    let output = match format.trim().to_ascii_lowercase().as_str() {
        "gedcom" | "ged" => {
            let options: GedcomExportOptions = decode(options_json)?;
            export_gedcom(graph, &options, &context)
        }
        "gedcomx" | "json" => {
            let options: GedcomxExportOptions = decode(options_json)?;
            export_gedcomx(graph, &options, &context)
        }
        "csv" => {
            let options: CsvExportOptions = decode(options_json)?;
            export_csv(graph, &options, &context)
        }
        other => return Err(format!("unsupported export format `{other}`")),
    };
    output.map_err(|err| err.to_string())
}

fn parse(text: &str) -> Result<Graph, String> {
    parse_document(text, &ParseOptions::default())
        .map(|outcome| outcome.graph)
        .map_err(|err| err.to_string())
}

fn parse_mode(mode: &str) -> Result<PreprocessMode, String> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "" | "auto" => Ok(PreprocessMode::Auto),
        "off" => Ok(PreprocessMode::Off),
        "forced" | "force" => Ok(PreprocessMode::Forced),
        other => Err(format!("unsupported preprocess mode `{other}`; expected off|forced|auto")),
    }
}

/// Empty input means defaults.
fn decode<T: DeserializeOwned + Default>(json: &str) -> Result<T, String> {
    if json.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(json).map_err(|err| format!("invalid options: {err}"))
}

fn to_json(value: &impl Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        analyze_document, anonymize_document, core_version, export_document, export_store,
        import_document, init_logging, ping, preprocess_document,
    };

    const DOCUMENT: &str = "0 HEAD\n1 GEDC\n2 VERS 5.5.1\n1 CHAR UTF-8\n\
        0 @I1@ INDI\n1 NAME John /Smith/\n1 SEX M\n1 BIRT\n2 DATE 1950\n1 DEAT\n2 DATE 1940\n1 FAMS @F1@\n\
        0 @I2@ INDI\n1 NAME Mary /Jones/\n1 SEX F\n1 FAMS @F1@\n\
        0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n\
        0 TRLR\n";

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn preprocess_rejects_unknown_mode() {
        let response = preprocess_document(DOCUMENT.to_string(), "sometimes".to_string());
        assert!(!response.ok);
        let response = preprocess_document(DOCUMENT.to_string(), String::new());
        assert!(response.ok, "{}", response.message);
    }

    #[test]
    fn analyze_reports_death_before_birth() {
        let response = analyze_document(DOCUMENT.to_string(), String::new());
        assert!(response.ok, "{}", response.message);
        let report: serde_json::Value = serde_json::from_str(&response.text).unwrap();
        let codes: Vec<&str> = report["issues"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|issue| issue["code"].as_str())
            .collect();
        assert!(codes.contains(&"death_before_birth"));
    }

    #[test]
    fn export_rejects_unknown_format_and_bad_options() {
        let response = export_document(DOCUMENT.to_string(), "xml".to_string(), String::new(), String::new());
        assert!(!response.ok);
        let response = export_document(DOCUMENT.to_string(), "csv".to_string(), "{".to_string(), String::new());
        assert!(!response.ok);
        let response = export_document(DOCUMENT.to_string(), "csv".to_string(), String::new(), String::new());
        assert!(response.ok, "{}", response.message);
        assert!(response.text.starts_with("id,name"));
    }

    #[test]
    fn anonymize_hides_names() {
        let response = anonymize_document(DOCUMENT.to_string(), false, false);
        assert!(response.ok);
        assert!(!response.text.contains("Smith"));
    }

    #[test]
    fn import_then_export_store() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("tree.sqlite3").to_str().unwrap().to_string();
        let response = import_document(db_path.clone(), DOCUMENT.to_string(), "gedcom".to_string(), String::new());
        assert!(response.ok, "{}", response.message);
        let counts: serde_json::Value = serde_json::from_str(&response.details_json).unwrap();
        assert_eq!(counts["individuals"], 2);

        let exported = export_store(db_path, "gedcom".to_string(), String::new(), String::new());
        assert!(exported.ok, "{}", exported.message);
        assert!(exported.text.contains("1 NAME John /Smith/"));
    }
}
