use crate::cli::DocumentFormat;
use crate::support::{fail, read_input, write_output};
use rootline_core::db::open_db;
use rootline_core::export::ExportContext;
use rootline_core::repo::PlaceHierarchy;
use rootline_core::{
    export_csv, export_gedcom, export_gedcomx, load_graph, parse_document, CsvExportOptions,
    ExportOutput, GedcomExportOptions, GedcomxExportOptions, Graph, LivingPrivacyPolicy,
    NoAliases, ParseOptions, PrivacyPolicy, SqliteNoteStore, StorePlaceHierarchy,
};

pub fn run(input: String, format: DocumentFormat, privacy: bool, output: Option<String>) {
    let text = read_input(&input);
    let graph = parse_document(&text, &ParseOptions::default())
        .unwrap_or_else(|e| fail(e))
        .graph;
    let exported = export(&graph, format, privacy, None);
    write_output(output.as_deref(), &exported.text);
    report(&exported);
}

pub fn run_store(db: String, format: DocumentFormat, privacy: bool, output: Option<String>) {
    let conn = open_db(&db).unwrap_or_else(|e| fail(format!("failed to open {db}: {e}")));
    let store = SqliteNoteStore::new(&conn);
    let graph = load_graph(&store, &NoAliases).unwrap_or_else(|e| fail(e));
    let places = StorePlaceHierarchy::load(&store).unwrap_or_else(|e| fail(e));
    let exported = export(&graph, format, privacy, Some(&places));
    write_output(output.as_deref(), &exported.text);
    report(&exported);
}

fn export(
    graph: &Graph,
    format: DocumentFormat,
    privacy: bool,
    places: Option<&dyn PlaceHierarchy>,
) -> ExportOutput {
    let policy = LivingPrivacyPolicy::default();
    let context = ExportContext {
        privacy: privacy.then_some(&policy as &dyn PrivacyPolicy),
        places,
    };
    let result = match format {
        DocumentFormat::Gedcom => export_gedcom(graph, &GedcomExportOptions::default(), &context),
        DocumentFormat::Gedcomx => {
            export_gedcomx(graph, &GedcomxExportOptions::default(), &context)
        }
        DocumentFormat::Csv => export_csv(graph, &CsvExportOptions::default(), &context),
    };
    result.unwrap_or_else(|e| fail(e))
}

fn report(exported: &ExportOutput) {
    let stats = &exported.stats;
    eprintln!(
        "exported: individuals={} families={} sources={} redacted={} hidden={}",
        stats.individuals, stats.families, stats.sources, stats.redacted, stats.hidden
    );
}
