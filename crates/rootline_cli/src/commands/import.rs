use crate::cli::DocumentFormat;
use crate::support::{fail, format_from_path, read_input};
use log::info;
use rootline_core::db::open_db;
use rootline_core::{
    import_csv, import_gedcom, import_gedcomx, ImportOptions, ImportProgress, NoAliases,
    SqliteNoteStore,
};

pub fn run(input: String, db: String, format: Option<DocumentFormat>, overwrite: bool, json: bool) {
    let text = read_input(&input);
    let format = format.unwrap_or_else(|| format_from_path(&input));
    let mut options = ImportOptions {
        overwrite_existing: overwrite,
        ..ImportOptions::default()
    };
    if input.to_ascii_lowercase().ends_with(".tsv") {
        options.csv_delimiter = '\t';
    }

    let conn = open_db(&db).unwrap_or_else(|e| fail(format!("failed to open {db}: {e}")));
    let mut store = SqliteNoteStore::new(&conn);
    let mut progress = |update: &ImportProgress| {
        if !json {
            eprintln!("  {:?} {}/{}", update.phase, update.current, update.total);
        }
    };
    let result = match format {
        DocumentFormat::Gedcom => {
            import_gedcom(&text, &mut store, &options, &NoAliases, Some(&mut progress))
        }
        DocumentFormat::Gedcomx => {
            import_gedcomx(&text, &mut store, &options, &NoAliases, Some(&mut progress))
        }
        DocumentFormat::Csv => {
            import_csv(&text, &mut store, &options, &NoAliases, Some(&mut progress))
        }
    }
    .unwrap_or_else(|e| fail(e));
    info!(
        "event=cli_import module=cli status={} format={:?} individuals={} failures={}",
        if result.success { "ok" } else { "partial" },
        format,
        result.counts.individuals,
        result.errors.len()
    );

    if json {
        let rendered = serde_json::to_string_pretty(&result).unwrap_or_else(|e| fail(e));
        println!("{rendered}");
        return;
    }

    let counts = &result.counts;
    println!("import {input} -> {db}");
    println!();
    println!("  individuals: {}", counts.individuals);
    println!("  places: {}", counts.places);
    println!("  events: {}", counts.events);
    println!("  sources: {}", counts.sources);
    println!("  notes: {}", counts.notes);
    println!("  overwritten: {}", counts.overwritten);
    println!("  references resolved: {}", counts.references_resolved);
    println!("  references unresolved: {}", counts.references_unresolved);
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    for failure in &result.errors {
        println!("  failed: {} ({})", failure.record, failure.message);
    }
    if !result.success {
        std::process::exit(2);
    }
}
