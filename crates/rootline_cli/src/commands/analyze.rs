use crate::support::{fail, read_input, write_output};
use rootline_core::export::ExportContext;
use rootline_core::{
    analyze, apply_fixes, export_gedcom, parse_document, AnalyzerOptions, GedcomExportOptions,
    ParseOptions,
};

pub fn run(input: String, reference_year: Option<i32>, fix_output: Option<String>, json: bool) {
    let text = read_input(&input);
    let outcome = parse_document(&text, &ParseOptions::default()).unwrap_or_else(|e| fail(e));
    let mut graph = outcome.graph;

    let mut options = AnalyzerOptions::default();
    if let Some(year) = reference_year {
        options.reference_year = year;
    }
    let report = analyze(&graph, &options);

    if json {
        let rendered = serde_json::to_string_pretty(&report).unwrap_or_else(|e| fail(e));
        println!("{rendered}");
    } else {
        println!("analyze {input}");
        println!();
        println!("  individuals: {}", graph.individuals.len());
        println!("  families: {}", graph.families.len());
        println!("  parse warnings: {}", outcome.warnings.len());
        println!("  issues: {}", report.summary.total);
        for issue in &report.issues {
            println!(
                "  - [{}] {} {}: {}",
                format!("{:?}", issue.severity).to_lowercase(),
                issue.code.as_str(),
                issue.record_id,
                issue.message
            );
        }
    }

    if let Some(path) = fix_output {
        let fixes = apply_fixes(&mut graph, &report.summary.default_fixes);
        let exported = export_gedcom(
            &graph,
            &GedcomExportOptions::default(),
            &ExportContext::default(),
        )
        .unwrap_or_else(|e| fail(e));
        write_output(Some(&path), &exported.text);
        eprintln!(
            "fixed: places={} individuals_removed={} families_removed={} references_scrubbed={}",
            fixes.places_rewritten,
            fixes.individuals_removed,
            fixes.families_removed,
            fixes.references_scrubbed
        );
    }
}
