use rootline_core::quality::IssueCode;
use rootline_core::{analyze, parse_document, AnalyzerOptions, ParseOptions};

const DOCUMENT: &str = "0 HEAD\n1 GEDC\n2 VERS 5.5.1\n\
0 @I1@ INDI\n1 NAME John /Smith/\n1 SEX M\n1 BIRT\n2 DATE 1900\n1 DEAT\n2 DATE 1890\n1 FAMS @F1@\n\
0 @I2@ INDI\n1 NAME Mary /Jones/\n1 SEX F\n1 BIRT\n2 DATE 1905\n1 FAMS @F1@\n\
0 @I3@ INDI\n1 NAME Ann /Smith/\n1 SEX F\n1 BIRT\n2 DATE 1902\n1 DEAT\n2 DATE 1980\n1 FAMC @F1@\n\
0 @I4@ INDI\n\
0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n1 MARR\n2 DATE 1910\n\
0 TRLR\n";

fn options() -> AnalyzerOptions {
    AnalyzerOptions {
        reference_year: 2024,
        ..AnalyzerOptions::default()
    }
}

#[test]
fn parsed_document_reports_each_problem_once() {
    let graph = parse_document(DOCUMENT, &ParseOptions::default()).unwrap().graph;
    let report = analyze(&graph, &options());

    assert_eq!(report.count(IssueCode::DeathBeforeBirth), 1);
    assert_eq!(report.count(IssueCode::ParentYoungerThanChild), 1);
    assert_eq!(report.count(IssueCode::ChildBeforeMarriage), 1);
    assert_eq!(report.count(IssueCode::MissingName), 1);
    assert_eq!(report.count(IssueCode::UnknownSex), 1);
    assert_eq!(report.count(IssueCode::NoDates), 1);
    assert_eq!(report.count(IssueCode::MissingDeath), 0);
    assert_eq!(report.count(IssueCode::FutureBirth), 0);
    assert_eq!(report.count(IssueCode::EventBeforeBirth), 0);
    assert_eq!(report.count(IssueCode::EventAfterDeath), 0);
    assert!(report.has_errors());

    let younger = report
        .issues
        .iter()
        .find(|issue| issue.code == IssueCode::ParentYoungerThanChild)
        .unwrap();
    assert_eq!(younger.record_id, "F1");
    assert_eq!(younger.details["parent"], "I2");
    assert_eq!(younger.details["child"], "I3");
}

#[test]
fn summary_totals_match_issue_list() {
    let graph = parse_document(DOCUMENT, &ParseOptions::default()).unwrap().graph;
    let report = analyze(&graph, &options());
    assert_eq!(report.summary.total, report.issues.len());
    assert_eq!(
        report.summary.by_severity.values().sum::<usize>(),
        report.issues.len()
    );
    assert_eq!(
        report.summary.by_category.values().sum::<usize>(),
        report.issues.len()
    );

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["issues"]
        .as_array()
        .unwrap()
        .iter()
        .any(|issue| issue["code"] == "death_before_birth"));
}

#[test]
fn later_reference_year_flags_missing_death() {
    let graph = parse_document(DOCUMENT, &ParseOptions::default()).unwrap().graph;
    let report = analyze(
        &graph,
        &AnalyzerOptions {
            reference_year: 2030,
            ..AnalyzerOptions::default()
        },
    );
    // Mary is the only person born long ago with no death data.
    assert_eq!(report.count(IssueCode::MissingDeath), 1);
}

#[test]
fn death_before_birth_is_reported_once() {
    let text = "0 HEAD\n0 @I1@ INDI\n1 NAME Ann /Lee/\n1 SEX F\n1 BIRT\n2 DATE 1950\n\
                1 DEAT\n2 DATE 1940\n0 TRLR\n";
    let graph = parse_document(text, &ParseOptions::default()).unwrap().graph;
    let report = analyze(&graph, &options());
    let codes: Vec<IssueCode> = report.issues.iter().map(|issue| issue.code).collect();
    assert_eq!(codes, vec![IssueCode::DeathBeforeBirth]);
    assert_eq!(report.issues[0].record_id, "I1");
    assert_eq!(report.summary.total, 1);
}
