use crate::support::{read_input, write_output};
use rootline_core::{anonymize, AnonymizeOptions};

pub fn run(input: String, keep_dates: bool, keep_places: bool, output: Option<String>) {
    let text = read_input(&input);
    let result = anonymize(
        &text,
        &AnonymizeOptions {
            keep_dates,
            keep_places,
        },
    );
    write_output(output.as_deref(), &result.text);

    let report = &result.report;
    eprintln!("anonymize {input}");
    eprintln!("  lines: {}", report.lines);
    eprintln!("  unique names: {}", report.unique_names);
    eprintln!("  unique places: {}", report.unique_places);
    eprintln!("  dates replaced: {}", report.dates_replaced);
    if !report.suspicious_lines.is_empty() {
        eprintln!("  check header lines: {:?}", report.suspicious_lines);
    }
}
