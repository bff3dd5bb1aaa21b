use crate::cli::CompatibilityMode;
use crate::support::{preprocess_mode, read_input, write_output};
use rootline_core::preprocess;

pub fn run(input: String, mode: CompatibilityMode, output: Option<String>) {
    let text = read_input(&input);
    let result = preprocess(&text, preprocess_mode(mode));
    write_output(output.as_deref(), &result.text);

    let report = &result.report;
    eprintln!("preprocess {input}");
    eprintln!("  applied: {}", report.applied);
    eprintln!("  continuations joined: {}", report.continuations_joined);
    eprintln!("  embedded breaks repaired: {}", report.embedded_breaks_repaired);
    eprintln!("  entities repaired: {}", report.entities_repaired);
    eprintln!("  tags stripped: {}", report.tags_stripped);
}
