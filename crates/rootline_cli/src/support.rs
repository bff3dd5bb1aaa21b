use crate::cli::{CompatibilityMode, DocumentFormat};
use rootline_core::PreprocessMode;
use std::fs;
use std::path::Path;

/// Prints `error: <message>` and exits with status 1.
pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn start_logging(level: Option<&str>, log_dir: Option<&str>) {
    let Some(log_dir) = log_dir else {
        return;
    };
    let level = level.unwrap_or_else(|| rootline_core::default_log_level());
    if let Err(err) = rootline_core::init_logging(level, log_dir) {
        fail(err);
    }
}

pub fn read_input(path: &str) -> String {
    let bytes = fs::read(path).unwrap_or_else(|e| fail(format!("failed to read {path}: {e}")));
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn write_output(output: Option<&str>, text: &str) {
    match output {
        Some(path) => fs::write(path, text)
            .unwrap_or_else(|e| fail(format!("failed to write {path}: {e}"))),
        None => print!("{text}"),
    }
}

pub fn preprocess_mode(mode: CompatibilityMode) -> PreprocessMode {
    match mode {
        CompatibilityMode::Off => PreprocessMode::Off,
        CompatibilityMode::Forced => PreprocessMode::Forced,
        CompatibilityMode::Auto => PreprocessMode::Auto,
    }
}

/// `.json` is GEDCOM X, `.csv`/`.tsv` tabular, anything else text.
pub fn format_from_path(path: &str) -> DocumentFormat {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("json") => DocumentFormat::Gedcomx,
        Some("csv") | Some("tsv") => DocumentFormat::Csv,
        _ => DocumentFormat::Gedcom,
    }
}

#[cfg(test)]
mod tests {
    use super::format_from_path;
    use crate::cli::DocumentFormat;

    #[test]
    fn formats_follow_extensions() {
        assert_eq!(format_from_path("tree.GED"), DocumentFormat::Gedcom);
        assert_eq!(format_from_path("tree.json"), DocumentFormat::Gedcomx);
        assert_eq!(format_from_path("people.csv"), DocumentFormat::Csv);
        assert_eq!(format_from_path("noext"), DocumentFormat::Gedcom);
    }
}
