use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "rootline",
    about = "Rootline: genealogy document parsing, quality checks and conversion",
    version
)]
pub struct Cli {
    /// Absolute directory for rotating log files; logging is off when unset
    #[arg(long, global = true)]
    pub log_dir: Option<String>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DocumentFormat {
    Gedcom,
    Gedcomx,
    Csv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CompatibilityMode {
    Off,
    Forced,
    Auto,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Repair vendor formatting quirks and print the normalized document
    Preprocess {
        /// Input document path
        input: String,

        /// Compatibility mode
        #[arg(long, value_enum, default_value = "auto")]
        mode: CompatibilityMode,

        /// Output path (stdout when unset)
        #[arg(long)]
        output: Option<String>,
    },

    /// Parse a document and report data quality issues
    Analyze {
        /// Input document path
        input: String,

        /// Year used for future-date and lifespan checks
        #[arg(long)]
        reference_year: Option<i32>,

        /// Apply default fixes and write the repaired document here
        #[arg(long)]
        fix_output: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace names, places, dates and free text with placeholders
    Anonymize {
        /// Input document path
        input: String,

        /// Keep dates unchanged
        #[arg(long)]
        keep_dates: bool,

        /// Keep place names unchanged
        #[arg(long)]
        keep_places: bool,

        /// Output path (stdout when unset)
        #[arg(long)]
        output: Option<String>,
    },

    /// Convert a document to another format
    Export {
        /// Input document path (text format)
        input: String,

        /// Target format
        #[arg(long, value_enum, default_value = "gedcom")]
        format: DocumentFormat,

        /// Protect living individuals with the default privacy policy
        #[arg(long)]
        privacy: bool,

        /// Output path (stdout when unset)
        #[arg(long)]
        output: Option<String>,
    },

    /// Import a document into a note store
    Import {
        /// Input document path
        input: String,

        /// SQLite note store path (created when missing)
        #[arg(long)]
        db: String,

        /// Input format; inferred from the file extension when unset
        #[arg(long, value_enum)]
        format: Option<DocumentFormat>,

        /// Overwrite notes with matching paths instead of adding suffixes
        #[arg(long)]
        overwrite: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export every person stored in a note store
    ExportStore {
        /// SQLite note store path
        #[arg(long)]
        db: String,

        /// Target format
        #[arg(long, value_enum, default_value = "gedcom")]
        format: DocumentFormat,

        /// Protect living individuals with the default privacy policy
        #[arg(long)]
        privacy: bool,

        /// Output path (stdout when unset)
        #[arg(long)]
        output: Option<String>,
    },

    /// Print core linkage probe and version
    Version,
}
