//! Rootline CLI: the `rootline` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    support::start_logging(cli.log_level.as_deref(), cli.log_dir.as_deref());

    match cli.command {
        Commands::Preprocess {
            input,
            mode,
            output,
        } => commands::preprocess::run(input, mode, output),

        Commands::Analyze {
            input,
            reference_year,
            fix_output,
            json,
        } => commands::analyze::run(input, reference_year, fix_output, json),

        Commands::Anonymize {
            input,
            keep_dates,
            keep_places,
            output,
        } => commands::anonymize::run(input, keep_dates, keep_places, output),

        Commands::Export {
            input,
            format,
            privacy,
            output,
        } => commands::export::run(input, format, privacy, output),

        Commands::Import {
            input,
            db,
            format,
            overwrite,
            json,
        } => commands::import::run(input, db, format, overwrite, json),

        Commands::ExportStore {
            db,
            format,
            privacy,
            output,
        } => commands::export::run_store(db, format, privacy, output),

        Commands::Version => {
            println!("rootline_core ping={}", rootline_core::ping());
            println!("rootline_core version={}", rootline_core::core_version());
        }
    }
}
