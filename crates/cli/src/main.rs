//! SessionDB CLI: inspect and maintain a session database.
//!
//! `sessiondb [--db PATH | --config FILE] [--json] [-v] COMMAND`
//!
//! The background sweeper is never started here; `sweep` runs one sweep.
//! Closing the database on exit runs a final sweep as well.

mod commands;
mod format;
mod parse;

use std::process;

use chrono::Utc;
use sessiondb::{Result, SessionDb, SessionFilter, StoreConfig};
use tracing::level_filters::LevelFilter;

use commands::build_cli;
use format::{
    format_deleted, format_error, format_labels, format_record, format_records, format_stats,
    format_sweep, OutputMode,
};
use parse::{matches_to_command, source, CliCommand, Source};

fn main() {
    let matches = build_cli().get_matches();

    let level = match matches.get_count("verbose") {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let command = match matches_to_command(&matches) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(2);
        }
    };

    let db = match open_database(&source(&matches)) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    };

    let exit_code = match execute(&db, command, mode) {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            1
        }
    };
    db.close();
    process::exit(exit_code);
}

fn open_database(source: &Source) -> Result<SessionDb> {
    let config = match source {
        Source::Path(path) => StoreConfig {
            path: Some(path.clone()),
            ..StoreConfig::default()
        },
        Source::Config(file) => StoreConfig::from_file(file)?,
    };
    SessionDb::builder().config(config).no_sweeper().open()
}

fn execute(db: &SessionDb, command: CliCommand, mode: OutputMode) -> Result<String> {
    let now = Utc::now();
    match command {
        CliCommand::List { labels } if labels.is_empty() => {
            Ok(format_records(&db.list()?, now, mode))
        }
        CliCommand::List { labels } => {
            let filter = labels
                .into_iter()
                .fold(SessionFilter::new(), |filter, label| filter.with_label(label));
            Ok(format_records(&db.list_filtered(&filter, now)?, now, mode))
        }
        CliCommand::Labels => Ok(format_labels(&db.all_labels()?, mode)),
        CliCommand::Get { key } => Ok(format_record(db.get(&key)?.as_ref(), now, mode)),
        CliCommand::Stats => Ok(format_stats(&db.stats(now)?, mode)),
        CliCommand::Sweep => Ok(format_sweep(&db.sweep_expired(now)?, mode)),
        CliCommand::Delete { keys } => Ok(format_deleted(db.delete_many(&keys)?, mode)),
    }
}
