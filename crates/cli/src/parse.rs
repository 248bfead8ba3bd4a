//! ArgMatches → CliCommand conversion.

use clap::ArgMatches;
use std::path::PathBuf;

/// Database file used when neither `--db` nor `--config` is given.
pub const DEFAULT_DB: &str = "sessions.redb";

/// Where the database settings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Open this file with default settings
    Path(PathBuf),
    /// Load a TOML store configuration
    Config(PathBuf),
}

/// A parsed subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    List { labels: Vec<String> },
    Labels,
    Get { key: String },
    Stats,
    Sweep,
    Delete { keys: Vec<String> },
}

/// Database source named by the global flags.
pub fn source(matches: &ArgMatches) -> Source {
    match matches.get_one::<String>("config") {
        Some(config) => Source::Config(PathBuf::from(config)),
        None => Source::Path(PathBuf::from(
            matches
                .get_one::<String>("db")
                .map(String::as_str)
                .unwrap_or(DEFAULT_DB),
        )),
    }
}

/// Translate the chosen subcommand.
pub fn matches_to_command(matches: &ArgMatches) -> Result<CliCommand, String> {
    let (name, m) = matches.subcommand().ok_or("No command given")?;
    match name {
        "list" => Ok(CliCommand::List {
            labels: m
                .get_many::<String>("label")
                .map(|labels| labels.cloned().collect())
                .unwrap_or_default(),
        }),
        "labels" => Ok(CliCommand::Labels),
        "get" => Ok(CliCommand::Get {
            key: m
                .get_one::<String>("key")
                .cloned()
                .ok_or("get requires a key")?,
        }),
        "stats" => Ok(CliCommand::Stats),
        "sweep" => Ok(CliCommand::Sweep),
        "delete" => {
            let keys: Vec<String> = m
                .get_many::<String>("keys")
                .map(|keys| keys.cloned().collect())
                .unwrap_or_default();
            if keys.is_empty() {
                return Err("delete requires at least one key".into());
            }
            Ok(CliCommand::Delete { keys })
        }
        other => Err(format!("Unknown command: {}", other)),
    }
}
