//! Clap command tree.

use clap::{Arg, ArgAction, Command};

/// Build the top-level `sessiondb` command.
pub fn build_cli() -> Command {
    Command::new("sessiondb")
        .about("Inspect and maintain a SessionDB database")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_name("PATH")
                .help("Database file (default: sessions.redb)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("FILE")
                .conflicts_with("db")
                .help("TOML store configuration"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print machine-readable JSON"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("Log more (-v debug, -vv trace)"),
        )
        .subcommand(
            Command::new("list").about("List stored sessions").arg(
                Arg::new("label")
                    .long("label")
                    .value_name("LABEL")
                    .action(ArgAction::Append)
                    .help("Only sessions carrying this label (repeatable)"),
            ),
        )
        .subcommand(Command::new("labels").about("List every label in use"))
        .subcommand(
            Command::new("get")
                .about("Show one session")
                .arg(Arg::new("key").required(true)),
        )
        .subcommand(Command::new("stats").about("Count live and expired sessions"))
        .subcommand(Command::new("sweep").about("Delete expired sessions now"))
        .subcommand(
            Command::new("delete")
                .about("Delete sessions")
                .arg(Arg::new("keys").required(true).num_args(1..)),
        )
}
