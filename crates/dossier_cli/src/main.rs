//! Command-line front end for the record store and access codes.
//!
//! # Responsibility
//! - Load configuration (`.env` first, then the process environment).
//! - Map subcommands onto `AccessService` operations and print results.

use clap::{Parser, Subcommand};
use dossier_core::{
    access_link, init_logging, AccessService, CapabilityCodec, CoreConfig, Record,
    RecordFilter, RecordStore, SqliteTable,
};
use log::error;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(version, about = "Look up records, append notes and issue access codes")]
struct Arguments {
    /// Overrides the database path from the environment.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Case-insensitive substring search; no filters lists every record.
    Search {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Adds a record with an empty note history.
    AddRecord { id: String, name: String },
    /// Appends a timestamped note to the record with exactly this identifier.
    AddNote {
        id: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        body: String,
    },
    /// Mints an access token and prints the link a scannable code encodes.
    IssueToken {
        id: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Verifies a token and shows the record it grants access to.
    Redeem { token: String },
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Arguments::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Arguments) -> Result<(), Box<dyn Error>> {
    let mut config = CoreConfig::from_env()?;
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(log_dir) = config.log_dir.as_ref().and_then(|dir| dir.to_str()) {
        init_logging(&config.log_level, log_dir)?;
    }

    let store = RecordStore::open(SqliteTable::open(&config.db_path)?)?;
    let codec = CapabilityCodec::from_secret(config.secret_key.as_bytes())?;
    let service = AccessService::new(store, codec, config.token_max_age);

    match args.command {
        Command::Search { id, name } => {
            let filter = RecordFilter::new(id.as_deref(), name.as_deref());
            print_records(&service.browse(Some(&filter))?.unwrap_or_default());
        }
        Command::AddRecord { id, name } => {
            let record = service.add_record(&id, &name)?;
            println!("added {}", record.identifier);
        }
        Command::AddNote { id, author, body } => {
            let record = service.append_note(&id, &author, &body)?;
            print_records(&[record]);
        }
        Command::IssueToken { id, name } => {
            let token = service.request_access_token(&id, &name)?;
            println!("token: {token}");
            println!("link:  {}", access_link(&config.public_url, &token)?);
        }
        Command::Redeem { token } => {
            let records = service.redeem_and_search(&token)?;
            print_records(&records);
        }
    }

    Ok(())
}

fn print_records(records: &[Record]) {
    if records.is_empty() {
        println!("No records found.");
        return;
    }

    for record in records {
        println!("{}\t{}", record.identifier, record.display_name);
        for line in record.notes.as_str().lines() {
            println!("    {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Arguments, Command};
    use clap::error::ErrorKind;
    use clap::{CommandFactory, Parser};

    #[test]
    fn command_definition_is_consistent() {
        Arguments::command().debug_assert();
    }

    #[test]
    fn version_is_a_flag_not_a_subcommand() {
        let err = Arguments::try_parse_from(["dossier", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        assert!(Arguments::try_parse_from(["dossier", "version"]).is_err());
    }

    #[test]
    fn issue_token_name_defaults_to_empty() {
        let args =
            Arguments::try_parse_from(["dossier", "--db", "x.sqlite3", "issue-token", "A1"])
                .unwrap();
        assert!(matches!(
            args.command,
            Command::IssueToken { ref id, ref name } if id == "A1" && name.is_empty()
        ));
        assert_eq!(args.db.unwrap().to_str(), Some("x.sqlite3"));
    }
}
