//! Command dispatcher that routes parsed clap commands to their handlers.
//!
//! Handlers print either a human table or pretty JSON and return errors
//! untouched so `main` can classify them.

mod assets;
mod prices;
mod reports;
mod snapshots;
mod strategies;

use anyhow::Result;
use chrono::NaiveDate;
use colored::Colorize;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::info;

use crate::cli::Commands;
use strata::db;
use strata::error::validation;

/// Everything a handler needs besides its own arguments
pub struct Session {
    pub db_path: PathBuf,
    pub json: bool,
    pub today: NaiveDate,
}

impl Session {
    /// Open the database, creating the schema on first use
    pub fn open_conn(&self) -> Result<Connection> {
        db::open_initialized(&self.db_path)
    }
}

/// Route a parsed command to its handler
pub fn dispatch_command(command: Commands, session: &Session) -> Result<()> {
    match command {
        Commands::Init => init(session),
        Commands::Assets { action } => assets::dispatch_assets(action, session),
        Commands::Prices { action } => prices::dispatch_prices(action, session),
        Commands::Snapshot { action } => snapshots::dispatch_snapshot(action, session),
        Commands::Strategy { action } => strategies::dispatch_strategy(action, session),
        Commands::Report { action } => reports::dispatch_report(action, session),
    }
}

fn init(session: &Session) -> Result<()> {
    db::init_database(Some(session.db_path.clone()))?;
    info!("Database ready at {:?}", session.db_path);

    if session.json {
        let payload = serde_json::json!({ "dbPath": session.db_path });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "{} Database initialized at {}",
            "✓".green().bold(),
            session.db_path.display()
        );
    }
    Ok(())
}

/// Read a JSON input file, reporting malformed content as a validation error
pub(crate) fn read_json_file<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| validation(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| validation(format!("invalid JSON in {}: {}", path.display(), e)))
}
