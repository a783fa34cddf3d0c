mod cli;
mod dispatcher;

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use dispatcher::Session;
use strata::config::Config;
use strata::error::{ErrorClass, PortfolioError};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    // Logs go to stderr so --json output stays parseable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match PortfolioError::classify(&e) {
            ErrorClass::Validation | ErrorClass::NotFound => {
                eprintln!("Error: {}", e);
                ExitCode::from(2)
            }
            ErrorClass::Storage => {
                error!("{:#}", e);
                eprintln!("Error: storage failure");
                ExitCode::from(1)
            }
        },
    }
}

fn run(cli: Cli, config: &Config) -> Result<()> {
    let session = Session {
        db_path: config.resolve_db_path(cli.db.as_deref())?,
        json: cli.json,
        today: chrono::Local::now().date_naive(),
    };
    dispatcher::dispatch_command(cli.command, &session)
}
