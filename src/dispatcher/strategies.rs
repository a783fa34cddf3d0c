use anyhow::Result;
use colored::Colorize;

use super::{read_json_file, Session};
use crate::cli::formatters::{format_empty, format_strategy, format_strategy_list};
use crate::cli::StrategyCommands;
use strata::db::{self, NewStrategyVersion};
use strata::strategy;
use strata::utils::parse_flexible_date;

pub fn dispatch_strategy(action: StrategyCommands, session: &Session) -> Result<()> {
    match action {
        StrategyCommands::Save { file } => {
            let input: NewStrategyVersion = read_json_file(&file)?;
            let mut conn = session.open_conn()?;
            let id = db::save_strategy(&mut conn, &input)?;
            let saved = db::get_strategy(&conn, id)?;

            if session.json {
                println!("{}", serde_json::to_string_pretty(&saved)?);
            } else {
                println!(
                    "{} Saved strategy #{} '{}' starting {}",
                    "✓".green().bold(),
                    id,
                    saved.name,
                    saved.start_date
                );
                println!("{}", format_strategy(&saved));
            }
            Ok(())
        }
        StrategyCommands::List => {
            let conn = session.open_conn()?;
            let versions = db::list_strategies(&conn)?;

            if session.json {
                println!("{}", serde_json::to_string_pretty(&versions)?);
            } else if versions.is_empty() {
                println!("{}", format_empty("strategies"));
            } else {
                println!("{}", format_strategy_list(&versions));
            }
            Ok(())
        }
        StrategyCommands::Show { id } => {
            let conn = session.open_conn()?;
            let version = db::get_strategy(&conn, id)?;

            if session.json {
                println!("{}", serde_json::to_string_pretty(&version)?);
            } else {
                println!("{}", format_strategy(&version));
            }
            Ok(())
        }
        StrategyCommands::Active { at } => {
            let date = match at.as_deref() {
                Some(d) => parse_flexible_date(d)?,
                None => session.today,
            };
            let conn = session.open_conn()?;
            let active = strategy::active_strategy_at(&conn, date)?;

            match (active, session.json) {
                (Some(version), true) => println!("{}", serde_json::to_string_pretty(&version)?),
                (None, true) => println!("null"),
                (Some(version), false) => println!("{}", format_strategy(&version)),
                (None, false) => println!("{}", format_empty("strategies")),
            }
            Ok(())
        }
        StrategyCommands::Remove { id } => {
            let mut conn = session.open_conn()?;
            db::delete_strategy(&mut conn, id)?;

            if session.json {
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "removed": id }))?);
            } else {
                println!("{} Removed strategy #{}", "✓".green().bold(), id);
            }
            Ok(())
        }
    }
}
