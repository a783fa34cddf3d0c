use anyhow::Result;
use std::collections::HashMap;

use super::Session;
use crate::cli::formatters::{format_empty, format_prices_table};
use crate::cli::PriceCommands;
use strata::db;
use strata::utils::parse_flexible_date;

pub fn dispatch_prices(action: PriceCommands, session: &Session) -> Result<()> {
    match action {
        PriceCommands::List { asset, at } => {
            let max_date = at.as_deref().map(parse_flexible_date).transpose()?;
            let conn = session.open_conn()?;
            let prices = db::list_prices(&conn, asset, max_date)?;

            if session.json {
                println!("{}", serde_json::to_string_pretty(&prices)?);
                return Ok(());
            }
            if prices.is_empty() {
                println!("{}", format_empty("price observations"));
                return Ok(());
            }

            let names: HashMap<i64, String> = db::list_assets(&conn)?
                .into_iter()
                .map(|a| (a.id, a.name))
                .collect();
            println!("{}", format_prices_table(&prices, &names));
            Ok(())
        }
    }
}
