use anyhow::Result;
use colored::Colorize;

use super::Session;
use crate::cli::formatters::{format_assets_table, format_empty};
use crate::cli::AssetsCommands;
use strata::db::{self, AssetCategory};
use strata::error::{not_found, validation};

pub fn dispatch_assets(action: AssetsCommands, session: &Session) -> Result<()> {
    match action {
        AssetsCommands::Add { category, name } => add_asset(&category, &name, session),
        AssetsCommands::List => list_assets(session),
        AssetsCommands::Rename { id, name } => rename_asset(id, &name, session),
        AssetsCommands::Remove { id } => remove_asset(id, session),
    }
}

fn parse_category(s: &str) -> Result<AssetCategory> {
    s.parse::<AssetCategory>().map_err(|_| {
        validation(format!(
            "unknown category '{}' (expected security, fund, fixed, wealth, gold, crypto or other)",
            s
        ))
    })
}

fn add_asset(category: &str, name: &str, session: &Session) -> Result<()> {
    let category = parse_category(category)?;
    let conn = session.open_conn()?;
    let id = db::create_asset(&conn, category, name)?;

    if session.json {
        let asset = db::get_asset(&conn, id)?.ok_or_else(|| not_found(format!("asset {}", id)))?;
        println!("{}", serde_json::to_string_pretty(&asset)?);
    } else {
        println!(
            "{} Added asset #{} {} ({})",
            "✓".green().bold(),
            id,
            name.trim(),
            category.as_str()
        );
    }
    Ok(())
}

fn list_assets(session: &Session) -> Result<()> {
    let conn = session.open_conn()?;
    let assets = db::list_assets(&conn)?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&assets)?);
    } else if assets.is_empty() {
        println!("{}", format_empty("assets"));
    } else {
        println!("{}", format_assets_table(&assets));
    }
    Ok(())
}

fn rename_asset(id: i64, name: &str, session: &Session) -> Result<()> {
    let conn = session.open_conn()?;
    let asset = db::get_asset(&conn, id)?.ok_or_else(|| not_found(format!("asset {}", id)))?;
    db::update_asset(&conn, id, asset.category, name)?;

    if session.json {
        let payload = serde_json::json!({ "id": id, "name": name.trim() });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "{} Renamed asset #{}: {} → {}",
            "✓".green().bold(),
            id,
            asset.name,
            name.trim()
        );
    }
    Ok(())
}

fn remove_asset(id: i64, session: &Session) -> Result<()> {
    let conn = session.open_conn()?;
    db::delete_asset(&conn, id)?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "removed": id }))?);
    } else {
        println!("{} Removed asset #{}", "✓".green().bold(), id);
    }
    Ok(())
}
