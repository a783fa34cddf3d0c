use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use super::{read_json_file, Session};
use crate::cli::formatters::{format_empty, format_snapshot_details, format_snapshot_list};
use crate::cli::SnapshotCommands;
use strata::snapshots::{self, AssetDelta};
use strata::utils::parse_flexible_date;

pub fn dispatch_snapshot(action: SnapshotCommands, session: &Session) -> Result<()> {
    match action {
        SnapshotCommands::Save { date, file, note } => {
            save_snapshot(&date, &file, note.as_deref(), session)
        }
        SnapshotCommands::Show { id } => show_snapshot(id, session),
        SnapshotCommands::List => list_snapshots(session),
        SnapshotCommands::Remove { id } => remove_snapshot(id, session),
    }
}

fn save_snapshot(date: &str, file: &Path, note: Option<&str>, session: &Session) -> Result<()> {
    let date = parse_flexible_date(date)?;
    let deltas: Vec<AssetDelta> = read_json_file(file)?;

    let mut conn = session.open_conn()?;
    let id = snapshots::save(&mut conn, date, &deltas, note)?;
    let details = snapshots::details(&conn, id)?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&details.snapshot)?);
    } else {
        println!(
            "{} Saved snapshot #{} for {} ({} assets)",
            "✓".green().bold(),
            id,
            date,
            deltas.len()
        );
        println!("{}", format_snapshot_details(&details));
    }
    Ok(())
}

fn show_snapshot(id: i64, session: &Session) -> Result<()> {
    let conn = session.open_conn()?;
    let details = snapshots::details(&conn, id)?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        println!("{}", format_snapshot_details(&details));
    }
    Ok(())
}

fn list_snapshots(session: &Session) -> Result<()> {
    let conn = session.open_conn()?;
    let headers = snapshots::list(&conn)?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&headers)?);
    } else if headers.is_empty() {
        println!("{}", format_empty("snapshots"));
    } else {
        println!("{}", format_snapshot_list(&headers));
    }
    Ok(())
}

fn remove_snapshot(id: i64, session: &Session) -> Result<()> {
    let mut conn = session.open_conn()?;
    snapshots::delete(&mut conn, id)?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "removed": id }))?);
    } else {
        println!("{} Removed snapshot #{}", "✓".green().bold(), id);
    }
    Ok(())
}
