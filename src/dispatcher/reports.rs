use anyhow::Result;

use super::Session;
use crate::cli::formatters::{
    format_allocation, format_attribution, format_empty, format_json, format_metrics,
    format_trend,
};
use crate::cli::ReportCommands;
use strata::error::validation;
use strata::reports::{self, TimeRange, ViewMode};
use strata::utils::parse_period_start;

fn parse_view(s: &str) -> Result<ViewMode> {
    s.parse::<ViewMode>()
        .map_err(|_| validation(format!("unknown view '{}' (expected total or strategy)", s)))
}

fn parse_range(s: &str) -> Result<TimeRange> {
    s.parse::<TimeRange>()
        .map_err(|_| validation(format!("unknown range '{}' (expected all, ytd or 1y)", s)))
}

pub fn dispatch_report(action: ReportCommands, session: &Session) -> Result<()> {
    let conn = session.open_conn()?;

    let output = match action {
        ReportCommands::Metrics { view, range, layer } => {
            let metrics = reports::metrics(
                &conn,
                parse_view(&view)?,
                parse_range(&range)?,
                layer,
                session.today,
            )?;
            if session.json {
                format_json(&metrics)?
            } else {
                format_metrics(&metrics)
            }
        }
        ReportCommands::Allocation { view, layer } => {
            let entries = reports::allocation(&conn, parse_view(&view)?, layer, session.today)?;
            if session.json {
                format_json(&entries)?
            } else if entries.is_empty() {
                format_empty("holdings")
            } else {
                format_allocation(&entries)
            }
        }
        ReportCommands::Trend { view, layer, from } => {
            let start = from.as_deref().map(parse_period_start).transpose()?;
            let points = reports::trend(&conn, parse_view(&view)?, layer, start)?;
            if session.json {
                format_json(&points)?
            } else if points.is_empty() {
                format_empty("snapshots")
            } else {
                format_trend(&points)
            }
        }
        ReportCommands::Attribution { view, range, layer } => {
            let entries = reports::attribution(
                &conn,
                parse_view(&view)?,
                parse_range(&range)?,
                layer,
                session.today,
            )?;
            if session.json {
                format_json(&entries)?
            } else if entries.is_empty() {
                format_empty("contributions")
            } else {
                format_attribution(&entries)
            }
        }
    };

    println!("{}", output);
    Ok(())
}
