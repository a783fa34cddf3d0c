use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::{scoped_totals, ViewMode};
use crate::db;
use crate::holdings::LedgerIndex;
use crate::strategy;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: Decimal,
    pub invested: Decimal,
}

/// One point per snapshot date, reconstructed from the ledger.
///
/// In strategy view each point uses the strategy in force on that point's
/// date, so history reflects the allocation rules of the time. A `layer_id`
/// missing from a historical strategy yields a zero point.
pub fn trend(
    conn: &Connection,
    view: ViewMode,
    layer_id: Option<i64>,
    start_date: Option<NaiveDate>,
) -> Result<Vec<TrendPoint>> {
    let _scope = db::read_scope(conn)?;
    let snapshots = db::list_snapshots(conn)?;
    let index = LedgerIndex::load(conn, None)?;
    let versions = match view {
        ViewMode::Total => Vec::new(),
        ViewMode::Strategy => db::list_strategies(conn)?,
    };

    let points: Vec<TrendPoint> = snapshots
        .iter()
        .filter(|s| start_date.map_or(true, |start| s.date >= start))
        .map(|s| {
            let active = strategy::select_active(&versions, s.date);
            let (value, invested) =
                scoped_totals(&index.portfolio_at(s.date), view, active, layer_id);
            TrendPoint {
                date: s.date,
                value,
                invested,
            }
        })
        .collect();

    debug!("Built trend with {} points", points.len());
    Ok(points)
}
