use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{percent_of, scoped_totals, select_period, TimeRange, ViewMode};
use crate::db::{self, Snapshot};
use crate::error::not_found;
use crate::holdings::LedgerIndex;
use crate::strategy;

/// Headline figures for a period
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub end_value: Decimal,
    pub end_invested: Decimal,
    pub profit: Decimal,
    /// Profit over end invested capital, not a time- or money-weighted return
    pub return_rate: Decimal,
    pub period_label: String,
}

/// Profit and return between the period's start and end snapshots.
///
/// Total view reads the cached snapshot totals. Strategy view reconstructs
/// both endpoints and keeps the assets placed by the strategy in force on
/// the end date (optionally one layer, NotFound when that strategy has no
/// such layer).
pub fn metrics(
    conn: &Connection,
    view: ViewMode,
    range: TimeRange,
    layer_id: Option<i64>,
    today: NaiveDate,
) -> Result<Metrics> {
    let _scope = db::read_scope(conn)?;
    let snapshots = db::list_snapshots(conn)?;
    let period = select_period(&snapshots, range, today);

    let Some(end) = period.end else {
        return Ok(Metrics {
            end_value: Decimal::ZERO,
            end_invested: Decimal::ZERO,
            profit: Decimal::ZERO,
            return_rate: Decimal::ZERO,
            period_label: range.label().to_string(),
        });
    };

    let ((end_value, end_invested), (start_value, start_invested)) = match view {
        ViewMode::Total => (
            cached(Some(&end)),
            cached(period.start.as_ref()),
        ),
        ViewMode::Strategy => {
            let strategy = strategy::active_strategy_at(conn, end.date)?;
            if let (Some(strategy), Some(id)) = (strategy.as_ref(), layer_id) {
                if !strategy.layers.iter().any(|l| l.id == id) {
                    return Err(not_found(format!(
                        "layer {} in strategy '{}'",
                        id, strategy.name
                    )));
                }
            }
            let index = LedgerIndex::load(conn, Some(end.date))?;
            let at = |date: NaiveDate| {
                scoped_totals(&index.portfolio_at(date), view, strategy.as_ref(), layer_id)
            };
            (
                at(end.date),
                period
                    .start
                    .as_ref()
                    .map(|s| at(s.date))
                    .unwrap_or((Decimal::ZERO, Decimal::ZERO)),
            )
        }
    };

    let profit = (end_value - end_invested) - (start_value - start_invested);

    Ok(Metrics {
        end_value,
        end_invested,
        profit,
        return_rate: percent_of(profit, end_invested),
        period_label: range.label().to_string(),
    })
}

fn cached(snapshot: Option<&Snapshot>) -> (Decimal, Decimal) {
    snapshot
        .map(|s| (s.total_value, s.total_invested))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO))
}
