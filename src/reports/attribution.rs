use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use super::{palette_color, place, select_period, Bucket, TimeRange, ViewMode};
use crate::db;
use crate::error::not_found;
use crate::holdings::{LedgerIndex, Valuation};
use crate::strategy::{self, Placement};

/// Contribution of one group to the period's profit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionEntry {
    pub id: String,
    pub name: String,
    pub color: String,
    pub end_val: Decimal,
    pub end_cost: Decimal,
    pub change_val: Decimal,
    pub change_input: Decimal,
    pub profit: Decimal,
}

#[derive(Debug, Default, Clone, Copy)]
struct Sums {
    value: Decimal,
    cost: Decimal,
}

impl Sums {
    fn add(&mut self, v: &Valuation) {
        self.value += v.market_value;
        self.cost += v.total_cost;
    }
}

/// Group label and colour in display order
struct Group {
    id: String,
    name: String,
    color: String,
}

/// Split the period's profit by category bucket (total view), by layer
/// (strategy view) or by target within `layer_id`.
///
/// Periods and the strategy in force follow `metrics`. Total view drops
/// buckets with no value, no change and no profit.
pub fn attribution(
    conn: &Connection,
    view: ViewMode,
    range: TimeRange,
    layer_id: Option<i64>,
    today: NaiveDate,
) -> Result<Vec<AttributionEntry>> {
    let _scope = db::read_scope(conn)?;
    let snapshots = db::list_snapshots(conn)?;
    let period = select_period(&snapshots, range, today);
    let Some(end) = period.end else {
        return Ok(Vec::new());
    };

    let index = LedgerIndex::load(conn, Some(end.date))?;
    let end_portfolio = index.portfolio_at(end.date);
    let start_portfolio = period
        .start
        .as_ref()
        .map(|s| index.portfolio_at(s.date))
        .unwrap_or_default();

    let (groups, start_sums, end_sums) = match view {
        ViewMode::Total => {
            let groups = Bucket::ALL
                .iter()
                .map(|b| Group {
                    id: b.key().to_string(),
                    name: b.name().to_string(),
                    color: b.color().to_string(),
                })
                .collect::<Vec<_>>();
            let key = |v: &Valuation| Some(Bucket::of(v.asset.category).key().to_string());
            (
                groups,
                sum_by(&start_portfolio, key),
                sum_by(&end_portfolio, key),
            )
        }
        ViewMode::Strategy => {
            let Some(strategy) = strategy::active_strategy_at(conn, end.date)? else {
                return Ok(Vec::new());
            };
            let map = strategy::asset_map(&strategy);

            let groups = match layer_id {
                None => strategy
                    .layers
                    .iter()
                    .enumerate()
                    .map(|(i, l)| Group {
                        id: l.id.to_string(),
                        name: l.name.clone(),
                        color: palette_color(i).to_string(),
                    })
                    .collect::<Vec<_>>(),
                Some(id) => {
                    let layer = strategy
                        .layers
                        .iter()
                        .find(|l| l.id == id)
                        .ok_or_else(|| {
                            not_found(format!("layer {} in strategy '{}'", id, strategy.name))
                        })?;
                    layer
                        .targets
                        .iter()
                        .enumerate()
                        .map(|(i, t)| Group {
                            id: t.id.to_string(),
                            name: t.display_name.clone(),
                            color: palette_color(i).to_string(),
                        })
                        .collect()
                }
            };

            let group_of = |p: &Placement| match layer_id {
                None => p.layer.id.to_string(),
                Some(_) => p.target.id.to_string(),
            };
            let sum_placed = |portfolio: &[Valuation]| {
                let mut sums: HashMap<String, Sums> = HashMap::new();
                for (v, p) in place(portfolio, &map, layer_id) {
                    sums.entry(group_of(p)).or_default().add(v);
                }
                sums
            };
            (
                groups,
                sum_placed(&start_portfolio),
                sum_placed(&end_portfolio),
            )
        }
    };

    let entries = groups
        .into_iter()
        .map(|g| {
            let start = start_sums.get(&g.id).copied().unwrap_or_default();
            let end = end_sums.get(&g.id).copied().unwrap_or_default();
            AttributionEntry {
                end_val: end.value,
                end_cost: end.cost,
                change_val: end.value - start.value,
                change_input: end.cost - start.cost,
                profit: (end.value - end.cost) - (start.value - start.cost),
                id: g.id,
                name: g.name,
                color: g.color,
            }
        })
        .filter(|e| {
            view == ViewMode::Strategy
                || !(e.end_val.is_zero() && e.change_val.is_zero() && e.profit.is_zero())
        })
        .collect();

    Ok(entries)
}

fn sum_by(
    portfolio: &[Valuation],
    key: impl Fn(&Valuation) -> Option<String>,
) -> HashMap<String, Sums> {
    let mut sums: HashMap<String, Sums> = HashMap::new();
    for v in portfolio {
        if let Some(k) = key(v) {
            sums.entry(k).or_default().add(v);
        }
    }
    sums
}
