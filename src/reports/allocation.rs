use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::{palette_color, percent_of, place, Bucket, ViewMode};
use crate::db;
use crate::error::not_found;
use crate::holdings::{LedgerIndex, Valuation};
use crate::strategy;

/// One slice of an allocation breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub value: Decimal,
    pub percent: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_percent: Option<Decimal>,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_layer: Option<bool>,
}

/// Allocation of the latest reconstructed portfolio.
///
/// The portfolio is reconstructed as of the latest snapshot date (or `today`
/// when there is none). Total view groups by category bucket; strategy view
/// compares each layer, or each target of `layer_id`, with its configured
/// weight.
pub fn allocation(
    conn: &Connection,
    view: ViewMode,
    layer_id: Option<i64>,
    today: NaiveDate,
) -> Result<Vec<AllocationEntry>> {
    let _scope = db::read_scope(conn)?;
    let as_of = db::list_snapshots(conn)?
        .last()
        .map(|s| s.date)
        .unwrap_or(today);
    let index = LedgerIndex::load(conn, Some(as_of))?;
    let portfolio = index.portfolio_at(as_of);

    match view {
        ViewMode::Total => Ok(by_bucket(&portfolio)),
        ViewMode::Strategy => {
            let Some(strategy) = strategy::active_strategy_at(conn, as_of)? else {
                return Ok(Vec::new());
            };
            let map = strategy::asset_map(&strategy);

            match layer_id {
                None => {
                    let mut by_layer: BTreeMap<i64, Decimal> = BTreeMap::new();
                    for (v, placement) in place(&portfolio, &map, None) {
                        *by_layer.entry(placement.layer.id).or_default() += v.market_value;
                    }
                    let total: Decimal = by_layer.values().copied().sum();

                    Ok(strategy
                        .layers
                        .iter()
                        .enumerate()
                        .map(|(i, layer)| {
                            let value = by_layer.get(&layer.id).copied().unwrap_or_default();
                            let percent = percent_of(value, total);
                            AllocationEntry {
                                id: Some(layer.id.to_string()),
                                name: layer.name.clone(),
                                value,
                                percent,
                                target_percent: Some(layer.weight),
                                color: palette_color(i).to_string(),
                                deviation: Some(percent - layer.weight),
                                is_layer: Some(true),
                            }
                        })
                        .collect())
                }
                Some(layer_id) => {
                    let layer = strategy
                        .layers
                        .iter()
                        .find(|l| l.id == layer_id)
                        .ok_or_else(|| {
                            not_found(format!(
                                "layer {} in strategy '{}'",
                                layer_id, strategy.name
                            ))
                        })?;

                    let mut by_target: BTreeMap<i64, Decimal> = BTreeMap::new();
                    for (v, placement) in place(&portfolio, &map, Some(layer_id)) {
                        *by_target.entry(placement.target.id).or_default() += v.market_value;
                    }
                    let layer_total: Decimal = by_target.values().copied().sum();
                    let weights = strategy::resolve_target_weights(layer);

                    Ok(layer
                        .targets
                        .iter()
                        .zip(weights)
                        .enumerate()
                        .map(|(i, (target, (_, weight)))| {
                            let value = by_target.get(&target.id).copied().unwrap_or_default();
                            let percent = percent_of(value, layer_total);
                            AllocationEntry {
                                id: Some(target.id.to_string()),
                                name: target.display_name.clone(),
                                value,
                                percent,
                                target_percent: Some(weight),
                                color: palette_color(i).to_string(),
                                deviation: Some(percent - weight),
                                is_layer: Some(false),
                            }
                        })
                        .collect())
                }
            }
        }
    }
}

fn by_bucket(portfolio: &[Valuation]) -> Vec<AllocationEntry> {
    let mut values: BTreeMap<Bucket, Decimal> = BTreeMap::new();
    for v in portfolio {
        *values.entry(Bucket::of(v.asset.category)).or_default() += v.market_value;
    }
    let grand_total: Decimal = values.values().copied().sum();

    Bucket::ALL
        .iter()
        .filter_map(|bucket| {
            let value = *values.get(bucket)?;
            Some(AllocationEntry {
                id: Some(bucket.key().to_string()),
                name: bucket.name().to_string(),
                value,
                percent: percent_of(value, grand_total),
                target_percent: None,
                color: bucket.color().to_string(),
                deviation: None,
                is_layer: None,
            })
        })
        .collect()
}
