//! Snapshot cache: materialised per-date totals derived from the ledger.
//!
//! A snapshot header is never a source of truth. Every save rewrites the
//! ledger rows tagged with the snapshot, then recomputes the cached totals of
//! that header and of every later header from a full reconstruction, all in
//! one SQLite transaction.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::db::{self, Asset, Snapshot, Transaction, TransactionType};
use crate::error::{not_found, validation};
use crate::holdings::{self, is_negligible, LedgerIndex};

/// Observed state of one asset on the snapshot date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDelta {
    pub asset_id: i64,
    /// Observed unit price; `None` leaves the price history untouched
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub added_quantity: Decimal,
    #[serde(default)]
    pub added_principal: Decimal,
}

/// Asset line of a snapshot: holdings as of the date plus this save's delta
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAsset {
    pub asset: Asset,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub market_value: Decimal,
    pub total_cost: Decimal,
    pub added_quantity: Decimal,
    pub added_principal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDetails {
    pub snapshot: Snapshot,
    pub assets: Vec<SnapshotAsset>,
}

fn validate_deltas(conn: &Connection, deltas: &[AssetDelta]) -> Result<()> {
    for delta in deltas {
        if db::get_asset(conn, delta.asset_id)?.is_none() {
            return Err(validation(format!("unknown asset id {}", delta.asset_id)));
        }
        if let Some(price) = delta.unit_price {
            if price < Decimal::ZERO {
                return Err(validation(format!(
                    "price for asset {} cannot be negative",
                    delta.asset_id
                )));
            }
        }
    }
    Ok(())
}

/// Save the state observed on `date` and return the snapshot id.
///
/// Re-saving a date replaces the transactions previously tagged with its
/// snapshot, so identical input is idempotent.
pub fn save(
    conn: &mut Connection,
    date: NaiveDate,
    deltas: &[AssetDelta],
    note: Option<&str>,
) -> Result<i64> {
    let tx = db::write_transaction(conn).context("Failed to begin snapshot save")?;

    validate_deltas(&tx, deltas)?;

    let snapshot_id = db::ensure_snapshot_id(&tx, date)?;
    let removed = db::delete_transactions_by_snapshot(&tx, snapshot_id)?;

    let mut prices = 0;
    let mut inserted = 0;
    for delta in deltas {
        if let Some(price) = delta.unit_price {
            db::upsert_price(&tx, delta.asset_id, date, price)?;
            prices += 1;
        }
        if !is_negligible(delta.added_quantity) || !is_negligible(delta.added_principal) {
            db::insert_transaction(
                &tx,
                &Transaction {
                    id: None,
                    asset_id: delta.asset_id,
                    trade_date: date,
                    transaction_type: TransactionType::Adjustment,
                    quantity_change: delta.added_quantity,
                    cost_change: delta.added_principal,
                    snapshot_id: Some(snapshot_id),
                },
            )?;
            inserted += 1;
        }
    }

    let note = note.map(str::trim).filter(|n| !n.is_empty());
    let portfolio = holdings::portfolio_at(&tx, date)?;
    let (total_value, total_invested) = holdings::totals(&portfolio);
    db::update_snapshot_totals(&tx, snapshot_id, total_value, total_invested, note)?;

    let refreshed = refresh_snapshots_after(&tx, date)?;

    tx.commit().context("Failed to commit snapshot save")?;

    info!(
        "Saved snapshot {} for {}: {} replaced, {} transactions, {} prices, {} later snapshots refreshed",
        snapshot_id, date, removed, inserted, prices, refreshed
    );
    Ok(snapshot_id)
}

/// Recompute cached totals of every snapshot dated after `date`.
/// Returns how many headers were rewritten.
pub fn refresh_snapshots_after(conn: &Connection, date: NaiveDate) -> Result<usize> {
    let later: Vec<Snapshot> = db::list_snapshots(conn)?
        .into_iter()
        .filter(|s| s.date > date)
        .collect();
    if later.is_empty() {
        return Ok(0);
    }

    let index = LedgerIndex::load(conn, None)?;
    for snapshot in &later {
        let (value, invested) = holdings::totals(&index.portfolio_at(snapshot.date));
        db::update_snapshot_totals(conn, snapshot.id, value, invested, snapshot.note.as_deref())?;
        debug!("Refreshed snapshot {} ({})", snapshot.id, snapshot.date);
    }
    Ok(later.len())
}

/// Snapshot header with the portfolio as of its date and this save's deltas
pub fn details(conn: &Connection, snapshot_id: i64) -> Result<SnapshotDetails> {
    let _scope = db::read_scope(conn)?;
    let snapshot = db::get_snapshot(conn, snapshot_id)?
        .ok_or_else(|| not_found(format!("snapshot {}", snapshot_id)))?;

    let mut added: BTreeMap<i64, (Decimal, Decimal)> = BTreeMap::new();
    for tx in db::list_transactions(conn, None, None, Some(snapshot_id))? {
        let entry = added.entry(tx.asset_id).or_default();
        entry.0 += tx.quantity_change;
        entry.1 += tx.cost_change;
    }

    let index = LedgerIndex::load(conn, Some(snapshot.date))?;
    let mut assets: Vec<SnapshotAsset> = index
        .portfolio_at(snapshot.date)
        .into_iter()
        .map(|v| {
            let (added_quantity, added_principal) =
                added.remove(&v.asset.id).unwrap_or_default();
            SnapshotAsset {
                asset: v.asset,
                quantity: v.quantity,
                unit_price: v.unit_price,
                market_value: v.market_value,
                total_cost: v.total_cost,
                added_quantity,
                added_principal,
            }
        })
        .collect();

    // Positions closed by this very save still show what changed
    for (asset_id, (added_quantity, added_principal)) in added {
        let holding = index.holding_at(asset_id, snapshot.date);
        let unit_price = index.price_at(asset_id, snapshot.date);
        assets.push(SnapshotAsset {
            asset: index.asset(asset_id),
            quantity: holding.quantity,
            unit_price,
            market_value: holding.quantity * unit_price,
            total_cost: holding.total_cost,
            added_quantity,
            added_principal,
        });
    }
    assets.sort_by_key(|a| a.asset.id);

    Ok(SnapshotDetails { snapshot, assets })
}

/// All snapshot headers ascending by date
pub fn list(conn: &Connection) -> Result<Vec<Snapshot>> {
    db::list_snapshots(conn)
}

/// Delete a snapshot and the transactions it produced; price observations stay
pub fn delete(conn: &mut Connection, snapshot_id: i64) -> Result<()> {
    let tx = db::write_transaction(conn)?;
    let snapshot = db::get_snapshot(&tx, snapshot_id)?
        .ok_or_else(|| not_found(format!("snapshot {}", snapshot_id)))?;

    let removed = db::delete_transactions_by_snapshot(&tx, snapshot_id)?;
    db::delete_snapshot_header(&tx, snapshot_id)?;
    let refreshed = refresh_snapshots_after(&tx, snapshot.date)?;
    tx.commit()?;

    info!(
        "Deleted snapshot {} ({}): {} transactions removed, {} later snapshots refreshed",
        snapshot_id, snapshot.date, removed, refreshed
    );
    Ok(())
}
