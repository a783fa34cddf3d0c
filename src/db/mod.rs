// Database module - SQLite connection, ledger store and snapshot headers

pub mod models;
pub mod strategies;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{not_found, validation};
pub use models::{
    Asset, AssetCategory, Layer, NewLayer, NewStrategyVersion, NewTarget, PricePoint, Snapshot,
    StrategyVersion, Target, Transaction, TransactionType, AUTO_WEIGHT,
};
pub use strategies::{delete_strategy, get_strategy, list_strategies, save_strategy};

/// How long a connection waits for another writer before giving up
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Get the default database path (~/.strata/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".strata").join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    // Concurrent writers queue behind the lock instead of failing at once
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set busy timeout")?;

    Ok(conn)
}

/// Initialize the database with schema
///
/// Safe to run repeatedly; every statement is `IF NOT EXISTS`.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    apply_schema(&conn)?;

    info!("Database initialized successfully");
    Ok(())
}

/// Run the schema SQL on an open connection
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("schema.sql"))
        .context("Failed to execute schema")
}

/// Open a database and make sure the schema exists
pub fn open_initialized(db_path: &Path) -> Result<Connection> {
    let conn = open_db(Some(db_path.to_path_buf()))?;
    apply_schema(&conn)?;
    Ok(conn)
}

/// Open a read transaction when the connection is not already inside one.
///
/// Multi-query reads hold the returned guard so they observe one consistent
/// state of the ledger; dropping it ends the (read-only) transaction.
pub fn read_scope(conn: &Connection) -> Result<Option<rusqlite::Transaction<'_>>> {
    if conn.is_autocommit() {
        Ok(Some(conn.unchecked_transaction()?))
    } else {
        Ok(None)
    }
}

/// Begin a unit of work that takes the write lock up front.
///
/// Commit explicitly; dropping the transaction rolls it back.
pub fn write_transaction(conn: &mut Connection) -> Result<rusqlite::Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .context("Failed to begin write transaction")
}

// ============ Assets ============

fn asset_from_row(row: &rusqlite::Row) -> Result<Asset, rusqlite::Error> {
    Ok(Asset {
        id: row.get(0)?,
        category: row
            .get::<_, String>(1)?
            .parse::<AssetCategory>()
            .unwrap_or(AssetCategory::Other),
        name: row.get(2)?,
    })
}

/// Create an asset, returns its id
pub fn create_asset(conn: &Connection, category: AssetCategory, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(validation("asset name cannot be empty"));
    }
    conn.execute(
        "INSERT INTO assets (category, name) VALUES (?1, ?2)",
        params![category.as_str(), name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_asset(conn: &Connection, id: i64) -> Result<Option<Asset>> {
    let asset = conn
        .query_row(
            "SELECT id, category, name FROM assets WHERE id = ?1",
            [id],
            asset_from_row,
        )
        .optional()?;
    Ok(asset)
}

/// Get all assets ordered by id
pub fn list_assets(conn: &Connection) -> Result<Vec<Asset>> {
    let mut stmt = conn.prepare("SELECT id, category, name FROM assets ORDER BY id")?;
    let assets = stmt
        .query_map([], asset_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(assets)
}

pub fn update_asset(
    conn: &Connection,
    id: i64,
    category: AssetCategory,
    name: &str,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(validation("asset name cannot be empty"));
    }
    let changed = conn.execute(
        "UPDATE assets SET category = ?1, name = ?2, updated_at = datetime('now') WHERE id = ?3",
        params![category.as_str(), name, id],
    )?;
    if changed == 0 {
        return Err(not_found(format!("asset {}", id)));
    }
    Ok(())
}

/// Delete an asset that no ledger row or strategy target references
pub fn delete_asset(conn: &Connection, id: i64) -> Result<()> {
    let references: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM transactions WHERE asset_id = ?1)
              + (SELECT COUNT(*) FROM price_history WHERE asset_id = ?1)
              + (SELECT COUNT(*) FROM strategy_targets WHERE asset_id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    if references > 0 {
        return Err(validation(format!(
            "asset {} is still referenced by {} ledger or strategy rows",
            id, references
        )));
    }
    let changed = conn.execute("DELETE FROM assets WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(not_found(format!("asset {}", id)));
    }
    Ok(())
}

// ============ Transactions ============

/// Insert transaction
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (
            asset_id, trade_date, transaction_type, quantity_change, cost_change, snapshot_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            tx.asset_id,
            tx.trade_date,
            tx.transaction_type.as_str(),
            tx.quantity_change.to_string(),
            tx.cost_change.to_string(),
            tx.snapshot_id,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// List transactions ordered by date then insertion, with optional filters
pub fn list_transactions(
    conn: &Connection,
    asset_id: Option<i64>,
    max_date: Option<NaiveDate>,
    snapshot_id: Option<i64>,
) -> Result<Vec<Transaction>> {
    let mut sql = String::from(
        "SELECT id, asset_id, trade_date, transaction_type, quantity_change, cost_change, snapshot_id
         FROM transactions
         WHERE 1=1",
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(id) = asset_id {
        sql.push_str(" AND asset_id = ?");
        params.push(Box::new(id));
    }
    if let Some(d) = max_date {
        sql.push_str(" AND trade_date <= ?");
        params.push(Box::new(d));
    }
    if let Some(s) = snapshot_id {
        sql.push_str(" AND snapshot_id = ?");
        params.push(Box::new(s));
    }
    sql.push_str(" ORDER BY trade_date ASC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let transactions = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(Transaction {
                id: Some(row.get(0)?),
                asset_id: row.get(1)?,
                trade_date: row.get(2)?,
                transaction_type: row
                    .get::<_, String>(3)?
                    .parse::<TransactionType>()
                    .unwrap_or(TransactionType::Adjustment),
                quantity_change: get_decimal_value(row, 4)?,
                cost_change: get_decimal_value(row, 5)?,
                snapshot_id: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// Delete every transaction produced by one snapshot save, returns the count
pub fn delete_transactions_by_snapshot(conn: &Connection, snapshot_id: i64) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM transactions WHERE snapshot_id = ?1",
        [snapshot_id],
    )?;
    Ok(deleted)
}

// ============ Prices ============

/// Insert or replace the price observation for (asset, date)
pub fn upsert_price(conn: &Connection, asset_id: i64, date: NaiveDate, price: Decimal) -> Result<()> {
    conn.execute(
        "INSERT INTO price_history (asset_id, price_date, price) VALUES (?1, ?2, ?3)
         ON CONFLICT(asset_id, price_date) DO UPDATE SET price = excluded.price",
        params![asset_id, date, price.to_string()],
    )?;
    Ok(())
}

/// List prices ordered by asset then date, with optional filters
pub fn list_prices(
    conn: &Connection,
    asset_id: Option<i64>,
    max_date: Option<NaiveDate>,
) -> Result<Vec<PricePoint>> {
    let mut sql = String::from(
        "SELECT asset_id, price_date, price FROM price_history WHERE 1=1",
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(id) = asset_id {
        sql.push_str(" AND asset_id = ?");
        params.push(Box::new(id));
    }
    if let Some(d) = max_date {
        sql.push_str(" AND price_date <= ?");
        params.push(Box::new(d));
    }
    sql.push_str(" ORDER BY asset_id ASC, price_date ASC");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let prices = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(PricePoint {
                asset_id: row.get(0)?,
                price_date: row.get(1)?,
                price: get_decimal_value(row, 2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(prices)
}

/// Get the latest price on or before a given date
pub fn get_price_on_or_before(
    conn: &Connection,
    asset_id: i64,
    as_of_date: NaiveDate,
) -> Result<Option<Decimal>> {
    let price = conn
        .query_row(
            "SELECT price FROM price_history
             WHERE asset_id = ?1 AND price_date <= ?2
             ORDER BY price_date DESC
             LIMIT 1",
            params![asset_id, as_of_date],
            |row| get_decimal_value(row, 0),
        )
        .optional()?;
    Ok(price)
}

// ============ Snapshot headers ============

fn snapshot_from_row(row: &rusqlite::Row) -> Result<Snapshot, rusqlite::Error> {
    Ok(Snapshot {
        id: row.get(0)?,
        date: row.get(1)?,
        total_value: get_decimal_value(row, 2)?,
        total_invested: get_decimal_value(row, 3)?,
        note: row.get(4)?,
    })
}

const SNAPSHOT_COLUMNS: &str = "id, snapshot_date, total_value, total_invested, note";

pub fn find_snapshot_by_date(conn: &Connection, date: NaiveDate) -> Result<Option<Snapshot>> {
    let snapshot = conn
        .query_row(
            &format!("SELECT {} FROM snapshots WHERE snapshot_date = ?1", SNAPSHOT_COLUMNS),
            [date],
            snapshot_from_row,
        )
        .optional()?;
    Ok(snapshot)
}

pub fn get_snapshot(conn: &Connection, id: i64) -> Result<Option<Snapshot>> {
    let snapshot = conn
        .query_row(
            &format!("SELECT {} FROM snapshots WHERE id = ?1", SNAPSHOT_COLUMNS),
            [id],
            snapshot_from_row,
        )
        .optional()?;
    Ok(snapshot)
}

/// All snapshot headers, ascending by date
pub fn list_snapshots(conn: &Connection) -> Result<Vec<Snapshot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM snapshots ORDER BY snapshot_date ASC",
        SNAPSHOT_COLUMNS
    ))?;
    let snapshots = stmt
        .query_map([], snapshot_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(snapshots)
}

/// Return the id of the snapshot for `date`, creating an empty header if needed
pub fn ensure_snapshot_id(conn: &Connection, date: NaiveDate) -> Result<i64> {
    if let Some(existing) = find_snapshot_by_date(conn, date)? {
        return Ok(existing.id);
    }
    conn.execute(
        "INSERT INTO snapshots (snapshot_date) VALUES (?1)",
        [date],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Write freshly computed totals into a snapshot header
pub fn update_snapshot_totals(
    conn: &Connection,
    id: i64,
    total_value: Decimal,
    total_invested: Decimal,
    note: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE snapshots
         SET total_value = ?1, total_invested = ?2, note = ?3, updated_at = datetime('now')
         WHERE id = ?4",
        params![total_value.to_string(), total_invested.to_string(), note, id],
    )?;
    Ok(())
}

pub fn delete_snapshot_header(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM snapshots WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

/// Helper to read Decimal from SQLite (handles INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Decimal::from_str(s).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => {
            Decimal::try_from(f).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Null,
        )),
    }
}
