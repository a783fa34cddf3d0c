//! Point-in-time reconstruction of holdings, prices and valuations.
//!
//! Single-asset lookups (`holdings_at`, `price_at`, `valuation_at`) query the
//! ledger directly. Bulk reconstruction goes through [`LedgerIndex`], which
//! loads the ledger once, groups it per asset and answers each date with a
//! binary search over date-sorted, prefix-summed series. Trend lines call it
//! once per snapshot date, so it must not rescan the ledger per call.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::db::{self, Asset, AssetCategory};

/// Quantities smaller than this are floating noise and count as zero
pub const QUANTITY_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

pub fn is_negligible(value: Decimal) -> bool {
    value.abs() < QUANTITY_EPSILON
}

/// Cumulative ledger position of one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub quantity: Decimal,
    pub total_cost: Decimal,
}

/// Holding priced at a date
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub asset: Asset,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub market_value: Decimal,
    pub total_cost: Decimal,
}

impl Valuation {
    fn new(asset: Asset, holding: Holding, unit_price: Decimal) -> Self {
        Self {
            asset,
            quantity: holding.quantity,
            unit_price,
            market_value: holding.quantity * unit_price,
            total_cost: holding.total_cost,
        }
    }
}

/// Price used when no observation exists at or before the date
pub fn default_price(category: AssetCategory) -> Decimal {
    if category.is_cash_like() {
        Decimal::ONE
    } else {
        Decimal::ZERO
    }
}

/// Sum of all transactions for the asset dated on or before `date`
pub fn holdings_at(conn: &Connection, asset_id: i64, date: NaiveDate) -> Result<Holding> {
    let transactions = db::list_transactions(conn, Some(asset_id), Some(date), None)?;
    let holding = transactions
        .iter()
        .fold(Holding::default(), |acc, tx| Holding {
            quantity: acc.quantity + tx.quantity_change,
            total_cost: acc.total_cost + tx.cost_change,
        });
    Ok(holding)
}

/// Most recent observed price on or before `date`, falling back to the
/// category default when nothing has been observed yet
pub fn price_at(
    conn: &Connection,
    asset_id: i64,
    date: NaiveDate,
    category: AssetCategory,
) -> Result<Decimal> {
    let price = db::get_price_on_or_before(conn, asset_id, date)?;
    Ok(price.unwrap_or_else(|| default_price(category)))
}

/// Holdings and price composed into a market valuation
pub fn valuation_at(conn: &Connection, asset_id: i64, date: NaiveDate) -> Result<Valuation> {
    let asset = db::get_asset(conn, asset_id)?.unwrap_or_else(|| {
        warn!("No asset record for id {}, using placeholder", asset_id);
        Asset::placeholder(asset_id)
    });
    let holding = holdings_at(conn, asset_id, date)?;
    let unit_price = price_at(conn, asset_id, date, asset.category)?;
    Ok(Valuation::new(asset, holding, unit_price))
}

/// Every asset with a non-zero position as of `date`
pub fn portfolio_at(conn: &Connection, date: NaiveDate) -> Result<Vec<Valuation>> {
    let index = LedgerIndex::load(conn, Some(date))?;
    Ok(index.portfolio_at(date))
}

/// Date-sorted ledger series for one asset with running totals
#[derive(Debug, Default)]
struct AssetSeries {
    tx_dates: Vec<NaiveDate>,
    cum_quantity: Vec<Decimal>,
    cum_cost: Vec<Decimal>,
    price_dates: Vec<NaiveDate>,
    prices: Vec<Decimal>,
}

impl AssetSeries {
    fn holding_at(&self, date: NaiveDate) -> Holding {
        // Number of transactions dated <= date
        let n = self.tx_dates.partition_point(|d| *d <= date);
        if n == 0 {
            return Holding::default();
        }
        Holding {
            quantity: self.cum_quantity[n - 1],
            total_cost: self.cum_cost[n - 1],
        }
    }

    fn price_at(&self, date: NaiveDate) -> Option<Decimal> {
        let n = self.price_dates.partition_point(|d| *d <= date);
        (n > 0).then(|| self.prices[n - 1])
    }
}

/// In-memory, per-asset view of the ledger for repeated point-in-time queries
#[derive(Debug, Default)]
pub struct LedgerIndex {
    assets: HashMap<i64, Asset>,
    series: BTreeMap<i64, AssetSeries>,
}

impl LedgerIndex {
    /// Load assets, transactions and prices (optionally only up to `max_date`)
    /// in one consistent read.
    pub fn load(conn: &Connection, max_date: Option<NaiveDate>) -> Result<Self> {
        let _scope = db::read_scope(conn)?;
        let assets = db::list_assets(conn)?;
        let transactions = db::list_transactions(conn, None, max_date, None)?;
        let prices = db::list_prices(conn, None, max_date)?;

        debug!(
            "Loaded ledger index: {} assets, {} transactions, {} prices",
            assets.len(),
            transactions.len(),
            prices.len()
        );

        Ok(Self::build(
            assets,
            transactions
                .into_iter()
                .map(|t| (t.asset_id, t.trade_date, t.quantity_change, t.cost_change)),
            prices.into_iter().map(|p| (p.asset_id, p.price_date, p.price)),
        ))
    }

    /// Build from raw rows; rows need not be sorted.
    pub fn build(
        assets: Vec<Asset>,
        transactions: impl IntoIterator<Item = (i64, NaiveDate, Decimal, Decimal)>,
        prices: impl IntoIterator<Item = (i64, NaiveDate, Decimal)>,
    ) -> Self {
        let mut tx_rows: BTreeMap<i64, Vec<(NaiveDate, Decimal, Decimal)>> = BTreeMap::new();
        for (asset_id, date, qty, cost) in transactions {
            tx_rows.entry(asset_id).or_default().push((date, qty, cost));
        }
        let mut price_rows: HashMap<i64, Vec<(NaiveDate, Decimal)>> = HashMap::new();
        for (asset_id, date, price) in prices {
            price_rows.entry(asset_id).or_default().push((date, price));
        }

        let mut series = BTreeMap::new();
        for (asset_id, mut rows) in tx_rows {
            // Stable sort keeps insertion order within a date
            rows.sort_by_key(|(date, _, _)| *date);
            let mut s = AssetSeries::default();
            let (mut qty, mut cost) = (Decimal::ZERO, Decimal::ZERO);
            for (date, dq, dc) in rows {
                qty += dq;
                cost += dc;
                s.tx_dates.push(date);
                s.cum_quantity.push(qty);
                s.cum_cost.push(cost);
            }
            if let Some(mut observed) = price_rows.remove(&asset_id) {
                observed.sort_by_key(|(date, _)| *date);
                let (dates, values): (Vec<_>, Vec<_>) = observed.into_iter().unzip();
                s.price_dates = dates;
                s.prices = values;
            }
            series.insert(asset_id, s);
        }

        Self {
            assets: assets.into_iter().map(|a| (a.id, a)).collect(),
            series,
        }
    }

    /// Asset record, or the "Unknown" placeholder for orphaned ledger rows
    pub fn asset(&self, asset_id: i64) -> Asset {
        self.assets
            .get(&asset_id)
            .cloned()
            .unwrap_or_else(|| Asset::placeholder(asset_id))
    }

    pub fn holding_at(&self, asset_id: i64, date: NaiveDate) -> Holding {
        self.series
            .get(&asset_id)
            .map(|s| s.holding_at(date))
            .unwrap_or_default()
    }

    pub fn price_at(&self, asset_id: i64, date: NaiveDate) -> Decimal {
        let category = self.asset(asset_id).category;
        self.series
            .get(&asset_id)
            .and_then(|s| s.price_at(date))
            .unwrap_or_else(|| default_price(category))
    }

    /// Reconstruct every asset that has ledger rows, skipping ~0 positions.
    /// Results are ordered by asset id.
    pub fn portfolio_at(&self, date: NaiveDate) -> Vec<Valuation> {
        let mut result = Vec::new();
        for (asset_id, series) in &self.series {
            let holding = series.holding_at(date);
            if is_negligible(holding.quantity) {
                continue;
            }
            let asset = match self.assets.get(asset_id) {
                Some(a) => a.clone(),
                None => {
                    warn!("No asset record for id {}, using placeholder", asset_id);
                    Asset::placeholder(*asset_id)
                }
            };
            let unit_price = series
                .price_at(date)
                .unwrap_or_else(|| default_price(asset.category));
            result.push(Valuation::new(asset, holding, unit_price));
        }
        result
    }
}

/// Sum of market values and of cost over a reconstructed portfolio
pub fn totals(valuations: &[Valuation]) -> (Decimal, Decimal) {
    valuations.iter().fold((Decimal::ZERO, Decimal::ZERO), |(v, c), p| {
        (v + p.market_value, c + p.total_cost)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn asset(id: i64, category: AssetCategory) -> Asset {
        Asset {
            id,
            category,
            name: format!("asset-{}", id),
        }
    }

    #[test]
    fn test_holdings_are_additive_across_dates() {
        let rows = vec![
            (1, d("2024-03-01"), dec!(5), dec!(50)),
            (1, d("2024-01-01"), dec!(10), dec!(100)),
            (1, d("2024-02-01"), dec!(-3), dec!(-30)),
        ];
        let index = LedgerIndex::build(vec![asset(1, AssetCategory::Security)], rows.clone(), vec![]);

        let (d1, d2) = (d("2024-01-15"), d("2024-03-31"));
        let between: Decimal = rows
            .iter()
            .filter(|(_, date, _, _)| *date > d1 && *date <= d2)
            .map(|(_, _, q, _)| *q)
            .sum();
        assert_eq!(
            index.holding_at(1, d2).quantity - index.holding_at(1, d1).quantity,
            between
        );
        assert_eq!(index.holding_at(1, d("2023-12-31")), Holding::default());
        assert_eq!(index.holding_at(1, d2).total_cost, dec!(120));
    }

    #[test]
    fn test_price_is_last_value_carried_forward() {
        let index = LedgerIndex::build(
            vec![asset(1, AssetCategory::Security)],
            vec![(1, d("2024-01-01"), dec!(1), dec!(10))],
            vec![(1, d("2024-03-01"), dec!(12)), (1, d("2024-01-01"), dec!(10))],
        );
        assert_eq!(index.price_at(1, d("2024-02-15")), dec!(10));
        assert_eq!(index.price_at(1, d("2024-03-01")), dec!(12));
        assert_eq!(index.price_at(1, d("2023-12-31")), Decimal::ZERO);
    }

    #[test]
    fn test_cash_like_assets_default_to_unit_price() {
        let index = LedgerIndex::build(
            vec![asset(1, AssetCategory::Wealth), asset(2, AssetCategory::Crypto)],
            vec![
                (1, d("2024-01-01"), dec!(100), dec!(100)),
                (2, d("2024-01-01"), dec!(1), dec!(300)),
            ],
            vec![],
        );
        let portfolio = index.portfolio_at(d("2024-01-31"));
        assert_eq!(portfolio[0].unit_price, Decimal::ONE);
        assert_eq!(portfolio[0].market_value, dec!(100));
        assert_eq!(portfolio[1].unit_price, Decimal::ZERO);
        assert_eq!(portfolio[1].market_value, Decimal::ZERO);
    }

    #[test]
    fn test_portfolio_skips_closed_positions_and_unknown_assets_get_placeholder() {
        let index = LedgerIndex::build(
            vec![asset(1, AssetCategory::Fund)],
            vec![
                (1, d("2024-01-01"), dec!(0.3), dec!(3)),
                (1, d("2024-02-01"), dec!(-0.2999999), dec!(-3)),
                (9, d("2024-01-01"), dec!(2), dec!(20)),
            ],
            vec![],
        );
        let portfolio = index.portfolio_at(d("2024-02-28"));
        assert_eq!(portfolio.len(), 1);
        assert_eq!(portfolio[0].asset.id, 9);
        assert_eq!(portfolio[0].asset.name, "Unknown");
        assert_eq!(portfolio[0].asset.category, AssetCategory::Other);
    }
}
