//! Utility functions for date parsing and number formatting
//!
//! Dates enter the engine through [`parse_flexible_date`] only; everything
//! downstream works on concrete `NaiveDate` values.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::validation;

/// Parse `YYYY-MM-DD`, `YYYY-MM` (last day of the month) or `YYYY` (Dec 31).
///
/// # Examples
/// ```
/// use strata::utils::parse_flexible_date;
/// use chrono::NaiveDate;
///
/// assert_eq!(
///     parse_flexible_date("2024-02").unwrap(),
///     NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
/// );
/// ```
pub fn parse_flexible_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return Err(validation("date is required"));
    }

    // YYYY-MM-DD (exact date)
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    // YYYY-MM (last day of month)
    if s.len() == 7 {
        if let Ok(first) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
            return Ok(last_day_of_month(first));
        }
    }

    // YYYY (December 31)
    if s.len() == 4 {
        if let Ok(year) = s.parse::<i32>() {
            if let Some(date) = NaiveDate::from_ymd_opt(year, 12, 31) {
                return Ok(date);
            }
        }
    }

    Err(validation(format!(
        "Invalid date '{}'. Use YYYY-MM-DD, YYYY-MM, or YYYY",
        s
    )))
}

/// Parse a lower bound: `YYYY-MM-DD`, `YYYY-MM` (first day of the month) or
/// `YYYY` (Jan 1).
///
/// # Examples
/// ```
/// use strata::utils::parse_period_start;
/// use chrono::NaiveDate;
///
/// assert_eq!(
///     parse_period_start("2024-03").unwrap(),
///     NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
/// );
/// ```
pub fn parse_period_start(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    let end = parse_flexible_date(s)?;
    Ok(match s.len() {
        7 => end.with_day(1).unwrap_or(end),
        4 => NaiveDate::from_ymd_opt(end.year(), 1, 1).unwrap_or(end),
        _ => end,
    })
}

/// Last calendar day of the month containing `date`
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let next_month = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    };
    next_month.and_then(|nm| nm.pred_opt()).unwrap_or(date)
}

/// Format an amount with thousands separators and two decimals: "1,234.56"
///
/// # Examples
/// ```
/// use strata::utils::format_amount;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89");
/// assert_eq!(format_amount(dec!(-500)), "-500.00");
/// ```
pub fn format_amount(value: Decimal) -> String {
    let is_negative = value < Decimal::ZERO;
    let formatted = format!("{:.2}", round2(value.abs()));
    let (integer_part, decimal_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    format!("{}{}.{}", sign, with_separators, decimal_part)
}

/// Format a percentage with two decimals: "12.50%"
pub fn format_percent(value: Decimal) -> String {
    format!("{:.2}%", round2(value))
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_flexible_date_forms() {
        assert_eq!(parse_flexible_date("2024-03-15").unwrap(), d(2024, 3, 15));
        assert_eq!(parse_flexible_date("2024-01").unwrap(), d(2024, 1, 31));
        assert_eq!(parse_flexible_date("2023-02").unwrap(), d(2023, 2, 28));
        assert_eq!(parse_flexible_date("2024-12").unwrap(), d(2024, 12, 31));
        assert_eq!(parse_flexible_date("2022").unwrap(), d(2022, 12, 31));
    }

    #[test]
    fn test_parse_period_start_forms() {
        assert_eq!(parse_period_start("2024-03-15").unwrap(), d(2024, 3, 15));
        assert_eq!(parse_period_start("2024-03").unwrap(), d(2024, 3, 1));
        assert_eq!(parse_period_start("2024").unwrap(), d(2024, 1, 1));
        assert!(parse_period_start("2024-13").is_err());
    }

    #[test]
    fn test_parse_flexible_date_rejects_garbage() {
        assert!(parse_flexible_date("").is_err());
        assert!(parse_flexible_date("2024-13").is_err());
        assert!(parse_flexible_date("yesterday").is_err());
    }

    #[test]
    fn test_format_amount_small_values() {
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(999.999)), "1,000.00");
        assert_eq!(format_percent(dec!(12.345)), "12.35%");
    }
}
