//! Position summary for funds with recorded shares
//!
//! Values use the last published NAV. The estimated gain applies today's
//! intraday estimate to that value; the actual gain is only known for funds
//! whose NAV for today is already out.

use crate::watchlist::FundRow;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

/// One fund position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub code: String,
    pub name: String,
    pub shares: f64,
    /// Shares times the last NAV
    pub value: f64,
    pub estimated_gain: f64,
    pub estimated_gain_pct: f64,
    /// Present once today's NAV is published
    pub actual_gain: Option<f64>,
    pub actual_gain_pct: Option<f64>,
}

/// Totals over every position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub total_value: f64,
    pub estimated_gain: f64,
    pub estimated_gain_pct: f64,
    pub actual_gain: f64,
    /// Relative to `settled_value`
    pub actual_gain_pct: f64,
    /// Value of the positions whose NAV for today is published
    pub settled_value: f64,
    pub positions: Vec<Position>,
}

impl PositionSummary {
    /// Summarize the rows with positive shares as of `today`.
    ///
    /// Rows without an estimate or a NAV are skipped. Returns `None` when no
    /// position is left.
    pub fn from_rows(rows: &[FundRow], today: NaiveDate) -> Option<Self> {
        let positions: Vec<Position> = rows
            .iter()
            .filter(|row| row.fund.shares > 0.0)
            .filter_map(|row| position(row, today))
            .collect();

        let total_value: f64 = positions.iter().map(|p| p.value).sum();
        if total_value <= 0.0 {
            return None;
        }

        let estimated_gain: f64 = positions.iter().map(|p| p.estimated_gain).sum();
        let settled: Vec<&Position> = positions.iter().filter(|p| p.actual_gain.is_some()).collect();
        let settled_value: f64 = settled.iter().map(|p| p.value).sum();
        let actual_gain: f64 = settled.iter().filter_map(|p| p.actual_gain).sum();

        Some(Self {
            total_value,
            estimated_gain,
            estimated_gain_pct: estimated_gain / total_value * 100.0,
            actual_gain,
            actual_gain_pct: if settled_value > 0.0 {
                actual_gain / settled_value * 100.0
            } else {
                0.0
            },
            settled_value,
            positions,
        })
    }
}

fn position(row: &FundRow, today: NaiveDate) -> Option<Position> {
    let estimate = row.estimate.as_ref().ok()?;
    let nav = estimate.nav?;
    let shares = row.fund.shares;
    let value = shares * nav;
    let estimated_pct = estimate.estimate_change_pct.unwrap_or(0.0);

    let actual_pct = if parse_nav_date(&estimate.nav_date, today) == Some(today) {
        // The estimate is quoted against the previous NAV, which recovers it.
        let previous = match (estimate.estimate, estimate.estimate_change_pct) {
            (Some(value), Some(pct)) if pct > -100.0 => Some(value / (1.0 + pct / 100.0)),
            _ => None,
        };
        Some(previous.filter(|p| *p > 0.0).map_or(0.0, |p| (nav / p - 1.0) * 100.0))
    } else {
        None
    };

    Some(Position {
        code: row.code.clone(),
        name: row.name().to_string(),
        shares,
        value,
        estimated_gain: value * estimated_pct / 100.0,
        estimated_gain_pct: estimated_pct,
        actual_gain: actual_pct.map(|pct| value * pct / 100.0),
        actual_gain_pct: actual_pct,
    })
}

/// `YYYY-MM-DD`, or `MM-DD` in the year of `today`
fn parse_nav_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().or_else(|| {
        NaiveDate::parse_from_str(&format!("{}-{text}", today.year()), "%Y-%m-%d").ok()
    })
}

impl fmt::Display for PositionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Position value {:.2}, estimated today {:+.2} ({:+.2}%)",
            self.total_value, self.estimated_gain, self.estimated_gain_pct
        )?;
        if self.settled_value > 0.0 {
            write!(
                f,
                ", settled {:+.2} ({:+.2}%) on {:.2}",
                self.actual_gain, self.actual_gain_pct, self.settled_value
            )?;
        }
        for p in &self.positions {
            write!(
                f,
                "\n- {} {}: {:.2} shares, value {:.2}, estimate {:+.2} ({:+.2}%)",
                p.code, p.name, p.shares, p.value, p.estimated_gain, p.estimated_gain_pct
            )?;
            if let (Some(gain), Some(pct)) = (p.actual_gain, p.actual_gain_pct) {
                write!(f, ", actual {gain:+.2} ({pct:+.2}%)")?;
            }
        }
        Ok(())
    }
}
