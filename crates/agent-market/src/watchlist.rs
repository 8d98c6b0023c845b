//! User fund watchlist
//!
//! A JSON map of fund code to holding details. It is loaded once at startup
//! and shared read-only between tools and runs; the `watchlist` commands edit
//! a copy and save it back.

use crate::api::MarketDataSource;
use crate::error::{MarketError, Result};
use crate::models::FundEstimate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// One watched fund
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchedFund {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fund_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fund_key: Option<String>,
    #[serde(default)]
    pub is_hold: bool,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub sectors: Vec<String>,
}

/// Watched funds keyed by code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundWatchlist {
    funds: BTreeMap<String, WatchedFund>,
}

/// A watched fund with its estimate, or the reason it is missing
#[derive(Debug, Clone)]
pub struct FundRow {
    pub code: String,
    pub fund: WatchedFund,
    pub estimate: std::result::Result<FundEstimate, String>,
}

impl FundRow {
    /// Display name: estimate name, then watchlist name, then the code
    pub fn name(&self) -> &str {
        match &self.estimate {
            Ok(estimate) if !estimate.name.is_empty() => &estimate.name,
            _ => self.fund.fund_name.as_deref().unwrap_or(&self.code),
        }
    }
}

impl FundWatchlist {
    /// Empty watchlist
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON map
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from `path`; a missing file is an empty watchlist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Watchlist file not found, starting empty");
            return Ok(Self::new());
        }

        let watchlist = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), funds = watchlist.len(), "Loaded watchlist");
        Ok(watchlist)
    }

    /// Write the JSON map to `path`, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), funds = self.len(), "Saved watchlist");
        Ok(())
    }

    /// Add or replace a fund
    pub fn insert(&mut self, code: impl Into<String>, fund: WatchedFund) {
        self.funds.insert(code.into(), fund);
    }

    /// Start watching `code`. An already watched fund is left untouched and
    /// `false` is returned.
    pub fn add(&mut self, code: &str, fund: WatchedFund) -> Result<bool> {
        let code = validate_fund_code(code)?;
        if self.funds.contains_key(code) {
            return Ok(false);
        }
        self.funds.insert(code.to_string(), fund);
        Ok(true)
    }

    /// Stop watching `code`
    pub fn remove(&mut self, code: &str) -> Result<WatchedFund> {
        self.funds.remove(code).ok_or_else(|| not_watched(code))
    }

    /// Mark or unmark `code` as held
    pub fn set_hold(&mut self, code: &str, is_hold: bool) -> Result<()> {
        self.entry_mut(code)?.is_hold = is_hold;
        Ok(())
    }

    /// Replace the sector tags of `code`; an empty list clears them
    pub fn set_sectors(&mut self, code: &str, sectors: Vec<String>) -> Result<()> {
        self.entry_mut(code)?.sectors = sectors
            .into_iter()
            .map(|sector| sector.trim().to_string())
            .filter(|sector| !sector.is_empty())
            .collect();
        Ok(())
    }

    /// Record the shares held in `code`
    pub fn set_shares(&mut self, code: &str, shares: f64) -> Result<()> {
        if !shares.is_finite() || shares < 0.0 {
            return Err(MarketError::InvalidInput(format!(
                "shares must be a non-negative number, got {shares}"
            )));
        }
        self.entry_mut(code)?.shares = shares;
        Ok(())
    }

    fn entry_mut(&mut self, code: &str) -> Result<&mut WatchedFund> {
        self.funds.get_mut(code).ok_or_else(|| not_watched(code))
    }

    /// Look up a fund
    pub fn get(&self, code: &str) -> Option<&WatchedFund> {
        self.funds.get(code)
    }

    /// Fund codes in ascending order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.funds.keys().map(String::as_str)
    }

    /// Iterate over all funds
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WatchedFund)> {
        self.funds.iter().map(|(code, fund)| (code.as_str(), fund))
    }

    /// Funds currently held
    pub fn holdings(&self) -> impl Iterator<Item = (&str, &WatchedFund)> {
        self.iter().filter(|(_, fund)| fund.is_hold)
    }

    /// Funds tagged with `sector`
    pub fn in_sector<'a>(&'a self, sector: &'a str) -> impl Iterator<Item = (&'a str, &'a WatchedFund)> {
        let sector = sector.trim();
        self.iter()
            .filter(move |(_, fund)| fund.sectors.iter().any(|tag| tag == sector))
    }

    pub fn len(&self) -> usize {
        self.funds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funds.is_empty()
    }

    /// Fetch estimates for every watched fund, at most `concurrency` at a
    /// time. Rows keep watchlist order; a failed fetch is kept as its error.
    pub async fn fetch_estimates(
        &self,
        source: &dyn MarketDataSource,
        concurrency: usize,
    ) -> Vec<FundRow> {
        // Owned pairs keep the stream free of borrows from `self`, so the
        // future stays `Send` inside async-trait tool calls.
        let funds: Vec<(String, WatchedFund)> = self
            .funds
            .iter()
            .map(|(code, fund)| (code.clone(), fund.clone()))
            .collect();

        let rows: Vec<FundRow> = stream::iter(funds)
            .map(|(code, fund)| async move {
                let estimate = source
                    .fund_estimate(&code)
                    .await
                    .map_err(|err| err.to_string());
                FundRow {
                    code,
                    fund,
                    estimate,
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        debug!(
            funds = rows.len(),
            failed = rows.iter().filter(|row| row.estimate.is_err()).count(),
            "Fetched fund estimates"
        );
        rows
    }
}

/// Accept only six-digit fund codes
pub fn validate_fund_code(code: &str) -> Result<&str> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(code)
    } else {
        Err(MarketError::InvalidInput(format!(
            "fund code must be 6 digits, got '{code}'"
        )))
    }
}

fn not_watched(code: &str) -> MarketError {
    MarketError::InvalidInput(format!("fund {code} is not on the watchlist"))
}
