//! Quality screening and ranking of the scraped table.
//!
//! Predicates follow the classic liquidity + profitability screen: minimum
//! two-month liquidity, positive EBIT margin, positive EV/EBIT and positive
//! P/L. Survivors are ordered by ascending EV/EBIT (cheapest operating
//! earnings first), ties broken by descending EBIT margin, and truncated to
//! a fixed portfolio size.

use std::collections::HashSet;

use tracing::debug;

use crate::clean::clean_numeric;
use crate::domain::{
    FilteredRecord, RawTable, COL_EBIT_MARGIN, COL_EV_TO_EBIT, COL_LIQUIDITY,
    COL_PRICE_TO_EARNINGS, COL_TICKER, RESULT_COLUMNS,
};

/// Fixed size of the ranked result.
pub const MAX_RESULTS: usize = 22;

/// Screening thresholds. The strict variant additionally bounds the ratios
/// from above to shed outliers (distressed EV/EBIT, triple-digit margins).
#[derive(Debug, Clone)]
pub struct FilterCriteria {
    pub min_liquidity: f64,
    pub max_ebit_margin: Option<f64>,
    pub max_ev_to_ebit: Option<f64>,
    pub max_price_to_earnings: Option<f64>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_liquidity: 1_000_000.0,
            max_ebit_margin: None,
            max_ev_to_ebit: None,
            max_price_to_earnings: None,
        }
    }
}

impl FilterCriteria {
    pub fn strict() -> Self {
        Self {
            min_liquidity: 1_000_000.0,
            max_ebit_margin: Some(100.0),
            max_ev_to_ebit: Some(50.0),
            max_price_to_earnings: Some(50.0),
        }
    }

    fn accepts(&self, rec: &FilteredRecord) -> bool {
        if rec.liquidity < self.min_liquidity {
            return false;
        }
        if rec.ebit_margin <= 0.0 || rec.ev_to_ebit <= 0.0 || rec.price_to_earnings <= 0.0 {
            return false;
        }
        if self.max_ebit_margin.is_some_and(|cap| rec.ebit_margin > cap) {
            return false;
        }
        if self.max_ev_to_ebit.is_some_and(|cap| rec.ev_to_ebit > cap) {
            return false;
        }
        if self
            .max_price_to_earnings
            .is_some_and(|cap| rec.price_to_earnings > cap)
        {
            return false;
        }
        true
    }
}

/// Screens, de-duplicates (first occurrence of a ticker wins), ranks and
/// truncates the raw table. Rows whose screening cells fail to parse fail
/// the predicate.
pub fn rank(table: &RawTable, criteria: &FilterCriteria) -> Vec<FilteredRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut records: Vec<FilteredRecord> = Vec::new();

    for row in 0..table.len() {
        let Some(ticker) = table.cell(row, COL_TICKER) else { continue };
        if ticker.is_empty() || !seen.insert(ticker.to_string()) {
            continue;
        }

        let parsed = parse_row(table, row, ticker);
        match parsed {
            Some(rec) if criteria.accepts(&rec) => records.push(rec),
            _ => {}
        }
    }

    records.sort_by(|a, b| {
        a.ev_to_ebit
            .partial_cmp(&b.ev_to_ebit)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.ebit_margin
                    .partial_cmp(&a.ebit_margin)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    records.truncate(MAX_RESULTS);

    debug!("screened {} rows down to {}", table.len(), records.len());
    records
}

fn parse_row(table: &RawTable, row: usize, ticker: &str) -> Option<FilteredRecord> {
    Some(FilteredRecord {
        ticker: ticker.to_string(),
        liquidity: clean_numeric(table.cell(row, COL_LIQUIDITY)?)?,
        ebit_margin: clean_numeric(table.cell(row, COL_EBIT_MARGIN)?)?,
        ev_to_ebit: clean_numeric(table.cell(row, COL_EV_TO_EBIT)?)?,
        price_to_earnings: clean_numeric(table.cell(row, COL_PRICE_TO_EARNINGS)?)?,
    })
}

/// Rebuilds the persisted five-column table from the ranked records,
/// re-joining against the raw rows by ticker so every output cell keeps its
/// original upstream formatting.
pub fn filtered_table(raw: &RawTable, ranked: &[FilteredRecord]) -> RawTable {
    let headers: Vec<String> = RESULT_COLUMNS.iter().map(|c| c.to_string()).collect();
    let col_indices: Vec<Option<usize>> = RESULT_COLUMNS.iter().map(|c| raw.column(c)).collect();
    let ticker_col = raw.column(COL_TICKER);

    let mut rows = Vec::with_capacity(ranked.len());
    for rec in ranked {
        // First matching raw row wins, mirroring the de-dup rule.
        let source_row = raw.rows.iter().find(|r| {
            ticker_col
                .and_then(|i| r.get(i))
                .is_some_and(|t| t == &rec.ticker)
        });
        let Some(source_row) = source_row else { continue };

        let row: Vec<String> = col_indices
            .iter()
            .map(|idx| {
                idx.and_then(|i| source_row.get(i))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();
        rows.push(row);
    }

    RawTable::new(headers, rows)
}
