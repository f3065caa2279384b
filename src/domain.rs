use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header names of the upstream Fundamentus result table. Unrecognized
/// columns are carried through verbatim; these five are the ones the
/// screener and the persisted filtered table care about.
pub const COL_TICKER: &str = "Papel";
pub const COL_LIQUIDITY: &str = "Liq.2meses";
pub const COL_EBIT_MARGIN: &str = "Mrg Ebit";
pub const COL_EV_TO_EBIT: &str = "EV/EBIT";
pub const COL_PRICE_TO_EARNINGS: &str = "P/L";

/// Column set of the persisted filtered table, in output order.
pub const RESULT_COLUMNS: [&str; 5] = [
    COL_TICKER,
    COL_LIQUIDITY,
    COL_EBIT_MARGIN,
    COL_EV_TO_EBIT,
    COL_PRICE_TO_EARNINGS,
];

/// One scraped HTML table, all cells kept as verbatim strings so no locale
/// formatting is lost between the raw and filtered artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Index of a header by its verbatim upstream name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell lookup by row index and header name.
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column(name)?;
        self.rows.get(row)?.get(col).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A row that passed every screening predicate; numeric fields are the
/// parsed values, the ticker keys back into the raw table for output.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRecord {
    pub ticker: String,
    pub liquidity: f64,
    pub ebit_margin: f64,
    pub ev_to_ebit: f64,
    pub price_to_earnings: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Error,
    Forbidden,
}

impl Default for ScrapeStatus {
    fn default() -> Self {
        ScrapeStatus::Error
    }
}

/// The acquisition run's persisted bookkeeping record. Overwritten after
/// every attempt (success, error or forbidden), never deleted; the block
/// cooldown state lives inside it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scrape: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_allowed_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ScrapeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub forbidden_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_hours: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_raw: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_filtered: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one acquisition run, surfaced to the caller (scheduler or CLI).
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    Success { rows_raw: usize, rows_filtered: usize },
    SkippedFresh,
    SkippedCooling { until: DateTime<Utc> },
    Blocked { http_status: Option<u16>, until: DateTime<Utc> },
    Error { detail: String },
}

impl std::fmt::Display for AcquisitionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionOutcome::Success { rows_raw, rows_filtered } => {
                write!(f, "success: {} raw rows, {} after screening", rows_raw, rows_filtered)
            }
            AcquisitionOutcome::SkippedFresh => write!(f, "skipped: already scraped today"),
            AcquisitionOutcome::SkippedCooling { until } => {
                write!(f, "skipped: source blocked, cooling down until {}", until)
            }
            AcquisitionOutcome::Blocked { http_status, until } => write!(
                f,
                "blocked by source (status {:?}), next attempt allowed at {}",
                http_status, until
            ),
            AcquisitionOutcome::Error { detail } => write!(f, "error: {}", detail),
        }
    }
}

/// Which tier satisfied a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
    Cache,
    Local,
    Remote,
    None,
}

impl std::fmt::Display for ServeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServeSource::Cache => "cache",
            ServeSource::Local => "local",
            ServeSource::Remote => "remote",
            ServeSource::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// What the read path hands to the serving layer: the best available
/// filtered table plus freshness and blocked annotations. Never an error;
/// "no data yet" is an explicit state.
#[derive(Debug, Clone)]
pub struct ServedTable {
    pub table: Option<RawTable>,
    pub metadata: Option<Metadata>,
    pub source: ServeSource,
    /// True when the source is currently in a block cooldown, i.e. the data
    /// is served from a tier and no live fetch will happen until it expires.
    pub blocked: bool,
}

impl ServedTable {
    pub fn empty() -> Self {
        Self { table: None, metadata: None, source: ServeSource::None, blocked: false }
    }

    pub fn last_scrape(&self) -> Option<DateTime<Utc>> {
        self.metadata.as_ref().and_then(|m| m.last_scrape)
    }
}
