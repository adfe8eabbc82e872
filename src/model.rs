//! Data model & invariants (component G): candle rows, the location
//! key, log entries, gaps and ranges. Validation lives at construction
//! time, not in hot paths. Once a value exists, callers can trust it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Trading/paper mode. A closed sum type instead of a free-form string
/// so an invalid mode is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Demo,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Live => write!(f, "live"),
            Mode::Demo => write!(f, "demo"),
        }
    }
}

/// Futures vs. spot market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Future,
    Spot,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Future => write!(f, "future"),
            Market::Spot => write!(f, "spot"),
        }
    }
}

/// Candle period / timeframe token. A closed, fixed set of tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "3d")]
    D3,
    #[serde(rename = "1w")]
    W1,
    #[serde(rename = "1M")]
    Month1,
}

impl Period {
    pub const ALL: [Period; 15] = [
        Period::M1,
        Period::M3,
        Period::M5,
        Period::M15,
        Period::M30,
        Period::H1,
        Period::H2,
        Period::H4,
        Period::H6,
        Period::H8,
        Period::H12,
        Period::D1,
        Period::D3,
        Period::W1,
        Period::Month1,
    ];

    /// The exchange-facing token, e.g. `"15m"`.
    pub fn as_token(&self) -> &'static str {
        match self {
            Period::M1 => "1m",
            Period::M3 => "3m",
            Period::M5 => "5m",
            Period::M15 => "15m",
            Period::M30 => "30m",
            Period::H1 => "1h",
            Period::H2 => "2h",
            Period::H4 => "4h",
            Period::H6 => "6h",
            Period::H8 => "8h",
            Period::H12 => "12h",
            Period::D1 => "1d",
            Period::D3 => "3d",
            Period::W1 => "1w",
            Period::Month1 => "1M",
        }
    }

    pub fn from_token(token: &str) -> Result<Period> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_token() == token)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown period token: {token}")))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// Source a log entry was produced by. Closed set: the core only ever
/// writes these three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Api,
    Compacted,
    Rebuilt,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Api => write!(f, "api"),
            Source::Compacted => write!(f, "compacted"),
            Source::Rebuilt => write!(f, "rebuilt"),
        }
    }
}

/// `(exchange, mode, market, symbol, period)`: the primary key of a
/// cached time series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataLocation {
    pub exchange: String,
    pub mode: Mode,
    pub market: Market,
    pub symbol: String,
    pub period: Period,
}

impl DataLocation {
    pub fn new(
        exchange: impl Into<String>,
        mode: Mode,
        market: Market,
        symbol: impl Into<String>,
        period: Period,
    ) -> Result<Self> {
        let exchange = exchange.into();
        let symbol = symbol.into();
        if exchange.is_empty() {
            return Err(Error::InvalidArgument("exchange must not be empty".into()));
        }
        if symbol.is_empty() {
            return Err(Error::InvalidArgument("symbol must not be empty".into()));
        }
        Ok(DataLocation {
            exchange,
            mode,
            market,
            symbol,
            period,
        })
    }
}

/// One OHLCV candle. Invariants enforced at construction: `low <=
/// min(open, close) <= max(open, close) <= high`, all fields `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleRow {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl CandleRow {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Result<Self> {
        let row = CandleRow {
            time,
            open,
            high,
            low,
            close,
            volume,
        };
        row.validate()?;
        Ok(row)
    }

    pub fn validate(&self) -> Result<()> {
        if self.time < 0 {
            return Err(Error::InvalidArgument(format!(
                "candle time must be >= 0, got {}",
                self.time
            )));
        }
        for (name, v) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ] {
            if v < 0.0 {
                return Err(Error::InvalidArgument(format!("{name} must be >= 0, got {v}")));
            }
        }
        let body_lo = self.open.min(self.close);
        let body_hi = self.open.max(self.close);
        if self.low > body_lo {
            return Err(Error::InvalidArgument(format!(
                "low ({}) must be <= min(open, close) ({})",
                self.low, body_lo
            )));
        }
        if self.high < body_hi {
            return Err(Error::InvalidArgument(format!(
                "high ({}) must be >= max(open, close) ({})",
                self.high, body_hi
            )));
        }
        if self.low > self.high {
            return Err(Error::InvalidArgument(format!(
                "low ({}) must be <= high ({})",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// One line of the append-only range log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub fetch_time: DateTime<Utc>,
    pub data_start: i64,
    pub data_end: i64,
    pub count: Option<u64>,
    pub source: Source,
}

impl LogEntry {
    pub fn new(
        fetch_time: DateTime<Utc>,
        data_start: i64,
        data_end: i64,
        count: Option<u64>,
        source: Source,
    ) -> Result<Self> {
        if data_start > data_end {
            return Err(Error::InvalidArgument(format!(
                "data_start ({data_start}) must be <= data_end ({data_end})"
            )));
        }
        Ok(LogEntry {
            fetch_time,
            data_start,
            data_end,
            count,
            source,
        })
    }
}

/// A known-absent interval `(gap_after, gap_before)` between two
/// non-mergeable log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub gap_after: i64,
    pub gap_before: i64,
}

impl Gap {
    pub fn new(gap_after: i64, gap_before: i64) -> Result<Self> {
        if gap_after >= gap_before {
            return Err(Error::InvalidArgument(format!(
                "gap_after ({gap_after}) must be < gap_before ({gap_before})"
            )));
        }
        Ok(Gap { gap_after, gap_before })
    }
}

/// A contiguous, inclusive time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRange {
    pub start: i64,
    pub end: i64,
}

impl DataRange {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidArgument(format!(
                "range start ({start}) must be <= end ({end})"
            )));
        }
        Ok(DataRange { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_token_round_trip() {
        for p in Period::ALL {
            assert_eq!(Period::from_token(p.as_token()).unwrap(), p);
        }
    }

    #[test]
    fn unknown_period_token_errors() {
        assert!(Period::from_token("7m").is_err());
    }

    #[test]
    fn candle_row_rejects_bad_high() {
        // high below the body
        assert!(CandleRow::new(0, 10.0, 9.0, 8.0, 9.5, 1.0).is_err());
    }

    #[test]
    fn candle_row_rejects_negative_volume() {
        assert!(CandleRow::new(0, 10.0, 11.0, 9.0, 10.5, -1.0).is_err());
    }

    #[test]
    fn candle_row_accepts_flat_candle() {
        assert!(CandleRow::new(0, 10.0, 10.0, 10.0, 10.0, 0.0).is_ok());
    }

    #[test]
    fn log_entry_rejects_inverted_range() {
        assert!(LogEntry::new(Utc::now(), 100, 50, None, Source::Api).is_err());
    }

    #[test]
    fn gap_rejects_non_increasing_bounds() {
        assert!(Gap::new(100, 100).is_err());
        assert!(Gap::new(200, 100).is_err());
    }

    #[test]
    fn data_location_rejects_empty_symbol() {
        assert!(DataLocation::new("binance", Mode::Live, Market::Spot, "", Period::M15).is_err());
    }
}
