//! Time & partition utilities (component A): period -> ms, timestamp
//! -> partition key, symbol sanitization, and data-directory path
//! composition. Pure, deterministic, no I/O.

use std::path::{Path, PathBuf};

use chrono::{Datelike, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::model::{DataLocation, Period};

/// Fixed period length in milliseconds. `1M` (calendar month) has no
/// fixed length and deliberately returns an error. The core never
/// uses `1M`'s step size for arithmetic, only for directory naming
/// and log-range bookkeeping.
pub fn period_to_ms(period: Period) -> Result<i64> {
    const SECOND: i64 = 1000;
    const MINUTE: i64 = 60 * SECOND;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    Ok(match period {
        Period::M1 => MINUTE,
        Period::M3 => 3 * MINUTE,
        Period::M5 => 5 * MINUTE,
        Period::M15 => 15 * MINUTE,
        Period::M30 => 30 * MINUTE,
        Period::H1 => HOUR,
        Period::H2 => 2 * HOUR,
        Period::H4 => 4 * HOUR,
        Period::H6 => 6 * HOUR,
        Period::H8 => 8 * HOUR,
        Period::H12 => 12 * HOUR,
        Period::D1 => DAY,
        Period::D3 => 3 * DAY,
        Period::W1 => 7 * DAY,
        Period::Month1 => {
            return Err(Error::InvalidArgument(
                "1M has no fixed millisecond length (calendar-dependent)".into(),
            ));
        }
    })
}

/// The partition family a period belongs to, used only to pick the
/// calendar-bucket rule in `partition_key`.
enum PartitionFamily {
    Month,
    Year,
    Decade,
}

fn partition_family(period: Period) -> PartitionFamily {
    match period {
        Period::M1 | Period::M3 | Period::M5 | Period::M15 | Period::M30 => PartitionFamily::Month,
        Period::H1 | Period::H2 | Period::H4 | Period::H6 | Period::H8 | Period::H12 => {
            PartitionFamily::Year
        }
        Period::D1 | Period::D3 | Period::W1 | Period::Month1 => PartitionFamily::Decade,
    }
}

/// Partition-key string for a timestamp under a given period's family:
/// minute-level -> `YYYY-MM`, hour-level -> `YYYY`, day-level and
/// above -> `YYYY0s` decade bucket.
pub fn partition_key(ts_ms: i64, period: Period) -> Result<String> {
    if ts_ms < 0 {
        return Err(Error::InvalidArgument(format!(
            "timestamp must be >= 0, got {ts_ms}"
        )));
    }
    let secs = ts_ms.div_euclid(1000);
    let nanos = (ts_ms.rem_euclid(1000) * 1_000_000) as u32;
    let dt = Utc
        .timestamp_opt(secs, nanos)
        .single()
        .ok_or_else(|| Error::InvalidArgument(format!("timestamp out of range: {ts_ms}")))?;

    Ok(match partition_family(period) {
        PartitionFamily::Month => format!("{:04}-{:02}", dt.year(), dt.month()),
        PartitionFamily::Year => format!("{:04}", dt.year()),
        PartitionFamily::Decade => format!("{}0s", (dt.year() / 10) * 10),
    })
}

/// Replace `/` and `:` with `_`; otherwise pass through unchanged.
pub fn sanitize(symbol: &str) -> String {
    symbol.replace(['/', ':'], "_")
}

/// `base/exchange/mode/market/sanitize(symbol)/period/`
pub fn data_dir(base: &Path, loc: &DataLocation) -> PathBuf {
    base.join(&loc.exchange)
        .join(loc.mode.to_string())
        .join(loc.market.to_string())
        .join(sanitize(&loc.symbol))
        .join(loc.period.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mode, Market};

    #[test]
    fn period_to_ms_fixed_periods() {
        assert_eq!(period_to_ms(Period::M1).unwrap(), 60_000);
        assert_eq!(period_to_ms(Period::H1).unwrap(), 3_600_000);
        assert_eq!(period_to_ms(Period::D1).unwrap(), 86_400_000);
        assert_eq!(period_to_ms(Period::W1).unwrap(), 604_800_000);
    }

    #[test]
    fn period_to_ms_month_is_undefined() {
        assert!(period_to_ms(Period::Month1).is_err());
    }

    #[test]
    fn partition_key_minute_family_is_month() {
        // 2023-01-15T00:00:00Z
        let ts = 1673740800000;
        assert_eq!(partition_key(ts, Period::M15).unwrap(), "2023-01");
        // next month
        let ts2 = 1675209600000; // 2023-02-01T00:00:00Z -> actually Feb 1
        assert_eq!(partition_key(ts2, Period::M15).unwrap(), "2023-02");
    }

    #[test]
    fn partition_key_hour_family_is_year() {
        let ts = 1673740800000; // 2023-01-15
        assert_eq!(partition_key(ts, Period::H4).unwrap(), "2023");
    }

    #[test]
    fn partition_key_day_family_is_decade() {
        // 2023 -> 2020s
        let ts_2023 = 1673740800000;
        assert_eq!(partition_key(ts_2023, Period::D1).unwrap(), "2020s");
        // 2030 -> 2030s
        let ts_2030 = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap().timestamp_millis();
        assert_eq!(partition_key(ts_2030, Period::D1).unwrap(), "2030s");
    }

    #[test]
    fn sanitize_replaces_slash_and_colon() {
        assert_eq!(sanitize("BTC/USDT"), "BTC_USDT");
        assert_eq!(sanitize("BTC:USDT"), "BTC_USDT");
        assert_eq!(sanitize("BTCUSDT"), "BTCUSDT");
    }

    #[test]
    fn data_dir_composes_expected_path() {
        let loc = DataLocation::new("binance", Mode::Live, Market::Future, "BTC/USDT", Period::M15).unwrap();
        let dir = data_dir(Path::new("/base"), &loc);
        assert_eq!(dir, Path::new("/base/binance/live/future/BTC_USDT/15m"));
    }
}
