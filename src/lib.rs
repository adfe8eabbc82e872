//! Partitioned columnar OHLCV candle cache.
//!
//! Sits between a trading application and an upstream exchange API.
//! Given `(exchange, mode, market, symbol, period, start_time, count)`
//! it returns `count` contiguous candles starting at `start_time`,
//! reading locally-cached data where possible and falling back to a
//! caller-supplied fetch callback otherwise. New data is persisted,
//! deduplicated, and indexed for later queries.
//!
//! Four subsystems, built bottom-up:
//! - [`time`]: period/partition-key/path arithmetic.
//! - [`storage`]: partitioned columnar files on disk.
//! - [`log`]: the append-only range-log journal, with compaction and
//!   self-healing rebuild.
//! - [`continuity`]: gaps and missing-range reports derived from the log.
//! - [`lock`]: the per-location advisory file lock.
//! - [`orchestrator`]: [`orchestrator::get_ohlcv_with_cache`], which ties
//!   the rest together.
//!
//! The crate is synchronous and holds no ambient mutable state: every
//! operation takes the base directory and `DataLocation` it needs
//! explicitly, and callers provide their own fetch callback and logger.

pub mod continuity;
pub mod error;
pub mod lock;
pub mod log;
pub mod model;
pub mod orchestrator;
pub mod storage;
pub mod time;

pub use error::{Error, Result};
pub use model::{CandleRow, DataLocation, DataRange, Gap, LogEntry, Market, Mode, Period, Source};
pub use orchestrator::{get_ohlcv_with_cache, FetchCallback, MAX_PER_REQUEST};
