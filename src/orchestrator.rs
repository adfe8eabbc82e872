//! Fetch orchestrator (component E): mixes cached reads with bounded,
//! batched calls to a caller-supplied fetch callback, handling partial
//! fills, boundary echoes, and upstream exhaustion. This is a
//! deliberately simplified algorithm: once the network loop starts,
//! only the end of the freshly-fetched result is tracked, not the
//! cache.

use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::error::Result;
use crate::lock::LockGuard;
use crate::log;
use crate::model::{CandleRow, DataLocation};
use crate::storage;
use crate::time::data_dir;

/// Upper bound on any single `fetch_callback` batch. Never exceeded.
pub const MAX_PER_REQUEST: usize = 1500;

/// Signature of the caller-supplied upstream fetch. Total but may
/// return fewer rows than `count`, or none, and may echo a row at
/// exactly `start_time` (the "boundary echo" case); the orchestrator
/// tolerates all three.
pub trait FetchCallback {
    fn fetch(
        &mut self,
        symbol: &str,
        period: crate::model::Period,
        start_time: Option<i64>,
        count: usize,
        params: Option<&Value>,
    ) -> Result<Vec<CandleRow>>;
}

impl<F> FetchCallback for F
where
    F: FnMut(&str, crate::model::Period, Option<i64>, usize, Option<&Value>) -> Result<Vec<CandleRow>>,
{
    fn fetch(
        &mut self,
        symbol: &str,
        period: crate::model::Period,
        start_time: Option<i64>,
        count: usize,
        params: Option<&Value>,
    ) -> Result<Vec<CandleRow>> {
        (self)(symbol, period, start_time, count, params)
    }
}

/// Merge `new` into `result`, deduplicating on `time` with `new`
/// winning ties, sorted ascending by `time`.
fn merge_unique_latest(result: Vec<CandleRow>, new: &[CandleRow]) -> Vec<CandleRow> {
    use std::collections::BTreeMap;
    let mut by_time: BTreeMap<i64, CandleRow> = result.into_iter().map(|r| (r.time, r)).collect();
    for r in new {
        by_time.insert(r.time, *r);
    }
    by_time.into_values().collect()
}

/// Up to `count` contiguous candles starting at or after `start_time`
/// (or "latest" when `start_time` is `None`), reading from the local
/// cache where possible and filling the rest with bounded, batched
/// calls to `fetch_callback`. Persists new data when `enable_cache` is
/// set. Holds the location's advisory lock for the whole call.
pub fn get_ohlcv_with_cache(
    base: &Path,
    loc: &DataLocation,
    start_time: Option<i64>,
    count: usize,
    fetch_callback: &mut dyn FetchCallback,
    params: Option<Value>,
    enable_cache: bool,
) -> Result<Vec<CandleRow>> {
    if count == 0 {
        return Ok(vec![]);
    }

    let dir = data_dir(base, loc);
    let _guard = LockGuard::acquire(&dir)?;
    info!(symbol = %loc.symbol, period = %loc.period, count, "get_ohlcv_with_cache start");

    // 1. No start_time: always hit the network, never the cache for reads.
    if start_time.is_none() {
        let new = fetch_callback.fetch(&loc.symbol, loc.period, None, count, params.as_ref())?;
        if enable_cache && !new.is_empty() {
            storage::save(base, loc, &new)?;
        }
        info!(rows = new.len(), "get_ohlcv_with_cache done (latest)");
        return Ok(new);
    }
    let start_time = start_time.unwrap();

    log::compact(&dir)?;
    let log_entries = log::read(&dir)?;

    // 2. Seed from cache: the unique entry whose span contains start_time.
    let cache_entry = log_entries
        .iter()
        .find(|e| e.data_start <= start_time && start_time <= e.data_end);

    let mut result: Vec<CandleRow> = Vec::new();
    let mut current = start_time;
    if let Some(entry) = cache_entry {
        if enable_cache {
            result = storage::read(base, loc, Some(start_time), Some(entry.data_end))?;
            current = entry.data_end;
        }
    }
    let mut remaining = count.saturating_sub(result.len());

    // 3. Network loop.
    let mut first_round = true;
    while remaining > 0 {
        let batch_size = if first_round {
            MAX_PER_REQUEST.min(remaining)
        } else {
            MAX_PER_REQUEST.min(remaining + 1)
        };

        let new = fetch_callback.fetch(&loc.symbol, loc.period, Some(current), batch_size, params.as_ref())?;

        // Termination A: upstream returned nothing.
        if new.is_empty() {
            break;
        }

        let prev_len = result.len();
        result = merge_unique_latest(result, &new);

        // Termination B: no progress (upstream only echoed the boundary).
        if result.len() == prev_len {
            break;
        }

        current = result.iter().map(|r| r.time).max().unwrap();
        remaining = count.saturating_sub(result.len());
        first_round = false;

        // Termination C: upstream signalled exhaustion.
        if new.len() < batch_size {
            break;
        }
    }

    // 4. Finalize.
    if result.len() > count {
        result.truncate(count);
    }
    if enable_cache && !result.is_empty() {
        storage::save(base, loc, &result)?;
    }
    info!(rows = result.len(), "get_ohlcv_with_cache done");
    Ok(result)
}
