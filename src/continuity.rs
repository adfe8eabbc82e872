//! Continuity analyzer (component D): turns the range log into gaps
//! and missing-range reports for a target window. Read-only, never
//! mutates the log, so it is safe to call without holding the
//! location lock; it is diagnostic-only.

use std::path::Path;

use crate::error::Result;
use crate::log::{self, fold_compact};
use crate::model::{DataRange, Gap};

/// Gaps between non-mergeable adjacent entries of the (in-memory)
/// compacted log.
pub fn check_continuity(dir: &Path) -> Result<Vec<Gap>> {
    let entries = log::read(dir)?;
    let compacted = fold_compact(&entries);
    let mut gaps = Vec::new();
    for pair in compacted.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        gaps.push(Gap::new(prev.data_end, curr.data_start)?);
    }
    Ok(gaps)
}

/// The overall known-data span, or `None` if the log is empty.
pub fn get_data_range(dir: &Path) -> Result<Option<DataRange>> {
    let entries = log::read(dir)?;
    if entries.is_empty() {
        return Ok(None);
    }
    let start = entries.iter().map(|e| e.data_start).min().unwrap();
    let end = entries.iter().map(|e| e.data_end).max().unwrap();
    Ok(Some(DataRange::new(start, end)?))
}

/// Ordered sub-ranges of `[target_start, target_end]` not covered by
/// the log: a pre-range prefix, each gap clipped to the target window,
/// and a post-range suffix. The whole target range if the log is
/// empty.
pub fn find_missing_ranges(dir: &Path, target_start: i64, target_end: i64) -> Result<Vec<DataRange>> {
    let data_range = get_data_range(dir)?;
    let Some(data_range) = data_range else {
        return Ok(vec![DataRange::new(target_start, target_end)?]);
    };

    let mut missing = Vec::new();

    if target_start < data_range.start {
        missing.push(DataRange::new(target_start, data_range.start)?);
    }

    for gap in check_continuity(dir)? {
        // Report the gap if it intersects the target window at all,
        // clipped to stay inside [target_start, target_end].
        if gap.gap_before > target_start && gap.gap_after < target_end {
            let start = gap.gap_after.max(target_start);
            let end = gap.gap_before.min(target_end);
            if start < end {
                missing.push(DataRange::new(start, end)?);
            }
        }
    }

    if target_end > data_range.end {
        missing.push(DataRange::new(data_range.end, target_end)?);
    }

    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::append;
    use crate::model::Source;

    #[test]
    fn no_gaps_when_entries_abut() {
        let tmp = tempfile::tempdir().unwrap();
        append(tmp.path(), 1000, 2000, Some(10), Source::Api).unwrap();
        append(tmp.path(), 2000, 3000, Some(10), Source::Api).unwrap();
        assert_eq!(check_continuity(tmp.path()).unwrap(), vec![]);
    }

    #[test]
    fn gap_detected_between_disjoint_entries() {
        let tmp = tempfile::tempdir().unwrap();
        append(tmp.path(), 1000, 2000, Some(10), Source::Api).unwrap();
        append(tmp.path(), 3000, 4000, Some(10), Source::Api).unwrap();
        let gaps = check_continuity(tmp.path()).unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].gap_after, 2000);
        assert_eq!(gaps[0].gap_before, 3000);
    }

    #[test]
    fn missing_ranges_complete_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = find_missing_ranges(tmp.path(), 1000, 5000).unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].start, 1000);
        assert_eq!(missing[0].end, 5000);
    }

    #[test]
    fn missing_ranges_prefix_gap_and_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        append(tmp.path(), 2000, 3000, Some(10), Source::Api).unwrap();
        append(tmp.path(), 4000, 5000, Some(10), Source::Api).unwrap();

        let missing = find_missing_ranges(tmp.path(), 1000, 6000).unwrap();
        assert_eq!(missing.len(), 3);
        assert_eq!((missing[0].start, missing[0].end), (1000, 2000));
        assert_eq!((missing[1].start, missing[1].end), (3000, 4000));
        assert_eq!((missing[2].start, missing[2].end), (5000, 6000));
    }

    #[test]
    fn missing_ranges_target_fully_inside_known_span() {
        let tmp = tempfile::tempdir().unwrap();
        append(tmp.path(), 0, 10_000, Some(10), Source::Api).unwrap();
        let missing = find_missing_ranges(tmp.path(), 1000, 2000).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn missing_ranges_does_not_mutate_log_file() {
        let tmp = tempfile::tempdir().unwrap();
        append(tmp.path(), 1000, 2000, Some(10), Source::Api).unwrap();
        append(tmp.path(), 2000, 3000, Some(5), Source::Api).unwrap();
        let before = std::fs::read_to_string(tmp.path().join("fetch_log.jsonl")).unwrap();
        let _ = find_missing_ranges(tmp.path(), 0, 10_000).unwrap();
        let after = std::fs::read_to_string(tmp.path().join("fetch_log.jsonl")).unwrap();
        assert_eq!(before, after);
    }
}
