//! Time intervals and their conversion to frame-size chunk lists.

use serde::{Deserialize, Serialize};

/// A contiguous span of an observation, in both time and sample coordinates.
///
/// `first` and `last` are inclusive sample indices, matching the upstream
/// interval convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Start time in seconds
    pub start: f64,
    /// Stop time in seconds
    pub stop: f64,
    /// First sample index (inclusive)
    pub first: usize,
    /// Last sample index (inclusive)
    pub last: usize,
}

impl Interval {
    /// Number of samples covered by the interval
    pub fn n_samples(&self) -> usize {
        self.last + 1 - self.first
    }
}

/// Convert a list of sample intervals into a chunk list covering `[0, nsamp)`.
///
/// Gaps before, between, and after the intervals become chunks of their own,
/// so the returned sizes always sum exactly to `nsamp`. Intervals are
/// processed in sample order; portions overlapping an earlier interval or
/// falling outside `[0, nsamp)` are clipped.
pub fn intervals_to_chunklist(intervals: &[Interval], nsamp: usize) -> Vec<usize> {
    let mut sorted: Vec<&Interval> = intervals.iter().collect();
    sorted.sort_by_key(|iv| iv.first);

    let mut chunks = Vec::new();
    let mut cursor = 0usize;
    for iv in sorted {
        let first = iv.first.max(cursor);
        let end = (iv.last + 1).min(nsamp);
        if first >= end {
            continue;
        }
        if first > cursor {
            chunks.push(first - cursor);
        }
        chunks.push(end - first);
        cursor = end;
    }
    if cursor < nsamp {
        chunks.push(nsamp - cursor);
    }
    chunks
}

/// Extract half-open `[start, stop)` ranges of nonzero bytes from a flag mask.
///
/// Used to export `u8` interval-mask cache flavors and flag streams as
/// interval lists.
pub fn mask_to_intervals(mask: &[u8]) -> Vec<(i64, i64)> {
    let mut ranges = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &byte) in mask.iter().enumerate() {
        match (byte != 0, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                ranges.push((start as i64, i as i64));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        ranges.push((start as i64, mask.len() as i64));
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(first: usize, last: usize) -> Interval {
        Interval {
            start: first as f64 * 0.005,
            stop: last as f64 * 0.005,
            first,
            last,
        }
    }

    #[test]
    fn test_chunklist_covers_gaps() {
        // gap, interval, gap, interval, trailing gap
        let chunks = intervals_to_chunklist(&[iv(10, 39), iv(60, 79)], 100);
        assert_eq!(chunks, vec![10, 30, 20, 20, 20]);
        assert_eq!(chunks.iter().sum::<usize>(), 100);
    }

    #[test]
    fn test_chunklist_no_intervals_is_one_chunk() {
        assert_eq!(intervals_to_chunklist(&[], 50), vec![50]);
    }

    #[test]
    fn test_chunklist_exact_cover() {
        let chunks = intervals_to_chunklist(&[iv(0, 399), iv(400, 799), iv(800, 999)], 1000);
        assert_eq!(chunks, vec![400, 400, 200]);
    }

    #[test]
    fn test_chunklist_clips_overlap_and_overrun() {
        // second interval overlaps the first, third runs past nsamp
        let chunks = intervals_to_chunklist(&[iv(0, 49), iv(40, 59), iv(90, 140)], 100);
        assert_eq!(chunks.iter().sum::<usize>(), 100);
        assert_eq!(chunks, vec![50, 10, 30, 10]);
    }

    #[test]
    fn test_mask_to_intervals_runs() {
        let mask = [0u8, 1, 1, 0, 0, 4, 0, 8];
        assert_eq!(mask_to_intervals(&mask), vec![(1, 3), (5, 6), (7, 8)]);
        assert_eq!(mask_to_intervals(&[0, 0]), Vec::<(i64, i64)>::new());
        assert_eq!(mask_to_intervals(&[1, 1]), vec![(0, 2)]);
    }
}
