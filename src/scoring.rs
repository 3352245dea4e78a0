use crate::error::{MutloadError, Result};
use crate::types::{LoadSeries, VariantRecord, WindowConfig, WindowScore};
use rayon::prelude::*;

/// Score sliding windows of mutation load over `[start, end]` of one chromosome.
///
/// Every window start `s` in `start ..= end - bin_size + 1` produces one score:
/// the number of qualifying records in `[s, s + bin_size - 1]` times their mean
/// alt-allele frequency, where a record qualifies if its frequency is at most
/// `max_alt_freq` (inclusive). Windows with fewer than `min_events` qualifying
/// records score 0.0.
///
/// The table does not need to be sorted; a sorted copy of the in-range records
/// is taken up front so each window can be selected by binary search. Windows
/// are scored in parallel and returned in ascending start order. The function
/// is pure: identical inputs always produce an identical series.
///
/// An interval too short to hold one window yields an empty series, not an
/// error. `start > end` is an error.
pub fn score_windows(
    table: &[VariantRecord],
    chrom: &str,
    start: u64,
    end: u64,
    config: &WindowConfig,
) -> Result<LoadSeries> {
    if start > end {
        return Err(MutloadError::InvalidRange { start, end });
    }
    if config.bin_size == 0 {
        return Err(MutloadError::config("bin_size must be at least 1"));
    }
    if !config.max_alt_freq.is_finite() {
        return Err(MutloadError::config("max_alt_freq must be a finite number"));
    }

    // Restrict to the queried interval once, then sort by position so each
    // window reduces to a binary-searched slice. The sort is stable so
    // records sharing a position keep their arrival order.
    let mut region: Vec<(u64, f64)> = table
        .iter()
        .filter(|r| r.chrom == chrom && (start..=end).contains(&r.pos))
        .map(|r| (r.pos, r.alt_allele_freq))
        .collect();
    region.sort_by_key(|&(pos, _)| pos);

    // Last window start, or nothing if the interval is shorter than one window
    let last = match end.checked_add(1).and_then(|e| e.checked_sub(config.bin_size)) {
        Some(last) if last >= start => last,
        _ => return Ok(Vec::new()),
    };
    let n_windows = (last - start + 1) as usize;

    let series: LoadSeries = (0..n_windows)
        .into_par_iter()
        .map(|i| {
            let s = start + i as u64;
            let e = s + config.bin_size - 1;
            let lo = region.partition_point(|&(pos, _)| pos < s);
            let hi = region.partition_point(|&(pos, _)| pos <= e);

            let mut count = 0usize;
            let mut sum = 0.0f64;
            for &(_, freq) in &region[lo..hi] {
                if freq <= config.max_alt_freq {
                    count += 1;
                    sum += freq;
                }
            }

            // Guard the empty mean; count * mean collapses to sum but the
            // two-factor form is the defined score
            let score = if count == 0 || count < config.min_events {
                0.0
            } else {
                count as f64 * (sum / count as f64)
            };
            WindowScore { start: s, score }
        })
        .collect();

    Ok(series)
}
