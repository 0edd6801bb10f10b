//! ==============================================================================
//! aggregate.rs - statistics over reading values
//! ==============================================================================
//!
//! purpose:
//!     max / mean / median / quartiles and the per-device summary. every
//!     function is pure: same input, same output, nothing cached.
//!
//! numeric contracts:
//!     - median is the HIGH median: for an even count the upper of the two
//!       central values, never their average.
//!     - quartiles interpolate linearly at rank p * (n - 1) over the sorted
//!       values (q1: p = 0.25, q3: p = 0.75).
//!     - empty input is always `EmptySet`, never a zero.
//!
//! ==============================================================================

use crate::domain::{DeviceSummary, Quartiles, Reading};
use crate::error::{ReadingError, Result};

pub fn compute_max(values: &[i64]) -> Result<i64> {
    values.iter().copied().max().ok_or_else(|| ReadingError::empty(None))
}

pub fn compute_mean(values: &[i64]) -> Result<f64> {
    if values.is_empty() {
        return Err(ReadingError::empty(None));
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    Ok(sum / values.len() as f64)
}

/// high-median scalar
pub fn compute_median(values: &[i64]) -> Result<i64> {
    let sorted = sorted_copy(values)?;
    Ok(high_median(&sorted))
}

/// every reading whose value equals the high-median, in input order
pub fn compute_median_records(readings: &[Reading]) -> Result<Vec<Reading>> {
    let values: Vec<i64> = readings.iter().map(|r| r.value).collect();
    let median = compute_median(&values)?;
    Ok(readings.iter().filter(|r| r.value == median).cloned().collect())
}

pub fn compute_quartiles(values: &[i64]) -> Result<Quartiles> {
    let sorted = sorted_copy(values)?;
    Ok(Quartiles {
        quartile_1: quantile(&sorted, 0.25),
        quartile_3: quantile(&sorted, 0.75),
    })
}

/// the reading holding the largest value; the first one wins a tie
pub fn max_reading(readings: &[Reading]) -> Result<Reading> {
    let mut best: Option<&Reading> = None;
    for r in readings {
        match best {
            Some(b) if b.value >= r.value => {}
            _ => best = Some(r),
        }
    }
    best.cloned().ok_or_else(|| ReadingError::empty(None))
}

/// count, max, median, mean and quartiles over one sorted copy
pub fn summarize(device_id: &str, readings: &[Reading]) -> Result<DeviceSummary> {
    let values: Vec<i64> = readings.iter().map(|r| r.value).collect();
    let sorted = sorted_copy(&values).map_err(|_| ReadingError::empty(Some(device_id)))?;
    let n = sorted.len();
    let sum: f64 = sorted.iter().map(|&v| v as f64).sum();

    Ok(DeviceSummary {
        device_id: device_id.to_string(),
        count: n,
        max: sorted[n - 1],
        median: high_median(&sorted),
        mean: sum / n as f64,
        quartile_1: quantile(&sorted, 0.25),
        quartile_3: quantile(&sorted, 0.75),
    })
}

// ==============================================================================
// helpers (all take a non-empty ascending slice)
// ==============================================================================

fn sorted_copy(values: &[i64]) -> Result<Vec<i64>> {
    if values.is_empty() {
        return Err(ReadingError::empty(None));
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Ok(sorted)
}

fn high_median(sorted: &[i64]) -> i64 {
    // n / 2 is the middle for odd n and the upper-middle for even n
    sorted[sorted.len() / 2]
}

fn quantile(sorted: &[i64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let below = sorted[lo] as f64;
    let above = sorted[hi] as f64;
    below + (above - below) * (rank - lo as f64)
}
