//! Contiguous window enumeration for the exponential-phase search.
//!
//! We search log-biomass with a deterministic, exhaustive scan rather than a
//! change-point heuristic:
//! - every contiguous window of `min_window..=max_window` points is visited
//! - the order is fixed (window length ascending, then start index ascending),
//!   which the detector relies on for its tie-break
//!
//! `max_window = max(4, floor(0.6·n))` keeps the search from favouring a
//! window spanning nearly the whole culture, and bounds the cost.

use crate::domain::PhaseSearch;

/// Smallest window that still leaves a residual degree of freedom.
pub const MIN_WINDOW: usize = 3;

/// Fraction of the series the longest window may cover.
pub const MAX_WINDOW_FRACTION: f64 = 0.6;

/// A run of consecutive sample indices `start..start + len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub len: usize,
}

impl Window {
    /// Inclusive index of the last sample.
    pub fn last(&self) -> usize {
        self.start + self.len - 1
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Longest window length searched for a series of `n` points.
pub fn max_window_len(n: usize, search: &PhaseSearch) -> usize {
    // Truncating cast: floor for non-negative n.
    let computed = ((n as f64 * MAX_WINDOW_FRACTION) as usize).max(4);
    match search.max_window {
        Some(cap) => computed.min(cap),
        None => computed,
    }
}

/// Shortest window length searched. Values below `MIN_WINDOW` are raised to it.
pub fn min_window_len(search: &PhaseSearch) -> usize {
    search.min_window.max(MIN_WINDOW)
}

/// All windows for a series of `n` points, in search order.
///
/// Window lengths larger than `n` yield nothing.
pub fn windows(n: usize, search: &PhaseSearch) -> impl Iterator<Item = Window> {
    let min_len = min_window_len(search);
    let max_len = max_window_len(n, search);
    (min_len..=max_len).flat_map(move |len| {
        let starts = if len <= n { 0..=(n - len) } else { 1..=0 };
        starts.map(move |start| Window { start, len })
    })
}
