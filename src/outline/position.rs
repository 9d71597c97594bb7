//! Fractional sibling ordering.
//!
//! Positions are `f64`. A new sibling takes the midpoint of its neighbours, or steps one
//! `POSITION_STEP` past the end it is appended to. Midpoint inserts into the same gap halve it
//! every time, so roughly fifty of them exhaust an `f64` gap; `between` then returns `None`
//! and the caller renumbers the sibling list with `renumbered` before retrying.

use std::cmp::Ordering;

pub(crate) const POSITION_STEP: f64 = 1.0;
pub(crate) const MIN_POSITION_GAP: f64 = 1e-9;

/// A position strictly between `prev` and `next`, or `None` when the gap is exhausted.
pub(crate) fn between(prev: Option<f64>, next: Option<f64>) -> Option<f64> {
    between_with_gap(prev, next, MIN_POSITION_GAP)
}

pub(crate) fn between_with_gap(prev: Option<f64>, next: Option<f64>, min_gap: f64) -> Option<f64> {
    let candidate = match (prev, next) {
        (Some(p), Some(n)) => {
            if !(n - p > min_gap) {
                return None;
            }
            p + (n - p) / 2.0
        }
        (Some(p), None) => p + POSITION_STEP,
        (None, Some(n)) => n - POSITION_STEP,
        (None, None) => 0.0,
    };

    let above_prev = prev.is_none_or(|p| candidate > p);
    let below_next = next.is_none_or(|n| candidate < n);
    (candidate.is_finite() && above_prev && below_next).then_some(candidate)
}

/// `count` strictly increasing positions inside the open interval `(prev, next)`.
pub(crate) fn spread(
    prev: Option<f64>,
    next: Option<f64>,
    count: usize,
    min_gap: f64,
) -> Option<Vec<f64>> {
    let out: Vec<f64> = match (prev, next) {
        (Some(p), Some(n)) => {
            let step = (n - p) / (count as f64 + 1.0);
            if !(step > min_gap) {
                return None;
            }
            (1..=count).map(|i| p + step * i as f64).collect()
        }
        (Some(p), None) => (1..=count).map(|i| p + POSITION_STEP * i as f64).collect(),
        (None, Some(n)) => (0..count)
            .map(|i| n - POSITION_STEP * (count - i) as f64)
            .collect(),
        (None, None) => (0..count).map(|i| POSITION_STEP * i as f64).collect(),
    };

    let mut last = prev;
    for &x in &out {
        if !x.is_finite() || last.is_some_and(|l| x <= l) {
            return None;
        }
        last = Some(x);
    }
    if let (Some(l), Some(n)) = (last, next) {
        if l >= n {
            return None;
        }
    }
    Some(out)
}

/// Evenly spaced replacement positions `1, 2, 3, ...` for a sibling list of `count`.
pub(crate) fn renumbered(count: usize) -> impl Iterator<Item = f64> {
    (1..=count).map(|i| POSITION_STEP * i as f64)
}

pub(crate) fn cmp_positions(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}
