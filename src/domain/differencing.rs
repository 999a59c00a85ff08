//! Differencing and its inverse.
//!
//! Anchors are the values, one per differencing level, that sit immediately
//! before the segment being integrated: `anchors[k]` belongs to the series
//! differenced `k` times.

/// Applies first differencing `d` times. Each pass drops one leading value.
pub fn difference(values: &[f64], d: usize) -> Vec<f64> {
    let mut out = values.to_vec();
    for _ in 0..d {
        if out.len() < 2 {
            return Vec::new();
        }
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// Anchors needed to rebuild `values[d..]` from `difference(values, d)`.
pub fn head_anchors(values: &[f64], d: usize) -> Vec<f64> {
    (0..d)
        .filter_map(|k| difference(values, k).get(d - k - 1).copied())
        .collect()
}

/// Anchors needed to extend `values` with integrated forecasts.
pub fn tail_anchors(values: &[f64], d: usize) -> Vec<f64> {
    (0..d)
        .filter_map(|k| difference(values, k).last().copied())
        .collect()
}

/// Undoes `anchors.len()` levels of differencing by cumulative summation.
pub fn integrate(diffs: &[f64], anchors: &[f64]) -> Vec<f64> {
    let mut out = diffs.to_vec();
    for &anchor in anchors.iter().rev() {
        let mut level = anchor;
        for v in out.iter_mut() {
            level += *v;
            *v = level;
        }
    }
    out
}
