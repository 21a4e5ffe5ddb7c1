//! Small descriptive statistics used by the initial-guess heuristics.

use std::cmp::Ordering;

/// Median of `values` (mean of the two middle values for even lengths).
///
/// Selects on a private copy, so a volume median briefly holds a second
/// buffer of the voxel data. The input is left untouched.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut work = values.to_vec();
    let mid = work.len() / 2;
    let (lower, upper, _) = work.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if values.len() % 2 == 1 {
        return Some(upper);
    }
    let below = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((below + upper) / 2.0)
}

/// Index of the first maximum value.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v.partial_cmp(&b) != Some(Ordering::Greater) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// `(min, max)` over finite values.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn argmax_picks_first_peak() {
        assert_eq!(argmax(&[1.0, 5.0, 2.0, 5.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn min_max_skips_nan() {
        assert_eq!(min_max(&[2.0, f64::NAN, -1.0, 7.0]), Some((-1.0, 7.0)));
    }
}
