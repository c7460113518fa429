//! Quantile summaries over simulation draws.
//!
//! Quantiles use linear interpolation between order statistics
//! (h = (n - 1) * p), the default estimator of NumPy and R (type 7).

use crate::{
    error::{SummaryError, SummaryResult},
    types::{Category, CountyIndex, StateAbbrev},
};
use serde::{Deserialize, Serialize};

pub const LOWER_Q: f64 = 0.025;
pub const UPPER_Q: f64 = 0.975;

/// The four statistics reported for every group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean:   f64,
    pub median: f64,
    #[serde(rename = "2.5%")]
    pub q025:   f64,
    #[serde(rename = "97.5%")]
    pub q975:   f64,
}

/// Group keys of one summary row. Unused keys are `None`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GroupKey {
    pub county:      Option<CountyIndex>,
    pub state:       Option<StateAbbrev>,
    pub demographic: Option<Category>,
}

impl GroupKey {
    pub fn county(county: CountyIndex) -> Self {
        Self { county: Some(county), ..Self::default() }
    }

    pub fn state(state: impl Into<StateAbbrev>) -> Self {
        Self { state: Some(state.into()), ..Self::default() }
    }

    pub fn with_demographic(mut self, category: impl Into<Category>) -> Self {
        self.demographic = Some(category.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub key:   GroupKey,
    pub stats: SummaryStats,
}

/// Linear-interpolated quantile of already sorted data. `p` in [0, 1].
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = h - lo as f64;
    let (a, b) = (sorted[lo], sorted[hi]);
    if frac == 0.0 || a == b {
        return Some(a);
    }
    Some(a + frac * (b - a))
}

/// Summarize one vector of draws.
///
/// NaN draws are skipped by all four statistics, whatever their sign
/// bit; a group of only NaN draws summarizes to NaN. An empty vector is
/// an `EmptyGroup` error, not NaN; `context` names the group in the
/// error message.
pub fn summarize(draws: &[f64], context: &str) -> SummaryResult<SummaryStats> {
    if draws.is_empty() {
        return Err(SummaryError::EmptyGroup { context: context.to_string() });
    }
    let mut sorted: Vec<f64> = draws.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        log::warn!("{context}: all {} draws are NaN", draws.len());
        return Ok(SummaryStats { mean: f64::NAN, median: f64::NAN, q025: f64::NAN, q975: f64::NAN });
    }
    sorted.sort_by(f64::total_cmp);

    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    let q = |p| quantile_sorted(&sorted, p).unwrap_or(f64::NAN);

    Ok(SummaryStats {
        mean,
        median: q(0.5),
        q025:   q(LOWER_Q),
        q975:   q(UPPER_Q),
    })
}

/// Summarize each group of an ordered collection, keeping its order.
/// Empty groups are logged and skipped.
pub fn summarize_groups<I>(groups: I) -> Vec<SummaryRow>
where
    I: IntoIterator<Item = (GroupKey, Vec<f64>)>,
{
    let mut rows = Vec::new();
    for (key, draws) in groups {
        match summarize(&draws, &format!("{key:?}")) {
            Ok(stats) => rows.push(SummaryRow { key, stats }),
            Err(e) => log::warn!("{e}; group skipped"),
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_matches_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&sorted, 1.0), Some(5.0));
        assert_eq!(quantile_sorted(&sorted, 0.5), Some(3.0));
        assert_eq!(quantile_sorted(&sorted, 0.25), Some(2.0));
        let q = quantile_sorted(&[1.0, 2.0], 0.975).unwrap();
        assert!((q - 1.975).abs() < 1e-12);
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn empty_group_is_an_error() {
        let err = summarize(&[], "county 7").unwrap_err();
        assert!(matches!(err, SummaryError::EmptyGroup { .. }));
    }

    #[test]
    fn empty_groups_are_skipped() {
        let rows = summarize_groups(vec![
            (GroupKey::county(1), vec![1.0, 3.0]),
            (GroupKey::county(2), vec![]),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, GroupKey::county(1));
        assert_eq!(rows[0].stats.median, 2.0);
    }
}
