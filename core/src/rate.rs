//! Per-draw rates from aligned numerator and denominator sums.
//!
//! RULE: Rates are computed draw by draw and summarized afterwards,
//! never aggregate-then-divide. Numerator and denominator must agree on
//! states, categories and the number of draws; any disagreement is an
//! upstream indexing bug and aborts the run.

use crate::{
    error::{SummaryError, SummaryResult},
    state::StateSums,
    summary::{summarize_groups, GroupKey, SummaryRow},
};
use std::collections::BTreeMap;

/// Element-wise `numerator / denominator`. Division by zero passes
/// through as inf/NaN; the second value counts such rates.
pub fn divide(numerator: &[f64], denominator: &[f64]) -> (Vec<f64>, usize) {
    let rates: Vec<f64> = numerator
        .iter()
        .zip(denominator)
        .map(|(n, d)| n / d)
        .collect();
    let non_finite = rates.iter().filter(|r| !r.is_finite()).count();
    (rates, non_finite)
}

pub struct RateCombiner {
    dataset: String,
}

impl RateCombiner {
    /// `dataset` names the rate in error messages (e.g. "msm/male age").
    pub fn new(dataset: impl Into<String>) -> Self {
        Self { dataset: dataset.into() }
    }

    /// Rate summaries grouped by (state, category), in that order.
    /// Returns the rows and the number of non-finite rates.
    pub fn combine(
        &self,
        numerator: &[StateSums],
        denominator: &[StateSums],
    ) -> SummaryResult<(Vec<SummaryRow>, usize)> {
        let denominators: BTreeMap<&str, &StateSums> =
            denominator.iter().map(|s| (s.state.as_str(), s)).collect();

        let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
        let mut non_finite = 0;

        for num in numerator {
            let den = denominators.get(num.state.as_str()).ok_or_else(|| {
                self.misaligned(&num.state, "*", "no denominator sums for this state".to_string())
            })?;

            for category in den.per_category.keys() {
                if !num.per_category.contains_key(category) {
                    return Err(self.misaligned(
                        &num.state,
                        &category_label(category),
                        "category present in denominator only".to_string(),
                    ));
                }
            }

            for (category, num_draws) in &num.per_category {
                let label = category_label(category);
                let den_draws = den.per_category.get(category).ok_or_else(|| {
                    self.misaligned(&num.state, &label, "category present in numerator only".to_string())
                })?;
                if num_draws.len() != den_draws.len() {
                    return Err(self.misaligned(
                        &num.state,
                        &label,
                        format!(
                            "numerator has {} draws, denominator has {}",
                            num_draws.len(),
                            den_draws.len()
                        ),
                    ));
                }

                let (rates, bad) = divide(num_draws, den_draws);
                non_finite += bad;
                let key = GroupKey::state(num.state.clone());
                let key = match category {
                    Some(c) => key.with_demographic(c.clone()),
                    None    => key,
                };
                groups.insert(key, rates);
            }
        }

        if non_finite > 0 {
            log::warn!("{}: {non_finite} rates are not finite (zero denominator)", self.dataset);
        }
        Ok((summarize_groups(groups), non_finite))
    }

    fn misaligned(&self, state: &str, demographic: &str, details: String) -> SummaryError {
        SummaryError::Alignment {
            dataset: self.dataset.clone(),
            state: state.to_string(),
            demographic: demographic.to_string(),
            details,
        }
    }
}

fn category_label(category: &Option<String>) -> String {
    category.clone().unwrap_or_else(|| "-".to_string())
}
