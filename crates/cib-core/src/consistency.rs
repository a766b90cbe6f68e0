//! Consistency evaluation.
//!
//! A scenario is consistent when none of its chosen variants conflict with
//! each other beyond the tolerance. The canonical CIB policy looks at every
//! unordered pair of descriptors in the scenario and requires the combined
//! mutual influence of the two chosen variants to stay within tolerance:
//!
//! ```text
//! consistent  <=>  for all d1 < d2:  |M[v1][v2] + M[v2][v1]| <= tolerance
//! ```
//!
//! One bad pair rejects the scenario regardless of how well the remaining
//! pairs fit. Evaluation stops at the first bad pair.
//!
//! ## Row-sum policy
//!
//! [`ConsistencyPolicy::RowSum`] compares each chosen variant's whole matrix
//! row (its total influence on every other variant) against the tolerance.
//! It answers a different question and is only used when configured.

use serde::{Deserialize, Serialize};

use crate::error::{CibError, Result};
use crate::generator::Scenario;
use crate::matrix::ImpactMatrix;

/// Rule used to decide whether a scenario is consistent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyPolicy {
    /// Every pair of chosen variants within tolerance
    #[default]
    AllPairs,

    /// Every chosen variant's row sum within tolerance
    RowSum,
}

/// The first reason a scenario failed its consistency test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    /// Two chosen variants influence each other too strongly
    Pair {
        first: usize,
        second: usize,
        influence_sum: i32,
    },

    /// One chosen variant's total influence is too strong
    Row { variant: usize, row_sum: i32 },
}

/// Checks scenarios against one matrix, tolerance and policy.
#[derive(Debug, Clone, Copy)]
pub struct ConsistencyEvaluator<'a> {
    matrix: &'a ImpactMatrix,
    tolerance: f64,
    policy: ConsistencyPolicy,
}

impl<'a> ConsistencyEvaluator<'a> {
    /// Create an evaluator using the all-pairs policy.
    pub fn new(matrix: &'a ImpactMatrix, tolerance: f64) -> Result<Self> {
        Ok(Self {
            matrix,
            tolerance: validate_tolerance(tolerance)?,
            policy: ConsistencyPolicy::AllPairs,
        })
    }

    pub fn with_policy(mut self, policy: ConsistencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn policy(&self) -> ConsistencyPolicy {
        self.policy
    }

    pub fn is_consistent(&self, scenario: &Scenario) -> bool {
        self.first_conflict(scenario).is_none()
    }

    /// The first conflict found, or `None` for a consistent scenario.
    pub fn first_conflict(&self, scenario: &Scenario) -> Option<Conflict> {
        let choices = scenario.choices();
        match self.policy {
            ConsistencyPolicy::AllPairs => {
                for (k, &first) in choices.iter().enumerate() {
                    for &second in &choices[k + 1..] {
                        let influence_sum = self.matrix.influence_sum(first, second);
                        if !self.within(influence_sum) {
                            return Some(Conflict::Pair {
                                first,
                                second,
                                influence_sum,
                            });
                        }
                    }
                }
                None
            }
            ConsistencyPolicy::RowSum => choices.iter().find_map(|&variant| {
                let row_sum = self.matrix.row_sum(variant);
                (!self.within(row_sum)).then_some(Conflict::Row { variant, row_sum })
            }),
        }
    }

    /// Lazily keep the consistent scenarios, preserving input order.
    pub fn filter<I>(self, scenarios: I) -> impl Iterator<Item = Scenario> + 'a
    where
        I: IntoIterator<Item = Scenario>,
        I::IntoIter: 'a,
    {
        scenarios
            .into_iter()
            .filter(move |scenario| self.is_consistent(scenario))
    }

    fn within(&self, score: i32) -> bool {
        f64::from(score.abs()) <= self.tolerance
    }
}

/// Reject tolerances that are negative, NaN or infinite.
pub fn validate_tolerance(tolerance: f64) -> Result<f64> {
    if tolerance.is_finite() && tolerance >= 0.0 {
        Ok(tolerance)
    } else {
        Err(CibError::InvalidTolerance(tolerance))
    }
}

/// All-pairs consistency test for a single scenario.
pub fn is_consistent(scenario: &Scenario, matrix: &ImpactMatrix, tolerance: f64) -> Result<bool> {
    Ok(ConsistencyEvaluator::new(matrix, tolerance)?.is_consistent(scenario))
}

/// Lazily keep the scenarios that pass the all-pairs test.
pub fn evaluate_all<'a, I>(
    scenarios: I,
    matrix: &'a ImpactMatrix,
    tolerance: f64,
) -> Result<impl Iterator<Item = Scenario> + 'a>
where
    I: IntoIterator<Item = Scenario>,
    I::IntoIter: 'a,
{
    Ok(ConsistencyEvaluator::new(matrix, tolerance)?.filter(scenarios))
}
