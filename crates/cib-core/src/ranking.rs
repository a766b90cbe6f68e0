//! Ranking of consistent scenarios.
//!
//! A simplified TOPSIS: each scenario becomes a score vector with one
//! coordinate per descriptor, read from the numeric value of its chosen
//! variant. The ideal-best profile takes the maximum of every coordinate
//! over all scenarios and the ideal-worst profile the minimum, independently
//! per coordinate. A scenario's closeness is
//!
//! ```text
//! closeness = d_worst / (d_best + d_worst)
//! ```
//!
//! with Euclidean distances to the two profiles. Closeness is `1` at the
//! ideal-best profile and `0` at the ideal-worst. Ranking is descending by
//! closeness; ties keep generation order.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{CibError, Result};
use crate::generator::Scenario;
use crate::registry::Registry;

lazy_static! {
    // Leading decimal number, the way analysts type units after values ("12.5%", "300 ppm")
    static ref LEADING_NUMBER: Regex = Regex::new(
        r"^\s*[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?"
    ).unwrap();
}

/// Closeness given to a scenario whose distances to both profiles are zero.
pub const DEGENERATE_CLOSENESS: f64 = 0.5;

/// What to do when every consistent scenario has the same profile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Assign [`DEGENERATE_CLOSENESS`] and flag the entry
    #[default]
    Midpoint,

    /// Fail with [`CibError::DegenerateRanking`]
    Fail,
}

/// One scenario's place in the ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedScenario {
    /// 1-based rank
    pub rank: usize,

    /// Position among the consistent scenarios, in generation order
    pub index: usize,

    /// The scenario itself
    pub scenario: Scenario,

    /// Score vector, one coordinate per descriptor
    pub values: Vec<f64>,

    pub distance_to_best: f64,

    pub distance_to_worst: f64,

    /// Relative closeness in `[0, 1]`
    pub closeness: f64,

    /// True when closeness was assigned rather than computed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degenerate: bool,
}

/// Full ranking output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ranking {
    pub ideal_best: Vec<f64>,
    pub ideal_worst: Vec<f64>,
    pub entries: Vec<RankedScenario>,
}

impl Ranking {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The top-ranked scenario, if any.
    pub fn best(&self) -> Option<&RankedScenario> {
        self.entries.first()
    }
}

/// Numeric value of a variant name, or `None` if it has no leading number.
pub fn parse_numeric(variant: &str) -> Option<f64> {
    let matched = LEADING_NUMBER.find(variant)?;
    let value: f64 = matched.as_str().trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Ranks consistent scenarios by TOPSIS closeness.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingEngine {
    degenerate: DegeneratePolicy,
}

impl RankingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_degenerate_policy(mut self, degenerate: DegeneratePolicy) -> Self {
        self.degenerate = degenerate;
        self
    }

    /// Rank scenarios whose variants all carry numeric values.
    ///
    /// Fails with [`CibError::NonNumericVariant`] on the first chosen
    /// variant that has no numeric reading.
    pub fn rank(&self, scenarios: &[Scenario], registry: &Registry) -> Result<Ranking> {
        let values_by_flat: Vec<Option<f64>> = registry
            .flattened()
            .iter()
            .map(|r| parse_numeric(&r.variant))
            .collect();

        let vectors = scenarios
            .iter()
            .map(|scenario| {
                scenario
                    .choices()
                    .iter()
                    .map(|&flat| {
                        values_by_flat.get(flat).copied().flatten().ok_or_else(|| {
                            let reference = registry.variant_at(flat);
                            CibError::NonNumericVariant {
                                descriptor: reference
                                    .as_ref()
                                    .map(|r| r.descriptor.clone())
                                    .unwrap_or_default(),
                                variant: reference.map(|r| r.variant).unwrap_or_default(),
                            }
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        self.rank_vectors(scenarios, vectors)
    }

    /// Rank scenarios against precomputed score vectors.
    ///
    /// `vectors[i]` belongs to `scenarios[i]`; all vectors have one
    /// coordinate per descriptor.
    pub fn rank_vectors(&self, scenarios: &[Scenario], vectors: Vec<Vec<f64>>) -> Result<Ranking> {
        let width = vectors.first().map(Vec::len).unwrap_or(0);
        let mut ideal_best = vec![f64::NEG_INFINITY; width];
        let mut ideal_worst = vec![f64::INFINITY; width];
        for vector in &vectors {
            for (k, &value) in vector.iter().enumerate().take(width) {
                ideal_best[k] = ideal_best[k].max(value);
                ideal_worst[k] = ideal_worst[k].min(value);
            }
        }

        let scale = common_scale(&ideal_best, &ideal_worst);
        let scaled_best = scaled(&ideal_best, scale);
        let scaled_worst = scaled(&ideal_worst, scale);

        let mut entries = Vec::with_capacity(vectors.len());
        for (index, (scenario, values)) in scenarios.iter().zip(vectors).enumerate() {
            let point = scaled(&values, scale);
            let to_best = euclidean(&point, &scaled_best);
            let to_worst = euclidean(&point, &scaled_worst);
            let distance_to_best = to_best * scale;
            let distance_to_worst = to_worst * scale;
            let denominator = to_best + to_worst;

            let (closeness, degenerate) = if denominator > 0.0 {
                (to_worst / denominator, false)
            } else {
                match self.degenerate {
                    DegeneratePolicy::Midpoint => (DEGENERATE_CLOSENESS, true),
                    DegeneratePolicy::Fail => return Err(CibError::DegenerateRanking),
                }
            };

            entries.push(RankedScenario {
                rank: 0,
                index,
                scenario: scenario.clone(),
                values,
                distance_to_best,
                distance_to_worst,
                closeness,
                degenerate,
            });
        }

        // Stable: equal closeness keeps generation order
        entries.sort_by(|a, b| {
            b.closeness
                .partial_cmp(&a.closeness)
                .unwrap_or(Ordering::Equal)
        });
        for (position, entry) in entries.iter_mut().enumerate() {
            entry.rank = position + 1;
        }

        Ok(Ranking {
            ideal_best,
            ideal_worst,
            entries,
        })
    }
}

/// Power of two that brings every profile coordinate into `[-1, 1]`.
///
/// Distances are measured on scaled coordinates so squared differences
/// cannot overflow for large finite values. Scaling by a power of two is
/// exact, so closeness and ties are unaffected.
fn common_scale(ideal_best: &[f64], ideal_worst: &[f64]) -> f64 {
    let max_abs = ideal_best
        .iter()
        .chain(ideal_worst)
        .map(|v| v.abs())
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    if max_abs == 0.0 {
        return 1.0;
    }
    let exponent = (max_abs.log2().ceil() as i32).clamp(-1022, 1023);
    2.0_f64.powi(exponent)
}

fn scaled(values: &[f64], scale: f64) -> Vec<f64> {
    values.iter().map(|v| v / scale).collect()
}

fn euclidean(values: &[f64], profile: &[f64]) -> f64 {
    values
        .iter()
        .zip(profile)
        .map(|(v, p)| (v - p).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate_scenarios;

    fn sample() -> Registry {
        let mut registry = Registry::new();
        registry.add_descriptor("A").unwrap();
        registry.add_descriptor("B").unwrap();
        for v in ["1", "2", "3"] {
            registry.add_variant("A", v).unwrap();
        }
        for v in ["10", "20"] {
            registry.add_variant("B", v).unwrap();
        }
        registry
    }

    #[test]
    fn test_best_and_worst_profiles() {
        let registry = sample();
        let scenarios: Vec<Scenario> = generate_scenarios(&registry).unwrap().collect();
        let ranking = RankingEngine::new().rank(&scenarios, &registry).unwrap();

        assert_eq!(ranking.ideal_best, vec![3.0, 20.0]);
        assert_eq!(ranking.ideal_worst, vec![1.0, 10.0]);

        let best = ranking.best().unwrap();
        assert_eq!(best.values, vec![3.0, 20.0]);
        assert_eq!(best.closeness, 1.0);
        assert_eq!(best.rank, 1);

        let last = ranking.entries.last().unwrap();
        assert_eq!(last.values, vec![1.0, 10.0]);
        assert_eq!(last.closeness, 0.0);
        assert_eq!(last.rank, 6);
    }

    #[test]
    fn test_closeness_is_bounded_and_sorted() {
        let registry = sample();
        let scenarios: Vec<Scenario> = generate_scenarios(&registry).unwrap().collect();
        let ranking = RankingEngine::new().rank(&scenarios, &registry).unwrap();

        assert!(ranking
            .entries
            .iter()
            .all(|e| (0.0..=1.0).contains(&e.closeness)));
        assert!(ranking
            .entries
            .windows(2)
            .all(|w| w[0].closeness >= w[1].closeness));
    }

    #[test]
    fn test_ties_keep_generation_order() {
        let scenarios = vec![
            Scenario::new(vec![0]),
            Scenario::new(vec![1]),
            Scenario::new(vec![2]),
            Scenario::new(vec![3]),
        ];
        // (0,1) and (1,0) are equidistant from both profiles
        let vectors = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let ranking = RankingEngine::new().rank_vectors(&scenarios, vectors).unwrap();
        let order: Vec<usize> = ranking.entries.iter().map(|e| e.index).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_degenerate_midpoint_and_fail() {
        let scenarios = vec![Scenario::new(vec![0]), Scenario::new(vec![1])];
        let vectors = vec![vec![5.0], vec![5.0]];

        let ranking = RankingEngine::new()
            .rank_vectors(&scenarios, vectors.clone())
            .unwrap();
        assert!(ranking
            .entries
            .iter()
            .all(|e| e.degenerate && e.closeness == DEGENERATE_CLOSENESS));

        let strict = RankingEngine::new().with_degenerate_policy(DegeneratePolicy::Fail);
        assert!(matches!(
            strict.rank_vectors(&scenarios, vectors),
            Err(CibError::DegenerateRanking)
        ));
    }

    #[test]
    fn test_non_numeric_variant_is_reported() {
        let mut registry = Registry::new();
        registry.add_descriptor("Policy").unwrap();
        registry.add_variant("Policy", "High Carbon Tax").unwrap();
        registry.add_variant("Policy", "5").unwrap();
        let scenarios: Vec<Scenario> = generate_scenarios(&registry).unwrap().collect();

        let err = RankingEngine::new().rank(&scenarios, &registry).unwrap_err();
        assert!(matches!(
            err,
            CibError::NonNumericVariant { ref descriptor, ref variant }
                if descriptor == "Policy" && variant == "High Carbon Tax"
        ));
    }

    #[test]
    fn test_parse_numeric_leading_number() {
        assert_eq!(parse_numeric("12.5%"), Some(12.5));
        assert_eq!(parse_numeric(" -3 units"), Some(-3.0));
        assert_eq!(parse_numeric(".5"), Some(0.5));
        assert_eq!(parse_numeric("1e3"), Some(1000.0));
        assert_eq!(parse_numeric("0.25"), Some(0.25));
        assert_eq!(parse_numeric("High"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("1e999"), None);
    }

    #[test]
    fn test_large_magnitudes_keep_closeness_finite() {
        let mut registry = Registry::new();
        registry.add_descriptor("A").unwrap();
        for v in ["-1e200", "0", "1e200"] {
            registry.add_variant("A", v).unwrap();
        }
        let scenarios: Vec<Scenario> = generate_scenarios(&registry).unwrap().collect();
        let ranking = RankingEngine::new().rank(&scenarios, &registry).unwrap();

        assert!(ranking
            .entries
            .iter()
            .all(|e| (0.0..=1.0).contains(&e.closeness)));
        let order: Vec<f64> = ranking.entries.iter().map(|e| e.values[0]).collect();
        assert_eq!(order, vec![1e200, 0.0, -1e200]);
        assert_eq!(ranking.entries[0].closeness, 1.0);
        assert_eq!(ranking.entries[1].closeness, 0.5);
        assert_eq!(ranking.entries[2].closeness, 0.0);
        assert!(ranking.entries[0].distance_to_worst.is_finite());
    }

    #[test]
    fn test_empty_input_ranks_nothing() {
        let registry = sample();
        let ranking = RankingEngine::new().rank(&[], &registry).unwrap();
        assert!(ranking.is_empty());
        assert!(ranking.ideal_best.is_empty());
    }
}
