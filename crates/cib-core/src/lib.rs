//! # cib-core
//!
//! Cross-Impact Balance (CIB) scenario engine.
//!
//! Analysts describe a future system with descriptors, each holding several
//! mutually exclusive variants, and score how strongly every variant
//! promotes or inhibits the variants of other descriptors. This crate:
//! - enumerates every scenario (one variant per descriptor),
//! - keeps the scenarios whose chosen variants do not conflict beyond a
//!   tolerance,
//! - ranks the survivors by TOPSIS closeness.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same project and config always produce the same report
//! 2. **No hidden state**: Every run takes the full project snapshot as input
//! 3. **Bounded**: Enumeration is refused above a configurable scenario count
//! 4. **Lossless edits**: Matrix values follow their variants across registry edits
//!
//! ## Example
//!
//! ```rust,ignore
//! use cib_core::{analyze, AnalysisConfig, Project};
//!
//! let project = Project::load("project.json")?;
//! let report = analyze(&project, &AnalysisConfig::default().with_tolerance(1.0))?;
//!
//! for entry in &report.consistent {
//!     println!("Scenario {}", entry.number);
//! }
//! if let Some(ranking) = &report.ranking {
//!     println!("Best closeness: {:.2}", ranking.entries[0].closeness);
//! }
//! ```

pub mod config;
pub mod consistency;
pub mod error;
pub mod generator;
pub mod matrix;
pub mod project;
pub mod ranking;
pub mod registry;
pub mod snapshot;
pub mod types;

// Re-export main types at crate root
pub use config::{AnalysisConfig, ConfigError, DeterminismConfig};
pub use consistency::{
    evaluate_all, is_consistent, Conflict, ConsistencyEvaluator, ConsistencyPolicy,
};
pub use error::{CibError, Result};
pub use generator::{ensure_within, generate_scenarios, scenario_count, Scenario, ScenarioIter};
pub use matrix::{ImpactMatrix, MAX_INFLUENCE, MIN_INFLUENCE};
pub use project::Project;
pub use ranking::{DegeneratePolicy, RankedScenario, Ranking, RankingEngine};
pub use registry::{Descriptor, Registry, VariantRef};
pub use snapshot::ProjectSnapshot;
pub use types::{AnalysisReport, Rejection, TableauEntry};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Analyse a project: enumerate, filter for consistency, rank.
///
/// Uses `config.determinism.analyzed_at` when set, otherwise the current
/// time. For fully deterministic reports use [`analyze_at`].
pub fn analyze(project: &Project, config: &AnalysisConfig) -> Result<AnalysisReport> {
    let analyzed_at = config.determinism.analyzed_at.unwrap_or_else(Utc::now);
    analyze_at(project, config, analyzed_at)
}

/// Analyse a project with an explicit timestamp.
///
/// # Errors
///
/// - [`CibError::InvalidTolerance`] for a negative or non-finite tolerance
/// - [`CibError::EmptyRegistry`] / [`CibError::NoVariants`] when there is
///   nothing to enumerate
/// - [`CibError::ScenarioCountExceeded`] above `config.max_scenarios`
/// - [`CibError::DegenerateRanking`] under [`DegeneratePolicy::Fail`]
///
/// Non-numeric variants do not fail the run: the consistent scenarios are
/// still returned and `ranking_skipped` says why no ranking was produced.
pub fn analyze_at(
    project: &Project,
    config: &AnalysisConfig,
    analyzed_at: DateTime<Utc>,
) -> Result<AnalysisReport> {
    let registry = project.registry();
    let evaluator = ConsistencyEvaluator::new(project.matrix(), config.tolerance)?
        .with_policy(config.policy);

    let total = ensure_within(registry, config.max_scenarios)?;
    debug!(
        total = %total,
        descriptors = registry.descriptors().len(),
        "enumerating scenarios"
    );

    let mut consistent_scenarios = Vec::new();
    let mut rejected = Vec::new();
    for scenario in generate_scenarios(registry)? {
        match evaluator.first_conflict(&scenario) {
            None => consistent_scenarios.push(scenario),
            Some(conflict) if config.record_rejections => rejected.push(Rejection {
                variants: scenario.resolve(registry),
                scenario,
                conflict,
            }),
            Some(_) => {}
        }
    }
    debug!(
        consistent = consistent_scenarios.len(),
        tolerance = config.tolerance,
        policy = ?config.policy,
        "consistency filter done"
    );

    let engine = RankingEngine::new().with_degenerate_policy(config.degenerate);
    let (ranking, ranking_skipped) = match engine.rank(&consistent_scenarios, registry) {
        Ok(ranking) => {
            if ranking.entries.iter().any(|e| e.degenerate) {
                warn!("all consistent scenarios share one profile; closeness set to midpoint");
            }
            (Some(ranking), None)
        }
        Err(e @ CibError::NonNumericVariant { .. }) => {
            warn!(error = %e, "ranking skipped");
            (None, Some(e.to_string()))
        }
        Err(e) => return Err(e),
    };

    let consistent = consistent_scenarios
        .into_iter()
        .enumerate()
        .map(|(i, scenario)| TableauEntry {
            number: i + 1,
            variants: scenario.resolve(registry),
            scenario,
        })
        .collect();

    Ok(AnalysisReport {
        // ensure_within bounds total by a u64 cap
        total_scenarios: total as u64,
        tolerance: evaluator.tolerance(),
        policy: config.policy,
        consistent,
        ranking,
        ranking_skipped,
        rejected,
        analyzed_at,
    })
}

/// End-to-end tests across registry, matrix, generator, evaluator and ranking
#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 20, 10, 0, 0).unwrap()
    }

    /// `A: [1, 2, 3]`, `B: [10, 20]`, all-zero matrix
    fn numeric_project() -> Project {
        let mut project = Project::new()
            .with_descriptor("A")
            .and_then(|p| p.with_descriptor("B"))
            .unwrap();
        for v in ["1", "2", "3"] {
            project = project.with_variant("A", v).unwrap();
        }
        for v in ["10", "20"] {
            project = project.with_variant("B", v).unwrap();
        }
        project
    }

    fn names(entry: &TableauEntry) -> Vec<String> {
        entry.variants.iter().map(|r| r.variant.clone()).collect()
    }

    #[test]
    fn test_zero_matrix_keeps_all_and_ranks_extremes() {
        let project = numeric_project();
        let report = analyze_at(&project, &AnalysisConfig::default(), fixed_time()).unwrap();

        assert_eq!(report.total_scenarios, 6);
        assert_eq!(report.consistent.len(), 6);
        assert_eq!(report.inconsistent_count(), 0);

        let ranking = report.ranking.as_ref().unwrap();
        let first = &ranking.entries[0];
        let last = ranking.entries.last().unwrap();
        assert_eq!(names(report.tableau_entry(first).unwrap()), vec!["3", "20"]);
        assert_eq!(first.closeness, 1.0);
        assert_eq!(names(report.tableau_entry(last).unwrap()), vec!["1", "10"]);
        assert_eq!(last.closeness, 0.0);
    }

    #[test]
    fn test_mutual_influence_beyond_tolerance_excludes_scenario() {
        let a1 = VariantRef::new("A", "1");
        let b10 = VariantRef::new("B", "10");
        let project = numeric_project()
            .with_influence_between(&a1, &b10, 2)
            .and_then(|p| p.with_influence_between(&b10, &a1, 2))
            .unwrap();

        let config = AnalysisConfig::default().with_tolerance(3.0);
        let report = analyze_at(&project, &config, fixed_time()).unwrap();

        assert_eq!(report.consistent.len(), 5);
        assert!(report
            .consistent
            .iter()
            .all(|e| names(e) != vec!["1", "10"]));
        // Numbering follows generation order of the survivors
        assert_eq!(report.consistent[0].number, 1);
        assert_eq!(names(&report.consistent[0]), vec!["1", "20"]);
    }

    #[test]
    fn test_zero_variant_descriptor_is_an_error() {
        let project = numeric_project().with_descriptor("C").unwrap();
        assert!(matches!(
            analyze(&project, &AnalysisConfig::default()),
            Err(CibError::NoVariants(name)) if name == "C"
        ));
    }

    #[test]
    fn test_scenario_cap_is_reported() {
        let config = AnalysisConfig {
            max_scenarios: 4,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            analyze(&numeric_project(), &config),
            Err(CibError::ScenarioCountExceeded { count: 6, max: 4 })
        ));
    }

    #[test]
    fn test_non_numeric_variants_skip_ranking_only() {
        let project = Project::new()
            .with_descriptor("Energy Policy")
            .and_then(|p| p.with_variant("Energy Policy", "High Carbon Tax"))
            .and_then(|p| p.with_variant("Energy Policy", "No Carbon Tax"))
            .and_then(|p| p.with_descriptor("Growth"))
            .and_then(|p| p.with_variant("Growth", "Strong"))
            .unwrap();

        let report = analyze_at(&project, &AnalysisConfig::default(), fixed_time()).unwrap();
        assert_eq!(report.consistent.len(), 2);
        assert!(report.ranking.is_none());
        assert!(report.ranking_skipped.as_deref().unwrap().contains("High Carbon Tax"));
    }

    #[test]
    fn test_rejections_are_recorded_on_request() {
        let project = numeric_project().with_influence(0, 3, 3).unwrap();
        let config = AnalysisConfig {
            tolerance: 2.0,
            record_rejections: true,
            ..AnalysisConfig::default()
        };
        let report = analyze_at(&project, &config, fixed_time()).unwrap();

        assert_eq!(report.rejected.len(), 1);
        let rejection = &report.rejected[0];
        assert_eq!(
            rejection.variants,
            vec![VariantRef::new("A", "1"), VariantRef::new("B", "10")]
        );
        assert_eq!(
            rejection.conflict,
            Conflict::Pair {
                first: 0,
                second: 3,
                influence_sum: 3
            }
        );
    }

    #[test]
    fn test_determinism_same_input_same_report() {
        let project = numeric_project()
            .with_influence(1, 4, -2)
            .and_then(|p| p.with_influence(4, 0, 1))
            .unwrap();
        let config = AnalysisConfig::default().with_tolerance(1.0);

        let first = analyze_at(&project, &config, fixed_time()).unwrap();
        let second = analyze_at(&project, &config, fixed_time()).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_configured_timestamp_is_used() {
        let config = AnalysisConfig {
            determinism: DeterminismConfig {
                analyzed_at: Some(fixed_time()),
            },
            ..AnalysisConfig::default()
        };
        let report = analyze(&numeric_project(), &config).unwrap();
        assert_eq!(report.analyzed_at, fixed_time());
    }

    #[test]
    fn test_demo_project_and_config() {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
        let project = Project::load(root.join("sample_project.json")).unwrap();
        let config = AnalysisConfig::from_file(root.join("analysis.yaml")).unwrap();

        let report = analyze_at(&project, &config, fixed_time()).unwrap();
        assert_eq!(report.consistent.len(), 5);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.ranking.unwrap().entries[0].closeness, 1.0);
    }

    #[test]
    fn test_nothing_consistent_yields_empty_ranking() {
        let mut project = numeric_project();
        for a in 0..3 {
            for b in 3..5 {
                project = project.with_influence(a, b, 1).unwrap();
            }
        }
        let report = analyze_at(&project, &AnalysisConfig::default(), fixed_time()).unwrap();
        assert!(!report.has_consistent());
        assert!(report.ranking.unwrap().is_empty());
    }
}
