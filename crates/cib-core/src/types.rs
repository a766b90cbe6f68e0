//! Report types produced by an analysis run.
//!
//! These are the data structures handed back to callers: the tableau of
//! consistent scenarios, the optional ranking, and any recorded rejections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consistency::{Conflict, ConsistencyPolicy};
use crate::generator::Scenario;
use crate::ranking::{RankedScenario, Ranking};
use crate::registry::VariantRef;

/// One consistent scenario as listed in the scenario tableau.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableauEntry {
    /// 1-based scenario number, in generation order
    pub number: usize,

    /// Flat variant indices
    pub scenario: Scenario,

    /// The chosen variant of each descriptor, in descriptor order
    pub variants: Vec<VariantRef>,
}

/// A scenario that failed its consistency test, with the first conflict found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rejection {
    pub scenario: Scenario,
    pub variants: Vec<VariantRef>,
    pub conflict: Conflict,
}

/// Result of analysing a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Number of scenarios enumerated
    pub total_scenarios: u64,

    /// Tolerance applied to every scenario
    pub tolerance: f64,

    /// Consistency rule in force
    pub policy: ConsistencyPolicy,

    /// Consistent scenarios in generation order
    pub consistent: Vec<TableauEntry>,

    /// TOPSIS ranking of the consistent scenarios
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<Ranking>,

    /// Why the ranking was not produced, when it was not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_skipped: Option<String>,

    /// Rejected scenarios, only when rejection recording is enabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<Rejection>,

    /// When the analysis ran
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Number of scenarios that failed the consistency test.
    pub fn inconsistent_count(&self) -> u64 {
        self.total_scenarios - self.consistent.len() as u64
    }

    /// Tableau entry that a ranked scenario refers to.
    pub fn tableau_entry(&self, ranked: &RankedScenario) -> Option<&TableauEntry> {
        self.consistent.get(ranked.index)
    }

    /// Whether at least one scenario survived the consistency test.
    pub fn has_consistent(&self) -> bool {
        !self.consistent.is_empty()
    }
}
