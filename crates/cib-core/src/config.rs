//! Analysis configuration.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```yaml
//! tolerance: 1.0
//! max_scenarios: 250000
//! policy: all_pairs        # or row_sum
//! degenerate: midpoint     # or fail
//! record_rejections: false
//! determinism:
//!   analyzed_at: "2025-12-20T10:00:00Z"
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::consistency::{validate_tolerance, ConsistencyPolicy};
use crate::ranking::DegeneratePolicy;

/// Default cap on the number of scenarios enumerated in one run.
pub const DEFAULT_MAX_SCENARIOS: u64 = 1_000_000;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Parameters for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Largest allowed |combined influence| (or |row sum|)
    #[serde(default)]
    pub tolerance: f64,

    /// Refuse to enumerate more scenarios than this
    #[serde(default = "default_max_scenarios")]
    pub max_scenarios: u64,

    /// Consistency rule
    #[serde(default)]
    pub policy: ConsistencyPolicy,

    /// Ranking behaviour when all profiles coincide
    #[serde(default)]
    pub degenerate: DegeneratePolicy,

    /// Keep the first conflict of every rejected scenario in the report
    #[serde(default)]
    pub record_rejections: bool,

    /// Determinism configuration
    #[serde(default)]
    pub determinism: DeterminismConfig,
}

fn default_max_scenarios() -> u64 {
    DEFAULT_MAX_SCENARIOS
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            max_scenarios: DEFAULT_MAX_SCENARIOS,
            policy: ConsistencyPolicy::AllPairs,
            degenerate: DegeneratePolicy::Midpoint,
            record_rejections: false,
            determinism: DeterminismConfig::default(),
        }
    }
}

/// Fixed timestamp for reproducible reports.
///
/// When `analyzed_at` is `None` (default), the current system time is used.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DeterminismConfig {
    #[serde(default)]
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl AnalysisConfig {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load by extension: `.json` as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_tolerance(self.tolerance)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        if self.max_scenarios == 0 {
            return Err(ConfigError::ValidationError(
                "max_scenarios must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
