//! Errors raised by the scenario engine.
//!
//! Every failure is a local validation error surfaced synchronously to the
//! caller. None of them leaves a [`Project`](crate::Project) half-updated:
//! mutations build a new state and only return it on success.

use thiserror::Error;

/// Errors that can occur while editing a project or running an analysis.
#[derive(Error, Debug)]
pub enum CibError {
    #[error("Descriptor name is empty or already exists: {0:?}")]
    DuplicateDescriptor(String),

    #[error("Variant name is empty or already exists under {descriptor}: {variant:?}")]
    DuplicateVariant { descriptor: String, variant: String },

    #[error("Unknown descriptor: {0}")]
    UnknownDescriptor(String),

    #[error("Invalid range for variant generation: {0}")]
    InvalidRange(String),

    #[error("Variants {row} and {col} belong to the same descriptor")]
    SameDescriptor { row: usize, col: usize },

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Variant not found: {descriptor}: {variant}")]
    NotFound { descriptor: String, variant: String },

    #[error("No descriptors defined")]
    EmptyRegistry,

    #[error("Descriptor has no variants: {0}")]
    NoVariants(String),

    #[error("Variant is not numeric: {descriptor}: {variant}")]
    NonNumericVariant { descriptor: String, variant: String },

    #[error("Ranking is degenerate: every consistent scenario has the same profile")]
    DegenerateRanking,

    #[error("Scenario count {count} exceeds the maximum of {max}")]
    ScenarioCountExceeded { count: u128, max: u64 },

    #[error("Tolerance must be a finite non-negative number, got {0}")]
    InvalidTolerance(f64),

    #[error("Invalid project snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Failed to read project file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to serialize project: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CibError>;
