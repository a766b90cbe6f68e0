//! Project snapshots.
//!
//! The snapshot is the plain record a persistence layer saves and loads:
//!
//! ```json
//! {
//!   "descriptors": ["A", "B"],
//!   "variants": { "A": ["1", "2"], "B": ["10"] },
//!   "cibMatrix": [[0, 0, 1], [0, 0, -2], [3, 0, 0]]
//! }
//! ```
//!
//! `cibMatrix` is row-major and aligned to the flat variant order implied by
//! `descriptors` and `variants`. Not-applicable cells are written as `0`.
//!
//! Loading validates the whole record before building anything; every
//! problem is reported as a single [`CibError::InvalidSnapshot`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{CibError, Result};
use crate::matrix::ImpactMatrix;
use crate::project::Project;
use crate::registry::Registry;

/// Serialized form of a [`Project`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProjectSnapshot {
    /// Descriptor names in registration order
    pub descriptors: Vec<String>,

    /// Variant names per descriptor (BTreeMap for deterministic output)
    pub variants: BTreeMap<String, Vec<String>>,

    /// Row-major influence matrix
    #[serde(rename = "cibMatrix")]
    pub cib_matrix: Vec<Vec<i64>>,
}

impl ProjectSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CibError::InvalidSnapshot(e.to_string()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| CibError::InvalidSnapshot(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load by extension: `.yaml`/`.yml` as YAML, anything else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if is_yaml(path) {
            Self::from_yaml_file(path)
        } else {
            Self::from_json_file(path)
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the snapshot as JSON.
    pub fn save_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut json = self.to_json_pretty()?;
        json.push('\n');
        fs::write(path, json)?;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

impl Project {
    /// Rebuild a project from a snapshot, all or nothing.
    pub fn from_snapshot(snapshot: &ProjectSnapshot) -> Result<Self> {
        let mut registry = Registry::new();
        for name in &snapshot.descriptors {
            registry
                .add_descriptor(name.as_str())
                .map_err(|e| invalid(format!("descriptor {name:?}: {e}")))?;

            let variants = snapshot
                .variants
                .get(name)
                .ok_or_else(|| invalid(format!("no variants entry for descriptor {name:?}")))?;
            for variant in variants {
                registry
                    .add_variant(name, variant.as_str())
                    .map_err(|e| invalid(e.to_string()))?;
            }
        }

        if let Some(stray) = snapshot
            .variants
            .keys()
            .find(|k| registry.descriptor(k).is_none())
        {
            return Err(invalid(format!(
                "variants listed for unknown descriptor {stray:?}"
            )));
        }

        let dim = registry.variant_count();
        if snapshot.cib_matrix.len() != dim {
            return Err(invalid(format!(
                "matrix has {} rows, expected {dim}",
                snapshot.cib_matrix.len()
            )));
        }

        let mut matrix = ImpactMatrix::for_registry(&registry);
        for (i, row) in snapshot.cib_matrix.iter().enumerate() {
            if row.len() != dim {
                return Err(invalid(format!(
                    "matrix row {i} has {} columns, expected {dim}",
                    row.len()
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                if !matrix.is_applicable(i, j) {
                    if value != 0 {
                        return Err(invalid(format!(
                            "cell ({i}, {j}) links variants of the same descriptor but holds {value}"
                        )));
                    }
                    continue;
                }
                let value = i32::try_from(value)
                    .map_err(|_| invalid(format!("cell ({i}, {j}) value {value} is out of range")))?;
                matrix
                    .set_influence(i, j, value)
                    .map_err(|e| invalid(format!("cell ({i}, {j}): {e}")))?;
            }
        }

        Ok(Project::from_parts(registry, matrix))
    }

    /// Capture the project in snapshot form.
    pub fn to_snapshot(&self) -> ProjectSnapshot {
        let registry = self.registry();
        ProjectSnapshot {
            descriptors: registry.descriptors().iter().map(|d| d.name.clone()).collect(),
            variants: registry
                .descriptors()
                .iter()
                .map(|d| (d.name.clone(), d.variants.clone()))
                .collect(),
            cib_matrix: self
                .matrix()
                .to_rows()
                .into_iter()
                .map(|row| row.into_iter().map(i64::from).collect())
                .collect(),
        }
    }

    /// Load a project file (JSON or YAML by extension).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_snapshot(&ProjectSnapshot::from_file(path)?)
    }

    /// Save the project as a JSON snapshot.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_snapshot().save_json_file(path)
    }
}

fn invalid(reason: impl Into<String>) -> CibError {
    CibError::InvalidSnapshot(reason.into())
}
