//! Project state: registry plus cross-impact matrix.
//!
//! A [`Project`] is never mutated in place. Every edit returns a new project
//! whose matrix has been rebuilt against the edited registry, carrying cell
//! values forward by variant identity. Analysis takes a `&Project`, so each
//! run sees one consistent snapshot.

use crate::error::Result;
use crate::matrix::ImpactMatrix;
use crate::registry::{Registry, VariantRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    registry: Registry,
    matrix: ImpactMatrix,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    /// An empty project.
    pub fn new() -> Self {
        let registry = Registry::new();
        let matrix = ImpactMatrix::for_registry(&registry);
        Self { registry, matrix }
    }

    /// Assemble a project from parts that are already aligned.
    pub(crate) fn from_parts(registry: Registry, matrix: ImpactMatrix) -> Self {
        debug_assert_eq!(registry.variant_count(), matrix.dim());
        Self { registry, matrix }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn matrix(&self) -> &ImpactMatrix {
        &self.matrix
    }

    pub fn with_descriptor(&self, name: impl Into<String>) -> Result<Self> {
        let mut registry = self.registry.clone();
        registry.add_descriptor(name)?;
        Ok(self.rebuilt(registry))
    }

    pub fn without_descriptor(&self, name: &str) -> Result<Self> {
        let mut registry = self.registry.clone();
        registry.remove_descriptor(name)?;
        Ok(self.rebuilt(registry))
    }

    pub fn with_variant(&self, descriptor: &str, variant: impl Into<String>) -> Result<Self> {
        let mut registry = self.registry.clone();
        registry.add_variant(descriptor, variant)?;
        Ok(self.rebuilt(registry))
    }

    pub fn without_variant(&self, descriptor: &str, variant: &str) -> Result<Self> {
        let mut registry = self.registry.clone();
        registry.remove_variant(descriptor, variant)?;
        Ok(self.rebuilt(registry))
    }

    /// Replace a descriptor's variants with an evenly spaced numeric range.
    pub fn with_generated_variants(
        &self,
        descriptor: &str,
        min: f64,
        max: f64,
        count: usize,
    ) -> Result<Self> {
        let mut registry = self.registry.clone();
        registry.auto_generate_variants(descriptor, min, max, count)?;
        Ok(self.rebuilt(registry))
    }

    /// Set one matrix cell by flat index.
    pub fn with_influence(&self, row: usize, col: usize, value: i32) -> Result<Self> {
        let mut matrix = self.matrix.clone();
        matrix.set_influence(row, col, value)?;
        Ok(Self {
            registry: self.registry.clone(),
            matrix,
        })
    }

    /// Set one matrix cell by variant names.
    pub fn with_influence_between(
        &self,
        from: &VariantRef,
        to: &VariantRef,
        value: i32,
    ) -> Result<Self> {
        let row = self.registry.flat_index_of(&from.descriptor, &from.variant)?;
        let col = self.registry.flat_index_of(&to.descriptor, &to.variant)?;
        self.with_influence(row, col, value)
    }

    fn rebuilt(&self, registry: Registry) -> Self {
        let matrix = ImpactMatrix::rebuild(&self.registry, &self.matrix, &registry);
        Self { registry, matrix }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CibError;

    fn sample() -> Project {
        Project::new()
            .with_descriptor("A")
            .and_then(|p| p.with_descriptor("B"))
            .and_then(|p| p.with_variant("A", "1"))
            .and_then(|p| p.with_variant("A", "2"))
            .and_then(|p| p.with_variant("B", "10"))
            .unwrap()
    }

    #[test]
    fn test_edits_return_new_state() {
        let before = sample();
        let edited = before.with_variant("B", "20").unwrap();

        assert_eq!(before.registry().variant_count(), 3);
        assert_eq!(edited.registry().variant_count(), 4);
        assert_eq!(edited.matrix().dim(), 4);
    }

    #[test]
    fn test_failed_edit_leaves_project_untouched() {
        let project = sample();
        assert!(matches!(
            project.with_variant("A", "1"),
            Err(CibError::DuplicateVariant { .. })
        ));
        assert_eq!(project, sample());
    }

    #[test]
    fn test_influence_survives_registry_edits() {
        let a2 = VariantRef::new("A", "2");
        let b10 = VariantRef::new("B", "10");
        let project = sample().with_influence_between(&a2, &b10, -2).unwrap();

        let project = project
            .with_descriptor("C")
            .and_then(|p| p.with_variant("C", "x"))
            .and_then(|p| p.without_variant("A", "1"))
            .unwrap();

        let row = project.registry().flat_index_of("A", "2").unwrap();
        let col = project.registry().flat_index_of("B", "10").unwrap();
        assert_eq!(project.matrix().influence(row, col), Some(-2));
    }

    #[test]
    fn test_regenerated_variants_reset_their_cells() {
        let project = sample().with_influence(0, 2, 3).unwrap();
        let project = project.with_generated_variants("A", 0.0, 1.0, 2).unwrap();

        assert_eq!(
            project.registry().descriptor("A").unwrap().variants,
            vec!["0.00", "1.00"]
        );
        assert!(project.matrix().to_rows().iter().flatten().all(|&v| v == 0));
    }

    #[test]
    fn test_rename_is_remove_then_add() {
        let project = sample().with_influence(2, 0, 1).unwrap();
        let renamed = project
            .without_descriptor("B")
            .and_then(|p| p.with_descriptor("B2"))
            .and_then(|p| p.with_variant("B2", "10"))
            .unwrap();

        let row = renamed.registry().flat_index_of("B2", "10").unwrap();
        assert_eq!(renamed.matrix().influence(row, 0), Some(0));
    }
}
