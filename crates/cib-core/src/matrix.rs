//! Cross-impact matrix.
//!
//! A dense `N x N` table of directional influence scores keyed by flat
//! variant index. `M[i][j]` is how strongly variant `i` promotes (positive)
//! or inhibits (negative) variant `j`.
//!
//! ## Applicability
//!
//! Variants of the same descriptor are mutually exclusive alternatives and
//! never influence each other. Those cells (the diagonal included) are not
//! applicable: they read as `None`, reject writes, and always hold zero in
//! the backing store.

use std::collections::HashMap;

use crate::error::{CibError, Result};
use crate::registry::{Registry, VariantRef};

/// Strongest inhibiting score.
pub const MIN_INFLUENCE: i32 = -3;

/// Strongest promoting score.
pub const MAX_INFLUENCE: i32 = 3;

/// Dense cross-impact matrix aligned to a registry's flat ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactMatrix {
    dim: usize,
    owners: Vec<usize>,
    cells: Vec<i8>,
}

impl ImpactMatrix {
    /// An all-zero matrix for the registry's current variants.
    pub fn for_registry(registry: &Registry) -> Self {
        let owners = registry.owners();
        let dim = owners.len();
        Self {
            dim,
            owners,
            cells: vec![0; dim * dim],
        }
    }

    /// Rebuild for `registry`, carrying values over from `previous`.
    ///
    /// Cells are matched by variant identity (descriptor and variant name),
    /// not raw index, so inserting or removing a variant earlier in the
    /// ordering never shifts a value onto the wrong pair. Pairs with no
    /// counterpart in the previous registry start at zero.
    pub fn rebuild(previous_registry: &Registry, previous: &ImpactMatrix, registry: &Registry) -> Self {
        let mut rebuilt = Self::for_registry(registry);

        let old_index: HashMap<VariantRef, usize> = previous_registry
            .flattened()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i < previous.dim)
            .map(|(i, r)| (r, i))
            .collect();

        let carried: Vec<Option<usize>> = registry
            .flattened()
            .iter()
            .map(|r| old_index.get(r).copied())
            .collect();

        for (i, old_i) in carried.iter().enumerate() {
            let Some(old_i) = *old_i else { continue };
            for (j, old_j) in carried.iter().enumerate() {
                let Some(old_j) = *old_j else { continue };
                if rebuilt.is_applicable(i, j) && previous.is_applicable(old_i, old_j) {
                    rebuilt.cells[i * rebuilt.dim + j] = previous.cells[old_i * previous.dim + old_j];
                }
            }
        }

        rebuilt
    }

    /// Matrix dimension (total variant count).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Whether `i` may influence `j` (different descriptors, both in range).
    pub fn is_applicable(&self, i: usize, j: usize) -> bool {
        i < self.dim && j < self.dim && self.owners[i] != self.owners[j]
    }

    /// Influence of `i` on `j`, or `None` when the cell is not applicable.
    pub fn influence(&self, i: usize, j: usize) -> Option<i8> {
        self.is_applicable(i, j).then(|| self.cells[i * self.dim + j])
    }

    /// Store a directional influence score.
    pub fn set_influence(&mut self, i: usize, j: usize, value: i32) -> Result<()> {
        if i >= self.dim || j >= self.dim {
            return Err(CibError::OutOfRange(format!(
                "cell ({i}, {j}) is outside a {0}x{0} matrix",
                self.dim
            )));
        }
        if i == j {
            return Err(CibError::OutOfRange(format!(
                "cell ({i}, {j}) is on the diagonal"
            )));
        }
        if self.owners[i] == self.owners[j] {
            return Err(CibError::SameDescriptor { row: i, col: j });
        }
        if !(MIN_INFLUENCE..=MAX_INFLUENCE).contains(&value) {
            return Err(CibError::OutOfRange(format!(
                "influence {value} is outside [{MIN_INFLUENCE}, {MAX_INFLUENCE}]"
            )));
        }
        self.cells[i * self.dim + j] = value as i8;
        Ok(())
    }

    /// Combined mutual influence `M[i][j] + M[j][i]`.
    ///
    /// Symmetric by construction. Not-applicable pairs sum to zero.
    /// Panics if either index is outside the matrix.
    pub fn influence_sum(&self, i: usize, j: usize) -> i32 {
        i32::from(self.cells[i * self.dim + j]) + i32::from(self.cells[j * self.dim + i])
    }

    /// Sum of a variant's full row: its total influence on every other variant.
    pub fn row_sum(&self, i: usize) -> i32 {
        self.cells[i * self.dim..(i + 1) * self.dim]
            .iter()
            .map(|&v| i32::from(v))
            .sum()
    }

    /// Row-major copy, not-applicable cells written as zero.
    pub fn to_rows(&self) -> Vec<Vec<i32>> {
        self.cells
            .chunks(self.dim.max(1))
            .take(self.dim)
            .map(|row| row.iter().map(|&v| i32::from(v)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(layout: &[(&str, &[&str])]) -> Registry {
        let mut registry = Registry::new();
        for (name, variants) in layout {
            registry.add_descriptor(*name).unwrap();
            for v in *variants {
                registry.add_variant(name, *v).unwrap();
            }
        }
        registry
    }

    #[test]
    fn test_same_descriptor_cells_not_applicable() {
        let reg = registry(&[("A", &["1", "2"]), ("B", &["x"])]);
        let mut matrix = ImpactMatrix::for_registry(&reg);

        assert_eq!(matrix.dim(), 3);
        assert_eq!(matrix.influence(0, 1), None);
        assert_eq!(matrix.influence(1, 1), None);
        assert_eq!(matrix.influence(0, 2), Some(0));

        assert!(matches!(
            matrix.set_influence(0, 1, 2),
            Err(CibError::SameDescriptor { row: 0, col: 1 })
        ));
        assert!(matches!(
            matrix.set_influence(2, 2, 1),
            Err(CibError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_set_influence_range() {
        let reg = registry(&[("A", &["1"]), ("B", &["x"])]);
        let mut matrix = ImpactMatrix::for_registry(&reg);

        matrix.set_influence(0, 1, -3).unwrap();
        matrix.set_influence(1, 0, 3).unwrap();
        assert!(matches!(matrix.set_influence(0, 1, 4), Err(CibError::OutOfRange(_))));
        assert!(matches!(matrix.set_influence(0, 1, -4), Err(CibError::OutOfRange(_))));
        assert!(matches!(matrix.set_influence(0, 7, 1), Err(CibError::OutOfRange(_))));
        assert_eq!(matrix.influence(0, 1), Some(-3));
    }

    #[test]
    fn test_influence_sum_is_symmetric() {
        let reg = registry(&[("A", &["1", "2"]), ("B", &["x", "y"]), ("C", &["p"])]);
        let mut matrix = ImpactMatrix::for_registry(&reg);
        matrix.set_influence(0, 2, 2).unwrap();
        matrix.set_influence(2, 0, -1).unwrap();
        matrix.set_influence(1, 4, 3).unwrap();
        matrix.set_influence(3, 4, -2).unwrap();

        for i in 0..matrix.dim() {
            for j in 0..matrix.dim() {
                assert_eq!(matrix.influence_sum(i, j), matrix.influence_sum(j, i));
            }
        }
        assert_eq!(matrix.influence_sum(0, 2), 1);
    }

    #[test]
    fn test_rebuild_preserves_values_by_identity() {
        let before = registry(&[("A", &["1", "2"]), ("B", &["x", "y"])]);
        let mut matrix = ImpactMatrix::for_registry(&before);
        // A:2 -> B:y
        matrix.set_influence(1, 3, 2).unwrap();
        // B:x -> A:1
        matrix.set_influence(2, 0, -1).unwrap();

        // Insert a variant at the front of A, shifting every flat index
        let after = registry(&[("A", &["0", "1", "2"]), ("B", &["x", "y"])]);
        let rebuilt = ImpactMatrix::rebuild(&before, &matrix, &after);

        let a2 = after.flat_index_of("A", "2").unwrap();
        let a1 = after.flat_index_of("A", "1").unwrap();
        let bx = after.flat_index_of("B", "x").unwrap();
        let by = after.flat_index_of("B", "y").unwrap();
        assert_eq!(rebuilt.influence(a2, by), Some(2));
        assert_eq!(rebuilt.influence(bx, a1), Some(-1));

        // The new variant starts at zero
        let a0 = after.flat_index_of("A", "0").unwrap();
        assert_eq!(rebuilt.influence(a0, by), Some(0));
        assert_eq!(rebuilt.influence(by, a0), Some(0));
    }

    #[test]
    fn test_rebuild_drops_removed_variants() {
        let before = registry(&[("A", &["1", "2"]), ("B", &["x"])]);
        let mut matrix = ImpactMatrix::for_registry(&before);
        matrix.set_influence(0, 2, 3).unwrap();
        matrix.set_influence(1, 2, -2).unwrap();

        let after = registry(&[("A", &["2"]), ("B", &["x"])]);
        let rebuilt = ImpactMatrix::rebuild(&before, &matrix, &after);
        assert_eq!(rebuilt.to_rows(), vec![vec![0, -2], vec![0, 0]]);
    }

    #[test]
    fn test_row_sum() {
        let reg = registry(&[("A", &["1"]), ("B", &["x", "y"])]);
        let mut matrix = ImpactMatrix::for_registry(&reg);
        matrix.set_influence(0, 1, 2).unwrap();
        matrix.set_influence(0, 2, -3).unwrap();
        assert_eq!(matrix.row_sum(0), -1);
        assert_eq!(matrix.row_sum(1), 0);
    }

    #[test]
    fn test_empty_matrix_rows() {
        let matrix = ImpactMatrix::for_registry(&Registry::new());
        assert_eq!(matrix.dim(), 0);
        assert!(matrix.to_rows().is_empty());
    }
}
