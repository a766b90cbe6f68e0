//! Scenario generation.
//!
//! A scenario picks exactly one variant per descriptor. The generator walks
//! the Cartesian product of every descriptor's variant list lazily, one
//! scenario at a time, with the first descriptor varying slowest.
//!
//! Enumeration is exponential in the descriptor count. Use
//! [`scenario_count`] to estimate before enumerating and [`ensure_within`]
//! to enforce a cap.

use serde::{Deserialize, Serialize};

use crate::error::{CibError, Result};
use crate::registry::{Registry, VariantRef};

/// One variant choice per descriptor, stored as flat indices in descriptor
/// registration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scenario {
    choices: Vec<usize>,
}

impl Scenario {
    pub fn new(choices: Vec<usize>) -> Self {
        Self { choices }
    }

    /// Flat variant index chosen for each descriptor.
    pub fn choices(&self) -> &[usize] {
        &self.choices
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Resolve the flat indices to `(descriptor, variant)` names.
    pub fn resolve(&self, registry: &Registry) -> Vec<VariantRef> {
        self.choices
            .iter()
            .filter_map(|&flat| registry.variant_at(flat))
            .collect()
    }
}

/// Lazy iterator over every scenario of a registry.
///
/// Owns a copy of the list lengths, so it holds no borrow on the registry
/// and each call to [`generate_scenarios`] starts fresh.
#[derive(Debug, Clone)]
pub struct ScenarioIter {
    offsets: Vec<usize>,
    lens: Vec<usize>,
    positions: Vec<usize>,
    remaining: u128,
}

impl Iterator for ScenarioIter {
    type Item = Scenario;

    fn next(&mut self) -> Option<Scenario> {
        if self.remaining == 0 {
            return None;
        }

        let choices = self
            .offsets
            .iter()
            .zip(&self.positions)
            .map(|(offset, position)| offset + position)
            .collect();
        self.remaining -= 1;

        // Odometer step: the last descriptor turns fastest
        for k in (0..self.positions.len()).rev() {
            self.positions[k] += 1;
            if self.positions[k] < self.lens[k] {
                break;
            }
            self.positions[k] = 0;
        }

        Some(Scenario::new(choices))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Lazily enumerate all scenarios of the registry.
///
/// Fails with [`CibError::EmptyRegistry`] when no descriptor exists and with
/// [`CibError::NoVariants`] when a descriptor has no variants, rather than
/// yielding an empty sequence.
pub fn generate_scenarios(registry: &Registry) -> Result<ScenarioIter> {
    let remaining = scenario_count(registry)?;
    let lens: Vec<usize> = registry
        .descriptors()
        .iter()
        .map(|d| d.variants.len())
        .collect();

    Ok(ScenarioIter {
        offsets: registry.offsets(),
        positions: vec![0; lens.len()],
        lens,
        remaining,
    })
}

/// Number of scenarios the registry would generate.
///
/// Saturates at `u128::MAX` instead of overflowing.
pub fn scenario_count(registry: &Registry) -> Result<u128> {
    if registry.is_empty() {
        return Err(CibError::EmptyRegistry);
    }
    let mut count: u128 = 1;
    for descriptor in registry.descriptors() {
        if descriptor.variants.is_empty() {
            return Err(CibError::NoVariants(descriptor.name.clone()));
        }
        count = count.saturating_mul(descriptor.variants.len() as u128);
    }
    Ok(count)
}

/// Check the scenario count against a cap before enumerating.
pub fn ensure_within(registry: &Registry, max: u64) -> Result<u128> {
    let count = scenario_count(registry)?;
    if count > u128::from(max) {
        return Err(CibError::ScenarioCountExceeded { count, max });
    }
    Ok(count)
}
