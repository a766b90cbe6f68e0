//! Descriptor/variant registry.
//!
//! Descriptors are kept in registration order and each owns an ordered list
//! of variant names. The registry assigns every variant a flat index: its
//! position in the concatenation of all variant lists in descriptor order.
//! The cross-impact matrix is keyed by these indices.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{CibError, Result};

/// A dimension of the scenario space and its mutually exclusive variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Descriptor {
    /// Unique, non-empty name
    pub name: String,

    /// Variant names, unique within this descriptor
    pub variants: Vec<String>,
}

impl Descriptor {
    fn new(name: String) -> Self {
        Self {
            name,
            variants: Vec::new(),
        }
    }

    fn position_of(&self, variant: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == variant)
    }
}

/// Identifies one variant choice by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantRef {
    pub descriptor: String,
    pub variant: String,
}

impl VariantRef {
    pub fn new(descriptor: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            variant: variant.into(),
        }
    }
}

impl std::fmt::Display for VariantRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.descriptor, self.variant)
    }
}

/// Ordered set of descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    descriptors: Vec<Descriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptor(&self, name: &str) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Registration position of a descriptor.
    pub fn descriptor_position(&self, name: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.name == name)
    }

    /// Total variant count across all descriptors (the matrix dimension).
    pub fn variant_count(&self) -> usize {
        self.descriptors.iter().map(|d| d.variants.len()).sum()
    }

    /// Append a descriptor with an empty variant list.
    pub fn add_descriptor(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() || self.descriptor(&name).is_some() {
            return Err(CibError::DuplicateDescriptor(name));
        }
        self.descriptors.push(Descriptor::new(name));
        Ok(())
    }

    /// Remove a descriptor and all of its variants.
    pub fn remove_descriptor(&mut self, name: &str) -> Result<Descriptor> {
        let position = self
            .descriptor_position(name)
            .ok_or_else(|| CibError::UnknownDescriptor(name.to_string()))?;
        Ok(self.descriptors.remove(position))
    }

    /// Append a variant to an existing descriptor.
    pub fn add_variant(&mut self, descriptor: &str, variant: impl Into<String>) -> Result<()> {
        let variant = variant.into();
        let entry = self.descriptor_mut(descriptor)?;
        if variant.is_empty() || entry.position_of(&variant).is_some() {
            return Err(CibError::DuplicateVariant {
                descriptor: descriptor.to_string(),
                variant,
            });
        }
        entry.variants.push(variant);
        Ok(())
    }

    /// Remove one variant from a descriptor.
    pub fn remove_variant(&mut self, descriptor: &str, variant: &str) -> Result<()> {
        let entry = self.descriptor_mut(descriptor)?;
        let position = entry.position_of(variant).ok_or_else(|| CibError::NotFound {
            descriptor: descriptor.to_string(),
            variant: variant.to_string(),
        })?;
        entry.variants.remove(position);
        Ok(())
    }

    /// Replace a descriptor's variants with `count` evenly spaced numbers.
    ///
    /// Values run from `min` to `max` inclusive and are formatted with two
    /// decimals. A single variant is always `min`.
    pub fn auto_generate_variants(
        &mut self,
        descriptor: &str,
        min: f64,
        max: f64,
        count: usize,
    ) -> Result<()> {
        let generated = spaced_values(min, max, count)?;
        let entry = self.descriptor_mut(descriptor)?;
        entry.variants = generated;
        Ok(())
    }

    /// Position of a variant in the flattened ordering.
    pub fn flat_index_of(&self, descriptor: &str, variant: &str) -> Result<usize> {
        let mut offset = 0;
        for entry in &self.descriptors {
            if entry.name == descriptor {
                return entry
                    .position_of(variant)
                    .map(|p| offset + p)
                    .ok_or_else(|| not_found(descriptor, variant));
            }
            offset += entry.variants.len();
        }
        Err(not_found(descriptor, variant))
    }

    /// Descriptor position that owns each flat index.
    pub fn owners(&self) -> Vec<usize> {
        self.descriptors
            .iter()
            .enumerate()
            .flat_map(|(d, entry)| std::iter::repeat(d).take(entry.variants.len()))
            .collect()
    }

    /// First flat index of each descriptor.
    pub fn offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.descriptors.len());
        let mut running = 0;
        for entry in &self.descriptors {
            offsets.push(running);
            running += entry.variants.len();
        }
        offsets
    }

    /// Every variant in flat-index order.
    pub fn flattened(&self) -> Vec<VariantRef> {
        self.descriptors
            .iter()
            .flat_map(|d| d.variants.iter().map(|v| VariantRef::new(&d.name, v)))
            .collect()
    }

    /// Resolve a flat index back to its descriptor and variant names.
    pub fn variant_at(&self, flat: usize) -> Option<VariantRef> {
        let mut remaining = flat;
        for entry in &self.descriptors {
            if remaining < entry.variants.len() {
                return Some(VariantRef::new(&entry.name, &entry.variants[remaining]));
            }
            remaining -= entry.variants.len();
        }
        None
    }

    /// Descriptor that owns a flat index.
    pub fn descriptor_of(&self, flat: usize) -> Option<&Descriptor> {
        let mut remaining = flat;
        for entry in &self.descriptors {
            if remaining < entry.variants.len() {
                return Some(entry);
            }
            remaining -= entry.variants.len();
        }
        None
    }

    fn descriptor_mut(&mut self, name: &str) -> Result<&mut Descriptor> {
        self.descriptors
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| CibError::UnknownDescriptor(name.to_string()))
    }
}

fn not_found(descriptor: &str, variant: &str) -> CibError {
    CibError::NotFound {
        descriptor: descriptor.to_string(),
        variant: variant.to_string(),
    }
}

/// Parse a user-supplied range bound for [`Registry::auto_generate_variants`].
pub fn parse_bound(raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CibError::InvalidRange(format!("{raw:?} is not a number")))?;
    if !value.is_finite() {
        return Err(CibError::InvalidRange(format!("{raw:?} is not finite")));
    }
    Ok(value)
}

fn spaced_values(min: f64, max: f64, count: usize) -> Result<Vec<String>> {
    if count < 1 {
        return Err(CibError::InvalidRange("count must be at least 1".to_string()));
    }
    if !min.is_finite() || !max.is_finite() {
        return Err(CibError::InvalidRange(format!(
            "bounds must be finite numbers (min {min}, max {max})"
        )));
    }
    if count == 1 {
        return Ok(vec![format_value(min)]);
    }

    let step = (max - min) / (count - 1) as f64;
    let values: Vec<String> = (0..count)
        .map(|i| format_value(min + i as f64 * step))
        .collect();

    // Two-decimal formatting can collapse close values into one name.
    let mut seen = HashSet::with_capacity(values.len());
    for value in &values {
        if !seen.insert(value.as_str()) {
            return Err(CibError::InvalidRange(format!(
                "range {min}..={max} with {count} steps repeats variant {value}"
            )));
        }
    }
    Ok(values)
}

fn format_value(value: f64) -> String {
    let formatted = format!("{value:.2}");
    if formatted == "-0.00" {
        "0.00".to_string()
    } else {
        formatted
    }
}
