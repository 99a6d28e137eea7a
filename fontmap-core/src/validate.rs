//! Cross-source validation (made by FontLab https://www.fontlab.com/)
//!
//! Compares a persisted [`FamilyMapping`] against the names the binaries
//! actually carry and the variants the catalog advertises.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mapping::{FamilyMapping, MappingStore};
use crate::variant::VariantKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    NotFound,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Invalid => "invalid",
            ValidationStatus::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub family: String,
    /// Observed in a binary but absent from the mapping.
    pub missing_names: BTreeSet<String>,
    /// Advertised by the catalog but never mapped to.
    pub unmapped_variants: BTreeSet<VariantKey>,
    /// Mapped to, yet missing from the file table.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dangling_variants: BTreeSet<VariantKey>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub low_confidence: BTreeSet<String>,
    /// Distinct names observed in the family's binaries.
    pub observed: usize,
    /// Observed names the mapping accounts for.
    pub mapped: usize,
}

impl ValidationResult {
    pub fn not_found(family: impl Into<String>, observed: &BTreeSet<String>) -> Self {
        Self {
            status: ValidationStatus::NotFound,
            family: family.into(),
            missing_names: observed.clone(),
            unmapped_variants: BTreeSet::new(),
            dangling_variants: BTreeSet::new(),
            low_confidence: BTreeSet::new(),
            observed: observed.len(),
            mapped: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }
}

/// Validate one mapping against the names observed in its binaries.
pub fn validate(mapping: &FamilyMapping, observed: &BTreeSet<String>) -> ValidationResult {
    let missing_names: BTreeSet<String> = observed
        .iter()
        .filter(|name| !mapping.post_script_names.contains_key(*name))
        .cloned()
        .collect();
    let unmapped_variants = mapping.unmapped_variants();
    let dangling_variants = mapping.dangling_variants();

    let status = if missing_names.is_empty()
        && unmapped_variants.is_empty()
        && dangling_variants.is_empty()
    {
        ValidationStatus::Valid
    } else {
        ValidationStatus::Invalid
    };

    ValidationResult {
        status,
        family: mapping.family.clone(),
        mapped: observed.len() - missing_names.len(),
        observed: observed.len(),
        missing_names,
        unmapped_variants,
        dangling_variants,
        low_confidence: mapping
            .low_confidence
            .iter()
            .filter(|name| mapping.post_script_names.contains_key(*name))
            .cloned()
            .collect(),
    }
}

/// Find the family's mapping by identity, then validate it.
pub fn validate_family(
    family: &str,
    store: &MappingStore,
    observed: &BTreeSet<String>,
) -> ValidationResult {
    match store.find(family) {
        Some(mapping) => validate(mapping, observed),
        None => ValidationResult::not_found(family, observed),
    }
}

/// Batch totals printed after every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub not_found: usize,
    pub observed: usize,
    pub mapped: usize,
}

impl ValidationSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ValidationResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add(result);
        }
        summary
    }

    pub fn add(&mut self, result: &ValidationResult) {
        self.total += 1;
        match result.status {
            ValidationStatus::Valid => self.valid += 1,
            ValidationStatus::Invalid => self.invalid += 1,
            ValidationStatus::NotFound => self.not_found += 1,
        }
        self.observed += result.observed;
        self.mapped += result.mapped;
    }

    /// Percentage of observed names that resolved; 0.0 when nothing was observed.
    pub fn resolution_rate(&self) -> f64 {
        if self.observed == 0 {
            return 0.0;
        }
        self.mapped as f64 / self.observed as f64 * 100.0
    }

    pub fn resolution_rate_display(&self) -> String {
        format!("{:.1}%", self.resolution_rate())
    }

    pub fn all_valid(&self) -> bool {
        self.invalid == 0 && self.not_found == 0
    }
}
