//! Persisted family mappings (made by FontLab https://www.fontlab.com/)

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::{same_family, CatalogEntry};
use crate::output::write_atomic;
use crate::psname::NameMapping;
use crate::variant::VariantKey;

/// PostScript names of one family bound to catalog variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMapping {
    pub family: String,
    pub post_script_names: BTreeMap<String, VariantKey>,
    pub files: BTreeMap<VariantKey, String>,
    /// Names bound only by substring containment.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub low_confidence: BTreeSet<String>,
}

impl FamilyMapping {
    /// Empty mapping carrying the catalog's file table.
    pub fn from_catalog(entry: &CatalogEntry) -> Self {
        Self {
            family: entry.family.clone(),
            post_script_names: BTreeMap::new(),
            files: entry.files.clone(),
            low_confidence: BTreeSet::new(),
        }
    }

    pub fn apply(&mut self, mapping: &NameMapping) {
        for (name, hit) in &mapping.matches {
            self.post_script_names.insert(name.clone(), hit.variant);
            if hit.source.is_low_confidence() {
                self.low_confidence.insert(name.clone());
            } else {
                self.low_confidence.remove(name);
            }
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, variant: VariantKey) {
        self.post_script_names.insert(name.into(), variant);
    }

    pub fn is_empty(&self) -> bool {
        self.post_script_names.is_empty()
    }

    /// Catalog variants nothing maps to yet, in key order.
    pub fn unmapped_variants(&self) -> BTreeSet<VariantKey> {
        let mapped: BTreeSet<VariantKey> = self.post_script_names.values().copied().collect();
        self.files
            .keys()
            .filter(|key| !mapped.contains(key))
            .copied()
            .collect()
    }

    /// Mapped variants the file table has no entry for.
    pub fn dangling_variants(&self) -> BTreeSet<VariantKey> {
        self.post_script_names
            .values()
            .filter(|key| !self.files.contains_key(key))
            .copied()
            .collect()
    }
}

/// Every family mapping of a run, keyed by family name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingStore {
    families: BTreeMap<String, FamilyMapping>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading mapping {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing mapping {}", path.display()))
    }

    /// Replace the artifact at `path` in one step.
    ///
    /// The JSON goes to a temporary file next to `path` first, so readers
    /// never see a half-written mapping.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        write_atomic(path, json.as_bytes())
            .with_context(|| format!("saving mapping {}", path.display()))
    }

    pub fn insert(&mut self, mapping: FamilyMapping) {
        self.families.insert(mapping.family.clone(), mapping);
    }

    pub fn get(&self, family: &str) -> Option<&FamilyMapping> {
        self.families.get(family)
    }

    /// Lookup by normalized identity rather than exact name.
    pub fn find(&self, family: &str) -> Option<&FamilyMapping> {
        self.families
            .values()
            .find(|m| same_family(&m.family, family))
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FamilyMapping> {
        self.families.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FamilyMapping> {
        self.families.values_mut()
    }
}
