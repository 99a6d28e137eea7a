//! Remote catalog records (made by FontLab https://www.fontlab.com/)
//!
//! The catalog is a `webfonts.json`-style listing. Each family indexes its
//! files by [`VariantKey`]; this module loads it, drops keys outside the
//! vocabulary, and answers lookups by normalized family identity.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tags::is_weight_axis;
use crate::variant::VariantKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAxis {
    pub tag: String,
    pub start: f32,
    pub end: f32,
}

/// One family as the catalog describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub family: String,
    pub variants: Vec<VariantKey>,
    pub files: BTreeMap<VariantKey, String>,
    #[serde(default)]
    pub subsets: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub axes: Vec<CatalogAxis>,
}

impl CatalogEntry {
    pub fn has_weight_axis(&self) -> bool {
        self.axes.iter().any(|axis| is_weight_axis(&axis.tag))
    }

    /// Every variant the catalog advertises, from both `variants` and `files`.
    pub fn variant_keys(&self) -> Vec<VariantKey> {
        let mut keys = self.variants.clone();
        for key in self.files.keys() {
            if !keys.contains(key) {
                keys.push(*key);
            }
        }
        keys
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    items: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    family: String,
    #[serde(default)]
    variants: Vec<String>,
    #[serde(default)]
    files: BTreeMap<String, String>,
    #[serde(default)]
    subsets: Vec<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    axes: Vec<CatalogAxis>,
}

impl RawEntry {
    fn into_entry(self) -> CatalogEntry {
        let family = self.family;
        let mut variants = Vec::with_capacity(self.variants.len());
        for raw in &self.variants {
            match raw.parse::<VariantKey>() {
                Ok(key) => variants.push(key),
                Err(err) => warn!(family = %family, variant = %raw, "skipping catalog variant: {err}"),
            }
        }

        let mut files = BTreeMap::new();
        for (raw, url) in self.files {
            match raw.parse::<VariantKey>() {
                Ok(key) => {
                    files.insert(key, url);
                }
                Err(err) => warn!(family = %family, variant = %raw, "skipping catalog file: {err}"),
            }
        }

        CatalogEntry {
            family,
            variants,
            files,
            subsets: self.subsets,
            category: self.category,
            axes: self.axes,
        }
    }
}

/// All catalog families, keyed by [`family_identity`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing catalog {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawCatalog = serde_json::from_str(text)?;
        Ok(Self::from_entries(raw.items.into_iter().map(RawEntry::into_entry)))
    }

    /// Families sharing an identity collapse into the last one listed.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut by_identity = BTreeMap::new();
        for entry in entries {
            let identity = family_identity(&entry.family);
            if let Some(previous) = by_identity.insert(identity.clone(), entry) {
                warn!(
                    identity = %identity,
                    replaced = %previous.family,
                    "catalog lists the same family twice; keeping the later entry"
                );
            }
        }
        Self {
            entries: by_identity,
        }
    }

    /// Exact match after normalization; `"Noto Sans Mono"` never finds `"Noto Sans"`.
    pub fn lookup(&self, family: &str) -> Option<&CatalogEntry> {
        self.entries.get(&family_identity(family))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Case-insensitive substring search over family, category and variant keys.
    pub fn search(&self, query: &str) -> Vec<&CatalogEntry> {
        let needle = query.trim().to_lowercase();
        self.entries
            .values()
            .filter(|entry| {
                needle.is_empty()
                    || entry.family.to_lowercase().contains(&needle)
                    || entry.category.to_lowercase().contains(&needle)
                    || entry
                        .variants
                        .iter()
                        .any(|v| v.to_string().contains(&needle))
            })
            .collect()
    }
}

/// Normalized family identity: lower-case, alphanumerics only.
pub fn family_identity(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether two spellings name the same family.
pub fn same_family(a: &str, b: &str) -> bool {
    family_identity(a) == family_identity(b)
}

/// URL slug for a family (`"Open Sans"` → `open-sans`).
pub fn family_to_id(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
