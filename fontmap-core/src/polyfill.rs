//! Mapping repair (made by FontLab https://www.fontlab.com/)
//!
//! Three strategies run in order. The first two only bind when the choice is
//! unambiguous; the third adds the synthesized browser-style name of every
//! catalog variant that is not yet a key. When that name already belongs to
//! another variant, an unused `Stem-<key>` name covers the variant instead.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::mapping::FamilyMapping;
use crate::psname::stem_of;
use crate::variant::{browser_style_name, VariantKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolyfillStrategy {
    /// Empty mapping, one observed name, one catalog variant.
    EmptySingleton,
    /// One unused observed name left for one unmapped variant.
    ResidualSingleton,
    /// Synthesized `Stem-WeightStyle` name for a catalog variant.
    BrowserStyle,
}

impl fmt::Display for PolyfillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolyfillStrategy::EmptySingleton => "empty-singleton",
            PolyfillStrategy::ResidualSingleton => "residual-singleton",
            PolyfillStrategy::BrowserStyle => "browser-style",
        })
    }
}

/// One binding added by [`polyfill`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyfillChange {
    pub family: String,
    pub name: String,
    pub variant: VariantKey,
    pub strategy: PolyfillStrategy,
}

impl fmt::Display for PolyfillChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({})",
            self.family, self.name, self.variant, self.strategy
        )
    }
}

/// Repair `mapping` in place and return the bindings that were added.
///
/// The strategies repeat until a pass adds nothing, so calling this again on
/// its own output is a no-op. Afterwards every catalog variant is mapped.
pub fn polyfill(mapping: &mut FamilyMapping, observed: &BTreeSet<String>) -> Vec<PolyfillChange> {
    let mut changes = Vec::new();
    loop {
        let before = changes.len();
        empty_singleton(mapping, observed, &mut changes);
        residual_singleton(mapping, observed, &mut changes);
        browser_style(mapping, observed, &mut changes);
        if changes.len() == before {
            break;
        }
    }
    changes
}

fn empty_singleton(
    mapping: &mut FamilyMapping,
    observed: &BTreeSet<String>,
    changes: &mut Vec<PolyfillChange>,
) {
    let unmapped = mapping.unmapped_variants();
    if mapping.is_empty() && observed.len() == 1 && unmapped.len() == 1 {
        if let (Some(name), Some(variant)) = (observed.first(), unmapped.first()) {
            bind(mapping, name, *variant, PolyfillStrategy::EmptySingleton, changes);
        }
    }
}

fn residual_singleton(
    mapping: &mut FamilyMapping,
    observed: &BTreeSet<String>,
    changes: &mut Vec<PolyfillChange>,
) {
    let unmapped = mapping.unmapped_variants();
    let unused: Vec<&String> = observed
        .iter()
        .filter(|name| !mapping.post_script_names.contains_key(*name))
        .collect();
    if unmapped.len() == 1 && unused.len() == 1 {
        if let Some(variant) = unmapped.first() {
            bind(mapping, unused[0], *variant, PolyfillStrategy::ResidualSingleton, changes);
        }
    }
}

fn browser_style(
    mapping: &mut FamilyMapping,
    observed: &BTreeSet<String>,
    changes: &mut Vec<PolyfillChange>,
) {
    if mapping.files.is_empty() {
        return;
    }
    let stem = polyfill_stem(mapping, observed);
    let variants: Vec<VariantKey> = mapping.files.keys().copied().collect();
    for variant in variants {
        let name = browser_style_name(&stem, variant);
        let Some(existing) = mapping.post_script_names.get(&name).copied() else {
            bind(mapping, &name, variant, PolyfillStrategy::BrowserStyle, changes);
            continue;
        };
        if existing == variant || !mapping.unmapped_variants().contains(&variant) {
            continue;
        }
        let fallback = free_name(mapping, &stem, variant);
        warn!(
            family = %mapping.family,
            name = %name,
            bound = %existing,
            wanted = %variant,
            fallback = %fallback,
            "browser-style name already bound elsewhere"
        );
        bind(mapping, &fallback, variant, PolyfillStrategy::BrowserStyle, changes);
    }
}

/// `Stem-<key>`, then `Stem-<key>-2`, `Stem-<key>-3`, ... until one is unused.
fn free_name(mapping: &FamilyMapping, stem: &str, variant: VariantKey) -> String {
    let base = format!("{stem}-{variant}");
    let mut name = base.clone();
    let mut n = 2;
    while mapping.post_script_names.contains_key(&name) {
        name = format!("{base}-{n}");
        n += 1;
    }
    name
}

fn bind(
    mapping: &mut FamilyMapping,
    name: &str,
    variant: VariantKey,
    strategy: PolyfillStrategy,
    changes: &mut Vec<PolyfillChange>,
) {
    debug!(family = %mapping.family, name, %variant, %strategy, "polyfill");
    mapping.bind(name, variant);
    mapping.low_confidence.remove(name);
    changes.push(PolyfillChange {
        family: mapping.family.clone(),
        name: name.to_string(),
        variant,
        strategy,
    });
}

/// Most frequent stem across observed and mapped names.
///
/// Ties go to the lexicographically smallest stem. Without any names the
/// family name stripped to alphanumerics stands in.
pub fn polyfill_stem(mapping: &FamilyMapping, observed: &BTreeSet<String>) -> String {
    let names: BTreeSet<&String> = observed
        .iter()
        .chain(mapping.post_script_names.keys())
        .collect();

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for name in names {
        *counts.entry(stem_of(name)).or_default() += 1;
    }

    // equal counts rank the smaller stem higher
    counts
        .into_iter()
        .max_by(|(a_stem, a), (b_stem, b)| a.cmp(b).then_with(|| b_stem.cmp(a_stem)))
        .map(|(stem, _)| stem)
        .unwrap_or_else(|| {
            mapping
                .family
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect()
        })
}
