//! PostScript name → variant key mapping (made by FontLab https://www.fontlab.com/)
//!
//! Embedded PostScript names, declared metadata and the catalog never share
//! an identifier space. The mapper bridges them with ordered rules:
//!
//! 1. static families: declared names map to their declaration, the rest to `regular`
//! 2. exact browser-style names synthesized from the declared stems
//! 3. longest-suffix-first decomposition of the observed name
//! 4. substring containment against catalog keys (low confidence)
//!
//! Anything none of these justify stays unresolved.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::metadata::FontDeclaration;
use crate::variant::{browser_style_name, FontStyle, VariantKey, WEIGHTS};

/// Suffixes stripped from declared names to recover the family stem.
const STEM_SUFFIXES: [&str; 4] = ["-Regular", "-Italic", "-Bold", "-Medium"];

/// How a name was bound to its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// The metadata declares this exact PostScript name.
    Declared,
    /// Single static font without a weight axis.
    Static,
    /// Equal to a synthesized `Stem-WeightStyle` name.
    BrowserStyle,
    /// Decomposed from a weight/style suffix.
    Suffix,
    /// Catalog numeral found inside the name; may be coincidental.
    Substring,
}

impl MatchSource {
    pub fn is_low_confidence(self) -> bool {
        matches!(self, MatchSource::Substring)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMatch {
    pub variant: VariantKey,
    pub source: MatchSource,
}

/// Result of mapping one set of observed names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMapping {
    pub matches: BTreeMap<String, NameMatch>,
    pub unresolved: BTreeSet<String>,
}

impl NameMapping {
    pub fn merge(&mut self, other: NameMapping) {
        for (name, hit) in other.matches {
            self.unresolved.remove(&name);
            self.matches.entry(name).or_insert(hit);
        }
        for name in other.unresolved {
            if !self.matches.contains_key(&name) {
                self.unresolved.insert(name);
            }
        }
    }
}

/// Inputs shared by every name observed in one font file.
#[derive(Debug, Clone, Copy)]
pub struct MappingContext<'a> {
    pub declarations: &'a [FontDeclaration],
    pub catalog: &'a CatalogEntry,
    /// Overall style of the file the names came from.
    pub style: FontStyle,
    pub has_weight_axis: bool,
}

/// Map observed PostScript names onto catalog variant keys.
///
/// Two different names may land on the same key; both are kept and
/// validation decides later.
pub fn map_postscript_names(observed: &BTreeSet<String>, ctx: &MappingContext<'_>) -> NameMapping {
    let mut out = NameMapping::default();

    let declared: BTreeMap<&str, VariantKey> = ctx
        .declarations
        .iter()
        .filter_map(|d| d.post_script_name.as_deref().map(|n| (n, d.variant())))
        .collect();

    if !ctx.has_weight_axis {
        for name in observed {
            let hit = match declared.get(name.as_str()) {
                Some(variant) => NameMatch {
                    variant: *variant,
                    source: MatchSource::Declared,
                },
                None => NameMatch {
                    variant: VariantKey::REGULAR,
                    source: MatchSource::Static,
                },
            };
            out.matches.insert(name.clone(), hit);
        }
        return out;
    }

    let synthesized = synthesized_names(ctx);

    for name in observed {
        match resolve_observed(name, &synthesized, ctx.catalog) {
            Some(hit) => {
                out.matches.insert(name.clone(), hit);
            }
            None => {
                out.unresolved.insert(name.clone());
            }
        }
    }

    out
}

fn resolve_observed(
    name: &str,
    synthesized: &BTreeMap<String, VariantKey>,
    catalog: &CatalogEntry,
) -> Option<NameMatch> {
    if let Some(variant) = synthesized.get(name) {
        return Some(NameMatch {
            variant: *variant,
            source: MatchSource::BrowserStyle,
        });
    }

    if let Some((variant, _)) = decompose(name) {
        if catalog.files.contains_key(&variant) {
            return Some(NameMatch {
                variant,
                source: MatchSource::Suffix,
            });
        }
    }

    substring_match(name, catalog).map(|variant| NameMatch {
        variant,
        source: MatchSource::Substring,
    })
}

/// Browser-style names for every catalog variant whose style agrees with the file.
fn synthesized_names(ctx: &MappingContext<'_>) -> BTreeMap<String, VariantKey> {
    let stems = declared_stems(ctx.declarations);
    let mut names = BTreeMap::new();

    for variant in &ctx.catalog.variants {
        if variant.is_italic() != ctx.style.is_italic() {
            continue;
        }
        for stem in &stems {
            names
                .entry(browser_style_name(stem, *variant))
                .or_insert(*variant);
        }
    }

    names
}

/// Family stems recovered from the declared base names, in declaration order.
pub fn declared_stems(declarations: &[FontDeclaration]) -> Vec<String> {
    let mut stems: Vec<String> = Vec::new();
    for decl in declarations {
        let base = decl
            .post_script_name
            .clone()
            .unwrap_or_else(|| file_base_name(&decl.filename));
        let stem = strip_stem_suffixes(&base);
        if !stem.is_empty() && !stems.contains(&stem) {
            stems.push(stem);
        }
    }
    stems
}

/// `Foo-Italic[wght].ttf` → `Foo-Italic`.
pub fn file_base_name(filename: &str) -> String {
    let without_ext = filename
        .rsplit_once('.')
        .map(|(base, _)| base)
        .unwrap_or(filename);
    let without_axes = without_ext
        .split_once('[')
        .map(|(base, _)| base)
        .unwrap_or(without_ext);
    without_axes.to_string()
}

pub fn strip_stem_suffixes(name: &str) -> String {
    let mut stem = name;
    // "Foo-Bold-Italic" style chains strip one piece per pass
    loop {
        let before = stem;
        for suffix in STEM_SUFFIXES {
            if let Some(rest) = stem.strip_suffix(suffix) {
                stem = rest;
            }
        }
        if stem == before {
            break;
        }
    }
    stem.to_string()
}

/// Weight/style suffix vocabulary, longest first.
fn suffix_vocabulary() -> &'static [(String, VariantKey)] {
    static VOCAB: OnceLock<Vec<(String, VariantKey)>> = OnceLock::new();
    VOCAB.get_or_init(build_suffix_vocabulary)
}

fn build_suffix_vocabulary() -> Vec<(String, VariantKey)> {
    let mut vocab = Vec::with_capacity(WEIGHTS.len() * 2);
    for weight in WEIGHTS {
        for style in [FontStyle::Normal, FontStyle::Italic] {
            if let Ok(key) = VariantKey::new(weight, style) {
                vocab.push((key.browser_suffix(), key));
            }
        }
    }
    // "RegularItalic" shows up in the wild for 400 italic
    vocab.push(("RegularItalic".to_string(), VariantKey::ITALIC));
    vocab.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
    vocab
}

/// Split a PostScript name into its variant key and stem.
///
/// Suffixes are tried longest first so `-ExtraBoldItalic` never falls
/// through to `-BoldItalic` or `-Bold`.
pub fn decompose(name: &str) -> Option<(VariantKey, String)> {
    for (suffix, key) in suffix_vocabulary() {
        if let Some(rest) = name.strip_suffix(suffix.as_str()) {
            let stem = rest.trim_end_matches('-');
            if stem.is_empty() {
                continue;
            }
            return Some((*key, stem.to_string()));
        }
    }
    None
}

/// Stem of an observed name, or the name itself when no suffix is recognised.
pub fn stem_of(name: &str) -> String {
    decompose(name)
        .map(|(_, stem)| stem)
        .unwrap_or_else(|| name.to_string())
}

fn substring_match(name: &str, catalog: &CatalogEntry) -> Option<VariantKey> {
    let italic = name.contains("Italic");
    catalog.variant_keys().into_iter().find(|key| {
        key.is_italic() == italic && name.contains(&key.weight().to_string())
    })
}
