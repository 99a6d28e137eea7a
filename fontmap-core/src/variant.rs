//! Canonical variant keys (made by FontLab https://www.fontlab.com/)
//!
//! Catalogs index a family's files by keys such as `regular`, `italic`,
//! `700` or `700italic`. This module owns that vocabulary: resolving a
//! declared style/weight pair into a key, parsing keys back, and naming the
//! weights the way PostScript names spell them.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FamilyIssue;

/// The weights a variant key may carry.
pub const WEIGHTS: [u16; 9] = [100, 200, 300, 400, 500, 600, 700, 800, 900];

const WEIGHT_NAMES: [(u16, &str); 9] = [
    (100, "Thin"),
    (200, "ExtraLight"),
    (300, "Light"),
    (400, "Regular"),
    (500, "Medium"),
    (600, "SemiBold"),
    (700, "Bold"),
    (800, "ExtraBold"),
    (900, "Black"),
];

/// Declared style of a font file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

impl FontStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
        }
    }

    pub fn is_italic(self) -> bool {
        matches!(self, FontStyle::Italic)
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FontStyle {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "normal" => Ok(FontStyle::Normal),
            "italic" => Ok(FontStyle::Italic),
            other => Err(anyhow!("style must be normal or italic, got {other:?}")),
        }
    }
}

/// A catalog variant key: weight plus italic flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    weight: u16,
    italic: bool,
}

impl VariantKey {
    pub const REGULAR: VariantKey = VariantKey {
        weight: 400,
        italic: false,
    };
    pub const ITALIC: VariantKey = VariantKey {
        weight: 400,
        italic: true,
    };

    /// Build a key from a known-good weight. Weights outside [`WEIGHTS`] are rejected.
    pub fn new(weight: u16, style: FontStyle) -> Result<Self> {
        if !WEIGHTS.contains(&weight) {
            return Err(anyhow!("weight must be one of 100..900 in steps of 100, got {weight}"));
        }
        Ok(Self {
            weight,
            italic: style.is_italic(),
        })
    }

    pub fn weight(&self) -> u16 {
        self.weight
    }

    pub fn is_italic(&self) -> bool {
        self.italic
    }

    pub fn style(&self) -> FontStyle {
        if self.italic {
            FontStyle::Italic
        } else {
            FontStyle::Normal
        }
    }

    /// CSS `font-weight` / `font-style` pair for this key.
    pub fn css(&self) -> (String, &'static str) {
        (self.weight.to_string(), self.style().as_str())
    }

    /// Suffix a browser would expect after the family stem, e.g. `BoldItalic`.
    pub fn browser_suffix(&self) -> String {
        match (self.weight, self.italic) {
            (400, false) => "Regular".to_string(),
            (400, true) => "Italic".to_string(),
            (w, false) => weight_name(w).unwrap_or("Regular").to_string(),
            (w, true) => format!("{}Italic", weight_name(w).unwrap_or("")),
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.weight, self.italic) {
            (400, false) => f.write_str("regular"),
            (400, true) => f.write_str("italic"),
            (w, false) => write!(f, "{w}"),
            (w, true) => write!(f, "{w}italic"),
        }
    }
}

impl FromStr for VariantKey {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "regular" => return Ok(Self::REGULAR),
            "italic" => return Ok(Self::ITALIC),
            _ => {}
        }

        let (digits, style) = match raw.strip_suffix("italic") {
            Some(rest) => (rest, FontStyle::Italic),
            None => (raw, FontStyle::Normal),
        };

        // "400" and "400italic" are spelled regular/italic in the vocabulary.
        let weight: u16 = digits
            .parse()
            .map_err(|_| anyhow!("invalid variant key: {raw}"))?;
        if weight == 400 {
            return Err(anyhow!("invalid variant key: {raw}"));
        }
        Self::new(weight, style).map_err(|_| anyhow!("invalid variant key: {raw}"))
    }
}

impl Serialize for VariantKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VariantKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// PostScript spelling of a weight (`700` → `Bold`).
pub fn weight_name(weight: u16) -> Option<&'static str> {
    WEIGHT_NAMES
        .iter()
        .find(|(w, _)| *w == weight)
        .map(|(_, name)| *name)
}

/// Resolve a declared style/weight pair into its variant key.
///
/// The weight passes through untouched apart from `400`, which collapses to
/// the bare style name. No rounding happens: `450` is an error, not `regular`.
pub fn resolve(style: &str, weight: &str) -> std::result::Result<VariantKey, FamilyIssue> {
    resolve_indexed(style, weight, 1)
}

pub(crate) fn resolve_indexed(
    style: &str,
    weight: &str,
    index: usize,
) -> std::result::Result<VariantKey, FamilyIssue> {
    let style: FontStyle = style.parse().map_err(|_| FamilyIssue::InvalidStyle {
        style: style.to_string(),
        index,
    })?;
    let invalid_weight = || FamilyIssue::InvalidWeight {
        weight: weight.to_string(),
        index,
    };
    let numeric: u16 = weight.trim().parse().map_err(|_| invalid_weight())?;
    VariantKey::new(numeric, style).map_err(|_| invalid_weight())
}

/// Synthesize the `Stem-WeightStyle` name a browser would guess for `key`.
pub fn browser_style_name(stem: &str, key: VariantKey) -> String {
    format!("{stem}-{}", key.browser_suffix())
}
