//! Per-family issue taxonomy (made by FontLab https://www.fontlab.com/)

use thiserror::Error;

/// Something wrong with one family. Never aborts a batch on its own.
///
/// The `Display` text is what ends up in the invalid-family list, so keep it
/// short and stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Error)]
pub enum FamilyIssue {
    #[error("METADATA.pb not found")]
    MetadataNotFound,

    #[error("Failed to read METADATA.pb: {reason}")]
    MetadataUnreadable { reason: String },

    #[error("No font data found in METADATA.pb")]
    NoFontDeclarations,

    #[error("Family name not found in METADATA.pb")]
    FamilyNameMissing,

    #[error("Local file not found: {filename}")]
    LocalFileMissing { filename: String },

    #[error("Family not found in catalog")]
    FamilyNotInCatalog,

    #[error("Variant {variant} not found in catalog for {filename}")]
    VariantNotInCatalog { variant: String, filename: String },

    #[error("Invalid style \"{style}\" in font {index}. Only \"normal\" or \"italic\" are allowed")]
    InvalidStyle { style: String, index: usize },

    #[error("Invalid weight \"{weight}\" in font {index}")]
    InvalidWeight { weight: String, index: usize },

    #[error("Could not decode name ID {name_id} in {filename}")]
    NameDecodeFailure { filename: String, name_id: u16 },
}

impl FamilyIssue {
    /// Decode failures drop a single name; every other issue excludes the family.
    pub fn excludes_family(&self) -> bool {
        !matches!(self, FamilyIssue::NameDecodeFailure { .. })
    }
}
