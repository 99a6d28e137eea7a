//! Embedded PostScript names (made by FontLab https://www.fontlab.com/)
//!
//! Reads the names a font binary carries about itself: nameID 6 (or the
//! nameID 25 variations prefix when a variable font lacks one) and the
//! PostScript names of named instances. Raw name strings go through an ordered decoder chain so a
//! mislabelled record still yields its name when any decoding makes sense.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::FamilyIssue;
use crate::metadata::FontDeclaration;
use crate::tags::is_weight_axis;
use crate::variant::FontStyle;

/// Encoding that produced a decoded name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameEncoding {
    Utf16Be,
    Ascii,
    Latin1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    pub text: String,
    pub encoding: NameEncoding,
}

type Decoder = fn(&[u8]) -> Option<String>;
type Validator = fn(&str) -> bool;

/// Tried in order; the first decoder whose output validates wins.
const DECODERS: [(NameEncoding, Decoder, Validator); 3] = [
    (NameEncoding::Utf16Be, decode_utf16be, plausible_name),
    (NameEncoding::Ascii, decode_ascii, printable_ascii),
    (NameEncoding::Latin1, decode_latin1, plausible_name),
];

/// Decode raw name-table bytes, or `None` when no decoder yields a sane name.
pub fn decode_name(bytes: &[u8]) -> Option<DecodedName> {
    DECODERS.iter().find_map(|(encoding, decode, valid)| {
        decode(bytes)
            .map(|text| text.trim().to_string())
            .filter(|text| valid(text))
            .map(|text| DecodedName {
                text,
                encoding: *encoding,
            })
    })
}

fn decode_utf16be(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return None;
    }
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .ok()
}

fn decode_ascii(bytes: &[u8]) -> Option<String> {
    if bytes.is_ascii() {
        Some(bytes.iter().map(|b| *b as char).collect())
    } else {
        None
    }
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|b| *b as char).collect())
}

fn printable_ascii(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_graphic() || c == ' ')
}

/// Non-empty, no control characters, nothing past the Latin/Greek/Cyrillic
/// blocks. ASCII bytes read as UTF-16 land in CJK and fail here.
fn plausible_name(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| !c.is_control() && (c as u32) < 0x0530)
}

/// What one font file says about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileNames {
    pub names: BTreeSet<String>,
    pub axis_tags: Vec<String>,
    pub is_variable: bool,
    pub issues: Vec<FamilyIssue>,
}

impl FileNames {
    pub fn has_weight_axis(&self) -> bool {
        self.axis_tags.iter().any(|tag| is_weight_axis(tag))
    }
}

/// Anything that can report the names embedded in a font file.
pub trait NameSource: Sync {
    fn read_file(&self, path: &Path) -> Result<FileNames>;
}

/// Names observed in one declared file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileObservation {
    pub filename: String,
    pub style: FontStyle,
    pub names: BTreeSet<String>,
    /// `None` when the binary could not be read.
    pub has_weight_axis: Option<bool>,
}

/// Names observed across every declared file of a family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedFamily {
    pub files: Vec<FileObservation>,
    pub issues: Vec<FamilyIssue>,
}

impl ObservedFamily {
    pub fn all_names(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .flat_map(|f| f.names.iter().cloned())
            .collect()
    }
}

/// Read every declared file in `dir` through `source`.
///
/// Unreadable files are logged and contribute no names; decode failures are
/// carried as issues without failing the family.
pub fn observe_family(
    source: &dyn NameSource,
    dir: &Path,
    declarations: &[FontDeclaration],
) -> ObservedFamily {
    let mut observed = ObservedFamily::default();

    for decl in declarations {
        let path = dir.join(&decl.filename);
        match source.read_file(&path) {
            Ok(file) => {
                debug!(file = %decl.filename, names = file.names.len(), "read name table");
                let has_weight_axis = file.has_weight_axis();
                observed.issues.extend(file.issues);
                observed.files.push(FileObservation {
                    filename: decl.filename.clone(),
                    style: decl.style,
                    names: file.names,
                    has_weight_axis: Some(has_weight_axis),
                });
            }
            Err(err) => {
                warn!(file = %path.display(), "unreadable font: {err:#}");
                observed.files.push(FileObservation {
                    filename: decl.filename.clone(),
                    style: decl.style,
                    names: BTreeSet::new(),
                    has_weight_axis: None,
                });
            }
        }
    }

    observed
}

pub use reader::FontFileNames;

mod reader {
    use std::fs;
    use std::path::Path;

    use anyhow::{Context, Result};
    use read_fonts::tables::name::{Name, NameId};
    use read_fonts::{FontRef, TableProvider};
    use skrifa::{FontRef as SkrifaFontRef, MetadataProvider};
    use tracing::warn;

    use super::{decode_name, FileNames, NameSource};
    use crate::error::FamilyIssue;
    use crate::psname::stem_of;
    use crate::tags::tag_to_string;

    /// Variations PostScript name prefix.
    const VARIATIONS_PS_PREFIX: NameId = NameId::new(25);

    /// [`NameSource`] backed by the font files on disk.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FontFileNames;

    impl NameSource for FontFileNames {
        fn read_file(&self, path: &Path) -> Result<FileNames> {
            let data = fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            let mut out = FileNames::default();

            for font in FontRef::fonts(&data) {
                let font = font?;
                let sfont = if let Some(idx) = font.ttc_index() {
                    SkrifaFontRef::from_index(&data, idx)?
                } else {
                    SkrifaFontRef::new(&data)?
                };

                for axis in sfont.axes().iter() {
                    let tag = tag_to_string(axis.tag());
                    if !out.axis_tags.contains(&tag) {
                        out.axis_tags.push(tag);
                    }
                }

                let Ok(name) = font.name() else {
                    warn!(file = %filename, "font has no name table");
                    continue;
                };

                let ps_name =
                    read_name(&name, NameId::POSTSCRIPT_NAME, &filename, &mut out.issues);
                if let Some(ps) = &ps_name {
                    out.names.insert(ps.clone());
                }

                if let Ok(fvar) = font.fvar() {
                    out.is_variable = true;
                    let prefix = read_name(&name, VARIATIONS_PS_PREFIX, &filename, &mut out.issues);
                    // the prefix only stands in for a missing nameID 6
                    if ps_name.is_none() {
                        if let Some(prefix) = &prefix {
                            out.names.insert(prefix.clone());
                        }
                    }
                    let prefix = prefix.or_else(|| ps_name.as_deref().map(stem_of));

                    if let Ok(instances) = fvar.instances() {
                        for inst in instances.iter().flatten() {
                            let explicit = inst.post_script_name_id.and_then(|id| {
                                read_name(&name, id, &filename, &mut out.issues)
                            });
                            let derived = || {
                                let sub = read_name(
                                    &name,
                                    inst.subfamily_name_id,
                                    &filename,
                                    &mut out.issues,
                                )?;
                                let prefix = prefix.as_deref()?;
                                Some(instance_name(prefix, &sub))
                            };
                            if let Some(instance) = explicit.or_else(derived) {
                                out.names.insert(instance);
                            }
                        }
                    }
                }
            }

            out.axis_tags.sort();
            Ok(out)
        }
    }

    /// `<prefix>-<subfamily without spaces>`, the derived instance PostScript name.
    pub(super) fn instance_name(prefix: &str, subfamily: &str) -> String {
        let suffix: String = subfamily.chars().filter(|c| !c.is_whitespace()).collect();
        format!("{prefix}-{suffix}")
    }

    fn platform_rank(platform_id: u16) -> u8 {
        match platform_id {
            3 => 0,
            0 => 1,
            1 => 2,
            _ => 3,
        }
    }

    fn read_name(
        name: &Name,
        id: NameId,
        filename: &str,
        issues: &mut Vec<FamilyIssue>,
    ) -> Option<String> {
        let storage = name.string_data();
        let bytes = storage.as_bytes();

        let mut records: Vec<_> = name
            .name_record()
            .iter()
            .filter(|record| record.name_id() == id)
            .collect();
        if records.is_empty() {
            return None;
        }
        records.sort_by_key(|record| platform_rank(record.platform_id()));

        for record in records {
            let start = record.string_offset().to_u32() as usize;
            let end = start + record.length() as usize;
            if let Some(decoded) = bytes.get(start..end).and_then(decode_name) {
                return Some(decoded.text);
            }
        }

        warn!(file = %filename, name_id = id.to_u16(), "dropping undecodable name");
        issues.push(FamilyIssue::NameDecodeFailure {
            filename: filename.to_string(),
            name_id: id.to_u16(),
        });
        None
    }
}
