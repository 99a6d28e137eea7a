//! METADATA.pb parsing (made by FontLab https://www.fontlab.com/)

use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::FamilyIssue;
use crate::tags::is_weight_axis;
use crate::variant::{resolve_indexed, FontStyle, VariantKey};

/// File name of the declarative record inside each family folder.
pub const METADATA_FILE: &str = "METADATA.pb";

/// One `fonts { ... }` block, fields exactly as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontEntry {
    pub name: Option<String>,
    pub style: Option<String>,
    pub weight: Option<String>,
    pub filename: Option<String>,
    pub post_script_name: Option<String>,
    pub full_name: Option<String>,
}

/// One top-level `axes { ... }` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisEntry {
    pub tag: String,
    pub min_value: Option<f32>,
    pub max_value: Option<f32>,
}

/// Parsed family record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    pub name: Option<String>,
    pub fonts: Vec<FontEntry>,
    pub axes: Vec<AxisEntry>,
}

/// A font file declared by a family, with defaults applied and style/weight checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontDeclaration {
    pub family: String,
    pub filename: String,
    pub style: FontStyle,
    pub weight: u16,
    pub post_script_name: Option<String>,
    pub full_name: Option<String>,
}

impl FontDeclaration {
    pub fn variant(&self) -> VariantKey {
        // weight was validated when the declaration was built
        VariantKey::new(self.weight, self.style).unwrap_or(VariantKey::REGULAR)
    }
}

impl MetadataRecord {
    /// Family identity: the first font's `name`, else the top-level `name`.
    pub fn family_name(&self) -> Option<&str> {
        self.fonts
            .first()
            .and_then(|f| f.name.as_deref())
            .or(self.name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }

    pub fn has_weight_axis(&self) -> bool {
        self.axes.iter().any(|axis| is_weight_axis(&axis.tag))
    }

    /// Typed declarations, or every reason they could not be built.
    ///
    /// Entries without a `filename` are skipped; they describe nothing on disk.
    pub fn declarations(&self) -> Result<Vec<FontDeclaration>, Vec<FamilyIssue>> {
        if self.fonts.is_empty() {
            return Err(vec![FamilyIssue::NoFontDeclarations]);
        }
        let family = match self.family_name() {
            Some(name) => name.to_string(),
            None => return Err(vec![FamilyIssue::FamilyNameMissing]),
        };

        let mut decls = Vec::new();
        let mut issues = Vec::new();

        for (i, font) in self.fonts.iter().enumerate() {
            let Some(filename) = font.filename.clone() else {
                continue;
            };
            let style = font.style.as_deref().unwrap_or("normal");
            let weight = font.weight.as_deref().unwrap_or("400");

            match resolve_indexed(style, weight, i + 1) {
                Ok(key) => decls.push(FontDeclaration {
                    family: family.clone(),
                    filename,
                    style: key.style(),
                    weight: key.weight(),
                    post_script_name: font.post_script_name.clone(),
                    full_name: font.full_name.clone(),
                }),
                Err(issue) => issues.push(issue),
            }
        }

        if issues.is_empty() {
            Ok(decls)
        } else {
            Err(issues)
        }
    }
}

/// Read `METADATA.pb` from a family folder. `Ok(None)` when the file is absent.
pub fn read_metadata(dir: &Path) -> io::Result<Option<MetadataRecord>> {
    let path = dir.join(METADATA_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(Some(parse_metadata(&text))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Like [`read_metadata`], folding every failure into a [`FamilyIssue`].
pub fn load_metadata(dir: &Path) -> Result<MetadataRecord, FamilyIssue> {
    match read_metadata(dir) {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(FamilyIssue::MetadataNotFound),
        Err(err) => Err(FamilyIssue::MetadataUnreadable {
            reason: err.to_string(),
        }),
    }
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.*)$").expect("static regex"))
}

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\{$").expect("static regex"))
}

/// Parse the text-proto family record line by line.
///
/// Only the fields this crate consumes are kept; unknown fields and nested
/// blocks (`source { ... }`, `registry_default_overrides { ... }`) are skipped.
pub fn parse_metadata(text: &str) -> MetadataRecord {
    let mut record = MetadataRecord::default();
    let mut stack: Vec<String> = Vec::new();
    let mut font: Option<FontEntry> = None;
    let mut axis: Option<AxisEntry> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(caps) = block_re().captures(line) {
            let block = caps[1].to_string();
            if stack.is_empty() {
                match block.as_str() {
                    "fonts" => font = Some(FontEntry::default()),
                    "axes" => axis = Some(AxisEntry::default()),
                    _ => {}
                }
            }
            stack.push(block);
            continue;
        }

        if line.starts_with('}') {
            stack.pop();
            if stack.is_empty() {
                if let Some(done) = font.take() {
                    record.fonts.push(done);
                }
                if let Some(done) = axis.take() {
                    record.axes.push(done);
                }
            }
            continue;
        }

        let Some(caps) = field_re().captures(line) else {
            continue;
        };
        let key = &caps[1];
        let value = unquote(&caps[2]);

        match (stack.len(), font.as_mut(), axis.as_mut()) {
            (0, _, _) => {
                if key == "name" {
                    record.name = Some(value);
                }
            }
            (1, Some(entry), _) => match key {
                "name" => entry.name = Some(value),
                "style" => entry.style = Some(value),
                "weight" => entry.weight = Some(value),
                "filename" => entry.filename = Some(value),
                "post_script_name" => entry.post_script_name = Some(value),
                "full_name" => entry.full_name = Some(value),
                _ => {}
            },
            (1, None, Some(entry)) => match key {
                "tag" => entry.tag = value,
                "min_value" => entry.min_value = value.parse().ok(),
                "max_value" => entry.max_value = value.parse().ok(),
                _ => {}
            },
            _ => {}
        }
    }

    record
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    match raw
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: "Foo Sans"
designer: "Someone"
license: "OFL"
fonts {
  name: "Foo Sans"
  style: "normal"
  weight: 400
  filename: "FooSans[wght].ttf"
  post_script_name: "FooSans-Regular"
  full_name: "Foo Sans Regular"
}
fonts {
  name: "Foo Sans"
  style: "italic"
  weight: 400
  filename: "FooSans-Italic[wght].ttf"
  post_script_name: "FooSans-Italic"
}
subsets: "latin"
axes {
  tag: "wght"
  min_value: 100.0
  max_value: 900.0
}
source {
  repository_url: "https://example.com"
  files {
    source_file: "a"
    dest_file: "b"
  }
}
"#;

    #[test]
    fn parses_fonts_and_axes() {
        let record = parse_metadata(SAMPLE);

        assert_eq!(record.name.as_deref(), Some("Foo Sans"));
        assert_eq!(record.fonts.len(), 2);
        assert_eq!(record.fonts[1].style.as_deref(), Some("italic"));
        assert_eq!(record.fonts[0].weight.as_deref(), Some("400"));
        assert_eq!(
            record.fonts[0].post_script_name.as_deref(),
            Some("FooSans-Regular")
        );
        assert!(record.has_weight_axis());
        assert_eq!(record.axes[0].max_value, Some(900.0));
    }

    #[test]
    fn nested_blocks_do_not_leak_fields() {
        let record = parse_metadata(SAMPLE);
        assert_eq!(record.fonts.len(), 2);
        assert!(record.fonts.iter().all(|f| f.filename.is_some()));
    }

    #[test]
    fn declarations_apply_defaults() {
        let record = parse_metadata(
            r#"
fonts {
  name: "Bar"
  filename: "Bar-Regular.ttf"
}
"#,
        );
        let decls = record.declarations().expect("declarations");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].style, FontStyle::Normal);
        assert_eq!(decls[0].weight, 400);
        assert_eq!(decls[0].variant(), VariantKey::REGULAR);
    }

    #[test]
    fn declarations_report_invalid_style() {
        let record = parse_metadata(
            r#"
fonts {
  name: "Bar"
  style: "oblique"
  filename: "Bar-Oblique.ttf"
}
"#,
        );
        let issues = record.declarations().unwrap_err();
        assert_eq!(
            issues,
            vec![FamilyIssue::InvalidStyle {
                style: "oblique".into(),
                index: 1
            }]
        );
    }

    #[test]
    fn missing_family_name_is_reported() {
        let record = parse_metadata("fonts {\n  filename: \"x.ttf\"\n}\n");
        assert_eq!(
            record.declarations().unwrap_err(),
            vec![FamilyIssue::FamilyNameMissing]
        );

        let empty = parse_metadata("name: \"Lonely\"\n");
        assert_eq!(
            empty.declarations().unwrap_err(),
            vec![FamilyIssue::NoFontDeclarations]
        );
    }

    #[test]
    fn missing_file_is_metadata_not_found() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert_eq!(
            load_metadata(tmp.path()).unwrap_err(),
            FamilyIssue::MetadataNotFound
        );
    }
}
