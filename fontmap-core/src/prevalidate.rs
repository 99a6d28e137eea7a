//! Pre-validation and the invalid-family list (made by FontLab https://www.fontlab.com/)
//!
//! A family folder passes when its `METADATA.pb` declares fonts that exist
//! on disk and whose variants the catalog serves. Folders that fail are
//! written to a CSV and excluded from every later stage.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::{family_identity, Catalog};
use crate::discovery::FamilyDir;
use crate::error::FamilyIssue;
use crate::metadata::load_metadata;
use crate::output::write_atomic;

pub const CSV_HEADER: [&str; 3] = ["folder", "font family name", "reason(s)"];

/// Outcome of checking one family folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyCheck {
    pub folder: String,
    /// `None` when the metadata never named the family.
    pub family: Option<String>,
    pub issues: Vec<FamilyIssue>,
}

impl FamilyCheck {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn to_record(&self) -> Option<InvalidFontRecord> {
        if self.is_valid() {
            return None;
        }
        Some(InvalidFontRecord {
            folder: self.folder.clone(),
            family: self.family.clone().unwrap_or_default(),
            reasons: self.issues.iter().map(ToString::to_string).collect(),
        })
    }
}

/// One row of the invalid-family list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidFontRecord {
    pub folder: String,
    /// Empty when the metadata was missing or unnamed.
    pub family: String,
    pub reasons: BTreeSet<String>,
}

impl InvalidFontRecord {
    pub fn joined_reasons(&self) -> String {
        self.reasons.iter().cloned().collect::<Vec<_>>().join("; ")
    }
}

/// Check one family folder against its metadata, the disk and the catalog.
///
/// Later checks only run once earlier ones pass: a family whose files are
/// missing is never looked up in the catalog.
pub fn prevalidate_family(dir: &FamilyDir, catalog: &Catalog) -> FamilyCheck {
    let mut check = FamilyCheck {
        folder: dir.folder.clone(),
        family: None,
        issues: Vec::new(),
    };

    let record = match load_metadata(&dir.path) {
        Ok(record) => record,
        Err(issue) => {
            check.issues.push(issue);
            return check;
        }
    };
    check.family = record.family_name().map(str::to_string);

    let declarations = match record.declarations() {
        Ok(decls) => decls,
        Err(issues) => {
            check.issues = issues;
            return check;
        }
    };

    for decl in &declarations {
        if !dir.path.join(&decl.filename).is_file() {
            check.issues.push(FamilyIssue::LocalFileMissing {
                filename: decl.filename.clone(),
            });
        }
    }
    if !check.issues.is_empty() {
        return check;
    }

    let Some(entry) = check.family.as_deref().and_then(|name| catalog.lookup(name)) else {
        check.issues.push(FamilyIssue::FamilyNotInCatalog);
        return check;
    };

    for decl in &declarations {
        let variant = decl.variant();
        if !entry.files.contains_key(&variant) {
            check.issues.push(FamilyIssue::VariantNotInCatalog {
                variant: variant.to_string(),
                filename: decl.filename.clone(),
            });
        }
    }

    check
}

/// Collapse checks into invalid-list rows, one per folder, sorted by folder.
pub fn invalid_records(checks: &[FamilyCheck]) -> Vec<InvalidFontRecord> {
    let mut rows: BTreeMap<String, InvalidFontRecord> = BTreeMap::new();
    for record in checks.iter().filter_map(FamilyCheck::to_record) {
        match rows.get_mut(&record.folder) {
            Some(existing) => {
                existing.reasons.extend(record.reasons);
                if existing.family.is_empty() {
                    existing.family = record.family;
                }
            }
            None => {
                rows.insert(record.folder.clone(), record);
            }
        }
    }
    rows.into_values().collect()
}

pub fn write_invalid_csv(path: &Path, records: &[InvalidFontRecord]) -> Result<()> {
    let mut text = String::new();
    push_row(&mut text, &CSV_HEADER);
    for record in records {
        let reasons = record.joined_reasons();
        push_row(&mut text, &[record.folder.as_str(), record.family.as_str(), reasons.as_str()]);
    }
    write_atomic(path, text.as_bytes())
        .with_context(|| format!("writing invalid list {}", path.display()))
}

/// Read the invalid-family list. A missing file is an empty list.
pub fn read_invalid_csv(path: &Path) -> Result<Vec<InvalidFontRecord>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("reading invalid list {}", path.display()))
        }
    };

    let mut records = Vec::new();
    for (i, row) in parse_csv(&text).into_iter().enumerate() {
        if i == 0 && row.first().map(String::as_str) == Some(CSV_HEADER[0]) {
            continue;
        }
        let mut fields = row.into_iter();
        let Some(folder) = fields.next().filter(|f| !f.is_empty()) else {
            continue;
        };
        let family = fields.next().unwrap_or_default();
        let reasons = fields
            .next()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        records.push(InvalidFontRecord {
            folder,
            family,
            reasons,
        });
    }
    Ok(records)
}

fn push_row(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str("\r\n");
}

fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => quoted = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Families later stages must skip, by folder or by family identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedFamilies {
    folders: BTreeSet<String>,
    identities: BTreeSet<String>,
}

impl ExcludedFamilies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a InvalidFontRecord>) -> Self {
        let mut excluded = Self::new();
        for record in records {
            excluded.insert(&record.folder, Some(record.family.as_str()));
        }
        excluded
    }

    pub fn load(path: &Path) -> Result<Self> {
        let records = read_invalid_csv(path)?;
        Ok(Self::from_records(&records))
    }

    pub fn insert(&mut self, folder: &str, family: Option<&str>) {
        self.folders.insert(folder.to_string());
        if let Some(family) = family {
            let identity = family_identity(family);
            if !identity.is_empty() {
                self.identities.insert(identity);
            }
        }
    }

    pub fn contains(&self, folder: &str, family: Option<&str>) -> bool {
        self.folders.contains(folder)
            || family.is_some_and(|f| self.identities.contains(&family_identity(f)))
    }

    pub fn contains_family(&self, family: &str) -> bool {
        self.identities.contains(&family_identity(family))
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const CATALOG: &str = r#"{"items": [
      {"family": "Foo", "variants": ["regular", "700"],
       "files": {"regular": "https://x/Foo-Regular.ttf", "700": "https://x/Foo-Bold.ttf"}}
    ]}"#;

    fn family_dir(root: &Path, folder: &str, metadata: Option<&str>, files: &[&str]) -> FamilyDir {
        let path = root.join(folder);
        fs::create_dir_all(&path).expect("mkdir");
        if let Some(text) = metadata {
            fs::write(path.join("METADATA.pb"), text).expect("metadata");
        }
        for file in files {
            fs::write(path.join(file), b"").expect("font");
        }
        FamilyDir::new(path)
    }

    const FOO: &str = r#"
name: "Foo"
fonts {
  name: "Foo"
  style: "normal"
  weight: 400
  filename: "Foo-Regular.ttf"
}
fonts {
  name: "Foo"
  style: "normal"
  weight: 700
  filename: "Foo-Bold.ttf"
}
"#;

    #[test]
    fn complete_family_passes() {
        let tmp = tempdir().expect("tempdir");
        let catalog = Catalog::from_json(CATALOG).expect("catalog");
        let dir = family_dir(tmp.path(), "foo", Some(FOO), &["Foo-Regular.ttf", "Foo-Bold.ttf"]);

        let check = prevalidate_family(&dir, &catalog);
        assert!(check.is_valid(), "{:?}", check.issues);
        assert_eq!(check.family.as_deref(), Some("Foo"));
    }

    #[test]
    fn missing_files_stop_before_catalog_lookup() {
        let tmp = tempdir().expect("tempdir");
        let catalog = Catalog::from_json(r#"{"items": []}"#).expect("catalog");
        let dir = family_dir(tmp.path(), "foo", Some(FOO), &["Foo-Regular.ttf"]);

        let check = prevalidate_family(&dir, &catalog);
        assert_eq!(
            check.issues,
            vec![FamilyIssue::LocalFileMissing {
                filename: "Foo-Bold.ttf".into()
            }]
        );
    }

    #[test]
    fn catalog_gaps_are_reported_per_file() {
        let tmp = tempdir().expect("tempdir");
        let catalog = Catalog::from_json(
            r#"{"items": [{"family": "Foo", "variants": ["regular"], "files": {"regular": "x"}}]}"#,
        )
        .expect("catalog");
        let dir = family_dir(tmp.path(), "foo", Some(FOO), &["Foo-Regular.ttf", "Foo-Bold.ttf"]);

        let record = prevalidate_family(&dir, &catalog).to_record().expect("invalid");
        assert_eq!(
            record.joined_reasons(),
            "Variant 700 not found in catalog for Foo-Bold.ttf"
        );
    }

    #[test]
    fn no_metadata_leaves_family_blank() {
        let tmp = tempdir().expect("tempdir");
        let catalog = Catalog::default();
        let dir = family_dir(tmp.path(), "orphan", None, &[]);

        let record = prevalidate_family(&dir, &catalog).to_record().expect("invalid");
        assert_eq!(record.family, "");
        assert_eq!(record.joined_reasons(), "METADATA.pb not found");
    }

    #[test]
    fn csv_quotes_and_reads_back() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("invalid.csv");
        let records = vec![InvalidFontRecord {
            folder: "foo".into(),
            family: "Foo, \"Bar\"".into(),
            reasons: ["b reason".to_string(), "a reason".to_string()]
                .into_iter()
                .collect(),
        }];

        write_invalid_csv(&path, &records).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.starts_with("folder,font family name,reason(s)\r\n"));
        assert!(text.contains("foo,\"Foo, \"\"Bar\"\"\",a reason; b reason"));

        assert_eq!(read_invalid_csv(&path).expect("parse"), records);
        assert!(read_invalid_csv(&PathBuf::from("/nonexistent/invalid.csv"))
            .expect("missing is empty")
            .is_empty());
    }

    #[test]
    fn excluded_by_folder_or_identity() {
        let records = vec![InvalidFontRecord {
            folder: "notosans".into(),
            family: "Noto Sans".into(),
            reasons: BTreeSet::new(),
        }];
        let excluded = ExcludedFamilies::from_records(&records);

        assert!(excluded.contains("notosans", None));
        assert!(excluded.contains("elsewhere", Some("NOTO-SANS")));
        assert!(!excluded.contains("notosansmono", Some("Noto Sans Mono")));
    }
}
