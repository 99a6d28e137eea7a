/// End-to-end runs over folder fixtures
///
/// Family folders live in a tempdir with real METADATA.pb files and empty
/// font files; the embedded names come from an in-memory table so the
/// stages can be exercised without shipping binaries.
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use fontmap_core::catalog::Catalog;
use fontmap_core::mapping::MappingStore;
use fontmap_core::names::{FileNames, NameSource};
use fontmap_core::pipeline::{
    build_mappings, discover_families, observe_families, polyfill_store, prevalidate,
    validate_mappings, PipelineOptions,
};
use fontmap_core::prevalidate::{invalid_records, write_invalid_csv, ExcludedFamilies};
use fontmap_core::validate::{ValidationStatus, ValidationSummary};
use fontmap_core::VariantKey;

struct NameTable(BTreeMap<String, FileNames>);

impl NameTable {
    fn new() -> Self {
        Self(BTreeMap::new())
    }

    fn file(mut self, filename: &str, names: &[&str], variable: bool) -> Self {
        self.0.insert(
            filename.to_string(),
            FileNames {
                names: names.iter().map(|n| n.to_string()).collect(),
                axis_tags: if variable { vec!["wght".into()] } else { Vec::new() },
                is_variable: variable,
                issues: Vec::new(),
            },
        );
        self
    }
}

impl NameSource for NameTable {
    fn read_file(&self, path: &Path) -> Result<FileNames> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("bad path {}", path.display()))?;
        self.0
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("no such font {name}"))
    }
}

fn family(root: &Path, folder: &str, metadata: &str) {
    let dir = root.join("ofl").join(folder);
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("METADATA.pb"), metadata).expect("metadata");
    for line in metadata.lines() {
        if let Some(rest) = line.trim().strip_prefix("filename: ") {
            fs::write(dir.join(rest.trim_matches('"')), b"").expect("font");
        }
    }
}

const FOO: &str = r#"
name: "Foo"
fonts {
  name: "Foo"
  style: "normal"
  weight: 400
  filename: "Foo-Regular.ttf"
  post_script_name: "Foo-Regular"
}
fonts {
  name: "Foo"
  style: "normal"
  weight: 700
  filename: "Foo-Bold.ttf"
  post_script_name: "Foo-Bold"
}
"#;

const BAR: &str = r#"
name: "Bar Sans"
fonts {
  name: "Bar Sans"
  style: "normal"
  weight: 400
  filename: "BarSans[wght].ttf"
  post_script_name: "BarSans-Regular"
}
fonts {
  name: "Bar Sans"
  style: "italic"
  weight: 400
  filename: "BarSans-Italic[wght].ttf"
  post_script_name: "BarSans-Italic"
}
axes {
  tag: "wght"
  min_value: 400.0
  max_value: 800.0
}
"#;

const CATALOG: &str = r#"{"items": [
  {"family": "Foo", "variants": ["regular", "700"],
   "files": {"regular": "https://x/Foo-Regular.ttf", "700": "https://x/Foo-Bold.ttf"}},
  {"family": "Bar Sans", "variants": ["regular", "italic", "700", "800italic"],
   "files": {"regular": "https://x/a.ttf", "italic": "https://x/b.ttf",
             "700": "https://x/c.ttf", "800italic": "https://x/d.ttf"},
   "axes": [{"tag": "wght", "start": 400, "end": 800}]}
]}"#;

fn names() -> NameTable {
    NameTable::new()
        .file("Foo-Regular.ttf", &["Foo-Regular"], false)
        .file("Foo-Bold.ttf", &["Foo-Bold"], false)
        .file("BarSans[wght].ttf", &["BarSans-Regular", "BarSans-Bold"], true)
        .file(
            "BarSans-Italic[wght].ttf",
            &["BarSans-Italic", "BarSans-ExtraBoldItalic"],
            true,
        )
}

fn key(raw: &str) -> VariantKey {
    raw.parse().expect("variant key")
}

#[test]
fn static_and_variable_families_map_cleanly() {
    let tmp = tempfile::tempdir().expect("tempdir");
    family(tmp.path(), "foo", FOO);
    family(tmp.path(), "barsans", BAR);
    let catalog = Catalog::from_json(CATALOG).expect("catalog");
    let opts = PipelineOptions::default();

    let dirs = discover_families(tmp.path(), &opts).expect("discover");
    let checks = prevalidate(&dirs, &catalog, &opts).expect("prevalidate");
    assert!(checks.iter().all(|c| c.is_valid()), "{checks:?}");

    let observed =
        observe_families(&dirs, &ExcludedFamilies::new(), &names(), &opts).expect("observe");
    let run = build_mappings(&observed, &catalog, &opts).expect("map");
    assert!(run.unresolved.is_empty());

    let foo = run.store.get("Foo").expect("foo mapping");
    assert_eq!(foo.post_script_names["Foo-Regular"], VariantKey::REGULAR);
    assert_eq!(foo.post_script_names["Foo-Bold"], key("700"));

    let bar = run.store.get("Bar Sans").expect("bar mapping");
    assert_eq!(bar.post_script_names["BarSans-ExtraBoldItalic"], key("800italic"));
    assert_eq!(bar.post_script_names["BarSans-Italic"], VariantKey::ITALIC);

    let results = validate_mappings(&observed, &run.store, &opts).expect("validate");
    let folders: Vec<&str> = results.iter().map(|r| r.folder.as_str()).collect();
    assert_eq!(folders, vec!["barsans", "foo"]);
    assert!(results.iter().all(|r| r.result.status == ValidationStatus::Valid));
}

#[test]
fn uncovered_catalog_variant_is_reported_then_polyfilled() {
    let tmp = tempfile::tempdir().expect("tempdir");
    family(tmp.path(), "foo", FOO);
    let catalog = Catalog::from_json(
        r#"{"items": [{"family": "Foo", "variants": ["regular", "italic", "700"],
            "files": {"regular": "a", "italic": "b", "700": "c"}}]}"#,
    )
    .expect("catalog");
    let opts = PipelineOptions {
        jobs: Some(2),
        ..PipelineOptions::default()
    };
    let excluded = ExcludedFamilies::new();

    let dirs = discover_families(tmp.path(), &opts).expect("discover");
    let observed = observe_families(&dirs, &excluded, &names(), &opts).expect("observe");
    let mut run = build_mappings(&observed, &catalog, &opts).expect("map");

    let before = validate_mappings(&observed, &run.store, &opts).expect("validate");
    assert_eq!(before[0].result.status, ValidationStatus::Invalid);
    assert_eq!(
        before[0].result.unmapped_variants,
        BTreeSet::from([VariantKey::ITALIC])
    );

    let changes = polyfill_store(&mut run.store, &observed, &excluded);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].name, "Foo-Italic");

    let after = validate_mappings(&observed, &run.store, &opts).expect("validate");
    assert_eq!(after[0].result.status, ValidationStatus::Valid);
    assert!(polyfill_store(&mut run.store, &observed, &excluded).is_empty());
}

#[test]
fn invalid_families_are_excluded_downstream() {
    let tmp = tempfile::tempdir().expect("tempdir");
    family(tmp.path(), "foo", FOO);
    family(tmp.path(), "barsans", BAR);
    fs::remove_file(tmp.path().join("ofl/barsans/BarSans-Italic[wght].ttf")).expect("rm");
    let catalog = Catalog::from_json(CATALOG).expect("catalog");
    let opts = PipelineOptions::default();

    let dirs = discover_families(tmp.path(), &opts).expect("discover");
    let checks = prevalidate(&dirs, &catalog, &opts).expect("prevalidate");
    let records = invalid_records(&checks);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].folder, "barsans");
    assert_eq!(
        records[0].joined_reasons(),
        "Local file not found: BarSans-Italic[wght].ttf"
    );

    let csv = tmp.path().join("invalid.csv");
    write_invalid_csv(&csv, &records).expect("write csv");
    let excluded = ExcludedFamilies::load(&csv).expect("load csv");

    let observed = observe_families(&dirs, &excluded, &names(), &opts).expect("observe");
    let run = build_mappings(&observed, &catalog, &opts).expect("map");
    assert!(run.store.get("Bar Sans").is_none());
    assert!(run.store.get("Foo").is_some());
}

#[test]
fn mapping_artifact_round_trips_and_summarises() {
    let tmp = tempfile::tempdir().expect("tempdir");
    family(tmp.path(), "foo", FOO);
    let catalog = Catalog::from_json(CATALOG).expect("catalog");
    let opts = PipelineOptions::default();

    let dirs = discover_families(tmp.path(), &opts).expect("discover");
    let observed =
        observe_families(&dirs, &ExcludedFamilies::new(), &names(), &opts).expect("observe");
    let run = build_mappings(&observed, &catalog, &opts).expect("map");

    let path = tmp.path().join("out/mapping.json");
    run.store.save(&path).expect("save");
    let reloaded = MappingStore::load(&path).expect("load");
    assert_eq!(reloaded, run.store);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(json["Foo"]["post_script_names"]["Foo-Bold"], "700");
    assert_eq!(json["Foo"]["files"]["regular"], "https://x/Foo-Regular.ttf");

    let results = validate_mappings(&observed, &reloaded, &opts).expect("validate");
    let summary = ValidationSummary::from_results(results.iter().map(|r| &r.result));
    assert_eq!((summary.total, summary.valid), (1, 1));
    assert_eq!(summary.resolution_rate_display(), "100.0%");
}
