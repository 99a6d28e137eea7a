use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

const CATALOG: &str = r#"{"items": [
  {"family": "Foo", "category": "serif", "variants": ["regular", "700"],
   "files": {"regular": "https://x/Foo-Regular.ttf", "700": "https://x/Foo-Bold.ttf"}}
]}"#;

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

/// Workspace with a catalog, one good family and one folder without metadata.
fn workspace(root: &Path) {
    fs::write(root.join("webfonts.json"), CATALOG).expect("catalog");

    let foo = root.join("fonts/ofl/foo");
    fs::create_dir_all(&foo).expect("mkdir foo");
    fs::write(foo.join("METADATA.pb"), FOO).expect("metadata");
    // placeholder binaries; the name reader logs and skips them
    fs::write(foo.join("Foo-Regular.ttf"), b"").expect("font");
    fs::write(foo.join("Foo-Bold.ttf"), b"").expect("font");

    fs::create_dir_all(root.join("fonts/ofl/orphan")).expect("mkdir orphan");
}

fn fontmap(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fontmap"))
        .current_dir(root)
        .env_remove("FONTMAP_CATALOG")
        .env_remove("FONTMAP_FONTS_DIR")
        .env_remove("FONTMAP_MAPPING")
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("run fontmap")
}

#[test]
fn pre_validate_writes_invalid_list() {
    let tmp = tempdir().expect("tempdir");
    workspace(tmp.path());

    let output = fontmap(tmp.path(), &["pre-validate"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[ERROR] orphan: METADATA.pb not found"), "{stdout}");
    assert!(stdout.contains("Total families: 2"));
    assert!(stdout.contains("Invalid families: 1"));

    let csv = fs::read_to_string(tmp.path().join("invalid.csv")).expect("invalid.csv");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["folder,font family name,reason(s)", "orphan,,METADATA.pb not found"]);
}

#[test]
fn map_with_polyfill_then_validate_passes() {
    let tmp = tempdir().expect("tempdir");
    workspace(tmp.path());

    let pre = fontmap(tmp.path(), &["pre-validate"]);
    assert!(pre.status.success());

    let map = fontmap(tmp.path(), &["map", "--polyfill"]);
    assert!(
        map.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&map.stderr)
    );
    let stdout = String::from_utf8_lossy(&map.stdout);
    assert!(stdout.contains("[POLYFILL] Foo: Foo-Bold -> 700 (browser-style)"), "{stdout}");

    let mapping: Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("mapping.json")).expect("mapping.json"),
    )
    .expect("parse mapping");
    assert_eq!(mapping["Foo"]["post_script_names"]["Foo-Regular"], "regular");

    let validate = fontmap(tmp.path(), &["validate", "--json"]);
    assert!(
        validate.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&validate.stderr)
    );
    let results: Value = serde_json::from_slice(&validate.stdout).expect("parse results");
    assert_eq!(results[0]["status"], "valid");
    assert!(String::from_utf8_lossy(&validate.stderr).contains("Valid: 1"));

    let log = fs::read_to_string(tmp.path().join("validation.log")).expect("log");
    assert!(log.contains("Total families: 1"));
}

#[test]
fn validate_exits_non_zero_on_unmapped_variants() {
    let tmp = tempdir().expect("tempdir");
    workspace(tmp.path());
    assert!(fontmap(tmp.path(), &["pre-validate"]).status.success());
    assert!(fontmap(tmp.path(), &["map"]).status.success());

    let output = fontmap(tmp.path(), &["validate"]);
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Invalid: 1"), "{stdout}");

    let log = fs::read_to_string(tmp.path().join("validation.log")).expect("log");
    assert!(log.contains("[invalid] Foo"));
    assert!(log.contains("unmapped variants:"));
}

#[test]
fn environment_overrides_default_paths() {
    let tmp = tempdir().expect("tempdir");
    workspace(tmp.path());
    fs::rename(
        tmp.path().join("webfonts.json"),
        tmp.path().join("elsewhere.json"),
    )
    .expect("move catalog");

    let output = Command::new(env!("CARGO_BIN_EXE_fontmap"))
        .current_dir(tmp.path())
        .env("FONTMAP_CATALOG", "elsewhere.json")
        .env("RUST_LOG", "off")
        .arg("pre-validate")
        .output()
        .expect("run fontmap");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn missing_catalog_is_fatal() {
    let tmp = tempdir().expect("tempdir");

    let output = fontmap(tmp.path(), &["pre-validate"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: reading catalog"), "{stderr}");
}
