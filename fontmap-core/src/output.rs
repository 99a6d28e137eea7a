//! Report and artifact writers (made by FontLab https://www.fontlab.com/)

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::validate::{ValidationResult, ValidationStatus, ValidationSummary};

/// Write results as prettified JSON array.
pub fn write_json_pretty<T: Serialize>(results: &[T], mut w: impl Write) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    w.write_all(json.as_bytes())?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Write results as newline-delimited JSON (NDJSON).
pub fn write_ndjson<T: Serialize>(results: &[T], mut w: impl Write) -> Result<()> {
    for item in results {
        let line = serde_json::to_string(item)?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Human-readable validation log: one block per family with problems,
/// then the batch summary.
pub fn write_validation_log(
    results: &[ValidationResult],
    summary: &ValidationSummary,
    mut w: impl Write,
) -> Result<()> {
    for result in results {
        if result.status == ValidationStatus::Valid && result.low_confidence.is_empty() {
            continue;
        }
        writeln!(w, "[{}] {}", result.status, result.family)?;
        if !result.missing_names.is_empty() {
            writeln!(w, "  missing names:")?;
            for name in &result.missing_names {
                writeln!(w, "    {name}")?;
            }
        }
        if !result.unmapped_variants.is_empty() {
            writeln!(w, "  unmapped variants:")?;
            for variant in &result.unmapped_variants {
                writeln!(w, "    {variant}")?;
            }
        }
        if !result.dangling_variants.is_empty() {
            writeln!(w, "  variants without catalog file:")?;
            for variant in &result.dangling_variants {
                writeln!(w, "    {variant}")?;
            }
        }
        if !result.low_confidence.is_empty() {
            writeln!(w, "  low-confidence matches:")?;
            for name in &result.low_confidence {
                writeln!(w, "    {name} (substring)")?;
            }
        }
        writeln!(w)?;
    }
    write_summary(summary, &mut w)
}

pub fn write_summary(summary: &ValidationSummary, mut w: impl Write) -> Result<()> {
    writeln!(w, "Validation Summary:")?;
    writeln!(w, "Total families: {}", summary.total)?;
    writeln!(w, "Valid: {}", summary.valid)?;
    writeln!(w, "Invalid: {}", summary.invalid)?;
    writeln!(w, "Not found: {}", summary.not_found)?;
    writeln!(
        w,
        "Resolution rate: {} ({} of {} observed names mapped)",
        summary.resolution_rate_display(),
        summary.mapped,
        summary.observed
    )?;
    Ok(())
}
