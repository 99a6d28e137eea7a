//! Batch pipeline over family folders (made by FontLab https://www.fontlab.com/)
//!
//! Every stage works family by family in parallel and returns results in
//! folder order. A family that fails is logged and skipped; only discovery
//! and artifact I/O surface as errors.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Result;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::catalog::{family_identity, Catalog};
use crate::discovery::{FamilyDir, FamilyDiscovery, PathDiscovery};
use crate::error::FamilyIssue;
use crate::mapping::{FamilyMapping, MappingStore};
use crate::metadata::{load_metadata, FontDeclaration};
use crate::names::{observe_family, NameSource, ObservedFamily};
use crate::polyfill::{polyfill, PolyfillChange};
use crate::prevalidate::{prevalidate_family, ExcludedFamilies, FamilyCheck};
use crate::psname::{map_postscript_names, MappingContext, NameMapping};
use crate::validate::{validate_family, ValidationResult};

#[derive(Debug, Default, Clone)]
pub struct PipelineOptions {
    pub follow_symlinks: bool,
    /// Worker threads; rayon's default when `None`.
    pub jobs: Option<usize>,
}

impl PipelineOptions {
    fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        if let Some(jobs) = self.jobs {
            let pool = ThreadPoolBuilder::new().num_threads(jobs).build()?;
            Ok(pool.install(op))
        } else {
            Ok(op())
        }
    }
}

/// Family folders under `root`, sorted by folder name.
pub fn discover_families(root: &Path, opts: &PipelineOptions) -> Result<Vec<FamilyDir>> {
    let dirs = PathDiscovery::new(root)
        .follow_symlinks(opts.follow_symlinks)
        .discover()?;
    info!(root = %root.display(), families = dirs.len(), "discovered family folders");
    Ok(dirs)
}

/// Pre-validate every folder.
pub fn prevalidate(
    dirs: &[FamilyDir],
    catalog: &Catalog,
    opts: &PipelineOptions,
) -> Result<Vec<FamilyCheck>> {
    let mut checks: Vec<FamilyCheck> = opts.run(|| {
        dirs.par_iter()
            .map(|dir| prevalidate_family(dir, catalog))
            .collect()
    })?;
    checks.sort_by(|a, b| a.folder.cmp(&b.folder));
    Ok(checks)
}

/// Metadata and embedded names of one family that survived exclusion.
#[derive(Debug, Clone)]
pub struct FamilyObservation {
    pub folder: String,
    pub family: String,
    pub declarations: Vec<FontDeclaration>,
    /// `wght` among the METADATA.pb axes.
    pub metadata_weight_axis: bool,
    pub observed: ObservedFamily,
}

impl FamilyObservation {
    pub fn names(&self) -> BTreeSet<String> {
        self.observed.all_names()
    }
}

/// Read metadata and name tables for every family not excluded.
pub fn observe_families(
    dirs: &[FamilyDir],
    excluded: &ExcludedFamilies,
    source: &dyn NameSource,
    opts: &PipelineOptions,
) -> Result<Vec<FamilyObservation>> {
    let mut observations: Vec<FamilyObservation> = opts.run(|| {
        dirs.par_iter()
            .filter_map(|dir| observe_one(dir, excluded, source))
            .collect()
    })?;
    observations.sort_by(|a, b| a.folder.cmp(&b.folder));
    Ok(observations)
}

fn observe_one(
    dir: &FamilyDir,
    excluded: &ExcludedFamilies,
    source: &dyn NameSource,
) -> Option<FamilyObservation> {
    if excluded.contains(&dir.folder, None) {
        debug!(folder = %dir.folder, "excluded");
        return None;
    }

    let record = match load_metadata(&dir.path) {
        Ok(record) => record,
        Err(issue) => {
            warn!(folder = %dir.folder, "skipping family: {issue}");
            return None;
        }
    };
    let declarations = match record.declarations() {
        Ok(decls) => decls,
        Err(issues) => {
            for issue in issues {
                warn!(folder = %dir.folder, "skipping family: {issue}");
            }
            return None;
        }
    };
    let family = record.family_name()?.to_string();
    if excluded.contains(&dir.folder, Some(family.as_str())) {
        debug!(folder = %dir.folder, family = %family, "excluded");
        return None;
    }

    let observed = observe_family(source, &dir.path, &declarations);
    Some(FamilyObservation {
        folder: dir.folder.clone(),
        metadata_weight_axis: record.has_weight_axis(),
        family,
        declarations,
        observed,
    })
}

/// Output of [`build_mappings`].
#[derive(Debug, Clone, Default)]
pub struct MappingRun {
    pub store: MappingStore,
    /// Names the mapper could not justify, per family.
    pub unresolved: BTreeMap<String, BTreeSet<String>>,
    /// Per-folder problems met while mapping, decode warnings included.
    pub issues: Vec<(String, FamilyIssue)>,
}

/// Map every observed family onto its catalog entry.
pub fn build_mappings(
    observations: &[FamilyObservation],
    catalog: &Catalog,
    opts: &PipelineOptions,
) -> Result<MappingRun> {
    let built: Vec<Result<(FamilyMapping, NameMapping), FamilyIssue>> = opts.run(|| {
        observations
            .par_iter()
            .map(|obs| map_family(obs, catalog))
            .collect()
    })?;

    let mut run = MappingRun::default();
    for (obs, outcome) in observations.iter().zip(built) {
        run.issues.extend(
            obs.observed
                .issues
                .iter()
                .map(|issue| (obs.folder.clone(), issue.clone())),
        );
        match outcome {
            Ok((mapping, names)) => {
                if !names.unresolved.is_empty() {
                    run.unresolved
                        .insert(mapping.family.clone(), names.unresolved);
                }
                run.store.insert(mapping);
            }
            Err(issue) => {
                warn!(folder = %obs.folder, family = %obs.family, "{issue}");
                run.issues.push((obs.folder.clone(), issue));
            }
        }
    }
    info!(families = run.store.len(), "built mappings");
    Ok(run)
}

fn map_family(
    obs: &FamilyObservation,
    catalog: &Catalog,
) -> Result<(FamilyMapping, NameMapping), FamilyIssue> {
    let entry = catalog
        .lookup(&obs.family)
        .ok_or(FamilyIssue::FamilyNotInCatalog)?;

    let fallback_axis = obs.metadata_weight_axis || entry.has_weight_axis();
    let mut names = NameMapping::default();
    for file in &obs.observed.files {
        let ctx = MappingContext {
            declarations: &obs.declarations,
            catalog: entry,
            style: file.style,
            has_weight_axis: file.has_weight_axis.unwrap_or(fallback_axis),
        };
        names.merge(map_postscript_names(&file.names, &ctx));
    }

    let mut mapping = FamilyMapping::from_catalog(entry);
    mapping.apply(&names);
    Ok((mapping, names))
}

/// Per-folder validation result.
#[derive(Debug, Clone)]
pub struct FamilyValidation {
    pub folder: String,
    pub result: ValidationResult,
}

pub fn validate_mappings(
    observations: &[FamilyObservation],
    store: &MappingStore,
    opts: &PipelineOptions,
) -> Result<Vec<FamilyValidation>> {
    opts.run(|| {
        observations
            .par_iter()
            .map(|obs| FamilyValidation {
                folder: obs.folder.clone(),
                result: validate_family(&obs.family, store, &obs.names()),
            })
            .collect()
    })
}

/// Polyfill every mapping in `store` that is not excluded.
///
/// Families without an observation are repaired against an empty name set,
/// which leaves only browser-style synthesis to act.
pub fn polyfill_store(
    store: &mut MappingStore,
    observations: &[FamilyObservation],
    excluded: &ExcludedFamilies,
) -> Vec<PolyfillChange> {
    let observed: BTreeMap<String, BTreeSet<String>> = observations
        .iter()
        .map(|obs| (family_identity(&obs.family), obs.names()))
        .collect();
    let empty = BTreeSet::new();

    let mut changes = Vec::new();
    for mapping in store.iter_mut() {
        if excluded.contains_family(&mapping.family) {
            continue;
        }
        let names = observed
            .get(&family_identity(&mapping.family))
            .unwrap_or(&empty);
        changes.extend(polyfill(mapping, names));
    }
    info!(changes = changes.len(), "polyfill complete");
    changes
}
