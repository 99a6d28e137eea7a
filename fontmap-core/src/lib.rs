//! fontmap-core: reconciling three views of the same font family
//!
//! A family folder declares its files in `METADATA.pb`, the binaries carry
//! their own PostScript names, and a webfont catalog indexes downloadable
//! files by variant key (`regular`, `700italic`, ...). None of them share
//! identifiers. This crate maps embedded names onto catalog variants,
//! checks the result from every side, and repairs what it safely can.
//!
//! ## Stages
//!
//! - **Pre-validation** ([`prevalidate`]): metadata present, files on disk,
//!   family and variants in the catalog. Failures become the invalid-family
//!   list and are excluded from everything after.
//! - **Mapping** ([`psname`], [`mapping`]): declared names, browser-style
//!   synthesis, longest-suffix decomposition, then substring containment
//!   (tagged low confidence).
//! - **Validation** ([`validate`]): observed names the mapping misses and
//!   catalog variants nothing maps to.
//! - **Polyfill** ([`polyfill`]): singleton bindings when unambiguous, then
//!   browser-style names for every variant still unmapped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use fontmap_core::catalog::Catalog;
//! use fontmap_core::names::FontFileNames;
//! use fontmap_core::pipeline::{build_mappings, discover_families, observe_families, PipelineOptions};
//! use fontmap_core::prevalidate::ExcludedFamilies;
//!
//! let opts = PipelineOptions::default();
//! let catalog = Catalog::load(Path::new("webfonts.json"))?;
//! let excluded = ExcludedFamilies::load(Path::new("invalid.csv"))?;
//!
//! let dirs = discover_families(Path::new("fonts"), &opts)?;
//! let observed = observe_families(&dirs, &excluded, &FontFileNames, &opts)?;
//! let run = build_mappings(&observed, &catalog, &opts)?;
//! run.store.save(Path::new("mapping.json"))?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ---
//!
//! Crafted with care at FontLab https://www.fontlab.com/

pub mod catalog;
pub mod discovery;
pub mod error;
pub mod mapping;
pub mod metadata;
pub mod names;
pub mod output;
pub mod pipeline;
pub mod polyfill;
pub mod prevalidate;
pub mod psname;
pub mod tags;
pub mod validate;
pub mod variant;

pub use error::FamilyIssue;
pub use variant::{resolve, VariantKey};
