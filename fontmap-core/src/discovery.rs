//! Family folder discovery (made by FontLab https://www.fontlab.com/)

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use walkdir::WalkDir;

use crate::metadata::METADATA_FILE;

/// License buckets of a google/fonts style checkout.
pub const LICENSE_DIRS: [&str; 3] = ["ofl", "apache", "ufl"];

/// One family folder to process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FamilyDir {
    /// Last path component; the key of the invalid-family list.
    pub folder: String,
    pub path: PathBuf,
}

impl FamilyDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let folder = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { folder, path }
    }
}

/// Anything that can enumerate family folders.
pub trait FamilyDiscovery {
    fn discover(&self) -> Result<Vec<FamilyDir>>;
}

/// Filesystem layout walker.
///
/// The root is a family when it holds a `METADATA.pb` itself. Otherwise the
/// children of `ofl/`, `apache/` and `ufl/` are families if any of those
/// buckets exist, and the root's direct subfolders when none do.
#[derive(Debug, Clone)]
pub struct PathDiscovery {
    root: PathBuf,
    follow_symlinks: bool,
}

impl PathDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
        }
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    fn subdirs(&self, dir: &Path) -> Result<Vec<FamilyDir>> {
        let mut found = Vec::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_dir() && !is_hidden(entry.path()) {
                found.push(FamilyDir::new(entry.path()));
            }
        }
        Ok(found)
    }
}

impl FamilyDiscovery for PathDiscovery {
    fn discover(&self) -> Result<Vec<FamilyDir>> {
        if !self.root.is_dir() {
            return Err(anyhow!("fonts directory does not exist: {}", self.root.display()));
        }

        if self.root.join(METADATA_FILE).is_file() {
            return Ok(vec![FamilyDir::new(&self.root)]);
        }

        let buckets: Vec<PathBuf> = LICENSE_DIRS
            .iter()
            .map(|bucket| self.root.join(bucket))
            .filter(|path| path.is_dir())
            .collect();

        let mut found = Vec::new();
        if buckets.is_empty() {
            found = self.subdirs(&self.root)?;
        } else {
            for bucket in &buckets {
                found.extend(self.subdirs(bucket)?);
            }
        }

        found.sort();
        Ok(found)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}
