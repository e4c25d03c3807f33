use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use walkdir::{DirEntry, WalkDir};

use crate::error::DiscoveryError;

/// A filesystem path the walk could not descend into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPath {
    pub path: Option<PathBuf>,
    pub reason: String,
}

/// A manifest tree rooted at one directory.
///
/// A skill directory is any directory below the root that directly contains
/// the manifest file. The root itself is never a skill directory.
#[derive(Debug, Clone)]
pub struct SkillTree {
    root: PathBuf,
    manifest_file: OsString,
}

impl SkillTree {
    /// Check that `root` is a readable directory.
    pub fn open(
        root: impl Into<PathBuf>,
        manifest_file: impl Into<OsString>,
    ) -> Result<Self, DiscoveryError> {
        let root = root.into();
        let meta = std::fs::metadata(&root).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                DiscoveryError::Missing { path: root.clone() }
            } else {
                DiscoveryError::Unreadable {
                    path: root.clone(),
                    source,
                }
            }
        })?;
        if !meta.is_dir() {
            return Err(DiscoveryError::NotADirectory { path: root });
        }
        if let Err(source) = std::fs::read_dir(&root) {
            return Err(DiscoveryError::Unreadable { path: root, source });
        }

        Ok(Self {
            root,
            manifest_file: manifest_file.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree from the start, yielding manifest paths in
    /// lexicographic order. Each call starts a fresh walk.
    pub fn candidates(&self) -> Candidates {
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(is_visible as fn(&DirEntry) -> bool);
        Candidates {
            walker,
            manifest_file: self.manifest_file.clone(),
            skipped: Vec::new(),
        }
    }
}

/// Lazy iterator over manifest paths below a [`SkillTree`] root.
pub struct Candidates {
    walker: walkdir::FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>,
    manifest_file: OsString,
    skipped: Vec<SkippedPath>,
}

impl Candidates {
    /// Entries the walk had to skip so far (loops, permission errors).
    pub fn skipped(&self) -> &[SkippedPath] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<SkippedPath> {
        self.skipped
    }
}

impl Iterator for Candidates {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf);
                    let reason = match err.loop_ancestor() {
                        Some(ancestor) => {
                            format!("symlink loop back to {}", ancestor.display())
                        },
                        None => err.to_string(),
                    };
                    tracing::warn!(path = ?path, %reason, "skipping path in skills tree");
                    self.skipped.push(SkippedPath { path, reason });
                    continue;
                },
            };

            if entry.depth() >= 2
                && entry.file_type().is_file()
                && entry.file_name() == self.manifest_file.as_os_str()
            {
                return Some(entry.into_path());
            }
        }
    }
}

/// Hidden directories (`.git`, `.cache`, ...) are never descended into.
fn is_visible(entry: &DirEntry) -> bool {
    entry.depth() == 0
        || !(entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.'))
}
