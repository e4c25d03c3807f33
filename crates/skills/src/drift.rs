//! Detect a committed index that no longer matches its sources.
//!
//! The pipeline is re-run in memory and the result compared byte for byte
//! with the artifact on disk. When they differ, the committed artifact is
//! parsed back so the report can say *what* drifted.

use std::{collections::BTreeMap, fmt, path::PathBuf};

use tracing::{info, warn};

use crate::{
    error::DriftError,
    registry::{BuildWarning, RegistryBuilder},
    types::{RegistryEntry, RegistryIndex},
};

/// A clean drift check.
#[derive(Debug, Clone)]
pub struct DriftReport {
    pub artifact: PathBuf,
    pub entries: usize,
    pub warnings: Vec<BuildWarning>,
}

/// An entry present on both sides whose published fields differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedEntry {
    pub identifier: String,
    pub fields: Vec<&'static str>,
}

/// What separates the committed artifact from a fresh build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftSummary {
    /// Identifiers a fresh build would add.
    pub added: Vec<String>,
    /// Identifiers only the committed artifact has.
    pub removed: Vec<String>,
    pub changed: Vec<ChangedEntry>,
    /// Version, total or category roll-up differ.
    pub metadata_changed: bool,
    /// The committed artifact could not be read back as an index.
    pub unreadable: Option<String>,
}

impl DriftSummary {
    /// Entries match; only whitespace, ordering or encoding differ.
    pub fn is_formatting_only(&self) -> bool {
        self.unreadable.is_none()
            && self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && !self.metadata_changed
    }
}

impl fmt::Display for DriftSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref reason) = self.unreadable {
            return write!(f, "  committed index is unreadable: {reason}");
        }
        if self.is_formatting_only() {
            return write!(f, "  formatting differs");
        }

        let mut lines = Vec::new();
        if !self.added.is_empty() {
            lines.push(format!("  added: {}", self.added.join(", ")));
        }
        if !self.removed.is_empty() {
            lines.push(format!("  removed: {}", self.removed.join(", ")));
        }
        for change in &self.changed {
            lines.push(format!(
                "  changed: {} ({})",
                change.identifier,
                change.fields.join(", ")
            ));
        }
        if self.metadata_changed {
            lines.push("  index metadata differs".to_string());
        }
        write!(f, "{}", lines.join("\n"))
    }
}

/// Rebuild in memory and compare with the artifact at the builder's output.
pub fn check_drift(builder: &RegistryBuilder) -> Result<DriftReport, DriftError> {
    let fresh = builder.build()?;
    let artifact = builder.output().to_path_buf();

    let committed = match std::fs::read(&artifact) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DriftError::MissingArtifact { path: artifact });
        },
        Err(source) => {
            return Err(DriftError::ReadArtifact {
                path: artifact,
                source,
            });
        },
    };

    if committed != fresh.bytes {
        let summary = summarize(&committed, &fresh.index);
        warn!(path = %artifact.display(), "skills index is stale");
        return Err(DriftError::Stale {
            path: artifact,
            summary,
        });
    }

    info!(path = %artifact.display(), entries = fresh.index.total, "skills index up to date");
    Ok(DriftReport {
        artifact,
        entries: fresh.index.total,
        warnings: fresh.warnings,
    })
}

/// Compare committed artifact bytes with a freshly built index.
pub fn summarize(committed: &[u8], fresh: &RegistryIndex) -> DriftSummary {
    let old: RegistryIndex = match serde_json::from_slice(committed) {
        Ok(index) => index,
        Err(e) => {
            return DriftSummary {
                unreadable: Some(e.to_string()),
                ..Default::default()
            };
        },
    };

    let old_entries: BTreeMap<&str, &RegistryEntry> = old
        .skills
        .iter()
        .map(|e| (e.identifier.as_str(), e))
        .collect();
    let new_entries: BTreeMap<&str, &RegistryEntry> = fresh
        .skills
        .iter()
        .map(|e| (e.identifier.as_str(), e))
        .collect();

    let mut summary = DriftSummary::default();
    for (id, new) in &new_entries {
        match old_entries.get(id) {
            None => summary.added.push((*id).to_string()),
            Some(old) => {
                let fields = old.changed_fields(new);
                if !fields.is_empty() {
                    summary.changed.push(ChangedEntry {
                        identifier: (*id).to_string(),
                        fields,
                    });
                }
            },
        }
    }
    summary.removed = old_entries
        .keys()
        .filter(|id| !new_entries.contains_key(*id))
        .map(|id| (*id).to_string())
        .collect();
    summary.metadata_changed = old.version != fresh.version
        || old.total != fresh.total
        || old.categories != fresh.categories;

    summary
}
