use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Format marker written at the top of every index.
pub const INDEX_VERSION: u32 = 1;

// ── Parsed manifest ──────────────────────────────────────────────────────────

/// Scalar key/value pairs from a manifest's header block.
///
/// Every value is already decoded to a plain string; unknown keys are kept so
/// other tooling can read them, but only `name` and `description` are
/// published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestHeader {
    fields: BTreeMap<String, String>,
}

impl ManifestHeader {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Insert a field, returning `false` when the key was already present.
    pub(crate) fn insert(&mut self, key: String, value: String) -> bool {
        self.fields.insert(key, value).is_none()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A manifest split into its structured header and its opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedManifest {
    pub header: ManifestHeader,
    /// Everything after the closing delimiter, untouched.
    pub body: String,
}

/// A parsed manifest paired with where it came from, awaiting validation.
#[derive(Debug, Clone)]
pub struct ManifestCandidate {
    pub identifier: String,
    pub source_path: PathBuf,
    pub manifest: ParsedManifest,
}

// ── Validated manifest ───────────────────────────────────────────────────────

/// A manifest that passed schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillManifest {
    pub identifier: String,
    pub name: String,
    pub description: String,
    /// Where the manifest was read from. Diagnostics only; never published.
    pub source_path: PathBuf,
    pub body: String,
}

impl SkillManifest {
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

// ── Overrides ────────────────────────────────────────────────────────────────

/// Supplementary metadata layered onto a manifest by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataOverride {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl MetadataOverride {
    /// Treat blank strings as unset so they never reach the index.
    pub(crate) fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }
        Self {
            category: keep(self.category),
            author: keep(self.author),
            license: keep(self.license),
            source: keep(self.source),
        }
    }
}

// ── Index ────────────────────────────────────────────────────────────────────

/// One published skill: manifest fields plus any override fields that are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub identifier: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RegistryEntry {
    pub fn from_manifest(manifest: &SkillManifest, overrides: Option<&MetadataOverride>) -> Self {
        let overrides = overrides.cloned().unwrap_or_default();
        Self {
            identifier: manifest.identifier.clone(),
            name: manifest.name.clone(),
            description: manifest.description.clone(),
            category: overrides.category,
            author: overrides.author,
            license: overrides.license,
            source: overrides.source,
        }
    }

    /// Names of the published fields that differ between two entries.
    pub fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.name != other.name {
            changed.push("name");
        }
        if self.description != other.description {
            changed.push("description");
        }
        if self.category != other.category {
            changed.push("category");
        }
        if self.author != other.author {
            changed.push("author");
        }
        if self.license != other.license {
            changed.push("license");
        }
        if self.source != other.source {
            changed.push("source");
        }
        changed
    }
}

/// Per-category roll-up published next to the entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub count: usize,
}

impl CategorySummary {
    /// Human-friendly label for a category id (`dev-tools` → `Dev Tools`).
    pub fn display_name(id: &str) -> String {
        id.split(['-', '_'])
            .filter(|w| !w.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The full build artifact consumed by the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryIndex {
    pub version: u32,
    pub total: usize,
    /// Sorted by identifier; identifiers are unique.
    pub skills: Vec<RegistryEntry>,
    #[serde(default)]
    pub categories: Vec<CategorySummary>,
}

impl RegistryIndex {
    /// Build an index from entries already sorted by identifier.
    pub fn from_sorted_entries(skills: Vec<RegistryEntry>) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for entry in &skills {
            if let Some(ref category) = entry.category {
                *counts.entry(category.as_str()).or_default() += 1;
            }
        }
        let categories = counts
            .into_iter()
            .map(|(id, count)| CategorySummary {
                id: id.to_string(),
                name: CategorySummary::display_name(id),
                count,
            })
            .collect();

        Self {
            version: INDEX_VERSION,
            total: skills.len(),
            skills,
            categories,
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&RegistryEntry> {
        self.skills
            .binary_search_by(|e| e.identifier.as_str().cmp(identifier))
            .ok()
            .map(|i| &self.skills[i])
    }
}
