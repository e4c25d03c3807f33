//! Per-skill metadata overrides.
//!
//! The overrides document maps a skill identifier to the extra fields that
//! should be published for it:
//!
//! ```json
//! {
//!   "plan-work": { "category": "planning", "author": "Ada", "license": "MIT" }
//! }
//! ```
//!
//! The format follows the file extension: `.json` (default), `.yaml`/`.yml`
//! or `.toml`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{error::OverrideParseError, types::MetadataOverride};

/// Loaded overrides, keyed by skill identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    entries: BTreeMap<String, MetadataOverride>,
    path: Option<PathBuf>,
}

impl Overrides {
    pub fn get(&self, identifier: &str) -> Option<&MetadataOverride> {
        self.entries.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Document the overrides were read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Identifiers with an override but no entry satisfying `known`.
    pub fn unknown_identifiers<'a>(
        &'a self,
        known: impl Fn(&str) -> bool + 'a,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .keys()
            .map(String::as_str)
            .filter(move |id| !known(*id))
    }
}

impl FromIterator<(String, MetadataOverride)> for Overrides {
    fn from_iter<T: IntoIterator<Item = (String, MetadataOverride)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(id, o)| (id, o.normalized()))
                .collect(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self, OverrideParseError> {
        match path.extension().and_then(|e| e.to_str()) {
            None | Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some(other) => Err(OverrideParseError {
                path: path.to_path_buf(),
                reason: format!("unsupported format: .{other}"),
            }),
        }
    }
}

/// Load the overrides document at `path`.
///
/// `None`, or a path that does not exist, yields empty overrides.
pub fn load_overrides(path: Option<&Path>) -> Result<Overrides, OverrideParseError> {
    let Some(path) = path else {
        return Ok(Overrides::default());
    };
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no overrides document");
            return Ok(Overrides::default());
        },
        Err(e) => {
            return Err(OverrideParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        },
    };

    let mut overrides = parse_overrides(&content, path)?;
    overrides.path = Some(path.to_path_buf());
    tracing::debug!(path = %path.display(), count = overrides.len(), "loaded overrides");
    Ok(overrides)
}

/// Parse overrides text, picking the format from `path`'s extension.
pub fn parse_overrides(content: &str, path: &Path) -> Result<Overrides, OverrideParseError> {
    if content.trim().is_empty() {
        return Ok(Overrides::default());
    }

    let fail = |reason: String| OverrideParseError {
        path: path.to_path_buf(),
        reason,
    };
    let entries: BTreeMap<String, MetadataOverride> = match Format::from_path(path)? {
        Format::Json => serde_json::from_str(content).map_err(|e| fail(e.to_string()))?,
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| fail(e.to_string()))?,
        Format::Toml => toml::from_str(content).map_err(|e| fail(e.to_string()))?,
    };
    Ok(entries.into_iter().collect())
}
