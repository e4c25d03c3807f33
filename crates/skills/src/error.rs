//! Error kinds for the registry pipeline.
//!
//! Leaf errors ([`ParseError`], [`ValidationError`]) are collected per
//! manifest and surfaced together through [`BuildError::Invalid`]; only
//! [`BuildError`] and [`DriftError`] are terminal.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::drift::DriftSummary;

/// The manifest tree root could not be walked.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("skills root {} does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("skills root {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("skills root {} is unreadable: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a manifest header could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unreadable: {0}")]
    Read(#[source] std::io::Error),

    #[error("content is not valid UTF-8 (first invalid byte at offset {offset})")]
    NonUtf8 { offset: usize },

    #[error("missing opening `---` header delimiter on the first line")]
    MissingOpenDelimiter,

    #[error("missing closing `---` header delimiter")]
    MissingCloseDelimiter,

    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("line {line}: value of `{key}` spans multiple lines")]
    MultiLineValue { key: String, line: usize },

    #[error("line {line}: value of `{key}` is a nested structure, only scalars are allowed")]
    NestedValue { key: String, line: usize },

    #[error("line {line}: duplicate key `{key}`")]
    DuplicateKey { key: String, line: usize },
}

/// A manifest whose header could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{}: {kind}", path.display())]
pub struct ParseError {
    pub path: PathBuf,
    #[source]
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(path: impl Into<PathBuf>, kind: ParseErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Manifest field a [`Violation`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Name,
    Description,
    Identifier,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Description => write!(f, "description"),
            Self::Identifier => write!(f, "identifier"),
        }
    }
}

/// One schema rule broken by one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: Field,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A parsed manifest that broke one or more schema rules.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {}", path.display(), join(violations, "; "))]
pub struct ValidationError {
    pub path: PathBuf,
    /// In the validator's fixed check order.
    pub violations: Vec<Violation>,
}

/// The overrides document exists but is structurally invalid.
#[derive(Debug, thiserror::Error)]
#[error("invalid overrides document {}: {reason}", path.display())]
pub struct OverrideParseError {
    pub path: PathBuf,
    pub reason: String,
}

/// Per-manifest failure collected during a build.
#[derive(Debug, thiserror::Error)]
pub enum ManifestFailure {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl ManifestFailure {
    pub fn path(&self) -> &Path {
        match self {
            Self::Parse(e) => &e.path,
            Self::Invalid(e) => &e.path,
        }
    }
}

/// Every manifest that claimed the same identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIdentifier {
    pub identifier: String,
    pub paths: Vec<PathBuf>,
}

impl fmt::Display for DuplicateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
        write!(f, "`{}` claimed by {}", self.identifier, paths.join(", "))
    }
}

/// A build that produced no artifact.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("{} manifest(s) failed to load:\n{}", failures.len(), bullets(failures))]
    Invalid { failures: Vec<ManifestFailure> },

    #[error(transparent)]
    Overrides(#[from] OverrideParseError),

    #[error("duplicate skill identifier(s):\n{}", bullets(duplicates))]
    DuplicateIdentifier { duplicates: Vec<DuplicateIdentifier> },

    #[error("failed to serialize index: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write index: {0}")]
    Write(#[source] skillreg_common::Error),
}

/// The committed artifact does not match a fresh build.
#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("index {} is missing; run `skillreg build`", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("failed to read index {}: {source}", path.display())]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index {} is stale; run `skillreg build`:\n{summary}", path.display())]
    Stale { path: PathBuf, summary: DriftSummary },
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

fn bullets<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| format!("  - {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_lists_every_failure() {
        let err = BuildError::Invalid {
            failures: vec![
                ParseError::new("a/SKILL.md", ParseErrorKind::MissingCloseDelimiter).into(),
                ValidationError {
                    path: "b/SKILL.md".into(),
                    violations: vec![
                        Violation {
                            field: Field::Name,
                            message: "must not be empty".into(),
                        },
                        Violation {
                            field: Field::Description,
                            message: "is missing".into(),
                        },
                    ],
                }
                .into(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "2 manifest(s) failed to load:\n  \
             - a/SKILL.md: missing closing `---` header delimiter\n  \
             - b/SKILL.md: name: must not be empty; description: is missing"
        );
    }

    #[test]
    fn duplicate_error_names_all_paths() {
        let err = BuildError::DuplicateIdentifier {
            duplicates: vec![DuplicateIdentifier {
                identifier: "plan-work".into(),
                paths: vec!["a/plan-work/SKILL.md".into(), "b/plan-work/SKILL.md".into()],
            }],
        };
        let text = err.to_string();
        assert!(text.contains("`plan-work` claimed by a/plan-work/SKILL.md, b/plan-work/SKILL.md"));
    }
}
