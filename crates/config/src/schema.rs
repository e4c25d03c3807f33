//! Config schema for the registry pipeline.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Manifest file name looked for in every skill directory.
pub const DEFAULT_MANIFEST_FILE: &str = "SKILL.md";
/// Sidecar document holding per-skill metadata overrides.
pub const DEFAULT_OVERRIDES_FILE: &str = "skills-meta.json";
/// Published index consumed by the host application.
pub const DEFAULT_OUTPUT_FILE: &str = "skills.json";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkillregConfig {
    pub registry: RegistryConfig,
}

/// How a skill identifier is derived from the manifest's location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierRule {
    /// Final component of the directory holding the manifest.
    #[default]
    DirName,
    /// Directory holding the manifest relative to the root, joined with `/`.
    RelativePath,
}

impl IdentifierRule {
    /// Derive an identifier for the skill directory `skill_dir` under `root`.
    ///
    /// Returns an empty string when nothing can be derived (e.g. `skill_dir`
    /// is the root itself); the schema validator reports that case.
    pub fn derive(self, root: &Path, skill_dir: &Path) -> String {
        match self {
            Self::DirName => skill_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::RelativePath => skill_dir
                .strip_prefix(root)
                .map(|rel| {
                    rel.components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .unwrap_or_default(),
        }
    }

    /// Whether `/` is a legal character inside identifiers under this rule.
    pub fn allows_separator(self) -> bool {
        matches!(self, Self::RelativePath)
    }
}

impl fmt::Display for IdentifierRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirName => write!(f, "dir-name"),
            Self::RelativePath => write!(f, "relative-path"),
        }
    }
}

impl FromStr for IdentifierRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dir-name" => Ok(Self::DirName),
            "relative-path" => Ok(Self::RelativePath),
            other => Err(format!(
                "unknown identifier rule '{other}' (expected dir-name or relative-path)"
            )),
        }
    }
}

/// `[registry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Root of the manifest tree.
    pub root: PathBuf,
    /// File name that marks a skill directory.
    pub manifest_file: String,
    /// Overrides document. `None` disables overrides entirely.
    pub overrides: Option<PathBuf>,
    /// Where the index artifact is written.
    pub output: PathBuf,
    pub identifier_rule: IdentifierRule,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            manifest_file: DEFAULT_MANIFEST_FILE.into(),
            overrides: Some(PathBuf::from(DEFAULT_OVERRIDES_FILE)),
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
            identifier_rule: IdentifierRule::default(),
        }
    }
}

impl RegistryConfig {
    /// Anchor relative paths at `base` (the config file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        self.root = anchor(base, &self.root);
        self.output = anchor(base, &self.output);
        if let Some(ref overrides) = self.overrides {
            self.overrides = Some(anchor(base, overrides));
        }
    }
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_name_rule_uses_last_component() {
        let rule = IdentifierRule::DirName;
        assert_eq!(
            rule.derive(Path::new("/repo"), Path::new("/repo/tools/plan-work")),
            "plan-work"
        );
    }

    #[test]
    fn relative_path_rule_joins_components() {
        let rule = IdentifierRule::RelativePath;
        assert_eq!(
            rule.derive(Path::new("/repo"), Path::new("/repo/tools/plan-work")),
            "tools/plan-work"
        );
        assert_eq!(rule.derive(Path::new("/repo"), Path::new("/repo")), "");
    }

    #[test]
    fn identifier_rule_round_trips_through_str() {
        for rule in [IdentifierRule::DirName, IdentifierRule::RelativePath] {
            assert_eq!(rule.to_string().parse::<IdentifierRule>().unwrap(), rule);
        }
        assert!("flat".parse::<IdentifierRule>().is_err());
    }

    #[test]
    fn resolve_paths_keeps_absolute_paths() {
        let mut cfg = RegistryConfig {
            output: PathBuf::from("/abs/skills.json"),
            ..Default::default()
        };
        cfg.resolve_paths(Path::new("/work"));
        assert_eq!(cfg.root, PathBuf::from("/work/."));
        assert_eq!(cfg.output, PathBuf::from("/abs/skills.json"));
        assert_eq!(cfg.overrides, Some(PathBuf::from("/work/skills-meta.json")));
    }
}
