//! Configuration sanity checks run before a build.
//!
//! These catch setups that would parse fine but make the pipeline misbehave,
//! such as an output path that collides with the overrides document.

use std::{fmt, path::Path};

use crate::schema::SkillregConfig;

/// Overrides document extensions the loader understands.
const OVERRIDES_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml"];

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "registry.output"
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Check a loaded config for settings the pipeline cannot work with.
#[must_use]
pub fn validate(config: &SkillregConfig) -> ValidationResult {
    let reg = &config.registry;
    let mut result = ValidationResult::default();

    if reg.manifest_file.trim().is_empty() {
        result.push(Severity::Error, "registry.manifest_file", "must not be empty");
    } else if reg.manifest_file.contains(['/', '\\']) {
        result.push(
            Severity::Error,
            "registry.manifest_file",
            format!(
                "'{}' must be a bare file name, not a path",
                reg.manifest_file
            ),
        );
    }

    if let Some(ref overrides) = reg.overrides {
        if overrides == &reg.output {
            result.push(
                Severity::Error,
                "registry.output",
                "output artifact and overrides document are the same file",
            );
        }
        let ext = overrides.extension().and_then(|e| e.to_str()).unwrap_or("json");
        if !OVERRIDES_EXTENSIONS.contains(&ext) {
            result.push(
                Severity::Error,
                "registry.overrides",
                format!("unsupported overrides format: .{ext}"),
            );
        }
    }

    if reg.output.file_name().and_then(|n| n.to_str()) == Some(reg.manifest_file.as_str()) {
        result.push(
            Severity::Error,
            "registry.output",
            "output artifact must not share the manifest file name",
        );
    }

    if reg.output.extension().and_then(|e| e.to_str()) != Some("json") {
        result.push(
            Severity::Warning,
            "registry.output",
            format!(
                "index is always written as JSON, but {} does not end in .json",
                display_name(&reg.output)
            ),
        );
    }

    result
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::schema::{RegistryConfig, SkillregConfig},
        std::path::PathBuf,
    };

    fn config(registry: RegistryConfig) -> SkillregConfig {
        SkillregConfig { registry }
    }

    #[test]
    fn default_config_is_clean() {
        let result = validate(&SkillregConfig::default());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn empty_manifest_file_is_error() {
        let result = validate(&config(RegistryConfig {
            manifest_file: "  ".into(),
            ..Default::default()
        }));
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].path, "registry.manifest_file");
    }

    #[test]
    fn output_colliding_with_overrides_is_error() {
        let result = validate(&config(RegistryConfig {
            overrides: Some(PathBuf::from("skills.json")),
            output: PathBuf::from("skills.json"),
            ..Default::default()
        }));
        assert!(result.has_errors());
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.message.contains("same file"))
        );
    }

    #[test]
    fn unsupported_overrides_extension_is_error() {
        let result = validate(&config(RegistryConfig {
            overrides: Some(PathBuf::from("meta.ini")),
            ..Default::default()
        }));
        assert!(result.has_errors());
    }

    #[test]
    fn non_json_output_only_warns() {
        let result = validate(&config(RegistryConfig {
            output: PathBuf::from("index.txt"),
            ..Default::default()
        }));
        assert!(!result.has_errors());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].severity, Severity::Warning);
    }
}
