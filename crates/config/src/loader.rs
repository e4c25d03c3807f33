use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::SkillregConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "skillreg.toml",
    "skillreg.yaml",
    "skillreg.yml",
    "skillreg.json",
];

/// A config together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SkillregConfig,
    /// `None` when no config file was found and defaults were used.
    pub path: Option<PathBuf>,
}

/// Load config from the given path (any supported format).
///
/// Relative paths inside the file are anchored at the file's directory.
pub fn load_config(path: &Path) -> Result<SkillregConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    let mut config = parse_config(&raw, path)
        .with_context(|| format!("invalid config {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.registry.resolve_paths(base);
    Ok(config)
}

/// Discover and load config from `dir`.
///
/// Looks for `skillreg.{toml,yaml,yml,json}` in `dir`. When none exists the
/// defaults are used, anchored at `dir`. A file that exists but fails to
/// parse is an error: silently building with defaults would publish the
/// wrong index.
pub fn discover_and_load(dir: &Path) -> Result<LoadedConfig> {
    if let Some(path) = find_config_file(dir) {
        debug!(path = %path.display(), "loading config");
        let config = load_config(&path)?;
        return Ok(LoadedConfig {
            config,
            path: Some(path),
        });
    }

    debug!(dir = %dir.display(), "no config file found, using defaults");
    let mut config = SkillregConfig::default();
    config.registry.resolve_paths(dir);
    Ok(LoadedConfig { config, path: None })
}

fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

fn parse_config(raw: &str, path: &Path) -> Result<SkillregConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::message(format!("unsupported config format: .{ext}"))),
    }
}
