//! Configuration loading and validation for the skill registry tooling.
//!
//! Config files: `skillreg.toml`, `skillreg.yaml`, `skillreg.yml` or
//! `skillreg.json`, searched in the working directory.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{LoadedConfig, discover_and_load, load_config},
    schema::{IdentifierRule, RegistryConfig, SkillregConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
