//! Skill manifest registry: discovery, parsing, validation and index builds.
//!
//! Skills are directories containing a `SKILL.md` file whose header block
//! carries the skill's `name` and `description`. The pipeline walks a tree of
//! such directories, validates every manifest, layers optional per-skill
//! metadata overrides on top and emits one deterministic JSON index.
//!
//! ```text
//! discover → parse → validate ─┐
//!                              ├→ registry → skills.json
//!                  overrides ──┘
//! ```
//!
//! [`drift::check_drift`] reruns the same pipeline in memory to confirm a
//! committed index is current.

pub mod discover;
pub mod drift;
pub mod error;
pub mod overrides;
pub mod parse;
pub mod registry;
pub mod types;
pub mod validate;

pub use {
    drift::{DriftReport, DriftSummary, check_drift},
    error::{BuildError, DriftError},
    registry::{BuildOutput, BuildWarning, RegistryBuilder},
    types::{RegistryEntry, RegistryIndex},
};
