use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use {
    skillreg_config::{IdentifierRule, RegistryConfig, schema::DEFAULT_MANIFEST_FILE},
    tracing::{debug, info, warn},
};

use crate::{
    discover::{SkillTree, SkippedPath},
    error::{BuildError, DuplicateIdentifier, ManifestFailure, ParseError, ParseErrorKind},
    overrides::{Overrides, load_overrides},
    parse::parse_manifest,
    types::{ManifestCandidate, RegistryEntry, RegistryIndex, SkillManifest},
    validate::promote,
};

/// Something worth reporting that did not stop the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// An override names an identifier no manifest produced.
    UnknownOverride { identifier: String },
    /// Discovery could not descend into a path.
    SkippedPath(SkippedPath),
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOverride { identifier } => {
                write!(f, "override for unknown skill `{identifier}` ignored")
            },
            Self::SkippedPath(skipped) => match skipped.path {
                Some(ref path) => write!(f, "skipped {}: {}", path.display(), skipped.reason),
                None => write!(f, "skipped entry: {}", skipped.reason),
            },
        }
    }
}

/// A successful in-memory build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub index: RegistryIndex,
    /// Exactly what [`RegistryBuilder::write`] puts on disk.
    pub bytes: Vec<u8>,
    pub warnings: Vec<BuildWarning>,
}

/// Builds the skills index from a manifest tree.
///
/// Every input is an explicit parameter; nothing is read from the
/// environment or the working directory.
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    root: PathBuf,
    manifest_file: String,
    identifier_rule: IdentifierRule,
    overrides: Option<PathBuf>,
    output: PathBuf,
}

impl RegistryBuilder {
    /// Builder for the tree at `root` writing to `output`, with the default
    /// manifest file name, the default identifier rule and no overrides.
    pub fn new(root: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            identifier_rule: IdentifierRule::default(),
            overrides: None,
            output: output.into(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            root: config.root.clone(),
            manifest_file: config.manifest_file.clone(),
            identifier_rule: config.identifier_rule,
            overrides: config.overrides.clone(),
            output: config.output.clone(),
        }
    }

    pub fn with_manifest_file(mut self, manifest_file: impl Into<String>) -> Self {
        self.manifest_file = manifest_file.into();
        self
    }

    pub fn with_identifier_rule(mut self, rule: IdentifierRule) -> Self {
        self.identifier_rule = rule;
        self
    }

    pub fn with_overrides(mut self, path: Option<PathBuf>) -> Self {
        self.overrides = path;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Run the whole pipeline in memory. Nothing is written.
    pub fn build(&self) -> Result<BuildOutput, BuildError> {
        let tree = SkillTree::open(&self.root, &self.manifest_file)?;
        let mut candidates = tree.candidates();

        let mut manifests = Vec::new();
        let mut failures = Vec::new();
        for path in candidates.by_ref() {
            match self.load(&tree, path) {
                Ok(manifest) => manifests.push(manifest),
                Err(failure) => {
                    debug!(path = %failure.path().display(), %failure, "manifest rejected");
                    failures.push(failure);
                },
            }
        }
        let skipped = candidates.into_skipped();
        info!(
            root = %self.root.display(),
            valid = manifests.len(),
            failed = failures.len(),
            "scanned skills tree"
        );

        if !failures.is_empty() {
            return Err(BuildError::Invalid { failures });
        }

        let overrides = load_overrides(self.overrides.as_deref())?;
        let (index, mut warnings) = assemble(manifests, &overrides)?;
        warnings.extend(skipped.into_iter().map(BuildWarning::SkippedPath));
        let bytes = render(&index)?;

        Ok(BuildOutput {
            index,
            bytes,
            warnings,
        })
    }

    /// Persist a build atomically at the output path.
    pub fn write(&self, output: &BuildOutput) -> Result<(), BuildError> {
        skillreg_common::fs::write_atomic(&self.output, &output.bytes).map_err(BuildError::Write)?;
        info!(
            path = %self.output.display(),
            total = output.index.total,
            "wrote skills index"
        );
        Ok(())
    }

    /// Build and, only if that fully succeeds, write.
    pub fn run(&self) -> Result<BuildOutput, BuildError> {
        let output = self.build()?;
        self.write(&output)?;
        Ok(output)
    }

    fn load(&self, tree: &SkillTree, path: PathBuf) -> Result<SkillManifest, ManifestFailure> {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => return Err(ParseError::new(path, ParseErrorKind::Read(e)).into()),
        };
        let manifest = parse_manifest(&bytes, &path)?;
        let identifier = path
            .parent()
            .map(|dir| self.identifier_rule.derive(tree.root(), dir))
            .unwrap_or_default();
        let candidate = ManifestCandidate {
            identifier,
            source_path: path,
            manifest,
        };
        promote(candidate, self.identifier_rule).map_err(ManifestFailure::from)
    }
}

/// Merge overrides onto validated manifests and order the result.
///
/// Fails when two manifests share an identifier, naming every source path.
pub fn assemble(
    manifests: Vec<SkillManifest>,
    overrides: &Overrides,
) -> Result<(RegistryIndex, Vec<BuildWarning>), BuildError> {
    let mut claims: BTreeMap<&str, Vec<&Path>> = BTreeMap::new();
    for manifest in &manifests {
        claims
            .entry(manifest.identifier.as_str())
            .or_default()
            .push(manifest.source_path());
    }
    let duplicates: Vec<DuplicateIdentifier> = claims
        .iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(identifier, paths)| DuplicateIdentifier {
            identifier: (*identifier).to_string(),
            paths: paths.iter().map(|p| p.to_path_buf()).collect(),
        })
        .collect();
    if !duplicates.is_empty() {
        return Err(BuildError::DuplicateIdentifier { duplicates });
    }

    let warnings: Vec<BuildWarning> = overrides
        .unknown_identifiers(|id| claims.contains_key(id))
        .map(|identifier| {
            warn!(identifier, "override for unknown skill ignored");
            BuildWarning::UnknownOverride {
                identifier: identifier.to_string(),
            }
        })
        .collect();

    let mut entries: Vec<RegistryEntry> = manifests
        .iter()
        .map(|m| RegistryEntry::from_manifest(m, overrides.get(&m.identifier)))
        .collect();
    entries.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    Ok((RegistryIndex::from_sorted_entries(entries), warnings))
}

/// Serialize an index exactly as it is published: two-space indented JSON
/// with a trailing newline.
pub fn render(index: &RegistryIndex) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec_pretty(index)?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::types::MetadataOverride};

    fn write_skill(root: &Path, dir: &str, name: &str, description: &str) {
        let skill_dir = root.join(dir);
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            format!("---\nname: {name}\ndescription: {description}\n---\n\n# {name}\n"),
        )
        .unwrap();
    }

    fn manifest(identifier: &str, path: &str) -> SkillManifest {
        SkillManifest {
            identifier: identifier.into(),
            name: identifier.into(),
            description: "d".into(),
            source_path: PathBuf::from(path),
            body: String::new(),
        }
    }

    #[test]
    fn builds_sorted_index() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("skills");
        write_skill(&root, "zebra", "zebra", "Z");
        write_skill(&root, "tools/alpha", "alpha", "A");
        write_skill(&root, "mango", "mango", "M");

        let out = RegistryBuilder::new(&root, tmp.path().join("skills.json"))
            .build()
            .unwrap();
        let ids: Vec<_> = out.index.skills.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mango", "zebra"]);
        assert_eq!(out.index.total, 3);
        assert!(out.warnings.is_empty());
        assert!(out.bytes.ends_with(b"}\n"));
    }

    #[test]
    fn relative_path_rule_keeps_nesting() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "tools/plan-work", "plan-work", "P");
        let out = RegistryBuilder::new(tmp.path(), tmp.path().join("skills.json"))
            .with_identifier_rule(IdentifierRule::RelativePath)
            .build()
            .unwrap();
        assert_eq!(out.index.skills[0].identifier, "tools/plan-work");
    }

    #[test]
    fn collects_every_failure() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "good", "good", "fine");
        write_skill(tmp.path(), "no-desc", "no-desc", "");
        std::fs::create_dir_all(tmp.path().join("no-header")).unwrap();
        std::fs::write(tmp.path().join("no-header/SKILL.md"), "# just markdown\n").unwrap();

        let err = RegistryBuilder::new(tmp.path(), tmp.path().join("skills.json"))
            .build()
            .unwrap_err();
        let BuildError::Invalid { failures } = err else {
            panic!("expected invalid, got {err:?}");
        };
        let paths: Vec<_> = failures
            .iter()
            .map(|f| f.path().parent().unwrap().file_name().unwrap().to_owned())
            .collect();
        assert_eq!(paths, vec!["no-desc", "no-header"]);
    }

    #[test]
    fn failed_build_leaves_artifact_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "bad", "", "x");
        let output = tmp.path().join("out/skills.json");
        std::fs::create_dir_all(output.parent().unwrap()).unwrap();
        std::fs::write(&output, "previous").unwrap();

        assert!(RegistryBuilder::new(tmp.path(), &output).run().is_err());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous");
    }

    #[test]
    fn run_writes_rendered_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("skills");
        write_skill(&root, "a", "a", "A");
        let output = tmp.path().join("skills.json");

        let out = RegistryBuilder::new(&root, &output).run().unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), out.bytes);
    }

    #[test]
    fn assemble_reports_all_duplicate_paths() {
        let err = assemble(
            vec![
                manifest("plan-work", "a/plan-work/SKILL.md"),
                manifest("other", "other/SKILL.md"),
                manifest("plan-work", "b/plan-work/SKILL.md"),
            ],
            &Overrides::default(),
        )
        .unwrap_err();
        let BuildError::DuplicateIdentifier { duplicates } = err else {
            panic!("expected duplicate error");
        };
        assert_eq!(duplicates, vec![DuplicateIdentifier {
            identifier: "plan-work".into(),
            paths: vec!["a/plan-work/SKILL.md".into(), "b/plan-work/SKILL.md".into()],
        }]);
    }

    #[test]
    fn assemble_merges_overrides_and_warns_on_unknown() {
        let overrides: Overrides = [
            ("b".to_string(), MetadataOverride {
                category: Some("dev-tools".into()),
                license: Some("MIT".into()),
                ..Default::default()
            }),
            ("ghost".to_string(), MetadataOverride::default()),
        ]
        .into_iter()
        .collect();

        let (index, warnings) =
            assemble(vec![manifest("b", "b/SKILL.md"), manifest("a", "a/SKILL.md")], &overrides)
                .unwrap();
        assert_eq!(index.skills[0].identifier, "a");
        assert_eq!(index.skills[0].category, None);
        assert_eq!(index.skills[1].category.as_deref(), Some("dev-tools"));
        assert_eq!(index.skills[1].license.as_deref(), Some("MIT"));
        assert_eq!(index.categories.len(), 1);
        assert_eq!(warnings, vec![BuildWarning::UnknownOverride {
            identifier: "ghost".into()
        }]);
    }

    #[test]
    fn render_is_pretty_with_trailing_newline() {
        let (index, _) = assemble(vec![manifest("a", "a/SKILL.md")], &Overrides::default()).unwrap();
        let text = String::from_utf8(render(&index).unwrap()).unwrap();
        assert_eq!(
            text,
            "{\n  \"version\": 1,\n  \"total\": 1,\n  \"skills\": [\n    {\n      \
             \"identifier\": \"a\",\n      \"name\": \"a\",\n      \"description\": \"d\"\n    \
             }\n  ],\n  \"categories\": []\n}\n"
        );
    }
}
