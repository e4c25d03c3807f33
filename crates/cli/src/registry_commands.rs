use std::{path::Path, process::ExitCode};

use {
    anyhow::{Context, Result, bail},
    skillreg_config::{RegistryConfig, Severity, SkillregConfig, validate},
    skillreg_skills::{BuildWarning, DriftError, RegistryBuilder, check_drift},
    tracing::info,
};

use crate::Cli;

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Load the config file, apply command-line overrides and reject configs the
/// pipeline cannot run with.
pub fn resolve_config(cli: &Cli) -> Result<RegistryConfig> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;

    let mut config = match cli.config {
        Some(ref path) => skillreg_config::load_config(&cwd.join(path))?,
        None => {
            let loaded = skillreg_config::discover_and_load(&cwd)?;
            match loaded.path {
                Some(ref path) => info!(path = %path.display(), "loaded config"),
                None => info!("no config file found, using defaults"),
            }
            loaded.config
        },
    };
    apply_cli(&mut config, cli, &cwd);

    let result = validate::validate(&config);
    for d in &result.diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }
    if result.has_errors() {
        bail!("invalid configuration");
    }

    Ok(config.registry)
}

/// Command-line values win over the config file. Relative flag paths are
/// taken from the working directory.
fn apply_cli(config: &mut SkillregConfig, cli: &Cli, cwd: &Path) {
    let reg = &mut config.registry;
    if let Some(ref root) = cli.root {
        reg.root = cwd.join(root);
    }
    if let Some(ref overrides) = cli.overrides {
        reg.overrides = Some(cwd.join(overrides));
    }
    if let Some(ref output) = cli.output {
        reg.output = cwd.join(output);
    }
    if let Some(rule) = cli.identifier_rule {
        reg.identifier_rule = rule;
    }
}

pub fn handle_build(config: &RegistryConfig) -> Result<ExitCode> {
    let builder = RegistryBuilder::from_config(config);
    match builder.run() {
        Ok(output) => {
            print_warnings(&output.warnings);
            eprintln!(
                "{GREEN}Wrote {} skill(s) to {}{RESET}",
                output.index.total,
                builder.output().display()
            );
            Ok(ExitCode::SUCCESS)
        },
        Err(e) => {
            eprintln!("{BOLD}{RED}error{RESET} {e}");
            Ok(ExitCode::FAILURE)
        },
    }
}

pub fn handle_validate(config: &RegistryConfig) -> Result<ExitCode> {
    let builder = RegistryBuilder::from_config(config);
    match check_drift(&builder) {
        Ok(report) => {
            print_warnings(&report.warnings);
            eprintln!(
                "{GREEN}{} is up to date ({} skill(s)){RESET}",
                report.artifact.display(),
                report.entries
            );
            Ok(ExitCode::SUCCESS)
        },
        Err(DriftError::ReadArtifact { path, source }) => {
            Err(source).with_context(|| format!("failed to read {}", path.display()))
        },
        Err(e) => {
            eprintln!("{BOLD}{RED}error{RESET} {e}");
            Ok(ExitCode::FAILURE)
        },
    }
}

fn print_warnings(warnings: &[BuildWarning]) {
    for w in warnings {
        eprintln!("  {BOLD}{YELLOW}warning{RESET} {w}");
    }
}
