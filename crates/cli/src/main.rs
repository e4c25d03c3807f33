mod registry_commands;

use std::{path::PathBuf, process::ExitCode};

use {
    clap::{Parser, Subcommand},
    skillreg_config::IdentifierRule,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "skillreg", version, about = "Build and verify the skills index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (default: skillreg.{toml,yaml,yml,json} in the working directory).
    #[arg(long, global = true, env = "SKILLREG_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the manifest tree (overrides config value).
    #[arg(long, global = true, env = "SKILLREG_ROOT")]
    root: Option<PathBuf>,

    /// Overrides document (overrides config value).
    #[arg(long, global = true)]
    overrides: Option<PathBuf>,

    /// Index artifact path (overrides config value).
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// How identifiers are derived: dir-name or relative-path.
    #[arg(long, global = true)]
    identifier_rule: Option<IdentifierRule>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and write it to the output path.
    Build,
    /// Check that the committed index matches a fresh build.
    Validate,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "skillreg starting");

    let result = registry_commands::resolve_config(&cli).and_then(|config| match cli.command {
        Commands::Build => registry_commands::handle_build(&config),
        Commands::Validate => registry_commands::handle_validate(&config),
    });

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}
