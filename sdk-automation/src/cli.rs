///
/// This module implements the CLI surface of sdk-automation: argument
/// parsing, choosing between single-pointer and batch mode, and wiring the
/// production collaborators into the orchestrator.
///
/// All generation, versioning and comparison logic lives in
/// [`sdk-automation-core`]; this module only decides what to run and which
/// exit code to report.
///
/// ## Modes
/// - Batch: `sdk-automation <input.json> <output.json>` reads a batch record,
///   processes every related project and writes `{ "packages": [...] }`.
///   Of the other flags only `--config-file`, `--sdk-root`, `--autorest`
///   and `--use` apply.
/// - Single: `-r/--readme` or `-c/--tsp-config` names one spec pointer; the
///   report is printed to stdout.
///
/// [`sdk-automation-core`]: ../../sdk-automation-core/
use crate::load_config::{default_config, load_config};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use sdk_automation_core::config::RunOptions;
use sdk_automation_core::orchestrate::{BatchInput, Orchestrator};
use sdk_automation_core::process::SystemRunner;
use sdk_automation_core::registry::MavenRegistry;
use std::path::PathBuf;

/// CLI for sdk-automation: generate, version, build and compare SDK modules.
#[derive(Parser, Debug, Default)]
#[clap(
    name = "sdk-automation",
    disable_version_flag = true,
    about = "Generate SDK modules from API specs, integrate them into the monorepo and report changes"
)]
pub struct Cli {
    /// Base URL or directory for resolving legacy readme paths
    #[clap(long)]
    pub spec_root: Option<String>,

    /// Legacy readme spec pointer
    #[clap(short = 'r', long)]
    pub readme: Option<String>,

    /// TypeSpec project pointer (tspconfig.yaml URL or project directory)
    #[clap(short = 'c', long)]
    pub tsp_config: Option<String>,

    #[clap(short = 't', long)]
    pub tag: Option<String>,

    /// Explicit version for the module
    #[clap(short = 'v', long)]
    pub version: Option<String>,

    #[clap(short = 's', long)]
    pub service: Option<String>,

    #[clap(long)]
    pub suffix: Option<String>,

    /// Generator executable
    #[clap(long)]
    pub autorest: Option<String>,

    /// Generator plugin
    #[clap(short = 'u', long = "use")]
    pub use_plugin: Option<String>,

    /// Extra generator arguments, split on whitespace
    #[clap(long, allow_hyphen_values = true)]
    pub autorest_options: Option<String>,

    /// Produce a stable (non-preview) version
    #[clap(long)]
    pub stable: bool,

    /// YAML automation config
    #[clap(long)]
    pub config_file: Option<PathBuf>,

    /// Monorepo root; overrides the config file
    #[clap(long)]
    pub sdk_root: Option<PathBuf>,

    /// Batch input record (JSON)
    #[clap(requires = "output")]
    pub input: Option<PathBuf>,

    /// Batch output report (JSON)
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            preview: !self.stable,
            version: self.version.clone(),
            service: self.service.clone(),
            suffix: self.suffix.clone(),
            tag: self.tag.clone(),
            spec_root: self.spec_root.clone(),
            autorest: self.autorest.clone(),
            use_plugin: self.use_plugin.clone(),
            autorest_options: self.autorest_options.clone(),
        }
    }
}

/// Async entrypoint for main() and tests. Returns the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    tracing::info!("trace_initialised");

    let mut automation = match &cli.config_file {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    if let Some(root) = &cli.sdk_root {
        automation.sdk_root = root.clone();
    }
    automation.trace_loaded();

    let runner = SystemRunner;
    let registry = MavenRegistry::new(automation.registry_url.clone());
    let orchestrator = Orchestrator::new(&automation, &runner, &registry);

    if let (Some(input), Some(output)) = (&cli.input, &cli.output) {
        tracing::info!(input = %input.display(), output = %output.display(), "Running batch mode");
        let batch = BatchInput::load(input)
            .with_context(|| format!("Failed to read batch input {}", input.display()))?;
        let options = RunOptions {
            autorest: cli.autorest.clone(),
            use_plugin: cli.use_plugin.clone(),
            ..RunOptions::default()
        };
        let report = orchestrator.run_batch(&batch, &options).await?;
        report.write(output)?;
        return Ok(report.exit_code());
    }

    let pointer = cli
        .readme
        .clone()
        .or_else(|| cli.tsp_config.clone())
        .ok_or_else(|| anyhow!("one of --readme, --tsp-config or <input.json> <output.json> is required"))?;
    tracing::info!(pointer = %pointer, "Running single mode");
    let report = orchestrator.run_single(&pointer, &cli.run_options()).await?;
    println!("{}", report.to_json()?);
    Ok(report.exit_code())
}
