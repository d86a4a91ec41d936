use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use shroud::{
    Orchestrator, RunOptions, RunReport,
    config::Config,
    matcher::MatchPolicy,
    names::RandomIdentifiers,
    types::ComponentKind,
};

#[derive(Parser, Debug)]
#[command(name = "shroud")]
#[command(about = "Rename Android manifest components to opaque identifiers")]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(default_value = ".")]
    project: PathBuf,

    /// Extra configuration file, applied over the user and project files
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Manifest path relative to the project root
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Source root relative to the project root; may be repeated
    #[arg(long = "source-root")]
    source_roots: Vec<PathBuf>,

    /// How component names are matched in source text
    #[arg(long, value_enum)]
    match_policy: Option<MatchPolicy>,

    /// Do not treat same-package components as implicitly imported
    #[arg(long)]
    no_same_package: bool,

    /// Do not treat wildcard imports as importing every component
    #[arg(long)]
    no_wildcard_imports: bool,

    /// Component kind to rename; may be repeated
    #[arg(long = "component", value_enum)]
    components: Vec<ComponentKind>,

    /// Random bits per generated name
    #[arg(long)]
    name_bits: Option<u32>,

    /// Mapping checkpoint path relative to the project root
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Ignore an existing checkpoint and generate new names
    #[arg(long)]
    fresh: bool,

    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the mapping as TOML when done
    #[arg(long)]
    print_mapping: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Apply command-line overrides, the last configuration layer
    fn apply(&self, config: &mut Config) {
        if let Some(manifest) = &self.manifest {
            config.manifest.clone_from(manifest);
        }
        if !self.source_roots.is_empty() {
            config.source_roots.clone_from(&self.source_roots);
        }
        if let Some(match_policy) = self.match_policy {
            config.match_policy = match_policy;
        }
        if self.no_same_package {
            config.same_package = false;
        }
        if self.no_wildcard_imports {
            config.wildcard_imports = false;
        }
        if !self.components.is_empty() {
            config.components.clone_from(&self.components);
        }
        if let Some(name_bits) = self.name_bits {
            config.name_bits = name_bits;
        }
        if let Some(checkpoint) = &self.checkpoint {
            config.checkpoint.clone_from(checkpoint);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if verbose > 0 || std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(level);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let project_root = cli.project.as_path();
    if !project_root.is_dir() {
        anyhow::bail!("Project root {} is not a directory", project_root.display());
    }

    let mut config = Config::load(project_root, cli.config.as_deref())?;
    cli.apply(&mut config);

    let mut ids = RandomIdentifiers::new(config.name_bits);
    let options = RunOptions {
        fresh: cli.fresh,
        dry_run: cli.dry_run,
    };
    let report = Orchestrator::new(config, project_root)
        .run(&mut ids, options)
        .with_context(|| format!("Failed to obfuscate {}", project_root.display()))?;

    if cli.print_mapping {
        print_mapping(&report)?;
    }
    summarize(&report, project_root);

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[allow(clippy::print_stdout)]
fn print_mapping(report: &RunReport) -> Result<()> {
    let toml = report
        .mapping
        .to_toml()
        .context("Failed to serialize the mapping")?;
    print!("{toml}");
    Ok(())
}

fn summarize(report: &RunReport, project_root: &Path) {
    if !report.is_success() {
        error!("{} files could not be processed", report.failures.len());
    }
    if report.dry_run {
        warn!("Dry run: nothing under {} was written", project_root.display());
    }
    info!(
        "{} components mapped{}; {} files rewritten, {} renamed, {} failed",
        report.mapping.len(),
        if report.resumed { " (resumed)" } else { "" },
        report.rewritten.len(),
        report.renamed.len(),
        report.failures.len()
    );
}
