//! schemagen CLI
//!
//! Generates schema classes, tokens, plugin info and the registry document
//! from a schema layer.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use schemagen::{generate, GenConfig, TemplateSet};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemagen")]
#[command(about = "Generate schema classes and registry files from a schema layer")]
struct Cli {
    /// The source schema file
    #[arg(default_value = "./schema.usda")]
    schema_path: PathBuf,

    /// The target directory where the code should be generated
    #[arg(default_value = ".")]
    codegen_path: PathBuf,

    /// Directory containing the code generation templates
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Verify that the generated files are unchanged instead of writing them
    #[arg(long)]
    validate: bool,

    /// Only report warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the default configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    init_config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(path) = &cli.init_config {
        GenConfig::default()
            .save(&path.display().to_string())
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("Created config file: {}", path.display());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => GenConfig::load_from(Some(&path.display().to_string())),
        None => GenConfig::load(),
    }
    .context("loading configuration")?;
    if cli.validate {
        config.output.validate = true;
    }

    let templates = match &cli.templates {
        Some(dir) => TemplateSet::from_dir(dir)?,
        None => TemplateSet::embedded(),
    };

    let summary = generate(&cli.schema_path, &cli.codegen_path, &templates, &config)?;
    tracing::debug!("Processed {} classes", summary.classes.len());
    Ok(())
}
