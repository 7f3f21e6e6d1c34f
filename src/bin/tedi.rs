//! Tedi CLI - Build tool for related container images
//!
//! Commands: render, build, acquire, facts, clean
//! Any failure prints a diagnostic and exits non-zero.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use tedi_core::{
    logging::{init_logging, LoggingConfig},
    DockerBuildTool, Factset, Project, ProjectError, ProjectOptions, SourceFetcher,
};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("Could not serialize facts: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser)]
#[command(name = "tedi")]
#[command(about = "Tedi - resolve facts, acquire assets and build container images")]
#[command(version = tedi_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the project directory
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Override a fact (repeatable)
    #[arg(short, long = "fact", global = true, value_name = "KEY=VALUE", value_parser = parse_fact)]
    facts: Vec<(String, String)>,

    /// Share one asset cache between all images
    #[arg(long, global = true)]
    shared_cache: bool,

    /// Download timeout in seconds
    #[arg(long, global = true, default_value_t = 600)]
    timeout: u64,

    /// Container build program
    #[arg(long, global = true, default_value = "docker")]
    docker: String,

    /// More logging (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire assets and render every image's build context
    Render,

    /// Render, then build every image
    Build,

    /// Acquire assets only
    Acquire,

    /// Print resolved facts as JSON
    Facts {
        /// Show one image's facts instead of the project's
        #[arg(short, long)]
        image: Option<String>,
    },

    /// Remove rendered build contexts
    Clean {
        /// Also remove the asset cache
        #[arg(long)]
        assets: bool,
    },
}

fn parse_fact(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got \"{arg}\"")),
    }
}

fn fact_overrides(pairs: Vec<(String, String)>) -> Result<Factset, ProjectError> {
    let mut facts = Factset::empty();
    for (key, value) in pairs {
        facts
            .insert(key, value)
            .map_err(|source| ProjectError::Facts {
                scope: "--fact".to_string(),
                source,
            })?;
    }
    Ok(facts)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let fact_overrides = fact_overrides(cli.facts)?;
    let options = ProjectOptions {
        env: None,
        fact_overrides,
        shared_asset_cache: cli.shared_cache,
    };
    let project = Project::open_with(cli.project, options)?;
    let fetcher = SourceFetcher::new().with_timeout(Duration::from_secs(cli.timeout));
    let tool = DockerBuildTool::with_program(cli.docker);

    match cli.command {
        Commands::Render => project.render(&tool, &fetcher)?,
        Commands::Build => {
            project.render(&tool, &fetcher)?;
            project.build(&tool, &fetcher)?;
        }
        Commands::Acquire => project.acquire(&fetcher)?,
        Commands::Facts { image } => {
            let facts = match image {
                Some(name) => project.image(&name)?.facts(),
                None => project.facts(),
            };
            println!("{}", serde_json::to_string_pretty(facts)?);
        }
        Commands::Clean { assets } => project.clean(assets)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&LoggingConfig::from_verbosity(cli.verbose, cli.quiet));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
