use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "genforge")]
#[command(version, about = "AI project generator: generate, score, and sandbox-build web projects")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Directory holding `.genforge/genforge.toml` (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// AI model. Overrides GENFORGE_MODEL and genforge.toml.
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default .genforge/genforge.toml
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// List the built-in project stacks
    Stacks {
        #[arg(long)]
        json: bool,
    },
    /// Generate a project with the AI service and write it to a directory
    Generate {
        /// Read the generation plan from a JSON file instead of flags
        #[arg(long, conflicts_with_all = ["name", "description", "stack", "components", "files"])]
        plan: Option<PathBuf>,

        /// Project name
        #[arg(short, long)]
        name: Option<String>,

        /// What the project is about
        #[arg(short, long)]
        description: Option<String>,

        /// Stack id (see `genforge stacks`)
        #[arg(short, long)]
        stack: Option<String>,

        /// Component to generate (repeatable)
        #[arg(short = 'c', long = "component")]
        components: Vec<String>,

        /// Extra file that must exist in the result (repeatable)
        #[arg(short = 'f', long = "file")]
        files: Vec<String>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Write into a non-empty output directory
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        scoring: ScoringArgs,

        /// Print the result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Score a project directory or an AI JSON dump
    Score {
        /// Directory, or a file holding a JSON object of path → content
        path: PathBuf,

        /// Stack id, used to pick the manifest and entry points checked
        #[arg(short, long)]
        stack: Option<String>,

        #[command(flatten)]
        scoring: ScoringArgs,

        /// Exit non-zero when the report does not pass
        #[arg(long)]
        strict: bool,

        #[arg(long)]
        json: bool,
    },
    /// Install, build and preview a project in a sandbox; prints the final session as JSON
    Build {
        /// Directory, or a file holding a JSON object of path → content
        path: PathBuf,

        /// Keep the preview server running until Ctrl-C
        #[arg(long)]
        serve: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(clap::Args, Clone, Copy, Debug, Default)]
pub struct ScoringArgs {
    /// Minimum passing score. Overrides GENFORGE_MIN_SCORE and genforge.toml.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_score: Option<u8>,

    /// Also score lint, imports, dead code and type safety
    #[arg(long)]
    pub extended: bool,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "genforge=debug" } else { "genforge=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    init_tracing(cli.verbose, cli.log_json);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init { force } => cmd::cmd_init(&project_dir, *force)?,
        Commands::Stacks { json } => cmd::cmd_stacks(*json)?,
        Commands::Generate {
            plan,
            name,
            description,
            stack,
            components,
            files,
            output,
            force,
            scoring,
            json,
        } => {
            let request = cmd::GenerateRequest {
                plan_file: plan.clone(),
                name: name.clone(),
                description: description.clone(),
                stack: stack.clone(),
                components: components.clone(),
                files: files.clone(),
                output: output.clone(),
                force: *force,
                json: *json,
            };
            let complete = cmd::cmd_generate(&cli, &project_dir, request, *scoring).await?;
            if !complete {
                std::process::exit(1);
            }
        }
        Commands::Score {
            path,
            stack,
            scoring,
            strict,
            json,
        } => {
            let passed = cmd::cmd_score(&cli, &project_dir, path, stack.as_deref(), *scoring, *json)?;
            if *strict && !passed {
                std::process::exit(1);
            }
        }
        Commands::Build { path, serve } => {
            let completed = cmd::cmd_build(&cli, &project_dir, path, *serve).await?;
            if !completed {
                std::process::exit(1);
            }
        }
        Commands::Config { command } => cmd::cmd_config(&cli, &project_dir, command.clone())?,
    }

    Ok(())
}
