//! Configuration file commands: `genforge init` and `genforge config`.

use anyhow::{Context, Result};
use std::path::Path;

use super::super::{Cli, ConfigCommands, ScoringArgs};

pub fn cmd_init(project_dir: &Path, force: bool) -> Result<()> {
    use genforge::genforge_config::{CONFIG_DIR, CONFIG_FILE, GenforgeToml};

    let config_dir = project_dir.join(CONFIG_DIR);
    let config_path = config_dir.join(CONFIG_FILE);

    if config_path.exists() && !force {
        println!("genforge.toml already exists at {}", config_path.display());
        println!("Pass --force to overwrite it.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    GenforgeToml::default().save(&config_path)?;

    println!("Created genforge.toml at {}", config_path.display());
    println!();
    println!("You can now customize:");
    println!("  - [generation] minimum_score, timeout_secs, default_stack");
    println!("  - [ai] model, max_attempts, backoff");
    println!("  - [sandbox] install_cmd, build_cmd, serve_cmd, env");
    println!();
    println!("Set ANTHROPIC_API_KEY in your environment or a .env file.");
    Ok(())
}

pub fn cmd_config(cli: &Cli, project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let config = super::load_config(cli, project_dir, ScoringArgs::default())?;

    match command {
        None | Some(ConfigCommands::Show) => {
            let config_path = config.config_file();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No genforge.toml found at {} (using defaults)", config_path.display());
            }
            println!();
            let rendered =
                toml::to_string_pretty(&config.toml).context("Failed to render configuration")?;
            println!("{}", rendered.trim_end());
            println!();
            println!("Effective values (with env/CLI overrides):");
            println!("  model = \"{}\"", config.model());
            println!("  minimum_score = {}", config.minimum_score());
            println!(
                "  api_key = {}",
                if config.api_key().is_some() { "set" } else { "not set" }
            );
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
    }
    Ok(())
}
