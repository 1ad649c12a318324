use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, DEFAULT_CONFIG_TEMPLATE};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show {
        /// Output format: toml (default) or json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Get a configuration value
    Get {
        /// Config key (e.g., pledge.enforcement)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Config key (e.g., pledge.enforcement)
        key: String,

        /// Value to set
        value: String,
    },

    /// Show config file path
    Path,

    /// Initialize default config file
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(args: ConfigArgs, config_file: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommands::Show { format } => show_config(&format, config_file),
        ConfigCommands::Get { key } => get_config(&key, config_file),
        ConfigCommands::Set { key, value } => set_config(&key, &value, config_file),
        ConfigCommands::Path => show_path(config_file),
        ConfigCommands::Init { force } => init_config(force, config_file),
    }
}

fn show_config(format: &str, config_file: Option<&Path>) -> Result<()> {
    let config = Config::load_or(config_file)?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        _ => {
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
    }

    Ok(())
}

fn get_config(key: &str, config_file: Option<&Path>) -> Result<()> {
    let config = Config::load_or(config_file)?;
    let value = config.get_value(key)?;
    println!("{}", value);
    Ok(())
}

fn set_config(key: &str, value: &str, config_file: Option<&Path>) -> Result<()> {
    let mut config = Config::load_or(config_file)?;
    config.set_value(key, value)?;
    config.save()?;
    println!("Set {} = {}", key, value);
    Ok(())
}

fn target_path(config_file: Option<&Path>) -> Result<PathBuf> {
    match config_file {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path(),
    }
}

fn show_path(config_file: Option<&Path>) -> Result<()> {
    println!("{}", target_path(config_file)?.display());
    Ok(())
}

fn init_config(force: bool, config_file: Option<&Path>) -> Result<()> {
    let path = target_path(config_file)?;
    write_template(&path, force)?;
    println!("Created config file at {}", path.display());
    Ok(())
}

fn write_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        write_template(&path, false).unwrap();
        std::fs::write(&path, "[logging]\nlevel = \"trace\"\n").unwrap();

        let err = write_template(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));

        write_template(&path, true).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            DEFAULT_CONFIG_TEMPLATE
        );
    }

    #[test]
    fn explicit_file_wins_over_resolved_path() {
        let path = Path::new("/etc/sbpledge/config.toml");
        assert_eq!(target_path(Some(path)).unwrap(), path);
    }
}
