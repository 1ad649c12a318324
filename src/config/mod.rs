use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths::Paths;
use crate::pledge::{Enforcement, PromiseMask};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolved XDG-compliant paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    /// Explicit config file from `--config`, if any (not serialized)
    #[serde(skip)]
    pub file_override: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub pledge: PledgeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset and --verbose is not given
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PledgeConfig {
    /// "best-effort" | "required"
    #[serde(default)]
    pub enforcement: Enforcement,

    /// Promise string pledged by `sbpledge test`
    #[serde(default = "default_promises")]
    pub promises: String,

    /// Files the probe child opens before and after pledging
    #[serde(default = "default_probe_paths")]
    pub probe_paths: Vec<PathBuf>,

    /// Probe child timeout in milliseconds (default: 10s)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_promises() -> String {
    "stdio".to_string()
}
fn default_probe_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("/etc/passwd")]
}
fn default_probe_timeout() -> u64 {
    10_000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PledgeConfig {
    fn default() -> Self {
        Self {
            enforcement: Enforcement::default(),
            promises: default_promises(),
            probe_paths: default_probe_paths(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

impl PledgeConfig {
    /// The configured promise string as a mask.
    pub fn promise_mask(&self) -> Result<PromiseMask> {
        self.promises
            .parse()
            .with_context(|| format!("Invalid pledge.promises: {:?}", self.promises))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_with_paths(Paths::resolve()?)
    }

    /// Load from `--config` if given, otherwise from the resolved config dir.
    pub fn load_or(config_file: Option<&Path>) -> Result<Self> {
        match config_file {
            Some(path) => Self::load_file(path, Paths::resolve()?),
            None => Self::load(),
        }
    }

    /// Load from `paths`, creating a commented template on first run.
    pub fn load_with_paths(paths: Paths) -> Result<Self> {
        paths.ensure_dirs()?;
        let path = paths.config_file();

        if !path.exists() {
            let config = Config {
                paths,
                ..Config::default()
            };
            config.save_with_template()?;
            return Ok(config);
        }

        let mut config = Self::parse_file(&path)?;
        config.paths = paths;
        Ok(config)
    }

    /// Load an explicit config file. It must exist.
    pub fn load_file(path: &Path, paths: Paths) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.paths = paths;
        config.file_override = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.pledge.promise_mask()?;
        Ok(config)
    }

    /// The file this config was (or will be) read from.
    pub fn file_path(&self) -> PathBuf {
        self.file_override
            .clone()
            .unwrap_or_else(|| self.paths.config_file())
    }

    pub fn save(&self) -> Result<()> {
        let path = self.file_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;

        Ok(())
    }

    /// Save config with a helpful template (for first-time setup)
    pub fn save_with_template(&self) -> Result<()> {
        let path = self.file_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        eprintln!("Created default config at {}", path.display());

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let paths = Paths::resolve()?;
        Ok(paths.config_file())
    }

    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["logging", "level"] => Ok(self.logging.level.clone()),
            ["pledge", "enforcement"] => Ok(self.pledge.enforcement.to_string()),
            ["pledge", "promises"] => Ok(self.pledge.promises.clone()),
            ["pledge", "probe_paths"] => Ok(self
                .pledge
                .probe_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(",")),
            ["pledge", "probe_timeout_ms"] => Ok(self.pledge.probe_timeout_ms.to_string()),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["logging", "level"] => self.logging.level = value.to_string(),
            ["pledge", "enforcement"] => {
                self.pledge.enforcement = value.parse::<Enforcement>().map_err(anyhow::Error::msg)?
            }
            ["pledge", "promises"] => {
                value
                    .parse::<PromiseMask>()
                    .with_context(|| format!("Invalid promise string: {:?}", value))?;
                self.pledge.promises = value.to_string();
            }
            ["pledge", "probe_paths"] => {
                self.pledge.probe_paths = value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect()
            }
            ["pledge", "probe_timeout_ms"] => self.pledge.probe_timeout_ms = value.parse()?,
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        Ok(())
    }
}

/// Default config template with helpful comments (used for first-time setup)
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# sbpledge configuration
# Auto-created on first run. Edit as needed.

[logging]
# Overridden by RUST_LOG and by --verbose
level = "info"

[pledge]
# What `enter` does when sandbox_init_with_parameters is missing:
#   best-effort - record the promises, warn, and succeed
#   required    - fail with primitive_unavailable
enforcement = "best-effort"

# Promises pledged by `sbpledge test`
promises = "stdio"

# Files the probe opens before and after pledging
probe_paths = ["/etc/passwd"]

probe_timeout_ms = 10000
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_matches_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.pledge, PledgeConfig::default());
    }

    #[test]
    fn first_load_writes_template() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::under(tmp.path());

        let config = Config::load_with_paths(paths.clone()).unwrap();
        assert_eq!(config.pledge.enforcement, Enforcement::BestEffort);

        let written = fs::read_to_string(paths.config_file()).unwrap();
        assert_eq!(written, DEFAULT_CONFIG_TEMPLATE);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = toml::from_str("[pledge]\nenforcement = \"required\"\n").unwrap();
        assert_eq!(config.pledge.enforcement, Enforcement::Required);
        assert_eq!(config.pledge.promises, "stdio");
        assert_eq!(config.pledge.probe_timeout_ms, 10_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn invalid_promises_fail_to_load() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("config.toml");
        fs::write(&file, "[pledge]\npromises = \"stdio bogus\"\n").unwrap();

        let err = Config::load_file(&file, Paths::under(tmp.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("bogus"));
    }

    #[test]
    fn unknown_enforcement_fails_to_parse() {
        assert!(toml::from_str::<Config>("[pledge]\nenforcement = \"strict\"\n").is_err());
    }

    #[test]
    fn get_and_set_values() {
        let mut config = Config::default();

        config.set_value("pledge.enforcement", "required").unwrap();
        config.set_value("pledge.promises", "stdio rpath").unwrap();
        config
            .set_value("pledge.probe_paths", "/etc/hosts, /etc/passwd")
            .unwrap();
        config.set_value("pledge.probe_timeout_ms", "2500").unwrap();
        config.set_value("logging.level", "debug").unwrap();

        assert_eq!(config.get_value("pledge.enforcement").unwrap(), "required");
        assert_eq!(config.get_value("pledge.promises").unwrap(), "stdio rpath");
        assert_eq!(
            config.get_value("pledge.probe_paths").unwrap(),
            "/etc/hosts,/etc/passwd"
        );
        assert_eq!(config.get_value("pledge.probe_timeout_ms").unwrap(), "2500");
        assert_eq!(config.get_value("logging.level").unwrap(), "debug");
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set_value("pledge.promises", "stdio nope").is_err());
        assert!(config.set_value("pledge.enforcement", "maybe").is_err());
        assert!(config.set_value("pledge.probe_timeout_ms", "soon").is_err());
        assert!(config.set_value("agent.default_model", "x").is_err());
        assert!(config.get_value("pledge").is_err());
        assert_eq!(config.pledge, PledgeConfig::default());
    }

    #[test]
    fn save_round_trips_through_override_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("custom.toml");
        fs::write(&file, DEFAULT_CONFIG_TEMPLATE).unwrap();

        let mut config = Config::load_file(&file, Paths::under(tmp.path())).unwrap();
        config.set_value("pledge.promises", "stdio inet dns").unwrap();
        config.save().unwrap();

        let reloaded = Config::load_file(&file, Paths::under(tmp.path())).unwrap();
        assert_eq!(reloaded.pledge.promises, "stdio inet dns");
        assert!(!tmp.path().join("config").join("config.toml").exists());
    }
}
