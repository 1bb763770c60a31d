//! Configuration file support for matterbuild.
//!
//! Settings that would otherwise be repeated on every invocation live in a
//! `matterbuild.toml`, searched for in the current directory and then in
//! each parent directory until a `.git` directory or the filesystem root is
//! reached.
//!
//! ## Example Configuration
//!
//! ```toml
//! [build]
//! root = "third_party/connectedhomeip"
//! output_prefix = "out/matterbuild"
//!
//! [bridge]
//! host = "127.0.0.1"
//! port = 9000
//! register_key = "default"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "matterbuild.toml";

/// Root configuration structure for `matterbuild.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatterbuildConfig {
    /// Build settings shared by every target family.
    pub build: BuildConfig,

    /// Accessory server connection.
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Root of the source checkout.
    ///
    /// Defaults to the current directory.
    pub root: Option<PathBuf>,

    /// Directory output directories are created in.
    ///
    /// Defaults to `<root>/out`.
    pub output_prefix: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Registration key sent when a request does not carry one.
    pub register_key: Option<String>,
}

impl MatterbuildConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: MatterbuildConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Searches for `matterbuild.toml` from the current directory upwards.
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Searches for `matterbuild.toml` from `start_dir` upwards.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }
}

/// Merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<MatterbuildConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Creates a resolver by discovering configuration from the current
    /// directory.
    pub fn new() -> Result<Self> {
        match MatterbuildConfig::discover()? {
            Some((config, path)) => {
                tracing::debug!("Using configuration from {}", path.display());
                Ok(Self {
                    config: Some(config),
                    config_path: Some(path),
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Makes a config-relative path absolute.
    fn relative_to_config(&self, path: &Path) -> PathBuf {
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Source root: CLI, then config, then the current directory.
    pub fn root(&self, cli_value: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(root) = cli_value {
            return Ok(root);
        }
        if let Some(root) = self.config.as_ref().and_then(|c| c.build.root.as_deref()) {
            return Ok(self.relative_to_config(root));
        }
        std::env::current_dir().context("Failed to get current directory")
    }

    /// Output prefix: CLI, then config. `None` means the builder default.
    pub fn output_prefix(&self, cli_value: Option<PathBuf>) -> Option<PathBuf> {
        cli_value.or_else(|| {
            self.config
                .as_ref()
                .and_then(|c| c.build.output_prefix.as_deref())
                .map(|p| self.relative_to_config(p))
        })
    }

    /// Returns the bridge configuration.
    pub fn bridge(&self) -> BridgeConfig {
        self.config
            .as_ref()
            .map(|c| c.bridge.clone())
            .unwrap_or_default()
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// The resolved value prefers CLI over config over `default`.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&MatterbuildConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }
}
