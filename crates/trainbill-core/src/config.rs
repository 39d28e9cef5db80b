//! Configuration
//!
//! ## Resolution
//!
//! 1. TOML file: an explicit path, or `<config dir>/trainbill/config.toml`
//!    when it exists (`~/.config/trainbill/config.toml` on Linux)
//! 2. Environment overrides: `TRAINLINE_LOGIN`, `TRAINLINE_PASSWORD`,
//!    `TRAINBILL_FOLDER`, `TRAINLINE_BASE_URL`
//!
//! Command-line flags are applied on top by the CLI.
//!
//! ```toml
//! login = "traveller@example.com"
//! password = "..."
//! folder_path = "/home/me/Documents/Trainline"
//! max_pages = 100
//! strict_refunds = false
//! save_timeout_secs = 60
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::client::{Credentials, DEFAULT_BASE_URL};
use crate::error::{Error, Result};
use crate::konnector::RunOptions;
use crate::pagination::PaginationOptions;
use crate::persist::SaveOptions;
use crate::reconcile::ReconcileOptions;

/// Raw file contents, every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    login: Option<String>,
    password: Option<String>,
    folder_path: Option<PathBuf>,
    max_pages: Option<usize>,
    strict_refunds: Option<bool>,
    save_timeout_secs: Option<u64>,
}

/// Resolved configuration
#[derive(Clone)]
pub struct Config {
    pub base_url: String,
    pub login: Option<String>,
    pub password: Option<String>,
    pub folder_path: Option<PathBuf>,
    pub max_pages: usize,
    pub strict_refunds: bool,
    pub save_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            login: None,
            password: None,
            folder_path: None,
            max_pages: PaginationOptions::default().max_pages,
            strict_refunds: false,
            save_timeout: SaveOptions::default().timeout,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("folder_path", &self.folder_path)
            .field("max_pages", &self.max_pages)
            .field("strict_refunds", &self.strict_refunds)
            .field("save_timeout", &self.save_timeout)
            .finish()
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("trainbill").join("config.toml"))
}

impl Config {
    /// Load from file (explicit or default location) and environment
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Parse TOML config contents over the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(contents)?;
        let defaults = Self::default();
        Ok(Self {
            base_url: file.base_url.unwrap_or(defaults.base_url),
            login: file.login,
            password: file.password,
            folder_path: file.folder_path,
            max_pages: file.max_pages.unwrap_or(defaults.max_pages),
            strict_refunds: file.strict_refunds.unwrap_or(defaults.strict_refunds),
            save_timeout: file
                .save_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.save_timeout),
        })
    }

    /// Apply environment overrides read through `var`
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(login) = var("TRAINLINE_LOGIN") {
            self.login = Some(login);
        }
        if let Some(password) = var("TRAINLINE_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(folder) = var("TRAINBILL_FOLDER") {
            self.folder_path = Some(PathBuf::from(folder));
        }
        if let Some(base_url) = var("TRAINLINE_BASE_URL") {
            self.base_url = base_url;
        }
    }

    /// Login and password, both required for a run
    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => Ok(Credentials::new(login, password)),
            (None, _) => Err(Error::Config(
                "No login configured (set TRAINLINE_LOGIN or `login` in config.toml)".into(),
            )),
            (_, None) => Err(Error::Config(
                "No password configured (set TRAINLINE_PASSWORD or `password` in config.toml)"
                    .into(),
            )),
        }
    }

    /// Destination folder, required to save invoices
    pub fn folder(&self) -> Result<&Path> {
        self.folder_path.as_deref().ok_or_else(|| {
            Error::Config(
                "No destination folder configured (set TRAINBILL_FOLDER or `folder_path`)".into(),
            )
        })
    }

    /// Options for the run driver
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            pagination: PaginationOptions {
                max_pages: self.max_pages,
            },
            reconcile: ReconcileOptions {
                strict_refunds: self.strict_refunds,
            },
            save: SaveOptions {
                timeout: self.save_timeout,
                ..SaveOptions::default()
            },
        }
    }
}
