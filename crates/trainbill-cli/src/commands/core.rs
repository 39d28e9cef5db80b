//! Shared utilities
//!
//! - `load_config` - Resolve the config file and environment
//! - `apply_overrides` - Layer command-line flags on top

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use trainbill_core::Config;

/// Load config from the given file (or the default location) and environment
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    tracing::debug!("Resolved {:?}", config);
    Ok(config)
}

/// Apply command-line flags, which win over file and environment
pub fn apply_overrides(
    config: &mut Config,
    folder: Option<PathBuf>,
    login: Option<String>,
    strict_refunds: bool,
    max_pages: Option<usize>,
) {
    if let Some(folder) = folder {
        config.folder_path = Some(folder);
    }
    if let Some(login) = login {
        config.login = Some(login);
    }
    if strict_refunds {
        config.strict_refunds = true;
    }
    if let Some(max_pages) = max_pages {
        config.max_pages = max_pages;
    }
}
