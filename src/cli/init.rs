//! Init command implementation

use anyhow::{Result, bail};
use std::path::Path;

use portal_sync::config::Config;

/// Write a default config (with a fresh control token) to `config_path`
pub fn init_command(config_path: Option<&Path>, force: bool) -> Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::global_config_path);

    if config_path.exists() && !force {
        bail!(
            "Configuration already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    Config::initial().save_to_file(&config_path)?;
    println!("Created: {}", config_path.display());
    println!("Fill in [portal.credentials] before running `portal-sync run`.");

    Ok(())
}
