//! Configuration file I/O operations

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::{Config, generate_control_token};

impl Config {
    /// Get the global config directory path (~/.portal-sync/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".portal-sync")
    }

    /// Get the global config file path (~/.portal-sync/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Load the config at `path`, or the global one when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::global_config_path);

        if !path.exists() {
            anyhow::bail!(
                "No config at {}. Run `portal-sync init` and fill in the portal credentials.",
                path.display()
            );
        }
        Self::from_file(&path)
    }

    /// Config written by `portal-sync init`: defaults plus a fresh control token
    pub fn initial() -> Self {
        let mut config = Self::default();
        config.server.auth_token = generate_control_token();
        config
    }

    /// Write the config to `path`, replacing any previous file in one step.
    ///
    /// The file holds the portal secret and the control token, so on Unix it
    /// is readable by its owner only.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let _lock = WriteLock::acquire(path)?;
        let staged = path.with_extension("toml.tmp");
        {
            let mut file = open_private(&staged)?;
            file.write_all(content.as_bytes())
                .and_then(|()| file.sync_all())
                .with_context(|| format!("Failed to write {}", staged.display()))?;
        }
        std::fs::rename(&staged, path)
            .with_context(|| format!("Failed to move config into place: {}", path.display()))
    }
}

/// Exclusive `fs2` lock on `<config>.toml.lock`, held until dropped
struct WriteLock {
    _file: File,
}

impl WriteLock {
    fn acquire(config_path: &Path) -> Result<Self> {
        let lock_path = config_path.with_extension("toml.lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Config {} is locked by another writer", config_path.display()))?;
        Ok(Self { _file: file })
    }
}

fn open_private(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::initial();
        config.portal.credentials.api_key = "k".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.portal.credentials.api_key, "k");
        assert_eq!(loaded.server.auth_token, config.server.auth_token);
        assert_eq!(loaded.server.auth_token.len(), 64);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::initial().save_to_file(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_file_points_at_init() {
        let dir = tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("portal-sync init"));
    }
}
