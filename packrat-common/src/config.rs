//! Configuration loading and root folder resolution
//!
//! The root folder holds everything the service persists (the SQLite
//! database and uploaded import files). Resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`PACKRAT_ROOT`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable consulted when no CLI argument is given
pub const ROOT_ENV_VAR: &str = "PACKRAT_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "packrat.db";

/// Resolve the root folder following the priority order above
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Ensure the root folder exists, creating it if missing
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    if !root.exists() {
        tracing::info!("Creating root folder: {}", root.display());
        std::fs::create_dir_all(root)?;
    }
    if !root.is_dir() {
        return Err(Error::Config(format!(
            "Root folder is not a directory: {}",
            root.display()
        )));
    }
    Ok(())
}

/// Path of the SQLite database inside the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}

/// Locate the platform configuration file, if present
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("packrat").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/packrat/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("packrat"))
        .unwrap_or_else(|| PathBuf::from("./packrat_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cli_argument_wins_over_environment() {
        std::env::set_var(ROOT_ENV_VAR, "/tmp/from-env");
        let root = resolve_root_folder(Some("/tmp/from-cli"));
        assert_eq!(root, PathBuf::from("/tmp/from-cli"));
        std::env::remove_var(ROOT_ENV_VAR);
    }

    #[test]
    #[serial]
    fn environment_used_when_no_cli_argument() {
        std::env::set_var(ROOT_ENV_VAR, "/tmp/from-env");
        let root = resolve_root_folder(None);
        assert_eq!(root, PathBuf::from("/tmp/from-env"));
        std::env::remove_var(ROOT_ENV_VAR);
    }

    #[test]
    #[serial]
    fn fallback_is_nonempty() {
        std::env::remove_var(ROOT_ENV_VAR);
        let root = resolve_root_folder(None);
        assert!(!root.as_os_str().is_empty());
    }

    #[test]
    fn database_path_joins_root() {
        let root = PathBuf::from("/data/packrat");
        assert_eq!(
            database_path(&root),
            PathBuf::from("/data/packrat/packrat.db")
        );
    }

    #[test]
    fn ensure_root_folder_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nested").join("root");
        ensure_root_folder(&root).unwrap();
        assert!(root.is_dir());
    }
}
