//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Default port for the HTTP API
pub const DEFAULT_PORT: u16 = 5730;

/// Default MusicBrainz API base URL
pub const DEFAULT_MBRAINZ_URL: &str = "https://musicbrainz.org/ws/2";

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Folder holding spindle.db (created on first run)
    pub root_folder: PathBuf,
    /// HTTP listen port
    pub port: u16,
    /// MusicBrainz API base URL (overridable for tests / mirrors)
    pub mbrainz_url: String,
}

impl Config {
    /// Resolve configuration from CLI arguments, environment, config file,
    /// and compiled defaults (in that priority order).
    pub fn resolve(cli_root: Option<&str>, cli_port: Option<u16>) -> Result<Self> {
        let root_folder = resolve_root_folder(cli_root, "SPINDLE_ROOT")?;

        let port = match cli_port {
            Some(p) => p,
            None => match std::env::var("SPINDLE_PORT") {
                Ok(s) => s
                    .parse::<u16>()
                    .map_err(|_| Error::Config(format!("Invalid SPINDLE_PORT: {}", s)))?,
                Err(_) => DEFAULT_PORT,
            },
        };

        let mbrainz_url = std::env::var("MBRAINZ_URL")
            .unwrap_or_else(|_| DEFAULT_MBRAINZ_URL.to_string());

        Ok(Self {
            root_folder,
            port,
            mbrainz_url,
        })
    }

    /// Path of the SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("spindle.db")
    }

    /// Create the root folder if it does not exist yet
    pub fn ensure_root_folder(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(root_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_root_folder())
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/spindle/config.toml first, then /etc/spindle/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("spindle").join("config.toml"));
        let system_config = PathBuf::from("/etc/spindle/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("spindle").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("spindle"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/spindle"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("spindle"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/spindle"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("spindle"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\spindle"))
    } else {
        PathBuf::from("./spindle_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_wins() {
        let root = resolve_root_folder(Some("/tmp/spindle-test"), "SPINDLE_TEST_UNSET").unwrap();
        assert_eq!(root, PathBuf::from("/tmp/spindle-test"));
    }

    #[test]
    fn test_env_var_used_when_no_cli_arg() {
        std::env::set_var("SPINDLE_TEST_ROOT_A", "/tmp/spindle-env");
        let root = resolve_root_folder(None, "SPINDLE_TEST_ROOT_A").unwrap();
        assert_eq!(root, PathBuf::from("/tmp/spindle-env"));
        std::env::remove_var("SPINDLE_TEST_ROOT_A");
    }

    #[test]
    fn test_database_path_under_root() {
        let config = Config {
            root_folder: PathBuf::from("/tmp/spindle-test"),
            port: DEFAULT_PORT,
            mbrainz_url: DEFAULT_MBRAINZ_URL.to_string(),
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/spindle-test/spindle.db")
        );
    }
}
