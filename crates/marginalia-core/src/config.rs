//! Library configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/marginalia/config.toml)
//! 3. Environment variables (MARGINALIA_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::{StoreError, StoreResult};

/// Environment variable prefix
const ENV_PREFIX: &str = "MARGINALIA";

/// Library configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (the annotations database)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Load configuration from the default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (MARGINALIA_DATA_DIR)
    /// 2. Config file (~/.config/marginalia/config.toml or MARGINALIA_CONFIG)
    /// 3. Default values
    pub fn load() -> StoreResult<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> StoreResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| StoreError::Config {
                details: format!("failed to read config file {:?}: {}", path, e),
            })?;
            toml::from_str(&content).map_err(|e| StoreError::Config {
                details: format!("failed to parse config file {:?}: {}", path, e),
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> StoreResult<Self> {
        let mut config: Config = toml::from_str(toml_content).map_err(|e| StoreError::Config {
            details: format!("failed to parse config TOML: {}", e),
        })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }
    }

    /// Ensure the data directory exists
    fn ensure_data_dir(&self) -> StoreResult<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir).map_err(|e| StoreError::Config {
                details: format!("failed to create data directory {:?}: {}", self.data_dir, e),
            })?;
        }
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with the MARGINALIA_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("marginalia")
            .join("config.toml")
    }

    /// Get the path to the annotations database
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("annotations.db")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("marginalia")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap();
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &["MARGINALIA_DATA_DIR", "MARGINALIA_CONFIG"];

    #[test]
    fn test_default_config() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::default();
        assert!(config.data_dir.ends_with("marginalia"));
    }

    #[test]
    fn test_db_path() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::default();
        assert!(config.db_path().ends_with("annotations.db"));
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str("data_dir = \"/tmp/marginalia-test\"").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/marginalia-test"));
    }

    #[test]
    fn test_load_from_str_invalid() {
        let _guard = EnvGuard::new(ENV_VARS);

        let result = Config::load_from_str("data_dir = [1, 2]");
        assert!(matches!(result, Err(StoreError::Config { .. })));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("MARGINALIA_DATA_DIR", "/tmp/marginalia-env");
        let config = Config::load_from_str("data_dir = \"/tmp/marginalia-file\"").unwrap();
        env::remove_var("MARGINALIA_DATA_DIR");

        assert_eq!(config.data_dir, PathBuf::from("/tmp/marginalia-env"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("MARGINALIA_DATA_DIR", temp_dir.path());
        let config = Config::load_from_path(&temp_dir.path().join("missing.toml")).unwrap();
        env::remove_var("MARGINALIA_DATA_DIR");

        assert_eq!(config.data_dir, temp_dir.path());
    }
}
