use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod persistence;
pub mod user;

pub use persistence::{
    ConnectionState, FileStore, KeyValueStore, MemoryStore, PersistentState, UserProfile,
    UserSession,
};
pub use user::UserConfig;

pub struct AppConfig;

impl AppConfig {
    pub fn get_config_dir() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        let dir = base.join("jamtune");

        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }

        dir
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_state_path() -> PathBuf {
        Self::get_config_dir().join("state.toml")
    }

    pub fn get_log_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("jamtune")
    }

    pub fn load() -> UserConfig {
        Self::load_from(&Self::get_config_path())
    }

    /// Read `path`, writing a default file first when it is missing.
    pub fn load_from(path: &Path) -> UserConfig {
        if !path.exists() {
            let config = UserConfig::default();
            if let Ok(content) = toml::to_string_pretty(&config) {
                let _ = fs::write(path, content);
            }
            return config;
        }

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                UserConfig::default()
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                UserConfig::default()
            }
        }
    }

    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&UserConfig::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogMode;

    #[test]
    fn test_missing_config_is_created() {
        let dir = std::env::temp_dir().join(format!("jamtune-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let _ = fs::remove_file(&path);

        let config = AppConfig::load_from(&path);
        assert_eq!(config, UserConfig::default());
        assert!(path.exists());

        fs::write(&path, "catalog = \"proxy\"").unwrap();
        assert_eq!(AppConfig::load_from(&path).catalog, CatalogMode::Proxy);

        fs::write(&path, "limit = \"lots\"").unwrap();
        assert_eq!(AppConfig::load_from(&path), UserConfig::default());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_generated_config_parses() {
        let parsed: UserConfig = toml::from_str(&AppConfig::default_config_toml()).unwrap();
        assert_eq!(parsed, UserConfig::default());
    }
}
