use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::catalog::{CatalogMode, JamendoSettings, DEFAULT_LIMIT};
use crate::player::controller::DEFAULT_ERROR_ADVANCE_DELAY;
use crate::player::ControllerOptions;

/// User-editable configuration (ReadOnly by App after load)
/// stored in `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// `direct` talks to api.jamendo.com, `proxy` to the backend at `api_base`
    #[serde(default)]
    pub catalog: CatalogMode,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    /// Milliseconds to wait before skipping a track that failed to play
    #[serde(default = "default_error_advance_ms")]
    pub error_advance_ms: u64,
    /// Refuse to open the audio device while another instance holds it
    #[serde(default = "default_true")]
    pub audio_lock: bool,
}

fn default_api_base() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_error_advance_ms() -> u64 {
    DEFAULT_ERROR_ADVANCE_DELAY.as_millis() as u64
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogMode::default(),
            client_id: String::new(),
            api_base: default_api_base(),
            limit: default_limit(),
            auto_advance: true,
            error_advance_ms: default_error_advance_ms(),
            audio_lock: true,
        }
    }
}

impl UserConfig {
    pub fn jamendo_settings(&self) -> JamendoSettings {
        JamendoSettings {
            mode: self.catalog,
            client_id: self.client_id.clone(),
            api_base: self.api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            auto_advance: self.auto_advance,
            error_advance_delay: Duration::from_millis(self.error_advance_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: UserConfig = toml::from_str("catalog = \"proxy\"\nlimit = 20\n").unwrap();
        assert_eq!(config.catalog, CatalogMode::Proxy);
        assert_eq!(config.limit, 20);
        assert!(config.auto_advance);
        assert_eq!(config.error_advance_ms, 1500);
    }

    #[test]
    fn test_settings_strip_trailing_slash() {
        let config = UserConfig {
            api_base: "http://localhost:9000/".into(),
            ..UserConfig::default()
        };
        assert_eq!(config.jamendo_settings().api_base, "http://localhost:9000");
        assert_eq!(
            config.controller_options().error_advance_delay,
            Duration::from_millis(1500)
        );
    }
}
