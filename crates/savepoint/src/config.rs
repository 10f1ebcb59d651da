//! Configuration for Savepoint.
//!
//! Loads settings from `.savepoint.toml` in the working directory, then from
//! `SAVEPOINT_`-prefixed environment variables (nested keys split on `__`,
//! e.g. `SAVEPOINT_STEAM__API_KEY`). Uses figment for layered configuration
//! with provenance tracking.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const CONFIG_FILE_NAME: &str = ".savepoint.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SAVEPOINT_";

/// Default database filename within the data directory.
pub const DEFAULT_DB_NAME: &str = "savepoint.db";

/// Largest avatar accepted by default (5 MiB).
pub const DEFAULT_AVATAR_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Savepoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// SQLite database location.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Timeout applied to every Steam and IGDB request, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub steam: SteamConfig,

    #[serde(default)]
    pub igdb: IgdbConfig,

    #[serde(default)]
    pub avatars: AvatarConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SteamConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_steam_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IgdbConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_igdb_api_url")]
    pub api_url: String,

    #[serde(default = "default_igdb_token_url")]
    pub token_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvatarConfig {
    #[serde(default = "default_avatar_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_avatar_max_bytes")]
    pub max_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            http_timeout_secs: default_http_timeout_secs(),
            steam: SteamConfig::default(),
            igdb: IgdbConfig::default(),
            avatars: AvatarConfig::default(),
        }
    }
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_steam_base_url(),
        }
    }
}

impl Default for IgdbConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_url: default_igdb_api_url(),
            token_url: default_igdb_token_url(),
        }
    }
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            dir: default_avatar_dir(),
            max_bytes: default_avatar_max_bytes(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("savepoint")
}

fn default_database_path() -> PathBuf {
    data_dir().join(DEFAULT_DB_NAME)
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_steam_base_url() -> String {
    "https://api.steampowered.com".to_string()
}

fn default_igdb_api_url() -> String {
    "https://api.igdb.com/v4".to_string()
}

fn default_igdb_token_url() -> String {
    "https://id.twitch.tv/oauth2/token".to_string()
}

fn default_avatar_dir() -> PathBuf {
    data_dir().join("avatars")
}

fn default_avatar_max_bytes() -> u64 {
    DEFAULT_AVATAR_MAX_BYTES
}

impl Config {
    /// Load configuration from `.savepoint.toml` in the given directory and
    /// the environment.
    ///
    /// Returns default config if the file doesn't exist.
    /// Reports parse errors with file, line, and key information and falls
    /// back to defaults.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE_NAME);

        // defaults <- toml file <- environment
        let figment = Figment::from(Serialized::defaults(Config::default()));

        let figment = if config_path.exists() {
            figment.merge(Toml::file(&config_path))
        } else {
            figment
        };

        let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        match figment.extract() {
            Ok(config) => {
                if config_path.exists() {
                    tracing::info!("Loaded config from {:?}", config_path);
                }
                config
            }
            Err(e) => {
                tracing::warn!("Config error: {}", e);
                Self::default()
            }
        }
    }

    /// Whether Steam API calls can be made.
    pub fn has_steam_credentials(&self) -> bool {
        !self.steam.api_key.is_empty()
    }

    /// Whether IGDB calls can be made.
    pub fn has_igdb_credentials(&self) -> bool {
        !self.igdb.client_id.is_empty() && !self.igdb.client_secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http_timeout_secs, 15);
        assert_eq!(config.steam.base_url, "https://api.steampowered.com");
        assert_eq!(config.igdb.api_url, "https://api.igdb.com/v4");
        assert_eq!(config.avatars.max_bytes, 5 * 1024 * 1024);
        assert!(config.database_path.ends_with("savepoint/savepoint.db"));
        assert!(!config.has_steam_credentials());
        assert!(!config.has_igdb_credentials());
    }

    #[test]
    #[serial]
    fn test_load_missing_config() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path());
        assert!(config.steam.api_key.is_empty());
    }

    #[test]
    #[serial]
    fn test_load_config() {
        let temp = TempDir::new().unwrap();
        let config_content = r#"
database_path = "/tmp/library.db"

[steam]
api_key = "steam-key"

[igdb]
client_id = "client"
client_secret = "secret"
"#;
        std::fs::write(temp.path().join(CONFIG_FILE_NAME), config_content).unwrap();

        let config = Config::load(temp.path());
        assert_eq!(config.database_path, PathBuf::from("/tmp/library.db"));
        assert_eq!(config.steam.api_key, "steam-key");
        assert_eq!(config.steam.base_url, "https://api.steampowered.com"); // default still present
        assert!(config.has_igdb_credentials());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[steam]\napi_key = \"from-file\"\n",
        )
        .unwrap();

        std::env::set_var("SAVEPOINT_STEAM__API_KEY", "from-env");
        let config = Config::load(temp.path());
        std::env::remove_var("SAVEPOINT_STEAM__API_KEY");

        assert_eq!(config.steam.api_key, "from-env");
    }

    #[test]
    #[serial]
    fn test_invalid_config_returns_defaults() {
        let temp = TempDir::new().unwrap();
        // Invalid: http_timeout_secs should be a number, not a string
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "http_timeout_secs = \"soon\"\n",
        )
        .unwrap();

        let config = Config::load(temp.path());
        assert_eq!(config.http_timeout_secs, 15);
    }
}
