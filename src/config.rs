use std::io::Write;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{OptionExt, Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::services::spotify::client::{DEFAULT_REDIRECT_URI, SpotifyApiCredentials};
use crate::services::tempo_filter::{DEFAULT_MIN_DURATION_MS, HalfTempoThresholds};

const APP_NAME: &str = "bpm-playlist-generator";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    cache_directory: String,
    pub spotify: SpotifyConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_duration_ms: u64,
    pub half_tempo: HalfTempoThresholds,
}

impl Default for Config {
    fn default() -> Self {
        let cache_directory = dirs::cache_dir()
            .map(|path| path.join(APP_NAME).to_string_lossy().to_string())
            .unwrap_or_else(|| "cache".to_string());

        Self {
            cache_directory,
            spotify: SpotifyConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            refresh_token: None,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: DEFAULT_MIN_DURATION_MS,
            half_tempo: HalfTempoThresholds::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Default location of the config file
    pub fn config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|path| path.join(APP_NAME).join("config.toml"))
            .ok_or_eyre("Could not determine the config directory")
    }

    /// Load the config from the default location, falling back to defaults when
    /// there is no file yet
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        Self::from_file(&config_path)
    }

    /// Write the config as TOML, replacing any existing file in one rename
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_eyre("Config path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;

        let contents = toml::to_string_pretty(self).wrap_err("Failed to serialize config")?;

        let mut file = tempfile::NamedTempFile::new_in(dir)
            .wrap_err_with(|| format!("Failed to create temporary file in {}", dir.display()))?;
        file.write_all(contents.as_bytes())
            .wrap_err("Failed to write config")?;
        file.persist(path)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn cache_directory_path(&self) -> PathBuf {
        self.expand_path(&self.cache_directory)
    }

    /// Client credentials from the config, with `SPOTIFY_CLIENT_ID` and
    /// `SPOTIFY_CLIENT_SECRET` as fallback
    pub fn spotify_credentials(&self) -> Option<SpotifyApiCredentials> {
        let from_env_or = |value: &str, var: &str| {
            if value.is_empty() {
                std::env::var(var).ok().filter(|v| !v.is_empty())
            } else {
                Some(value.to_string())
            }
        };

        let client_id = from_env_or(&self.spotify.client_id, "SPOTIFY_CLIENT_ID")?;
        let client_secret = from_env_or(&self.spotify.client_secret, "SPOTIFY_CLIENT_SECRET")?;

        Some(SpotifyApiCredentials::new(
            client_id,
            client_secret,
            self.spotify.redirect_uri.clone(),
        ))
    }
}
