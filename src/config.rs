//! Runtime configuration
//!
//! There is no configuration file. Defaults match the widget layout and can
//! be overridden through `MEDIA_WIDGET_*` environment variables.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Side length of the square widget image slot, in pixels
pub const DEFAULT_COVER_SIZE: u32 = 512;

/// Corner radius applied to the widget image
pub const DEFAULT_CORNER_RADIUS: f32 = 52.0;

/// Single cache slot for the processed cover
pub const COVER_FILE_NAME: &str = "widget_cover_art.png";

pub const ENV_CACHE_DIR: &str = "MEDIA_WIDGET_CACHE_DIR";
pub const ENV_STATE_DIR: &str = "MEDIA_WIDGET_STATE_DIR";
pub const ENV_COVER_SIZE: &str = "MEDIA_WIDGET_COVER_SIZE";
pub const ENV_CORNER_RADIUS: &str = "MEDIA_WIDGET_CORNER_RADIUS";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cover: CoverConfig,

    /// Overrides the platform cache directory
    pub cache_dir: Option<PathBuf>,

    /// Overrides the platform widget state directory
    pub state_dir: Option<PathBuf>,

    /// Shown by the rendering surface before the first track arrives
    pub idle_title: String,
    pub idle_artist: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cover: CoverConfig::default(),
            cache_dir: None,
            state_dir: None,
            idle_title: "Nothing playing".to_string(),
            idle_artist: "Start a player".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverConfig {
    pub size: u32,
    pub corner_radius: f32,
    pub file_name: String,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_COVER_SIZE,
            corner_radius: DEFAULT_CORNER_RADIUS,
            file_name: COVER_FILE_NAME.to_string(),
        }
    }
}

impl Config {
    /// Build a config from defaults plus any `MEDIA_WIDGET_*` overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            config.cache_dir = Some(PathBuf::from(dir));
        }

        if let Some(dir) = lookup(ENV_STATE_DIR).filter(|v| !v.is_empty()) {
            config.state_dir = Some(PathBuf::from(dir));
        }

        if let Some(raw) = lookup(ENV_COVER_SIZE) {
            let size: u32 = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_COVER_SIZE}: {raw:?}"))?;
            if size == 0 {
                anyhow::bail!("{ENV_COVER_SIZE} must be greater than zero");
            }
            config.cover.size = size;
        }

        if let Some(raw) = lookup(ENV_CORNER_RADIUS) {
            let radius: f32 = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_CORNER_RADIUS}: {raw:?}"))?;
            if !radius.is_finite() || radius < 0.0 {
                anyhow::bail!("{ENV_CORNER_RADIUS} must be a non-negative number");
            }
            config.cover.corner_radius = radius;
        }

        Ok(config)
    }

    /// Cache directory: explicit override, else the platform default.
    pub fn resolve_cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::platform::cache_dir(),
        }
    }

    /// Widget state directory: explicit override, else the platform default.
    pub fn resolve_state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::platform::state_dir(),
        }
    }
}
