//! Desktop platform implementation
//!
//! Resolves directories through the `dirs` crate, which already knows the
//! per-OS conventions (XDG on Linux, `Library/Caches` on macOS,
//! `%LOCALAPPDATA%` on Windows).

use super::{Platform, APP_DIR_NAME};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Desktop platform implementation
pub struct DesktopPlatform;

impl Platform for DesktopPlatform {
    fn cache_dir() -> Result<PathBuf> {
        let root = dirs::cache_dir().context("Could not find cache directory")?;
        Ok(root.join(APP_DIR_NAME))
    }

    fn state_dir() -> Result<PathBuf> {
        let root = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .context("Could not find data directory")?;
        Ok(root.join(APP_DIR_NAME).join("widgets"))
    }

    fn name() -> &'static str {
        if cfg!(target_os = "macos") {
            "macOS"
        } else if cfg!(target_os = "windows") {
            "Windows"
        } else {
            "Linux"
        }
    }
}
