//! Platform abstraction layer
//!
//! This module provides platform-specific implementations for:
//! - Locating the process-private cache directory (cover art slot)
//! - Locating the widget state directory (display records)

pub mod desktop;

use anyhow::Result;
use std::path::PathBuf;

/// Directory name used under the platform cache and data roots
pub const APP_DIR_NAME: &str = "media-widget";

/// Platform-specific operations
pub trait Platform {
    /// Directory holding the processed cover image
    fn cache_dir() -> Result<PathBuf>;

    /// Directory holding one display record per widget instance
    fn state_dir() -> Result<PathBuf>;

    /// Get the platform name for logging
    fn name() -> &'static str;
}

/// Get the current platform implementation
pub use desktop::DesktopPlatform as CurrentPlatform;

/// Get the cache directory for the current platform
pub fn cache_dir() -> Result<PathBuf> {
    CurrentPlatform::cache_dir()
}

/// Get the widget state directory for the current platform
pub fn state_dir() -> Result<PathBuf> {
    CurrentPlatform::state_dir()
}

/// Get the platform name for logging
pub fn name() -> &'static str {
    CurrentPlatform::name()
}
