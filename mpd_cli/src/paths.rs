//! Centralized path management for the mpdinfo CLI
//!
//! Configuration lives under the platform config directory, saved cover art
//! under the platform data directory.

use std::path::PathBuf;

/// The name of the application directory used across all platforms
const APP_DIR: &str = "mpdinfo";

/// The name of the configuration file
const CONFIG_FILE: &str = "config.toml";

/// The name of the cover art subdirectory
const ART_SUBDIR: &str = "art";

/// Returns the base data directory for the application
///
/// - Linux: `~/.local/share/mpdinfo`
/// - macOS: `~/Library/Application Support/mpdinfo`
/// - Windows: `%APPDATA%/mpdinfo`
///
/// Falls back to `.mpdinfo` in the current directory.
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".mpdinfo"))
}

/// Default directory `watch` saves cover art into
pub fn get_art_dir() -> PathBuf {
    get_data_dir().join(ART_SUBDIR)
}

/// Returns the configuration directory
///
/// `XDG_CONFIG_HOME` wins on non-Windows platforms.
pub fn get_config_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return PathBuf::from(xdg_config).join(APP_DIR);
    }

    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".mpdinfo"))
}

/// Returns the path to the configuration file
pub fn get_config_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE)
}
