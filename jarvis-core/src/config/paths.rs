//! Platform-specific data directory paths.
//!
//!   Windows: %APPDATA%/jarvis
//!   macOS:   ~/Library/Application Support/jarvis
//!   Linux:   $XDG_CONFIG_HOME/jarvis (default ~/.config)

use std::path::PathBuf;

/// Get the Jarvis data directory (cross-platform).
pub fn get_data_dir() -> PathBuf {
    get_config_base().join("jarvis")
}

/// Default location of `config.json` when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Default directory for rolling log files.
pub fn default_log_dir() -> PathBuf {
    get_data_dir().join("logs")
}

/// Get the platform-appropriate base config directory.
fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% (typically C:\Users\<user>\AppData\Roaming)
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("AppData")
                .join("Roaming")
        })
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // Linux and other Unix: respect XDG_CONFIG_HOME, default ~/.config
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    }
}
