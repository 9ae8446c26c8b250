//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\interview-rehearsal\
//!   macOS:   ~/Library/Application Support/interview-rehearsal/
//!   Linux:   ~/.config/interview-rehearsal/
//!
//! Data dir (stored interviews, results, accounts, models):
//!   Windows: %LOCALAPPDATA%\interview-rehearsal\
//!   macOS:   ~/Library/Application Support/interview-rehearsal/
//!   Linux:   ~/.local/share/interview-rehearsal/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding one JSON file per store key.
    pub store_dir: PathBuf,
    /// Directory for downloaded GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "interview-rehearsal";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            store_dir: data_dir.join("store"),
            models_dir: data_dir.join("models"),
        }
    }

    /// Path of the Whisper model file named `model` (file stem, no extension).
    pub fn model_file(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{model}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
