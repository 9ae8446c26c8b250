//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for prompts, transcription and the voice flows built on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// GGML model name / file stem (e.g. `"base.en"`), resolved under
    /// [`AppPaths::models_dir`].
    pub model: String,
    /// Primary speech language as an ISO-639-1 code, or `"auto"`.
    pub language: String,
    /// External text-to-speech program invoked as `<command> "<text>"`
    /// (e.g. `"espeak-ng"` or `"say"`).  `None` prints prompts instead.
    pub tts_command: Option<String>,
    /// Upper bound on a single listen attempt; expiry counts as no speech.
    pub listen_timeout_secs: u64,
    /// How many times a field is re-asked after hearing nothing.
    pub max_retries: u32,
}

impl SpeechConfig {
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_secs)
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: "base.en".into(),
            language: "en".into(),
            tts_command: None,
            listen_timeout_secs: 20,
            max_retries: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and utterance segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// RMS amplitude above which a 30 ms frame counts as speech.
    pub vad_threshold: f32,
    /// Trailing silence that finalizes an utterance, in milliseconds.
    pub end_silence_ms: u64,
    /// Utterances shorter than this are discarded as clicks/noise.
    pub min_utterance_ms: u64,
    /// Utterances are cut and finalized at this length.
    pub max_utterance_secs: u64,
    /// Capture ends on its own after this long without any speech.
    pub no_speech_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            vad_threshold: 0.01,
            end_silence_ms: 1_200,
            min_utterance_ms: 300,
            max_utterance_secs: 30,
            no_speech_timeout_secs: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Where local key-value data lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the store directory; `None` uses [`AppPaths::store_dir`].
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// The effective store directory.
    pub fn resolve_dir(&self, paths: &AppPaths) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| paths.store_dir.clone())
    }
}

// ---------------------------------------------------------------------------
// CloudConfig
// ---------------------------------------------------------------------------

/// Optional remote account service.  Nothing in the core flow needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub enabled: bool,
    /// Web API key sent as the `key` query parameter.
    pub api_key: Option<String>,
    /// Project identifier used to address the profile document store.
    pub project_id: Option<String>,
    /// Base URL of the identity service.
    pub auth_base_url: String,
    /// Base URL of the document store.
    pub datastore_base_url: String,
    /// Maximum seconds to wait for a response.
    pub timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            project_id: None,
            auth_base_url: "https://identitytoolkit.googleapis.com/v1".into(),
            datastore_base_url: "https://firestore.googleapis.com/v1".into(),
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use interview_rehearsal::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert!(config.speech.max_retries > 0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub speech: SpeechConfig,
    pub audio: AudioConfig,
    pub storage: StorageConfig,
    pub cloud: CloudConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests and `--config`).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.speech.model, loaded.speech.model);
        assert_eq!(original.speech.language, loaded.speech.language);
        assert_eq!(original.speech.tts_command, loaded.speech.tts_command);
        assert_eq!(original.speech.max_retries, loaded.speech.max_retries);
        assert_eq!(original.audio.vad_threshold, loaded.audio.vad_threshold);
        assert_eq!(original.audio.end_silence_ms, loaded.audio.end_silence_ms);
        assert_eq!(original.storage.data_dir, loaded.storage.data_dir);
        assert_eq!(original.cloud.enabled, loaded.cloud.enabled);
        assert_eq!(original.cloud.auth_base_url, loaded.cloud.auth_base_url);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.speech.model, SpeechConfig::default().model);
        assert!(!config.cloud.enabled);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.speech.model, "base.en");
        assert_eq!(cfg.speech.language, "en");
        assert_eq!(cfg.speech.max_retries, 3);
        assert_eq!(cfg.speech.listen_timeout(), Duration::from_secs(20));
        assert!(cfg.speech.tts_command.is_none());
        assert_eq!(cfg.audio.end_silence_ms, 1_200);
        assert_eq!(cfg.audio.no_speech_timeout_secs, 8);
        assert!(cfg.storage.data_dir.is_none());
        assert!(cfg.cloud.api_key.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[speech]\nmax_retries = 5\n").expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.speech.max_retries, 5);
        assert_eq!(cfg.speech.model, "base.en");
        assert_eq!(cfg.audio.vad_threshold, 0.01);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.speech.tts_command = Some("espeak-ng".into());
        cfg.speech.listen_timeout_secs = 45;
        cfg.storage.data_dir = Some(PathBuf::from("/tmp/rehearsal"));
        cfg.cloud.enabled = true;
        cfg.cloud.api_key = Some("key-123".into());
        cfg.cloud.project_id = Some("demo".into());

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.speech.tts_command.as_deref(), Some("espeak-ng"));
        assert_eq!(loaded.speech.listen_timeout_secs, 45);
        assert_eq!(
            loaded.storage.data_dir,
            Some(PathBuf::from("/tmp/rehearsal"))
        );
        assert!(loaded.cloud.enabled);
        assert_eq!(loaded.cloud.api_key.as_deref(), Some("key-123"));
        assert_eq!(loaded.cloud.project_id.as_deref(), Some("demo"));
    }

    #[test]
    fn storage_dir_override_wins() {
        let paths = AppPaths::new();
        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(storage.resolve_dir(&paths), PathBuf::from("/custom"));
        assert_eq!(
            StorageConfig::default().resolve_dir(&paths),
            paths.store_dir
        );
    }
}
