//! Configuration file persistence for dualmark
//!
//! This module handles loading and saving configuration files to
//! platform-specific directories with robust error handling and
//! graceful fallback to defaults.

use crate::config::Settings;
use crate::error::{Error, Result, ResultExt};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used for the config directory
const APP_NAME: &str = "dualmark";

/// Configuration file name
const CONFIG_FILE_NAME: &str = "config.json";

/// Extension of the temporary file used during atomic writes
const CONFIG_BACKUP_EXTENSION: &str = "json.bak";

// ─────────────────────────────────────────────────────────────────────────────
// Platform-Specific Directory Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Get the platform-specific configuration directory for the application.
///
/// Returns the appropriate directory based on the operating system:
/// - **Windows**: `%APPDATA%\dualmark\`
/// - **macOS**: `~/Library/Application Support/dualmark/`
/// - **Linux**: `~/.config/dualmark/`
///
/// # Errors
///
/// Returns `Error::ConfigDirNotFound` if the config directory cannot be determined
/// (e.g., if the HOME environment variable is not set).
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|base| base.join(APP_NAME))
        .ok_or(Error::ConfigDirNotFound)
}

/// Get the full path to the configuration file.
pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

// ─────────────────────────────────────────────────────────────────────────────
// Load Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Load configuration from the default config file location.
///
/// # Behavior
///
/// 1. If the config file exists and is valid JSON, load and sanitize it
/// 2. If the config file doesn't exist or is empty, return default settings
/// 3. If the config file is corrupted/invalid, log a warning and return defaults
pub fn load_config() -> Settings {
    get_config_file_path()
        .and_then(|path| load_config_from(&path))
        .unwrap_or_warn_default(Settings::default(), "Failed to load configuration")
}

/// Load configuration from an explicit path.
///
/// A missing or empty file yields default settings; unreadable or invalid
/// files are errors.
pub fn load_config_from(config_path: &Path) -> Result<Settings> {
    if !config_path.exists() {
        debug!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
        return Ok(Settings::default());
    }

    debug!("Loading config from: {}", config_path.display());

    let contents = fs::read_to_string(config_path).map_err(|e| Error::ConfigLoad {
        path: config_path.to_path_buf(),
        source: Box::new(e),
    })?;

    // Handle empty file
    if contents.trim().is_empty() {
        debug!("Config file is empty, using defaults");
        return Ok(Settings::default());
    }

    let settings = Settings::from_json_sanitized(&contents).map_err(|e| {
        warn!(
            "Config file at {} contains invalid JSON: {}",
            config_path.display(),
            e
        );
        Error::ConfigParse {
            message: format!("Failed to parse config file: {}", e),
            source: Some(Box::new(e)),
        }
    })?;

    info!(
        "Configuration loaded successfully from {}",
        config_path.display()
    );
    Ok(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Save Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Save configuration to the default config file location.
///
/// # Errors
///
/// - `Error::ConfigDirNotFound`: Config directory cannot be determined
/// - `Error::ConfigSave`: Failed to write the config file
pub fn save_config(settings: &Settings) -> Result<()> {
    save_config_to(&get_config_file_path()?, settings)
}

/// Save configuration to an explicit path.
///
/// This function performs an atomic write by:
/// 1. Writing to a temporary backup file next to the target
/// 2. Replacing the original file with the backup
pub fn save_config_to(config_path: &Path, settings: &Settings) -> Result<()> {
    if let Some(config_dir) = config_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if !config_dir.exists() {
            debug!("Creating config directory: {}", config_dir.display());
            fs::create_dir_all(config_dir).map_err(|e| Error::ConfigSave {
                path: config_dir.to_path_buf(),
                source: Box::new(e),
            })?;
        }
    }

    let backup_path = config_path.with_extension(CONFIG_BACKUP_EXTENSION);

    debug!("Saving config to: {}", config_path.display());

    // Serialize to pretty JSON
    let json = serde_json::to_string_pretty(settings).map_err(|e| Error::ConfigSave {
        path: config_path.to_path_buf(),
        source: Box::new(e),
    })?;

    // Write to backup file first (atomic write pattern)
    fs::write(&backup_path, &json).map_err(|e| Error::ConfigSave {
        path: backup_path.clone(),
        source: Box::new(e),
    })?;

    // Replace original with backup
    fs::rename(&backup_path, config_path).map_err(|e| Error::ConfigSave {
        path: config_path.to_path_buf(),
        source: Box::new(e),
    })?;

    info!(
        "Configuration saved successfully to {}",
        config_path.display()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutosaveSettings;
    use tempfile::TempDir;

    /// Helper to create a test environment with a temporary config directory.
    struct TestEnv {
        _temp_dir: TempDir,
        config_file: PathBuf,
    }

    impl TestEnv {
        fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let config_file = temp_dir.path().join(APP_NAME).join(CONFIG_FILE_NAME);
            Self {
                _temp_dir: temp_dir,
                config_file,
            }
        }

        fn write_config(&self, content: &str) {
            fs::create_dir_all(self.config_file.parent().unwrap()).expect("Failed to create config dir");
            fs::write(&self.config_file, content).expect("Failed to write config");
        }

        fn read_config(&self) -> String {
            fs::read_to_string(&self.config_file).expect("Failed to read config")
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Platform directory tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_get_config_file_path() {
        if let Ok(path) = get_config_file_path() {
            assert!(path.ends_with(Path::new(APP_NAME).join(CONFIG_FILE_NAME)));
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Load tests with temp directory
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let env = TestEnv::new();
        let settings = load_config_from(&env.config_file).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_empty_config_uses_defaults() {
        let env = TestEnv::new();
        env.write_config("  \n");
        let settings = load_config_from(&env.config_file).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_valid_config() {
        let env = TestEnv::new();
        env.write_config(r#"{"markdown": {"tables": false}, "autosave": {"debounce_ms": 500}}"#);

        let settings = load_config_from(&env.config_file).unwrap();
        assert!(!settings.markdown.tables);
        assert_eq!(settings.autosave.debounce_ms, 500);
        assert_eq!(settings.autosave.interval_ms, 30_000);
    }

    #[test]
    fn test_load_config_sanitizes_values() {
        let env = TestEnv::new();
        env.write_config(r#"{"autosave": {"debounce_ms": 5, "interval_ms": 10}}"#);

        let settings = load_config_from(&env.config_file).unwrap();
        assert_eq!(settings.autosave.debounce_ms, Settings::MIN_DEBOUNCE_MS);
        assert_eq!(settings.autosave.interval_ms, Settings::MIN_INTERVAL_MS);
    }

    #[test]
    fn test_load_corrupted_config_returns_error() {
        let env = TestEnv::new();
        env.write_config("{ invalid json }");

        let err = load_config_from(&env.config_file).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_config_with_unknown_fields_ignored() {
        let env = TestEnv::new();
        env.write_config(r#"{"autosave": {"interval_ms": 60000}, "future_feature": true}"#);

        let settings = load_config_from(&env.config_file).unwrap();
        assert_eq!(settings.autosave.interval_ms, 60_000);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Save tests with temp directory
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_save_creates_directory_and_valid_json() {
        let env = TestEnv::new();
        save_config_to(&env.config_file, &Settings::default()).unwrap();

        let loaded: Settings = serde_json::from_str(&env.read_config()).unwrap();
        assert_eq!(loaded, Settings::default());
        assert!(!env.config_file.with_extension(CONFIG_BACKUP_EXTENSION).exists());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let env = TestEnv::new();
        let mut original = Settings {
            autosave: AutosaveSettings {
                debounce_ms: 750,
                interval_ms: 15_000,
            },
            ..Settings::default()
        };
        original.markdown.strikethrough = false;

        save_config_to(&env.config_file, &original).unwrap();
        let loaded = load_config_from(&env.config_file).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let env = TestEnv::new();
        env.write_config("{ stale");

        save_config_to(&env.config_file, &Settings::default()).unwrap();
        assert_eq!(load_config_from(&env.config_file).unwrap(), Settings::default());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Integration tests (use actual config directory)
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_graceful_fallback() {
        // Always returns sanitized settings, whether or not a file exists
        let settings = load_config();
        assert!(settings.autosave.interval_ms >= Settings::MIN_INTERVAL_MS);
    }

    #[test]
    fn test_app_name_constant() {
        assert_eq!(APP_NAME, "dualmark");
        assert_eq!(CONFIG_FILE_NAME, "config.json");
    }
}
