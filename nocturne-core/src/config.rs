//! Runtime configuration read from `config.toml`.

use crate::error::ConfigError;
use crate::settings::JsonSettingsStore;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Settings file; `<config dir>/nocturne/settings.json` when unset.
    pub settings_path: Option<PathBuf>,
    /// Click WAV directory; clicks are synthesized when unset.
    pub samples_dir: Option<PathBuf>,
    /// Samples per pitch analysis frame.
    pub input_frame_size: usize,
    /// RMS below which a capture frame counts as silence.
    pub amplitude_threshold: f32,
    /// Quiet period before an edited setting is saved.
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: None,
            samples_dir: None,
            input_frame_size: 2048,
            amplitude_threshold: 0.01,
            debounce_ms: 500,
        }
    }
}

impl Config {
    /// Reads and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reads `path`, or the default location when `None`. A missing file at
    /// the default location yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// `<config dir>/nocturne/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nocturne").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::Invalid("debounce_ms must be greater than zero".to_string()));
        }
        if self.input_frame_size < 256 {
            return Err(ConfigError::Invalid(format!(
                "input_frame_size must be at least 256, got {}",
                self.input_frame_size
            )));
        }
        if !(self.amplitude_threshold.is_finite() && self.amplitude_threshold >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "amplitude_threshold must be a non-negative number, got {}",
                self.amplitude_threshold
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_path.clone().unwrap_or_else(JsonSettingsStore::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_gives_defaults() {
        let file = write_config("");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn values_override_defaults() {
        let file = write_config(
            r#"
            settings_path = "/tmp/nocturne.json"
            samples_dir = "/usr/share/nocturne/clicks"
            input_frame_size = 4096
            debounce_ms = 250
            "#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.settings_path(), PathBuf::from("/tmp/nocturne.json"));
        assert_eq!(config.samples_dir, Some(PathBuf::from("/usr/share/nocturne/clicks")));
        assert_eq!(config.input_frame_size, 4096);
        assert_eq!(config.amplitude_threshold, 0.01);
        assert_eq!(config.debounce(), Duration::from_millis(250));
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let file = write_config("debounce_ms = 0");
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let file = write_config("tempo = 90");
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_explicit_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_or_default(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
