//! Error types for nocturne-core.

use std::path::PathBuf;
use thiserror::Error;

/// Setup failures of the audio collaborators.
///
/// These never reach the reducers as errors: the effect layer turns them into
/// terminal actions (`EngineStartFailed`, `MicListenFailed`, ...).
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No output device available")]
    NoOutputDevice,

    #[error("No input device available")]
    NoInputDevice,

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Click sample not found: {}", .0.display())]
    SampleNotFound(PathBuf),

    #[error("Failed to read click sample {}: {reason}", path.display())]
    SampleUnreadable { path: PathBuf, reason: String },

    #[error("Audio worker exited before the stream was ready")]
    WorkerGone,

    #[error("Failed to query device config")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures of the settings collaborator.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while reading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value: {0}")]
    Invalid(String),
}
