//! The core of the Nocturne practice tool: a sample-accurate metronome and an
//! instrument tuner.
//!
//! Each feature is a [`store::Store`] driven by a pure reducer. Reducers
//! return [`effect::Effect`] descriptions; the store runs them as tokio tasks
//! against injected collaborators (audio engines, pitch detector, settings
//! file). This crate is headless and contains no UI code.

pub mod app;
pub mod audio;
pub mod config;
pub mod effect;
pub mod error;
pub mod metronome;
pub mod pitch;
pub mod settings;
pub mod store;
pub mod tuner;

pub use app::{App, Collaborators, LifecycleEvent};
pub use config::Config;
pub use effect::{ActionSender, Effect, EffectId, EffectShape};
pub use error::{AudioError, ConfigError, SettingsError};
pub use store::{Reducer, Store};
