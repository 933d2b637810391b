//! Application state shared across handlers.
//!
//! The engine is single-writer: every handler that mutates it (or caches a
//! decision) takes the write lock, pure reads take the read lock.

use std::path::PathBuf;
use std::sync::Arc;

use ringrule_core::{ConfigError, Engine, RingruleConfig, Settings, SettingsUpdate, Storage};
use tokio::sync::RwLock;
use tracing::info;

/// State handle passed to every handler.
pub type SharedState = Arc<RwLock<AppState>>;

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// The rule resolution engine.
    pub engine: Engine,
    /// Where settings changes are written back, if anywhere.
    pub config_path: Option<PathBuf>,
}

impl AppState {
    /// Build state from a loaded configuration.
    ///
    /// Persisted rules, overrides and history are restored from the
    /// configured data directory; without one the engine runs in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted data cannot be read or is invalid.
    pub fn new(config: RingruleConfig, config_path: Option<PathBuf>) -> ringrule_core::Result<Self> {
        let engine = match config.data_dir() {
            Some(dir) => {
                info!(data_dir = %dir.display(), "Using data directory");
                Engine::with_storage(config, Storage::new(dir))?
            }
            None => {
                info!("No data directory available, state will not be persisted");
                Engine::new(config)
            }
        };
        Ok(Self {
            engine,
            config_path,
        })
    }

    /// Wrap into the shared handle used by the router.
    #[must_use]
    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Apply a settings change, writing it to the config file first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written. The
    /// running settings are then left as they were.
    pub fn update_settings(&mut self, update: SettingsUpdate) -> Result<Settings, ConfigError> {
        if let Some(path) = &self.config_path {
            let mut candidate = self.engine.config().clone();
            update.apply_to(&mut candidate);
            candidate.save(path)?;
            info!(path = %path.display(), "Saved configuration");
        }
        Ok(self.engine.update_settings(update))
    }
}
