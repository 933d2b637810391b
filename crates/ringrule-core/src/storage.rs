//! Persistent storage for rules, the manual override and advisor history.
//!
//! Uses small JSON files in a data directory. Files are written to a
//! temporary sibling and renamed into place so a crash never leaves a
//! half-written file behind. Derived geofence and schedule state is never
//! stored.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::advisor::Observation;
use crate::context::ManualOverride;
use crate::rules::Rule;

/// Current on-disk format version of `rules.json`.
pub const RULES_FORMAT_VERSION: u32 = 1;

const RULES_FILE: &str = "rules.json";
const OVERRIDES_FILE: &str = "overrides.json";
const HISTORY_FILE: &str = "history.json";

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    ReadError {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    WriteError {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The data directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirError {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file holds malformed JSON.
    #[error("failed to parse {}: {source}", path.display())]
    ParseError {
        /// File path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("failed to serialize: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// `rules.json` was written by an unknown format version.
    #[error("unsupported rules format version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Serialize, Deserialize)]
struct RulesFile {
    version: u32,
    rules: Vec<Rule>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct OverridesFile {
    manual: Option<ManualOverride>,
}

/// Storage backend for ringrule data.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Create a new storage instance rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load persisted rules, in creation order. Missing file means no rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_rules(&self) -> StorageResult<Vec<Rule>> {
        match self.read_json::<RulesFile>(RULES_FILE)? {
            Some(file) if file.version == RULES_FORMAT_VERSION => Ok(file.rules),
            Some(file) => Err(StorageError::UnsupportedVersion {
                found: file.version,
                expected: RULES_FORMAT_VERSION,
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Persist the full rule list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_rules(&self, rules: &[Rule]) -> StorageResult<()> {
        #[derive(Serialize)]
        struct RulesFileRef<'a> {
            version: u32,
            rules: &'a [Rule],
        }
        self.write_json(
            RULES_FILE,
            &RulesFileRef {
                version: RULES_FORMAT_VERSION,
                rules,
            },
        )
    }

    /// Load the persisted manual override, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_manual_override(&self) -> StorageResult<Option<ManualOverride>> {
        Ok(self
            .read_json::<OverridesFile>(OVERRIDES_FILE)?
            .and_then(|file| file.manual))
    }

    /// Persist (or clear, with `None`) the manual override.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_manual_override(&self, manual: Option<&ManualOverride>) -> StorageResult<()> {
        self.write_json(
            OVERRIDES_FILE,
            &OverridesFile {
                manual: manual.cloned(),
            },
        )
    }

    /// Load advisor history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_history(&self) -> StorageResult<Vec<Observation>> {
        Ok(self.read_json(HISTORY_FILE)?.unwrap_or_default())
    }

    /// Persist advisor history.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_history(&self, history: &[Observation]) -> StorageResult<()> {
        self.write_json(HISTORY_FILE, &history)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> StorageResult<Option<T>> {
        let path = self.data_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|source| StorageError::ReadError {
            path: path.clone(),
            source,
        })?;
        let value = serde_json::from_str(&content)
            .map_err(|source| StorageError::ParseError { path, source })?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> StorageResult<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|source| StorageError::CreateDirError {
            path: self.data_dir.clone(),
            source,
        })?;
        let path = self.data_dir.join(name);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, content).map_err(|source| StorageError::WriteError {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path)
            .map_err(|source| StorageError::WriteError { path: path.clone(), source })?;
        debug!(path = %path.display(), "Persisted file");
        Ok(())
    }
}

/// Platform data directory, e.g. `~/.local/share/ringrule/`.
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ringrule").map(|dirs| dirs.data_dir().to_path_buf())
}
