//! Settings persistence: one flat JSON blob under a single fixed key.
//!
//! Layout inside the store directory:
//! ```text
//! settings.json - the complete Settings record, overwritten on every save
//! ```
//!
//! # Invariants
//! - Load is all-or-nothing: a blob that parses as the complete record
//!   replaces the defaults wholesale; anything else (absent, unreadable,
//!   partial, unknown keys) yields the compiled-in defaults. There is no
//!   field-wise merge.
//! - Save serializes the entire record and overwrites the previous value.

use gravpool_common::Settings;
use std::path::{Path, PathBuf};

/// The single persistence key, realized as a file name.
const SETTINGS_KEY: &str = "settings.json";

/// Errors from settings persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed key-value bridge holding the one settings blob.
pub struct SettingsStore {
    root: PathBuf,
}

impl SettingsStore {
    /// Open or create a store rooted at the given directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Read the persisted blob, falling back to defaults when it is absent
    /// or does not parse as the complete record.
    pub fn load(&self) -> Settings {
        let path = self.key_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Settings::default();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "settings unreadable; using defaults");
                return Settings::default();
            }
        };
        match serde_json::from_str::<Settings>(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "settings blob unparsable; using defaults");
                Settings::default()
            }
        }
    }

    /// Serialize the full record and overwrite the single key.
    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let json = serde_json::to_string(settings)?;
        std::fs::write(self.key_path(), json)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self) -> PathBuf {
        self.root.join(SETTINGS_KEY)
    }
}
