//! JSON file persistence for the registry.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solaris_game::{PersistedState, SessionStore};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("store file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredState {
    saved_at: String,
    state: PersistedState,
}

/// Whole-registry snapshot in a single JSON file. Saves write a sibling temp
/// file and rename it over the target, so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// When the current file was written, if it exists.
    pub fn saved_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.read()?.and_then(|stored| {
            DateTime::parse_from_rfc3339(&stored.saved_at)
                .ok()
                .map(|at| at.with_timezone(&Utc))
        }))
    }

    fn read(&self) -> Result<Option<StoredState>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })
    }
}

impl SessionStore for JsonFileStore {
    type Error = StoreError;

    fn save(&self, state: &PersistedState) -> Result<(), Self::Error> {
        let stored = StoredState {
            saved_at: Utc::now().to_rfc3339(),
            state: state.clone(),
        };
        let json = serde_json::to_vec_pretty(&stored).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|err| self.io_error(err))?;
        fs::rename(&temp, &self.path).map_err(|err| self.io_error(err))?;
        log::debug!(
            "saved {} sessions to {}",
            state.sessions.len(),
            self.path.display()
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedState>, Self::Error> {
        Ok(self.read()?.map(|stored| stored.state))
    }
}
