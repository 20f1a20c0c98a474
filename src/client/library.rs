use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::compositor::format_duration;
use super::recording::Recording;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("recording library I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("recording library is corrupt: {0}")]
    Format(#[from] serde_json::Error),
}

/// What survives of a recording once the page is gone. The media itself is
/// never written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub duration_text: String,
}

impl From<&Recording> for RecordingMetadata {
    fn from(recording: &Recording) -> Self {
        Self {
            id: recording.id.clone(),
            title: recording.title.clone(),
            created_at: recording.created_at,
            duration_seconds: recording.duration_seconds,
            duration_text: format_duration(recording.duration_seconds),
        }
    }
}

/// Metadata of past recordings, kept in a JSON file
pub struct RecordingLibrary {
    path: PathBuf,
    entries: Vec<RecordingMetadata>,
}

impl RecordingLibrary {
    /// Open the library at `path`, starting empty when the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded {} recordings from {}", entries.len(), path.display());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[RecordingMetadata] {
        &self.entries
    }

    /// Remember a finished recording and save the library
    pub fn add(&mut self, recording: &Recording) -> Result<&RecordingMetadata, LibraryError> {
        self.entries.retain(|e| e.id != recording.id);
        self.entries.push(RecordingMetadata::from(recording));
        self.save()?;
        info!("Saved recording {} to the library", recording.id);
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn remove(&mut self, id: &str) -> Result<bool, LibraryError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<(), LibraryError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
