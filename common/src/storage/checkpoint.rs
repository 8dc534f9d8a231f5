use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::AppError;

/// Durable marker of load progress: the count of valid documents fully
/// committed to both stores. The fingerprint ties the counter to the exact
/// corpus file it was computed over; resuming against a different file
/// would silently shift the id space, so the loader refuses and starts
/// fresh instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    #[serde(rename = "lastIndex")]
    pub last_index: usize,
    #[serde(rename = "corpusFingerprint", default)]
    pub corpus_fingerprint: String,
}

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absent file means fresh start. A file that no longer parses is
    /// treated the same way rather than aborting the run.
    pub fn load(&self) -> Result<Option<Checkpoint>, AppError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(AppError::Checkpoint(format!(
                    "reading {}: {err}",
                    self.path.display()
                )))
            }
        };

        match serde_json::from_slice::<Checkpoint>(&bytes) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "unreadable checkpoint, starting fresh");
                Ok(None)
            }
        }
    }

    /// Written synchronously and flushed to disk before the next batch may
    /// begin; this ordering is what makes a mid-run kill safe.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), AppError> {
        let body = serde_json::to_vec(checkpoint)
            .map_err(|err| AppError::Checkpoint(format!("encoding checkpoint: {err}")))?;
        let mut file = fs::File::create(&self.path).map_err(|err| {
            AppError::Checkpoint(format!("creating {}: {err}", self.path.display()))
        })?;
        file.write_all(&body)
            .and_then(|()| file.sync_all())
            .map_err(|err| {
                AppError::Checkpoint(format!("writing {}: {err}", self.path.display()))
            })?;
        Ok(())
    }

    /// Removed only on full successful completion.
    pub fn clear(&self) -> Result<(), AppError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::Checkpoint(format!(
                "removing {}: {err}",
                self.path.display()
            ))),
        }
    }
}

/// SHA-256 hex over the corpus file bytes.
pub fn corpus_fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}
