pub mod pending;

#[cfg(test)]
mod tests;

pub use pending::{PendingDraft, PendingStore};

use chirp_core::{CoreError, StateError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persisted set of post ids already replied to, enforcing at-most-once
/// reply semantics across runs.
///
/// Loaded once per run and passed by reference into the pipeline; the file
/// is only touched through [`SeenStore::flush`].
#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl SeenStore {
    /// Loads the store from disk. A missing file is a fresh start; an
    /// unreadable or unparseable file is logged and treated as empty rather
    /// than crashing the pipeline.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        "Seen-set at {} is corrupt ({}), starting empty",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(
                    "Could not read seen-set at {} ({}), starting empty",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };

        debug!(
            "Loaded seen-set with {} entries from {}",
            entries.len(),
            path.display()
        );
        Self { path, entries }
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.entries.contains_key(post_id)
    }

    /// Records a post id as handled. Idempotent: re-inserting keeps the
    /// original handled timestamp.
    pub fn insert(&mut self, post_id: &str) {
        self.entries
            .entry(post_id.to_string())
            .or_insert_with(Utc::now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the full set to disk with atomic replace-on-write, so a crash
    /// mid-flush can never leave a partially written live file.
    pub fn flush(&self) -> Result<(), CoreError> {
        let payload =
            serde_json::to_string_pretty(&self.entries).map_err(|e| StateError::EncodeFailed {
                path: self.path.display().to_string(),
                source: e,
            })?;
        write_atomic(&self.path, &payload)?;
        debug!(
            "Flushed seen-set ({} entries) to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Serializes to a sibling `.tmp` file, then renames over the target.
pub(crate) fn write_atomic(path: &Path, payload: &str) -> Result<(), StateError> {
    let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));

    fs::write(&tmp_path, payload).map_err(|e| StateError::PersistFailed {
        path: tmp_path.display().to_string(),
        source: e,
    })?;
    fs::rename(&tmp_path, path).map_err(|e| StateError::PersistFailed {
        path: path.display().to_string(),
        source: e,
    })
}
