use crate::write_atomic;
use chirp_core::{ApprovalStatus, CoreError, ReplyDraft, StateError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A human-approved draft waiting for its posting run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingDraft {
    #[serde(flatten)]
    pub draft: ReplyDraft,
    pub approved_at: DateTime<Utc>,
}

/// Durable queue of approved drafts. Ids in here gate the dedup check the
/// same way seen ids do, so an approved post is never drafted twice while it
/// waits to be published.
#[derive(Debug)]
pub struct PendingStore {
    path: PathBuf,
    entries: Vec<PendingDraft>,
}

impl PendingStore {
    /// Same load contract as the seen-set: missing or corrupt files start
    /// empty with a logged warning.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        "Pending queue at {} is corrupt ({}), starting empty",
                        path.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(
                    "Could not read pending queue at {} ({}), starting empty",
                    path.display(),
                    e
                );
                Vec::new()
            }
        };

        debug!(
            "Loaded pending queue with {} entries from {}",
            entries.len(),
            path.display()
        );
        Self { path, entries }
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.entries.iter().any(|p| p.draft.post_id == post_id)
    }

    /// Enqueues an approved draft. Duplicate post ids are ignored.
    pub fn push(&mut self, mut draft: ReplyDraft) {
        if self.contains(&draft.post_id) {
            return;
        }
        draft.status = ApprovalStatus::Approved;
        self.entries.push(PendingDraft {
            draft,
            approved_at: Utc::now(),
        });
    }

    pub fn first(&self) -> Option<&PendingDraft> {
        self.entries.first()
    }

    pub fn remove(&mut self, post_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|p| p.draft.post_id != post_id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn flush(&self) -> Result<(), CoreError> {
        let payload =
            serde_json::to_string_pretty(&self.entries).map_err(|e| StateError::EncodeFailed {
                path: self.path.display().to_string(),
                source: e,
            })?;
        write_atomic(&self.path, &payload)?;
        debug!(
            "Flushed pending queue ({} entries) to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
