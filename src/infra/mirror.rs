//! On-disk mirror of last-known balances.
//!
//! Used only as an offline fallback when a refresh fails and the in-memory
//! cache is empty. The mirror is tagged with its fetch time and discarded
//! once it exceeds the configured maximum age; it is never treated as a
//! substitute for a live fetch.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::BalanceSnapshot;

#[derive(Debug, Serialize, Deserialize)]
struct MirrorFile {
    fetched_at: DateTime<Utc>,
    balances: Vec<BalanceSnapshot>,
}

/// Persists the last successful balance snapshot to a JSON file.
#[derive(Debug)]
pub struct BalanceMirror {
    path: PathBuf,
    max_age: Duration,
}

impl BalanceMirror {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    /// Best-effort write; failures are logged and swallowed so a broken
    /// disk never affects the live flow.
    pub async fn store(&self, balances: &[BalanceSnapshot]) {
        let file = MirrorFile {
            fetched_at: Utc::now(),
            balances: balances.to_vec(),
        };
        let bytes = match serde_json::to_vec(&file) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode balance mirror");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.path, bytes).await {
            warn!(path = %self.path.display(), error = %e, "Failed to write balance mirror");
        }
    }

    /// Last-known balances, if present and younger than the maximum age.
    pub async fn load(&self) -> Option<Vec<BalanceSnapshot>> {
        let bytes = tokio::fs::read(&self.path).await.ok()?;
        let file: MirrorFile = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding corrupt balance mirror");
                return None;
            }
        };

        let age = Utc::now() - file.fetched_at;
        let max_age = chrono::Duration::from_std(self.max_age).ok()?;
        if age > max_age {
            debug!(
                age_secs = age.num_seconds(),
                "Discarding balance mirror past max age"
            );
            return None;
        }
        Some(file.balances)
    }
}
