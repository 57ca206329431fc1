//! Command-wide lock on the provisioner state directory.
//!
//! Mutating commands take the lock before dispatching any stack so two
//! processes never change the same state directory at once.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ProviderError;

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 900; // 15 minutes

/// How long a lock file may stay incomplete while its holder writes it.
const WRITE_GRACE: Duration = Duration::from_secs(5);

/// Lock file name inside the state directory.
pub const LOCK_FILE: &str = "state.lock";

/// Information about a held lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// Command that took the lock.
    pub command: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a new lock for `holder` running `command`.
    #[must_use]
    pub fn new(holder: &str, command: &str) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            command: command.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }
}

/// File-backed lock.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Lock file inside `state_dir`.
    #[must_use]
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(LOCK_FILE),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires the lock. An expired lock is taken over.
    ///
    /// A fresh lock file is created with `create_new`, so of several
    /// processes racing for a free lock exactly one wins. Takeover of an
    /// expired lock renames a new lock over it and reads it back to confirm
    /// the winner.
    ///
    /// # Errors
    ///
    /// Returns `LockedByOther` if a live lock exists, or `LockFailed` if the
    /// file cannot be written.
    pub async fn acquire(&self, holder: &str, command: &str) -> Result<LockInfo, ProviderError> {
        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(&holder_id, command);
        let content = encode(&lock_info)?;
        self.ensure_dir().await?;

        // A lock released between our create and read is retried once.
        for _ in 0..2 {
            match self.create_new(&content).await {
                Ok(()) => {
                    info!(
                        "Acquired state lock: {} (expires in {}s)",
                        lock_info.lock_id,
                        lock_info.remaining_secs()
                    );
                    return Ok(lock_info);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => {
                    return Err(ProviderError::LockFailed {
                        message: format!("Failed to create lock file: {e}"),
                    });
                }
            }

            let Some(existing) = self.read_contended().await? else {
                continue;
            };
            if !existing.is_expired() {
                return Err(locked_by(&existing));
            }

            debug!("Expired lock held by {} found, taking over", existing.holder);
            self.replace(&content).await?;
            return match self.read_contended().await? {
                Some(current) if current.lock_id == lock_info.lock_id => {
                    info!("Took over expired state lock: {}", lock_info.lock_id);
                    Ok(lock_info)
                }
                Some(current) => Err(locked_by(&current)),
                None => Err(ProviderError::LockFailed {
                    message: String::from("Lock file vanished during takeover"),
                }),
            };
        }

        Err(ProviderError::LockFailed {
            message: String::from("Lock file kept changing while acquiring"),
        })
    }

    /// Releases the lock if it is still ours.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be read or removed.
    pub async fn release(&self, lock_id: &str) -> Result<(), ProviderError> {
        match self.read().await? {
            Some(existing) if existing.lock_id == lock_id => {
                fs::remove_file(&self.path).await.map_err(|e| ProviderError::LockFailed {
                    message: format!("Failed to delete lock file: {e}"),
                })?;
                info!("Released state lock: {lock_id}");
            }
            Some(existing) => {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
            None => {}
        }
        Ok(())
    }

    /// Returns true if a live lock exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file is unreadable.
    pub async fn is_locked(&self) -> Result<bool, ProviderError> {
        Ok(self.read().await?.is_some_and(|lock| !lock.is_expired()))
    }

    async fn read(&self) -> Result<Option<LockInfo>, ProviderError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProviderError::Corrupted {
                    message: format!("Failed to read lock file: {e}"),
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ProviderError::Corrupted {
                message: format!("Failed to parse lock file: {e}"),
            })
    }

    /// Reads a lock another process may still be writing.
    ///
    /// A holder creates the file before writing its contents, so an empty or
    /// unparsable file modified within the last few seconds counts as a live
    /// lock held by that writer.
    async fn read_contended(&self) -> Result<Option<LockInfo>, ProviderError> {
        let meta = match fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProviderError::Corrupted {
                    message: format!("Failed to read lock file: {e}"),
                });
            }
        };
        let being_written = meta
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_none_or(|age| age < WRITE_GRACE);

        match self.read().await {
            Err(ProviderError::Corrupted { .. }) if being_written => {
                Err(ProviderError::LockedByOther {
                    holder: String::from("unknown"),
                    since: Utc::now().to_rfc3339(),
                })
            }
            other => other,
        }
    }

    async fn ensure_dir(&self) -> Result<(), ProviderError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ProviderError::LockFailed {
                message: format!("Failed to create state directory: {e}"),
            })?;
        }
        Ok(())
    }

    /// Creates the lock file, failing with `AlreadyExists` if it is present.
    async fn create_new(&self, content: &str) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await
    }

    /// Atomically replaces whatever lock file exists.
    async fn replace(&self, content: &str) -> Result<(), ProviderError> {
        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let lock_err = |e: std::io::Error| ProviderError::LockFailed {
            message: format!("Failed to write lock file: {e}"),
        };

        let mut file = fs::File::create(&temp_path).await.map_err(lock_err)?;
        file.write_all(content.as_bytes()).await.map_err(lock_err)?;
        file.sync_all().await.map_err(lock_err)?;
        fs::rename(&temp_path, &self.path).await.map_err(lock_err)
    }
}

fn encode(lock_info: &LockInfo) -> Result<String, ProviderError> {
    serde_json::to_string_pretty(lock_info)
        .map_err(|e| ProviderError::serialization(format!("Failed to serialize lock: {e}")))
}

fn locked_by(existing: &LockInfo) -> ProviderError {
    ProviderError::LockedByOther {
        holder: existing.holder.clone(),
        since: existing.acquired_at.to_rfc3339(),
    }
}

/// Generates a unique holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let hostname = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());
    let pid = std::process::id();
    let uuid = &Uuid::new_v4().to_string()[..8];

    format!("{hostname}-{pid}-{uuid}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let lock = LockFile::in_dir(temp.path());

        let info = lock.acquire("tester", "launch").await.expect("acquire");
        assert!(lock.is_locked().await.expect("is_locked"));
        assert_eq!(info.command, "launch");

        lock.release(&info.lock_id).await.expect("release");
        assert!(!lock.is_locked().await.expect("is_locked"));
    }

    #[tokio::test]
    async fn test_conflicting_lock_is_rejected() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let lock = LockFile::in_dir(temp.path());

        let _held = lock.acquire("first", "create").await.expect("acquire");
        let err = lock.acquire("second", "delete").await.expect_err("must conflict");
        assert!(matches!(
            err,
            ProviderError::LockedByOther { ref holder, .. } if holder == "first"
        ));
    }

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let lock = LockFile::in_dir(temp.path());

        let mut stale = LockInfo::new("crashed", "update");
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        lock.ensure_dir().await.expect("state dir");
        lock.replace(&encode(&stale).expect("encode"))
            .await
            .expect("write stale lock");

        let info = lock.acquire("fresh", "update").await.expect("take over");
        assert_eq!(info.holder, "fresh");
    }

    #[tokio::test]
    async fn test_release_ignores_foreign_lock() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let lock = LockFile::in_dir(temp.path());

        let _held = lock.acquire("owner", "delete").await.expect("acquire");
        lock.release("not-ours").await.expect("release");
        assert!(lock.is_locked().await.expect("is_locked"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_acquires_have_one_winner() {
        for _ in 0..20 {
            let temp = TempDir::new().expect("Failed to create temp dir");
            let lock = LockFile::in_dir(temp.path());

            let first = tokio::spawn({
                let lock = lock.clone();
                async move { lock.acquire("first", "launch").await }
            });
            let second = tokio::spawn({
                let lock = lock.clone();
                async move { lock.acquire("second", "delete").await }
            });

            let results = [
                first.await.expect("task panicked"),
                second.await.expect("task panicked"),
            ];
            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1, "results: {results:?}");
            assert!(
                results
                    .iter()
                    .any(|r| matches!(r, Err(ProviderError::LockedByOther { .. })))
            );
        }
    }

    #[tokio::test]
    async fn test_live_lock_survives_takeover_attempt() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let lock = LockFile::in_dir(temp.path());

        let held = lock.acquire("owner", "update").await.expect("acquire");
        assert!(lock.acquire("intruder", "update").await.is_err());

        let current = lock.read().await.expect("read").expect("lock present");
        assert_eq!(current.lock_id, held.lock_id);
    }

    #[test]
    fn test_holder_id_generation() {
        let id1 = generate_holder_id();
        let id2 = generate_holder_id();
        assert_ne!(id1, id2);
        assert!(id1.contains(&std::process::id().to_string()));
    }
}
