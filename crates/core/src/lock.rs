//! Named mutual exclusion for install critical sections.
//!
//! Installs of the same runtime version (or the same package version) must
//! never run twice at once, even from different processes. Callers depend on
//! the [`NamedLock`] trait so the machine-wide [`FileLocks`] can be swapped for
//! [`InProcessLocks`] in tests.
//!
//! A [`LockGuard`] releases its lock when dropped, so an early return, an
//! error or a timeout can never leave the lock held.

use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, trace};

/// Shared handle to a lock provider.
pub type SharedLock = Arc<dyn NamedLock>;

/// A provider of locks identified by a string key.
#[async_trait]
pub trait NamedLock: Send + Sync {
    /// Block until the lock for `key` is held by the caller.
    ///
    /// There is no timeout: the wait is bounded only by the current holder.
    async fn acquire(&self, key: &str) -> Result<LockGuard>;
}

enum Held {
    File(File),
    Task(OwnedMutexGuard<()>),
}

/// Proof that a named lock is held. Dropping it releases the lock.
pub struct LockGuard {
    key: String,
    _held: Held,
}

impl LockGuard {
    /// The key this guard holds.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        trace!(key = %self.key, "Releasing lock");
    }
}

/// Machine-wide locks backed by exclusive advisory locks on files.
///
/// Every key maps to `{dir}/{key}.lock`. The lock files are never deleted;
/// deleting them would let two waiters lock different inodes.
#[derive(Debug, Clone)]
pub struct FileLocks {
    dir: PathBuf,
}

impl FileLocks {
    /// Create locks stored under `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create locks in the default lock directory (see [`crate::paths::lock_dir`]).
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(crate::paths::lock_dir()?))
    }

    /// Directory holding the lock files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the lock file for `key`.
    #[must_use]
    pub fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", sanitize_key(key)))
    }
}

#[async_trait]
impl NamedLock for FileLocks {
    async fn acquire(&self, key: &str) -> Result<LockGuard> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::io(e, Some(self.dir.clone()), "create_dir_all"))?;

        let path = self.lock_path(key);
        debug!(%key, path = %path.display(), "Waiting for file lock");

        // flock blocks the calling thread, keep it off the async workers
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            fs4::fs_std::FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|e| Error::process(format!("Lock task for '{key}' failed: {e}")))?
        .map_err(|e| Error::lock(key, e))?;

        debug!(%key, "Acquired file lock");
        Ok(LockGuard {
            key: key.to_string(),
            _held: Held::File(file),
        })
    }
}

/// Locks that only exclude tasks within the current process.
#[derive(Debug, Clone, Default)]
pub struct InProcessLocks {
    slots: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl InProcessLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NamedLock for InProcessLocks {
    async fn acquire(&self, key: &str) -> Result<LockGuard> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| Error::lock(key, std::io::Error::other("lock table poisoned")))?;
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let guard = slot.lock_owned().await;
        debug!(%key, "Acquired in-process lock");
        Ok(LockGuard {
            key: key.to_string(),
            _held: Held::Task(guard),
        })
    }
}

/// Map a lock key onto a portable file name.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("node-18.0.0"), "node-18.0.0");
        assert_eq!(sanitize_key("npm-@types/node@latest"), "npm-@types_node@latest");
        assert_eq!(sanitize_key("a b:c"), "a_b_c");
    }

    #[test]
    fn test_lock_path() {
        let locks = FileLocks::new("/tmp/locks");
        assert_eq!(
            locks.lock_path("node-18.0.0"),
            PathBuf::from("/tmp/locks/node-18.0.0.lock")
        );
    }

    #[tokio::test]
    async fn test_file_lock_creates_directory() {
        let temp = TempDir::new().unwrap();
        let locks = FileLocks::new(temp.path().join("nested").join("locks"));

        let guard = locks.acquire("node-18.0.0").await.unwrap();
        assert_eq!(guard.key(), "node-18.0.0");
        assert!(locks.lock_path("node-18.0.0").exists());
    }

    #[tokio::test]
    async fn test_file_lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let locks = FileLocks::new(temp.path());

        let first = locks.acquire("key").await.unwrap();
        drop(first);

        let second = tokio::time::timeout(Duration::from_secs(5), locks.acquire("key")).await;
        assert!(second.is_ok(), "lock should be free after the guard is dropped");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_lock_excludes_concurrent_holders() {
        let temp = TempDir::new().unwrap();
        let locks = FileLocks::new(temp.path());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire("shared").await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_in_process_distinct_keys_do_not_block() {
        let locks = InProcessLocks::new();
        let _a = locks.acquire("npm-jasmine@3.5.0").await.unwrap();
        let b =
            tokio::time::timeout(Duration::from_secs(1), locks.acquire("npm-yarn@1.22.0")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_in_process_same_key_waits() {
        let locks = InProcessLocks::new();
        let held = locks.acquire("node-18.0.0").await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire("node-18.0.0")).await;
        assert!(blocked.is_err(), "second acquire must wait for the holder");

        drop(held);
        let guard = locks.acquire("node-18.0.0").await.unwrap();
        assert_eq!(guard.key(), "node-18.0.0");
    }
}
