//! Cross-process output lock using advisory file locking (fs2 flock).
//!
//! Two runs targeting the same core directory would otherwise interleave
//! their config writes. The lock covers the emission stage only; probing and
//! artifact building are namespaced per language and run unlocked.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = ".phobos.lock";

/// Advisory file lock for one output directory.
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
}

/// RAII guard that releases the lock on drop.
pub struct RunLockGuard {
    file: File,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl RunLock {
    /// Lock file at `<core_dir>/.phobos.lock`. Creates `core_dir` if needed.
    pub fn for_output_dir(core_dir: &Path) -> Result<Self> {
        fs::create_dir_all(core_dir)
            .with_context(|| format!("Failed to create {}", core_dir.display()))?;
        Ok(Self {
            path: core_dir.join(LOCK_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking acquire: waits until the lock is available.
    pub fn acquire(&self) -> Result<RunLockGuard> {
        let file = self.open()?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", self.path.display()))?;
        Ok(RunLockGuard { file })
    }

    /// Non-blocking try-acquire: returns `None` if another process holds it.
    pub fn try_acquire(&self) -> Result<Option<RunLockGuard>> {
        let file = self.open()?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(RunLockGuard { file })),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            #[cfg(unix)]
            Err(ref e) if e.raw_os_error() == Some(35) || e.raw_os_error() == Some(11) => {
                // EAGAIN(11) / EWOULDBLOCK(35 on macOS)
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `acquire` or `try_acquire` depending on `wait`; a held lock without
    /// waiting is an error naming the lock file.
    pub fn lock(&self, wait: bool) -> Result<RunLockGuard> {
        if wait {
            return self.acquire();
        }
        self.try_acquire()?.ok_or_else(|| {
            anyhow::anyhow!(
                "Another run holds {}; retry later or drop --no-wait",
                self.path.display()
            )
        })
    }

    fn open(&self) -> Result<File> {
        File::create(&self.path)
            .with_context(|| format!("Failed to open lock file {}", self.path.display()))
    }
}
