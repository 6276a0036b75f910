//! Per-family staging directories.
//!
//! A pass holds its family's staging directory exclusively through a
//! `StagingLease`. The directory is wiped when the lease is taken, and each
//! candidate run downloads into its own fresh subdirectory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use wx_common::{ModelFamily, ResolveResult, RunDescriptor};

/// Root of all family staging directories.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    locks: HashMap<ModelFamily, Arc<Mutex<()>>>,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: ModelFamily::all()
                .iter()
                .map(|f| (*f, Arc::new(Mutex::new(()))))
                .collect(),
        }
    }

    /// Wait for exclusive use of a family's directory, then clear it.
    pub async fn acquire(&self, family: ModelFamily) -> ResolveResult<StagingLease> {
        let lock = self
            .locks
            .get(&family)
            .cloned()
            .unwrap_or_else(|| Arc::new(Mutex::new(())));
        let guard = lock.lock_owned().await;

        let dir = self.root.join(family.as_str());
        if fs::try_exists(&dir).await? {
            fs::remove_dir_all(&dir).await?;
        }
        fs::create_dir_all(&dir).await?;
        debug!(family = %family, dir = %dir.display(), "Staging directory cleared");

        Ok(StagingLease {
            dir,
            _guard: guard,
        })
    }
}

/// Exclusive hold on one family's staging directory. Released on drop.
#[derive(Debug)]
pub struct StagingLease {
    dir: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl StagingLease {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh, empty directory for one candidate run.
    pub async fn candidate_dir(&self, run: &RunDescriptor) -> ResolveResult<PathBuf> {
        let dir = self.dir.join(run.stamp());
        if fs::try_exists(&dir).await? {
            fs::remove_dir_all(&dir).await?;
        }
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}
