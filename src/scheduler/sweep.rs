use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::coordinator::Coordinator;

/// Periodic maintenance pass over the temp store.
#[async_trait]
pub trait Sweep: Send + Sync {
    /// Returns the number of entries removed.
    async fn sweep(&self) -> Result<usize>;
}

/// Empties a directory, keeping the directory itself.
pub struct TempDirSweep {
    dir: PathBuf,
}

impl TempDirSweep {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Sweep for TempDirSweep {
    async fn sweep(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.dir.display()))
            }
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
        {
            let path = entry.path();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let outcome = if is_dir {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match outcome {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }
}

/// One maintenance run: wait for the in-flight command, then sweep while
/// holding the cleanup permit.
pub async fn run_maintenance(coordinator: &Coordinator, sweep: &dyn Sweep) {
    info!(
        "Starting cleanup task (coordinator: {:?})...",
        coordinator.activity()
    );
    let _permit = coordinator.begin_cleanup().await;

    match sweep.sweep().await {
        Ok(removed) => info!("Cleanup task completed, {} entries removed", removed),
        Err(e) => error!("Cleanup error: {:#}", e),
    }
}
