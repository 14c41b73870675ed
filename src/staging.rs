//! Local staging areas for bulk adds
//!
//! A [`StagingArea`] is a private temporary directory that lives for one
//! ingestion run. It is removed on [`StagingArea::close`] or on drop,
//! whichever comes first; removal failures are logged and never returned so
//! they cannot mask the error that ended the run.

use crate::config::StagingLayout;
use crate::error::{HarnessError, Result};
use crate::workload::{generate_file, FilePathSpec};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Prefix of every staging directory created under the system temp dir
pub const STAGING_PREFIX: &str = "ipfs-mfs-test-";

/// A file or directory found below a staging root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedItem {
    /// Forward-slash path relative to the staging root
    pub relative: String,
    pub local: PathBuf,
    pub is_dir: bool,
}

/// Every entry below `root`, parents before children, siblings sorted by name
pub fn walk(root: &Path) -> Result<Vec<StagedItem>> {
    let mut items = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| HarnessError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| HarnessError::InvalidConfig(e.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        items.push(StagedItem {
            relative,
            local: entry.path().to_path_buf(),
            is_dir: entry.file_type().is_dir(),
        });
    }
    Ok(items)
}

/// Temporary directory owned by one ingestion run
#[derive(Debug)]
pub struct StagingArea {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl StagingArea {
    /// Create an empty staging directory under the system temp dir
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir()?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "created staging area");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staging directory, logging (not returning) any failure
    pub fn close(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            debug!(path = %self.path.display(), "cleaning up staging area");
            if let Err(e) = dir.close() {
                warn!(path = %self.path.display(), error = %e, "failed to clean up staging area");
            }
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        self.remove();
    }
}

/// A staged file and the MFS path it is meant for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Path relative to the staging root, as the bulk add reports it
    pub local_name: String,
    pub destination: String,
}

/// Write fresh content for every workload path into `area`
///
/// Mirrored staging recreates the directory hierarchy; flattened staging
/// writes `file_<index>` at the top level. Either way the returned list maps
/// each staged name to its destination.
pub async fn materialize(
    area: &StagingArea,
    paths: &[FilePathSpec],
    file_size: usize,
    layout: StagingLayout,
) -> Result<Vec<StagedFile>> {
    let mut staged = Vec::with_capacity(paths.len());
    for (index, spec) in paths.iter().enumerate() {
        let local_name = match layout {
            StagingLayout::Mirrored => spec.relative_path(),
            StagingLayout::Flattened => format!("file_{}", index),
        };
        let local = area.path().join(&local_name);
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&local, generate_file(file_size)).await?;
        staged.push(StagedFile {
            local_name,
            destination: spec.mfs_path(),
        });
    }
    Ok(staged)
}
