//! RPC surface of the storage daemon
//!
//! The harness only ever talks to the daemon through [`MfsApi`]. Two
//! implementations exist:
//!
//! - [`KuboClient`]: the daemon's HTTP RPC API (`/api/v0/...`)
//! - [`MemoryMfs`]: an in-process stand-in with the same namespace rules,
//!   used by tests and by `--backend memory`

mod kubo;
mod memory;

pub use kubo::KuboClient;
pub use memory::{MemoryMfs, OpCounts};

use crate::error::Result;
use crate::workload::join_mfs;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Content identifier returned by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    pub fn new(value: impl Into<String>) -> Self {
        Cid(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `/ipfs/<cid>`, the form `files/cp` accepts as a source
    pub fn ipfs_path(&self) -> String {
        format!("/ipfs/{}", self.0)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// Result of `files/stat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub cid: Cid,
    /// File length, or 0 for directories
    pub size: u64,
    /// Total bytes reachable from this node
    pub cumulative_size: u64,
    pub kind: NodeKind,
}

/// One entry of `files/ls`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub cid: Cid,
}

/// One item reported by a bulk add
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedEntry {
    /// Path relative to the add root; empty for the wrapping directory
    pub path: String,
    pub cid: Cid,
    pub size: u64,
}

/// A file held in memory and streamed into a bulk add
#[derive(Debug, Clone)]
pub struct AddEntry {
    pub path: String,
    pub content: Vec<u8>,
}

/// Input of a bulk add
pub enum AddSource {
    /// Every file and directory below a local directory
    Directory(PathBuf),
    /// A lazy single-pass sequence; the daemon pulls one entry at a time
    Entries(Box<dyn Iterator<Item = AddEntry> + Send>),
}

impl fmt::Debug for AddSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddSource::Directory(path) => f.debug_tuple("Directory").field(path).finish(),
            AddSource::Entries(_) => f.write_str("Entries(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    /// Wrap everything in one directory and report it under the empty path
    pub wrap_with_directory: bool,
    pub pin: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            wrap_with_directory: true,
            pin: false,
        }
    }
}

/// Receives the number of bytes ingested since the previous call
pub type ProgressFn<'a> = &'a (dyn Fn(u64) + Send + Sync);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub create: bool,
    pub parents: bool,
    pub truncate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpOptions {
    pub parents: bool,
    pub flush: bool,
}

impl Default for CpOptions {
    fn default() -> Self {
        Self {
            parents: false,
            flush: true,
        }
    }
}

/// Operations the harness issues against the daemon's mutable namespace
#[async_trait]
pub trait MfsApi: Send + Sync {
    /// Stat a path; [`HarnessError::NotFound`](crate::error::HarnessError::NotFound) if absent
    async fn stat(&self, path: &str) -> Result<FileStat>;

    async fn mkdir(&self, path: &str, parents: bool) -> Result<()>;

    async fn rm(&self, path: &str, recursive: bool) -> Result<()>;

    async fn write(&self, path: &str, content: Vec<u8>, options: WriteOptions) -> Result<()>;

    /// Link a content handle into the namespace without copying bytes
    async fn cp(&self, source: &Cid, dest: &str, options: CpOptions) -> Result<()>;

    /// Reconcile pending changes below `path` and return its handle
    async fn flush(&self, path: &str) -> Result<Cid>;

    async fn ls(&self, path: &str) -> Result<Vec<DirEntry>>;

    /// Ingest many files in one call and return a handle for each
    async fn add_all(
        &self,
        source: AddSource,
        options: AddOptions,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<AddedEntry>>;
}

/// Count the files reachable below `root`
pub async fn count_files(api: &dyn MfsApi, root: &str) -> Result<usize> {
    let mut pending = vec![join_mfs(root, "")];
    let mut files = 0;
    while let Some(dir) = pending.pop() {
        for entry in api.ls(&dir).await? {
            match entry.kind {
                NodeKind::File => files += 1,
                NodeKind::Directory => pending.push(join_mfs(&dir, &entry.name)),
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_ipfs_path() {
        let cid = Cid::new("QmTest");
        assert_eq!(cid.ipfs_path(), "/ipfs/QmTest");
        assert_eq!(cid.to_string(), "QmTest");
    }

    #[test]
    fn test_add_options_default_skips_pinning() {
        let options = AddOptions::default();
        assert!(options.wrap_with_directory);
        assert!(!options.pin);
    }

    #[tokio::test]
    async fn test_count_files_walks_nested_directories() {
        let mfs = MemoryMfs::new();
        let options = WriteOptions {
            create: true,
            parents: true,
            truncate: true,
        };
        mfs.write("/root/a.dat", vec![1], options).await.unwrap();
        mfs.write("/root/x/b.dat", vec![2], options).await.unwrap();
        mfs.write("/root/x/y/c.dat", vec![3], options).await.unwrap();
        mfs.mkdir("/root/empty", false).await.unwrap();

        assert_eq!(count_files(&mfs, "/root").await.unwrap(), 3);
        assert_eq!(count_files(&mfs, "/root/x/").await.unwrap(), 2);
    }
}
