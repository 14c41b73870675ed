//! In-process MFS with the daemon's namespace rules
//!
//! Content handles are SHA-256 digests rendered as `Qm` + 44 hex characters,
//! so identical bytes always yield identical handles and the handles have the
//! same 46-character shape the command line tool prints. Every node that is
//! added or written lands in a block store, which is what `cp` resolves
//! handles against.

use super::{
    AddEntry, AddOptions, AddSource, AddedEntry, Cid, CpOptions, DirEntry, FileStat, MfsApi,
    NodeKind, ProgressFn, WriteOptions,
};
use crate::error::{HarnessError, Result};
use crate::staging;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

type Children = BTreeMap<String, Node>;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir(Children),
}

impl Node {
    fn cid(&self) -> Cid {
        let mut hasher = Sha256::new();
        match self {
            Node::File(content) => {
                hasher.update(b"file\0");
                hasher.update(content);
            }
            Node::Dir(children) => {
                hasher.update(b"dir\0");
                for (name, child) in children {
                    hasher.update(name.as_bytes());
                    hasher.update(b"\0");
                    hasher.update(child.cid().as_str().as_bytes());
                    hasher.update(b"\n");
                }
            }
        }
        let digest = hex::encode(hasher.finalize());
        Cid::new(format!("Qm{}", &digest[..44]))
    }

    fn kind(&self) -> NodeKind {
        match self {
            Node::File(_) => NodeKind::File,
            Node::Dir(_) => NodeKind::Directory,
        }
    }

    fn cumulative_size(&self) -> u64 {
        match self {
            Node::File(content) => content.len() as u64,
            Node::Dir(children) => children.values().map(Node::cumulative_size).sum(),
        }
    }

    fn stat(&self) -> FileStat {
        let size = match self {
            Node::File(content) => content.len() as u64,
            Node::Dir(_) => 0,
        };
        FileStat {
            cid: self.cid(),
            size,
            cumulative_size: self.cumulative_size(),
            kind: self.kind(),
        }
    }
}

/// Calls received per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub stat: usize,
    pub mkdir: usize,
    pub rm: usize,
    pub write: usize,
    pub cp: usize,
    pub flush: usize,
    pub ls: usize,
    pub add_all: usize,
}

impl OpCounts {
    pub fn total(&self) -> usize {
        self.stat + self.mkdir + self.rm + self.write + self.cp + self.flush + self.ls + self.add_all
    }
}

#[derive(Debug, Default)]
struct State {
    root: Children,
    blocks: HashMap<Cid, Node>,
    counts: OpCounts,
}

/// MFS held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryMfs {
    state: Mutex<State>,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn not_a_directory(segment: &str) -> HarnessError {
    HarnessError::Rpc {
        command: "files".to_string(),
        message: format!("{} is not a directory", segment),
    }
}

/// Walk to the directory named by `segs`, optionally creating missing levels
fn dir_mut<'a>(
    root: &'a mut Children,
    segs: &[&str],
    create: bool,
    path: &str,
) -> Result<&'a mut Children> {
    let mut current = root;
    for seg in segs {
        let node = if create {
            current
                .entry(seg.to_string())
                .or_insert_with(|| Node::Dir(Children::new()))
        } else {
            current
                .get_mut(*seg)
                .ok_or_else(|| HarnessError::NotFound(path.to_string()))?
        };
        current = match node {
            Node::Dir(children) => children,
            Node::File(_) => return Err(not_a_directory(seg)),
        };
    }
    Ok(current)
}

fn lookup<'a>(root: &'a Children, segs: &[&str], path: &str) -> Result<&'a Node> {
    let (last, parents) = match segs.split_last() {
        Some(split) => split,
        None => return Err(HarnessError::NotFound(path.to_string())),
    };
    let mut current = root;
    for seg in parents {
        current = match current.get(*seg) {
            Some(Node::Dir(children)) => children,
            Some(Node::File(_)) => return Err(not_a_directory(seg)),
            None => return Err(HarnessError::NotFound(path.to_string())),
        };
    }
    current
        .get(*last)
        .ok_or_else(|| HarnessError::NotFound(path.to_string()))
}

/// Insert a file into a detached tree, creating intermediate directories
fn insert_file(tree: &mut Children, relative: &str, content: Vec<u8>) -> Result<()> {
    let segs = segments(relative);
    let (name, parents) = segs
        .split_last()
        .ok_or_else(|| HarnessError::InvalidConfig(format!("empty add path {:?}", relative)))?;
    let dir = dir_mut(tree, parents, true, relative)?;
    dir.insert(name.to_string(), Node::File(content));
    Ok(())
}

/// Post-order listing of a detached tree: files and directories, children first
fn collect_added(prefix: &str, children: &Children, out: &mut Vec<(String, Node)>) {
    for (name, node) in children {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        if let Node::Dir(grandchildren) = node {
            collect_added(&path, grandchildren, out);
        }
        out.push((path, node.clone()));
    }
}

impl MemoryMfs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Calls received so far
    pub fn counts(&self) -> OpCounts {
        self.lock().counts
    }

    pub fn reset_counts(&self) {
        self.lock().counts = OpCounts::default();
    }

    /// Whether a handle is present in the block store
    pub fn has_block(&self, cid: &Cid) -> bool {
        self.lock().blocks.contains_key(cid)
    }

    /// Bytes stored at `path`, if it is a file
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        match lookup(&state.root, &segments(path), path) {
            Ok(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    async fn read_directory(source: &Path) -> Result<Children> {
        let mut tree = Children::new();
        for item in staging::walk(source)? {
            if item.is_dir {
                dir_mut(&mut tree, &segments(&item.relative), true, &item.relative)?;
            } else {
                let content = tokio::fs::read(&item.local).await?;
                insert_file(&mut tree, &item.relative, content)?;
            }
        }
        Ok(tree)
    }
}

#[async_trait]
impl MfsApi for MemoryMfs {
    async fn stat(&self, path: &str) -> Result<FileStat> {
        let mut state = self.lock();
        state.counts.stat += 1;
        let segs = segments(path);
        if segs.is_empty() {
            return Ok(Node::Dir(state.root.clone()).stat());
        }
        lookup(&state.root, &segs, path).map(Node::stat)
    }

    async fn mkdir(&self, path: &str, parents: bool) -> Result<()> {
        let mut state = self.lock();
        state.counts.mkdir += 1;
        let segs = segments(path);
        let Some((name, parent_segs)) = segs.split_last() else {
            return if parents {
                Ok(())
            } else {
                Err(HarnessError::Rpc {
                    command: "files/mkdir".to_string(),
                    message: "file already exists".to_string(),
                })
            };
        };
        let dir = dir_mut(&mut state.root, parent_segs, parents, path)?;
        match dir.get(*name) {
            Some(Node::Dir(_)) if parents => Ok(()),
            Some(_) => Err(HarnessError::Rpc {
                command: "files/mkdir".to_string(),
                message: format!("{}: file already exists", path),
            }),
            None => {
                dir.insert(name.to_string(), Node::Dir(Children::new()));
                Ok(())
            }
        }
    }

    async fn rm(&self, path: &str, recursive: bool) -> Result<()> {
        let mut state = self.lock();
        state.counts.rm += 1;
        let segs = segments(path);
        let Some((name, parent_segs)) = segs.split_last() else {
            return Err(HarnessError::Rpc {
                command: "files/rm".to_string(),
                message: "cannot delete root".to_string(),
            });
        };
        let dir = dir_mut(&mut state.root, parent_segs, false, path)?;
        match dir.get(*name) {
            None => Err(HarnessError::NotFound(path.to_string())),
            Some(Node::Dir(_)) if !recursive => Err(HarnessError::Rpc {
                command: "files/rm".to_string(),
                message: format!("{} is a directory, use -r to remove directories", path),
            }),
            Some(_) => {
                dir.remove(*name);
                Ok(())
            }
        }
    }

    async fn write(&self, path: &str, content: Vec<u8>, options: WriteOptions) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.counts.write += 1;
        let segs = segments(path);
        let Some((name, parent_segs)) = segs.split_last() else {
            return Err(not_a_directory("/"));
        };
        let dir = dir_mut(&mut state.root, parent_segs, options.parents, path)?;
        let updated = match dir.get(*name) {
            Some(Node::Dir(_)) => return Err(not_a_directory(name)),
            Some(Node::File(existing)) if !options.truncate && existing.len() > content.len() => {
                let mut merged = existing.clone();
                merged[..content.len()].copy_from_slice(&content);
                Node::File(merged)
            }
            Some(Node::File(_)) => Node::File(content),
            None if options.create => Node::File(content),
            None => return Err(HarnessError::NotFound(path.to_string())),
        };
        dir.insert(name.to_string(), updated.clone());
        state.blocks.insert(updated.cid(), updated);
        Ok(())
    }

    async fn cp(&self, source: &Cid, dest: &str, options: CpOptions) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.counts.cp += 1;
        let node = state
            .blocks
            .get(source)
            .cloned()
            .ok_or_else(|| HarnessError::NotFound(source.ipfs_path()))?;
        let segs = segments(dest);
        let Some((name, parent_segs)) = segs.split_last() else {
            return Err(HarnessError::Rpc {
                command: "files/cp".to_string(),
                message: "cannot copy onto root".to_string(),
            });
        };
        let dir = dir_mut(&mut state.root, parent_segs, options.parents, dest)?;
        if dir.contains_key(*name) {
            return Err(HarnessError::Rpc {
                command: "files/cp".to_string(),
                message: format!("cp: cannot put node in path {}: directory already has entry by that name", dest),
            });
        }
        dir.insert(name.to_string(), node);
        Ok(())
    }

    async fn flush(&self, path: &str) -> Result<Cid> {
        let mut state = self.lock();
        state.counts.flush += 1;
        let segs = segments(path);
        if segs.is_empty() {
            return Ok(Node::Dir(state.root.clone()).cid());
        }
        lookup(&state.root, &segs, path).map(Node::cid)
    }

    async fn ls(&self, path: &str) -> Result<Vec<DirEntry>> {
        let mut state = self.lock();
        state.counts.ls += 1;
        let segs = segments(path);
        let to_entry = |name: &str, node: &Node| DirEntry {
            name: name.to_string(),
            kind: node.kind(),
            size: node.cumulative_size(),
            cid: node.cid(),
        };
        let children = if segs.is_empty() {
            &state.root
        } else {
            match lookup(&state.root, &segs, path)? {
                Node::Dir(children) => children,
                file @ Node::File(_) => {
                    let name = segs.last().copied().unwrap_or_default();
                    return Ok(vec![to_entry(name, file)]);
                }
            }
        };
        Ok(children
            .iter()
            .map(|(name, node)| to_entry(name, node))
            .collect())
    }

    async fn add_all(
        &self,
        source: AddSource,
        options: AddOptions,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<AddedEntry>> {
        self.lock().counts.add_all += 1;

        let tree = match source {
            AddSource::Directory(path) => {
                let tree = Self::read_directory(&path).await?;
                if let Some(report) = progress {
                    report(Node::Dir(tree.clone()).cumulative_size());
                }
                tree
            }
            AddSource::Entries(entries) => {
                let mut tree = Children::new();
                for AddEntry { path, content } in entries {
                    let len = content.len() as u64;
                    insert_file(&mut tree, &path, content)?;
                    if let Some(report) = progress {
                        report(len);
                    }
                }
                tree
            }
        };

        let mut nodes = Vec::new();
        collect_added("", &tree, &mut nodes);
        if options.wrap_with_directory {
            nodes.push((String::new(), Node::Dir(tree)));
        }

        let mut state = self.lock();
        let added = nodes
            .into_iter()
            .map(|(path, node)| {
                let cid = node.cid();
                let entry = AddedEntry {
                    path,
                    cid: cid.clone(),
                    size: node.cumulative_size(),
                };
                state.blocks.insert(cid, node);
                entry
            })
            .collect();
        Ok(added)
    }
}
