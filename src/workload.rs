//! Workload generation: random MFS destination paths and file contents
//!
//! Names are drawn from the operating system's CSPRNG so collisions between
//! generated paths are negligible. Contents are fresh random bytes on every
//! call, which keeps content-addressed deduplication from flattering repeat
//! iterations.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Inclusive bound on the number of directory segments in a generated path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min: usize,
    pub max: usize,
}

impl DepthRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, depth: usize) -> bool {
        (self.min..=self.max).contains(&depth)
    }

    fn sample(&self) -> usize {
        OsRng.gen_range(self.min..=self.max)
    }
}

/// A destination in the MFS namespace: root, random directories, random file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePathSpec {
    root: String,
    dirs: Vec<String>,
    file_name: String,
}

impl FilePathSpec {
    /// Number of generated directory segments below the root
    pub fn depth(&self) -> usize {
        self.dirs.len()
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Path below the root, without a leading slash (`dir_a/dir_b/file_c.dat`)
    pub fn relative_path(&self) -> String {
        let mut path = self.dirs.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(&self.file_name);
        path
    }

    /// Full MFS path (`/mfs-test/dir_a/file_c.dat`); always forward slashes
    pub fn mfs_path(&self) -> String {
        join_mfs(&self.root, &self.relative_path())
    }

    /// MFS path of the directory holding the file
    pub fn parent_path(&self) -> String {
        join_mfs(&self.root, &self.dirs.join("/"))
    }
}

/// Join an MFS root and a relative path with exactly one separator
pub fn join_mfs(root: &str, relative: &str) -> String {
    let root = root.trim_end_matches('/');
    if relative.is_empty() {
        return if root.is_empty() { "/".to_string() } else { root.to_string() };
    }
    format!("{}/{}", root, relative.trim_start_matches('/'))
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Random directory segment: `dir_` + 8 hex characters
pub fn random_dir_name() -> String {
    format!("dir_{}", random_hex(4))
}

/// Random file segment: `file_` + 16 hex characters + `.dat`
pub fn random_file_name() -> String {
    format!("file_{}.dat", random_hex(8))
}

/// Generate one path below `root` with exactly `depth` directory segments
pub fn generate_path(root: &str, depth: usize) -> FilePathSpec {
    FilePathSpec {
        root: root.trim_end_matches('/').to_string(),
        dirs: (0..depth).map(|_| random_dir_name()).collect(),
        file_name: random_file_name(),
    }
}

/// Generate `count` paths below `root`, each with a depth drawn from `depth`
pub fn generate_paths(root: &str, count: usize, depth: DepthRange) -> Vec<FilePathSpec> {
    (0..count)
        .map(|_| generate_path(root, depth.sample()))
        .collect()
}

/// `size` cryptographically random bytes; call once per file per iteration
pub fn generate_file(size: usize) -> Vec<u8> {
    let mut content = vec![0u8; size];
    OsRng.fill_bytes(&mut content);
    content
}

/// The fixed set of destinations one benchmark run writes to
///
/// Generated once and shared by every strategy and iteration so timings are
/// comparable. File contents are not part of the workload; strategies call
/// [`generate_file`] on every run.
#[derive(Debug, Clone)]
pub struct Workload {
    root: String,
    paths: Vec<FilePathSpec>,
    file_size: usize,
}

impl Workload {
    pub fn generate(root: &str, count: usize, depth: DepthRange, file_size: usize) -> Self {
        Self {
            root: root.trim_end_matches('/').to_string(),
            paths: generate_paths(root, count, depth),
            file_size,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn paths(&self) -> &[FilePathSpec] {
        &self.paths
    }

    pub fn file_size(&self) -> usize {
        self.file_size
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
