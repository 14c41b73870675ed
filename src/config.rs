//! Harness configuration
//!
//! All workload parameters live in one immutable [`HarnessConfig`] that is
//! handed to each component at construction. Defaults reproduce the fixed
//! constants the harness historically ran with; a TOML file or CLI flags
//! override individual fields.
//!
//! # Example TOML
//! ```toml
//! [daemon]
//! api_url = "http://localhost:15001/api/v0"
//!
//! [bench]
//! file_count = 200
//! layout = "mirrored"
//!
//! [setup]
//! technique = "disk"
//! total_files = 10000
//! ```

use crate::error::{HarnessError, Result};
use crate::workload::DepthRange;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    pub daemon: DaemonConfig,
    pub bench: BenchConfig,
    pub setup: SetupConfig,
}

/// Where the storage daemon listens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// RPC base URL including the `/api/v0` prefix
    pub api_url: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:15001/api/v0".to_string(),
        }
    }
}

/// How Strategy A lays files out under its staging area
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StagingLayout {
    /// `file_<index>` names plus an explicit local-name -> destination map
    #[default]
    Flattened,
    /// Recreate the destination hierarchy under the staging root
    Mirrored,
}

/// How Strategy B makes sure parent directories exist
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ParentPolicy {
    /// `write(create, parents, truncate)` creates parents in the same call
    #[default]
    Delegate,
    /// `stat` the parent and `mkdir -p` it when missing, then write
    ExplicitMkdir,
}

/// Benchmark workload and strategy parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// MFS directory both strategies write into
    pub mfs_root: String,
    /// Number of files in the workload
    pub file_count: usize,
    /// Timed repetitions per strategy
    pub iterations: usize,
    /// Directory depth bound for generated paths
    pub depth: DepthRange,
    /// Size of each synthetic file in bytes
    pub file_size: usize,
    /// Strategy A staging layout
    pub layout: StagingLayout,
    /// Strategy A link fan-out (1 = strictly sequential)
    pub link_concurrency: usize,
    /// Strategy B parent creation policy
    pub parent_policy: ParentPolicy,
    /// Refuse to run unless `mfs_root` already exists
    pub require_baseline: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            mfs_root: "/mfs-test".to_string(),
            file_count: 50,
            iterations: 3,
            depth: DepthRange::new(1, 100),
            file_size: 1024,
            layout: StagingLayout::Flattened,
            link_concurrency: 1,
            parent_policy: ParentPolicy::Delegate,
            require_baseline: true,
        }
    }
}

/// Baseline provisioning technique
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SetupTechnique {
    /// Stage on local disk, bulk add over RPC
    Disk,
    /// Stage on local disk, add through the daemon's command line tool
    External,
    /// Generate in memory and stream through the bulk add call
    #[default]
    Memory,
}

impl SetupTechnique {
    pub fn label(&self) -> &'static str {
        match self {
            SetupTechnique::Disk => "Disk-based",
            SetupTechnique::External => "Command line",
            SetupTechnique::Memory => "In-memory",
        }
    }
}

/// Baseline provisioning parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SetupConfig {
    /// MFS directory the baseline is linked under (as `<root>/files`)
    pub mfs_root: String,
    pub technique: SetupTechnique,
    pub total_files: usize,
    pub depth: DepthRange,
    pub file_size: usize,
    /// Files written concurrently per batch when staging on disk
    pub batch_size: usize,
    /// Command line tool used by [`SetupTechnique::External`]
    pub cli_program: PathBuf,
    /// Multiaddr the command line tool uses to reach the daemon
    pub cli_api: String,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            mfs_root: "/mfs-test".to_string(),
            technique: SetupTechnique::Memory,
            total_files: 5000,
            depth: DepthRange::new(1, 2),
            file_size: 1024,
            batch_size: 1000,
            cli_program: PathBuf::from("ipfs"),
            cli_api: "/ip4/127.0.0.1/tcp/15001".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load a configuration file; missing sections and fields keep their defaults
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        let config: HarnessConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.daemon.validate()?;
        self.bench.validate()?;
        self.setup.validate()
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_url).map_err(|e| {
            HarnessError::InvalidConfig(format!("api_url {:?}: {}", self.api_url, e))
        })?;
        Ok(())
    }
}

fn validate_root(root: &str) -> Result<()> {
    if !root.starts_with('/') || root == "/" {
        return Err(HarnessError::InvalidConfig(format!(
            "mfs_root must be an absolute path below /, got {:?}",
            root
        )));
    }
    Ok(())
}

fn validate_depth(depth: &DepthRange) -> Result<()> {
    if depth.min < 1 || depth.min > depth.max {
        return Err(HarnessError::InvalidConfig(format!(
            "depth must satisfy 1 <= min <= max, got {}..={}",
            depth.min, depth.max
        )));
    }
    Ok(())
}

impl BenchConfig {
    pub fn validate(&self) -> Result<()> {
        validate_root(&self.mfs_root)?;
        validate_depth(&self.depth)?;
        if self.file_count == 0 {
            return Err(HarnessError::InvalidConfig(
                "file_count must be >= 1".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(HarnessError::InvalidConfig(
                "iterations must be >= 1".to_string(),
            ));
        }
        if self.link_concurrency == 0 {
            return Err(HarnessError::InvalidConfig(
                "link_concurrency must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl SetupConfig {
    pub fn validate(&self) -> Result<()> {
        validate_root(&self.mfs_root)?;
        validate_depth(&self.depth)?;
        if self.total_files == 0 {
            return Err(HarnessError::InvalidConfig(
                "total_files must be >= 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(HarnessError::InvalidConfig(
                "batch_size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.daemon.api_url, "http://localhost:15001/api/v0");
        assert_eq!(config.bench.mfs_root, "/mfs-test");
        assert_eq!(config.bench.file_count, 50);
        assert_eq!(config.bench.iterations, 3);
        assert_eq!(config.bench.depth, DepthRange::new(1, 100));
        assert_eq!(config.bench.file_size, 1024);
        assert_eq!(config.setup.total_files, 5000);
        assert_eq!(config.setup.depth, DepthRange::new(1, 2));
        assert_eq!(config.setup.technique, SetupTechnique::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[bench]\nfile_count = 200\nlayout = \"mirrored\"\n\n[setup]\ntechnique = \"external\""
        )
        .unwrap();

        let config = HarnessConfig::from_toml(file.path()).unwrap();
        assert_eq!(config.bench.file_count, 200);
        assert_eq!(config.bench.layout, StagingLayout::Mirrored);
        assert_eq!(config.bench.iterations, 3);
        assert_eq!(config.setup.technique, SetupTechnique::External);
        assert_eq!(config.daemon, DaemonConfig::default());
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = HarnessConfig::from_toml("/nonexistent/mfsbench.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_rejects_relative_root() {
        let config = BenchConfig {
            mfs_root: "mfs-test".to_string(),
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_depth() {
        let config = BenchConfig {
            depth: DepthRange::new(5, 2),
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_counts() {
        let config = BenchConfig {
            iterations: 0,
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SetupConfig {
            batch_size: 0,
            ..SetupConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = DaemonConfig {
            api_url: "not a url".to_string(),
        };
        assert!(config.validate().is_err());
    }
}
