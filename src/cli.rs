//! CLI argument parsing for mfsbench

use crate::config::{
    BenchConfig, HarnessConfig, ParentPolicy, SetupConfig, SetupTechnique, StagingLayout,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

/// Which daemon implementation to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// A running daemon reached over its HTTP RPC API (default)
    Kubo,
    /// An in-process stand-in; nothing leaves the process
    Memory,
}

#[derive(Parser, Debug)]
#[command(name = "mfsbench")]
#[command(version)]
#[command(
    about = "Compare bulk add + link against individual writes for filling an IPFS MFS",
    long_about = None
)]
pub struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Daemon RPC base URL (e.g. http://localhost:15001/api/v0)
    #[arg(long = "api-url", global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Daemon implementation to drive
    #[arg(long, global = true, value_enum, default_value = "kubo")]
    pub backend: Backend,

    /// Report format (text or json)
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable trace-level logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Time both ingestion strategies over the same workload
    Bench(BenchArgs),
    /// Provision the baseline directory the benchmark runs against
    Setup(SetupArgs),
}

#[derive(Args, Debug, Default)]
pub struct BenchArgs {
    /// MFS directory to write into
    #[arg(long, value_name = "PATH")]
    pub root: Option<String>,

    /// Number of files in the workload
    #[arg(long, value_name = "N")]
    pub files: Option<usize>,

    /// Timed repetitions per strategy
    #[arg(long, value_name = "N")]
    pub iterations: Option<usize>,

    /// Maximum directory depth of generated paths
    #[arg(long = "max-depth", value_name = "D")]
    pub max_depth: Option<usize>,

    /// Size of each file in bytes
    #[arg(long = "file-size", value_name = "BYTES")]
    pub file_size: Option<usize>,

    /// Staging layout for bulk add + link
    #[arg(long, value_enum)]
    pub layout: Option<StagingLayout>,

    /// Concurrent link operations for bulk add + link (1 = sequential)
    #[arg(long = "link-concurrency", value_name = "N")]
    pub link_concurrency: Option<usize>,

    /// Parent directory handling for individual writes
    #[arg(long = "parent-policy", value_enum)]
    pub parent_policy: Option<ParentPolicy>,

    /// Create the root instead of requiring a provisioned baseline
    #[arg(long = "allow-empty-root")]
    pub allow_empty_root: bool,
}

#[derive(Args, Debug, Default)]
pub struct SetupArgs {
    /// MFS directory to provision
    #[arg(long, value_name = "PATH")]
    pub root: Option<String>,

    /// Provisioning technique
    #[arg(long, value_enum)]
    pub technique: Option<SetupTechnique>,

    /// Number of files to provision
    #[arg(long, value_name = "N")]
    pub files: Option<usize>,

    /// Maximum directory depth of generated paths
    #[arg(long = "max-depth", value_name = "D")]
    pub max_depth: Option<usize>,

    /// Size of each file in bytes
    #[arg(long = "file-size", value_name = "BYTES")]
    pub file_size: Option<usize>,

    /// Files written concurrently per batch when staging on disk
    #[arg(long = "batch-size", value_name = "N")]
    pub batch_size: Option<usize>,

    /// Command line tool used by the external technique
    #[arg(long = "cli-program", value_name = "PROGRAM")]
    pub cli_program: Option<PathBuf>,

    /// Daemon multiaddr passed to the command line tool
    #[arg(long = "cli-api", value_name = "ADDR")]
    pub cli_api: Option<String>,
}

impl BenchArgs {
    pub fn apply(&self, config: &mut BenchConfig) {
        if let Some(root) = &self.root {
            config.mfs_root = root.clone();
        }
        if let Some(files) = self.files {
            config.file_count = files;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(max_depth) = self.max_depth {
            config.depth.max = max_depth;
        }
        if let Some(file_size) = self.file_size {
            config.file_size = file_size;
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(n) = self.link_concurrency {
            config.link_concurrency = n;
        }
        if let Some(policy) = self.parent_policy {
            config.parent_policy = policy;
        }
        if self.allow_empty_root {
            config.require_baseline = false;
        }
    }
}

impl SetupArgs {
    pub fn apply(&self, config: &mut SetupConfig) {
        if let Some(root) = &self.root {
            config.mfs_root = root.clone();
        }
        if let Some(technique) = self.technique {
            config.technique = technique;
        }
        if let Some(files) = self.files {
            config.total_files = files;
        }
        if let Some(max_depth) = self.max_depth {
            config.depth.max = max_depth;
        }
        if let Some(file_size) = self.file_size {
            config.file_size = file_size;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(program) = &self.cli_program {
            config.cli_program = program.clone();
        }
        if let Some(api) = &self.cli_api {
            config.cli_api = api.clone();
        }
    }
}

impl Cli {
    /// Fold global and subcommand flags into `config`
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.api_url {
            config.daemon.api_url = url.clone();
        }
        match &self.command {
            Command::Bench(args) => args.apply(&mut config.bench),
            Command::Setup(args) => args.apply(&mut config.setup),
        }
    }
}
