//! One-shot baseline provisioning
//!
//! Populates `<root>/files` with a large tree of small files so the
//! benchmark never runs against an empty namespace. Every technique ends
//! with one content handle for the whole tree, which is then linked into
//! the namespace:
//!
//! 1. remove `<root>` recursively (absent root is fine)
//! 2. run the technique and obtain the tree's handle
//! 3. `mkdir -p <root>` then `cp /ipfs/<cid> <root>/files`
//! 4. stat `<root>` for the report

mod disk;
mod external;
mod memory;

pub use external::IdentifierScanner;
pub use memory::GeneratedFiles;

use crate::config::{SetupConfig, SetupTechnique};
use crate::error::{NotFoundExt, Result};
use crate::rpc::{Cid, CpOptions, FileStat, MfsApi};
use crate::throughput::ThroughputSummary;
use crate::workload::join_mfs;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// What a technique produced before linking
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    pub root_cid: Cid,
    pub details: TechniqueDetails,
}

/// Technique-specific figures
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "technique", rename_all = "kebab-case")]
pub enum TechniqueDetails {
    Disk {
        directories_created: usize,
        file_creation_secs: f64,
        add_secs: f64,
        throughput: ThroughputSummary,
    },
    External {
        file_creation_secs: f64,
        add_secs: f64,
        /// Output lines recognised as content identifiers
        identifier_lines: usize,
    },
    Memory {
        generated: usize,
        /// Entries the bulk add actually pulled
        pulled: usize,
    },
}

/// Outcome of a setup run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupReport {
    pub technique: SetupTechnique,
    pub total_files: usize,
    pub elapsed_secs: f64,
    /// Final stat of the destination root
    pub root: FileStat,
    pub details: TechniqueDetails,
}

const KIB: f64 = 1024.0;

impl SetupReport {
    pub fn per_file_secs(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        self.elapsed_secs / self.total_files as f64
    }

    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        match &self.details {
            TechniqueDetails::Disk {
                directories_created,
                file_creation_secs,
                add_secs,
                throughput,
            } => {
                report.push_str(&format!(
                    "Created {} files in {} directories on disk in {:.2} seconds\n",
                    self.total_files, directories_created, file_creation_secs
                ));
                report.push_str(&format!("Added files in {:.2} seconds\n", add_secs));
                report.push_str(&format!(
                    "Average speed: {:.2} KB/s\n",
                    throughput.average_rate / KIB
                ));
                report.push_str(&format!(
                    "Max throughput: {:.2} KB/s\n",
                    throughput.peak_rate / KIB
                ));
            }
            TechniqueDetails::External {
                file_creation_secs,
                add_secs,
                identifier_lines,
            } => {
                report.push_str(&format!(
                    "Created {} files on disk in {:.2} seconds\n",
                    self.total_files, file_creation_secs
                ));
                report.push_str(&format!("Added via CLI in {:.2} seconds\n", add_secs));
                report.push_str(&format!(
                    "Identifier lines recognised: {}\n",
                    identifier_lines
                ));
            }
            TechniqueDetails::Memory { generated, pulled } => {
                report.push_str(&format!(
                    "Generated {} files in memory, {} pulled by the bulk add\n",
                    generated, pulled
                ));
            }
        }
        report.push_str(&format!(
            "\nSetup complete! {} approach finished in {:.2} seconds\n",
            self.technique.label(),
            self.elapsed_secs
        ));
        report.push_str(&format!(
            "Average time per file: {:.4} seconds\n",
            self.per_file_secs()
        ));
        report.push_str(&format!("Directory CID: {}\n", self.root.cid));
        report.push_str(&format!(
            "Directory size: {} bytes\n",
            self.root.cumulative_size
        ));
        report
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Where the provisioned tree ends up
pub fn files_path(root: &str) -> String {
    join_mfs(root, "files")
}

/// Remove a previous baseline; an absent root is not an error
pub async fn cleanup_destination(api: &dyn MfsApi, root: &str) -> Result<()> {
    info!(root, "removing existing MFS directory if it exists");
    api.rm(root, true).await.ignore_not_found()
}

/// Link a provisioned tree under `<root>/files`
pub async fn link_into_namespace(api: &dyn MfsApi, root: &str, cid: &Cid) -> Result<()> {
    let dest = files_path(root);
    info!(source = %cid.ipfs_path(), dest = %dest, "copying to MFS");
    let start = Instant::now();
    api.mkdir(root, true).await?;
    api.cp(cid, &dest, CpOptions::default()).await?;
    info!(secs = start.elapsed().as_secs_f64(), "copied to MFS");
    Ok(())
}

/// Provision the baseline with the configured technique
pub async fn run_setup(api: &dyn MfsApi, config: &SetupConfig) -> Result<SetupReport> {
    info!(technique = config.technique.label(), "setting up MFS test directory");
    cleanup_destination(api, &config.mfs_root).await?;

    let start = Instant::now();
    let provisioned = match config.technique {
        SetupTechnique::Disk => disk::provision(api, config).await?,
        SetupTechnique::External => external::provision(config).await?,
        SetupTechnique::Memory => memory::provision(api, config).await?,
    };
    link_into_namespace(api, &config.mfs_root, &provisioned.root_cid).await?;
    let elapsed_secs = start.elapsed().as_secs_f64();

    let root = api.stat(&config.mfs_root).await?;
    Ok(SetupReport {
        technique: config.technique,
        total_files: config.total_files,
        elapsed_secs,
        root,
        details: provisioned.details,
    })
}
