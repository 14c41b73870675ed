//! Disk-staged provisioning: write the tree locally, then one bulk add

use super::{Provisioned, TechniqueDetails};
use crate::config::SetupConfig;
use crate::error::{HarnessError, Result};
use crate::rpc::{AddOptions, AddSource, MfsApi, ProgressFn};
use crate::staging::StagingArea;
use crate::throughput::ThroughputTracker;
use crate::workload::{generate_file, generate_paths};
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

/// Bytes between two progress events during the bulk add
const PROGRESS_LOG_STEP: u64 = 1024 * 1024;

/// Whether adding `bytes` moved the running total past a step boundary
fn crosses_progress_step(processed: u64, bytes: u64) -> bool {
    processed / PROGRESS_LOG_STEP != processed.saturating_sub(bytes) / PROGRESS_LOG_STEP
}

/// Files and directories written by [`stage_baseline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct StagedBaseline {
    pub files: usize,
    pub directories: usize,
}

/// Write `total_files` random files below `area`
///
/// Directories are created up front, then files are written in batches of
/// `batch_size`. Writes inside a batch run concurrently and finish in no
/// particular order.
pub(super) async fn stage_baseline(
    area: &StagingArea,
    config: &SetupConfig,
) -> Result<StagedBaseline> {
    info!(files = config.total_files, "creating files on disk");
    let paths = generate_paths(&config.mfs_root, config.total_files, config.depth);

    let directories: BTreeSet<_> = paths
        .iter()
        .map(|spec| area.path().join(spec.dirs().join("/")))
        .collect();
    info!(directories = directories.len(), "creating directories");
    for dir in &directories {
        tokio::fs::create_dir_all(dir).await?;
    }

    for batch in paths.chunks(config.batch_size) {
        try_join_all(batch.iter().map(|spec| {
            let local = area.path().join(spec.relative_path());
            tokio::fs::write(local, generate_file(config.file_size))
        }))
        .await?;
    }

    Ok(StagedBaseline {
        files: paths.len(),
        directories: directories.len(),
    })
}

pub(super) async fn provision(api: &dyn MfsApi, config: &SetupConfig) -> Result<Provisioned> {
    let area = StagingArea::create()?;
    let result = run(api, config, &area).await;
    area.close();
    result
}

async fn run(api: &dyn MfsApi, config: &SetupConfig, area: &StagingArea) -> Result<Provisioned> {
    let creation_start = Instant::now();
    let staged = stage_baseline(area, config).await?;
    let file_creation_secs = creation_start.elapsed().as_secs_f64();
    info!(
        files = staged.files,
        secs = file_creation_secs,
        "created files on disk"
    );

    info!("adding files to the daemon");
    let add_start = Instant::now();
    let tracker = ThroughputTracker::started_at(add_start);
    let progress: ProgressFn<'_> = &|bytes| {
        let rate = tracker.record(bytes);
        let processed = tracker.processed_bytes();
        if crosses_progress_step(processed, bytes) {
            debug!(
                processed,
                rate_kib = rate / 1024.0,
                peak_kib = tracker.peak_rate() / 1024.0,
                "add progress"
            );
        }
    };
    let added = api
        .add_all(
            AddSource::Directory(area.path().to_path_buf()),
            AddOptions {
                wrap_with_directory: true,
                pin: false,
            },
            Some(progress),
        )
        .await?;
    let add_elapsed = add_start.elapsed();
    info!(secs = add_elapsed.as_secs_f64(), "added files");

    let root = added
        .into_iter()
        .find(|entry| entry.path.is_empty())
        .ok_or_else(|| HarnessError::MissingEntry(String::new()))?;

    Ok(Provisioned {
        root_cid: root.cid,
        details: TechniqueDetails::Disk {
            directories_created: staged.directories,
            file_creation_secs,
            add_secs: add_elapsed.as_secs_f64(),
            throughput: tracker.summary(add_elapsed),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::walk;
    use crate::workload::DepthRange;

    #[test]
    fn test_progress_step_crossing() {
        assert!(!crosses_progress_step(1024, 1024));
        assert!(crosses_progress_step(PROGRESS_LOG_STEP, 1024));
        assert!(!crosses_progress_step(PROGRESS_LOG_STEP + 2048, 1024));
        assert!(crosses_progress_step(3 * PROGRESS_LOG_STEP + 10, 2 * PROGRESS_LOG_STEP));
    }

    #[tokio::test]
    async fn test_stage_baseline_writes_every_file() {
        let area = StagingArea::create().unwrap();
        let config = SetupConfig {
            total_files: 25,
            depth: DepthRange::new(1, 2),
            file_size: 32,
            batch_size: 7,
            ..SetupConfig::default()
        };

        let staged = stage_baseline(&area, &config).await.unwrap();
        assert_eq!(staged.files, 25);
        assert_eq!(staged.directories, 25);

        let items = walk(area.path()).unwrap();
        let files: Vec<_> = items.iter().filter(|i| !i.is_dir).collect();
        assert_eq!(files.len(), 25);
        for file in files {
            assert_eq!(std::fs::metadata(&file.local).unwrap().len(), 32);
            let depth = file.relative.matches('/').count();
            assert!((1..=2).contains(&depth), "depth {} out of range", depth);
        }
    }

    #[tokio::test]
    async fn test_provision_returns_wrapped_root() {
        let mfs = crate::rpc::MemoryMfs::new();
        let config = SetupConfig {
            total_files: 5,
            ..SetupConfig::default()
        };
        let provisioned = provision(&mfs, &config).await.unwrap();
        assert!(mfs.has_block(&provisioned.root_cid));
        assert_eq!(mfs.counts().add_all, 1);
    }
}
