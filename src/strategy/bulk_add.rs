//! Strategy A: bulk add + link
//!
//! Pipeline: stage -> one bulk add (unpinned) -> link handles to their
//! destinations -> flush + stat the destination root. The staging area is
//! removed on every exit path.

use super::{IngestOutcome, IngestionStrategy};
use crate::config::StagingLayout;
use crate::error::{HarnessError, NotFoundExt, Result};
use crate::rpc::{AddOptions, AddSource, Cid, CpOptions, MfsApi};
use crate::staging::{materialize, StagedFile, StagingArea};
use crate::workload::Workload;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct BulkAddStrategy {
    layout: StagingLayout,
    link_concurrency: usize,
}

impl BulkAddStrategy {
    /// `link_concurrency` of 1 links strictly one file after another
    pub fn new(layout: StagingLayout, link_concurrency: usize) -> Self {
        Self {
            layout,
            link_concurrency: link_concurrency.max(1),
        }
    }

    async fn run(
        &self,
        api: &dyn MfsApi,
        workload: &Workload,
        area: &StagingArea,
    ) -> Result<IngestOutcome> {
        info!(
            files = workload.len(),
            layout = ?self.layout,
            "creating files in staging area"
        );
        let staged = materialize(area, workload.paths(), workload.file_size(), self.layout).await?;

        let options = AddOptions {
            wrap_with_directory: self.layout == StagingLayout::Mirrored,
            pin: false,
        };
        let add_start = Instant::now();
        let added = api
            .add_all(AddSource::Directory(area.path().to_path_buf()), options, None)
            .await?;
        info!(
            entries = added.len(),
            secs = add_start.elapsed().as_secs_f64(),
            "added files"
        );
        let handles: HashMap<&str, &Cid> =
            added.iter().map(|e| (e.path.as_str(), &e.cid)).collect();

        let link_start = Instant::now();
        match self.layout {
            StagingLayout::Mirrored => link_mirrored(api, workload.root(), &handles).await?,
            StagingLayout::Flattened => {
                link_flattened(api, &staged, &handles, self.link_concurrency).await?
            }
        }
        info!(secs = link_start.elapsed().as_secs_f64(), "linked files");

        let flushed = api.flush(workload.root()).await?;
        let root = api.stat(workload.root()).await?;
        debug!(%flushed, size = root.cumulative_size, "destination flushed");
        Ok(IngestOutcome {
            files_written: staged.len(),
            root: Some(root),
        })
    }
}

/// Replace the whole destination with the wrapped staging root
async fn link_mirrored(api: &dyn MfsApi, root: &str, handles: &HashMap<&str, &Cid>) -> Result<()> {
    let root_cid = handles
        .get("")
        .copied()
        .ok_or_else(|| HarnessError::MissingEntry(String::new()))?;
    info!(source = %root_cid.ipfs_path(), dest = root, "copying directory to MFS");
    api.rm(root, true).await.ignore_not_found()?;
    api.cp(
        root_cid,
        root,
        CpOptions {
            parents: true,
            flush: true,
        },
    )
    .await
}

/// Link each staged file to its own destination, replacing what is there
async fn link_flattened(
    api: &dyn MfsApi,
    staged: &[StagedFile],
    handles: &HashMap<&str, &Cid>,
    concurrency: usize,
) -> Result<()> {
    let links = staged
        .iter()
        .map(|file| {
            handles
                .get(file.local_name.as_str())
                .map(|cid| ((*cid).clone(), file.destination.clone()))
                .ok_or_else(|| HarnessError::MissingEntry(file.local_name.clone()))
        })
        .collect::<Result<Vec<(Cid, String)>>>()?;

    stream::iter(links)
        .map(move |(cid, dest)| async move { link_one(api, &cid, &dest).await })
        .buffer_unordered(concurrency)
        .try_collect::<Vec<()>>()
        .await?;
    Ok(())
}

async fn link_one(api: &dyn MfsApi, cid: &Cid, dest: &str) -> Result<()> {
    if api.stat(dest).await.found()?.is_some() {
        api.rm(dest, true).await.ignore_not_found()?;
    }
    api.cp(
        cid,
        dest,
        CpOptions {
            parents: true,
            flush: false,
        },
    )
    .await
}

#[async_trait]
impl IngestionStrategy for BulkAddStrategy {
    fn name(&self) -> &str {
        "bulk add + link"
    }

    async fn ingest(&self, api: &dyn MfsApi, workload: &Workload) -> Result<IngestOutcome> {
        let area = StagingArea::create()?;
        let result = self.run(api, workload, &area).await;
        area.close();
        result
    }
}
