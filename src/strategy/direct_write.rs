//! Strategy B: one `files/write` per file

use super::{IngestOutcome, IngestionStrategy};
use crate::config::ParentPolicy;
use crate::error::{NotFoundExt, Result};
use crate::rpc::{MfsApi, WriteOptions};
use crate::workload::{generate_file, Workload};
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct DirectWriteStrategy {
    parent_policy: ParentPolicy,
}

impl DirectWriteStrategy {
    pub fn new(parent_policy: ParentPolicy) -> Self {
        Self { parent_policy }
    }
}

#[async_trait]
impl IngestionStrategy for DirectWriteStrategy {
    fn name(&self) -> &str {
        "individual writes"
    }

    async fn ingest(&self, api: &dyn MfsApi, workload: &Workload) -> Result<IngestOutcome> {
        info!(files = workload.len(), policy = ?self.parent_policy, "writing files individually");
        for spec in workload.paths() {
            let content = generate_file(workload.file_size());
            let options = match self.parent_policy {
                ParentPolicy::Delegate => WriteOptions {
                    create: true,
                    parents: true,
                    truncate: true,
                },
                ParentPolicy::ExplicitMkdir => {
                    let parent = spec.parent_path();
                    if api.stat(&parent).await.found()?.is_none() {
                        api.mkdir(&parent, true).await?;
                    }
                    WriteOptions {
                        create: true,
                        parents: false,
                        truncate: true,
                    }
                }
            };
            api.write(&spec.mfs_path(), content, options).await?;
        }
        Ok(IngestOutcome {
            files_written: workload.len(),
            root: None,
        })
    }
}
