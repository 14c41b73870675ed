//! Ingestion strategies under comparison
//!
//! - [`BulkAddStrategy`]: stage locally, one bulk add, then link handles
//!   into the namespace (one RPC for the add, O(N) link calls)
//! - [`DirectWriteStrategy`]: one `files/write` per file (O(N) RPCs, no
//!   staging)
//!
//! Both write the same [`Workload`] destinations and both tolerate a
//! destination that was populated by an earlier run.

mod bulk_add;
mod direct_write;

pub use bulk_add::BulkAddStrategy;
pub use direct_write::DirectWriteStrategy;

use crate::config::BenchConfig;
use crate::error::Result;
use crate::rpc::{FileStat, MfsApi};
use crate::workload::Workload;
use async_trait::async_trait;

/// What one strategy run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub files_written: usize,
    /// Final stat of the destination root, when the strategy flushes it
    pub root: Option<FileStat>,
}

/// A way of getting a workload's files into the MFS
#[async_trait]
pub trait IngestionStrategy: Send + Sync {
    /// Label used in logs and reports
    fn name(&self) -> &str;

    /// Write every workload file (fresh contents) to its destination
    async fn ingest(&self, api: &dyn MfsApi, workload: &Workload) -> Result<IngestOutcome>;
}

/// Strategy A followed by strategy B, configured from `config`
pub fn standard_strategies(config: &BenchConfig) -> Vec<Box<dyn IngestionStrategy>> {
    vec![
        Box::new(BulkAddStrategy::new(config.layout, config.link_concurrency)),
        Box::new(DirectWriteStrategy::new(config.parent_policy)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_strategies_order() {
        let strategies = standard_strategies(&BenchConfig::default());
        let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["bulk add + link", "individual writes"]);
    }
}
