//! In-memory provisioning: no local disk I/O at all

use super::{Provisioned, TechniqueDetails};
use crate::config::SetupConfig;
use crate::error::{HarnessError, Result};
use crate::rpc::{AddEntry, AddOptions, AddSource, MfsApi};
use crate::workload::{generate_file, generate_paths};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Pre-generated files handed to a bulk add one pull at a time
///
/// Single pass: entries are moved out as they are pulled and the sequence
/// cannot be restarted. The pulled counter stays readable after the
/// sequence itself has been consumed by the add.
#[derive(Debug)]
pub struct GeneratedFiles {
    entries: std::vec::IntoIter<AddEntry>,
    total: usize,
    pulled: Arc<AtomicUsize>,
}

impl GeneratedFiles {
    /// Generate every path and its content up front
    pub fn generate(config: &SetupConfig) -> Self {
        info!(files = config.total_files, "pre-generating all files in memory");
        let entries = generate_paths(&config.mfs_root, config.total_files, config.depth)
            .into_iter()
            .map(|spec| AddEntry {
                path: spec.relative_path(),
                content: generate_file(config.file_size),
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<AddEntry>) -> Self {
        Self {
            total: entries.len(),
            entries: entries.into_iter(),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Shared view of how many entries have been pulled so far
    pub fn pulled_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulled)
    }
}

impl Iterator for GeneratedFiles {
    type Item = AddEntry;

    fn next(&mut self) -> Option<AddEntry> {
        let entry = self.entries.next()?;
        let pulled = self.pulled.fetch_add(1, Ordering::Relaxed) + 1;
        if pulled % 1000 == 0 {
            debug!(pulled, total = self.total, "bulk add progress");
        }
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

pub(super) async fn provision(api: &dyn MfsApi, config: &SetupConfig) -> Result<Provisioned> {
    let files = GeneratedFiles::generate(config);
    let generated = files.total();
    let pulled = files.pulled_counter();

    info!(files = generated, "files generated, now adding to the daemon");
    let added = api
        .add_all(
            AddSource::Entries(Box::new(files)),
            AddOptions {
                wrap_with_directory: true,
                pin: false,
            },
            None,
        )
        .await?;

    let root = added
        .into_iter()
        .find(|entry| entry.path.is_empty())
        .ok_or_else(|| HarnessError::MissingEntry(String::new()))?;

    Ok(Provisioned {
        root_cid: root.cid,
        details: TechniqueDetails::Memory {
            generated,
            pulled: pulled.load(Ordering::Relaxed),
        },
    })
}
