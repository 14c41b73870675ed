//! Integration tests for the benchmark driver

use async_trait::async_trait;
use mfsbench::bench::{prepare_destination, run_benchmark, ComparisonReport};
use mfsbench::config::BenchConfig;
use mfsbench::error::{HarnessError, Result};
use mfsbench::rpc::{MemoryMfs, MfsApi};
use mfsbench::strategy::{standard_strategies, IngestOutcome, IngestionStrategy};
use mfsbench::workload::{DepthRange, Workload};
use std::sync::atomic::{AtomicUsize, Ordering};

async fn run_default_scenario() -> (MemoryMfs, Workload, ComparisonReport) {
    let mfs = MemoryMfs::new();
    let config = BenchConfig {
        require_baseline: false,
        ..BenchConfig::default()
    };
    prepare_destination(&mfs, &config).await.unwrap();

    let workload = Workload::generate("/mfs-test", 50, DepthRange::new(1, 100), 1024);
    let strategies = standard_strategies(&config);
    let report = run_benchmark(&mfs, &strategies, 3, &workload)
        .await
        .unwrap();
    (mfs, workload, report)
}

#[tokio::test]
async fn test_fifty_paths_three_iterations() {
    let (mfs, workload, report) = run_default_scenario().await;

    assert_eq!(report.file_count, 50);
    assert_eq!(report.iterations, 3);
    assert_eq!(report.strategies.len(), 2);
    for timings in &report.strategies {
        assert_eq!(timings.durations_secs.len(), 3);
        assert!(timings.durations_secs.iter().all(|d| *d > 0.0));
        assert!(timings.mean_secs() > 0.0);
    }

    let comparison = report.comparison().unwrap();
    assert!(comparison.percent_faster >= 0.0 && comparison.percent_faster < 100.0);

    let files = mfsbench::rpc::count_files(&mfs, "/mfs-test").await.unwrap();
    assert_eq!(files, workload.len());
}

#[tokio::test]
async fn test_report_has_one_line_per_strategy() {
    let (_, _, report) = run_default_scenario().await;
    let text = report.to_report_string();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "=== Results ===");
    assert_eq!(
        lines
            .iter()
            .filter(|l| l.ends_with("seconds average"))
            .count(),
        2
    );
    assert!(lines[1].starts_with("bulk add + link: "));
    assert!(lines[2].starts_with("individual writes: "));
    assert!(lines[3].starts_with("Difference: "));
    let comparison = report.comparison().unwrap();
    assert_eq!(
        lines[4],
        format!(
            "{} is faster by {:.2}%",
            comparison.faster, comparison.percent_faster
        )
    );
}

/// Fails on the given call number, succeeds otherwise
struct FailingStrategy {
    calls: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl IngestionStrategy for FailingStrategy {
    fn name(&self) -> &str {
        "failing"
    }

    async fn ingest(&self, _api: &dyn MfsApi, workload: &Workload) -> Result<IngestOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(HarnessError::Rpc {
                command: "files/write".to_string(),
                message: "daemon went away".to_string(),
            });
        }
        Ok(IngestOutcome {
            files_written: workload.len(),
            root: None,
        })
    }
}

#[tokio::test]
async fn test_failed_iteration_aborts_run() {
    let mfs = MemoryMfs::new();
    let workload = Workload::generate("/mfs-test", 3, DepthRange::new(1, 2), 8);
    let strategies: Vec<Box<dyn IngestionStrategy>> = vec![Box::new(FailingStrategy {
        calls: AtomicUsize::new(0),
        fail_on: 2,
    })];

    let err = run_benchmark(&mfs, &strategies, 3, &workload)
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::Rpc { .. }));
}

#[tokio::test]
async fn test_benchmark_refuses_unprovisioned_root() {
    let mfs = MemoryMfs::new();
    let err = prepare_destination(&mfs, &BenchConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::MissingRoot(ref root) if root == "/mfs-test"));
}
