//! Benchmark driver: time each strategy over a fixed workload and compare
//!
//! Every strategy runs `iterations` times against the same pre-generated
//! [`Workload`]. Durations come from a monotonic clock. Nothing is reset
//! between iterations; each strategy is responsible for coping with the
//! destinations a previous run left behind.

use crate::config::BenchConfig;
use crate::error::{HarnessError, NotFoundExt, Result};
use crate::rpc::MfsApi;
use crate::strategy::IngestionStrategy;
use crate::workload::Workload;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Recorded durations of one strategy, in seconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyTimings {
    pub name: String,
    pub durations_secs: Vec<f64>,
}

impl StrategyTimings {
    pub fn mean_secs(&self) -> f64 {
        mean(&self.durations_secs)
    }
}

/// Fastest versus slowest strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub faster: String,
    pub slower: String,
    pub faster_mean_secs: f64,
    pub slower_mean_secs: f64,
    pub difference_secs: f64,
    pub percent_faster: f64,
}

/// Everything one benchmark run measured
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub file_count: usize,
    pub iterations: usize,
    pub strategies: Vec<StrategyTimings>,
}

/// Arithmetic mean; 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `|a - b| / max(a, b) * 100`, or 0 when both are zero
pub fn percent_faster(mean_a: f64, mean_b: f64) -> f64 {
    let slowest = mean_a.max(mean_b);
    if slowest <= 0.0 {
        return 0.0;
    }
    (mean_a - mean_b).abs() / slowest * 100.0
}

impl ComparisonReport {
    pub fn comparison(&self) -> Option<Comparison> {
        if self.strategies.len() < 2 {
            return None;
        }
        let mut faster = &self.strategies[0];
        let mut slower = &self.strategies[0];
        for timings in &self.strategies[1..] {
            // On a tie the later strategy is reported as faster
            if timings.mean_secs() <= faster.mean_secs() {
                faster = timings;
            }
            if timings.mean_secs() > slower.mean_secs() {
                slower = timings;
            }
        }
        if std::ptr::eq(faster, slower) {
            slower = &self.strategies[0];
        }
        let (fast_mean, slow_mean) = (faster.mean_secs(), slower.mean_secs());
        Some(Comparison {
            faster: faster.name.clone(),
            slower: slower.name.clone(),
            faster_mean_secs: fast_mean,
            slower_mean_secs: slow_mean,
            difference_secs: (fast_mean - slow_mean).abs(),
            percent_faster: percent_faster(fast_mean, slow_mean),
        })
    }

    /// Human-readable summary
    pub fn to_report_string(&self) -> String {
        let mut report = String::from("=== Results ===\n");
        for timings in &self.strategies {
            report.push_str(&format!(
                "{}: {:.2} seconds average\n",
                timings.name,
                timings.mean_secs()
            ));
        }
        if let Some(comparison) = self.comparison() {
            report.push_str(&format!(
                "Difference: {:.2} seconds\n",
                comparison.difference_secs
            ));
            report.push_str(&format!(
                "{} is faster by {:.2}%\n",
                comparison.faster, comparison.percent_faster
            ));
        }
        report
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct JsonStrategy<'a> {
            name: &'a str,
            durations_secs: &'a [f64],
            mean_secs: f64,
        }

        #[derive(Serialize)]
        struct JsonReport<'a> {
            file_count: usize,
            iterations: usize,
            strategies: Vec<JsonStrategy<'a>>,
            comparison: Option<Comparison>,
        }

        let report = JsonReport {
            file_count: self.file_count,
            iterations: self.iterations,
            strategies: self
                .strategies
                .iter()
                .map(|t| JsonStrategy {
                    name: &t.name,
                    durations_secs: &t.durations_secs,
                    mean_secs: t.mean_secs(),
                })
                .collect(),
            comparison: self.comparison(),
        };
        serde_json::to_string_pretty(&report)
    }
}

/// Make sure the destination root is there before timing anything
///
/// With `require_baseline` a missing root is an error (setup has not run);
/// otherwise the root is created.
pub async fn prepare_destination(api: &dyn MfsApi, config: &BenchConfig) -> Result<()> {
    info!(root = %config.mfs_root, "checking if the test directory exists");
    if api.stat(&config.mfs_root).await.found()?.is_some() {
        info!(root = %config.mfs_root, "test directory exists, ready to run tests");
        return Ok(());
    }
    if config.require_baseline {
        return Err(HarnessError::MissingRoot(config.mfs_root.clone()));
    }
    info!(root = %config.mfs_root, "creating empty test directory");
    api.mkdir(&config.mfs_root, true).await
}

/// Run every strategy `iterations` times over `workload`
///
/// The first failing iteration aborts the whole run.
pub async fn run_benchmark(
    api: &dyn MfsApi,
    strategies: &[Box<dyn IngestionStrategy>],
    iterations: usize,
    workload: &Workload,
) -> Result<ComparisonReport> {
    let mut results = Vec::with_capacity(strategies.len());
    for (index, strategy) in strategies.iter().enumerate() {
        info!("=== Testing method {}: {} ===", index + 1, strategy.name());
        let mut durations_secs = Vec::with_capacity(iterations);
        for iteration in 0..iterations {
            info!("Iteration {}/{}", iteration + 1, iterations);
            let start = Instant::now();
            let outcome = strategy.ingest(api, workload).await?;
            let secs = start.elapsed().as_secs_f64();
            info!("Completed in {:.2} seconds", secs);
            match &outcome.root {
                Some(root) => info!(
                    files = outcome.files_written,
                    cid = %root.cid,
                    size = root.cumulative_size,
                    "destination root after iteration"
                ),
                None => debug!(files = outcome.files_written, "no destination stat"),
            }
            durations_secs.push(secs);
        }
        results.push(StrategyTimings {
            name: strategy.name().to_string(),
            durations_secs,
        });
    }
    Ok(ComparisonReport {
        file_count: workload.len(),
        iterations,
        strategies: results,
    })
}
