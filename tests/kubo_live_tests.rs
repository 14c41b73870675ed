//! Tests against a running daemon
//!
//! Requires a daemon with its RPC API on localhost:15001. Run with:
//! `cargo test --test kubo_live_tests -- --ignored`

use mfsbench::config::{BenchConfig, SetupConfig, SetupTechnique};
use mfsbench::rpc::{count_files, KuboClient, MfsApi, WriteOptions};
use mfsbench::setup::run_setup;
use mfsbench::strategy::standard_strategies;
use mfsbench::workload::{DepthRange, Workload};

const API_URL: &str = "http://localhost:15001/api/v0";

fn client() -> KuboClient {
    KuboClient::new(API_URL).unwrap()
}

#[tokio::test]
#[ignore]
async fn test_live_write_stat_rm() {
    let api = client();
    let root = "/mfsbench-live-basic";
    let _ = api.rm(root, true).await;

    api.write(
        &format!("{}/a/b/file.dat", root),
        vec![7; 100],
        WriteOptions {
            create: true,
            parents: true,
            truncate: true,
        },
    )
    .await
    .unwrap();
    let stat = api.stat(&format!("{}/a/b/file.dat", root)).await.unwrap();
    assert_eq!(stat.size, 100);
    assert_eq!(count_files(&api, root).await.unwrap(), 1);

    api.rm(root, true).await.unwrap();
    assert!(api.stat(root).await.unwrap_err().is_not_found());
}

#[tokio::test]
#[ignore]
async fn test_live_strategies_leave_exact_file_count() {
    let api = client();
    let config = BenchConfig {
        mfs_root: "/mfsbench-live-strategies".to_string(),
        ..BenchConfig::default()
    };
    let _ = api.rm(&config.mfs_root, true).await;
    api.mkdir(&config.mfs_root, true).await.unwrap();

    let workload = Workload::generate(&config.mfs_root, 20, DepthRange::new(1, 10), 1024);
    for strategy in standard_strategies(&config) {
        strategy.ingest(&api, &workload).await.unwrap();
        strategy.ingest(&api, &workload).await.unwrap();
        assert_eq!(count_files(&api, &config.mfs_root).await.unwrap(), 20);
    }

    api.rm(&config.mfs_root, true).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_live_memory_setup() {
    let api = client();
    let config = SetupConfig {
        mfs_root: "/mfsbench-live-setup".to_string(),
        technique: SetupTechnique::Memory,
        total_files: 200,
        ..SetupConfig::default()
    };

    let report = run_setup(&api, &config).await.unwrap();
    assert_eq!(
        count_files(&api, "/mfsbench-live-setup/files").await.unwrap(),
        200
    );
    assert_eq!(report.root.cid, api.stat(&config.mfs_root).await.unwrap().cid);

    api.rm(&config.mfs_root, true).await.unwrap();
}
