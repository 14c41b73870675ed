//! Integration tests for baseline provisioning
//!
//! The external technique is driven by a throwaway shell script standing in
//! for the daemon's command line tool.

use mfsbench::config::{SetupConfig, SetupTechnique};
use mfsbench::error::HarnessError;
use mfsbench::rpc::{count_files, AddEntry, AddOptions, AddSource, Cid, MemoryMfs, MfsApi};
use mfsbench::setup::{run_setup, TechniqueDetails};
use mfsbench::workload::DepthRange;

fn config(technique: SetupTechnique, total_files: usize) -> SetupConfig {
    SetupConfig {
        technique,
        total_files,
        depth: DepthRange::new(1, 2),
        file_size: 128,
        batch_size: 50,
        ..SetupConfig::default()
    }
}

#[tokio::test]
async fn test_disk_technique() {
    let mfs = MemoryMfs::new();
    let report = run_setup(&mfs, &config(SetupTechnique::Disk, 300))
        .await
        .unwrap();

    assert_eq!(count_files(&mfs, "/mfs-test/files").await.unwrap(), 300);
    assert_eq!(report.root.cumulative_size, 300 * 128);
    assert!(report.elapsed_secs > 0.0);
    match &report.details {
        TechniqueDetails::Disk {
            directories_created,
            throughput,
            ..
        } => {
            assert_eq!(*directories_created, 300);
            assert_eq!(throughput.processed_bytes, 300 * 128);
        }
        other => panic!("unexpected details: {:?}", other),
    }
    assert!(report
        .to_report_string()
        .contains("Setup complete! Disk-based approach finished in"));
}

#[tokio::test]
async fn test_memory_technique() {
    let mfs = MemoryMfs::new();
    let report = run_setup(&mfs, &config(SetupTechnique::Memory, 500))
        .await
        .unwrap();

    assert_eq!(count_files(&mfs, "/mfs-test/files").await.unwrap(), 500);
    assert_eq!(
        report.details,
        TechniqueDetails::Memory {
            generated: 500,
            pulled: 500
        }
    );
    assert_eq!(report.root, mfs.stat("/mfs-test").await.unwrap());
}

#[tokio::test]
async fn test_setup_output_depths() {
    let mfs = MemoryMfs::new();
    run_setup(&mfs, &config(SetupTechnique::Memory, 40))
        .await
        .unwrap();

    let mut pending = vec![("/mfs-test/files".to_string(), 0usize)];
    while let Some((dir, depth)) = pending.pop() {
        for entry in mfs.ls(&dir).await.unwrap() {
            let path = format!("{}/{}", dir, entry.name);
            if entry.name.starts_with("dir_") {
                pending.push((path, depth + 1));
            } else {
                assert!((1..=2).contains(&depth), "{} at depth {}", path, depth);
            }
        }
    }
}

#[cfg(unix)]
mod external {
    use super::*;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// Write an executable shell script and return its path
    fn fake_cli(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-ipfs");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn added_root(mfs: &MemoryMfs) -> Cid {
        let entries = vec![
            AddEntry {
                path: "dir_a/file_1.dat".to_string(),
                content: vec![1; 64],
            },
            AddEntry {
                path: "file_2.dat".to_string(),
                content: vec![2; 64],
            },
        ];
        let added = mfs
            .add_all(
                AddSource::Entries(Box::new(entries.into_iter())),
                AddOptions::default(),
                None,
            )
            .await
            .unwrap();
        added.last().unwrap().cid.clone()
    }

    #[tokio::test]
    #[serial]
    async fn test_external_links_last_identifier() {
        let mfs = MemoryMfs::new();
        let root = added_root(&mfs).await;
        let dir = tempfile::tempdir().unwrap();
        let script = fake_cli(
            &dir,
            &format!(
                "printf 'Qm%044d\\n' $(seq 1 4999)\necho 'adding files' >&2\necho {}",
                root
            ),
        );

        let report = run_setup(
            &mfs,
            &SetupConfig {
                cli_program: script,
                ..config(SetupTechnique::External, 10)
            },
        )
        .await
        .unwrap();

        assert_eq!(mfs.stat("/mfs-test/files").await.unwrap().cid, root);
        match report.details {
            TechniqueDetails::External {
                identifier_lines, ..
            } => assert_eq!(identifier_lines, 5000),
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_external_ignores_non_identifier_lines() {
        let mfs = MemoryMfs::new();
        let root = added_root(&mfs).await;
        let dir = tempfile::tempdir().unwrap();
        let script = fake_cli(
            &dir,
            &format!("echo {}\necho 'added 2 files'\necho ''", root),
        );

        run_setup(
            &mfs,
            &SetupConfig {
                cli_program: script,
                ..config(SetupTechnique::External, 2)
            },
        )
        .await
        .unwrap();
        assert_eq!(count_files(&mfs, "/mfs-test/files").await.unwrap(), 2);
    }

    #[tokio::test]
    #[serial]
    async fn test_external_nonzero_exit_is_fatal() {
        let mfs = MemoryMfs::new();
        let dir = tempfile::tempdir().unwrap();
        let script = fake_cli(&dir, &format!("echo Qm{}\nexit 3", "1".repeat(44)));

        let err = run_setup(
            &mfs,
            &SetupConfig {
                cli_program: script,
                ..config(SetupTechnique::External, 2)
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::Subprocess { code: Some(3), .. }));
        assert!(mfs.stat("/mfs-test").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    #[serial]
    async fn test_external_without_identifier_is_fatal() {
        let mfs = MemoryMfs::new();
        let dir = tempfile::tempdir().unwrap();
        let script = fake_cli(&dir, "echo 'Error: api not running' >&2");

        let err = run_setup(
            &mfs,
            &SetupConfig {
                cli_program: script,
                ..config(SetupTechnique::External, 2)
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::NoIdentifier { .. }));
        assert!(err.to_string().contains("failed to extract root CID"));
    }
}
