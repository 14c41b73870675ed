//! External-process provisioning: stage on disk, add with the daemon's CLI
//!
//! The CLI runs with `--quiet`, so stdout is one content identifier per
//! added node and the wrapping directory comes last. Lines are recognised by
//! shape only; anything else on stdout is ignored and stderr is logged.

use super::disk::stage_baseline;
use super::{Provisioned, TechniqueDetails};
use crate::config::SetupConfig;
use crate::error::{HarnessError, Result};
use crate::rpc::Cid;
use crate::staging::StagingArea;
use regex::Regex;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Shape of a content identifier line printed by the CLI
pub const IDENTIFIER_PATTERN: &str = r"^[a-zA-Z0-9]{46,59}$";

/// Tracks identifier lines seen on the CLI's stdout
#[derive(Debug, Clone)]
pub struct IdentifierScanner {
    pattern: Regex,
    matched: usize,
    last: Option<String>,
}

impl IdentifierScanner {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(IDENTIFIER_PATTERN)
            .map_err(|e| HarnessError::InvalidConfig(format!("identifier pattern: {}", e)))?;
        Ok(Self {
            pattern,
            matched: 0,
            last: None,
        })
    }

    /// Feed one stdout line; returns true if it was an identifier
    pub fn observe(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() || !self.pattern.is_match(line) {
            return false;
        }
        self.matched += 1;
        self.last = Some(line.to_string());
        true
    }

    pub fn matched(&self) -> usize {
        self.matched
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

/// Fixed argument list for a recursive, wrapped, unpinned quiet add
pub fn cli_args(api: &str, dir: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        format!("--api={}", api),
        "add".to_string(),
        "-r".to_string(),
        "-w".to_string(),
        "--progress=false".to_string(),
        "--quiet".to_string(),
        "--pin=false".to_string(),
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(dir.as_os_str().to_os_string());
    args
}

/// Result of one CLI run
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CliAdd {
    pub root_cid: Cid,
    pub identifier_lines: usize,
}

/// Run the CLI against `dir` and return the last identifier it printed
pub(super) async fn add_with_cli(program: &Path, api: &str, dir: &Path) -> Result<CliAdd> {
    let label = program.display().to_string();
    let mut child = Command::new(program)
        .args(cli_args(api, dir))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stderr not captured"))?;

    let stderr_label = label.clone();
    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if !line.is_empty() {
                warn!(program = %stderr_label, "{}", line);
            }
        }
    });

    let mut scanner = IdentifierScanner::new()?;
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        if scanner.observe(&line) && (scanner.matched() == 1 || scanner.matched() % 100 == 0) {
            debug!(files = scanner.matched(), "CLI progress");
        }
    }

    let status = child.wait().await?;
    if let Err(e) = stderr_task.await {
        warn!(error = %e, "stderr reader failed");
    }
    if !status.success() {
        return Err(HarnessError::Subprocess {
            program: label,
            code: status.code(),
        });
    }

    let root_cid = scanner
        .last()
        .map(Cid::new)
        .ok_or(HarnessError::NoIdentifier { program: label })?;
    Ok(CliAdd {
        root_cid,
        identifier_lines: scanner.matched(),
    })
}

pub(super) async fn provision(config: &SetupConfig) -> Result<Provisioned> {
    let area = StagingArea::create()?;
    let result = run(config, &area).await;
    area.close();
    result
}

async fn run(config: &SetupConfig, area: &StagingArea) -> Result<Provisioned> {
    let creation_start = Instant::now();
    stage_baseline(area, config).await?;
    let file_creation_secs = creation_start.elapsed().as_secs_f64();

    info!(program = %config.cli_program.display(), "adding files using command line tool");
    let add_start = Instant::now();
    let added = add_with_cli(&config.cli_program, &config.cli_api, area.path()).await?;
    let add_secs = add_start.elapsed().as_secs_f64();
    info!(secs = add_secs, root = %added.root_cid, "added files via CLI");

    Ok(Provisioned {
        root_cid: added.root_cid,
        details: TechniqueDetails::External {
            file_creation_secs,
            add_secs,
            identifier_lines: added.identifier_lines,
        },
    })
}
