//! Error types for the benchmark harness
//!
//! Every daemon call, staging step and subprocess run reports through
//! [`HarnessError`]. The only error the harness ever swallows is
//! [`HarnessError::NotFound`] on existence checks, see [`NotFoundExt`].

use thiserror::Error;

/// Errors raised while driving the daemon or preparing local staging data
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The daemon could not be reached or the HTTP exchange broke down
    #[error("daemon unreachable at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The daemon answered with an error message
    #[error("{command} failed: {message}")]
    Rpc { command: String, message: String },

    /// The addressed MFS path (or content handle) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A daemon response could not be decoded
    #[error("failed to decode {command} response: {message}")]
    Decode { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The external ingestion tool exited unsuccessfully
    #[error("{program} exited with {}", exit_label(.code))]
    Subprocess { program: String, code: Option<i32> },

    /// The external ingestion tool printed no content identifier
    #[error("failed to extract root CID from {program} output")]
    NoIdentifier { program: String },

    /// The bulk add did not report the expected entry
    #[error("bulk add returned no entry for {0:?}")]
    MissingEntry(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The benchmark destination has not been provisioned
    #[error("test directory {0} doesn't exist, run `mfsbench setup` first")]
    MissingRoot(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HarnessError::NotFound(_))
    }
}

/// Treat "not found" as success on existence checks and pre-cleanup removals
pub trait NotFoundExt<T> {
    /// `Ok(Some(v))` on success, `Ok(None)` on [`HarnessError::NotFound`]
    fn found(self) -> Result<Option<T>>;

    /// Drop the value and swallow [`HarnessError::NotFound`]
    fn ignore_not_found(self) -> Result<()>;
}

impl<T> NotFoundExt<T> for Result<T> {
    fn found(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn ignore_not_found(self) -> Result<()> {
        self.found().map(|_| ())
    }
}
