//! mfsbench - benchmark harness for filling an IPFS Mutable File System
//!
//! Compares two ways of writing many small files into the daemon's MFS over
//! its RPC API: one bulk add followed by per-file links, and one write call
//! per file. A setup utility provisions the baseline directory the
//! benchmark runs against, using one of three provisioning techniques.

pub mod bench;
pub mod cli;
pub mod config;
pub mod error;
pub mod rpc;
pub mod setup;
pub mod staging;
pub mod strategy;
pub mod throughput;
pub mod workload;
