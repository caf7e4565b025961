//! cwbuild - cache-aware builder for smart-contract WASM artifacts
//!
//! Builds contract crates at any git revision, either inside a rootless
//! container or directly on the host, and skips anything whose artifact
//! is already on disk.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod manifest;
pub mod orchestration;
pub mod paths;
pub mod source;
pub mod ui;

pub use error::{CwbuildError, CwbuildResult};
