//! Error kinds the CLI branches on to pick an exit code.
//!
//! Most fallible operations in this crate return `anyhow::Result` with
//! `.context(...)` attached at each boundary. `AnalyzeError` exists only for
//! the handful of conditions that map to distinct process exit codes;
//! everything else stays a plain `anyhow::Error` and falls through to the
//! default exit code.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("trace file not found: {0}")]
    TraceFileMissing(PathBuf),

    #[error("types file not found: {0}")]
    TypesFileMissing(PathBuf),

    #[error("invalid arguments: {0}")]
    ArgumentMisuse(String),
}
