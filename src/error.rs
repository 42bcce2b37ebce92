//! Error types for flatex operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while flattening a project or repairing a diff.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read root file: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("cyclic inclusion: {0}")]
    CyclicInclude(String),

    #[error("bibliography contains no entries for any cited key")]
    EmptyBibliography,

    #[error("no bibliography found: {0}")]
    MissingBibliography(String),

    #[error("{tool} failed: {detail}")]
    ExternalTool { tool: String, detail: String },
}

impl Error {
    /// Build a cyclic-inclusion error from the active include chain.
    ///
    /// The chain lists every file on the path from the root down to the
    /// re-entered file, in inclusion order.
    pub fn cycle(chain: &[PathBuf], repeated: &std::path::Path) -> Self {
        let mut parts: Vec<String> = chain.iter().map(|p| p.display().to_string()).collect();
        parts.push(repeated.display().to_string());
        Error::CyclicInclude(parts.join(" -> "))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
