//! Service-layer error types.
//!
//! Both errors are transport-agnostic. The HTTP crate maps them to status
//! codes; the binary treats `LoadError` as fatal at startup.

use std::net::IpAddr;
use std::path::PathBuf;

/// Building the location database failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The database file could not be opened.
    #[error("failed to open database file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV stream could not be read.
    #[error("failed to read database entries: {0}")]
    Csv(#[from] csv::Error),

    /// Every row was skipped; nothing can be resolved.
    #[error("no valid entries found in database")]
    Empty,

    /// The configured database type has no backend.
    #[error("unsupported database type: {0}")]
    UnsupportedType(String),
}

/// The queried address matches neither an exact entry nor any network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("IP address {address} not found in database")]
pub struct NotFoundError {
    pub address: IpAddr,
}
