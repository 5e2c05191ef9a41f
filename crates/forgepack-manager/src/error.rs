//! Error types for the manager crate.

use std::path::PathBuf;

use forgepack_pack2::DecodeError;
use thiserror::Error;

/// Errors that can occur when managing a set of archives.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading an archive file or writing an export failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An archive failed to parse.
    #[error("{}: {source}", .path.display())]
    Pack {
        path: PathBuf,
        #[source]
        source: forgepack_pack2::Error,
    },

    /// No loaded archive holds an asset with this name.
    #[error("asset not found: {0}")]
    NotFound(String),

    /// No loaded archive holds an asset with this hash.
    #[error("asset not found: {0:#018x}")]
    HashNotFound(u64),

    /// An archive could not be made resident within the memory budget.
    #[error("cannot load {} ({needed} bytes) after {attempts} attempts", .path.display())]
    ResourceExhausted {
        path: PathBuf,
        needed: u64,
        attempts: u32,
    },

    /// The archive on disk no longer matches the header read at construction.
    #[error("archive changed on disk: {}", .path.display())]
    ArchiveChanged { path: PathBuf },

    /// The archive failed to load at construction and holds no assets.
    #[error("archive unavailable: {}", .path.display())]
    ArchiveUnavailable { path: PathBuf },

    #[error("invalid archive id {0}")]
    InvalidArchiveId(usize),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Result type for manager operations.
pub type Result<T> = std::result::Result<T, Error>;
