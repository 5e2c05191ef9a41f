//! Error types for the pack2 crate.

use thiserror::Error;

/// Errors that can occur when reading pack2 archives.
#[derive(Debug, Error)]
pub enum Error {
    /// The buffer does not start with the pack2 magic.
    #[error("invalid pack2 magic: expected \"PAK\\x01\", got {}", .actual.escape_ascii())]
    BadMagic { actual: [u8; 4] },

    /// A header field, the asset table or a payload lies outside the buffer.
    #[error("{what} out of range: {length} bytes at offset {offset} exceed buffer of {size} bytes")]
    OutOfRange {
        what: &'static str,
        offset: u64,
        length: u64,
        size: u64,
    },

    /// The buffer's header differs from the one the index was built from.
    #[error("archive header changed since the index was built")]
    HeaderMismatch,

    /// Asset name not present in the index.
    #[error("asset not found: {0}")]
    NotFound(String),

    /// Asset hash not present in the index.
    #[error("asset not found: {0:#018x}")]
    HashNotFound(u64),

    /// Decoding an asset payload failed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl Error {
    pub(crate) fn out_of_range(what: &'static str, offset: u64, length: u64, size: usize) -> Self {
        Error::OutOfRange {
            what,
            offset,
            length,
            size: size as u64,
        }
    }
}

/// Errors raised while turning a stored payload into asset bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The output buffer for the declared size could not be allocated.
    #[error("out of memory allocating {requested} bytes")]
    OutOfMemory { requested: usize },

    /// The stream inflates to more than the declared size.
    #[error("inflated data exceeds declared size of {expected} bytes")]
    BufferTooSmall { expected: usize },

    /// The payload is truncated or not a valid zlib stream.
    #[error("corrupt payload: {0}")]
    DataCorrupt(String),
}

/// Result type for pack2 operations.
pub type Result<T> = std::result::Result<T, Error>;
