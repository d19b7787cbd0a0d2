use std::path::PathBuf;
use thiserror::Error;

use crate::vector::ItemId;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Item {0} is marked as deleted")]
    ItemDeleted(ItemId),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Metadata error: {message}\nSuggestion: {suggestion}")]
    Metadata { message: String, suggestion: String },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised while decoding persisted codebooks and hash banks.
///
/// Decoding never yields a partial result: a file is either read completely
/// with the exact byte count its header announces, or rejected.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "Truncated file '{path}': expected at least {expected} bytes, found {actual}\nSuggestion: The file was not written completely; regenerate it"
    )]
    Truncated {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Size mismatch in '{path}': header announces {expected} bytes, file has {actual}\nSuggestion: The file is corrupted or was written by an incompatible version"
    )]
    LengthMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid header field '{field}' in '{path}': {value}")]
    InvalidHeader {
        path: PathBuf,
        field: &'static str,
        value: i64,
    },

    #[error("Cannot encode {what}: {reason}")]
    Unencodable { what: &'static str, reason: String },
}
