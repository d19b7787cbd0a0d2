//! Big-endian binary encoding shared by codebook and hash-bank files.
//!
//! # Format conventions
//!
//! - Integers are `i32`, floating point values `f64`, both big-endian.
//! - Every file starts with a header of `i32` size fields; the payload length
//!   is fully determined by the header.
//! - Readers load the whole file, validate the header and then require the
//!   exact payload size before decoding a single value.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::storage::CodecError;

/// Number of bytes per `i32` header field.
pub const BYTES_PER_I32: usize = 4;

/// Number of bytes per `f64` value.
pub const BYTES_PER_F64: usize = 8;

/// Accumulates a binary file in memory before writing it in one call.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Writes a non-negative size field as `i32`.
    pub fn put_size(&mut self, what: &'static str, value: usize) -> Result<(), CodecError> {
        let value = i32::try_from(value).map_err(|_| CodecError::Unencodable {
            what,
            reason: format!("{value} does not fit in a 32-bit header field"),
        })?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn put_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_f64_slice(&mut self, values: &[f64]) {
        for &value in values {
            self.put_f64(value);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Writes the buffer to `path`, creating parent directories as needed.
    pub fn write_to(self, path: &Path) -> Result<(), CodecError> {
        let io_err = |source| CodecError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        fs::write(path, &self.buf).map_err(io_err)?;
        debug!("wrote {} bytes to {}", self.buf.len(), path.display());
        Ok(())
    }
}

/// Sequential reader over a fully loaded binary file.
#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    source: PathBuf,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader; `source` is only used for error messages.
    pub fn new(bytes: &'a [u8], source: &Path) -> Self {
        Self {
            bytes,
            offset: 0,
            source: source.to_path_buf(),
        }
    }

    /// Reads a header size field, rejecting zero and negative values.
    pub fn read_size(&mut self, field: &'static str) -> Result<usize, CodecError> {
        let value = self.read_i32()?;
        if value <= 0 {
            return Err(CodecError::InvalidHeader {
                path: self.source.clone(),
                field,
                value: i64::from(value),
            });
        }
        Ok(value as usize)
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        let bytes = self.take(BYTES_PER_I32)?;
        let mut buf = [0u8; BYTES_PER_I32];
        buf.copy_from_slice(bytes);
        Ok(i32::from_be_bytes(buf))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        let bytes = self.take(BYTES_PER_F64)?;
        let mut buf = [0u8; BYTES_PER_F64];
        buf.copy_from_slice(bytes);
        Ok(f64::from_be_bytes(buf))
    }

    pub fn read_f64_vec(&mut self, count: usize) -> Result<Vec<f64>, CodecError> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_f64()?);
        }
        Ok(values)
    }

    /// Requires that exactly `count` f64 values remain in the file.
    ///
    /// Called right after the header so that neither truncated nor padded
    /// files are ever partially decoded.
    pub fn expect_exact_f64s(&self, count: usize) -> Result<(), CodecError> {
        let needed = count
            .checked_mul(BYTES_PER_F64)
            .and_then(|payload| payload.checked_add(self.offset))
            .ok_or_else(|| CodecError::InvalidHeader {
                path: self.source.clone(),
                field: "payload size",
                value: i64::MAX,
            })?;
        if needed != self.bytes.len() {
            return Err(CodecError::LengthMismatch {
                path: self.source.clone(),
                expected: needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self.offset + len;
        if end > self.bytes.len() {
            return Err(CodecError::Truncated {
                path: self.source.clone(),
                expected: end,
                actual: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }
}

/// Reads a whole file, mapping IO failures to [`CodecError::Io`].
pub fn read_file(path: &Path) -> Result<Vec<u8>, CodecError> {
    let bytes = fs::read(path).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}
