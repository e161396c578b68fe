//! Program loader
//!
//! Reads a `.sq` program: base-10 signed integers separated by any whitespace.
//! The number of integers is the size of memory.

use crate::error::{Result, SublanqError};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Parse program text into a memory image
///
/// The buffer is sized from a first pass over the tokens and filled in source
/// order on the second, so it is never reallocated.
pub fn load_str(source: &str) -> Result<Vec<i64>> {
    let size = source.split_whitespace().count();
    let mut memory = Vec::with_capacity(size);

    for (position, token) in source.split_whitespace().enumerate() {
        let value = token.parse::<i64>().map_err(|_| SublanqError::Format {
            token: token.to_string(),
            position,
        })?;
        memory.push(value);
    }

    Ok(memory)
}

/// Parse raw program bytes
///
/// Bytes that are not UTF-8 stay inside their token, which then fails as a
/// `Format` error at its position.
pub fn load_bytes(bytes: &[u8]) -> Result<Vec<i64>> {
    load_str(&String::from_utf8_lossy(bytes))
}

/// Load a program from any reader
pub fn load_reader<R: Read>(mut reader: R) -> Result<Vec<i64>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    load_bytes(&bytes)
}

/// Load a program from a file path
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<i64>> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).map_err(|e| SublanqError::Io(format!("{}: {}", path.display(), e)))?;
    let memory = load_bytes(&bytes)?;
    log::debug!("loaded {} cells from {}", memory.len(), path.display());
    Ok(memory)
}
