//! LZ4 frame transform applied to stored response bodies.
//!
//! Bodies are compressed on write and decompressed on read. Mapping
//! documents are stored uncompressed.

use std::io::{Read, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};

use crate::StorageError;

pub fn compress(value: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut encoder = FrameEncoder::new(Vec::new());
    encoder
        .write_all(value)
        .map_err(|e| StorageError::Compression(e.to_string()))?;

    encoder
        .finish()
        .map_err(|e| StorageError::Compression(e.to_string()))
}

pub fn decompress(raw: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut value = Vec::new();
    FrameDecoder::new(raw)
        .read_to_end(&mut value)
        .map_err(|e| StorageError::Compression(e.to_string()))?;

    Ok(value)
}
