//! Wire-format HTTP response parsing.
//!
//! Stored values are complete serialized responses (status line, headers,
//! body) produced by the caller. This module only turns the decompressed
//! bytes back into a typed response, it never builds the representation
//! itself.

use crate::StorageError;

/// A response reconstructed from stored bytes, body fully buffered.
pub type CachedResponse = http::Response<Vec<u8>>;

const MAX_HEADERS: usize = 64;

pub fn parse_response(raw: &[u8]) -> Result<CachedResponse, StorageError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut headers);

    let header_len = match parsed
        .parse(raw)
        .map_err(|e| StorageError::MalformedResponse(e.to_string()))?
    {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => {
            return Err(StorageError::MalformedResponse(
                "truncated response head".to_string(),
            ))
        }
    };

    let status = parsed
        .code
        .ok_or_else(|| StorageError::MalformedResponse("missing status code".to_string()))?;

    let mut builder = http::Response::builder().status(status);
    for header in parsed.headers.iter() {
        builder = builder.header(header.name, header.value);
    }

    builder
        .body(raw[header_len..].to_vec())
        .map_err(|e| StorageError::MalformedResponse(e.to_string()))
}
