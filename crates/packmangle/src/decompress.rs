//! Payload decompression.

use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::{Error, Result};

/// Inflate a raw (header-less) DEFLATE stream.
pub fn inflate_raw(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut output = Vec::with_capacity(data.len().saturating_mul(2));

    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(e.to_string()))?;

    Ok(output)
}
