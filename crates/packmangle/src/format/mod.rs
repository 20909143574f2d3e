//! ZIP-family record layouts.
//!
//! Fixed-size headers are `#[repr(C, packed)]` so they can be read straight
//! out of an archive buffer and written back with `as_bytes()`. Signatures are
//! handled separately from the structs.

pub mod central_dir;
mod eocd;
mod local;

pub use central_dir::CentralDirectoryHeader;
pub use eocd::EocdRecord;
pub use local::{payload_range, LocalFileHeader};

/// Compression methods the extractor can materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CompressionMethod {
    /// No compression (stored).
    Store = 0,
    /// Raw DEFLATE compression.
    Deflate = 8,
}

impl TryFrom<u16> for CompressionMethod {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Store),
            8 => Ok(Self::Deflate),
            other => Err(other),
        }
    }
}
