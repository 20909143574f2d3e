//! Local File Header structures.

use std::ops::Range;

use packmangle_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// Local File Header (without signature).
///
/// This structure precedes the actual file data in the archive. Mangled
/// archives carry an all-zero copy of it in front of every payload.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct LocalFileHeader {
    /// Version needed to extract
    pub version_needed: u16,
    /// General purpose bit flag
    pub flags: u16,
    /// Compression method
    pub compression_method: u16,
    /// File last modification time and date (DOS format)
    pub last_modified: u32,
    /// CRC-32 of uncompressed data
    pub crc32: u32,
    /// Compressed size
    pub compressed_size: u32,
    /// Uncompressed size
    pub uncompressed_size: u32,
    /// File name length
    pub file_name_length: u16,
    /// Extra field length
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    /// Local File Header signature bytes.
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

    /// Offset of the name/extra length pair, measured from the signature.
    pub const LENGTHS_OFFSET: usize = 26;

    /// Signature plus fixed fields.
    pub const FIXED_SIZE: usize = 4 + std::mem::size_of::<Self>();

    /// Header with every field zeroed, as written in front of mangled payloads.
    pub const fn placeholder() -> Self {
        Self {
            version_needed: 0,
            flags: 0,
            compression_method: 0,
            last_modified: 0,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name_length: 0,
            extra_field_length: 0,
        }
    }
}

/// Locate the `compressed_size` payload bytes behind the local header at
/// `header_offset`.
///
/// Only the name and extra lengths of the local header are consulted; the
/// signature and every other field are ignored.
pub fn payload_range(data: &[u8], header_offset: usize, compressed_size: u32) -> Result<Range<usize>> {
    let lengths_at = header_offset.saturating_add(LocalFileHeader::LENGTHS_OFFSET);
    let mut reader = BinaryReader::new_at(data, lengths_at);
    let name_length = reader.read_u16()? as usize;
    let extra_length = reader.read_u16()? as usize;

    let start = reader.position() + name_length + extra_length;
    let end = start + compressed_size as usize;
    if end > data.len() {
        return Err(Error::PayloadOutOfBounds {
            offset: start,
            len: compressed_size,
        });
    }

    Ok(start..end)
}
