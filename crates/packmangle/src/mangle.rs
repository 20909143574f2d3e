//! Archive mangler.
//!
//! Re-emits a well-formed archive so that only a directory-driven reader can
//! recover it:
//!
//! - a decoy local header signature at offset 0, never followed by a header;
//! - payloads in a random physical order, each behind an all-zero local header
//!   that no longer carries the name;
//! - directory records in a second, independent random order, with CRC
//!   zeroed, uncompressed size 0x7FFFFFFF and disk number 65534;
//! - an end record on disk 65535 declaring zero records.
//!
//! Every offset written is relative to the byte after the decoy.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use zerocopy::IntoBytes;

use crate::entry::DirectoryEntry;
use crate::format::{payload_range, CentralDirectoryHeader, EocdRecord, LocalFileHeader};
use crate::scan::{Directory, ScanMode};
use crate::{Error, Result};

/// Leading bytes of every mangled archive.
pub const DECOY: [u8; 4] = LocalFileHeader::MAGIC;

/// Uncompressed size written into every directory record.
pub const FAKE_UNCOMPRESSED_SIZE: u32 = i32::MAX as u32;

/// Disk-number-start written into every directory record.
pub const FAKE_ENTRY_DISK: u16 = 65534;

/// Disk number written into the end record.
pub const FAKE_END_DISK: u16 = 65535;

const VERSION_MADE_BY: u16 = 0xDECD;
const VERSION_NEEDED: u16 = 20;

/// Mangle a well-formed archive using the thread-local RNG.
pub fn mangle(data: &[u8], comment: Option<&[u8]>) -> Result<Vec<u8>> {
    mangle_with_rng(data, comment, &mut rand::thread_rng())
}

/// Mangle a well-formed archive, drawing both shuffles from `rng`.
pub fn mangle_with_rng<R: Rng + ?Sized>(
    data: &[u8],
    comment: Option<&[u8]>,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let comment = comment.unwrap_or_default();
    let comment_length =
        u16::try_from(comment.len()).map_err(|_| Error::CommentTooLong(comment.len()))?;

    let directory = Directory::scan(data, ScanMode::Strict)?;
    let entries = directory.entries();

    let placement = shuffled(entries.len(), rng);
    let mut out = Vec::with_capacity(data.len() + DECOY.len());
    out.extend_from_slice(&DECOY);

    let mut new_offsets = vec![0u32; entries.len()];
    for &index in &placement {
        let entry = &entries[index];
        let payload = payload_range(data, directory.header_offset(entry)?, entry.compressed_size())?;

        new_offsets[index] = relative_offset(&out)?;
        out.extend_from_slice(&LocalFileHeader::MAGIC);
        out.extend_from_slice(LocalFileHeader::placeholder().as_bytes());
        out.extend_from_slice(&data[payload]);
    }

    let directory_offset = relative_offset(&out)?;
    let order = shuffled(entries.len(), rng);
    for &index in &order {
        write_directory_record(&mut out, &entries[index], new_offsets[index])?;
    }
    let directory_size = relative_offset(&out)? - directory_offset;

    let end = EocdRecord {
        disk_number: FAKE_END_DISK,
        central_dir_disk: 0,
        central_dir_count_disk: 0,
        central_dir_count_total: 0,
        central_dir_size: directory_size,
        central_dir_offset: directory_offset,
        comment_length,
    };
    out.extend_from_slice(&EocdRecord::MAGIC);
    out.extend_from_slice(end.as_bytes());
    out.extend_from_slice(comment);

    debug!(
        entries = entries.len(),
        input = data.len(),
        output = out.len(),
        "archive mangled"
    );

    Ok(out)
}

/// A uniformly shuffled list of `0..len`.
fn shuffled<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices
}

/// Bytes written after the decoy, as a 32-bit offset.
fn relative_offset(out: &[u8]) -> Result<u32> {
    u32::try_from(out.len() - DECOY.len()).map_err(|_| Error::ArchiveTooLarge(out.len()))
}

fn write_directory_record(out: &mut Vec<u8>, entry: &DirectoryEntry, offset: u32) -> Result<()> {
    let name = entry.name();
    // Names come from a parsed 16-bit length field, so this cannot fail for
    // scanned entries.
    let file_name_length =
        u16::try_from(name.len()).map_err(|_| Error::ArchiveTooLarge(name.len()))?;

    let header = CentralDirectoryHeader {
        version_made_by: VERSION_MADE_BY,
        version_needed: VERSION_NEEDED,
        flags: 0,
        compression_method: entry.method(),
        last_modified: 0,
        crc32: 0,
        compressed_size: entry.compressed_size(),
        uncompressed_size: FAKE_UNCOMPRESSED_SIZE,
        file_name_length,
        extra_field_length: 0,
        file_comment_length: 0,
        disk_number_start: FAKE_ENTRY_DISK,
        internal_attrs: 0,
        external_attrs: 0,
        local_header_offset: offset,
    };

    out.extend_from_slice(&CentralDirectoryHeader::MAGIC);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(name);
    Ok(())
}
