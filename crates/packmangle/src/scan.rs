//! Archive directory scanner.
//!
//! Finds the end of central directory record and walks the directory records
//! in front of it. The same walk serves well-formed and mangled archives; the
//! difference lies in how candidates are cross-validated and in the shift
//! applied to recorded offsets afterwards.
//!
//! Parsing is two-phase. The first phase fixes the anchors that can be
//! trusted in either form: where the end record sits, where the directory must
//! therefore start, and the single offset correction. The second phase walks
//! the records and applies that correction uniformly.

use packmangle_common::BinaryReader;
use tracing::debug;

use crate::entry::{DirectoryEntry, EndRecord};
use crate::format::{CentralDirectoryHeader, EocdRecord};
use crate::{Error, Result};

/// Backward search window: the largest comment the format allows plus the
/// fixed record.
const SEARCH_WINDOW: usize = 65536 + EocdRecord::SIZE;

/// How much of an archive's own bookkeeping to believe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Well-formed input: declared offsets are taken at face value.
    Strict,
    /// Mangled input: offsets are re-derived from the end record's position.
    #[default]
    Tolerant,
}

/// Locate the end of central directory record.
///
/// A record at exactly `len - 22` is accepted without further checks.
/// Otherwise the last 64 KiB (plus the fixed record) are searched backwards
/// and the first candidate that cross-validates wins:
///
/// - strict: the declared directory offset addresses a directory signature;
/// - tolerant: `candidate - declared size` addresses a directory signature;
/// - either mode: an empty directory is accepted when the declared comment
///   length ends exactly at the end of the buffer.
pub fn locate_end_record(data: &[u8], mode: ScanMode) -> Result<EndRecord> {
    let len = data.len();

    if len >= EocdRecord::SIZE && data[len - EocdRecord::SIZE..].starts_with(&EocdRecord::MAGIC) {
        debug!(offset = len - EocdRecord::SIZE, "end record found at fixed position");
        return read_end_record(data, len - EocdRecord::SIZE);
    }

    // The window's lower bound is exclusive unless it is clamped to the
    // start of the buffer.
    let search_start = if len > SEARCH_WINDOW { len - SEARCH_WINDOW + 1 } else { 0 };

    for relative in memchr::memmem::rfind_iter(&data[search_start..], &EocdRecord::MAGIC) {
        let candidate = search_start + relative;
        if cross_validates(data, candidate, mode) {
            debug!(offset = candidate, ?mode, "end record found by backward scan");
            return read_end_record(data, candidate);
        }
        debug!(offset = candidate, ?mode, "rejected end record candidate");
    }

    Err(Error::EocdNotFound)
}

fn read_end_record(data: &[u8], offset: usize) -> Result<EndRecord> {
    let mut reader = BinaryReader::new_at(data, offset + 4);
    let record: EocdRecord = reader.read_struct()?;

    let comment_start = reader.position();
    let comment_end = (comment_start + record.comment_length as usize).min(data.len());

    Ok(EndRecord::new(offset, &record, &data[comment_start..comment_end]))
}

fn cross_validates(data: &[u8], candidate: usize, mode: ScanMode) -> bool {
    let Ok(record) = BinaryReader::new_at(data, candidate + 4).read_struct::<EocdRecord>() else {
        return false;
    };

    if record.central_dir_size == 0 {
        return candidate + EocdRecord::SIZE + record.comment_length as usize == data.len();
    }

    let directory_start = match mode {
        ScanMode::Strict => Some(record.central_dir_offset as usize),
        ScanMode::Tolerant => candidate.checked_sub(record.central_dir_size as usize),
    };

    directory_start.is_some_and(|start| {
        BinaryReader::new_at(data, start).at_magic(&CentralDirectoryHeader::MAGIC)
    })
}

/// Walk the directory records between the derived directory start and the
/// end record.
///
/// The walk stops quietly at the first position that does not hold a complete
/// record, keeping everything parsed so far. A truncated directory therefore
/// looks exactly like a complete one.
pub fn parse_entries(data: &[u8], end: &EndRecord) -> Result<Vec<DirectoryEntry>> {
    let start = end.directory_start().ok_or(Error::DirectoryOutOfBounds {
        size: end.directory_size,
        end_offset: end.offset,
    })?;

    let mut reader = BinaryReader::new_at(data, start);
    let mut entries = Vec::new();

    while reader.position() < end.offset {
        match read_record(&mut reader) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                debug!(
                    position = reader.position(),
                    unread = end.offset.saturating_sub(reader.position()),
                    parsed = entries.len(),
                    "directory walk stopped: {e}"
                );
                break;
            }
        }
    }

    Ok(entries)
}

fn read_record(reader: &mut BinaryReader<'_>) -> Result<DirectoryEntry> {
    let record_offset = reader.position();
    let mut lookahead = reader.clone();

    lookahead.expect_magic(&CentralDirectoryHeader::MAGIC)?;
    let header: CentralDirectoryHeader = lookahead.read_struct()?;
    let name = lookahead.read_bytes(header.file_name_length as usize)?;
    lookahead.advance(header.trailing_data_size());

    *reader = lookahead;
    Ok(DirectoryEntry::new(&header, name, record_offset))
}

/// A fully scanned archive directory.
///
/// Holds owned metadata only; the buffer it was read from is passed again to
/// every operation that needs payload bytes.
#[derive(Debug, Clone)]
pub struct Directory {
    mode: ScanMode,
    end: EndRecord,
    shift: i64,
    entries: Vec<DirectoryEntry>,
}

impl Directory {
    /// Scan `data` in the given mode.
    pub fn scan(data: &[u8], mode: ScanMode) -> Result<Self> {
        let end = locate_end_record(data, mode)?;
        let shift = end.shift(mode).ok_or(Error::DirectoryOutOfBounds {
            size: end.directory_size,
            end_offset: end.offset,
        })?;
        let entries = parse_entries(data, &end)?;

        debug!(entries = entries.len(), shift, ?mode, "directory scanned");

        Ok(Self {
            mode,
            end,
            shift,
            entries,
        })
    }

    #[inline]
    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// The end record the scan anchored on.
    #[inline]
    pub fn end_record(&self) -> &EndRecord {
        &self.end
    }

    /// Correction subtracted from recorded local header offsets.
    #[inline]
    pub fn shift(&self) -> i64 {
        self.shift
    }

    /// Entries in directory order.
    #[inline]
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Absolute offset of an entry's local header after applying the shift.
    pub fn header_offset(&self, entry: &DirectoryEntry) -> Result<usize> {
        let recorded = entry.local_header_offset();
        i64::from(recorded)
            .checked_sub(self.shift)
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or(Error::BadOffset {
                recorded,
                shift: self.shift,
            })
    }
}
