//! Parsed archive metadata: directory entries and the end record.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use crate::format::{CentralDirectoryHeader, CompressionMethod, EocdRecord};
use crate::scan::ScanMode;

/// The end of central directory record as found in a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRecord {
    /// Absolute offset of the record's signature.
    pub offset: usize,
    /// Number of this disk (65535 in mangled archives).
    pub disk_number: u16,
    /// Disk holding the directory.
    pub directory_disk: u16,
    /// Declared records on this disk (0 in mangled archives).
    pub entries_on_disk: u16,
    /// Declared records in total (0 in mangled archives).
    pub entries_total: u16,
    /// Declared directory size in bytes.
    pub directory_size: u32,
    /// Declared directory offset; relative to the decoy in mangled archives.
    pub directory_offset: u32,
    /// Trailing comment, clipped to the buffer.
    pub comment: Vec<u8>,
}

impl EndRecord {
    pub(crate) fn new(offset: usize, record: &EocdRecord, comment: &[u8]) -> Self {
        Self {
            offset,
            disk_number: record.disk_number,
            directory_disk: record.central_dir_disk,
            entries_on_disk: record.central_dir_count_disk,
            entries_total: record.central_dir_count_total,
            directory_size: record.central_dir_size,
            directory_offset: record.central_dir_offset,
            comment: comment.to_vec(),
        }
    }

    /// Directory start derived from the record's own position,
    /// `offset - directory_size`. The declared offset field is not used.
    #[inline]
    pub fn directory_start(&self) -> Option<usize> {
        self.offset.checked_sub(self.directory_size as usize)
    }

    /// Correction subtracted from every recorded local header offset.
    ///
    /// Strict mode trusts recorded offsets. Tolerant mode measures how far the
    /// declared directory offset sits from the derived directory start; a
    /// mangled archive yields -4 (the decoy prefix), a well-formed one 0.
    pub fn shift(&self, mode: ScanMode) -> Option<i64> {
        match mode {
            ScanMode::Strict => Some(0),
            ScanMode::Tolerant => self
                .directory_start()
                .map(|start| i64::from(self.directory_offset) - start as i64),
        }
    }
}

/// One central directory record.
///
/// Fields a mangled archive falsifies (uncompressed size, CRC, disk number)
/// are kept for inspection only; extraction never reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    name: Vec<u8>,
    compression_method: u16,
    compressed_size: u32,
    uncompressed_size: u32,
    crc32: u32,
    disk_number_start: u16,
    local_header_offset: u32,
    record_offset: usize,
}

impl DirectoryEntry {
    pub(crate) fn new(header: &CentralDirectoryHeader, name: &[u8], record_offset: usize) -> Self {
        Self {
            name: name.to_vec(),
            compression_method: header.compression_method,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            crc32: header.crc32,
            disk_number_start: header.disk_number_start,
            local_header_offset: header.local_header_offset,
            record_offset,
        }
    }

    /// Raw name bytes, exactly as stored.
    #[inline]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Name decoded as UTF-8, with invalid sequences replaced.
    #[inline]
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Raw compression method field.
    #[inline]
    pub fn method(&self) -> u16 {
        self.compression_method
    }

    /// Compression method, or the raw value when unsupported.
    #[inline]
    pub fn compression_method(&self) -> Result<CompressionMethod, u16> {
        CompressionMethod::try_from(self.compression_method)
    }

    #[inline]
    pub fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    /// Declared uncompressed size. Untrusted.
    #[inline]
    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    /// Declared CRC-32. Untrusted.
    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Declared starting disk. Untrusted.
    #[inline]
    pub fn disk_number_start(&self) -> u16 {
        self.disk_number_start
    }

    /// Local header offset as recorded, before any shift is applied.
    #[inline]
    pub fn local_header_offset(&self) -> u32 {
        self.local_header_offset
    }

    /// Absolute offset of this entry's directory record.
    #[inline]
    pub fn record_offset(&self) -> usize {
        self.record_offset
    }

    /// Check if this entry represents a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.name.ends_with(b"/") || self.name.ends_with(b"\\")
    }

    /// Relative output path for extraction.
    ///
    /// Backslashes are treated as separators and `.` components dropped.
    /// Returns `None` for names that are empty or would leave the destination
    /// (absolute paths, drive prefixes, `..`).
    pub fn output_path(&self) -> Option<PathBuf> {
        self.relative_path().filter(|path| !path.as_os_str().is_empty())
    }

    /// Normalized path below the destination. Empty when the name only
    /// refers to the destination itself, as `./` does.
    pub(crate) fn relative_path(&self) -> Option<PathBuf> {
        let normalized = self.name_lossy().replace('\\', "/");
        let mut path = PathBuf::new();

        for component in Path::new(&normalized).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &[u8]) -> DirectoryEntry {
        let header = CentralDirectoryHeader {
            version_made_by: 20,
            version_needed: 20,
            flags: 0,
            compression_method: 8,
            last_modified: 0,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name_length: name.len() as u16,
            extra_field_length: 0,
            file_comment_length: 0,
            disk_number_start: 0,
            internal_attrs: 0,
            external_attrs: 0,
            local_header_offset: 0,
        };
        DirectoryEntry::new(&header, name, 0)
    }

    #[test]
    fn test_output_path_normalization() {
        let path = entry(br"assets\minecraft\models\item.json").output_path();
        assert_eq!(path, Some(PathBuf::from("assets/minecraft/models/item.json")));

        let path = entry(b"./pack.mcmeta").output_path();
        assert_eq!(path, Some(PathBuf::from("pack.mcmeta")));
    }

    #[test]
    fn test_output_path_rejects_escape() {
        assert_eq!(entry(b"../evil.txt").output_path(), None);
        assert_eq!(entry(b"assets/../../evil.txt").output_path(), None);
        assert_eq!(entry(b"/etc/passwd").output_path(), None);
        assert_eq!(entry(b"").output_path(), None);
    }

    #[test]
    fn test_current_dir_entry() {
        let current = entry(b"./");
        assert!(current.is_dir());
        assert_eq!(current.output_path(), None);
        assert_eq!(current.relative_path(), Some(PathBuf::new()));
        assert_eq!(entry(b"../").relative_path(), None);
    }

    #[test]
    fn test_is_dir() {
        assert!(entry(b"assets/textures/").is_dir());
        assert!(!entry(b"assets/textures/stone.png").is_dir());
    }

    #[test]
    fn test_name_kept_verbatim() {
        let raw = b"caf\xe9.txt";
        let entry = entry(raw);
        assert_eq!(entry.name(), raw);
        assert_eq!(entry.name_lossy(), "caf\u{fffd}.txt");
    }

    #[test]
    fn test_shift() {
        let record = EocdRecord {
            disk_number: 65535,
            central_dir_disk: 0,
            central_dir_count_disk: 0,
            central_dir_count_total: 0,
            central_dir_size: 100,
            central_dir_offset: 396,
            comment_length: 0,
        };
        let end = EndRecord::new(500, &record, &[]);

        assert_eq!(end.directory_start(), Some(400));
        assert_eq!(end.shift(ScanMode::Tolerant), Some(-4));
        assert_eq!(end.shift(ScanMode::Strict), Some(0));

        let record = EocdRecord {
            central_dir_size: 600,
            ..record
        };
        let end = EndRecord::new(500, &record, &[]);
        assert_eq!(end.directory_start(), None);
        assert_eq!(end.shift(ScanMode::Tolerant), None);
    }
}
