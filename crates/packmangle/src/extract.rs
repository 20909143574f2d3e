//! Archive extractor.
//!
//! Reconstructs files from the directory alone: each payload is found at
//! `recorded offset - shift`, behind whatever name and extra bytes the local
//! header declares, and exactly `compressed_size` bytes long. Uncompressed
//! sizes, CRCs and disk numbers are never consulted.
//!
//! Entries are independent. A failing entry is logged and recorded in the
//! [`ExtractReport`]; its siblings are still written.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::decompress;
use crate::entry::DirectoryEntry;
use crate::error::EntryFailure;
use crate::format::{payload_range, CompressionMethod};
use crate::scan::{Directory, ScanMode};
use crate::{Error, Result};

/// What materializing one entry produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// A regular file was written.
    File(PathBuf),
    /// The entry named a directory; it was created, nothing was written.
    Directory(PathBuf),
}

/// Outcome of an extraction run.
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Number of files written.
    pub written: usize,
    /// Entries that were skipped or failed, in directory order.
    pub failures: Vec<EntryFailure>,
}

impl ExtractReport {
    /// Record the outcome of one entry.
    pub fn record(&mut self, entry: &DirectoryEntry, outcome: Result<Materialized>) {
        match outcome {
            Ok(Materialized::File(path)) => {
                debug!(path = %path.display(), "extracted");
                self.written += 1;
            }
            Ok(Materialized::Directory(_)) => {}
            Err(error) => {
                let name = entry.name_lossy().into_owned();
                warn!(entry = %name, "skipping entry: {error}");
                self.failures.push(EntryFailure { name, error });
            }
        }
    }

    /// True when every entry was materialized.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The written count, or [`Error::Partial`] naming every failed entry.
    pub fn into_result(self) -> Result<usize> {
        if self.failures.is_empty() {
            Ok(self.written)
        } else {
            Err(Error::Partial(self.failures))
        }
    }
}

impl Directory {
    /// Decode one entry's contents from `data`.
    pub fn read_entry(&self, data: &[u8], entry: &DirectoryEntry) -> Result<Vec<u8>> {
        let method = entry
            .compression_method()
            .map_err(Error::UnsupportedCompression)?;

        let header_offset = self.header_offset(entry)?;
        let payload = &data[payload_range(data, header_offset, entry.compressed_size())?];

        match method {
            CompressionMethod::Store => Ok(payload.to_vec()),
            CompressionMethod::Deflate => decompress::inflate_raw(payload),
        }
    }

    /// Write one entry below `destination`, creating parent directories.
    pub fn materialize(
        &self,
        data: &[u8],
        entry: &DirectoryEntry,
        destination: &Path,
    ) -> Result<Materialized> {
        let unsafe_path = || Error::UnsafePath(entry.name_lossy().into_owned());

        if entry.is_dir() {
            let relative = entry.relative_path().ok_or_else(unsafe_path)?;
            let path = if relative.as_os_str().is_empty() {
                destination.to_path_buf()
            } else {
                destination.join(relative)
            };
            fs::create_dir_all(&path)?;
            return Ok(Materialized::Directory(path));
        }

        let path = destination.join(entry.output_path().ok_or_else(unsafe_path)?);

        let contents = self.read_entry(data, entry)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;

        Ok(Materialized::File(path))
    }
}

/// Extract a mangled archive into `destination`.
///
/// Fails only when the directory cannot be located; per-entry problems are
/// returned in the report.
pub fn extract(data: &[u8], destination: &Path) -> Result<ExtractReport> {
    extract_with_mode(data, destination, ScanMode::Tolerant)
}

/// Extract with an explicit scan mode. [`ScanMode::Strict`] reads
/// well-formed archives without deriving a shift.
pub fn extract_with_mode(data: &[u8], destination: &Path, mode: ScanMode) -> Result<ExtractReport> {
    let directory = Directory::scan(data, mode)?;
    let mut report = ExtractReport::default();

    for entry in directory.entries() {
        report.record(entry, directory.materialize(data, entry, destination));
    }

    Ok(report)
}

/// Parallel extraction of every entry.
///
/// The buffer is shared read-only; each entry writes its own file. Failures
/// are still reported in directory order.
#[cfg(feature = "parallel")]
pub fn extract_parallel(data: &[u8], destination: &Path, mode: ScanMode) -> Result<ExtractReport> {
    let directory = Directory::scan(data, mode)?;
    Ok(directory.materialize_parallel(data, destination))
}

#[cfg(feature = "parallel")]
impl Directory {
    /// Materialize every entry with rayon once the shift is known.
    pub fn materialize_parallel(&self, data: &[u8], destination: &Path) -> ExtractReport {
        use rayon::prelude::*;

        let outcomes: Vec<_> = self
            .entries()
            .par_iter()
            .map(|entry| self.materialize(data, entry, destination))
            .collect();

        let mut report = ExtractReport::default();
        for (entry, outcome) in self.entries().iter().zip(outcomes) {
            report.record(entry, outcome);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    fn archive(files: &[(&str, &[u8], zip::CompressionMethod)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, method) in files {
            let options = SimpleFileOptions::default().compression_method(*method);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_entry_store_and_deflate() {
        let data = archive(&[
            ("stored.bin", b"\x00\x01\x02raw", zip::CompressionMethod::Stored),
            ("deflated.txt", b"hello hello hello", zip::CompressionMethod::Deflated),
        ]);
        let mangled = crate::mangle(&data, None).unwrap();
        let directory = Directory::scan(&mangled, ScanMode::Tolerant).unwrap();

        for entry in directory.entries() {
            let contents = directory.read_entry(&mangled, entry).unwrap();
            match entry.name() {
                b"stored.bin" => assert_eq!(contents, b"\x00\x01\x02raw"),
                b"deflated.txt" => assert_eq!(contents, b"hello hello hello"),
                other => panic!("unexpected entry {other:?}"),
            }
        }
    }

    #[test]
    fn test_unsafe_path_is_reported() {
        let data = archive(&[
            ("../escape.txt", b"nope", zip::CompressionMethod::Stored),
            ("ok.txt", b"fine", zip::CompressionMethod::Stored),
        ]);
        let mangled = crate::mangle(&data, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out");

        let report = extract(&mangled, &destination).unwrap();

        assert_eq!(report.written, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "../escape.txt");
        assert!(matches!(report.failures[0].error, Error::UnsafePath(_)));
        assert!(!dir.path().join("escape.txt").exists());
        assert_eq!(fs::read(destination.join("ok.txt")).unwrap(), b"fine");
    }

    #[test]
    fn test_directory_entries_not_counted() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory("assets/empty/", SimpleFileOptions::default())
            .unwrap();
        writer
            .start_file("assets/file.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"content").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let mangled = crate::mangle(&data, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let report = extract(&mangled, dir.path()).unwrap();

        assert_eq!(report.written, 1);
        assert!(report.is_complete());
        assert!(dir.path().join("assets/empty").is_dir());
        assert_eq!(fs::read(dir.path().join("assets/file.txt")).unwrap(), b"content");
    }

    #[test]
    fn test_current_dir_entry_is_noop() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("x/", SimpleFileOptions::default()).unwrap();
        writer
            .start_file("file.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"content").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let mut mangled = crate::mangle(&data, None).unwrap();
        let directory = Directory::scan(&mangled, ScanMode::Tolerant).unwrap();
        let record = directory
            .entries()
            .iter()
            .find(|e| e.name() == b"x/")
            .unwrap()
            .record_offset();
        mangled[record + 46..record + 48].copy_from_slice(b"./");

        let directory = Directory::scan(&mangled, ScanMode::Tolerant).unwrap();
        let current = directory
            .entries()
            .iter()
            .find(|e| e.name() == b"./")
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            directory.materialize(&mangled, current, dir.path()).unwrap(),
            Materialized::Directory(dir.path().to_path_buf())
        );

        let report = extract(&mangled, dir.path()).unwrap();
        assert_eq!(report.into_result().unwrap(), 1);
        assert_eq!(fs::read(dir.path().join("file.txt")).unwrap(), b"content");
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_reports_in_directory_order() {
        let data = archive(&[
            ("ok.txt", b"fine", zip::CompressionMethod::Stored),
            ("model.obj", b"v 0 0 0", zip::CompressionMethod::Deflated),
            ("../escape.txt", b"nope", zip::CompressionMethod::Stored),
            ("deep/nested.txt", b"nested nested", zip::CompressionMethod::Deflated),
        ]);
        let mut mangled = crate::mangle(&data, None).unwrap();
        let directory = Directory::scan(&mangled, ScanMode::Tolerant).unwrap();
        let record = directory
            .entries()
            .iter()
            .find(|e| e.name() == b"model.obj")
            .unwrap()
            .record_offset();
        mangled[record + 10..record + 12].copy_from_slice(&12u16.to_le_bytes());

        let directory = Directory::scan(&mangled, ScanMode::Tolerant).unwrap();
        let expected: Vec<_> = directory
            .entries()
            .iter()
            .map(|e| e.name_lossy().into_owned())
            .filter(|name| name == "model.obj" || name == "../escape.txt")
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out");
        let report = extract_parallel(&mangled, &destination, ScanMode::Tolerant).unwrap();

        assert_eq!(report.written, 2);
        let names: Vec<_> = report.failures.iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, expected);
        for failure in &report.failures {
            match failure.name.as_str() {
                "model.obj" => {
                    assert!(matches!(failure.error, Error::UnsupportedCompression(12)))
                }
                _ => assert!(matches!(failure.error, Error::UnsafePath(_))),
            }
        }

        assert_eq!(fs::read(destination.join("ok.txt")).unwrap(), b"fine");
        assert_eq!(fs::read(destination.join("deep/nested.txt")).unwrap(), b"nested nested");
        assert!(!destination.join("model.obj").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_bad_offset_is_per_entry() {
        let data = archive(&[
            ("a.txt", b"alpha", zip::CompressionMethod::Stored),
            ("b.txt", b"beta", zip::CompressionMethod::Stored),
        ]);
        let mut mangled = crate::mangle(&data, None).unwrap();
        let directory = Directory::scan(&mangled, ScanMode::Tolerant).unwrap();
        let victim = directory
            .entries()
            .iter()
            .find(|e| e.name() == b"a.txt")
            .unwrap()
            .record_offset();

        // Point a.txt's local header far beyond the buffer.
        let field = victim + 42;
        mangled[field..field + 4].copy_from_slice(&0x00FF_FFFFu32.to_le_bytes());

        let dir = tempfile::tempdir().unwrap();
        let report = extract(&mangled, dir.path()).unwrap();

        assert_eq!(report.written, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "a.txt");
        assert!(matches!(report.failures[0].error, Error::Common(_)));
        assert_eq!(fs::read(dir.path().join("b.txt")).unwrap(), b"beta");
    }

    #[test]
    fn test_into_result() {
        let report = ExtractReport {
            written: 3,
            failures: Vec::new(),
        };
        assert_eq!(report.into_result().unwrap(), 3);

        let report = ExtractReport {
            written: 1,
            failures: vec![EntryFailure {
                name: "model.obj".to_string(),
                error: Error::UnsupportedCompression(14),
            }],
        };
        let error = report.into_result().unwrap_err();
        assert!(error.to_string().contains("model.obj"));
    }
}
