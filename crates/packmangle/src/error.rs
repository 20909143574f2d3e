//! Error types for the packmangle crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when mangling, scanning or extracting archives.
///
/// Structural variants (`EocdNotFound`, `DirectoryOutOfBounds`,
/// `CommentTooLong`, `ArchiveTooLarge`) abort a whole call. During extraction
/// everything else is reported per entry through [`EntryFailure`].
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary reader error.
    #[error("{0}")]
    Common(#[from] packmangle_common::Error),

    /// No end of central directory record cross-validated in the search window.
    #[error("could not find end of central directory record")]
    EocdNotFound,

    /// The declared directory size reaches back past the start of the buffer.
    #[error("central directory of {size} bytes does not fit before end record at {end_offset}")]
    DirectoryOutOfBounds { size: u32, end_offset: usize },

    /// A recorded local header offset does not map into the buffer.
    #[error("local header offset {recorded} is invalid under shift {shift}")]
    BadOffset { recorded: u32, shift: i64 },

    /// Entry payload runs past the end of the buffer.
    #[error("entry data out of bounds: {len} bytes at offset {offset}")]
    PayloadOutOfBounds { offset: usize, len: u32 },

    /// Output no longer fits the 32-bit offset fields.
    #[error("archive too large for 32-bit offsets: {0} bytes")]
    ArchiveTooLarge(usize),

    /// Trailing comment longer than the 16-bit length field allows.
    #[error("archive comment too long: {0} bytes (max 65535)")]
    CommentTooLong(usize),

    /// Unsupported compression method.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Entry name would resolve outside the destination directory.
    #[error("unsafe entry path: {0}")]
    UnsafePath(String),

    /// Packing source is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Error from the well-formed archive writer.
    #[error("ZIP writer error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Some entries could not be extracted.
    #[error("{} entries failed to extract: {}", .0.len(), join_failures(.0))]
    Partial(Vec<EntryFailure>),
}

/// A single entry that could not be materialized.
#[derive(Debug)]
pub struct EntryFailure {
    /// Entry name, lossily decoded.
    pub name: String,
    /// What went wrong.
    pub error: Error,
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

fn join_failures(failures: &[EntryFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for packmangle operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_names_entries() {
        let error = Error::Partial(vec![
            EntryFailure {
                name: "assets/a.json".to_string(),
                error: Error::UnsupportedCompression(12),
            },
            EntryFailure {
                name: "b.png".to_string(),
                error: Error::Decompression("corrupt deflate stream".to_string()),
            },
        ]);

        let message = error.to_string();
        assert!(message.starts_with("2 entries failed to extract"));
        assert!(message.contains("assets/a.json: unsupported compression method: 12"));
        assert!(message.contains("b.png: decompression error"));
    }
}
