//! Mangling encoder and tolerant decoder for ZIP-family content archives.
//!
//! A mangled archive keeps every payload byte and every entry name, but breaks
//! the bookkeeping generic tools depend on: local headers are blanked, offsets
//! are measured from behind a decoy signature, sizes, CRCs and disk numbers are
//! falsified, and the end record claims zero entries. Only a reader that
//! derives everything from the central directory, as [`extract`] does, gets
//! the files back.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! let well_formed = packmangle::pack_directory(Path::new("resourcepack"))?;
//! let mangled = packmangle::mangle(&well_formed, None)?;
//!
//! let report = packmangle::extract(&mangled, Path::new("out"))?;
//! println!("{} files written", report.into_result()?);
//! # Ok::<(), packmangle::Error>(())
//! ```

mod decompress;
mod entry;
mod error;
mod extract;
mod mangle;
mod pack;
mod scan;
pub mod format;

pub use entry::{DirectoryEntry, EndRecord};
pub use error::{EntryFailure, Error, Result};
#[cfg(feature = "parallel")]
pub use extract::extract_parallel;
pub use extract::{extract, extract_with_mode, ExtractReport, Materialized};
pub use mangle::{
    mangle, mangle_with_rng, DECOY, FAKE_END_DISK, FAKE_ENTRY_DISK, FAKE_UNCOMPRESSED_SIZE,
};
pub use pack::pack_directory;
pub use scan::{locate_end_record, parse_entries, Directory, ScanMode};
pub use format::CompressionMethod;
