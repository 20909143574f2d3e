//! Common utilities for packmangle.
//!
//! - [`BinaryReader`] - bounds-checked little-endian cursor over a byte slice
//! - [`Error`] - the failure modes of that cursor

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::BinaryReader;
