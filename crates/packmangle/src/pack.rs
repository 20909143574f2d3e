//! Well-formed archive construction.
//!
//! A thin adapter over the `zip` writer: the mangler only ever consumes what
//! this produces, so it is kept deliberately plain.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::{Error, Result};

/// Pack every regular file below `root` into a deflated archive.
///
/// Entries are named by their path relative to `root`, `/`-separated, and
/// visited in file-name order so the output is stable. Directories are not
/// stored as entries.
pub fn pack_directory(root: &Path) -> Result<Vec<u8>> {
    if !root.is_dir() {
        return Err(Error::NotADirectory(root.to_path_buf()));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut files = 0usize;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = archive_name(root, entry.path())?;
        writer.start_file(name, file_options())?;
        writer.write_all(&fs::read(entry.path())?)?;
        files += 1;
    }

    let data = writer.finish()?.into_inner();
    debug!(root = %root.display(), files, bytes = data.len(), "directory packed");

    Ok(data)
}

fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated)
}

fn archive_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::UnsafePath(path.display().to_string()))?;

    let name = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    if name.is_empty() {
        return Err(Error::UnsafePath(path.display().to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{Directory, ScanMode};

    #[test]
    fn test_pack_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("assets/minecraft/models")).unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::write(dir.path().join("pack.mcmeta"), b"{\"pack\": {}}").unwrap();
        fs::write(dir.path().join("assets/minecraft/models/stick.json"), b"{}").unwrap();

        let data = pack_directory(dir.path()).unwrap();
        let directory = Directory::scan(&data, ScanMode::Strict).unwrap();

        let names: Vec<_> = directory
            .entries()
            .iter()
            .map(|e| e.name_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["assets/minecraft/models/stick.json", "pack.mcmeta"]);
        assert!(directory.entries().iter().all(|e| e.method() == 8));
    }

    #[test]
    fn test_pack_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(pack_directory(&file), Err(Error::NotADirectory(_))));
    }

    #[test]
    fn test_archive_name() {
        let root = Path::new("/srv/pack");
        assert_eq!(
            archive_name(root, Path::new("/srv/pack/assets/a.json")).unwrap(),
            "assets/a.json"
        );
        assert!(archive_name(root, Path::new("/srv/other/a.json")).is_err());
    }
}
