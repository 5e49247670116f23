//! Zip container adapter.
//!
//! The container is an ordered collection of uniquely-named entries. Reads
//! preserve archive order; writes replay a caller-supplied order with deflate
//! and a fixed timestamp so unchanged input recompresses byte-stable.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use pbv_format::{PbvError, Result};

/// One named byte payload inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Relative path inside the container.
    pub path: String,
    /// Raw payload.
    pub bytes: Vec<u8>,
}

/// Ordered entry set read from, or destined for, a container file.
#[derive(Debug, Clone, Default)]
pub struct Container {
    /// Entries in archive order.
    pub entries: Vec<Entry>,
}

impl Container {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by path.
    pub fn entry(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

/// Open a container and read every entry, in archive order.
pub fn open(path: &Path) -> Result<Container> {
    let file = File::open(path).map_err(|e| PbvError::Filesystem {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| translate_open_error(path, err))?;

    let mut entries = Vec::with_capacity(archive.len());
    let mut seen: HashSet<String> = HashSet::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| PbvError::Archive(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        if file.enclosed_name().is_none() {
            return Err(PbvError::Archive(format!(
                "entry '{}' escapes the extraction root",
                file.name()
            )));
        }
        let name = file.name().to_string();
        if !seen.insert(name.clone()) {
            return Err(PbvError::Archive(format!("duplicate entry path '{name}'")));
        }
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        entries.push(Entry { path: name, bytes });
    }
    Ok(Container { entries })
}

/// Write a container to `path`.
///
/// Fails with an archive error if `path` exists and `overwrite` is false.
/// The archive is assembled at a temp sibling path and renamed into place on
/// success, so a failed run never leaves a half-written container behind.
pub fn write(container: &Container, path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(PbvError::Archive(format!(
            "output path '{}' already exists",
            path.display()
        )));
    }
    let tmp = temp_sibling(path);
    match write_archive(container, &tmp) {
        Ok(()) => fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            PbvError::Filesystem {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        }),
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            Err(err)
        }
    }
}

fn write_archive(container: &Container, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| PbvError::Filesystem {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    for entry in &container.entries {
        writer
            .start_file(entry.path.as_str(), options)
            .map_err(|e| PbvError::Archive(e.to_string()))?;
        writer.write_all(&entry.bytes)?;
    }
    writer
        .finish()
        .map_err(|e| PbvError::Archive(e.to_string()))?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("container");
    path.with_file_name(format!("{name}.pbv-tmp"))
}

fn translate_open_error(path: &Path, err: ZipError) -> PbvError {
    match err {
        ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
            PbvError::Archive(format!("'{}' is not a valid container", path.display()))
        }
        ZipError::Io(e) => PbvError::Io(e),
        other => PbvError::Archive(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Container {
        Container {
            entries: vec![
                Entry {
                    path: "Version".to_string(),
                    bytes: vec![1, 0],
                },
                Entry {
                    path: "Report/Layout".to_string(),
                    bytes: b"{}".to_vec(),
                },
            ],
        }
    }

    #[test]
    fn write_then_open_preserves_order_and_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.pbit");
        write(&sample(), &path, false).unwrap();

        let read = open(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read.entries[0].path, "Version");
        assert_eq!(read.entries[0].bytes, vec![1, 0]);
        assert_eq!(read.entries[1].path, "Report/Layout");
    }

    #[test]
    fn write_declines_existing_path_without_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.pbit");
        fs::write(&path, b"existing").unwrap();

        let err = write(&sample(), &path, false).unwrap_err();
        assert!(matches!(err, PbvError::Archive(_)));
        // existing file untouched
        assert_eq!(fs::read(&path).unwrap(), b"existing");
    }

    #[test]
    fn write_replaces_existing_path_with_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.pbit");
        fs::write(&path, b"existing").unwrap();

        write(&sample(), &path, true).unwrap();
        assert_eq!(open(&path).unwrap().len(), 2);
    }

    #[test]
    fn repeated_writes_are_byte_stable() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.pbit");
        let second = dir.path().join("b.pbit");
        write(&sample(), &first, false).unwrap();
        write(&sample(), &second, false).unwrap();
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn open_rejects_non_zip_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-zip.pbit");
        fs::write(&path, b"plain text").unwrap();

        let err = open(&path).unwrap_err();
        assert!(matches!(err, PbvError::Archive(_)));
    }

    #[test]
    fn open_missing_file_is_a_filesystem_error() {
        let err = open(Path::new("/nonexistent/sample.pbit")).unwrap_err();
        assert!(matches!(err, PbvError::Filesystem { .. }));
    }
}
