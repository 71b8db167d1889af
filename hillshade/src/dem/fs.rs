//! Filesystem-backed DEM sources.

use super::{is_hgt_name, is_zip_name, DemFile, DemFolder, DemStream, ZipDemFile};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A plain `.hgt` file on disk.
pub struct FsDemFile {
    path: PathBuf,
    name: String,
    size_bytes: u64,
}

impl FsDemFile {
    /// Wrap an on-disk file, capturing its current size.
    pub fn new(path: PathBuf) -> io::Result<Self> {
        let size_bytes = std::fs::metadata(&path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path,
            name,
            size_bytes,
        })
    }
}

impl DemFile for FsDemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn open_stream(&self) -> io::Result<Box<dyn DemStream>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(FsDemStream {
            reader: BufReader::new(file),
        }))
    }
}

struct FsDemStream {
    reader: BufReader<File>,
}

impl Read for FsDemStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl DemStream for FsDemStream {
    fn skip(&mut self, n: u64) -> io::Result<()> {
        self.reader.seek_relative(n as i64)
    }
}

/// A directory of DEM files, walked non-recursively per level; the index
/// builder drives the recursion through [`DemFolder::folders`].
pub struct FsDemFolder {
    root: PathBuf,
}

impl FsDemFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

impl DemFolder for FsDemFolder {
    fn identity(&self) -> String {
        self.root.display().to_string()
    }

    fn files(&self) -> Vec<Arc<dyn DemFile>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.root.display(), error = %e, "cannot read DEM folder");
                return Vec::new();
            }
        };

        let mut files: Vec<Arc<dyn DemFile>> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            if is_hgt_name(&name) {
                match FsDemFile::new(path) {
                    Ok(file) => files.push(Arc::new(file)),
                    Err(e) => {
                        tracing::warn!(file = %name, error = %e, "cannot stat DEM file")
                    }
                }
            } else if is_zip_name(&name) {
                match ZipDemFile::open(&path) {
                    Ok(file) => files.push(Arc::new(file)),
                    Err(e) => {
                        tracing::warn!(file = %name, error = %e, "cannot open DEM archive")
                    }
                }
            }
        }
        files
    }

    fn folders(&self) -> Vec<Box<dyn DemFolder>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .map(|entry| Box::new(FsDemFolder::new(entry.path())) as Box<dyn DemFolder>)
            .collect()
    }
}
