//! ZIP-contained HGT sources.
//!
//! A DEM archive holds a single `.hgt` entry. The outer archive file is
//! the [`DemFile`]: its name is matched against the tile-key pattern and
//! its `size_bytes` is the uncompressed entry size (so the square-grid
//! validation applies to the real payload). Entry metadata is captured
//! once at open time; each stream re-opens the archive file and inflates
//! from the recorded data offset, so streams are independent and nothing
//! borrows the archive reader.

use super::{is_hgt_name, DemFile, DemStream};
use crate::error::{HillshadeError, Result};
use flate2::read::DeflateDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use zip::{CompressionMethod, ZipArchive};

/// A `.hgt` entry inside a ZIP archive.
#[derive(Debug)]
pub struct ZipDemFile {
    path: PathBuf,
    name: String,
    entry_size: u64,
    compressed_size: u64,
    data_start: u64,
    method: CompressionMethod,
}

impl ZipDemFile {
    /// Open an archive and locate its HGT entry.
    pub fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let invalid = |reason: String| HillshadeError::InvalidSource {
            name: name.clone(),
            reason,
        };

        let file = File::open(path)?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| invalid(e.to_string()))?;

        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| invalid(e.to_string()))?;
            if !is_hgt_name(entry.name()) {
                continue;
            }
            let method = entry.compression();
            if !matches!(method, CompressionMethod::Stored | CompressionMethod::Deflated) {
                return Err(invalid(format!(
                    "unsupported compression method {method:?} for entry {}",
                    entry.name()
                )));
            }
            return Ok(Self {
                path: path.to_path_buf(),
                name,
                entry_size: entry.size(),
                compressed_size: entry.compressed_size(),
                data_start: entry.data_start(),
                method,
            });
        }

        Err(invalid("no .hgt entry in archive".to_string()))
    }
}

impl DemFile for ZipDemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_bytes(&self) -> u64 {
        self.entry_size
    }

    fn open_stream(&self) -> io::Result<Box<dyn DemStream>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.data_start))?;
        let reader = BufReader::new(file);

        match self.method {
            CompressionMethod::Stored => Ok(Box::new(RawStream(reader.take(self.entry_size)))),
            _ => Ok(Box::new(RawStream(DeflateDecoder::new(
                reader.take(self.compressed_size),
            )))),
        }
    }

    /// Inflating cannot seek, so skipping means decompressing and
    /// discarding. The raster pipeline degrades to a single reader.
    fn supports_fast_skip(&self) -> bool {
        false
    }
}

/// Wraps any reader as a [`DemStream`] with the default discard-skip.
struct RawStream<R>(R);

impl<R: Read + Send> Read for RawStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read + Send> DemStream for RawStream<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_archive(dir: &Path, name: &str, entry: &str, data: &[u8], deflate: bool) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut writer = ZipWriter::new(file);
        let method = if deflate {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        let options = SimpleFileOptions::default().compression_method(method);
        writer.start_file(entry, options).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_open_reports_entry_size_not_archive_size() {
        let dir = TempDir::new().unwrap();
        let data = vec![7u8; 50];
        let path = write_archive(dir.path(), "N10E020.zip", "N10E020.hgt", &data, true);

        let file = ZipDemFile::open(&path).unwrap();
        assert_eq!(file.name(), "N10E020.zip");
        assert_eq!(file.size_bytes(), 50);
        assert!(!file.supports_fast_skip());
    }

    #[test]
    fn test_stream_inflates_deflated_entry() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..200).map(|i| (i % 251) as u8).collect();
        let path = write_archive(dir.path(), "N10E020.zip", "N10E020.hgt", &data, true);

        let file = ZipDemFile::open(&path).unwrap();
        let mut stream = file.open_stream().unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_stream_reads_stored_entry() {
        let dir = TempDir::new().unwrap();
        let data = vec![42u8; 64];
        let path = write_archive(dir.path(), "s05w123.ZIP", "s05w123.hgt", &data, false);

        let file = ZipDemFile::open(&path).unwrap();
        let mut stream = file.open_stream().unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_skip_discards_on_compressed_stream() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..100).collect();
        let path = write_archive(dir.path(), "N10E020.zip", "N10E020.hgt", &data, true);

        let file = ZipDemFile::open(&path).unwrap();
        let mut stream = file.open_stream().unwrap();
        stream.skip(30).unwrap();
        let mut next = [0u8; 1];
        stream.read_exact(&mut next).unwrap();
        assert_eq!(next[0], 30);
    }

    #[test]
    fn test_archive_without_hgt_entry_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(dir.path(), "N10E020.zip", "readme.txt", b"hello", true);

        let err = ZipDemFile::open(&path).unwrap_err();
        assert!(matches!(err, HillshadeError::InvalidSource { .. }));
        assert!(err.to_string().contains("no .hgt entry"));
    }
}
