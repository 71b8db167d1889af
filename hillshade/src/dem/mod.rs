//! DEM source abstraction.
//!
//! Elevation data is consumed as forward-only byte streams of big-endian
//! signed 16-bit samples. The traits here decouple the engine from where
//! those bytes live: plain `.hgt` files on disk, `.hgt` entries inside ZIP
//! archives, or anything else a caller wants to plug in.

mod fs;
mod zip;

pub use self::fs::{FsDemFile, FsDemFolder};
pub use self::zip::ZipDemFile;

use std::io::{self, Read};
use std::sync::Arc;

/// File extension of raw HGT tiles (compared case-insensitively).
pub const HGT_FILE_EXTENSION: &str = "hgt";

/// File extension of ZIP-contained HGT tiles (compared case-insensitively).
pub const ZIP_FILE_EXTENSION: &str = "zip";

/// Sentinel elevation marking a missing sample in HGT data.
pub const NO_DATA_VALUE: i16 = i16::MIN;

/// A forward-only stream of big-endian signed 16-bit elevation samples.
pub trait DemStream: Read + Send {
    /// Skip `n` bytes of the stream.
    ///
    /// The default implementation reads and discards, which is correct for
    /// any source but slow. Seekable sources should override this.
    fn skip(&mut self, n: u64) -> io::Result<()> {
        let mut remaining = n;
        let mut scratch = [0u8; 8192];
        while remaining > 0 {
            let want = remaining.min(scratch.len() as u64) as usize;
            let got = self.read(&mut scratch[..want])?;
            if got == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "DEM stream ended while skipping",
                ));
            }
            remaining -= got as u64;
        }
        Ok(())
    }
}

/// One elevation source: a square grid of big-endian i16 samples.
pub trait DemFile: Send + Sync {
    /// File name used for tile-key parsing (not a full path).
    fn name(&self) -> &str;

    /// Uncompressed payload size in bytes.
    fn size_bytes(&self) -> u64;

    /// Open an independent stream over the samples.
    ///
    /// Each raster reader opens its own stream, so implementations must
    /// support any number of concurrent streams.
    fn open_stream(&self) -> io::Result<Box<dyn DemStream>>;

    /// Whether [`DemStream::skip`] is cheap for this source.
    ///
    /// Sources that cannot seek (e.g. compressed archive entries) return
    /// `false`, which forces the raster pipeline into single-reader mode.
    fn supports_fast_skip(&self) -> bool {
        true
    }
}

/// A recursively enumerable catalog of DEM files.
pub trait DemFolder: Send + Sync {
    /// Stable identity used to detect configuration changes.
    fn identity(&self) -> String;

    /// DEM files directly contained in this folder.
    fn files(&self) -> Vec<Arc<dyn DemFile>>;

    /// Sub-folders directly contained in this folder.
    fn folders(&self) -> Vec<Box<dyn DemFolder>>;
}

/// `true` when `name` ends in `.hgt`, ignoring case.
pub fn is_hgt_name(name: &str) -> bool {
    has_extension(name, HGT_FILE_EXTENSION)
}

/// `true` when `name` ends in `.zip`, ignoring case.
pub fn is_zip_name(name: &str) -> bool {
    has_extension(name, ZIP_FILE_EXTENSION)
}

fn has_extension(name: &str, extension: &str) -> bool {
    let dotted = format!(".{extension}");
    name.len() >= dotted.len() && name[name.len() - dotted.len()..].eq_ignore_ascii_case(&dotted)
}
