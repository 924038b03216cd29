//! ZIP packaging of the STEP output.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ConversionError;

/// Name of the STEP entry inside the package.
pub const PACKAGE_ENTRY_NAME: &str = "converted.step";

/// Sizes before and after compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageStats {
    /// STEP size in bytes.
    pub original_bytes: u64,
    /// ZIP size in bytes.
    pub compressed_bytes: u64,
}

impl PackageStats {
    /// Size reduction in percent (negative if the archive grew).
    pub fn reduction_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_bytes as f64 / self.original_bytes as f64) * 100.0
    }
}

/// Deflate `step_path` into a new archive at `zip_path`.
///
/// Blocking; run it on a blocking thread.
pub fn compress_step(
    step_path: &Path,
    zip_path: &Path,
    level: i64,
) -> Result<PackageStats, ConversionError> {
    let original_bytes = std::fs::metadata(step_path)?.len();

    let mut source = BufReader::new(File::open(step_path)?);
    let mut archive = ZipWriter::new(BufWriter::new(File::create(zip_path)?));

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level))
        .large_file(original_bytes > u32::MAX as u64);

    archive.start_file(PACKAGE_ENTRY_NAME, options)?;
    std::io::copy(&mut source, &mut archive)?;

    let mut sink = archive.finish()?;
    std::io::Write::flush(&mut sink)?;
    drop(sink);

    let compressed_bytes = std::fs::metadata(zip_path)?.len();

    Ok(PackageStats {
        original_bytes,
        compressed_bytes,
    })
}
