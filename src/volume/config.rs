//! Configuration and naming for split archives.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Smallest split size accepted, per the ZIP application note.
pub const MIN_SPLIT_SIZE: u64 = 64 * 1024;

/// Configuration for a split (multi-volume) archive.
///
/// Volumes are named after the final archive path: disk 0 is `name.z01`,
/// disk 1 is `name.z02`, and the last disk keeps the archive's own name.
///
/// ```rust
/// use zipspan::volume::SplitConfig;
/// use std::path::PathBuf;
///
/// let config = SplitConfig::new("backup.zip", 1024 * 1024).unwrap();
/// assert_eq!(config.volume_path(0), PathBuf::from("backup.z01"));
/// assert_eq!(config.volume_path(11), PathBuf::from("backup.z12"));
/// ```
#[derive(Debug, Clone)]
pub struct SplitConfig {
    split_size: u64,
    archive_path: PathBuf,
}

impl SplitConfig {
    /// Creates a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSplitSize`] if `split_size` is below
    /// [`MIN_SPLIT_SIZE`].
    pub fn new(archive_path: impl AsRef<Path>, split_size: u64) -> Result<Self> {
        if split_size < MIN_SPLIT_SIZE {
            return Err(Error::InvalidSplitSize {
                size: split_size,
                minimum: MIN_SPLIT_SIZE,
            });
        }
        Ok(Self {
            split_size,
            archive_path: archive_path.as_ref().to_path_buf(),
        })
    }

    /// Path of the last volume, which is also the name of the archive.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Maximum size of each volume in bytes.
    pub fn split_size(&self) -> u64 {
        self.split_size
    }

    /// Final name of a non-last volume.
    pub fn volume_path(&self, disk: u32) -> PathBuf {
        volume_path(&self.archive_path, disk)
    }
}

/// Final name of disk `disk` (0-based) of a split archive that is not the
/// last disk: the archive path with its extension replaced by `zNN`.
pub fn volume_path(archive_path: &Path, disk: u32) -> PathBuf {
    archive_path.with_extension(format!("z{:02}", disk + 1))
}
