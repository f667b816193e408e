//! Extracting every entry to a directory.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;

use super::ZipArchive;
use crate::archive_path::safe_join;
use crate::entry::ZipEntry;
use crate::{Error, Result};

/// An entry that could not be extracted.
#[derive(Debug)]
pub struct ExtractFailure {
    /// Name of the entry.
    pub entry_name: String,
    /// Why it failed.
    pub error: Error,
}

/// Outcome of [`ZipArchive::extract_all`].
///
/// A failing entry does not stop the remaining ones; its partial output is
/// removed and the error recorded here.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct ExtractReport {
    /// Paths written, in archive order.
    pub extracted: Vec<PathBuf>,
    /// Entries that failed.
    pub failures: Vec<ExtractFailure>,
}

impl ExtractReport {
    /// Returns `true` if every entry was extracted.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl ZipArchive {
    /// Extracts every entry below `dest`, creating it if needed.
    ///
    /// Only failing to create `dest` itself is returned as an error; entry
    /// failures (wrong password, corruption, unsafe names) go into the
    /// report.
    pub fn extract_all(&self, dest: impl AsRef<Path>) -> Result<ExtractReport> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest)?;

        let mut report = ExtractReport::default();
        for entry in &self.entries {
            match self.extract_entry(entry, dest) {
                Ok(path) => report.extracted.push(path),
                Err(error) => {
                    log::warn!("failed to extract '{}': {}", entry.name, error);
                    report.failures.push(ExtractFailure {
                        entry_name: entry.name.clone(),
                        error: error.with_entry(&entry.name),
                    });
                }
            }
        }
        log::debug!(
            "extracted {} of {} entries to {}",
            report.extracted.len(),
            self.entries.len(),
            dest.display()
        );
        Ok(report)
    }

    fn extract_entry(&self, entry: &ZipEntry, dest: &Path) -> Result<PathBuf> {
        let target = safe_join(dest, &entry.name)?;
        if entry.is_directory() {
            fs::create_dir_all(&target)?;
            return Ok(target);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut reader = self.open_entry(entry)?;
        let written = File::create(&target).map_err(Error::from).and_then(|file| {
            let mut out = BufWriter::new(file);
            io::copy(&mut reader, &mut out)?;
            out.flush()?;
            Ok(())
        });
        if let Err(error) = written {
            if let Err(e) = fs::remove_file(&target) {
                log::debug!("could not remove partial {}: {}", target.display(), e);
            }
            return Err(error);
        }

        apply_metadata(entry, &target);
        Ok(target)
    }
}

/// Restores the modification time and Unix permissions. Failures are
/// logged, not fatal.
fn apply_metadata(entry: &ZipEntry, target: &Path) {
    let mtime = FileTime::from_system_time(entry.modified_time());
    if let Err(e) = filetime::set_file_mtime(target, mtime) {
        log::warn!("could not set mtime of {}: {}", target.display(), e);
    }

    #[cfg(unix)]
    if let Some(mode) = entry.unix_mode() {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o777)) {
            log::warn!("could not set permissions of {}: {}", target.display(), e);
        }
    }
}
