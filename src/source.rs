//! Entries supplied by a directory walker.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::archive_path::ArchivePath;
use crate::write::EntrySettings;
use crate::{Error, Result};

/// A file or directory to archive, as produced by a filesystem walker.
///
/// Walking and symlink policy belong to the walker; the writer only opens
/// the file and reads its size and modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySource {
    path: Option<PathBuf>,
    name: ArchivePath,
}

impl EntrySource {
    /// A regular file stored under `name`.
    pub fn file(path: impl Into<PathBuf>, name: &str) -> Result<Self> {
        Ok(Self {
            path: Some(path.into()),
            name: ArchivePath::file(name)?,
        })
    }

    /// A directory entry.
    pub fn directory(name: &str) -> Result<Self> {
        Ok(Self {
            path: None,
            name: ArchivePath::directory(name)?,
        })
    }

    /// Builds a source from a path below `root`, naming it relative to `root`.
    ///
    /// ```rust,no_run
    /// use zipspan::source::EntrySource;
    ///
    /// # fn main() -> zipspan::Result<()> {
    /// let source = EntrySource::from_walk("project", "project/src/main.rs")?;
    /// assert_eq!(source.name(), "src/main.rs");
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_walk(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let relative = path.strip_prefix(root.as_ref()).map_err(|_| {
            Error::InvalidArchivePath(format!(
                "{} is not below {}",
                path.display(),
                root.as_ref().display()
            ))
        })?;
        let is_directory = path.is_dir();
        Ok(Self {
            path: (!is_directory).then(|| path.to_path_buf()),
            name: ArchivePath::from_relative_path(relative, is_directory)?,
        })
    }

    /// Name inside the archive.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns `true` for a directory entry.
    pub fn is_directory(&self) -> bool {
        self.name.is_directory()
    }

    /// Filesystem path of a file entry.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Opens the file and derives its entry settings from `base`.
    pub(crate) fn open(&self, base: &EntrySettings) -> Result<(File, EntrySettings)> {
        let path = self
            .path
            .as_deref()
            .ok_or(Error::InvalidState("directory sources have no file to open"))?;
        let file = File::open(path).map_err(|e| {
            Error::Io(io::Error::new(e.kind(), format!("failed to open {}: {}", path.display(), e)))
        })?;
        let metadata = file.metadata()?;

        let mut settings = base.clone().with_size_hint(metadata.len());
        if settings.last_modified.is_none() {
            settings.last_modified = metadata.modified().ok();
        }
        #[cfg(unix)]
        if settings.unix_mode.is_none() {
            use std::os::unix::fs::PermissionsExt;
            settings.unix_mode = Some(metadata.permissions().mode());
        }
        Ok((file, settings))
    }
}
