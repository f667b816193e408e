//! Archive writing.
//!
//! [`ZipWriter`] owns the output (one file or a set of split volumes) and
//! the list of finished entries. Entries are written one at a time through
//! an [`EntryWriter`]; [`ZipWriter::finish`] appends the central directory
//! and end records.
//!
//! ```rust,no_run
//! use std::io::Write;
//! use zipspan::write::{EntrySettings, ZipSettings, ZipWriter};
//!
//! # fn main() -> zipspan::Result<()> {
//! let mut zip = ZipWriter::create("out.zip", ZipSettings::new())?;
//! zip.add_bytes("hello.txt", b"Hello, World!", EntrySettings::new())?;
//!
//! let mut entry = zip.start_entry("log/app.log", EntrySettings::new())?;
//! entry.write_all(b"first line\n")?;
//! entry.finish()?;
//!
//! let volumes = zip.finish()?;
//! assert_eq!(volumes.len(), 1);
//! # Ok(())
//! # }
//! ```

mod central;
mod entry_output;
mod headers;
mod options;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub use entry_output::EntryWriter;
pub use options::{CentralDirectoryEncryption, EntrySettings, Zip64Mode, ZipSettings};

use crate::archive_path::ArchivePath;
use crate::entry::ZipEntry;
use crate::io::{DataSink, FileSink, SinkPosition};
use crate::source::EntrySource;
use crate::volume::{SplitConfig, SplitWriter};
use crate::{Error, Result};

/// A single archive file, removed on drop unless finished.
#[derive(Debug)]
pub struct SingleFile {
    sink: Option<FileSink<BufWriter<File>>>,
    path: PathBuf,
    finished: bool,
}

impl SingleFile {
    fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("failed to create archive {}: {}", path.display(), e),
            ))
        })?;
        Ok(Self {
            sink: Some(FileSink::new(BufWriter::new(file))),
            path: path.to_path_buf(),
            finished: false,
        })
    }

    fn finish(mut self) -> Result<Vec<PathBuf>> {
        if let Some(sink) = self.sink.take() {
            let file = sink.into_inner()?.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        self.finished = true;
        Ok(vec![self.path.clone()])
    }

    fn sink(&mut self) -> io::Result<&mut FileSink<BufWriter<File>>> {
        self.sink
            .as_mut()
            .ok_or_else(|| io::Error::other("archive file already closed"))
    }
}

impl Drop for SingleFile {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.sink.take();
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("failed to remove unfinished archive {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Output of a [`ZipWriter`]: one file, or split volumes.
#[derive(Debug)]
pub enum VolumeSink {
    /// A single archive file.
    Single(SingleFile),
    /// Numbered volumes.
    Split(SplitWriter),
}

impl VolumeSink {
    fn finish(self) -> Result<Vec<PathBuf>> {
        match self {
            VolumeSink::Single(file) => file.finish(),
            VolumeSink::Split(writer) => writer.finish(),
        }
    }
}

impl Write for VolumeSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            VolumeSink::Single(file) => file.sink()?.write(buf),
            VolumeSink::Split(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            VolumeSink::Single(file) => file.sink()?.flush(),
            VolumeSink::Split(writer) => writer.flush(),
        }
    }
}

impl DataSink for VolumeSink {
    fn position(&self) -> SinkPosition {
        match self {
            VolumeSink::Single(file) => {
                file.sink.as_ref().map(|s| s.position()).unwrap_or_default()
            }
            VolumeSink::Split(writer) => writer.position(),
        }
    }

    fn total_written(&self) -> u64 {
        match self {
            VolumeSink::Single(file) => file.sink.as_ref().map_or(0, |s| s.total_written()),
            VolumeSink::Split(writer) => writer.total_written(),
        }
    }

    fn reserve_contiguous(&mut self, len: u64) -> io::Result<()> {
        match self {
            VolumeSink::Single(_) => Ok(()),
            VolumeSink::Split(writer) => writer.reserve_contiguous(len),
        }
    }

    fn is_split(&self) -> bool {
        matches!(self, VolumeSink::Split(_))
    }
}

/// Finished entries and the archive's health.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    entries: Vec<ZipEntry>,
    names: HashSet<String>,
    /// Set while an entry has bytes in the sink but is not finished.
    poisoned: bool,
}

impl Catalog {
    fn record(&mut self, entry: ZipEntry) {
        self.names.insert(entry.name.clone());
        self.entries.push(entry);
        self.poisoned = false;
    }
}

/// Writes a ZIP archive, optionally split into volumes.
///
/// Dropping the writer without calling [`finish`](Self::finish) removes
/// every file it created.
#[derive(Debug)]
pub struct ZipWriter {
    sink: Option<VolumeSink>,
    settings: ZipSettings,
    catalog: Catalog,
}

impl ZipWriter {
    /// Creates the archive at `path`.
    ///
    /// With [`ZipSettings::split_size`] set the volumes are written next to
    /// it as `name.z01`, `name.z02`, ... with the last one at `path`.
    pub fn create(path: impl AsRef<Path>, settings: ZipSettings) -> Result<Self> {
        let path = path.as_ref();
        let sink = match settings.split_size {
            Some(size) => VolumeSink::Split(SplitWriter::create(SplitConfig::new(path, size)?)?),
            None => VolumeSink::Single(SingleFile::create(path)?),
        };
        log::debug!(
            "creating archive {} (split: {:?}, zip64: {:?})",
            path.display(),
            settings.split_size,
            settings.zip64
        );
        Ok(Self {
            sink: Some(sink),
            settings,
            catalog: Catalog::default(),
        })
    }

    /// Archive settings.
    pub fn settings(&self) -> &ZipSettings {
        &self.settings
    }

    /// Entries finished so far.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.catalog.entries
    }

    /// Opens a new entry. A name ending in `/` is a directory.
    ///
    /// # Errors
    ///
    /// [`Error::EntryExists`] for a duplicate name,
    /// [`Error::InvalidArchivePath`] for a name that cannot be stored and
    /// [`Error::InvalidState`] after a previous entry was abandoned midway.
    pub fn start_entry(&mut self, name: &str, settings: EntrySettings) -> Result<EntryWriter<'_>> {
        let path = if name.ends_with('/') {
            ArchivePath::directory(name)?
        } else {
            ArchivePath::file(name)?
        };
        if self.catalog.poisoned {
            return Err(Error::InvalidState("a previous entry was not finished"));
        }
        if self.catalog.names.contains(path.as_str()) {
            return Err(Error::EntryExists {
                path: path.into_string(),
            });
        }
        let sink = self
            .sink
            .as_mut()
            .ok_or(Error::InvalidState("archive already finished"))?;
        EntryWriter::start(sink, &mut self.catalog, &self.settings, path, settings)
    }

    /// Adds a directory entry.
    pub fn add_directory(&mut self, name: &str, settings: EntrySettings) -> Result<ZipEntry> {
        let path = ArchivePath::directory(name)?;
        self.start_entry(path.as_str(), settings)?.finish()
    }

    /// Adds an entry from memory.
    pub fn add_bytes(
        &mut self,
        name: &str,
        data: &[u8],
        settings: EntrySettings,
    ) -> Result<ZipEntry> {
        let settings = settings.with_size_hint(data.len() as u64);
        let mut entry = self.start_entry(name, settings)?;
        entry.write_all(data).map_err(|e| Error::from(e).with_entry(name))?;
        entry.finish()
    }

    /// Adds an entry from a reader, streamed until end of input.
    pub fn add_reader<R: Read>(
        &mut self,
        name: &str,
        mut reader: R,
        settings: EntrySettings,
    ) -> Result<ZipEntry> {
        let mut entry = self.start_entry(name, settings)?;
        io::copy(&mut reader, &mut entry).map_err(|e| Error::from(e).with_entry(name))?;
        entry.finish()
    }

    /// Adds entries supplied by a directory walker.
    ///
    /// Files are opened one at a time; their size becomes the size hint and
    /// their modification time is used unless `settings` sets one.
    pub fn add_sources<I>(&mut self, sources: I, settings: EntrySettings) -> Result<Vec<ZipEntry>>
    where
        I: IntoIterator<Item = EntrySource>,
    {
        let mut added = Vec::new();
        for source in sources {
            let entry = if source.is_directory() {
                self.add_directory(source.name(), settings.clone())?
            } else {
                let (file, entry_settings) = source.open(&settings)?;
                self.add_reader(source.name(), file, entry_settings)?
            };
            added.push(entry);
        }
        Ok(added)
    }

    /// Writes the central directory and end records and closes the output.
    ///
    /// # Returns
    ///
    /// The volume paths in disk order; the last is the archive path.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        if self.catalog.poisoned {
            return Err(Error::InvalidState("a previous entry was not finished"));
        }
        let mut sink = self
            .sink
            .take()
            .ok_or(Error::InvalidState("archive already finished"))?;
        central::write_central_directory(&mut sink, &self.catalog.entries, &self.settings)?;
        let volumes = sink.finish()?;
        log::debug!(
            "finished archive with {} entries on {} volume(s)",
            self.catalog.entries.len(),
            volumes.len()
        );
        Ok(volumes)
    }
}
