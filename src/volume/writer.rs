//! Split archive writer.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::SplitConfig;
use crate::format::signature;
use crate::io::{DataSink, SinkPosition};
use crate::{Error, Result};

/// A sink that spreads the archive over numbered volume files.
///
/// The volume being written always lives at the archive path. When it is
/// full it is closed and renamed to its numbered name (`.z01`, `.z02`, ...)
/// and a fresh file is created at the archive path, so the last volume
/// ends up with the archive's own name. Disk 0 starts with the split
/// marker signature.
///
/// If the writer is dropped before [`finish`](Self::finish), every volume
/// it created is removed.
///
/// ```rust,no_run
/// use std::io::Write;
/// use zipspan::volume::{SplitConfig, SplitWriter};
///
/// # fn main() -> zipspan::Result<()> {
/// let config = SplitConfig::new("archive.zip", 1024 * 1024)?;
/// let mut writer = SplitWriter::create(config)?;
/// writer.write_all(&vec![0u8; 3 * 1024 * 1024])?;
/// let volumes = writer.finish()?;
/// assert_eq!(volumes.len(), 4);
/// # Ok(())
/// # }
/// ```
pub struct SplitWriter {
    config: SplitConfig,
    current: Option<BufWriter<File>>,
    disk: u32,
    disk_written: u64,
    total_written: u64,
    closed_volumes: Vec<PathBuf>,
    finished: bool,
}

impl std::fmt::Debug for SplitWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitWriter")
            .field("archive_path", &self.config.archive_path())
            .field("disk", &self.disk)
            .field("disk_written", &self.disk_written)
            .finish_non_exhaustive()
    }
}

impl SplitWriter {
    /// Creates the first volume and writes the split marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the first volume file cannot be created.
    pub fn create(config: SplitConfig) -> Result<Self> {
        let file = create_volume(config.archive_path())?;
        let mut writer = Self {
            config,
            current: Some(BufWriter::new(file)),
            disk: 0,
            disk_written: 0,
            total_written: 0,
            closed_volumes: Vec::new(),
            finished: false,
        };
        writer.write_all(&signature::SPLIT_MARKER.to_le_bytes())?;
        Ok(writer)
    }

    /// Closes the current volume under its numbered name and opens the next.
    ///
    /// A failed rename aborts before the next volume is created.
    fn start_next_volume(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.current.take() {
            file.flush()?;
        }

        let from = self.config.archive_path().to_path_buf();
        let to = self.config.volume_path(self.disk);
        fs::rename(&from, &to).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "failed to rename volume {} to {}: {}",
                    from.display(),
                    to.display(),
                    e
                ),
            )
        })?;
        self.closed_volumes.push(to);

        self.disk += 1;
        self.disk_written = 0;
        let file = create_volume(&from).map_err(io::Error::from)?;
        self.current = Some(BufWriter::new(file));

        log::debug!(
            "split archive {}: started disk {}",
            from.display(),
            self.disk
        );
        Ok(())
    }

    /// Returns the remaining space in the current volume.
    pub fn remaining_in_volume(&self) -> u64 {
        self.config.split_size().saturating_sub(self.disk_written)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Flushes and closes the last volume.
    ///
    /// # Returns
    ///
    /// The paths of all volumes in disk order; the last one is the archive
    /// path.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        if let Some(mut file) = self.current.take() {
            file.flush()?;
            file.get_ref().sync_all()?;
        }
        self.finished = true;
        let mut volumes = std::mem::take(&mut self.closed_volumes);
        volumes.push(self.config.archive_path().to_path_buf());
        Ok(volumes)
    }

    fn current_file(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.current
            .as_mut()
            .ok_or_else(|| io::Error::other("split writer already closed"))
    }
}

fn create_volume(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| {
        Error::Io(io::Error::new(
            e.kind(),
            format!("failed to create volume {}: {}", path.display(), e),
        ))
    })
}

impl Write for SplitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining_in_volume() == 0 {
            self.start_next_volume()?;
        }

        let to_write = (buf.len() as u64).min(self.remaining_in_volume()) as usize;
        let n = self.current_file()?.write(&buf[..to_write])?;
        self.disk_written += n as u64;
        self.total_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl DataSink for SplitWriter {
    fn position(&self) -> SinkPosition {
        SinkPosition {
            disk: self.disk,
            offset: self.disk_written,
        }
    }

    fn total_written(&self) -> u64 {
        self.total_written
    }

    fn reserve_contiguous(&mut self, len: u64) -> io::Result<()> {
        // A record longer than a whole volume cannot be kept together; only
        // its signature is protected then.
        let len = if len > self.config.split_size() { 4 } else { len };
        if self.remaining_in_volume() < len {
            log::trace!(
                "deferring {} bytes to the next volume ({} left on disk {})",
                len,
                self.remaining_in_volume(),
                self.disk
            );
            self.start_next_volume()?;
        }
        Ok(())
    }

    fn is_split(&self) -> bool {
        true
    }
}

impl Drop for SplitWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.current.take();
        let mut created = std::mem::take(&mut self.closed_volumes);
        created.push(self.config.archive_path().to_path_buf());
        for path in &created {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("failed to remove unfinished volume {}: {}", path.display(), e);
                }
            }
        }
    }
}
