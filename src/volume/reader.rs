//! Split archive reader.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::config::volume_path;
use crate::format::signature;
use crate::io::ReadLeExt;
use crate::{Error, Result};

/// One volume file of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    /// 0-based disk number.
    pub number: u32,
    /// Path of the volume file.
    pub path: PathBuf,
    /// Size of the volume in bytes.
    pub size: u64,
    /// Whether this is the last disk (the one holding the end record).
    pub last: bool,
}

/// The set of volume files that make up one logical archive.
///
/// Disks are numbered contiguously from 0 and exactly one, the last, is
/// flagged as such.
#[derive(Debug, Clone)]
pub struct SrcZip {
    disks: Vec<Disk>,
}

impl SrcZip {
    /// Discovers the volumes belonging to the archive at `path`.
    ///
    /// `path` names the last volume (`name.zip`); numbered siblings
    /// `name.z01`, `name.z02`, ... are picked up in order until one is
    /// missing. For a split archive disk 0 must begin with the split marker.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `path` cannot be read, or
    /// [`Error::VolumeCorrupted`] if disk 0 lacks the split marker.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut disks = Vec::new();

        loop {
            let number = disks.len() as u32;
            let candidate = volume_path(path, number);
            if candidate == path {
                break;
            }
            match std::fs::metadata(&candidate) {
                Ok(meta) if meta.is_file() => disks.push(Disk {
                    number,
                    path: candidate,
                    size: meta.len(),
                    last: false,
                }),
                _ => break,
            }
        }

        let meta = std::fs::metadata(path)?;
        disks.push(Disk {
            number: disks.len() as u32,
            path: path.to_path_buf(),
            size: meta.len(),
            last: true,
        });

        let src = Self { disks };
        if src.is_split() {
            src.verify_split_marker()?;
            log::debug!(
                "opened split archive {} with {} disks",
                path.display(),
                src.disk_count()
            );
        }
        Ok(src)
    }

    fn verify_split_marker(&self) -> Result<()> {
        let first = &self.disks[0];
        let mut file = File::open(&first.path).map_err(|source| Error::VolumeMissing {
            volume: 0,
            path: first.path.display().to_string(),
            source,
        })?;
        let marker = file.read_dword().map_err(|_| Error::VolumeCorrupted {
            volume: 0,
            details: "volume too short for split marker".into(),
        })?;
        if marker != signature::SPLIT_MARKER {
            return Err(Error::VolumeCorrupted {
                volume: 0,
                details: format!(
                    "expected split marker {:#010x}, found {:#010x}",
                    signature::SPLIT_MARKER,
                    marker
                ),
            });
        }
        Ok(())
    }

    /// Checks the disk count against the one declared by the end record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VolumeMissing`] naming the first absent volume.
    pub fn expect_disks(&self, declared: u32) -> Result<()> {
        let found = self.disk_count();
        if declared > found {
            // Missing volumes are always the numbered ones before the last.
            let missing = found - 1;
            let path = volume_path(&self.last().path, missing);
            return Err(Error::VolumeMissing {
                volume: missing,
                path: path.display().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "volume file not found"),
            });
        }
        if declared < found {
            log::warn!(
                "archive declares {} disks but {} volume files were found; ignoring extras",
                declared,
                found
            );
        }
        Ok(())
    }

    /// Returns all disks in order.
    pub fn disks(&self) -> &[Disk] {
        &self.disks
    }

    /// Returns a disk by number.
    pub fn disk(&self, number: u32) -> Result<&Disk> {
        self.disks
            .get(number as usize)
            .ok_or_else(|| Error::VolumeMissing {
                volume: number,
                path: volume_path(&self.last().path, number).display().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "disk number out of range"),
            })
    }

    /// Returns the last disk.
    pub fn last(&self) -> &Disk {
        // Never empty: `open` always pushes the archive itself.
        &self.disks[self.disks.len() - 1]
    }

    /// Number of disks.
    pub fn disk_count(&self) -> u32 {
        self.disks.len() as u32
    }

    /// Returns `true` for archives of more than one volume.
    pub fn is_split(&self) -> bool {
        self.disks.len() > 1
    }

    /// Maps a disk-relative offset to an offset in the concatenated stream.
    pub fn global_offset(&self, disk: u32, offset: u64) -> Result<u64> {
        let before: u64 = self.disks[..self.disk(disk)?.number as usize]
            .iter()
            .map(|d| d.size)
            .sum();
        Ok(before + offset)
    }

    /// Total size of all volumes.
    pub fn total_size(&self) -> u64 {
        self.disks.iter().map(|d| d.size).sum()
    }

    /// All volume paths in disk order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.disks.iter().map(|d| d.path.clone()).collect()
    }
}

/// Random-access reader over all volumes of an archive.
///
/// Reads continue into the next volume when the current one is exhausted
/// and stop only at the end of the last disk. Each reader opens its own
/// file handles, so independent readers can be used from different threads.
pub struct SplitReader {
    src: SrcZip,
    current: Option<BufReader<File>>,
    disk: u32,
    offset: u64,
}

impl std::fmt::Debug for SplitReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitReader")
            .field("disk", &self.disk)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl SplitReader {
    /// Creates a reader positioned at the start of disk 0.
    pub fn new(src: &SrcZip) -> Self {
        Self {
            src: src.clone(),
            current: None,
            disk: 0,
            offset: 0,
        }
    }

    /// Positions the reader at `offset` within `disk`.
    pub fn seek_disk(&mut self, disk: u32, offset: u64) -> Result<()> {
        let size = self.src.disk(disk)?.size;
        if offset > size {
            return Err(Error::VolumeCorrupted {
                volume: disk,
                details: format!("offset {} beyond volume size {}", offset, size),
            });
        }
        if self.disk != disk {
            self.current = None;
            self.disk = disk;
            self.offset = 0;
        }
        self.file()?.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }

    /// Current (disk, offset) position.
    pub fn position(&self) -> (u32, u64) {
        (self.disk, self.offset)
    }

    /// Returns the volumes this reader spans.
    pub fn src(&self) -> &SrcZip {
        &self.src
    }

    fn file(&mut self) -> io::Result<&mut BufReader<File>> {
        if self.current.is_none() {
            let disk = self.src.disk(self.disk).map_err(io::Error::from)?;
            let file = File::open(&disk.path).map_err(|source| {
                io::Error::from(Error::VolumeMissing {
                    volume: disk.number,
                    path: disk.path.display().to_string(),
                    source,
                })
            })?;
            let mut reader = BufReader::new(file);
            if self.offset != 0 {
                reader.seek(SeekFrom::Start(self.offset))?;
            }
            self.current = Some(reader);
        }
        self.current
            .as_mut()
            .ok_or_else(|| io::Error::other("volume handle unavailable"))
    }
}

impl Read for SplitReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.file()?.read(buf)?;
            if n > 0 {
                self.offset += n as u64;
                return Ok(n);
            }
            if self.disk + 1 >= self.src.disk_count() {
                return Ok(0);
            }
            self.disk += 1;
            self.offset = 0;
            self.current = None;
            log::debug!("crossing into disk {}", self.disk);
        }
    }
}

impl Seek for SplitReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let current = self
            .src
            .global_offset(self.disk, self.offset)
            .map_err(io::Error::from)?;
        let total = self.src.total_size();
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(n) => total as i128 + n as i128,
            SeekFrom::Current(n) => current as i128 + n as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of archive",
            ));
        }
        let mut remaining = target as u64;
        for disk in self.src.disks.clone() {
            if remaining < disk.size || disk.last {
                let offset = remaining.min(disk.size);
                self.seek_disk(disk.number, offset).map_err(io::Error::from)?;
                return self
                    .src
                    .global_offset(disk.number, offset)
                    .map_err(io::Error::from);
            }
            remaining -= disk.size;
        }
        Err(io::Error::other("archive has no volumes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_split(dir: &TempDir) -> PathBuf {
        let last = dir.path().join("a.zip");
        let mut first = signature::SPLIT_MARKER.to_le_bytes().to_vec();
        first.extend_from_slice(b"0123");
        fs::write(dir.path().join("a.z01"), &first).unwrap();
        fs::write(dir.path().join("a.z02"), b"4567").unwrap();
        fs::write(&last, b"89").unwrap();
        last
    }

    #[test]
    fn test_discovers_volumes() {
        let dir = TempDir::new().unwrap();
        let last = write_split(&dir);
        let src = SrcZip::open(&last).unwrap();
        assert_eq!(src.disk_count(), 3);
        assert!(src.is_split());
        assert!(src.last().last);
        assert!(!src.disks()[0].last);
        assert_eq!(src.global_offset(2, 1).unwrap(), 8 + 4 + 1);
    }

    #[test]
    fn test_reads_across_volumes() {
        let dir = TempDir::new().unwrap();
        let src = SrcZip::open(write_split(&dir)).unwrap();
        let mut reader = SplitReader::new(&src);
        reader.seek_disk(0, 4).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "0123456789");
        assert_eq!(reader.position(), (2, 2));
    }

    #[test]
    fn test_seek_global() {
        let dir = TempDir::new().unwrap();
        let src = SrcZip::open(write_split(&dir)).unwrap();
        let mut reader = SplitReader::new(&src);
        reader.seek(SeekFrom::End(-3)).unwrap();
        assert_eq!(reader.position(), (1, 3));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"789");
    }

    #[test]
    fn test_missing_marker_is_corruption() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.z01"), b"nope").unwrap();
        fs::write(dir.path().join("b.zip"), b"x").unwrap();
        let err = SrcZip::open(dir.path().join("b.zip")).unwrap_err();
        assert!(matches!(err, Error::VolumeCorrupted { volume: 0, .. }));
    }

    #[test]
    fn test_declared_disk_missing() {
        let dir = TempDir::new().unwrap();
        let last = write_split(&dir);
        fs::remove_file(dir.path().join("a.z02")).unwrap();
        let src = SrcZip::open(&last).unwrap();
        assert_eq!(src.disk_count(), 2);
        let err = src.expect_disks(3).unwrap_err();
        assert!(matches!(err, Error::VolumeMissing { volume: 1, .. }));
    }

    #[test]
    fn test_single_file_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.zip");
        fs::write(&path, b"PK").unwrap();
        let src = SrcZip::open(&path).unwrap();
        assert!(!src.is_split());
        assert_eq!(src.disk_count(), 1);
    }
}
