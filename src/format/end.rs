//! End of central directory record.

use std::io::{Read, Write};

use super::{SENTINEL_16, SENTINEL_32, expect_signature, field_len, signature};
use crate::io::{ReadLeExt, WriteLeExt};
use crate::{Error, Result};

/// The classic end of central directory record.
///
/// Any field may hold its sentinel, in which case the ZIP64 end record is
/// authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndOfCentralDirectory {
    /// Number of this (the last) disk.
    pub disk_number: u16,
    /// Disk where the central directory starts.
    pub central_directory_disk: u16,
    /// Central directory entries on this disk.
    pub entries_on_disk: u16,
    /// Total central directory entries.
    pub total_entries: u16,
    /// Size of the central directory.
    pub central_directory_size: u32,
    /// Offset of the central directory on its starting disk.
    pub central_directory_offset: u32,
    /// Raw archive comment.
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// Length of the fixed part, signature included.
    pub const FIXED_LEN: u64 = 22;

    /// Longest possible record: the fixed part plus a maximal comment.
    pub const MAX_LEN: u64 = Self::FIXED_LEN + u16::MAX as u64;

    /// Reads the record, signature included.
    pub fn read<R: Read + ?Sized>(r: &mut R, offset: u64) -> Result<Self> {
        expect_signature(r, signature::END_OF_CENTRAL_DIRECTORY, offset)?;
        let disk_number = r.read_word()?;
        let central_directory_disk = r.read_word()?;
        let entries_on_disk = r.read_word()?;
        let total_entries = r.read_word()?;
        let central_directory_size = r.read_dword()?;
        let central_directory_offset = r.read_dword()?;
        let comment_len = r.read_word()? as usize;
        let comment = r.read_up_to(comment_len)?;
        if comment.len() != comment_len {
            return Err(Error::corrupt_header(offset, "archive comment runs past end of file"));
        }
        Ok(Self {
            disk_number,
            central_directory_disk,
            entries_on_disk,
            total_entries,
            central_directory_size,
            central_directory_offset,
            comment,
        })
    }

    /// Serialized length.
    pub fn len(&self) -> u64 {
        Self::FIXED_LEN + self.comment.len() as u64
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Writes the record.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let comment_len = field_len("archive comment", self.comment.len())?;
        w.write_dword(signature::END_OF_CENTRAL_DIRECTORY)?;
        w.write_word(self.disk_number)?;
        w.write_word(self.central_directory_disk)?;
        w.write_word(self.entries_on_disk)?;
        w.write_word(self.total_entries)?;
        w.write_dword(self.central_directory_size)?;
        w.write_dword(self.central_directory_offset)?;
        w.write_word(comment_len)?;
        w.write_all(&self.comment)?;
        Ok(())
    }

    /// Returns `true` if any field holds its sentinel, meaning a ZIP64 end
    /// record must be consulted.
    pub fn has_sentinel(&self) -> bool {
        self.disk_number == SENTINEL_16
            || self.central_directory_disk == SENTINEL_16
            || self.entries_on_disk == SENTINEL_16
            || self.total_entries == SENTINEL_16
            || self.central_directory_size == SENTINEL_32
            || self.central_directory_offset == SENTINEL_32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_round_trip_with_comment() {
        let end = EndOfCentralDirectory {
            disk_number: 2,
            central_directory_disk: 2,
            entries_on_disk: 5,
            total_entries: 5,
            central_directory_size: 300,
            central_directory_offset: 12,
            comment: b"made by tests".to_vec(),
        };
        let mut buf = Vec::new();
        end.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, end.len());
        assert!(!end.has_sentinel());
        assert_eq!(EndOfCentralDirectory::read(&mut Cursor::new(buf), 0).unwrap(), end);
    }

    #[test]
    fn test_truncated_comment() {
        let end = EndOfCentralDirectory {
            comment: b"abcdef".to_vec(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        end.write(&mut buf).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            EndOfCentralDirectory::read(&mut Cursor::new(buf), 0),
            Err(Error::CorruptHeader { .. })
        ));
    }
}
