//! Finding the end records from the back of the last volume.

use crate::format::end::EndOfCentralDirectory;
use crate::format::signature;
use crate::format::zip64::{Zip64EndOfCentralDirectory, Zip64Locator};
use crate::io::ReadLeExt;
use crate::volume::{SplitReader, SrcZip};
use crate::{Error, Result};

/// The end of central directory record and its ZIP64 counterpart.
#[derive(Debug, Clone)]
pub(crate) struct EndRecords {
    pub(crate) eocd: EndOfCentralDirectory,
    pub(crate) zip64: Option<Zip64EndOfCentralDirectory>,
}

impl EndRecords {
    /// Disk the central directory starts on.
    pub(crate) fn directory_disk(&self) -> u32 {
        match &self.zip64 {
            Some(z) => z.central_directory_disk,
            None => self.eocd.central_directory_disk as u32,
        }
    }

    /// Offset of the central directory on its disk.
    pub(crate) fn directory_offset(&self) -> u64 {
        match &self.zip64 {
            Some(z) => z.central_directory_offset,
            None => self.eocd.central_directory_offset as u64,
        }
    }

    /// Stored size of the central directory.
    pub(crate) fn directory_size(&self) -> u64 {
        match &self.zip64 {
            Some(z) => z.central_directory_size,
            None => self.eocd.central_directory_size as u64,
        }
    }

    /// Declared total entry count.
    pub(crate) fn total_entries(&self) -> u64 {
        match &self.zip64 {
            Some(z) => z.total_entries,
            None => self.eocd.total_entries as u64,
        }
    }
}

/// Reads the end records of `src`.
///
/// The end of central directory record is found by scanning the tail of
/// the last volume backwards for its signature; the comment length must
/// fit in what remains of the file. A ZIP64 locator directly in front of it
/// leads to the ZIP64 end record.
pub(crate) fn locate(src: &SrcZip) -> Result<EndRecords> {
    let last = src.last();
    let tail_len = last.size.min(EndOfCentralDirectory::MAX_LEN);
    let tail_start = last.size - tail_len;

    let mut reader = SplitReader::new(src);
    reader.seek_disk(last.number, tail_start)?;
    let tail = reader.read_vec(tail_len as usize)?;

    let pos = find_end_record(&tail).ok_or_else(|| {
        Error::InvalidFormat(format!(
            "end of central directory record not found in the last {} bytes of {}",
            tail_len,
            last.path.display()
        ))
    })?;
    let eocd_offset = tail_start + pos as u64;
    log::trace!("end of central directory at disk {} offset {}", last.number, eocd_offset);
    let eocd = EndOfCentralDirectory::read(&mut &tail[pos..], eocd_offset)?;

    let zip64 = match locator_before(&tail, pos, tail_start)? {
        Some(locator) => {
            log::trace!(
                "ZIP64 locator points at disk {} offset {}",
                locator.end_record_disk,
                locator.end_record_offset
            );
            src.expect_disks(locator.total_disks)?;
            reader.seek_disk(locator.end_record_disk, locator.end_record_offset)?;
            Some(Zip64EndOfCentralDirectory::read(&mut reader, locator.end_record_offset)?)
        }
        None => {
            if eocd.has_sentinel() {
                log::warn!("end record holds sentinel values but no ZIP64 locator precedes it");
            }
            src.expect_disks(eocd.disk_number as u32 + 1)?;
            None
        }
    };

    Ok(EndRecords { eocd, zip64 })
}

fn find_end_record(tail: &[u8]) -> Option<usize> {
    let fixed = EndOfCentralDirectory::FIXED_LEN as usize;
    if tail.len() < fixed {
        return None;
    }
    let sig = signature::END_OF_CENTRAL_DIRECTORY.to_le_bytes();
    (0..=tail.len() - fixed).rev().find(|&pos| {
        tail[pos..pos + 4] == sig && {
            let comment_len = u16::from_le_bytes([tail[pos + 20], tail[pos + 21]]) as usize;
            pos + fixed + comment_len <= tail.len()
        }
    })
}

fn locator_before(tail: &[u8], eocd_pos: usize, tail_start: u64) -> Result<Option<Zip64Locator>> {
    let len = Zip64Locator::LEN as usize;
    if eocd_pos < len {
        return Ok(None);
    }
    let at = eocd_pos - len;
    if tail[at..at + 4] != signature::ZIP64_LOCATOR.to_le_bytes() {
        return Ok(None);
    }
    Zip64Locator::read(&mut &tail[at..], tail_start + at as u64).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eocd(comment: &[u8]) -> Vec<u8> {
        let record = EndOfCentralDirectory {
            comment: comment.to_vec(),
            ..Default::default()
        };
        let mut out = Vec::new();
        record.write(&mut out).unwrap();
        out
    }

    #[test]
    fn test_find_with_comment() {
        let mut data = vec![0u8; 100];
        data.extend(eocd(b"a comment"));
        assert_eq!(find_end_record(&data), Some(100));
    }

    #[test]
    fn test_signature_inside_comment_is_skipped() {
        // A fake record inside the comment would claim a comment running
        // past the end of the file.
        let mut fake = signature::END_OF_CENTRAL_DIRECTORY.to_le_bytes().to_vec();
        fake.extend_from_slice(&[0u8; 16]);
        fake.extend_from_slice(&500u16.to_le_bytes());
        let data = eocd(&fake);
        assert_eq!(find_end_record(&data), Some(0));
    }

    #[test]
    fn test_missing_record() {
        assert_eq!(find_end_record(&[0u8; 10]), None);
        assert_eq!(find_end_record(&[0u8; 100]), None);
    }
}
