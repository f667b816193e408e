//! ZIP64 records: the extended-information extra field, the end of central
//! directory record (with the version 2 extensible data sector) and its
//! locator.

use std::io::{Read, Write};

use super::{SENTINEL_16, SENTINEL_32, expect_signature, signature};
use crate::io::{ReadLeExt, WriteLeExt};
use crate::{Error, Result};

/// Which classic header fields sit at their sentinel and therefore expect a
/// value in the ZIP64 extended-information field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Fields {
    /// Uncompressed size is `0xFFFFFFFF`.
    pub uncompressed_size: bool,
    /// Compressed size is `0xFFFFFFFF`.
    pub compressed_size: bool,
    /// Local header offset is `0xFFFFFFFF`.
    pub local_header_offset: bool,
    /// Starting disk is `0xFFFF`.
    pub disk_number: bool,
}

impl Zip64Fields {
    /// Derives the expectation from raw classic values.
    pub fn from_classic(
        uncompressed: u32,
        compressed: u32,
        offset: Option<u32>,
        disk: Option<u16>,
    ) -> Self {
        Self {
            uncompressed_size: uncompressed == SENTINEL_32,
            compressed_size: compressed == SENTINEL_32,
            local_header_offset: offset == Some(SENTINEL_32),
            disk_number: disk == Some(SENTINEL_16),
        }
    }
}

/// Header ID 0x0001: 64-bit values of fields that overflowed.
///
/// Sub-fields appear in a fixed order (uncompressed size, compressed size,
/// local header offset, disk number) and only when the matching classic
/// field holds its sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64ExtendedInfo {
    /// Original size.
    pub uncompressed_size: Option<u64>,
    /// Size on disk, encryption headers included.
    pub compressed_size: Option<u64>,
    /// Offset of the local header on its disk.
    pub local_header_offset: Option<u64>,
    /// Disk the local header starts on.
    pub disk_number: Option<u32>,
}

impl Zip64ExtendedInfo {
    /// Header ID of the record.
    pub const HEADER_ID: u16 = 0x0001;

    /// Parses the record body.
    ///
    /// A sub-field is taken only when the classic field expects it and
    /// enough declared bytes remain, so which sub-fields are present is
    /// derived from the declared size. Trailing bytes are ignored.
    pub fn parse(data: &[u8], expect: Zip64Fields) -> Self {
        let mut rest = data;
        let mut take = |wanted: bool, width: usize| -> Option<u64> {
            if !wanted || rest.len() < width {
                return None;
            }
            let mut buf = [0u8; 8];
            buf[..width].copy_from_slice(&rest[..width]);
            rest = &rest[width..];
            Some(u64::from_le_bytes(buf))
        };
        let uncompressed_size = take(expect.uncompressed_size, 8);
        let compressed_size = take(expect.compressed_size, 8);
        let local_header_offset = take(expect.local_header_offset, 8);
        let disk_number = take(expect.disk_number, 4).map(|d| d as u32);
        Self {
            uncompressed_size,
            compressed_size,
            local_header_offset,
            disk_number,
        }
    }

    /// Returns `true` if no sub-field is present.
    pub fn is_empty(&self) -> bool {
        self.data_len() == 0
    }

    /// Length of the record body.
    pub fn data_len(&self) -> usize {
        [
            self.uncompressed_size.map(|_| 8),
            self.compressed_size.map(|_| 8),
            self.local_header_offset.map(|_| 8),
            self.disk_number.map(|_| 4),
        ]
        .into_iter()
        .flatten()
        .sum()
    }

    /// Serializes the record body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data_len());
        for value in [self.uncompressed_size, self.compressed_size, self.local_header_offset]
            .into_iter()
            .flatten()
        {
            out.extend_from_slice(&value.to_le_bytes());
        }
        if let Some(disk) = self.disk_number {
            out.extend_from_slice(&disk.to_le_bytes());
        }
        out
    }
}

/// ZIP64 end of central directory locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64Locator {
    /// Disk holding the ZIP64 end record.
    pub end_record_disk: u32,
    /// Offset of the ZIP64 end record on that disk.
    pub end_record_offset: u64,
    /// Total number of disks.
    pub total_disks: u32,
}

impl Zip64Locator {
    /// Record length including the signature.
    pub const LEN: u64 = 20;

    /// Reads the record, signature included.
    pub fn read<R: Read + ?Sized>(r: &mut R, offset: u64) -> Result<Self> {
        expect_signature(r, signature::ZIP64_LOCATOR, offset)?;
        Ok(Self {
            end_record_disk: r.read_dword()?,
            end_record_offset: r.read_qword()?,
            total_disks: r.read_dword()?,
        })
    }

    /// Writes the record.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_dword(signature::ZIP64_LOCATOR)?;
        w.write_dword(self.end_record_disk)?;
        w.write_qword(self.end_record_offset)?;
        w.write_dword(self.total_disks)?;
        Ok(())
    }
}

/// Version 2 extensible data sector: describes an encrypted and possibly
/// compressed central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensibleDataSector {
    /// Compression method of the central directory.
    pub method: u16,
    /// Size of the central directory as stored.
    pub compressed_size: u64,
    /// Size of the central directory before compression.
    pub uncompressed_size: u64,
    /// Encryption algorithm identifier.
    pub algorithm: u16,
    /// Key length in bits.
    pub bit_len: u16,
    /// Encryption flags.
    pub flags: u16,
    /// Hash algorithm identifier (0 for none).
    pub hash_algorithm: u16,
    /// Hash of the uncompressed central directory.
    pub hash_data: Vec<u8>,
}

impl ExtensibleDataSector {
    /// Fixed part of the sector, excluding the hash data.
    pub const FIXED_LEN: usize = 28;

    /// Hash algorithm identifier for SHA-1.
    pub const HASH_SHA1: u16 = 0x8004;

    /// Parses the sector; the byte count it consumes must equal `data.len()`.
    pub fn parse(data: &[u8], offset: u64) -> Result<Self> {
        if data.len() < Self::FIXED_LEN {
            return Err(Error::corrupt_header(
                offset,
                format!(
                    "extensible data sector is {} bytes, need at least {}",
                    data.len(),
                    Self::FIXED_LEN
                ),
            ));
        }
        let mut r = data;
        let method = r.read_word()?;
        let compressed_size = r.read_qword()?;
        let uncompressed_size = r.read_qword()?;
        let algorithm = r.read_word()?;
        let bit_len = r.read_word()?;
        let flags = r.read_word()?;
        let hash_algorithm = r.read_word()?;
        let hash_len = r.read_word()? as usize;
        if Self::FIXED_LEN + hash_len != data.len() {
            return Err(Error::corrupt_header(
                offset,
                format!(
                    "extensible data sector declares {} bytes but its fields span {}",
                    data.len(),
                    Self::FIXED_LEN + hash_len
                ),
            ));
        }
        Ok(Self {
            method,
            compressed_size,
            uncompressed_size,
            algorithm,
            bit_len,
            flags,
            hash_algorithm,
            hash_data: r.to_vec(),
        })
    }

    /// Serialized length.
    pub fn len(&self) -> usize {
        Self::FIXED_LEN + self.hash_data.len()
    }

    /// Always `false`; present for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_word(self.method)?;
        w.write_qword(self.compressed_size)?;
        w.write_qword(self.uncompressed_size)?;
        w.write_word(self.algorithm)?;
        w.write_word(self.bit_len)?;
        w.write_word(self.flags)?;
        w.write_word(self.hash_algorithm)?;
        w.write_word(super::field_len("central directory hash", self.hash_data.len())?)?;
        w.write_all(&self.hash_data)?;
        Ok(())
    }
}

/// ZIP64 end of central directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory {
    /// Version made by.
    pub version_made_by: u16,
    /// Version needed to extract; 62 or more marks a version 2 record.
    pub version_needed: u16,
    /// Number of this disk.
    pub disk_number: u32,
    /// Disk where the central directory starts.
    pub central_directory_disk: u32,
    /// Central directory entries on this disk.
    pub entries_on_disk: u64,
    /// Total central directory entries.
    pub total_entries: u64,
    /// Size of the central directory as stored.
    pub central_directory_size: u64,
    /// Offset of the central directory on its starting disk.
    pub central_directory_offset: u64,
    /// Version 2 sector, present when the central directory is encrypted.
    pub data_sector: Option<ExtensibleDataSector>,
    /// Version 1 extensible data, kept opaque.
    pub extensible_data: Vec<u8>,
}

impl Zip64EndOfCentralDirectory {
    /// Fixed length after the signature and size field.
    const FIXED_LEN: u64 = 44;

    /// Reads the record, signature included.
    pub fn read<R: Read + ?Sized>(r: &mut R, offset: u64) -> Result<Self> {
        expect_signature(r, signature::ZIP64_END_OF_CENTRAL_DIRECTORY, offset)?;
        let record_size = r.read_qword()?;
        if record_size < Self::FIXED_LEN {
            return Err(Error::corrupt_header(
                offset,
                format!("ZIP64 end record size {} is below {}", record_size, Self::FIXED_LEN),
            ));
        }
        let version_made_by = r.read_word()?;
        let version_needed = r.read_word()?;
        let disk_number = r.read_dword()?;
        let central_directory_disk = r.read_dword()?;
        let entries_on_disk = r.read_qword()?;
        let total_entries = r.read_qword()?;
        let central_directory_size = r.read_qword()?;
        let central_directory_offset = r.read_qword()?;

        let extra_len = usize::try_from(record_size - Self::FIXED_LEN)
            .map_err(|_| Error::corrupt_header(offset, "ZIP64 end record size overflows"))?;
        let extra = r.read_up_to(extra_len)?;
        if extra.len() != extra_len {
            return Err(Error::corrupt_header(offset, "truncated ZIP64 end record"));
        }

        let encrypted_directory =
            version_needed & 0xff >= super::version::CENTRAL_DIRECTORY_ENCRYPTION;
        let (data_sector, extensible_data) = if encrypted_directory && !extra.is_empty() {
            (Some(ExtensibleDataSector::parse(&extra, offset + 56)?), Vec::new())
        } else {
            (None, extra)
        };

        Ok(Self {
            version_made_by,
            version_needed,
            disk_number,
            central_directory_disk,
            entries_on_disk,
            total_entries,
            central_directory_size,
            central_directory_offset,
            data_sector,
            extensible_data,
        })
    }

    /// Serialized length including the signature.
    pub fn len(&self) -> u64 {
        let extra = match &self.data_sector {
            Some(sector) => sector.len(),
            None => self.extensible_data.len(),
        };
        12 + Self::FIXED_LEN + extra as u64
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Writes the record.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_dword(signature::ZIP64_END_OF_CENTRAL_DIRECTORY)?;
        w.write_qword(self.len() - 12)?;
        w.write_word(self.version_made_by)?;
        w.write_word(self.version_needed)?;
        w.write_dword(self.disk_number)?;
        w.write_dword(self.central_directory_disk)?;
        w.write_qword(self.entries_on_disk)?;
        w.write_qword(self.total_entries)?;
        w.write_qword(self.central_directory_size)?;
        w.write_qword(self.central_directory_offset)?;
        match &self.data_sector {
            Some(sector) => sector.write(w)?,
            None => w.write_all(&self.extensible_data)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_extended_info_presence_follows_sentinels() {
        let info = Zip64ExtendedInfo {
            uncompressed_size: None,
            compressed_size: None,
            local_header_offset: Some(0x1_0000_0000),
            disk_number: None,
        };
        let bytes = info.to_bytes();
        assert_eq!(bytes.len(), 8);

        let expect = Zip64Fields::from_classic(10, 10, Some(SENTINEL_32), Some(0));
        assert_eq!(Zip64ExtendedInfo::parse(&bytes, expect), info);
    }

    #[test]
    fn test_extended_info_short_record() {
        // Only the uncompressed size made it into the record even though
        // both sizes are at their sentinel.
        let bytes = 0x1_2345_6789u64.to_le_bytes();
        let expect = Zip64Fields::from_classic(SENTINEL_32, SENTINEL_32, None, None);
        let info = Zip64ExtendedInfo::parse(&bytes, expect);
        assert_eq!(info.uncompressed_size, Some(0x1_2345_6789));
        assert_eq!(info.compressed_size, None);
    }

    #[test]
    fn test_locator_round_trip() {
        let locator = Zip64Locator {
            end_record_disk: 3,
            end_record_offset: 0xdead_beef,
            total_disks: 4,
        };
        let mut buf = Vec::new();
        locator.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, Zip64Locator::LEN);
        assert_eq!(Zip64Locator::read(&mut Cursor::new(buf), 0).unwrap(), locator);
    }

    fn end_record(sector: Option<ExtensibleDataSector>) -> Zip64EndOfCentralDirectory {
        Zip64EndOfCentralDirectory {
            version_made_by: 63,
            version_needed: if sector.is_some() { 62 } else { 45 },
            disk_number: 0,
            central_directory_disk: 0,
            entries_on_disk: 2,
            total_entries: 2,
            central_directory_size: 100,
            central_directory_offset: 200,
            data_sector: sector,
            extensible_data: Vec::new(),
        }
    }

    #[test]
    fn test_version2_record_with_sector() {
        let sector = ExtensibleDataSector {
            method: 8,
            compressed_size: 90,
            uncompressed_size: 120,
            algorithm: 0x6610,
            bit_len: 256,
            flags: 1,
            hash_algorithm: ExtensibleDataSector::HASH_SHA1,
            hash_data: vec![0xaa; 20],
        };
        let record = end_record(Some(sector));
        let mut buf = Vec::new();
        record.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, record.len());
        assert_eq!(Zip64EndOfCentralDirectory::read(&mut Cursor::new(buf), 0).unwrap(), record);
    }

    #[test]
    fn test_sector_size_disagreement_is_fatal() {
        let sector = ExtensibleDataSector {
            method: 0,
            compressed_size: 1,
            uncompressed_size: 1,
            algorithm: 0x660E,
            bit_len: 128,
            flags: 1,
            hash_algorithm: 0,
            hash_data: vec![1, 2, 3, 4],
        };
        let mut buf = Vec::new();
        end_record(Some(sector)).write(&mut buf).unwrap();
        // Claim a hash two bytes longer than what the record holds.
        let hash_len_at = 56 + 26;
        buf[hash_len_at] = 6;
        let err = Zip64EndOfCentralDirectory::read(&mut Cursor::new(buf), 0).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { .. }));
    }
}
