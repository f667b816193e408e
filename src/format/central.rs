//! Central directory records: file headers, the archive extra data record
//! and the digital signature.

use std::io::{Read, Write};

use super::extra::ExtraFields;
use super::flags::GeneralPurposeFlag;
use super::zip64::Zip64Fields;
use super::{SENTINEL_16, SENTINEL_32, expect_signature, field_len, signature};
use crate::io::{ReadLeExt, WriteLeExt};
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

/// A central directory file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralFileHeader {
    /// Version made by (host system in the high byte).
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// General-purpose flag.
    pub flags: GeneralPurposeFlag,
    /// Compression method identifier.
    pub method: u16,
    /// Last modification time.
    pub modified: DosDateTime,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Compressed size or `0xFFFFFFFF`.
    pub compressed_size: u32,
    /// Uncompressed size or `0xFFFFFFFF`.
    pub uncompressed_size: u32,
    /// Disk the local header starts on, or `0xFFFF`.
    pub disk_start: u16,
    /// Internal attributes.
    pub internal_attributes: u16,
    /// External (host) attributes.
    pub external_attributes: u32,
    /// Offset of the local header on its disk, or `0xFFFFFFFF`.
    pub local_header_offset: u32,
    /// Raw name bytes.
    pub name: Vec<u8>,
    /// Extra fields.
    pub extra: ExtraFields,
    /// Raw comment bytes.
    pub comment: Vec<u8>,
}

impl CentralFileHeader {
    /// Length of the fixed part, signature included.
    pub const FIXED_LEN: u64 = 46;

    /// Reads a header at `offset` (used for error reporting).
    pub fn read<R: Read + ?Sized>(r: &mut R, offset: u64) -> Result<Self> {
        expect_signature(r, signature::CENTRAL_FILE_HEADER, offset)?;
        let version_made_by = r.read_word()?;
        let version_needed = r.read_word()?;
        let flags = GeneralPurposeFlag::from_bits(r.read_word()?);
        let method = r.read_word()?;
        let modified = DosDateTime::from_u32(r.read_dword()?);
        let crc32 = r.read_dword()?;
        let compressed_size = r.read_dword()?;
        let uncompressed_size = r.read_dword()?;
        let name_len = r.read_word()? as usize;
        let extra_len = r.read_word()? as usize;
        let comment_len = r.read_word()? as usize;
        let disk_start = r.read_word()?;
        let internal_attributes = r.read_word()?;
        let external_attributes = r.read_dword()?;
        let local_header_offset = r.read_dword()?;
        let name = r.read_vec(name_len)?;
        let extra_bytes = r.read_vec(extra_len)?;
        let comment = r.read_vec(comment_len)?;

        let extra = ExtraFields::parse(
            &extra_bytes,
            Zip64Fields::from_classic(
                uncompressed_size,
                compressed_size,
                Some(local_header_offset),
                Some(disk_start),
            ),
        )
        .map_err(|e| Error::corrupt_header(offset, e.to_string()))?;

        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            modified,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start,
            internal_attributes,
            external_attributes,
            local_header_offset,
            name,
            extra,
            comment,
        })
    }

    /// Serialized length.
    pub fn len(&self) -> u64 {
        Self::FIXED_LEN + (self.name.len() + self.extra.len() + self.comment.len()) as u64
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Writes the header.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let name_len = field_len("entry name", self.name.len())?;
        let comment_len = field_len("entry comment", self.comment.len())?;
        let extra = self.extra.to_bytes()?;
        w.write_dword(signature::CENTRAL_FILE_HEADER)?;
        w.write_word(self.version_made_by)?;
        w.write_word(self.version_needed)?;
        w.write_word(self.flags.bits())?;
        w.write_word(self.method)?;
        w.write_dword(self.modified.to_u32())?;
        w.write_dword(self.crc32)?;
        w.write_dword(self.compressed_size)?;
        w.write_dword(self.uncompressed_size)?;
        w.write_word(name_len)?;
        w.write_word(extra.len() as u16)?;
        w.write_word(comment_len)?;
        w.write_word(self.disk_start)?;
        w.write_word(self.internal_attributes)?;
        w.write_dword(self.external_attributes)?;
        w.write_dword(self.local_header_offset)?;
        w.write_all(&self.name)?;
        w.write_all(&extra)?;
        w.write_all(&self.comment)?;
        Ok(())
    }

    /// Uncompressed size with the ZIP64 override applied.
    pub fn resolved_uncompressed_size(&self) -> Result<u64> {
        resolve(
            self.uncompressed_size,
            self.extra.zip64().and_then(|z| z.uncompressed_size),
            "uncompressed size",
        )
    }

    /// Compressed size with the ZIP64 override applied.
    pub fn resolved_compressed_size(&self) -> Result<u64> {
        resolve(
            self.compressed_size,
            self.extra.zip64().and_then(|z| z.compressed_size),
            "compressed size",
        )
    }

    /// Local header offset with the ZIP64 override applied.
    pub fn resolved_local_header_offset(&self) -> Result<u64> {
        resolve(
            self.local_header_offset,
            self.extra.zip64().and_then(|z| z.local_header_offset),
            "local header offset",
        )
    }

    /// Starting disk with the ZIP64 override applied.
    pub fn resolved_disk_start(&self) -> Result<u32> {
        if self.disk_start != SENTINEL_16 {
            return Ok(self.disk_start as u32);
        }
        self.extra
            .zip64()
            .and_then(|z| z.disk_number)
            .ok_or_else(|| Error::InvalidFormat("disk number sentinel without ZIP64 value".into()))
    }
}

fn resolve(classic: u32, zip64: Option<u64>, what: &str) -> Result<u64> {
    if classic != SENTINEL_32 {
        return Ok(classic as u64);
    }
    zip64.ok_or_else(|| Error::InvalidFormat(format!("{} sentinel without ZIP64 value", what)))
}

/// Archive extra data record, present before an encrypted central directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveExtraData {
    /// Extra fields; carries the strong encryption record.
    pub extra: ExtraFields,
}

impl ArchiveExtraData {
    /// Reads the record, signature included.
    pub fn read<R: Read + ?Sized>(r: &mut R, offset: u64) -> Result<Self> {
        expect_signature(r, signature::ARCHIVE_EXTRA_DATA, offset)?;
        let len = r.read_dword()? as usize;
        let data = r.read_vec(len)?;
        Ok(Self {
            extra: ExtraFields::parse(&data, Zip64Fields::default())?,
        })
    }

    /// Serialized length.
    pub fn len(&self) -> u64 {
        8 + self.extra.len() as u64
    }

    /// Returns `true` if there are no extra fields.
    pub fn is_empty(&self) -> bool {
        self.extra.is_empty()
    }

    /// Writes the record.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let data = self.extra.to_bytes()?;
        w.write_dword(signature::ARCHIVE_EXTRA_DATA)?;
        w.write_dword(data.len() as u32)?;
        w.write_all(&data)?;
        Ok(())
    }
}

/// Skips a digital signature record; its contents are not verified.
///
/// Returns the number of bytes consumed, signature included.
pub fn skip_digital_signature<R: Read + ?Sized>(r: &mut R, offset: u64) -> Result<u64> {
    expect_signature(r, signature::DIGITAL_SIGNATURE, offset)?;
    let len = r.read_word()? as u64;
    let skipped = r.skip(len)?;
    if skipped != len {
        return Err(Error::corrupt_header(offset, "truncated digital signature"));
    }
    Ok(6 + len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::extra::ExtraField;
    use crate::format::zip64::Zip64ExtendedInfo;
    use std::io::Cursor;

    fn header() -> CentralFileHeader {
        CentralFileHeader {
            version_made_by: super::super::version::MADE_BY,
            version_needed: 20,
            flags: GeneralPurposeFlag::default(),
            method: 8,
            modified: DosDateTime::MIN,
            crc32: 1,
            compressed_size: 2,
            uncompressed_size: 3,
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: 0o100644 << 16,
            local_header_offset: 42,
            name: b"a.txt".to_vec(),
            extra: ExtraFields::new(),
            comment: b"note".to_vec(),
        }
    }

    #[test]
    fn test_round_trip() {
        let h = header();
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, h.len());
        assert_eq!(CentralFileHeader::read(&mut Cursor::new(buf), 0).unwrap(), h);
    }

    #[test]
    fn test_offset_only_zip64() {
        let mut h = header();
        h.local_header_offset = SENTINEL_32;
        h.extra.set(ExtraField::Zip64(Zip64ExtendedInfo {
            local_header_offset: Some(0x2_0000_0000),
            ..Default::default()
        }));
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        let back = CentralFileHeader::read(&mut Cursor::new(buf), 0).unwrap();
        assert_eq!(back.resolved_local_header_offset().unwrap(), 0x2_0000_0000);
        assert_eq!(back.resolved_uncompressed_size().unwrap(), 3);
    }

    #[test]
    fn test_sentinel_without_zip64_rejected() {
        let mut h = header();
        h.compressed_size = SENTINEL_32;
        assert!(h.resolved_compressed_size().is_err());
    }

    #[test]
    fn test_skip_digital_signature() {
        let mut buf = signature::DIGITAL_SIGNATURE.to_le_bytes().to_vec();
        buf.extend_from_slice(&3u16.to_le_bytes());
        buf.extend_from_slice(b"sig");
        assert_eq!(skip_digital_signature(&mut Cursor::new(buf), 0).unwrap(), 9);
    }
}
