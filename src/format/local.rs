//! Local file header.

use std::io::{Read, Write};

use super::extra::ExtraFields;
use super::flags::GeneralPurposeFlag;
use super::zip64::Zip64Fields;
use super::{SENTINEL_32, expect_signature, field_len, signature};
use crate::io::{ReadLeExt, WriteLeExt};
use crate::timestamp::DosDateTime;
use crate::Result;

/// The header written immediately before each entry's payload.
///
/// When a data descriptor follows the payload the CRC and size fields may
/// be zero; when sizes overflow they hold `0xFFFFFFFF` and the ZIP64 extra
/// field carries both sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Version needed to extract.
    pub version_needed: u16,
    /// General-purpose flag.
    pub flags: GeneralPurposeFlag,
    /// Compression method identifier (99 for WinZip AES).
    pub method: u16,
    /// Last modification time.
    pub modified: DosDateTime,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Compressed size, encryption overhead included.
    pub compressed_size: u32,
    /// Uncompressed size.
    pub uncompressed_size: u32,
    /// Raw name bytes.
    pub name: Vec<u8>,
    /// Extra fields.
    pub extra: ExtraFields,
}

impl LocalFileHeader {
    /// Length of the fixed part, signature included.
    pub const FIXED_LEN: u64 = 30;

    /// Reads a header at `offset` (used for error reporting).
    pub fn read<R: Read + ?Sized>(r: &mut R, offset: u64) -> Result<Self> {
        expect_signature(r, signature::LOCAL_FILE_HEADER, offset)?;
        let version_needed = r.read_word()?;
        let flags = GeneralPurposeFlag::from_bits(r.read_word()?);
        let method = r.read_word()?;
        let modified = DosDateTime::from_u32(r.read_dword()?);
        let crc32 = r.read_dword()?;
        let compressed_size = r.read_dword()?;
        let uncompressed_size = r.read_dword()?;
        let name_len = r.read_word()? as usize;
        let extra_len = r.read_word()? as usize;
        let name = r.read_vec(name_len)?;
        let extra_bytes = r.read_vec(extra_len)?;
        let extra = ExtraFields::parse(
            &extra_bytes,
            Zip64Fields::from_classic(uncompressed_size, compressed_size, None, None),
        )?;
        Ok(Self {
            version_needed,
            flags,
            method,
            modified,
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            extra,
        })
    }

    /// Serialized length.
    pub fn len(&self) -> u64 {
        Self::FIXED_LEN + self.name.len() as u64 + self.extra.len() as u64
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Writes the header.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let name_len = field_len("entry name", self.name.len())?;
        let extra = self.extra.to_bytes()?;
        w.write_dword(signature::LOCAL_FILE_HEADER)?;
        w.write_word(self.version_needed)?;
        w.write_word(self.flags.bits())?;
        w.write_word(self.method)?;
        w.write_dword(self.modified.to_u32())?;
        w.write_dword(self.crc32)?;
        w.write_dword(self.compressed_size)?;
        w.write_dword(self.uncompressed_size)?;
        w.write_word(name_len)?;
        w.write_word(extra.len() as u16)?;
        w.write_all(&self.name)?;
        w.write_all(&extra)?;
        Ok(())
    }

    /// Compressed size with the ZIP64 override applied.
    pub fn resolved_compressed_size(&self) -> u64 {
        match self.extra.zip64().and_then(|z| z.compressed_size) {
            Some(size) if self.compressed_size == SENTINEL_32 => size,
            _ => self.compressed_size as u64,
        }
    }

    /// Uncompressed size with the ZIP64 override applied.
    pub fn resolved_uncompressed_size(&self) -> u64 {
        match self.extra.zip64().and_then(|z| z.uncompressed_size) {
            Some(size) if self.uncompressed_size == SENTINEL_32 => size,
            _ => self.uncompressed_size as u64,
        }
    }
}
