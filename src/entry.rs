//! Archive entry metadata.

use std::time::SystemTime;

use crate::charset::Charset;
use crate::crypto::{AesStrength, AesVendorVersion, Encryption};
use crate::format::central::CentralFileHeader;
use crate::format::extra::ExtraFields;
use crate::format::flags::GeneralPurposeFlag;
use crate::format::method::CompressionMethod;
use crate::timestamp::DosDateTime;
use crate::Result;

/// Host system code for Unix in the high byte of "version made by".
pub(crate) const HOST_UNIX: u8 = 3;

/// MS-DOS directory attribute.
pub(crate) const DOS_DIRECTORY: u32 = 0x10;

/// An entry of a ZIP archive, as described by its central directory record.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ZipEntry {
    /// Decoded entry name. Directories end with `/`.
    pub name: String,
    /// Compression method applied to the data. For WinZip AES entries this
    /// is the method from the AES extra field, not the placeholder 99.
    pub method: CompressionMethod,
    /// Encryption scheme.
    pub encryption: Encryption,
    /// General-purpose flag.
    pub flags: GeneralPurposeFlag,
    /// CRC-32 of the uncompressed data (0 for AE-2 entries).
    pub crc32: u32,
    /// Stored size, including any encryption header and trailer.
    pub compressed_size: u64,
    /// Uncompressed size.
    pub uncompressed_size: u64,
    /// DOS modification time.
    pub modified: DosDateTime,
    /// Disk the local header starts on.
    pub disk_start: u32,
    /// Offset of the local header within its disk.
    pub local_header_offset: u64,
    /// Version made by.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// Internal attributes.
    pub internal_attributes: u16,
    /// External (host) attributes.
    pub external_attributes: u32,
    /// Decoded entry comment.
    pub comment: String,
    /// Central directory extra fields.
    pub extra: ExtraFields,
    pub(crate) raw_name: Vec<u8>,
    pub(crate) raw_comment: Vec<u8>,
}

impl ZipEntry {
    /// Builds an entry from its central directory record.
    pub fn from_central(header: &CentralFileHeader, charset: Charset) -> Result<Self> {
        let utf8 = header.flags.is_utf8();
        let (method, encryption) = classify(header);

        Ok(Self {
            name: charset.decode(&header.name, utf8),
            method,
            encryption,
            flags: header.flags,
            crc32: header.crc32,
            compressed_size: header.resolved_compressed_size()?,
            uncompressed_size: header.resolved_uncompressed_size()?,
            modified: header.modified,
            disk_start: header.resolved_disk_start()?,
            local_header_offset: header.resolved_local_header_offset()?,
            version_made_by: header.version_made_by,
            version_needed: header.version_needed,
            internal_attributes: header.internal_attributes,
            external_attributes: header.external_attributes,
            comment: charset.decode(&header.comment, utf8),
            extra: header.extra.clone(),
            raw_name: header.name.clone(),
            raw_comment: header.comment.clone(),
        })
    }

    /// Returns `true` if the name ends with `/`.
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Returns `true` if the data is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_encrypted()
    }

    /// Returns `true` if a data descriptor follows the payload.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags.has_data_descriptor()
    }

    /// Raw name bytes as stored.
    pub fn raw_name(&self) -> &[u8] {
        &self.raw_name
    }

    /// Best available modification time.
    ///
    /// NTFS and extended-timestamp extra fields are preferred over the DOS
    /// field, which only has 2-second resolution.
    pub fn modified_time(&self) -> SystemTime {
        if let Some(ntfs) = self.extra.ntfs() {
            return ntfs.modified.as_system_time();
        }
        if let Some(secs) = self.extra.extended_timestamp().and_then(|t| t.modified) {
            if let Some(ts) = crate::timestamp::Timestamp::from_unix_secs(secs as i64) {
                return ts.as_system_time();
            }
        }
        self.modified.to_system_time()
    }

    /// Unix permission bits, when the entry was made on a Unix host.
    pub fn unix_mode(&self) -> Option<u32> {
        let mode = self.external_attributes >> 16;
        ((self.version_made_by >> 8) as u8 == HOST_UNIX && mode != 0).then_some(mode)
    }

    /// Returns `false` for AE-2 entries, whose stored CRC is always 0.
    pub fn has_crc(&self) -> bool {
        !matches!(
            self.encryption,
            Encryption::Aes {
                vendor_version: Some(AesVendorVersion::Ae2),
                ..
            }
        )
    }

    /// PKWARE password check byte: the high byte of the DOS time when a
    /// data descriptor is used, otherwise the high byte of the CRC.
    pub(crate) fn check_byte(&self) -> u8 {
        if self.has_data_descriptor() {
            (self.modified.time >> 8) as u8
        } else {
            (self.crc32 >> 24) as u8
        }
    }
}

fn classify(header: &CentralFileHeader) -> (CompressionMethod, Encryption) {
    let method = CompressionMethod::from_id(header.method);
    if method == CompressionMethod::Aes {
        return match header.extra.aes() {
            Some(aes) => (
                aes.method,
                Encryption::Aes {
                    strength: aes.strength,
                    vendor_version: Some(aes.vendor_version),
                },
            ),
            None => {
                log::warn!("method 99 without a WinZip AES extra field");
                (method, Encryption::None)
            }
        };
    }
    if !header.flags.is_encrypted() {
        return (method, Encryption::None);
    }
    if header.flags.is_strong_encryption() {
        // The decryption header in front of the data is authoritative; the
        // extra field only informs listings.
        let strength = header
            .extra
            .strong_encryption()
            .and_then(|f| f.algorithm.aes_key_len())
            .and_then(strength_for_key_len)
            .unwrap_or(AesStrength::Aes256);
        return (method, Encryption::Strong { strength });
    }
    (method, Encryption::Pkware)
}

fn strength_for_key_len(len: usize) -> Option<AesStrength> {
    match len {
        16 => Some(AesStrength::Aes128),
        24 => Some(AesStrength::Aes192),
        32 => Some(AesStrength::Aes256),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::extra::{AesExtraField, ExtraField};

    fn header() -> CentralFileHeader {
        CentralFileHeader {
            version_made_by: (3 << 8) | 63,
            version_needed: 20,
            flags: GeneralPurposeFlag::default(),
            method: 8,
            modified: DosDateTime::new(2024, 5, 17, 13, 45, 30).unwrap(),
            crc32: 0xCAFE_BABE,
            compressed_size: 10,
            uncompressed_size: 20,
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: 0o100644 << 16,
            local_header_offset: 0,
            name: b"dir/file.txt".to_vec(),
            extra: ExtraFields::new(),
            comment: Vec::new(),
        }
    }

    #[test]
    fn test_plain_entry() {
        let entry = ZipEntry::from_central(&header(), Charset::Utf8).unwrap();
        assert_eq!(entry.name, "dir/file.txt");
        assert_eq!(entry.method, CompressionMethod::Deflate);
        assert_eq!(entry.encryption, Encryption::None);
        assert_eq!(entry.unix_mode(), Some(0o100644));
        assert!(!entry.is_directory());
        assert!(entry.has_crc());
    }

    #[test]
    fn test_aes_entry_uses_extra_method() {
        let mut h = header();
        h.method = 99;
        h.flags = GeneralPurposeFlag::from_bits(GeneralPurposeFlag::ENCRYPTED);
        h.extra.set(ExtraField::Aes(AesExtraField {
            vendor_version: AesVendorVersion::Ae2,
            strength: AesStrength::Aes128,
            method: CompressionMethod::Deflate,
        }));
        let entry = ZipEntry::from_central(&h, Charset::Utf8).unwrap();
        assert_eq!(entry.method, CompressionMethod::Deflate);
        assert!(matches!(
            entry.encryption,
            Encryption::Aes {
                strength: AesStrength::Aes128,
                ..
            }
        ));
        assert!(!entry.has_crc());
    }

    #[test]
    fn test_check_byte_source() {
        let mut h = header();
        h.flags = GeneralPurposeFlag::from_bits(GeneralPurposeFlag::ENCRYPTED);
        let entry = ZipEntry::from_central(&h, Charset::Utf8).unwrap();
        assert_eq!(entry.encryption, Encryption::Pkware);
        assert_eq!(entry.check_byte(), 0xCA);

        h.flags = h.flags.with(GeneralPurposeFlag::DATA_DESCRIPTOR);
        let entry = ZipEntry::from_central(&h, Charset::Utf8).unwrap();
        assert_eq!(entry.check_byte(), (entry.modified.time >> 8) as u8);
    }

    #[test]
    fn test_cp437_name() {
        let mut h = header();
        h.name = vec![0x80, b'.', b't', b'x', b't'];
        let entry = ZipEntry::from_central(&h, Charset::Cp437).unwrap();
        assert_eq!(entry.name, "Ç.txt");
    }
}
