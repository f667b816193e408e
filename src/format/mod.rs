//! ZIP record layouts and their binary codecs.
//!
//! Every record in this module has a `read` that consumes exactly the bytes
//! of one record and a `write` that produces them, bit for bit as laid out
//! in the PKWARE application note. Records carry raw wire values (32-bit
//! sizes with their `0xFFFFFFFF` sentinels, packed DOS times, undecoded name
//! bytes); resolving ZIP64 overrides and decoding names is left to
//! [`crate::entry`].

pub mod central;
pub mod decryption;
pub mod descriptor;
pub mod end;
pub mod extra;
pub mod flags;
pub mod local;
pub mod method;
pub mod zip64;

use std::io::Read;

use crate::io::ReadLeExt;
use crate::{Error, Result};

/// Record signatures.
pub mod signature {
    /// Local file header.
    pub const LOCAL_FILE_HEADER: u32 = 0x04034b50;
    /// Central directory file header.
    pub const CENTRAL_FILE_HEADER: u32 = 0x02014b50;
    /// Optional data descriptor signature.
    pub const DATA_DESCRIPTOR: u32 = 0x08074b50;
    /// End of central directory record.
    pub const END_OF_CENTRAL_DIRECTORY: u32 = 0x06054b50;
    /// ZIP64 end of central directory record.
    pub const ZIP64_END_OF_CENTRAL_DIRECTORY: u32 = 0x06064b50;
    /// ZIP64 end of central directory locator.
    pub const ZIP64_LOCATOR: u32 = 0x07064b50;
    /// Archive extra data record (encrypted central directory).
    pub const ARCHIVE_EXTRA_DATA: u32 = 0x08064b50;
    /// Central directory digital signature.
    pub const DIGITAL_SIGNATURE: u32 = 0x05054b50;
    /// First four bytes of disk 0 of a split archive.
    pub const SPLIT_MARKER: u32 = 0x08074b50;
    /// Marker some tools write into single-volume archives they meant to span.
    pub const TEMPORARY_SPLIT_MARKER: u32 = 0x30304b50;
}

/// "Version needed to extract" values.
pub mod version {
    /// Stored entries.
    pub const DEFAULT: u16 = 10;
    /// Deflate, directories and PKWARE encryption.
    pub const DEFLATE: u16 = 20;
    /// ZIP64 extensions.
    pub const ZIP64: u16 = 45;
    /// BZip2.
    pub const BZIP2: u16 = 46;
    /// AES (WinZip or strong encryption).
    pub const AES: u16 = 51;
    /// Central directory encryption.
    pub const CENTRAL_DIRECTORY_ENCRYPTION: u16 = 62;
    /// LZMA and Zstandard.
    pub const LZMA: u16 = 63;

    /// Highest version this crate writes and understands.
    pub const SUPPORTED: u16 = LZMA;

    /// "Version made by": host system Unix (3) in the high byte.
    pub const MADE_BY: u16 = (3 << 8) | SUPPORTED;
}

/// Value of a 32-bit field whose real value lives in a ZIP64 record.
pub const SENTINEL_32: u32 = 0xFFFF_FFFF;

/// Value of a 16-bit field whose real value lives in a ZIP64 record.
pub const SENTINEL_16: u16 = 0xFFFF;

/// Reads a signature dword and checks it.
pub(crate) fn expect_signature<R: Read + ?Sized>(
    r: &mut R,
    expected: u32,
    offset: u64,
) -> Result<()> {
    let actual = r.read_dword()?;
    if actual != expected {
        return Err(Error::SignatureMismatch {
            offset,
            expected,
            actual,
        });
    }
    log::trace!("record {:#010x} at offset {:#x}", expected, offset);
    Ok(())
}

/// Checks that a variable-length field fits its 16-bit length prefix.
pub(crate) fn field_len(what: &str, len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        Error::InvalidFormat(format!("{} is {} bytes, more than a ZIP record can hold", what, len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_expect_signature() {
        let mut ok = Cursor::new(signature::LOCAL_FILE_HEADER.to_le_bytes());
        expect_signature(&mut ok, signature::LOCAL_FILE_HEADER, 0).unwrap();

        let mut bad = Cursor::new(signature::CENTRAL_FILE_HEADER.to_le_bytes());
        let err = expect_signature(&mut bad, signature::LOCAL_FILE_HEADER, 16).unwrap_err();
        assert!(matches!(
            err,
            Error::SignatureMismatch {
                offset: 16,
                expected: 0x04034b50,
                actual: 0x02014b50
            }
        ));
    }

    #[test]
    fn test_field_len_limit() {
        assert_eq!(field_len("name", 65535).unwrap(), 65535);
        assert!(field_len("name", 65536).is_err());
    }
}
