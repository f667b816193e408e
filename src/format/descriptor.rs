//! Data descriptor.

use std::io::{Read, Write};

use super::signature;
use crate::io::{ReadLeExt, WriteLeExt};
use crate::Result;

/// CRC and sizes written after the payload when general-purpose bit 3 is set.
///
/// The sizes are 64-bit when the entry carries ZIP64 information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u64,
    /// Uncompressed size.
    pub uncompressed_size: u64,
}

impl DataDescriptor {
    /// Serialized length, signature included.
    pub fn len(zip64: bool) -> u64 {
        if zip64 { 24 } else { 16 }
    }

    /// Writes the descriptor with its signature.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W, zip64: bool) -> Result<()> {
        w.write_dword(signature::DATA_DESCRIPTOR)?;
        w.write_dword(self.crc32)?;
        if zip64 {
            w.write_qword(self.compressed_size)?;
            w.write_qword(self.uncompressed_size)?;
        } else {
            w.write_dword(self.compressed_size as u32)?;
            w.write_dword(self.uncompressed_size as u32)?;
        }
        Ok(())
    }

    /// Reads a descriptor. The signature is optional in the format.
    pub fn read<R: Read + ?Sized>(r: &mut R, zip64: bool) -> Result<Self> {
        let mut crc32 = r.read_dword()?;
        if crc32 == signature::DATA_DESCRIPTOR {
            crc32 = r.read_dword()?;
        }
        let (compressed_size, uncompressed_size) = if zip64 {
            (r.read_qword()?, r.read_qword()?)
        } else {
            (r.read_dword()? as u64, r.read_dword()? as u64)
        };
        Ok(Self {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_both_widths() {
        let dd = DataDescriptor {
            crc32: 0x1234_5678,
            compressed_size: 100,
            uncompressed_size: 200,
        };
        for zip64 in [false, true] {
            let mut buf = Vec::new();
            dd.write(&mut buf, zip64).unwrap();
            assert_eq!(buf.len() as u64, DataDescriptor::len(zip64));
            assert_eq!(DataDescriptor::read(&mut Cursor::new(buf), zip64).unwrap(), dd);
        }
    }

    #[test]
    fn test_signature_optional() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&8u32.to_le_bytes());
        buf.extend_from_slice(&9u32.to_le_bytes());
        let dd = DataDescriptor::read(&mut Cursor::new(buf), false).unwrap();
        assert_eq!((dd.crc32, dd.compressed_size, dd.uncompressed_size), (7, 8, 9));
    }
}
