//! Central directory parsing, plain or encrypted.

use std::io::Read;

use sha1::{Digest, Sha1};

use super::locate::EndRecords;
use super::{PasswordProvider, ReadOptions};
use crate::codec::CompressionDecoder;
use crate::crypto::decrypt_buffer;
use crate::format::central::{ArchiveExtraData, CentralFileHeader, skip_digital_signature};
use crate::format::decryption::DecryptionHeader;
use crate::format::flags::GeneralPurposeFlag;
use crate::format::method::CompressionMethod;
use crate::format::signature;
use crate::format::zip64::ExtensibleDataSector;
use crate::io::ReadLeExt;
use crate::volume::{SplitReader, SrcZip};
use crate::{Error, Result};

/// Reads every central directory file header.
pub(crate) fn read_central_directory(
    src: &SrcZip,
    end: &EndRecords,
    options: &ReadOptions,
) -> Result<Vec<CentralFileHeader>> {
    let offset = end.directory_offset();
    let size = end.directory_size();
    let mut reader = SplitReader::new(src);
    reader.seek_disk(end.directory_disk(), offset)?;
    log::trace!(
        "central directory at disk {} offset {}, {} bytes",
        end.directory_disk(),
        offset,
        size
    );

    let stored = reader.read_up_to(usize::try_from(size).map_err(|_| {
        Error::corrupt_header(offset, format!("central directory size {} overflows", size))
    })?)?;
    if (stored.len() as u64) < size {
        return Err(Error::corrupt_header(
            offset,
            format!("central directory truncated: {} of {} bytes", stored.len(), size),
        ));
    }

    match end.zip64.as_ref().and_then(|z| z.data_sector.as_ref()) {
        Some(sector) => {
            let plain = decrypt_directory(&stored, sector, offset, options)?;
            parse_records(&plain, 0, end.total_entries())
        }
        None => parse_records(&stored, offset, end.total_entries()),
    }
}

/// Decrypts, decompresses and checks an encrypted central directory.
fn decrypt_directory(
    stored: &[u8],
    sector: &ExtensibleDataSector,
    offset: u64,
    options: &ReadOptions,
) -> Result<Vec<u8>> {
    let mut cursor = stored;
    let header = DecryptionHeader::read(&mut cursor)?;
    if cursor.len() >= 4 && cursor[..4] == signature::ARCHIVE_EXTRA_DATA.to_le_bytes() {
        let record_offset = offset + (stored.len() - cursor.len()) as u64;
        let record = ArchiveExtraData::read(&mut cursor, record_offset)?;
        log::trace!("archive extra data record with {} bytes of fields", record.extra.len());
    }

    let password = options
        .password_for(None)
        .ok_or(Error::PasswordRequired { entry_name: None })?;
    let compressed = decrypt_buffer(&header, &password, cursor)?;
    if compressed.len() as u64 != sector.compressed_size {
        return Err(Error::corrupt_header(
            offset,
            format!(
                "decrypted central directory is {} bytes, expected {}",
                compressed.len(),
                sector.compressed_size
            ),
        ));
    }

    let method = CompressionMethod::from_id(sector.method);
    let plain = match method {
        CompressionMethod::Store => compressed,
        _ => {
            let mut decoder = CompressionDecoder::new(
                method,
                GeneralPurposeFlag::default(),
                sector.uncompressed_size,
                compressed.as_slice(),
            )?;
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            out
        }
    };
    if plain.len() as u64 != sector.uncompressed_size {
        return Err(Error::corrupt_header(
            offset,
            format!(
                "central directory expands to {} bytes, expected {}",
                plain.len(),
                sector.uncompressed_size
            ),
        ));
    }
    if sector.hash_algorithm == ExtensibleDataSector::HASH_SHA1
        && !sector.hash_data.is_empty()
        && Sha1::digest(&plain).as_slice() != sector.hash_data.as_slice()
    {
        return Err(Error::corrupt_header(offset, "central directory hash mismatch"));
    }
    log::debug!("decrypted central directory: {} bytes", plain.len());
    Ok(plain)
}

/// Parses file headers, skipping a trailing digital signature.
fn parse_records(data: &[u8], base_offset: u64, declared: u64) -> Result<Vec<CentralFileHeader>> {
    let mut cursor = data;
    let mut headers = Vec::new();
    while cursor.len() >= 4 {
        let offset = base_offset + (data.len() - cursor.len()) as u64;
        let sig = u32::from_le_bytes([cursor[0], cursor[1], cursor[2], cursor[3]]);
        match sig {
            signature::CENTRAL_FILE_HEADER => {
                log::trace!("central file header at {}", offset);
                headers.push(CentralFileHeader::read(&mut cursor, offset)?);
            }
            signature::DIGITAL_SIGNATURE => {
                skip_digital_signature(&mut cursor, offset)?;
            }
            actual if headers.is_empty() && declared > 0 => {
                return Err(Error::SignatureMismatch {
                    offset,
                    expected: signature::CENTRAL_FILE_HEADER,
                    actual,
                });
            }
            actual => {
                log::warn!(
                    "ignoring {} bytes after the central directory (signature {:#010x})",
                    cursor.len(),
                    actual
                );
                break;
            }
        }
    }
    if headers.len() as u64 != declared {
        log::warn!(
            "end record declares {} entries, central directory holds {}",
            declared,
            headers.len()
        );
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::extra::ExtraFields;
    use crate::timestamp::DosDateTime;

    fn record(name: &str) -> Vec<u8> {
        let header = CentralFileHeader {
            version_made_by: 0,
            version_needed: 10,
            flags: GeneralPurposeFlag::default(),
            method: 0,
            modified: DosDateTime::default(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: 0,
            local_header_offset: 0,
            name: name.as_bytes().to_vec(),
            extra: ExtraFields::new(),
            comment: Vec::new(),
        };
        let mut out = Vec::new();
        header.write(&mut out).unwrap();
        out
    }

    #[test]
    fn test_parse_with_signature_record() {
        let mut data = record("a");
        data.extend(record("b"));
        data.extend_from_slice(&signature::DIGITAL_SIGNATURE.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(b"sig");
        let headers = parse_records(&data, 0, 2).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].name, b"b");
    }

    #[test]
    fn test_count_mismatch_tolerated() {
        let data = record("a");
        assert_eq!(parse_records(&data, 0, 5).unwrap().len(), 1);
    }

    #[test]
    fn test_garbage_directory_rejected() {
        let err = parse_records(&[0x50, 0x4b, 0x09, 0x09, 0, 0], 100, 1).unwrap_err();
        assert!(matches!(err, Error::SignatureMismatch { offset: 100, .. }));
    }
}
