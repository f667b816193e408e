//! Projection of a [`ZipEntry`] onto its local and central headers.

use crate::entry::ZipEntry;
use crate::format::central::CentralFileHeader;
use crate::format::extra::{ExtraField, header_id};
use crate::format::local::LocalFileHeader;
use crate::format::method::CompressionMethod;
use crate::format::zip64::Zip64ExtendedInfo;
use crate::format::{SENTINEL_16, SENTINEL_32, version};
use crate::write::Zip64Mode;
use crate::{Error, Result};

/// Returns `true` if `value` does not fit a classic 32-bit field.
///
/// The sentinel itself counts as overflow: a stored `0xFFFFFFFF` always
/// means "look in the ZIP64 record".
pub(crate) fn needs_zip64(value: u64) -> bool {
    value >= SENTINEL_32 as u64
}

pub(crate) fn zip64_refused() -> Error {
    Error::UnsupportedFeature {
        feature: "ZIP64 records (disabled by Zip64Mode::Never)",
    }
}

/// Method identifier as written: 99 for WinZip AES, the real method otherwise.
pub(crate) fn wire_method(entry: &ZipEntry) -> u16 {
    match entry.encryption {
        crate::crypto::Encryption::Aes { .. } => CompressionMethod::Aes.id(),
        _ => entry.method.id(),
    }
}

/// Builds the local header.
///
/// With a data descriptor the CRC and sizes are written as zero. When
/// `zip64` is set both size fields hold the sentinel and a ZIP64 record
/// carries the real (or zero) values.
pub(crate) fn local_header(entry: &ZipEntry, zip64: bool) -> LocalFileHeader {
    let deferred = entry.has_data_descriptor();
    let (crc32, compressed, uncompressed) = if deferred {
        (0, 0, 0)
    } else {
        (entry.crc32, entry.compressed_size, entry.uncompressed_size)
    };

    let mut extra = entry.extra.clone();
    extra.remove(header_id::ZIP64);
    let (compressed_field, uncompressed_field) = if zip64 {
        extra.set(ExtraField::Zip64(Zip64ExtendedInfo {
            uncompressed_size: Some(uncompressed),
            compressed_size: Some(compressed),
            local_header_offset: None,
            disk_number: None,
        }));
        (SENTINEL_32, SENTINEL_32)
    } else {
        (compressed as u32, uncompressed as u32)
    };

    LocalFileHeader {
        version_needed: version_needed(entry.version_needed, zip64),
        flags: entry.flags,
        method: wire_method(entry),
        modified: entry.modified,
        crc32,
        compressed_size: compressed_field,
        uncompressed_size: uncompressed_field,
        name: entry.raw_name.clone(),
        extra,
    }
}

/// Builds the central header, promoting overflowing fields to ZIP64.
pub(crate) fn central_header(entry: &ZipEntry, mode: Zip64Mode) -> Result<CentralFileHeader> {
    let always = mode == Zip64Mode::Always;
    let mut info = Zip64ExtendedInfo::default();
    if always || needs_zip64(entry.uncompressed_size) {
        info.uncompressed_size = Some(entry.uncompressed_size);
    }
    if always || needs_zip64(entry.compressed_size) {
        info.compressed_size = Some(entry.compressed_size);
    }
    if needs_zip64(entry.local_header_offset) {
        info.local_header_offset = Some(entry.local_header_offset);
    }
    if entry.disk_start >= SENTINEL_16 as u32 {
        info.disk_number = Some(entry.disk_start);
    }

    let zip64 = !info.is_empty();
    if zip64 && mode == Zip64Mode::Never {
        return Err(zip64_refused());
    }

    let mut extra = entry.extra.clone();
    extra.remove(header_id::ZIP64);
    if zip64 {
        log::debug!("promoting central header of {} to ZIP64", entry.name);
        extra.set(ExtraField::Zip64(info));
    }

    Ok(CentralFileHeader {
        version_made_by: entry.version_made_by,
        version_needed: version_needed(entry.version_needed, zip64),
        flags: entry.flags,
        method: wire_method(entry),
        modified: entry.modified,
        crc32: entry.crc32,
        compressed_size: classic_32(info.compressed_size, entry.compressed_size),
        uncompressed_size: classic_32(info.uncompressed_size, entry.uncompressed_size),
        disk_start: match info.disk_number {
            Some(_) => SENTINEL_16,
            None => entry.disk_start as u16,
        },
        internal_attributes: entry.internal_attributes,
        external_attributes: entry.external_attributes,
        local_header_offset: classic_32(info.local_header_offset, entry.local_header_offset),
        name: entry.raw_name.clone(),
        extra,
        comment: entry.raw_comment.clone(),
    })
}

fn classic_32(promoted: Option<u64>, value: u64) -> u32 {
    match promoted {
        Some(_) => SENTINEL_32,
        None => value as u32,
    }
}

fn version_needed(base: u16, zip64: bool) -> u16 {
    if zip64 { base.max(version::ZIP64) } else { base }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::Charset;
    use crate::format::extra::ExtraFields;
    use crate::format::flags::GeneralPurposeFlag;
    use crate::timestamp::DosDateTime;

    fn entry(size: u64) -> ZipEntry {
        let header = CentralFileHeader {
            version_made_by: version::MADE_BY,
            version_needed: version::DEFAULT,
            flags: GeneralPurposeFlag::default(),
            method: 0,
            modified: DosDateTime::default(),
            crc32: 0x1234_5678,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: 0,
            local_header_offset: 0,
            name: b"big.bin".to_vec(),
            extra: ExtraFields::new(),
            comment: Vec::new(),
        };
        let mut entry = ZipEntry::from_central(&header, Charset::Utf8).unwrap();
        entry.uncompressed_size = size;
        entry.compressed_size = size;
        entry
    }

    #[test]
    fn test_threshold_at_sentinel() {
        let at = central_header(&entry(0xFFFF_FFFF), Zip64Mode::Auto).unwrap();
        assert_eq!(at.uncompressed_size, SENTINEL_32);
        assert_eq!(at.compressed_size, SENTINEL_32);
        assert_eq!(at.extra.zip64().unwrap().uncompressed_size, Some(0xFFFF_FFFF));
        assert_eq!(at.version_needed, version::ZIP64);
        assert_eq!(at.resolved_uncompressed_size().unwrap(), 0xFFFF_FFFF);

        let below = central_header(&entry(0xFFFF_FFFE), Zip64Mode::Auto).unwrap();
        assert_eq!(below.uncompressed_size, 0xFFFF_FFFE);
        assert!(below.extra.zip64().is_none());
        assert_eq!(below.version_needed, version::DEFAULT);
    }

    #[test]
    fn test_local_threshold_round_trip() {
        let e = entry(0xFFFF_FFFF);
        let lfh = local_header(&e, needs_zip64(e.uncompressed_size));
        let mut buf = Vec::new();
        lfh.write(&mut buf).unwrap();
        let back = LocalFileHeader::read(&mut buf.as_slice(), 0).unwrap();
        assert_eq!(back.uncompressed_size, SENTINEL_32);
        assert_eq!(back.resolved_uncompressed_size(), 0xFFFF_FFFF);

        let e = entry(0xFFFF_FFFE);
        let lfh = local_header(&e, needs_zip64(e.uncompressed_size));
        assert!(lfh.extra.zip64().is_none());
        assert_eq!(lfh.uncompressed_size, 0xFFFF_FFFE);
    }

    #[test]
    fn test_only_overflowing_fields_promoted() {
        let mut e = entry(10);
        e.local_header_offset = 0x1_0000_0000;
        let cfh = central_header(&e, Zip64Mode::Auto).unwrap();
        let info = cfh.extra.zip64().unwrap();
        assert_eq!(info.uncompressed_size, None);
        assert_eq!(info.local_header_offset, Some(0x1_0000_0000));
        assert_eq!(cfh.uncompressed_size, 10);
        assert_eq!(cfh.local_header_offset, SENTINEL_32);
    }

    #[test]
    fn test_always_and_never() {
        let cfh = central_header(&entry(10), Zip64Mode::Always).unwrap();
        assert_eq!(cfh.extra.zip64().unwrap().uncompressed_size, Some(10));
        assert!(matches!(
            central_header(&entry(0xFFFF_FFFF), Zip64Mode::Never),
            Err(Error::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_descriptor_zeroes_local_fields() {
        let mut e = entry(500);
        e.flags = e.flags.with(GeneralPurposeFlag::DATA_DESCRIPTOR);
        let lfh = local_header(&e, false);
        assert_eq!((lfh.crc32, lfh.compressed_size, lfh.uncompressed_size), (0, 0, 0));
    }
}
