//! Central directory and end records.

use std::io::Write;

use sha1::{Digest, Sha1};

use super::headers::{central_header, needs_zip64, zip64_refused};
use super::{CentralDirectoryEncryption, Zip64Mode, ZipSettings};
use crate::codec::{Compression, CompressionEncoder};
use crate::crypto::encrypt_buffer;
use crate::entry::ZipEntry;
use crate::format::central::ArchiveExtraData;
use crate::format::decryption::FLAG_PASSWORD;
use crate::format::end::EndOfCentralDirectory;
use crate::format::extra::{ExtraField, ExtraFields, StrongEncryptionField};
use crate::format::zip64::{ExtensibleDataSector, Zip64EndOfCentralDirectory, Zip64Locator};
use crate::format::{SENTINEL_16, SENTINEL_32, version};
use crate::io::{DataSink, SinkPosition};
use crate::{Error, Result};

/// Where the directory landed and what the end records must describe.
struct Directory {
    start: SinkPosition,
    size: u64,
    /// Disk of each record, for the per-disk entry count.
    record_disks: Vec<u32>,
    sector: Option<ExtensibleDataSector>,
}

/// Writes the central directory followed by the end records.
pub(crate) fn write_central_directory<S: DataSink + ?Sized>(
    sink: &mut S,
    entries: &[ZipEntry],
    settings: &ZipSettings,
) -> Result<()> {
    let mode = settings.zip64;
    let headers = entries
        .iter()
        .map(|e| central_header(e, mode))
        .collect::<Result<Vec<_>>>()?;

    let directory = match &settings.central_directory_encryption {
        Some(encryption) => {
            let mut raw = Vec::new();
            for header in &headers {
                header.write(&mut raw)?;
            }
            write_encrypted(sink, &raw, encryption, entries.len())?
        }
        None => {
            let before = sink.total_written();
            let mut start = None;
            let mut record_disks = Vec::with_capacity(headers.len());
            for header in &headers {
                sink.reserve_contiguous(header.len())?;
                let pos = sink.position();
                start.get_or_insert(pos);
                record_disks.push(pos.disk);
                header.write(sink)?;
            }
            Directory {
                start: start.unwrap_or_else(|| sink.position()),
                size: sink.total_written() - before,
                record_disks,
                sector: None,
            }
        }
    };

    write_end_records(sink, directory, entries.len() as u64, settings)
}

fn write_encrypted<S: DataSink + ?Sized>(
    sink: &mut S,
    raw: &[u8],
    encryption: &CentralDirectoryEncryption,
    count: usize,
) -> Result<Directory> {
    let compressed = match encryption.compression {
        Compression::Store => raw.to_vec(),
        other => {
            let mut encoder = CompressionEncoder::new(other, Vec::new())?;
            encoder.write_all(raw)?;
            encoder.finish()?
        }
    };
    let (header, ciphertext) =
        encrypt_buffer(&encryption.password, encryption.strength, &compressed)?;
    let algorithm = encryption.strength.algorithm();
    let bit_len = (encryption.strength.key_len() * 8) as u16;

    let record = ArchiveExtraData {
        extra: ExtraFields::from_iter([ExtraField::StrongEncryption(StrongEncryptionField {
            format: StrongEncryptionField::FORMAT,
            algorithm,
            bit_len,
            flags: FLAG_PASSWORD,
            cert_data: Vec::new(),
        })]),
    };

    let before = sink.total_written();
    sink.reserve_contiguous(header.len() + record.len())?;
    let start = sink.position();
    header.write(sink)?;
    record.write(sink)?;
    sink.write_all(&ciphertext)?;
    log::debug!(
        "wrote encrypted central directory: {} records, {} bytes plain, {} stored",
        count,
        raw.len(),
        ciphertext.len()
    );

    Ok(Directory {
        start,
        size: sink.total_written() - before,
        record_disks: vec![start.disk; count],
        sector: Some(ExtensibleDataSector {
            method: encryption.compression.method().id(),
            compressed_size: compressed.len() as u64,
            uncompressed_size: raw.len() as u64,
            algorithm: algorithm.id(),
            bit_len,
            flags: FLAG_PASSWORD,
            hash_algorithm: ExtensibleDataSector::HASH_SHA1,
            hash_data: Sha1::digest(raw).to_vec(),
        }),
    })
}

fn write_end_records<S: DataSink + ?Sized>(
    sink: &mut S,
    directory: Directory,
    count: u64,
    settings: &ZipSettings,
) -> Result<()> {
    let comment = match &settings.comment {
        Some(text) => settings.charset.encode(text).0,
        None => Vec::new(),
    };
    let encrypted = directory.sector.is_some();

    let zip64 = settings.zip64 == Zip64Mode::Always
        || encrypted
        || count >= SENTINEL_16 as u64
        || needs_zip64(directory.size)
        || needs_zip64(directory.start.offset)
        || directory.start.disk >= SENTINEL_16 as u32
        || sink.position().disk >= SENTINEL_16 as u32;
    if zip64 && settings.zip64 == Zip64Mode::Never {
        return Err(zip64_refused());
    }

    let mut zip64_record = Zip64EndOfCentralDirectory {
        version_made_by: version::MADE_BY,
        version_needed: if encrypted {
            version::CENTRAL_DIRECTORY_ENCRYPTION
        } else {
            version::ZIP64
        },
        disk_number: 0,
        central_directory_disk: directory.start.disk,
        entries_on_disk: 0,
        total_entries: count,
        central_directory_size: directory.size,
        central_directory_offset: directory.start.offset,
        data_sector: directory.sector,
        extensible_data: Vec::new(),
    };

    let eocd_len = EndOfCentralDirectory::FIXED_LEN + comment.len() as u64;
    let tail_len = if zip64 {
        zip64_record.len() + Zip64Locator::LEN + eocd_len
    } else {
        eocd_len
    };
    // Keeps the locator directly in front of the end record.
    sink.reserve_contiguous(tail_len)?;
    let end = sink.position();
    let on_disk = directory.record_disks.iter().filter(|&&d| d == end.disk).count() as u64;

    if zip64 {
        log::debug!("writing ZIP64 end of central directory on disk {}", end.disk);
        zip64_record.disk_number = end.disk;
        zip64_record.entries_on_disk = on_disk;
        zip64_record.write(sink)?;
        Zip64Locator {
            end_record_disk: end.disk,
            end_record_offset: end.offset,
            total_disks: end.disk + 1,
        }
        .write(sink)?;
    }

    let eocd = if encrypted {
        EndOfCentralDirectory {
            disk_number: SENTINEL_16,
            central_directory_disk: SENTINEL_16,
            entries_on_disk: SENTINEL_16,
            total_entries: SENTINEL_16,
            central_directory_size: SENTINEL_32,
            central_directory_offset: SENTINEL_32,
            comment,
        }
    } else {
        EndOfCentralDirectory {
            disk_number: clamp_16(end.disk as u64),
            central_directory_disk: clamp_16(directory.start.disk as u64),
            entries_on_disk: clamp_16(on_disk),
            total_entries: clamp_16(count),
            central_directory_size: clamp_32(directory.size),
            central_directory_offset: clamp_32(directory.start.offset),
            comment,
        }
    };
    eocd.write(sink)?;
    sink.flush().map_err(Error::from)
}

fn clamp_16(value: u64) -> u16 {
    if value >= SENTINEL_16 as u64 { SENTINEL_16 } else { value as u16 }
}

fn clamp_32(value: u64) -> u32 {
    if needs_zip64(value) { SENTINEL_32 } else { value as u32 }
}
