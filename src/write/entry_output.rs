//! The write pipeline of a single entry.
//!
//! Caller bytes pass through the CRC accumulator, the compressor and the
//! encryptor before reaching the archive sink:
//!
//! ```text
//! EntryWriter (CRC, size) -> CompressionEncoder -> EncryptionEncoder -> CountingWriter -> sink
//! ```
//!
//! With a data descriptor the local header goes straight to the sink with
//! zeroed sizes and the descriptor follows the payload. Without one, header
//! and payload are spooled to an anonymous temporary file, the header is
//! corrected once the sizes are known and the result is copied to the sink.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::time::SystemTime;

use super::headers::{local_header, needs_zip64, zip64_refused};
use super::{Catalog, EntrySettings, VolumeSink, Zip64Mode, ZipSettings};
use crate::archive_path::ArchivePath;
use crate::checksum::{Checksum, Crc32};
use crate::codec::{Compression, CompressionEncoder};
use crate::crypto::{AesVendorVersion, Encryption, EncryptionEncoder};
use crate::entry::{DOS_DIRECTORY, ZipEntry};
use crate::format::decryption::FLAG_PASSWORD;
use crate::format::descriptor::DataDescriptor;
use crate::format::extra::{
    AesExtraField, ExtendedTimestamp, ExtraField, ExtraFields, StrongEncryptionField,
};
use crate::format::flags::GeneralPurposeFlag;
use crate::format::version;
use crate::io::{CountingWriter, DataSink};
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

const DEFAULT_FILE_MODE: u32 = 0o100644;
const DEFAULT_DIRECTORY_MODE: u32 = 0o040755;

/// Where an entry's bytes go while it is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Streamed to the sink, sizes in a trailing data descriptor.
    Descriptor,
    /// Spooled to a temporary file and copied on close.
    Spooled,
    /// Directory: header with final (zero) values, no payload.
    Empty,
}

/// Lifecycle of an entry. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EntryState {
    HeaderWritten,
    EncryptionHeaderWritten,
    PayloadStreaming,
    Finalizing,
    Closed,
}

/// Bottom of the chain: the archive sink or the spool file.
enum Target<'a> {
    Direct(&'a mut VolumeSink),
    Spool(BufWriter<File>),
}

impl Write for Target<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Target::Direct(sink) => sink.write(buf),
            Target::Spool(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Target::Direct(sink) => sink.flush(),
            Target::Spool(file) => file.flush(),
        }
    }
}

type Chain<'a> = CompressionEncoder<EncryptionEncoder<CountingWriter<Target<'a>>>>;

/// Writer for one entry's data, returned by
/// [`ZipWriter::start_entry`](super::ZipWriter::start_entry).
///
/// Call [`finish`](Self::finish) when done. Dropping a streaming entry
/// without finishing leaves a partial record in the archive, so
/// [`ZipWriter::finish`](super::ZipWriter::finish) then fails and the files
/// are removed. A spooled entry that is dropped leaves no trace.
pub struct EntryWriter<'a> {
    state: EntryState,
    layout: Layout,
    chain: Option<Chain<'a>>,
    /// Archive sink while spooling; inside the chain otherwise.
    sink: Option<&'a mut VolumeSink>,
    catalog: &'a mut Catalog,
    zip64_mode: Zip64Mode,
    entry: ZipEntry,
    local_zip64: bool,
    spooled_header_len: u64,
    size_hint: Option<u64>,
    crc: Crc32,
    written: u64,
}

impl std::fmt::Debug for EntryWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryWriter")
            .field("name", &self.entry.name)
            .field("state", &self.state)
            .field("layout", &self.layout)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl<'a> EntryWriter<'a> {
    /// Writes the local header and the encryption header.
    pub(crate) fn start(
        sink: &'a mut VolumeSink,
        catalog: &'a mut Catalog,
        settings: &ZipSettings,
        path: ArchivePath,
        options: EntrySettings,
    ) -> Result<Self> {
        let is_directory = path.is_directory();
        let (compression, encryption, password) = if is_directory {
            (Compression::Store, Encryption::None, None)
        } else {
            (options.compression.validate()?, options.encryption, options.password.clone())
        };
        if encryption.is_encrypted() && password.is_none() {
            return Err(Error::PasswordRequired {
                entry_name: Some(path.as_str().to_string()),
            });
        }
        let encryption = resolve_vendor_version(encryption, options.size_hint);

        let layout = if is_directory {
            Layout::Empty
        } else if options.uses_data_descriptor() {
            Layout::Descriptor
        } else {
            Layout::Spooled
        };

        let entry = new_entry(settings, &path, compression, encryption, &options, layout)?;
        // A streamed entry of unknown length may still outgrow 4 GiB, and its
        // descriptor may only carry 8-byte sizes if the local header has a
        // ZIP64 record, so one is reserved up front.
        let local_zip64 = match (layout, settings.zip64) {
            (_, Zip64Mode::Always) => true,
            (Layout::Descriptor, Zip64Mode::Auto) => options.size_hint.is_none_or(needs_zip64),
            (Layout::Descriptor, Zip64Mode::Never) => options.size_hint.is_some_and(needs_zip64),
            _ => false,
        };
        if local_zip64 && settings.zip64 == Zip64Mode::Never {
            return Err(zip64_refused());
        }

        let mut writer = Self {
            state: EntryState::HeaderWritten,
            layout,
            chain: None,
            sink: None,
            catalog,
            zip64_mode: settings.zip64,
            entry,
            local_zip64,
            spooled_header_len: 0,
            size_hint: options.size_hint,
            crc: Crc32::new(),
            written: 0,
        };

        let header = local_header(&writer.entry, local_zip64);
        let target = match layout {
            Layout::Descriptor | Layout::Empty => {
                sink.reserve_contiguous(header.len())?;
                let pos = sink.position();
                writer.entry.disk_start = pos.disk;
                writer.entry.local_header_offset = pos.offset;
                writer.catalog.poisoned = true;
                header.write(sink)?;
                Target::Direct(sink)
            }
            Layout::Spooled => {
                log::debug!("spooling entry {} to a temporary file", writer.entry.name);
                let mut spool = BufWriter::new(tempfile::tempfile()?);
                header.write(&mut spool)?;
                writer.spooled_header_len = header.len();
                writer.sink = Some(sink);
                Target::Spool(spool)
            }
        };

        // Always followed by a data descriptor, so the time byte is known.
        let check_byte = (writer.entry.modified.time >> 8) as u8;
        let encryptor = EncryptionEncoder::new(
            writer.entry.encryption,
            password.as_ref(),
            check_byte,
            CountingWriter::new(target),
        )
        .map_err(|e| e.with_entry(&writer.entry.name))?;
        writer.state = EntryState::EncryptionHeaderWritten;

        writer.chain = Some(CompressionEncoder::new(compression, encryptor)?);
        Ok(writer)
    }

    /// Name of the entry being written.
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Uncompressed bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Finalizes the payload and records the entry.
    ///
    /// # Errors
    ///
    /// [`Error::SizeMismatch`] when a size hint was given and a different
    /// number of bytes was written, plus any I/O error of the sink.
    pub fn finish(mut self) -> Result<ZipEntry> {
        self.close().map_err(|e| e.with_entry(&self.entry.name))?;
        self.catalog.record(self.entry.clone());
        Ok(self.entry.clone())
    }

    fn close(&mut self) -> Result<()> {
        if self.state >= EntryState::Finalizing {
            return Err(Error::InvalidState("entry already finalized"));
        }
        self.state = EntryState::Finalizing;

        let chain = self
            .chain
            .take()
            .ok_or(Error::InvalidState("entry has no open payload stream"))?;
        let counting = chain.finish()?.finish()?;
        let compressed = counting.count();
        let target = counting.into_inner();

        if let Some(expected) = self.size_hint {
            if expected != self.written {
                return Err(Error::SizeMismatch {
                    entry_name: Some(self.entry.name.clone()),
                    expected,
                    actual: self.written,
                });
            }
        }

        let crc = self.crc.finalize();
        self.entry.crc32 = if self.entry.has_crc() { crc } else { 0 };
        self.entry.compressed_size = compressed;
        self.entry.uncompressed_size = self.written;
        let sizes_overflow = needs_zip64(compressed) || needs_zip64(self.written);
        if sizes_overflow && self.zip64_mode == Zip64Mode::Never {
            return Err(zip64_refused());
        }
        if sizes_overflow || self.local_zip64 {
            self.entry.version_needed = self.entry.version_needed.max(version::ZIP64);
        }

        match (self.layout, target) {
            (Layout::Descriptor, Target::Direct(sink)) => {
                // The descriptor's field width must match the local header.
                let zip64 = self.local_zip64;
                if sizes_overflow && !zip64 {
                    return Err(zip64_refused());
                }
                let descriptor = DataDescriptor {
                    crc32: self.entry.crc32,
                    compressed_size: compressed,
                    uncompressed_size: self.written,
                };
                sink.reserve_contiguous(DataDescriptor::len(zip64))?;
                descriptor.write(sink, zip64)?;
            }
            (Layout::Empty, Target::Direct(_)) => {
                if self.written != 0 || compressed != 0 {
                    return Err(Error::InvalidState("directory entries carry no data"));
                }
            }
            (Layout::Spooled, Target::Spool(spool)) => {
                let sink = self
                    .sink
                    .take()
                    .ok_or(Error::InvalidState("spooled entry lost its sink"))?;
                let spool = spool.into_inner().map_err(|e| e.into_error())?;
                self.copy_spool(spool, sink, sizes_overflow)?;
            }
            _ => return Err(Error::InvalidState("entry layout and target disagree")),
        }

        self.state = EntryState::Closed;
        Ok(())
    }

    /// Corrects the spooled local header and copies the entry to the sink.
    fn copy_spool(
        &mut self,
        mut spool: File,
        sink: &mut VolumeSink,
        sizes_overflow: bool,
    ) -> Result<()> {
        let zip64 = self.zip64_mode == Zip64Mode::Always || sizes_overflow;
        if zip64 {
            log::debug!("promoting local header of {} to ZIP64", self.entry.name);
        }
        let header = local_header(&self.entry, zip64);

        sink.reserve_contiguous(header.len())?;
        let pos = sink.position();
        self.entry.disk_start = pos.disk;
        self.entry.local_header_offset = pos.offset;
        self.catalog.poisoned = true;

        if header.len() == self.spooled_header_len {
            spool.seek(SeekFrom::Start(0))?;
            header.write(&mut spool)?;
            spool.seek(SeekFrom::Start(0))?;
        } else {
            header.write(sink)?;
            spool.seek(SeekFrom::Start(self.spooled_header_len))?;
        }
        io::copy(&mut spool, sink)?;
        Ok(())
    }
}

impl Write for EntryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state >= EntryState::Finalizing {
            return Err(Error::InvalidState("write after entry was finalized").into());
        }
        let chain = self
            .chain
            .as_mut()
            .ok_or_else(|| {
                io::Error::from(Error::InvalidState("entry has no open payload stream"))
            })?;
        self.state = EntryState::PayloadStreaming;
        let n = chain.write(buf)?;
        self.crc.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.chain.as_mut() {
            Some(chain) => chain.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for EntryWriter<'_> {
    fn drop(&mut self) {
        if self.state != EntryState::Closed {
            log::warn!(
                "entry {} dropped in state {:?}; the archive can no longer be finished",
                self.entry.name,
                self.state
            );
        }
    }
}

fn resolve_vendor_version(encryption: Encryption, size_hint: Option<u64>) -> Encryption {
    match encryption {
        Encryption::Aes {
            strength,
            vendor_version: None,
        } => Encryption::Aes {
            strength,
            vendor_version: Some(AesVendorVersion::for_size(size_hint)),
        },
        other => other,
    }
}

/// Builds the entry record: everything but CRC, sizes and position.
fn new_entry(
    settings: &ZipSettings,
    path: &ArchivePath,
    compression: Compression,
    encryption: Encryption,
    options: &EntrySettings,
    layout: Layout,
) -> Result<ZipEntry> {
    let name = path.as_str().to_string();
    let (raw_name, name_utf8) = settings.charset.encode(&name);
    let comment = options.comment.clone().unwrap_or_default();
    let (raw_comment, comment_utf8) = settings.charset.encode(&comment);

    let mut flags = compression.flags();
    if name_utf8 || comment_utf8 {
        flags = flags.with(GeneralPurposeFlag::UTF8);
    }
    if layout == Layout::Descriptor {
        flags = flags.with(GeneralPurposeFlag::DATA_DESCRIPTOR);
    }

    let mtime = options.last_modified.unwrap_or_else(SystemTime::now);
    let mut extra = ExtraFields::new();
    if let Some(secs) = unix_secs(mtime) {
        extra.set(ExtraField::ExtendedTimestamp(ExtendedTimestamp {
            modified: Some(secs),
            accessed: None,
            created: None,
        }));
    }

    let mut version_needed = compression.version_needed();
    if path.is_directory() {
        version_needed = version_needed.max(version::DEFLATE);
    }
    match encryption {
        Encryption::None => {}
        Encryption::Pkware => {
            flags = flags.with(GeneralPurposeFlag::ENCRYPTED);
            version_needed = version_needed.max(version::DEFLATE);
        }
        Encryption::Aes {
            strength,
            vendor_version,
        } => {
            flags = flags.with(GeneralPurposeFlag::ENCRYPTED);
            version_needed = version_needed.max(version::AES);
            extra.set(ExtraField::Aes(AesExtraField {
                vendor_version: vendor_version.unwrap_or(AesVendorVersion::Ae1),
                strength,
                method: compression.method(),
            }));
        }
        Encryption::Strong { strength } => {
            flags = flags
                .with(GeneralPurposeFlag::ENCRYPTED)
                .with(GeneralPurposeFlag::STRONG_ENCRYPTION);
            version_needed = version_needed.max(version::AES);
            extra.set(ExtraField::StrongEncryption(StrongEncryptionField {
                format: StrongEncryptionField::FORMAT,
                algorithm: strength.algorithm(),
                bit_len: (strength.key_len() * 8) as u16,
                flags: FLAG_PASSWORD,
                cert_data: Vec::new(),
            }));
        }
    }

    let mode = options.unix_mode.unwrap_or(if path.is_directory() {
        DEFAULT_DIRECTORY_MODE
    } else {
        DEFAULT_FILE_MODE
    });
    let mut external_attributes = mode << 16;
    if path.is_directory() {
        external_attributes |= DOS_DIRECTORY;
    }

    Ok(ZipEntry {
        name,
        method: compression.method(),
        encryption,
        flags,
        crc32: 0,
        compressed_size: 0,
        uncompressed_size: 0,
        modified: DosDateTime::from_system_time(mtime),
        disk_start: 0,
        local_header_offset: 0,
        version_made_by: version::MADE_BY,
        version_needed,
        internal_attributes: 0,
        external_attributes,
        comment,
        extra,
        raw_name,
        raw_comment,
    })
}

fn unix_secs(time: SystemTime) -> Option<i32> {
    let secs = time.duration_since(SystemTime::UNIX_EPOCH).ok()?.as_secs();
    i32::try_from(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::local::LocalFileHeader;
    use crate::format::{SENTINEL_32, signature};
    use crate::write::ZipWriter;
    use tempfile::TempDir;

    const FOUR_GIB: u64 = 0x1_0000_0000;

    fn stored() -> EntrySettings {
        EntrySettings::new().with_compression(Compression::Store).unwrap()
    }

    /// Streams a short payload, then pretends the caller wrote `size` bytes.
    fn streamed(
        mode: Zip64Mode,
        settings: EntrySettings,
        size: u64,
    ) -> (TempDir, Result<ZipEntry>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        let mut zip = ZipWriter::create(&path, ZipSettings::new().with_zip64(mode)).unwrap();
        let mut entry = zip.start_entry("big.bin", settings).unwrap();
        entry.write_all(b"payload").unwrap();
        entry.written = size;
        let finished = entry.finish();
        if finished.is_ok() {
            zip.finish().unwrap();
        }
        (dir, finished)
    }

    fn archive_bytes(dir: &TempDir) -> Vec<u8> {
        std::fs::read(dir.path().join("a.zip")).unwrap()
    }

    #[test]
    fn test_unknown_size_reserves_local_zip64() {
        let (dir, finished) = streamed(Zip64Mode::Auto, stored(), FOUR_GIB);
        let entry = finished.unwrap();
        assert_eq!(entry.uncompressed_size, FOUR_GIB);
        assert!(entry.version_needed >= version::ZIP64);

        let bytes = archive_bytes(&dir);
        let lfh = LocalFileHeader::read(&mut bytes.as_slice(), 0).unwrap();
        assert_eq!(lfh.compressed_size, SENTINEL_32);
        assert_eq!(lfh.uncompressed_size, SENTINEL_32);
        assert!(lfh.extra.zip64().is_some());
        assert!(lfh.version_needed >= version::ZIP64);

        // 8-byte sizes in the descriptor, matching the header.
        let start = (lfh.len() + entry.compressed_size) as usize;
        let descriptor = DataDescriptor::read(&mut &bytes[start..], true).unwrap();
        assert_eq!(descriptor.uncompressed_size, FOUR_GIB);
        assert_eq!(descriptor.compressed_size, 7);
        let next = start + DataDescriptor::len(true) as usize;
        assert_eq!(bytes[next..next + 4], signature::CENTRAL_FILE_HEADER.to_le_bytes());
    }

    #[test]
    fn test_small_size_hint_keeps_classic_header() {
        let (dir, finished) = streamed(Zip64Mode::Auto, stored().with_size_hint(7), 7);
        let entry = finished.unwrap();
        assert!(entry.version_needed < version::ZIP64);

        let bytes = archive_bytes(&dir);
        let lfh = LocalFileHeader::read(&mut bytes.as_slice(), 0).unwrap();
        assert!(lfh.extra.zip64().is_none());
        let next = (lfh.len() + entry.compressed_size + DataDescriptor::len(false)) as usize;
        assert_eq!(bytes[next..next + 4], signature::CENTRAL_FILE_HEADER.to_le_bytes());
    }

    #[test]
    fn test_never_refuses_outgrown_stream() {
        let (_dir, finished) = streamed(Zip64Mode::Never, stored(), FOUR_GIB);
        let err = finished.unwrap_err();
        assert!(matches!(err.kind(), Error::UnsupportedFeature { .. }), "{err:?}");
        assert_eq!(err.entry_name(), Some("big.bin"));
    }
}
