//! The verifying read pipeline of one entry.

use std::io::{self, Read, Take};

use crate::checksum::{Checksum, Crc32};
use crate::codec::CompressionDecoder;
use crate::crypto::{DecryptParams, EncryptionDecoder, Password};
use crate::entry::ZipEntry;
use crate::volume::SplitReader;
use crate::{Error, Result};

type Decrypted = EncryptionDecoder<Take<SplitReader>>;

/// Streams the plaintext of one entry.
///
/// Reading decrypts and decompresses the stored payload. When the
/// decompressor reports the end of the stream the reader unwraps it and
/// drains the decryption layer (checking a MAC or padding), then compares
/// the byte count and CRC-32 against the central directory. A mismatch is
/// reported as an error from `read`, never as a short successful read.
#[derive(Debug)]
pub struct EntryReader {
    /// `None` once the stream has ended and been verified.
    decoder: Option<CompressionDecoder<Decrypted>>,
    name: String,
    expected_crc: Option<u32>,
    expected_size: u64,
    crc: Crc32,
    read: u64,
    done: bool,
}

impl EntryReader {
    /// Builds the pipeline over `source`, positioned just past the local
    /// header. Password checks happen here, before any payload is read.
    pub(crate) fn new(
        entry: &ZipEntry,
        source: SplitReader,
        password: Option<&Password>,
    ) -> Result<Self> {
        let params = DecryptParams {
            compressed_size: entry.compressed_size,
            crc32: entry.crc32,
            uncompressed_size: entry.uncompressed_size,
            check_byte: entry.check_byte(),
        };
        let payload = source.take(entry.compressed_size);
        let decryptor = EncryptionDecoder::new(entry.encryption, password, params, payload)?;
        let decoder =
            CompressionDecoder::new(entry.method, entry.flags, entry.uncompressed_size, decryptor)?;
        Ok(Self {
            decoder: Some(decoder),
            name: entry.name.clone(),
            expected_crc: entry.has_crc().then_some(entry.crc32),
            expected_size: entry.uncompressed_size,
            crc: Crc32::new(),
            read: 0,
            done: false,
        })
    }

    /// Name of the entry being read.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed size recorded in the central directory.
    pub fn expected_size(&self) -> u64 {
        self.expected_size
    }

    /// Plaintext bytes returned so far.
    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    fn verify(&mut self, decoder: CompressionDecoder<Decrypted>) -> Result<()> {
        decoder.into_inner().finish()?;
        if self.read != self.expected_size {
            return Err(Error::SizeMismatch {
                entry_name: None,
                expected: self.expected_size,
                actual: self.read,
            });
        }
        if let Some(expected) = self.expected_crc {
            let actual = self.crc.finalize();
            if actual != expected {
                return Err(Error::CrcMismatch {
                    entry_name: None,
                    expected,
                    actual,
                });
            }
        }
        log::trace!("verified '{}': {} bytes", self.name, self.read);
        Ok(())
    }

    fn fail(&mut self, error: Error) -> io::Error {
        self.done = true;
        io::Error::from(error.with_entry(&self.name))
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(0);
        };
        let n = match decoder.read(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(e),
            Err(e) => return Err(self.fail(Error::from(e))),
        };
        if n == 0 {
            self.done = true;
            let Some(decoder) = self.decoder.take() else {
                return Ok(0);
            };
            return match self.verify(decoder) {
                Ok(()) => Ok(0),
                Err(e) => Err(self.fail(e)),
            };
        }

        self.read += n as u64;
        if self.read > self.expected_size {
            let error = Error::SizeMismatch {
                entry_name: None,
                expected: self.expected_size,
                actual: self.read,
            };
            return Err(self.fail(error));
        }
        self.crc.update(&buf[..n]);
        Ok(n)
    }
}
