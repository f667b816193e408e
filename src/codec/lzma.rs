//! LZMA (method 14) with the ZIP properties header.
//!
//! A ZIP LZMA payload starts with a 4-byte header (LZMA SDK major and minor
//! version, then the properties length as a little-endian word, always 5)
//! followed by the 5 properties bytes: the lc/lp/pb byte and the dictionary
//! size. The compressed stream itself carries no size; entries written here
//! end with an end-of-stream marker and set general-purpose bit 1.

use std::io::{self, Read, Write};

use crate::io::{ReadLeExt, WriteLeExt};
use crate::{Error, Result};

/// SDK version recorded in the header.
const SDK_VERSION: [u8; 2] = [9, 20];

/// Length of the lc/lp/pb byte plus dictionary size.
const PROPERTIES_LEN: u16 = 5;

fn codec_error(e: impl std::fmt::Display) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/// LZMA decoder.
pub struct LzmaDecoder<R> {
    inner: lzma_rust2::LzmaReader<R>,
}

impl<R> std::fmt::Debug for LzmaDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> LzmaDecoder<R> {
    /// Reads the ZIP LZMA header and starts decoding.
    ///
    /// `uncompressed_size` is `None` when the stream ends with an
    /// end-of-stream marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is truncated or declares a properties
    /// length other than 5.
    pub fn new(mut input: R, uncompressed_size: Option<u64>) -> Result<Self> {
        let _version = input.read_word()?;
        let properties_len = input.read_word()?;
        if properties_len != PROPERTIES_LEN {
            return Err(Error::InvalidFormat(format!(
                "LZMA properties length {} (expected {})",
                properties_len, PROPERTIES_LEN
            )));
        }
        let props_byte = input.read_byte()?;
        let dict_size = input.read_dword()?;

        let reader = lzma_rust2::LzmaReader::new_with_props(
            input,
            uncompressed_size.unwrap_or(u64::MAX),
            props_byte,
            dict_size,
            None,
        )
        .map_err(codec_error)?;

        Ok(Self { inner: reader })
    }

    /// Returns the compressed stream.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Read for LzmaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// LZMA encoder.
pub struct LzmaEncoder<W: Write> {
    inner: lzma_rust2::LzmaWriter<W>,
}

impl<W: Write> std::fmt::Debug for LzmaEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> LzmaEncoder<W> {
    /// Writes the ZIP LZMA header and starts encoding at preset `level`
    /// (0-9).
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written or the encoder
    /// cannot be initialized.
    pub fn new(mut output: W, level: u32) -> Result<Self> {
        let options = lzma_rust2::LzmaOptions::with_preset(level.min(9));

        output.write_all(&SDK_VERSION)?;
        output.write_word(PROPERTIES_LEN)?;
        output.write_byte(options.get_props())?;
        output.write_dword(options.dict_size)?;

        // Raw stream with an end marker: ZIP keeps the size in its headers.
        let writer =
            lzma_rust2::LzmaWriter::new_no_header(output, &options, true).map_err(codec_error)?;

        Ok(Self { inner: writer })
    }

    /// Writes the end marker and returns the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.inner.finish().map_err(|e| io::Error::other(e.to_string()))
    }
}

impl<W: Write> Write for LzmaEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
