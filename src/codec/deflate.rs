//! Raw Deflate (method 8).
//!
//! ZIP stores a bare Deflate stream with no zlib header or Adler-32
//! trailer, which is exactly what flate2's `DeflateEncoder` produces.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder as FlateDecoder;
use flate2::write::DeflateEncoder as FlateEncoder;

/// Deflate decoder.
pub struct DeflateDecoder<R> {
    inner: FlateDecoder<R>,
}

impl<R> std::fmt::Debug for DeflateDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> DeflateDecoder<R> {
    /// Creates a new Deflate decoder.
    pub fn new(input: R) -> Self {
        Self {
            inner: FlateDecoder::new(input),
        }
    }

    /// Returns the compressed stream. Input the decoder buffered is lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Read for DeflateDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Deflate encoder.
pub struct DeflateEncoder<W: Write> {
    inner: FlateEncoder<W>,
}

impl<W: Write> std::fmt::Debug for DeflateEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> DeflateEncoder<W> {
    /// Creates a new Deflate encoder at `level` (0-9).
    pub fn new(output: W, level: u32) -> Self {
        Self {
            inner: FlateEncoder::new(output, Compression::new(level.min(9))),
        }
    }

    /// Writes the final block and returns the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.inner.finish()
    }
}

impl<W: Write> Write for DeflateEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_deflate_roundtrip() {
        let data = b"Hello, World! This is a test of Deflate compression.";

        let mut encoder = DeflateEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut decoder = DeflateDecoder::new(Cursor::new(&compressed));
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();

        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_no_zlib_header() {
        let mut encoder = DeflateEncoder::new(Vec::new(), 9);
        encoder.write_all(&[0u8; 1000]).unwrap();
        let compressed = encoder.finish().unwrap();
        // A zlib stream would start with CMF 0x78.
        assert_ne!(compressed[0], 0x78);
    }

    #[test]
    fn test_stops_at_end_of_stream() {
        let mut encoder = DeflateEncoder::new(Vec::new(), 6);
        encoder.write_all(b"payload").unwrap();
        let mut stored = encoder.finish().unwrap();
        let len = stored.len();
        stored.extend_from_slice(b"PK\x07\x08trailing");

        let mut cursor = Cursor::new(&stored);
        let mut out = Vec::new();
        DeflateDecoder::new(&mut cursor).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"payload");
        assert!(cursor.position() as usize >= len);
    }
}
