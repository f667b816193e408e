//! Zstandard (method 93).

use std::io::{self, BufReader, Read, Write};

use zstd::stream::read::Decoder as StreamDecoder;
use zstd::stream::write::Encoder as StreamEncoder;

use crate::Result;

/// Zstandard decoder.
pub struct ZstdDecoder<R: Read> {
    inner: StreamDecoder<'static, BufReader<R>>,
}

impl<R: Read> std::fmt::Debug for ZstdDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> ZstdDecoder<R> {
    /// Creates a new Zstandard decoder.
    pub fn new(input: R) -> Result<Self> {
        Ok(Self {
            inner: StreamDecoder::new(input)?,
        })
    }

    /// Returns the compressed stream, dropping the read-ahead buffer.
    pub fn into_inner(self) -> R {
        self.inner.finish().into_inner()
    }
}

impl<R: Read> Read for ZstdDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Zstandard encoder.
pub struct ZstdEncoder<W: Write> {
    inner: StreamEncoder<'static, W>,
}

impl<W: Write> std::fmt::Debug for ZstdEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> ZstdEncoder<W> {
    /// Creates a new Zstandard encoder at `level` (1-22).
    pub fn new(output: W, level: i32) -> Result<Self> {
        Ok(Self {
            inner: StreamEncoder::new(output, level)?,
        })
    }

    /// Ends the frame and returns the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.inner.finish()
    }
}

impl<W: Write> Write for ZstdEncoder<W> {
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
    fn test_zstd_roundtrip() {
        let data = b"Zstandard in a ZIP entry. ".repeat(100);

        let mut encoder = ZstdEncoder::new(Vec::new(), 3).unwrap();
        for chunk in data.chunks(100) {
            encoder.write_all(chunk).unwrap();
        }
        let compressed = encoder.finish().unwrap();
        assert_eq!(&compressed[..4], &[0x28, 0xb5, 0x2f, 0xfd]);

        let mut decoder = ZstdDecoder::new(Cursor::new(&compressed)).unwrap();
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }
}
