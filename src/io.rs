//! Little-endian primitive I/O and the byte sink/source seams.
//!
//! Every ZIP record is a sequence of little-endian words (16 bit), dwords
//! (32 bit) and qwords (64 bit). [`ReadLeExt`] and [`WriteLeExt`] add those
//! primitives to any `Read`/`Write`. [`DataSink`] is the write-side seam the
//! entry pipeline appends to: it knows which disk and offset the next byte
//! lands on and can keep a signature from straddling two volumes.
//!
//! The read-side counterpart is [`crate::volume::SplitReader`], which
//! implements `Read + Seek` over one or many volume files.

use std::io::{self, Read, Write};

use crate::READ_BUFFER_SIZE;

/// Little-endian read helpers.
pub trait ReadLeExt: Read {
    /// Reads one byte.
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a little-endian 16-bit word.
    fn read_word(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Reads a little-endian 32-bit dword.
    fn read_dword(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads a little-endian 64-bit qword.
    fn read_qword(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads exactly `len` bytes.
    fn read_vec(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads up to `len` bytes, returning fewer only at end of data.
    ///
    /// Never fails because data ran out; an empty vector means EOF.
    fn read_up_to(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(READ_BUFFER_SIZE));
        Read::take(&mut *self, len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Discards up to `count` bytes, returning how many were skipped.
    fn skip(&mut self, count: u64) -> io::Result<u64> {
        io::copy(&mut Read::take(&mut *self, count), &mut io::sink())
    }
}

impl<R: Read + ?Sized> ReadLeExt for R {}

/// Little-endian write helpers.
pub trait WriteLeExt: Write {
    /// Writes one byte.
    fn write_byte(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    /// Writes a little-endian 16-bit word.
    fn write_word(&mut self, value: u16) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    /// Writes a little-endian 32-bit dword.
    fn write_dword(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    /// Writes a little-endian 64-bit qword.
    fn write_qword(&mut self, value: u64) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }
}

impl<W: Write + ?Sized> WriteLeExt for W {}

/// Output position in a possibly split archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkPosition {
    /// 0-based disk number.
    pub disk: u32,
    /// Offset within that disk.
    pub offset: u64,
}

/// Byte sink the archive is written to.
pub trait DataSink: Write {
    /// Position the next written byte will occupy.
    fn position(&self) -> SinkPosition;

    /// Total bytes written across all disks.
    fn total_written(&self) -> u64;

    /// Makes sure the next `len` bytes land in a single volume.
    ///
    /// Split sinks start a new volume when fewer than `len` bytes remain in
    /// the current one. Call before every record signature.
    fn reserve_contiguous(&mut self, len: u64) -> io::Result<()>;

    /// Number of disks used so far (1 for a single-file archive).
    fn disk_count(&self) -> u32 {
        self.position().disk + 1
    }

    /// Returns `true` if the sink spans multiple volume files.
    fn is_split(&self) -> bool {
        false
    }
}

impl<S: DataSink + ?Sized> DataSink for &mut S {
    fn position(&self) -> SinkPosition {
        (**self).position()
    }

    fn total_written(&self) -> u64 {
        (**self).total_written()
    }

    fn reserve_contiguous(&mut self, len: u64) -> io::Result<()> {
        (**self).reserve_contiguous(len)
    }

    fn disk_count(&self) -> u32 {
        (**self).disk_count()
    }

    fn is_split(&self) -> bool {
        (**self).is_split()
    }
}

/// A single-volume sink over any writer, counting bytes written.
#[derive(Debug)]
pub struct FileSink<W> {
    inner: W,
    written: u64,
}

impl<W: Write> FileSink<W> {
    /// Wraps a writer; offsets start at 0.
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Returns a reference to the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Flushes and returns the inner writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for FileSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> DataSink for FileSink<W> {
    fn position(&self) -> SinkPosition {
        SinkPosition {
            disk: 0,
            offset: self.written,
        }
    }

    fn total_written(&self) -> u64 {
        self.written
    }

    fn reserve_contiguous(&mut self, _len: u64) -> io::Result<()> {
        Ok(())
    }
}

/// Counts bytes passing through a writer.
#[derive(Debug)]
pub(crate) struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
