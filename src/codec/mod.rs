//! Compression adapters.
//!
//! [`Compression`] is what a writer asks for; [`CompressionEncoder`] and
//! [`CompressionDecoder`] wrap the backend chosen for one entry behind the
//! plain `Write` / `Read` contract the entry pipeline drives with arbitrary
//! chunk sizes. Each backend lives behind a Cargo feature; asking for a
//! method whose feature is disabled fails with
//! [`Error::UnsupportedMethod`].

#[cfg(feature = "bzip2")]
pub mod bzip2;
#[cfg(feature = "deflate")]
pub mod deflate;
#[cfg(feature = "lzma")]
pub mod lzma;
#[cfg(feature = "zstd")]
pub mod zstd;

use std::io::{self, Read, Write};

use crate::format::flags::{DeflateOption, GeneralPurposeFlag};
use crate::format::method::CompressionMethod;
use crate::format::version;
use crate::{Error, Result};

#[cfg(feature = "bzip2")]
pub use self::bzip2::{Bzip2Decoder, Bzip2Encoder};
#[cfg(feature = "deflate")]
pub use self::deflate::{DeflateDecoder, DeflateEncoder};
#[cfg(feature = "lzma")]
pub use self::lzma::{LzmaDecoder, LzmaEncoder};
#[cfg(feature = "zstd")]
pub use self::zstd::{ZstdDecoder, ZstdEncoder};

/// Compression applied to an entry, with its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    Store,
    /// Raw Deflate, level 0-9.
    Deflate {
        /// Compression level.
        level: u32,
    },
    /// BZip2, level 1-9 (block size in units of 100 KB).
    Bzip2 {
        /// Compression level.
        level: u32,
    },
    /// LZMA with the ZIP properties header, preset 0-9.
    Lzma {
        /// Compression preset.
        level: u32,
    },
    /// Zstandard, level 1-22.
    Zstd {
        /// Compression level.
        level: i32,
    },
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Deflate { level: 6 }
    }
}

impl Compression {
    /// Method identifier written to the headers.
    pub fn method(self) -> CompressionMethod {
        match self {
            Compression::Store => CompressionMethod::Store,
            Compression::Deflate { .. } => CompressionMethod::Deflate,
            Compression::Bzip2 { .. } => CompressionMethod::Bzip2,
            Compression::Lzma { .. } => CompressionMethod::Lzma,
            Compression::Zstd { .. } => CompressionMethod::Zstd,
        }
    }

    /// Checks the level range and that the backend is compiled in.
    pub fn validate(self) -> Result<Self> {
        let (method, level, range) = match self {
            Compression::Store => return Ok(self),
            Compression::Deflate { level } => ("Deflate", level as i32, 0..=9),
            Compression::Bzip2 { level } => ("BZip2", level as i32, 1..=9),
            Compression::Lzma { level } => ("LZMA", level as i32, 0..=9),
            Compression::Zstd { level } => ("Zstandard", level, 1..=22),
        };
        if !range.contains(&level) {
            return Err(Error::InvalidCompressionLevel { method, level });
        }
        self.method().ensure_supported()?;
        Ok(self)
    }

    /// General-purpose flag bits this compression sets.
    pub fn flags(self) -> GeneralPurposeFlag {
        match self {
            Compression::Deflate { level } => {
                GeneralPurposeFlag::default().with_deflate_option(DeflateOption::for_level(level))
            }
            Compression::Lzma { .. } => {
                GeneralPurposeFlag::default().with(GeneralPurposeFlag::LZMA_EOS_MARKER)
            }
            _ => GeneralPurposeFlag::default(),
        }
    }

    /// Minimum version needed to extract data compressed this way.
    pub fn version_needed(self) -> u16 {
        match self {
            Compression::Store => version::DEFAULT,
            Compression::Deflate { .. } => version::DEFLATE,
            Compression::Bzip2 { .. } => version::BZIP2,
            Compression::Lzma { .. } | Compression::Zstd { .. } => version::LZMA,
        }
    }
}

/// The compressing stage of an entry's write chain.
pub enum CompressionEncoder<W: Write> {
    /// Pass-through.
    Store(W),
    /// Deflate.
    #[cfg(feature = "deflate")]
    Deflate(DeflateEncoder<W>),
    /// BZip2.
    #[cfg(feature = "bzip2")]
    Bzip2(Bzip2Encoder<W>),
    /// LZMA.
    #[cfg(feature = "lzma")]
    Lzma(LzmaEncoder<W>),
    /// Zstandard.
    #[cfg(feature = "zstd")]
    Zstd(ZstdEncoder<W>),
}

impl<W: Write> std::fmt::Debug for CompressionEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompressionEncoder::Store(_) => "Store",
            #[cfg(feature = "deflate")]
            CompressionEncoder::Deflate(_) => "Deflate",
            #[cfg(feature = "bzip2")]
            CompressionEncoder::Bzip2(_) => "Bzip2",
            #[cfg(feature = "lzma")]
            CompressionEncoder::Lzma(_) => "Lzma",
            #[cfg(feature = "zstd")]
            CompressionEncoder::Zstd(_) => "Zstd",
        };
        f.debug_tuple("CompressionEncoder").field(&name).finish()
    }
}

impl<W: Write> CompressionEncoder<W> {
    /// Builds the encoder for `compression` on top of `inner`.
    ///
    /// The LZMA encoder writes its properties header immediately.
    pub fn new(compression: Compression, inner: W) -> Result<Self> {
        let compression = compression.validate()?;
        Ok(match compression {
            Compression::Store => CompressionEncoder::Store(inner),
            #[cfg(feature = "deflate")]
            Compression::Deflate { level } => {
                CompressionEncoder::Deflate(DeflateEncoder::new(inner, level))
            }
            #[cfg(feature = "bzip2")]
            Compression::Bzip2 { level } => {
                CompressionEncoder::Bzip2(Bzip2Encoder::new(inner, level))
            }
            #[cfg(feature = "lzma")]
            Compression::Lzma { level } => {
                CompressionEncoder::Lzma(LzmaEncoder::new(inner, level)?)
            }
            #[cfg(feature = "zstd")]
            Compression::Zstd { level } => {
                CompressionEncoder::Zstd(ZstdEncoder::new(inner, level)?)
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(Error::UnsupportedMethod {
                    method_id: other.method().id(),
                });
            }
        })
    }

    /// Flushes the backend's buffered output and returns the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            CompressionEncoder::Store(w) => Ok(w),
            #[cfg(feature = "deflate")]
            CompressionEncoder::Deflate(e) => e.finish(),
            #[cfg(feature = "bzip2")]
            CompressionEncoder::Bzip2(e) => e.finish(),
            #[cfg(feature = "lzma")]
            CompressionEncoder::Lzma(e) => e.finish(),
            #[cfg(feature = "zstd")]
            CompressionEncoder::Zstd(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for CompressionEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressionEncoder::Store(w) => w.write(buf),
            #[cfg(feature = "deflate")]
            CompressionEncoder::Deflate(e) => e.write(buf),
            #[cfg(feature = "bzip2")]
            CompressionEncoder::Bzip2(e) => e.write(buf),
            #[cfg(feature = "lzma")]
            CompressionEncoder::Lzma(e) => e.write(buf),
            #[cfg(feature = "zstd")]
            CompressionEncoder::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressionEncoder::Store(w) => w.flush(),
            #[cfg(feature = "deflate")]
            CompressionEncoder::Deflate(e) => e.flush(),
            #[cfg(feature = "bzip2")]
            CompressionEncoder::Bzip2(e) => e.flush(),
            #[cfg(feature = "lzma")]
            CompressionEncoder::Lzma(e) => e.flush(),
            #[cfg(feature = "zstd")]
            CompressionEncoder::Zstd(e) => e.flush(),
        }
    }
}

/// The decompressing stage of an entry's read chain.
pub enum CompressionDecoder<R: Read> {
    /// Pass-through.
    Store(R),
    /// Deflate.
    #[cfg(feature = "deflate")]
    Deflate(DeflateDecoder<R>),
    /// BZip2.
    #[cfg(feature = "bzip2")]
    Bzip2(Bzip2Decoder<R>),
    /// LZMA.
    #[cfg(feature = "lzma")]
    Lzma(LzmaDecoder<R>),
    /// Zstandard.
    #[cfg(feature = "zstd")]
    Zstd(ZstdDecoder<R>),
}

impl<R: Read> std::fmt::Debug for CompressionDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompressionDecoder::Store(_) => "Store",
            #[cfg(feature = "deflate")]
            CompressionDecoder::Deflate(_) => "Deflate",
            #[cfg(feature = "bzip2")]
            CompressionDecoder::Bzip2(_) => "Bzip2",
            #[cfg(feature = "lzma")]
            CompressionDecoder::Lzma(_) => "Lzma",
            #[cfg(feature = "zstd")]
            CompressionDecoder::Zstd(_) => "Zstd",
        };
        f.debug_tuple("CompressionDecoder").field(&name).finish()
    }
}

impl<R: Read> CompressionDecoder<R> {
    /// Builds the decoder for an entry's method.
    ///
    /// `uncompressed_size` bounds LZMA streams written without an end
    /// marker.
    #[cfg_attr(not(feature = "lzma"), allow(unused_variables))]
    pub fn new(
        method: CompressionMethod,
        flags: GeneralPurposeFlag,
        uncompressed_size: u64,
        inner: R,
    ) -> Result<Self> {
        method.ensure_supported()?;
        Ok(match method {
            CompressionMethod::Store => CompressionDecoder::Store(inner),
            #[cfg(feature = "deflate")]
            CompressionMethod::Deflate => CompressionDecoder::Deflate(DeflateDecoder::new(inner)),
            #[cfg(feature = "bzip2")]
            CompressionMethod::Bzip2 => CompressionDecoder::Bzip2(Bzip2Decoder::new(inner)),
            #[cfg(feature = "lzma")]
            CompressionMethod::Lzma => {
                let size = (!flags.has_lzma_eos_marker()).then_some(uncompressed_size);
                CompressionDecoder::Lzma(LzmaDecoder::new(inner, size)?)
            }
            #[cfg(feature = "zstd")]
            CompressionMethod::Zstd => CompressionDecoder::Zstd(ZstdDecoder::new(inner)?),
            other => {
                return Err(Error::UnsupportedMethod { method_id: other.id() });
            }
        })
    }

    /// Unwraps the decoder, returning the stream it was reading.
    ///
    /// Only meaningful once the decoder reported end of stream; bytes the
    /// backend read ahead are not handed back.
    pub fn into_inner(self) -> R {
        match self {
            CompressionDecoder::Store(r) => r,
            #[cfg(feature = "deflate")]
            CompressionDecoder::Deflate(d) => d.into_inner(),
            #[cfg(feature = "bzip2")]
            CompressionDecoder::Bzip2(d) => d.into_inner(),
            #[cfg(feature = "lzma")]
            CompressionDecoder::Lzma(d) => d.into_inner(),
            #[cfg(feature = "zstd")]
            CompressionDecoder::Zstd(d) => d.into_inner(),
        }
    }
}

impl<R: Read> Read for CompressionDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            CompressionDecoder::Store(r) => r.read(buf),
            #[cfg(feature = "deflate")]
            CompressionDecoder::Deflate(d) => d.read(buf),
            #[cfg(feature = "bzip2")]
            CompressionDecoder::Bzip2(d) => d.read(buf),
            #[cfg(feature = "lzma")]
            CompressionDecoder::Lzma(d) => d.read(buf),
            #[cfg(feature = "zstd")]
            CompressionDecoder::Zstd(d) => d.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Vec<u8> {
        let mut data = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(200);
        data.extend((0..4096u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8));
        data
    }

    fn round_trip(compression: Compression) {
        let data = sample();
        let mut enc = CompressionEncoder::new(compression, Vec::new()).unwrap();
        for chunk in data.chunks(333) {
            enc.write_all(chunk).unwrap();
        }
        let stored = enc.finish().unwrap();

        let mut dec = CompressionDecoder::new(
            compression.method(),
            compression.flags(),
            data.len() as u64,
            Cursor::new(stored),
        )
        .unwrap();
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, data, "{:?}", compression);
    }

    #[test]
    fn test_store_is_identity() {
        let mut enc = CompressionEncoder::new(Compression::Store, Vec::new()).unwrap();
        enc.write_all(b"abc").unwrap();
        assert_eq!(enc.finish().unwrap(), b"abc");
        round_trip(Compression::Store);
    }

    #[test]
    fn test_every_backend_round_trips() {
        #[cfg(feature = "deflate")]
        {
            round_trip(Compression::Deflate { level: 0 });
            round_trip(Compression::Deflate { level: 9 });
        }
        #[cfg(feature = "bzip2")]
        round_trip(Compression::Bzip2 { level: 1 });
        #[cfg(feature = "lzma")]
        round_trip(Compression::Lzma { level: 1 });
        #[cfg(feature = "zstd")]
        round_trip(Compression::Zstd { level: 3 });
    }

    #[test]
    fn test_level_validation() {
        assert!(matches!(
            Compression::Deflate { level: 10 }.validate(),
            Err(Error::InvalidCompressionLevel { level: 10, .. })
        ));
        assert!(Compression::Bzip2 { level: 0 }.validate().is_err());
        assert!(Compression::Zstd { level: 23 }.validate().is_err());
        assert!(Compression::Store.validate().is_ok());
    }

    #[test]
    fn test_flags_and_versions() {
        let fast = Compression::Deflate { level: 1 };
        assert_eq!(fast.flags().deflate_option(), DeflateOption::SuperFast);
        assert_eq!(fast.version_needed(), 20);
        assert!(Compression::Lzma { level: 6 }.flags().has_lzma_eos_marker());
        assert_eq!(Compression::Zstd { level: 3 }.version_needed(), 63);
        assert_eq!(Compression::Bzip2 { level: 9 }.version_needed(), 46);
        assert_eq!(Compression::Store.flags().bits(), 0);
    }

    #[test]
    fn test_unsupported_method_on_read() {
        let err = CompressionDecoder::new(
            CompressionMethod::Implode,
            GeneralPurposeFlag::default(),
            0,
            Cursor::new(Vec::new()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod { method_id: 6 }));
    }
}
