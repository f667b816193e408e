//! Compression method identifiers.

use crate::{Error, Result};

/// A compression method as identified in ZIP headers.
///
/// Every identifier the application note assigns is listed so that an
/// archive using one this crate cannot decode is reported as
/// [`Error::UnsupportedMethod`] rather than malformed. Identifiers the note
/// does not assign at all parse to [`CompressionMethod::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CompressionMethod {
    /// 0: no compression.
    Store,
    /// 1: Shrink.
    Shrink,
    /// 2-5: Reduce with compression factor 1-4.
    Reduce(u8),
    /// 6: Implode.
    Implode,
    /// 8: Deflate.
    Deflate,
    /// 9: Deflate64.
    Deflate64,
    /// 10: PKWARE DCL Implode.
    DclImplode,
    /// 12: BZip2.
    Bzip2,
    /// 14: LZMA.
    Lzma,
    /// 18: IBM TERSE.
    Terse,
    /// 19: IBM LZ77 z Architecture.
    Lz77,
    /// 93: Zstandard.
    Zstd,
    /// 94: MP3.
    Mp3,
    /// 95: XZ.
    Xz,
    /// 96: JPEG variant.
    Jpeg,
    /// 97: WavPack.
    WavPack,
    /// 98: PPMd version I, Rev 1.
    Ppmd,
    /// 99: marker for WinZip AES; the real method is in the AES extra field.
    Aes,
    /// Any identifier the format does not define.
    Unknown(u16),
}

impl CompressionMethod {
    /// Maps a wire identifier.
    pub fn from_id(id: u16) -> Self {
        match id {
            0 => Self::Store,
            1 => Self::Shrink,
            2..=5 => Self::Reduce((id - 1) as u8),
            6 => Self::Implode,
            8 => Self::Deflate,
            9 => Self::Deflate64,
            10 => Self::DclImplode,
            12 => Self::Bzip2,
            14 => Self::Lzma,
            18 => Self::Terse,
            19 => Self::Lz77,
            93 => Self::Zstd,
            94 => Self::Mp3,
            95 => Self::Xz,
            96 => Self::Jpeg,
            97 => Self::WavPack,
            98 => Self::Ppmd,
            99 => Self::Aes,
            other => Self::Unknown(other),
        }
    }

    /// Returns the wire identifier.
    pub fn id(self) -> u16 {
        match self {
            Self::Store => 0,
            Self::Shrink => 1,
            Self::Reduce(factor) => factor as u16 + 1,
            Self::Implode => 6,
            Self::Deflate => 8,
            Self::Deflate64 => 9,
            Self::DclImplode => 10,
            Self::Bzip2 => 12,
            Self::Lzma => 14,
            Self::Terse => 18,
            Self::Lz77 => 19,
            Self::Zstd => 93,
            Self::Mp3 => 94,
            Self::Xz => 95,
            Self::Jpeg => 96,
            Self::WavPack => 97,
            Self::Ppmd => 98,
            Self::Aes => 99,
            Self::Unknown(id) => id,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Store => "Store",
            Self::Shrink => "Shrink",
            Self::Reduce(_) => "Reduce",
            Self::Implode => "Implode",
            Self::Deflate => "Deflate",
            Self::Deflate64 => "Deflate64",
            Self::DclImplode => "DCL Implode",
            Self::Bzip2 => "BZip2",
            Self::Lzma => "LZMA",
            Self::Terse => "TERSE",
            Self::Lz77 => "LZ77",
            Self::Zstd => "Zstandard",
            Self::Mp3 => "MP3",
            Self::Xz => "XZ",
            Self::Jpeg => "JPEG",
            Self::WavPack => "WavPack",
            Self::Ppmd => "PPMd",
            Self::Aes => "AES",
            Self::Unknown(_) => "Unknown",
        }
    }

    /// Returns `true` if this build can decode the method.
    pub fn is_supported(self) -> bool {
        match self {
            Self::Store => true,
            Self::Deflate => cfg!(feature = "deflate"),
            Self::Bzip2 => cfg!(feature = "bzip2"),
            Self::Lzma => cfg!(feature = "lzma"),
            Self::Zstd => cfg!(feature = "zstd"),
            _ => false,
        }
    }

    /// Fails with the right error kind unless the method can be decoded.
    pub fn ensure_supported(self) -> Result<()> {
        match self {
            Self::Unknown(method_id) => Err(Error::UnknownMethod { method_id }),
            m if m.is_supported() => Ok(()),
            m => Err(Error::UnsupportedMethod { method_id: m.id() }),
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for id in [0u16, 1, 2, 3, 4, 5, 6, 8, 9, 10, 12, 14, 18, 19, 93, 94, 95, 96, 97, 98, 99] {
            let method = CompressionMethod::from_id(id);
            assert!(!matches!(method, CompressionMethod::Unknown(_)), "id {}", id);
            assert_eq!(method.id(), id);
        }
        assert_eq!(CompressionMethod::from_id(7), CompressionMethod::Unknown(7));
        assert_eq!(CompressionMethod::from_id(4), CompressionMethod::Reduce(3));
    }

    #[test]
    fn test_support_errors() {
        assert!(CompressionMethod::Store.ensure_supported().is_ok());
        assert!(matches!(
            CompressionMethod::Ppmd.ensure_supported(),
            Err(Error::UnsupportedMethod { method_id: 98 })
        ));
        assert!(matches!(
            CompressionMethod::Unknown(200).ensure_supported(),
            Err(Error::UnknownMethod { method_id: 200 })
        ));
    }
}
