//! General-purpose bit flag.

/// The 16-bit general-purpose flag of local and central headers.
///
/// ```rust
/// use zipspan::format::flags::GeneralPurposeFlag;
///
/// let flag = GeneralPurposeFlag::default()
///     .with(GeneralPurposeFlag::ENCRYPTED)
///     .with(GeneralPurposeFlag::DATA_DESCRIPTOR);
/// assert!(flag.is_encrypted());
/// assert!(flag.has_data_descriptor());
/// assert_eq!(flag.bits(), 0x0009);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct GeneralPurposeFlag(u16);

impl GeneralPurposeFlag {
    /// Bit 0: the entry is encrypted.
    pub const ENCRYPTED: u16 = 1 << 0;
    /// Bit 1: Deflate level bit 1, or the LZMA end-of-stream marker.
    pub const LZMA_EOS_MARKER: u16 = 1 << 1;
    /// Bit 3: sizes and CRC follow the payload in a data descriptor.
    pub const DATA_DESCRIPTOR: u16 = 1 << 3;
    /// Bit 6: strong encryption.
    pub const STRONG_ENCRYPTION: u16 = 1 << 6;
    /// Bit 11: name and comment are UTF-8.
    pub const UTF8: u16 = 1 << 11;
    /// Bit 13: local header values are masked (central directory encryption).
    pub const MASKED_LOCAL_HEADER: u16 = 1 << 13;

    const DEFLATE_LEVEL_MASK: u16 = 0b110;

    /// Wraps raw flag bits.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns the raw flag bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns `true` if all bits of `mask` are set.
    pub const fn contains(self, mask: u16) -> bool {
        self.0 & mask == mask
    }

    /// Returns a copy with `mask` set.
    #[must_use]
    pub const fn with(self, mask: u16) -> Self {
        Self(self.0 | mask)
    }

    /// Returns a copy with `mask` cleared.
    #[must_use]
    pub const fn without(self, mask: u16) -> Self {
        Self(self.0 & !mask)
    }

    /// Bit 0.
    pub const fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }

    /// Bit 3.
    pub const fn has_data_descriptor(self) -> bool {
        self.contains(Self::DATA_DESCRIPTOR)
    }

    /// Bit 6.
    pub const fn is_strong_encryption(self) -> bool {
        self.contains(Self::STRONG_ENCRYPTION)
    }

    /// Bit 11.
    pub const fn is_utf8(self) -> bool {
        self.contains(Self::UTF8)
    }

    /// Bit 1 read as the LZMA end-of-stream marker flag.
    pub const fn has_lzma_eos_marker(self) -> bool {
        self.contains(Self::LZMA_EOS_MARKER)
    }

    /// Bits 1-2 read as the Deflate option.
    pub const fn deflate_option(self) -> DeflateOption {
        match (self.0 & Self::DEFLATE_LEVEL_MASK) >> 1 {
            0 => DeflateOption::Normal,
            1 => DeflateOption::Maximum,
            2 => DeflateOption::Fast,
            _ => DeflateOption::SuperFast,
        }
    }

    /// Returns a copy with bits 1-2 set for a Deflate option.
    #[must_use]
    pub const fn with_deflate_option(self, option: DeflateOption) -> Self {
        let bits = match option {
            DeflateOption::Normal => 0,
            DeflateOption::Maximum => 1,
            DeflateOption::Fast => 2,
            DeflateOption::SuperFast => 3,
        };
        Self((self.0 & !Self::DEFLATE_LEVEL_MASK) | (bits << 1))
    }
}

/// Deflate compression option recorded in flag bits 1-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeflateOption {
    /// Levels 3-8.
    Normal,
    /// Level 9.
    Maximum,
    /// Level 2.
    Fast,
    /// Levels 0-1.
    SuperFast,
}

impl DeflateOption {
    /// The option a Deflate level maps to.
    pub fn for_level(level: u32) -> Self {
        match level {
            0 | 1 => DeflateOption::SuperFast,
            2 => DeflateOption::Fast,
            9.. => DeflateOption::Maximum,
            _ => DeflateOption::Normal,
        }
    }
}
