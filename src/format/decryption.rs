//! Strong encryption records: the decryption header that precedes an
//! encrypted payload (or an encrypted central directory), and the
//! algorithm identifiers it uses.

use std::io::{Read, Write};

use crate::io::{ReadLeExt, WriteLeExt};
use crate::{Error, Result};

/// Strong encryption algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionAlgorithm {
    /// 0x6601
    Des,
    /// 0x6602, RC2 before version 5.2
    Rc2Old,
    /// 0x6603
    TripleDes168,
    /// 0x6609
    TripleDes112,
    /// 0x660E
    Aes128,
    /// 0x660F
    Aes192,
    /// 0x6610
    Aes256,
    /// 0x6702
    Rc2,
    /// 0x6720
    Blowfish,
    /// 0x6721
    Twofish,
    /// 0x6801
    Rc4,
    /// Anything else.
    Unknown(u16),
}

impl EncryptionAlgorithm {
    /// Maps a wire identifier.
    pub fn from_id(id: u16) -> Self {
        match id {
            0x6601 => Self::Des,
            0x6602 => Self::Rc2Old,
            0x6603 => Self::TripleDes168,
            0x6609 => Self::TripleDes112,
            0x660E => Self::Aes128,
            0x660F => Self::Aes192,
            0x6610 => Self::Aes256,
            0x6702 => Self::Rc2,
            0x6720 => Self::Blowfish,
            0x6721 => Self::Twofish,
            0x6801 => Self::Rc4,
            other => Self::Unknown(other),
        }
    }

    /// Returns the wire identifier.
    pub fn id(self) -> u16 {
        match self {
            Self::Des => 0x6601,
            Self::Rc2Old => 0x6602,
            Self::TripleDes168 => 0x6603,
            Self::TripleDes112 => 0x6609,
            Self::Aes128 => 0x660E,
            Self::Aes192 => 0x660F,
            Self::Aes256 => 0x6610,
            Self::Rc2 => 0x6702,
            Self::Blowfish => 0x6720,
            Self::Twofish => 0x6721,
            Self::Rc4 => 0x6801,
            Self::Unknown(id) => id,
        }
    }

    /// AES key length in bytes, or `None` for algorithms other than AES.
    pub fn aes_key_len(self) -> Option<usize> {
        match self {
            Self::Aes128 => Some(16),
            Self::Aes192 => Some(24),
            Self::Aes256 => Some(32),
            _ => None,
        }
    }

    /// Key length in bits as recorded next to the identifier.
    pub fn bit_len(self) -> Option<u16> {
        self.aes_key_len().map(|len| (len * 8) as u16)
    }

    /// Name used in error messages.
    pub fn name(self) -> String {
        match self {
            Self::Des => "DES".into(),
            Self::Rc2Old | Self::Rc2 => "RC2".into(),
            Self::TripleDes168 => "3DES-168".into(),
            Self::TripleDes112 => "3DES-112".into(),
            Self::Aes128 => "AES-128".into(),
            Self::Aes192 => "AES-192".into(),
            Self::Aes256 => "AES-256".into(),
            Self::Blowfish => "Blowfish".into(),
            Self::Twofish => "Twofish".into(),
            Self::Rc4 => "RC4".into(),
            Self::Unknown(id) => format!("algorithm {:#06x}", id),
        }
    }
}

/// Decryption header flag: a password is required.
pub const FLAG_PASSWORD: u16 = 0x0001;
/// Decryption header flag: certificates are required.
pub const FLAG_CERTIFICATES: u16 = 0x0002;
/// Decryption header flag: 3DES with 168-bit keys (legacy marker).
pub const FLAG_3DES: u16 = 0x4000;

/// Header format value; only format 3 is defined.
pub const FORMAT: u16 = 3;

/// Length of the initialization vector when it is stored explicitly.
pub const IV_LEN: usize = 16;

/// Decryption header placed before an entry's strongly encrypted payload.
///
/// An IV size of 0 means the IV is derived from the entry's CRC and size.
/// The recipient-list area that follows the random data must be empty;
/// certificate-based encryption is not supported.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptionHeader {
    /// Stored IV; empty when the IV is derived.
    pub iv: Vec<u8>,
    /// Header format (3).
    pub format: u16,
    /// Encryption algorithm.
    pub algorithm: EncryptionAlgorithm,
    /// Key length in bits.
    pub bit_len: u16,
    /// Processing flags.
    pub flags: u16,
    /// Encrypted random data.
    pub erd: Vec<u8>,
    /// Encrypted password validation data.
    pub validation: Vec<u8>,
}

impl std::fmt::Debug for DecryptionHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionHeader")
            .field("iv_len", &self.iv.len())
            .field("algorithm", &self.algorithm)
            .field("bit_len", &self.bit_len)
            .field("flags", &self.flags)
            .field("erd_len", &self.erd.len())
            .field("validation_len", &self.validation.len())
            .finish()
    }
}

impl DecryptionHeader {
    /// Reads and structurally validates a header.
    ///
    /// Algorithm support is not checked here; that is the cipher's concern.
    pub fn read<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let iv_size = r.read_word()? as usize;
        if iv_size != 0 && iv_size != IV_LEN {
            return Err(Error::InvalidFormat(format!(
                "decryption header IV size {} is neither 0 nor {}",
                iv_size, IV_LEN
            )));
        }
        let iv = r.read_vec(iv_size)?;
        let remaining = r.read_dword()? as usize;
        let format = r.read_word()?;
        if format != FORMAT {
            return Err(Error::InvalidFormat(format!(
                "decryption header format {} is not {}",
                format, FORMAT
            )));
        }
        let algorithm = EncryptionAlgorithm::from_id(r.read_word()?);
        let bit_len = r.read_word()?;
        let flags = r.read_word()?;
        let erd_size = r.read_word()? as usize;
        if erd_size % 16 != 0 || erd_size < 16 {
            return Err(Error::InvalidFormat(format!(
                "encrypted random data size {} is not a positive multiple of 16",
                erd_size
            )));
        }
        let erd = r.read_vec(erd_size)?;
        let reserved = r.read_dword()?;
        if reserved != 0 {
            return Err(Error::UnsupportedEncryption {
                algorithm: "certificate recipient list".into(),
            });
        }
        let validation_size = r.read_word()? as usize;
        if validation_size < 16 || validation_size % 16 != 0 {
            return Err(Error::InvalidFormat(format!(
                "password validation data size {} is invalid",
                validation_size
            )));
        }
        let validation = r.read_vec(validation_size)?;

        let expected_remaining = 16 + erd_size + validation_size;
        if remaining != expected_remaining {
            return Err(Error::InvalidFormat(format!(
                "decryption header declares {} remaining bytes, fields span {}",
                remaining, expected_remaining
            )));
        }

        Ok(Self {
            iv,
            format,
            algorithm,
            bit_len,
            flags,
            erd,
            validation,
        })
    }

    /// Serialized length.
    pub fn len(&self) -> u64 {
        (2 + self.iv.len() + 4 + 16 + self.erd.len() + self.validation.len()) as u64
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Writes the header.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_word(super::field_len("decryption header IV", self.iv.len())?)?;
        w.write_all(&self.iv)?;
        let remaining = 16 + self.erd.len() + self.validation.len();
        w.write_dword(remaining as u32)?;
        w.write_word(self.format)?;
        w.write_word(self.algorithm.id())?;
        w.write_word(self.bit_len)?;
        w.write_word(self.flags)?;
        w.write_word(super::field_len("encrypted random data", self.erd.len())?)?;
        w.write_all(&self.erd)?;
        w.write_dword(0)?;
        w.write_word(super::field_len("password validation data", self.validation.len())?)?;
        w.write_all(&self.validation)?;
        Ok(())
    }
}
