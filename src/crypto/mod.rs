//! Entry encryption: PKWARE traditional, WinZip AES and strong AES.
//!
//! Each scheme has an encoder that writes its header as soon as it is
//! constructed and a decoder that reads and checks its header as soon as it
//! is constructed. Password verification is therefore an explicit step that
//! returns [`Error::WrongPassword`] before a single payload byte is
//! decrypted:
//!
//! | Scheme | Header                           | Password check                | Trailer      |
//! |--------|----------------------------------|-------------------------------|--------------|
//! | PKWARE | 12 encrypted bytes               | last header byte              | -            |
//! | AES    | salt (8/12/16) + 2-byte verifier | PBKDF2-derived verifier       | 10-byte HMAC |
//! | Strong | decryption header                | random-data padding, data CRC | CBC padding  |
//!
//! [`EncryptionEncoder`] and [`EncryptionDecoder`] select the scheme for an
//! entry. Cipher state is owned by one encoder or decoder and dropped with
//! it; nothing is shared between entries.

mod password;
mod pkware;
mod strong;
mod winzip;

use std::io::{self, Read, Write};

use crate::{Error, Result};

pub use password::Password;
pub use pkware::{PKWARE_HEADER_LEN, PkwareDecoder, PkwareEncoder};
pub use strong::{StrongDecoder, StrongEncoder, decrypt_buffer, encrypt_buffer};
pub use winzip::{AES_MAC_LEN, AesDecoder, AesEncoder, PASSWORD_VERIFIER_LEN};

/// AES block size in bytes.
const BLOCK_SIZE: usize = 16;

/// AES key strength, shared by WinZip AES and strong encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AesStrength {
    /// 128-bit key.
    Aes128,
    /// 192-bit key.
    Aes192,
    /// 256-bit key.
    #[default]
    Aes256,
}

impl AesStrength {
    /// Strength code used in the WinZip AES extra field.
    pub fn code(self) -> u8 {
        match self {
            AesStrength::Aes128 => 1,
            AesStrength::Aes192 => 2,
            AesStrength::Aes256 => 3,
        }
    }

    /// Maps a WinZip AES strength code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(AesStrength::Aes128),
            2 => Ok(AesStrength::Aes192),
            3 => Ok(AesStrength::Aes256),
            other => Err(Error::UnsupportedEncryption {
                algorithm: format!("AES strength code {}", other),
            }),
        }
    }

    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            AesStrength::Aes128 => 16,
            AesStrength::Aes192 => 24,
            AesStrength::Aes256 => 32,
        }
    }

    /// WinZip AES salt length in bytes.
    pub fn salt_len(self) -> usize {
        self.key_len() / 2
    }

    /// Strong encryption algorithm with this key length.
    pub fn algorithm(self) -> crate::format::decryption::EncryptionAlgorithm {
        use crate::format::decryption::EncryptionAlgorithm;
        match self {
            AesStrength::Aes128 => EncryptionAlgorithm::Aes128,
            AesStrength::Aes192 => EncryptionAlgorithm::Aes192,
            AesStrength::Aes256 => EncryptionAlgorithm::Aes256,
        }
    }
}

/// WinZip AES vendor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AesVendorVersion {
    /// AE-1: the CRC is stored and checked.
    Ae1,
    /// AE-2: the CRC field is 0; the MAC alone protects the data.
    Ae2,
}

impl AesVendorVersion {
    /// Entries smaller than this are written as AE-2 by default.
    pub const AE2_THRESHOLD: u64 = 20;

    /// Wire value.
    pub fn id(self) -> u16 {
        match self {
            AesVendorVersion::Ae1 => 1,
            AesVendorVersion::Ae2 => 2,
        }
    }

    /// Maps a wire value; unknown versions are read as AE-2.
    pub fn from_id(id: u16) -> Self {
        match id {
            1 => AesVendorVersion::Ae1,
            2 => AesVendorVersion::Ae2,
            other => {
                log::warn!("unknown AES vendor version {}, reading as AE-2", other);
                AesVendorVersion::Ae2
            }
        }
    }

    /// Version WinZip picks for an entry of the given size.
    pub fn for_size(size: Option<u64>) -> Self {
        match size {
            Some(size) if size < Self::AE2_THRESHOLD => AesVendorVersion::Ae2,
            _ => AesVendorVersion::Ae1,
        }
    }
}

/// How an entry is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    /// Not encrypted.
    #[default]
    None,
    /// PKWARE traditional ("ZipCrypto"). Weak; for compatibility only.
    Pkware,
    /// WinZip AES: AES-CTR with an HMAC-SHA1 authentication code.
    Aes {
        /// Key strength.
        strength: AesStrength,
        /// Vendor version; `None` picks by entry size.
        vendor_version: Option<AesVendorVersion>,
    },
    /// Strong encryption: AES-CBC with a decryption header.
    Strong {
        /// Key strength.
        strength: AesStrength,
    },
}

impl Encryption {
    /// WinZip AES-256 with the vendor version picked by size.
    pub const AES256: Encryption = Encryption::Aes {
        strength: AesStrength::Aes256,
        vendor_version: None,
    };

    /// Returns `true` unless this is [`Encryption::None`].
    pub fn is_encrypted(self) -> bool {
        !matches!(self, Encryption::None)
    }
}

/// Fills a buffer from the operating system's random source.
pub(crate) fn random_bytes(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf)
        .map_err(|e| Error::CryptoError(format!("random source failed: {}", e)))
}

/// Writes the encryption layer of an entry.
///
/// The header is written by [`EncryptionEncoder::new`]; the trailer (if
/// any) by [`EncryptionEncoder::finish`].
pub enum EncryptionEncoder<W: Write> {
    /// Pass-through.
    None(W),
    /// PKWARE traditional.
    Pkware(PkwareEncoder<W>),
    /// WinZip AES.
    Aes(AesEncoder<W>),
    /// Strong AES.
    Strong(StrongEncoder<W>),
}

impl<W: Write> std::fmt::Debug for EncryptionEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EncryptionEncoder::None(_) => "None",
            EncryptionEncoder::Pkware(_) => "Pkware",
            EncryptionEncoder::Aes(_) => "Aes",
            EncryptionEncoder::Strong(_) => "Strong",
        };
        f.debug_tuple("EncryptionEncoder").field(&name).finish()
    }
}

impl<W: Write> EncryptionEncoder<W> {
    /// Starts the encryption layer and writes its header.
    ///
    /// `check_byte` is the PKWARE password check byte (the high byte of the
    /// DOS modification time, since a data descriptor always follows).
    pub fn new(
        encryption: Encryption,
        password: Option<&Password>,
        check_byte: u8,
        inner: W,
    ) -> Result<Self> {
        let password = match (encryption, password) {
            (Encryption::None, _) => return Ok(EncryptionEncoder::None(inner)),
            (_, Some(password)) => password,
            (_, None) => return Err(Error::PasswordRequired { entry_name: None }),
        };
        Ok(match encryption {
            Encryption::None => EncryptionEncoder::None(inner),
            Encryption::Pkware => {
                EncryptionEncoder::Pkware(PkwareEncoder::new(inner, password, check_byte)?)
            }
            Encryption::Aes { strength, .. } => {
                EncryptionEncoder::Aes(AesEncoder::new(inner, password, strength)?)
            }
            Encryption::Strong { strength } => {
                EncryptionEncoder::Strong(StrongEncoder::new(inner, password, strength)?)
            }
        })
    }

    /// Writes the trailer and returns the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            EncryptionEncoder::None(w) => Ok(w),
            EncryptionEncoder::Pkware(e) => Ok(e.into_inner()),
            EncryptionEncoder::Aes(e) => e.finish(),
            EncryptionEncoder::Strong(e) => e.finish(),
        }
    }

    /// Returns a reference to the inner writer.
    pub fn get_ref(&self) -> &W {
        match self {
            EncryptionEncoder::None(w) => w,
            EncryptionEncoder::Pkware(e) => e.get_ref(),
            EncryptionEncoder::Aes(e) => e.get_ref(),
            EncryptionEncoder::Strong(e) => e.get_ref(),
        }
    }
}

impl<W: Write> Write for EncryptionEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EncryptionEncoder::None(w) => w.write(buf),
            EncryptionEncoder::Pkware(e) => e.write(buf),
            EncryptionEncoder::Aes(e) => e.write(buf),
            EncryptionEncoder::Strong(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EncryptionEncoder::None(w) => w.flush(),
            EncryptionEncoder::Pkware(e) => e.flush(),
            EncryptionEncoder::Aes(e) => e.flush(),
            EncryptionEncoder::Strong(e) => e.flush(),
        }
    }
}

/// What a decoder needs to know about the entry it decrypts.
#[derive(Debug, Clone, Copy)]
pub struct DecryptParams {
    /// Stored size of the entry: encryption header, payload and trailer.
    pub compressed_size: u64,
    /// CRC-32 from the headers (strong encryption may derive its IV from it).
    pub crc32: u32,
    /// Uncompressed size (strong encryption may derive its IV from it).
    pub uncompressed_size: u64,
    /// Expected PKWARE check byte.
    pub check_byte: u8,
}

/// Reads the encryption layer of an entry.
pub enum EncryptionDecoder<R: Read> {
    /// Pass-through.
    None(R),
    /// PKWARE traditional.
    Pkware(PkwareDecoder<R>),
    /// WinZip AES.
    Aes(AesDecoder<R>),
    /// Strong AES.
    Strong(StrongDecoder<R>),
}

impl<R: Read> std::fmt::Debug for EncryptionDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EncryptionDecoder::None(_) => "None",
            EncryptionDecoder::Pkware(_) => "Pkware",
            EncryptionDecoder::Aes(_) => "Aes",
            EncryptionDecoder::Strong(_) => "Strong",
        };
        f.debug_tuple("EncryptionDecoder").field(&name).finish()
    }
}

impl<R: Read> EncryptionDecoder<R> {
    /// Reads the encryption header and verifies the password.
    ///
    /// # Errors
    ///
    /// [`Error::PasswordRequired`] without a password and
    /// [`Error::WrongPassword`] when the header check fails. No payload
    /// byte has been decrypted when either is returned.
    pub fn new(
        encryption: Encryption,
        password: Option<&Password>,
        params: DecryptParams,
        inner: R,
    ) -> Result<Self> {
        let password = match (encryption, password) {
            (Encryption::None, _) => return Ok(EncryptionDecoder::None(inner)),
            (_, Some(password)) => password,
            (_, None) => return Err(Error::PasswordRequired { entry_name: None }),
        };
        Ok(match encryption {
            Encryption::None => EncryptionDecoder::None(inner),
            Encryption::Pkware => {
                EncryptionDecoder::Pkware(PkwareDecoder::new(inner, password, params.check_byte)?)
            }
            Encryption::Aes { strength, .. } => EncryptionDecoder::Aes(AesDecoder::new(
                inner,
                password,
                strength,
                params.compressed_size,
            )?),
            Encryption::Strong { .. } => {
                EncryptionDecoder::Strong(StrongDecoder::new(inner, password, params)?)
            }
        })
    }

    /// Consumes whatever the decompressor left unread and verifies the
    /// trailer (AES authentication code, strong-encryption padding).
    pub fn finish(&mut self) -> Result<()> {
        match self {
            EncryptionDecoder::None(_) | EncryptionDecoder::Pkware(_) => Ok(()),
            EncryptionDecoder::Aes(d) => {
                io::copy(d, &mut io::sink())?;
                d.verify()
            }
            EncryptionDecoder::Strong(d) => {
                io::copy(d, &mut io::sink())?;
                Ok(())
            }
        }
    }
}

impl<R: Read> Read for EncryptionDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EncryptionDecoder::None(r) => r.read(buf),
            EncryptionDecoder::Pkware(d) => d.read(buf),
            EncryptionDecoder::Aes(d) => d.read(buf),
            EncryptionDecoder::Strong(d) => d.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn params(compressed_size: u64) -> DecryptParams {
        DecryptParams {
            compressed_size,
            crc32: 0,
            uncompressed_size: 0,
            check_byte: 0x5a,
        }
    }

    fn round_trip(encryption: Encryption) {
        let password = Password::new("pw");
        let data = b"The quick brown fox jumps over the lazy dog".repeat(20);
        let mut enc =
            EncryptionEncoder::new(encryption, Some(&password), 0x5a, Vec::new()).unwrap();
        enc.write_all(&data).unwrap();
        let stored = enc.finish().unwrap();

        let mut dec = EncryptionDecoder::new(
            encryption,
            Some(&password),
            params(stored.len() as u64),
            Cursor::new(&stored),
        )
        .unwrap();
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        dec.finish().unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_every_scheme_round_trips() {
        round_trip(Encryption::None);
        round_trip(Encryption::Pkware);
        for strength in [AesStrength::Aes128, AesStrength::Aes192, AesStrength::Aes256] {
            round_trip(Encryption::Aes {
                strength,
                vendor_version: None,
            });
            round_trip(Encryption::Strong { strength });
        }
    }

    #[test]
    fn test_password_required() {
        let err = EncryptionEncoder::new(Encryption::Pkware, None, 0, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::PasswordRequired { .. }));
        let err =
            EncryptionDecoder::new(Encryption::AES256, None, params(0), Cursor::new(Vec::new()))
                .unwrap_err();
        assert!(matches!(err, Error::PasswordRequired { .. }));
    }

    #[test]
    fn test_vendor_version_by_size() {
        assert_eq!(AesVendorVersion::for_size(Some(19)), AesVendorVersion::Ae2);
        assert_eq!(AesVendorVersion::for_size(Some(20)), AesVendorVersion::Ae1);
        assert_eq!(AesVendorVersion::for_size(None), AesVendorVersion::Ae1);
    }

    #[test]
    fn test_strength_codes() {
        for strength in [AesStrength::Aes128, AesStrength::Aes192, AesStrength::Aes256] {
            assert_eq!(AesStrength::from_code(strength.code()).unwrap(), strength);
            assert_eq!(strength.salt_len() * 2, strength.key_len());
        }
        assert!(AesStrength::from_code(4).is_err());
    }
}
