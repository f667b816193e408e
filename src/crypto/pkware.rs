//! PKWARE traditional encryption.
//!
//! A byte-at-a-time stream cipher driven by three 32-bit keys that are
//! stirred with CRC-32 steps and a linear congruential update. A 12-byte
//! encrypted header precedes the payload; its last byte doubles as a weak
//! password check.

use std::io::{self, Read, Write};

use super::{Password, random_bytes};
use crate::checksum::crc32_update_byte;
use crate::error::PasswordDetectionMethod;
use crate::{Error, Result};

/// Length of the encryption header.
pub const PKWARE_HEADER_LEN: usize = 12;

#[derive(Clone)]
struct Keys {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl Keys {
    fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            k0: 0x1234_5678,
            k1: 0x2345_6789,
            k2: 0x3456_7890,
        };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    fn update(&mut self, plain: u8) {
        self.k0 = crc32_update_byte(self.k0, plain);
        self.k1 = self
            .k1
            .wrapping_add(self.k0 & 0xff)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.k2 = crc32_update_byte(self.k2, (self.k1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let t = (self.k2 | 2) as u16;
        (t.wrapping_mul(t ^ 1) >> 8) as u8
    }

    fn encrypt(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.stream_byte();
        self.update(plain);
        cipher
    }

    fn decrypt(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.stream_byte();
        self.update(plain);
        plain
    }
}

/// Encrypts an entry with the PKWARE traditional cipher.
pub struct PkwareEncoder<W> {
    inner: W,
    keys: Keys,
    scratch: Vec<u8>,
}

impl<W: Write> PkwareEncoder<W> {
    /// Writes the 12-byte header ending in `check_byte`.
    pub fn new(mut inner: W, password: &Password, check_byte: u8) -> Result<Self> {
        let mut keys = Keys::new(password.as_bytes());
        let mut header = [0u8; PKWARE_HEADER_LEN];
        random_bytes(&mut header[..PKWARE_HEADER_LEN - 1])?;
        header[PKWARE_HEADER_LEN - 1] = check_byte;
        for b in header.iter_mut() {
            *b = keys.encrypt(*b);
        }
        inner.write_all(&header)?;
        Ok(Self {
            inner,
            keys,
            scratch: Vec::new(),
        })
    }

    /// Returns a reference to the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns the inner writer; the cipher has no trailer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for PkwareEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend(buf.iter().map(|&b| self.keys.encrypt(b)));
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypts an entry encrypted with the PKWARE traditional cipher.
pub struct PkwareDecoder<R> {
    inner: R,
    keys: Keys,
}

impl<R: Read> PkwareDecoder<R> {
    /// Reads the header and compares its last byte with `check_byte`.
    ///
    /// # Errors
    ///
    /// [`Error::WrongPassword`] with [`PasswordDetectionMethod::CheckByte`]
    /// on mismatch. Roughly one wrong password in 256 passes this check and
    /// is caught later by the CRC.
    pub fn new(mut inner: R, password: &Password, check_byte: u8) -> Result<Self> {
        let mut keys = Keys::new(password.as_bytes());
        let mut header = [0u8; PKWARE_HEADER_LEN];
        inner.read_exact(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::InvalidFormat("entry too short for PKWARE header".into())
            }
            _ => Error::Io(e),
        })?;
        for b in header.iter_mut() {
            *b = keys.decrypt(*b);
        }
        if header[PKWARE_HEADER_LEN - 1] != check_byte {
            return Err(Error::wrong_password(PasswordDetectionMethod::CheckByte));
        }
        Ok(Self { inner, keys })
    }
}

impl<R: Read> Read for PkwareDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for b in &mut buf[..n] {
            *b = self.keys.decrypt(*b);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_key_schedule() {
        let keys = Keys::new(b"");
        assert_eq!((keys.k0, keys.k1, keys.k2), (0x1234_5678, 0x2345_6789, 0x3456_7890));
        let mut a = Keys::new(b"abc");
        let mut b = Keys::new(b"ab");
        b.update(b'c');
        assert_eq!(a.encrypt(0x41), b.encrypt(0x41));
    }

    #[test]
    fn test_round_trip_and_header() {
        let password = Password::new("secret");
        let mut enc = PkwareEncoder::new(Vec::new(), &password, 0x7c).unwrap();
        enc.write_all(b"hello hello hello").unwrap();
        let stored = enc.into_inner();
        assert_eq!(stored.len(), PKWARE_HEADER_LEN + 17);

        let mut dec = PkwareDecoder::new(Cursor::new(&stored), &password, 0x7c).unwrap();
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello hello hello");
    }

    #[test]
    fn test_wrong_check_byte() {
        let password = Password::new("secret");
        let enc = PkwareEncoder::new(Vec::new(), &password, 0x7c).unwrap();
        let stored = enc.into_inner();
        let err = PkwareDecoder::new(Cursor::new(&stored), &password, 0x7d).err().unwrap();
        assert!(matches!(
            err,
            Error::WrongPassword {
                detection_method: PasswordDetectionMethod::CheckByte,
                ..
            }
        ));
    }

    #[test]
    fn test_truncated_header() {
        let password = Password::new("x");
        let err = PkwareDecoder::new(Cursor::new(vec![0u8; 5]), &password, 0).err().unwrap();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
