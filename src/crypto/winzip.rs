//! WinZip AES encryption (AE-1 / AE-2).
//!
//! Keys come from PBKDF2-HMAC-SHA1 with 1000 iterations over the password
//! and a random salt. The derived material is split into the AES key, the
//! HMAC key and a 2-byte password verifier. Data is encrypted with AES-CTR
//! (little-endian counter starting at 1) and authenticated with HMAC-SHA1
//! over the ciphertext, truncated to 10 bytes.

use std::io::{self, Read, Write};

use ::aes::{Aes128, Aes192, Aes256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroizing;

use super::{AesStrength, Password, random_bytes};
use crate::error::PasswordDetectionMethod;
use crate::io::ReadLeExt;
use crate::{Error, Result};

/// Length of the stored authentication code.
pub const AES_MAC_LEN: usize = 10;

/// Length of the password verification value.
pub const PASSWORD_VERIFIER_LEN: usize = 2;

const PBKDF2_ROUNDS: u32 = 1000;

type HmacSha1 = Hmac<Sha1>;

enum Keystream {
    Aes128(ctr::Ctr128LE<Aes128>),
    Aes192(ctr::Ctr128LE<Aes192>),
    Aes256(ctr::Ctr128LE<Aes256>),
}

impl Keystream {
    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            Keystream::Aes128(c) => c.apply_keystream(buf),
            Keystream::Aes192(c) => c.apply_keystream(buf),
            Keystream::Aes256(c) => c.apply_keystream(buf),
        }
    }
}

struct DerivedKeys {
    cipher: Keystream,
    mac: HmacSha1,
    verifier: [u8; PASSWORD_VERIFIER_LEN],
}

fn derive(password: &Password, salt: &[u8], strength: AesStrength) -> Result<DerivedKeys> {
    let key_len = strength.key_len();
    let mut material = Zeroizing::new(vec![0u8; key_len * 2 + PASSWORD_VERIFIER_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut material);

    let (key, rest) = material.split_at(key_len);
    let (mac_key, verifier) = rest.split_at(key_len);

    let mut iv = [0u8; 16];
    iv[0] = 1;
    let invalid = |_| Error::CryptoError("invalid AES key length".into());
    let cipher = match strength {
        AesStrength::Aes128 => {
            Keystream::Aes128(ctr::Ctr128LE::new_from_slices(key, &iv).map_err(invalid)?)
        }
        AesStrength::Aes192 => {
            Keystream::Aes192(ctr::Ctr128LE::new_from_slices(key, &iv).map_err(invalid)?)
        }
        AesStrength::Aes256 => {
            Keystream::Aes256(ctr::Ctr128LE::new_from_slices(key, &iv).map_err(invalid)?)
        }
    };
    let mac = HmacSha1::new_from_slice(mac_key)
        .map_err(|_| Error::CryptoError("invalid HMAC key length".into()))?;

    Ok(DerivedKeys {
        cipher,
        mac,
        verifier: [verifier[0], verifier[1]],
    })
}

/// Encrypts an entry with WinZip AES.
///
/// Writes salt and verifier on construction and the authentication code on
/// [`finish`](Self::finish).
pub struct AesEncoder<W> {
    inner: W,
    cipher: Keystream,
    mac: HmacSha1,
    scratch: Vec<u8>,
}

impl<W: Write> AesEncoder<W> {
    /// Generates a salt, derives keys and writes the header.
    pub fn new(mut inner: W, password: &Password, strength: AesStrength) -> Result<Self> {
        let mut salt = vec![0u8; strength.salt_len()];
        random_bytes(&mut salt)?;
        let keys = derive(password, &salt, strength)?;
        inner.write_all(&salt)?;
        inner.write_all(&keys.verifier)?;
        Ok(Self {
            inner,
            cipher: keys.cipher,
            mac: keys.mac,
            scratch: Vec::new(),
        })
    }

    /// Returns a reference to the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Writes the authentication code and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let code = self.mac.finalize().into_bytes();
        self.inner.write_all(&code[..AES_MAC_LEN])?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for AesEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.cipher.apply(&mut self.scratch);
        self.mac.update(&self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypts an entry encrypted with WinZip AES.
///
/// The authentication code is checked as soon as the last ciphertext byte
/// has been read; a mismatch surfaces as [`Error::MacMismatch`] from that
/// read.
pub struct AesDecoder<R> {
    inner: R,
    cipher: Keystream,
    mac: Option<HmacSha1>,
    remaining: u64,
}

impl<R: Read> AesDecoder<R> {
    /// Reads salt and verifier and checks the password.
    ///
    /// `stored_len` is the entry's compressed size: salt, verifier,
    /// ciphertext and authentication code.
    pub fn new(
        mut inner: R,
        password: &Password,
        strength: AesStrength,
        stored_len: u64,
    ) -> Result<Self> {
        let overhead = (strength.salt_len() + PASSWORD_VERIFIER_LEN + AES_MAC_LEN) as u64;
        let remaining = stored_len.checked_sub(overhead).ok_or_else(|| {
            Error::InvalidFormat(format!(
                "AES entry of {} bytes is shorter than its {} bytes of overhead",
                stored_len, overhead
            ))
        })?;

        let salt = inner.read_vec(strength.salt_len())?;
        let mut stored_verifier = [0u8; PASSWORD_VERIFIER_LEN];
        inner.read_exact(&mut stored_verifier)?;

        let keys = derive(password, &salt, strength)?;
        if keys.verifier != stored_verifier {
            return Err(Error::wrong_password(PasswordDetectionMethod::VerificationValue));
        }
        Ok(Self {
            inner,
            cipher: keys.cipher,
            mac: Some(keys.mac),
            remaining,
        })
    }

    /// Verifies the authentication code once all ciphertext has been read.
    ///
    /// Does nothing if it was already verified.
    pub fn verify(&mut self) -> Result<()> {
        if self.remaining > 0 {
            return Err(Error::InvalidState("AES ciphertext not fully read"));
        }
        let Some(mac) = self.mac.take() else {
            return Ok(());
        };
        let mut stored = [0u8; AES_MAC_LEN];
        self.inner.read_exact(&mut stored)?;
        mac.verify_truncated_left(&stored)
            .map_err(|_| Error::MacMismatch { entry_name: None })
    }
}

impl<R: Read> Read for AesDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            self.verify()?;
            return Ok(0);
        }
        let limit = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..limit])?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "AES entry truncated"));
        }
        if let Some(mac) = self.mac.as_mut() {
            mac.update(&buf[..n]);
        }
        self.cipher.apply(&mut buf[..n]);
        self.remaining -= n as u64;
        if self.remaining == 0 {
            self.verify()?;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encrypt(data: &[u8], password: &str, strength: AesStrength) -> Vec<u8> {
        let mut enc = AesEncoder::new(Vec::new(), &Password::new(password), strength).unwrap();
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_layout() {
        let stored = encrypt(b"0123456789", "pw", AesStrength::Aes128);
        assert_eq!(stored.len(), 8 + 2 + 10 + 10);
    }

    #[test]
    fn test_pbkdf2_vector() {
        // RFC 6070 test vector 2 (2 iterations) exercises the same primitive.
        let mut out = [0u8; 20];
        pbkdf2::pbkdf2_hmac::<Sha1>(b"password", b"salt", 2, &mut out);
        assert_eq!(
            out,
            [
                0xea, 0x6c, 0x01, 0x4d, 0xc7, 0x2d, 0x6f, 0x8c, 0xcd, 0x1e, 0xd9, 0x2a, 0xce, 0x1d,
                0x41, 0xf0, 0xd8, 0xde, 0x89, 0x57
            ]
        );
    }

    #[test]
    fn test_wrong_password_fails_on_verifier() {
        let stored = encrypt(b"secret data", "right", AesStrength::Aes256);
        let mut fails = 0;
        for wrong in ["wrong", "Right", "right ", "rig"] {
            match AesDecoder::new(
                Cursor::new(&stored),
                &Password::new(wrong),
                AesStrength::Aes256,
                stored.len() as u64,
            ) {
                Err(Error::WrongPassword {
                    detection_method: PasswordDetectionMethod::VerificationValue,
                    ..
                }) => fails += 1,
                Err(e) => panic!("unexpected error {e}"),
                Ok(_) => {}
            }
        }
        // A 2-byte verifier lets about one wrong password in 65536 through.
        assert!(fails >= 3);
    }

    #[test]
    fn test_tampered_ciphertext_fails_mac() {
        let mut stored = encrypt(&[0x55; 100], "pw", AesStrength::Aes192);
        stored[12 + 2 + 50] ^= 1;
        let mut dec = AesDecoder::new(
            Cursor::new(&stored),
            &Password::new("pw"),
            AesStrength::Aes192,
            stored.len() as u64,
        )
        .unwrap();
        let mut out = Vec::new();
        let err: Error = dec.read_to_end(&mut out).unwrap_err().into();
        assert!(matches!(err, Error::MacMismatch { .. }));
    }

    #[test]
    fn test_small_reads() {
        let data: Vec<u8> = (0..=255u8).collect();
        let stored = encrypt(&data, "pw", AesStrength::Aes256);
        let mut dec = AesDecoder::new(
            Cursor::new(&stored),
            &Password::new("pw"),
            AesStrength::Aes256,
            stored.len() as u64,
        )
        .unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 7];
        loop {
            let n = dec.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, data);
        dec.verify().unwrap();
    }
}
