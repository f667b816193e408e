//! Strong encryption with AES-CBC.
//!
//! Key schedule:
//!
//! 1. The master key is derived from SHA-1 of the password: for each of the
//!    pad bytes 0x36 and 0x5C, a 64-byte block of that byte is XORed with
//!    the digest and hashed; the two hashes are concatenated and cut to the
//!    key length.
//! 2. The encrypted random data (ERD) in the decryption header is decrypted
//!    with the master key and the header IV. Its last block must be a full
//!    block of padding (0x10 bytes); anything else means a wrong password.
//! 3. The file key is derived the same way from SHA-1 of IV || random data.
//! 4. The password validation data, decrypted with the file key, ends in the
//!    CRC-32 of the bytes before it.
//!
//! The payload is AES-CBC with the file key and the header IV, padded to a
//! whole block. Padding is only stripped once the block that ends the
//! payload has been decrypted, which the decoder knows by counting
//! decrypted bytes against the payload length.

use std::io::{self, Read, Write};

use ::aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use super::{AesStrength, BLOCK_SIZE, DecryptParams, Password, random_bytes};
use crate::error::PasswordDetectionMethod;
use crate::format::decryption::{
    DecryptionHeader, FLAG_3DES, FLAG_CERTIFICATES, FLAG_PASSWORD, FORMAT, IV_LEN,
};
use crate::{Error, Result};

/// Bytes of random data placed in the ERD, before its padding block.
const RANDOM_DATA_LEN: usize = 16;

/// Bytes of random data in the validation field, before its CRC.
const VALIDATION_RANDOM_LEN: usize = 12;

/// Largest ciphertext chunk decrypted at once.
const CHUNK_LEN: usize = 4096;

type Key = Zeroizing<Vec<u8>>;

fn derive_key(digest: &[u8], key_len: usize) -> Key {
    let mut out = Zeroizing::new(Vec::with_capacity(40));
    for pad in [0x36u8, 0x5c] {
        let mut block = Zeroizing::new([pad; 64]);
        for (b, d) in block.iter_mut().zip(digest) {
            *b ^= d;
        }
        out.extend_from_slice(&Sha1::digest(&block[..]));
    }
    out.truncate(key_len);
    out
}

fn master_key(password: &Password, key_len: usize) -> Key {
    derive_key(&Sha1::digest(password.as_bytes()), key_len)
}

fn file_key(iv: &[u8], random_data: &[u8], key_len: usize) -> Key {
    let mut sha = Sha1::new();
    sha.update(iv);
    sha.update(random_data);
    derive_key(&sha.finalize(), key_len)
}

fn key_error<E>(_: E) -> Error {
    Error::CryptoError("invalid AES key length".into())
}

fn block_error<E>(_: E) -> Error {
    Error::CryptoError("ciphertext is not a whole number of blocks".into())
}

/// Encrypts `data` in place; its length must be a multiple of the block size.
fn cbc_encrypt(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<()> {
    let len = data.len();
    match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(key_error)?
            .encrypt_padded_mut::<NoPadding>(data, len)
            .map(|_| ())
            .map_err(block_error),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(key_error)?
            .encrypt_padded_mut::<NoPadding>(data, len)
            .map(|_| ())
            .map_err(block_error),
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(key_error)?
            .encrypt_padded_mut::<NoPadding>(data, len)
            .map(|_| ())
            .map_err(block_error),
        n => Err(key_error(n)),
    }
}

/// Decrypts `data` in place; its length must be a multiple of the block size.
fn cbc_decrypt(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<()> {
    match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(key_error)?
            .decrypt_padded_mut::<NoPadding>(data)
            .map(|_| ())
            .map_err(block_error),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(key_error)?
            .decrypt_padded_mut::<NoPadding>(data)
            .map(|_| ())
            .map_err(block_error),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(key_error)?
            .decrypt_padded_mut::<NoPadding>(data)
            .map(|_| ())
            .map_err(block_error),
        n => Err(key_error(n)),
    }
}

/// Returns the last ciphertext block, the IV for the next chunk.
fn last_block(data: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&data[data.len() - BLOCK_SIZE..]);
    iv
}

/// Length of valid PKCS#7 padding at the end of `data`.
fn padding_len(data: &[u8]) -> Result<usize> {
    let pad = data.last().copied().unwrap_or(0) as usize;
    if pad == 0
        || pad > BLOCK_SIZE
        || pad > data.len()
        || data[data.len() - pad..].iter().any(|&b| b as usize != pad)
    {
        return Err(Error::CryptoError("invalid padding after strongly encrypted data".into()));
    }
    Ok(pad)
}

fn pad(data: &mut Vec<u8>) {
    let pad = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    data.resize(data.len() + pad, pad as u8);
}

/// A file key with the IV the payload starts from.
struct Session {
    key: Key,
    iv: [u8; BLOCK_SIZE],
}

fn new_header(password: &Password, strength: AesStrength) -> Result<(DecryptionHeader, Session)> {
    let key_len = strength.key_len();
    let mut iv = [0u8; IV_LEN];
    random_bytes(&mut iv)?;

    let mut erd = vec![BLOCK_SIZE as u8; RANDOM_DATA_LEN + BLOCK_SIZE];
    random_bytes(&mut erd[..RANDOM_DATA_LEN])?;
    let key = file_key(&iv, &erd[..RANDOM_DATA_LEN], key_len);
    cbc_encrypt(&master_key(password, key_len), &iv, &mut erd)?;

    let mut validation = vec![0u8; VALIDATION_RANDOM_LEN + 4];
    random_bytes(&mut validation[..VALIDATION_RANDOM_LEN])?;
    let crc = crc32fast::hash(&validation[..VALIDATION_RANDOM_LEN]);
    validation[VALIDATION_RANDOM_LEN..].copy_from_slice(&crc.to_le_bytes());
    cbc_encrypt(&key, &iv, &mut validation)?;

    let algorithm = strength.algorithm();
    let header = DecryptionHeader {
        iv: iv.to_vec(),
        format: FORMAT,
        algorithm,
        bit_len: (key_len * 8) as u16,
        flags: FLAG_PASSWORD,
        erd,
        validation,
    };
    Ok((header, Session { key, iv }))
}

/// Checks the password against a decryption header and derives the file key.
///
/// `crc32` and `uncompressed_size` form the IV when the header stores none.
fn open_header(
    header: &DecryptionHeader,
    password: &Password,
    crc32: u32,
    uncompressed_size: u64,
) -> Result<Session> {
    let key_len = header.algorithm.aes_key_len().ok_or_else(|| Error::UnsupportedEncryption {
        algorithm: header.algorithm.name(),
    })?;
    if header.bit_len as usize != key_len * 8 {
        return Err(Error::UnsupportedEncryption {
            algorithm: format!("{} with a {}-bit key", header.algorithm.name(), header.bit_len),
        });
    }
    if header.flags & FLAG_CERTIFICATES != 0 || header.flags & FLAG_PASSWORD == 0 {
        return Err(Error::UnsupportedEncryption {
            algorithm: "certificate-based strong encryption".into(),
        });
    }
    if header.flags & FLAG_3DES != 0 {
        return Err(Error::UnsupportedEncryption {
            algorithm: "3DES".into(),
        });
    }

    let iv_source: Vec<u8> = if header.iv.is_empty() {
        let mut derived = crc32.to_le_bytes().to_vec();
        derived.extend_from_slice(&uncompressed_size.to_le_bytes());
        derived
    } else {
        header.iv.clone()
    };
    let mut iv = [0u8; BLOCK_SIZE];
    iv[..iv_source.len()].copy_from_slice(&iv_source);

    let mut erd = Zeroizing::new(header.erd.clone());
    cbc_decrypt(&master_key(password, key_len), &iv, &mut erd)?;
    let random_len = erd.len() - BLOCK_SIZE;
    if erd[random_len..].iter().any(|&b| b as usize != BLOCK_SIZE) {
        return Err(Error::wrong_password(PasswordDetectionMethod::ValidationData));
    }
    let key = file_key(&iv_source, &erd[..random_len], key_len);

    let mut validation = header.validation.clone();
    cbc_decrypt(&key, &iv, &mut validation)?;
    let (data, stored) = validation.split_at(validation.len() - 4);
    if crc32fast::hash(data).to_le_bytes() != stored {
        return Err(Error::wrong_password(PasswordDetectionMethod::ValidationData));
    }
    Ok(Session { key, iv })
}

/// Encrypts a whole buffer, as used for the central directory.
///
/// Returns the decryption header and the padded ciphertext.
pub fn encrypt_buffer(
    password: &Password,
    strength: AesStrength,
    plaintext: &[u8],
) -> Result<(DecryptionHeader, Vec<u8>)> {
    let (header, session) = new_header(password, strength)?;
    let mut data = plaintext.to_vec();
    pad(&mut data);
    cbc_encrypt(&session.key, &session.iv, &mut data)?;
    Ok((header, data))
}

/// Decrypts a whole buffer encrypted by [`encrypt_buffer`].
pub fn decrypt_buffer(
    header: &DecryptionHeader,
    password: &Password,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let session = open_header(header, password, 0, 0)?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::InvalidFormat(format!(
            "encrypted central directory of {} bytes is not block aligned",
            ciphertext.len()
        )));
    }
    let mut data = ciphertext.to_vec();
    cbc_decrypt(&session.key, &session.iv, &mut data)?;
    let pad = padding_len(&data)?;
    data.truncate(data.len() - pad);
    Ok(data)
}

/// Encrypts an entry with strong AES.
///
/// The decryption header is written on construction, the final padded
/// block on [`finish`](Self::finish).
pub struct StrongEncoder<W> {
    inner: W,
    session: Session,
    pending: Vec<u8>,
}

impl<W: Write> StrongEncoder<W> {
    /// Builds a fresh decryption header and writes it.
    pub fn new(mut inner: W, password: &Password, strength: AesStrength) -> Result<Self> {
        let (header, session) = new_header(password, strength)?;
        header.write(&mut inner)?;
        Ok(Self {
            inner,
            session,
            pending: Vec::with_capacity(CHUNK_LEN),
        })
    }

    /// Returns a reference to the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    fn encrypt_pending(&mut self, len: usize) -> io::Result<()> {
        if len == 0 {
            return Ok(());
        }
        let chunk = &mut self.pending[..len];
        cbc_encrypt(&self.session.key, &self.session.iv, chunk)?;
        self.session.iv = last_block(chunk);
        self.inner.write_all(chunk)?;
        self.pending.drain(..len);
        Ok(())
    }

    /// Pads and writes the last block, then returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        pad(&mut self.pending);
        let len = self.pending.len();
        self.encrypt_pending(len)?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for StrongEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        if self.pending.len() >= CHUNK_LEN {
            let aligned = self.pending.len() / BLOCK_SIZE * BLOCK_SIZE;
            self.encrypt_pending(aligned)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypts an entry encrypted with strong AES.
pub struct StrongDecoder<R> {
    inner: R,
    session: Session,
    payload_len: u64,
    decrypted: u64,
    ciphertext: Vec<u8>,
    plaintext: Vec<u8>,
    pos: usize,
}

impl<R: Read> StrongDecoder<R> {
    /// Reads the decryption header and verifies the password.
    pub fn new(mut inner: R, password: &Password, params: DecryptParams) -> Result<Self> {
        let header = DecryptionHeader::read(&mut inner)?;
        let session = open_header(&header, password, params.crc32, params.uncompressed_size)?;
        let payload_len = params
            .compressed_size
            .checked_sub(header.len())
            .filter(|len| *len >= BLOCK_SIZE as u64 && len % BLOCK_SIZE as u64 == 0)
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "strong payload of {} bytes after a {}-byte header is not block aligned",
                    params.compressed_size.saturating_sub(header.len()),
                    header.len()
                ))
            })?;
        Ok(Self {
            inner,
            session,
            payload_len,
            decrypted: 0,
            ciphertext: Vec::with_capacity(CHUNK_LEN),
            plaintext: Vec::with_capacity(CHUNK_LEN),
            pos: 0,
        })
    }

    /// Decrypts the next aligned chunk into `plaintext`.
    fn decrypt_chunk(&mut self) -> io::Result<()> {
        let left = self.payload_len - self.decrypted;
        let want = (left as usize).min(CHUNK_LEN);
        let mut buf = [0u8; CHUNK_LEN];
        while self.ciphertext.len() < BLOCK_SIZE.min(want)
            || self.ciphertext.len() % BLOCK_SIZE != 0
        {
            let room = want - self.ciphertext.len();
            let n = self.inner.read(&mut buf[..room])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "strongly encrypted data truncated",
                ));
            }
            self.ciphertext.extend_from_slice(&buf[..n]);
        }

        let mut chunk = std::mem::take(&mut self.ciphertext);
        let next_iv = last_block(&chunk);
        cbc_decrypt(&self.session.key, &self.session.iv, &mut chunk)?;
        self.session.iv = next_iv;
        self.decrypted += chunk.len() as u64;

        if self.decrypted == self.payload_len {
            let pad = padding_len(&chunk)?;
            chunk.truncate(chunk.len() - pad);
        }
        self.plaintext = chunk;
        self.pos = 0;
        Ok(())
    }
}

impl<R: Read> Read for StrongDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.plaintext.len() {
            if self.decrypted == self.payload_len {
                return Ok(0);
            }
            self.decrypt_chunk()?;
        }
        let available = &self.plaintext[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `step` bytes per read.
    struct Trickle<R> {
        inner: R,
        step: usize,
    }

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.step);
            self.inner.read(&mut buf[..n])
        }
    }

    fn encrypt(data: &[u8], password: &str, strength: AesStrength) -> Vec<u8> {
        let mut enc = StrongEncoder::new(Vec::new(), &Password::new(password), strength).unwrap();
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn params(stored: &[u8]) -> DecryptParams {
        DecryptParams {
            compressed_size: stored.len() as u64,
            crc32: 0,
            uncompressed_size: 0,
            check_byte: 0,
        }
    }

    #[test]
    fn test_derive_key_shape() {
        let digest = Sha1::digest(b"pw");
        let k32 = derive_key(&digest, 32);
        let k16 = derive_key(&digest, 16);
        assert_eq!(k32.len(), 32);
        assert_eq!(&k32[..16], &k16[..]);
    }

    #[test]
    fn test_non_aligned_chunks() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let stored = encrypt(&data, "pw", AesStrength::Aes256);

        let schedule = [(1, 3), (5, 7), (15, 17), (17, 4096), (4099, 1000), (usize::MAX, 33)];
        for (step, read_len) in schedule {
            let source = Trickle {
                inner: Cursor::new(&stored),
                step,
            };
            let mut dec =
                StrongDecoder::new(source, &Password::new("pw"), params(&stored)).unwrap();
            let mut out = Vec::new();
            let mut chunk = vec![0u8; read_len];
            loop {
                let n = dec.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&chunk[..n]);
            }
            assert_eq!(out, data, "step {} read {}", step, read_len);
        }
    }

    #[test]
    fn test_exact_block_multiple_gets_full_padding_block() {
        let data = [9u8; 32];
        let stored = encrypt(&data, "pw", AesStrength::Aes128);
        let header = DecryptionHeader::read(&mut Cursor::new(&stored)).unwrap();
        assert_eq!(stored.len() as u64 - header.len(), 48);

        let password = Password::new("pw");
        let mut dec = StrongDecoder::new(Cursor::new(&stored), &password, params(&stored)).unwrap();
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_empty_payload() {
        let stored = encrypt(b"", "pw", AesStrength::Aes192);
        let password = Password::new("pw");
        let mut dec = StrongDecoder::new(Cursor::new(&stored), &password, params(&stored)).unwrap();
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_wrong_password_detected_by_validation_data() {
        let stored = encrypt(b"payload", "right", AesStrength::Aes256);
        let err = StrongDecoder::new(Cursor::new(&stored), &Password::new("wrong"), params(&stored))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::WrongPassword {
                detection_method: PasswordDetectionMethod::ValidationData,
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_algorithm() {
        let stored = encrypt(b"payload", "pw", AesStrength::Aes256);
        let mut header = DecryptionHeader::read(&mut Cursor::new(&stored)).unwrap();
        header.algorithm = crate::format::decryption::EncryptionAlgorithm::Rc2;
        let err = open_header(&header, &Password::new("pw"), 0, 0).err().unwrap();
        assert!(matches!(err, Error::UnsupportedEncryption { .. }));
    }

    #[test]
    fn test_buffer_round_trip() {
        let password = Password::new("dir");
        let (header, ciphertext) =
            encrypt_buffer(&password, AesStrength::Aes128, b"central directory").unwrap();
        assert_eq!(decrypt_buffer(&header, &password, &ciphertext).unwrap(), b"central directory");
        assert!(decrypt_buffer(&header, &Password::new("nope"), &ciphertext).is_err());
    }
}
