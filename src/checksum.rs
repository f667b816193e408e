//! Checksum computation utilities.
//!
//! ZIP protects every entry with a CRC-32 (IEEE 802.3 polynomial) computed
//! over the uncompressed plaintext. The same polynomial also drives the
//! PKWARE traditional cipher key schedule and the checksum embedded in
//! strong-encryption validation data.
//!
//! # Example
//!
//! ```rust
//! use zipspan::checksum::{Checksum, Crc32};
//!
//! let mut crc = Crc32::new();
//! crc.update(b"Hello, ");
//! crc.update(b"World!");
//! assert_eq!(crc.finalize(), Crc32::compute(b"Hello, World!"));
//! ```

use std::io::{self, Read};

use crate::READ_BUFFER_SIZE;

/// Common trait for checksum computation.
pub trait Checksum: Default + Clone {
    /// The output type of this checksum.
    type Output: Copy + Eq + std::fmt::Debug;

    /// Creates a new checksum calculator.
    fn new() -> Self;

    /// Updates the checksum with additional data.
    fn update(&mut self, data: &[u8]);

    /// Returns the checksum of everything seen so far.
    fn finalize(&self) -> Self::Output;

    /// Resets the checksum to its initial state.
    fn reset(&mut self);

    /// Computes the checksum of a single slice in one call.
    fn compute(data: &[u8]) -> Self::Output {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Computes the checksum by reading from a reader until EOF.
    fn compute_reader<R: Read>(reader: &mut R) -> io::Result<Self::Output> {
        let mut hasher = Self::new();
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finalize())
    }
}

/// CRC-32 checksum calculator.
///
/// ```rust
/// use zipspan::checksum::{Checksum, Crc32};
///
/// assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
/// ```
#[derive(Clone)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
    bytes: u64,
}

impl Crc32 {
    /// Returns the number of bytes fed into this checksum.
    pub fn bytes_processed(&self) -> u64 {
        self.bytes
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32")
            .field("current", &self.hasher.clone().finalize())
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl Checksum for Crc32 {
    type Output = u32;

    fn new() -> Self {
        Self {
            hasher: crc32fast::Hasher::new(),
            bytes: 0,
        }
    }

    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    fn finalize(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    fn reset(&mut self) {
        self.hasher.reset();
        self.bytes = 0;
    }
}

/// Single-byte CRC-32 step used by the PKWARE key schedule.
///
/// Works on the raw register, which is the complement of the value
/// `crc32fast` exposes.
pub(crate) fn crc32_update_byte(crc: u32, byte: u8) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(!crc);
    hasher.update(&[byte]);
    !hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
        assert_eq!(Crc32::compute(b""), 0);
    }

    #[test]
    fn test_crc32_incremental() {
        let mut crc = Crc32::new();
        crc.update(b"1234");
        crc.update(b"56789");
        assert_eq!(crc.finalize(), 0xCBF43926);
        assert_eq!(crc.bytes_processed(), 9);

        crc.reset();
        assert_eq!(crc.finalize(), 0);
        assert_eq!(crc.bytes_processed(), 0);
    }

    #[test]
    fn test_crc32_reader() {
        let mut cursor = Cursor::new(vec![0xABu8; 20_000]);
        let from_reader = Crc32::compute_reader(&mut cursor).unwrap();
        assert_eq!(from_reader, Crc32::compute(&[0xABu8; 20_000]));
    }

    #[test]
    fn test_byte_step_matches_crc32fast() {
        let data = b"The quick brown fox";
        let mut register = 0xFFFF_FFFFu32;
        for &b in data {
            register = crc32_update_byte(register, b);
        }
        assert_eq!(!register, Crc32::compute(data));
    }

    #[test]
    fn test_byte_step_table_values() {
        assert_eq!(crc32_update_byte(0, 0), 0);
        assert_eq!(crc32_update_byte(0, 1), 0x7707_3096);
        assert_eq!(crc32_update_byte(0x100, 0), 0x0000_0001);
    }
}
