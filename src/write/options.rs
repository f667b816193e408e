//! Archive and entry settings for writing.

use std::time::SystemTime;

use crate::charset::Charset;
use crate::codec::Compression;
use crate::crypto::{AesStrength, Encryption, Password};
use crate::volume::MIN_SPLIT_SIZE;
use crate::{Error, Result};

/// When ZIP64 records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zip64Mode {
    /// Only for values that reach a classic field's sentinel, plus the
    /// local header of a streamed entry whose size is not known up front
    /// (see [`EntrySettings::with_size_hint`]).
    #[default]
    Auto,
    /// For every entry and for the end of central directory.
    Always,
    /// Never; archives that would need ZIP64 fail with
    /// [`Error::UnsupportedFeature`].
    Never,
}

/// Strong encryption of the whole central directory.
#[derive(Debug, Clone)]
pub struct CentralDirectoryEncryption {
    /// Password for the directory.
    pub password: Password,
    /// AES key strength.
    pub strength: AesStrength,
    /// Compression applied before encryption (Store or Deflate).
    pub compression: Compression,
}

impl CentralDirectoryEncryption {
    /// AES-256, Deflate-compressed.
    pub fn new(password: impl Into<Password>) -> Self {
        Self {
            password: password.into(),
            strength: AesStrength::Aes256,
            compression: Compression::default(),
        }
    }

    /// Sets the key strength.
    pub fn with_strength(mut self, strength: AesStrength) -> Self {
        self.strength = strength;
        self
    }

    /// Sets the compression applied before encryption.
    pub fn with_compression(mut self, compression: Compression) -> Result<Self> {
        self.compression = match compression {
            Compression::Store | Compression::Deflate { .. } => compression.validate()?,
            _ => {
                return Err(Error::UnsupportedFeature {
                    feature: "central directory compression other than Store or Deflate",
                });
            }
        };
        Ok(self)
    }
}

/// Archive-level settings.
///
/// # Example
///
/// ```rust
/// use zipspan::write::{Zip64Mode, ZipSettings};
///
/// let settings = ZipSettings::new()
///     .with_split_size(1024 * 1024)
///     .unwrap()
///     .with_zip64(Zip64Mode::Auto)
///     .with_comment("nightly build");
/// assert_eq!(settings.split_size, Some(1024 * 1024));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ZipSettings {
    /// Maximum size of each volume; `None` writes a single file.
    pub split_size: Option<u64>,
    /// ZIP64 policy.
    pub zip64: Zip64Mode,
    /// Charset for names and comments.
    pub charset: Charset,
    /// Archive comment.
    pub comment: Option<String>,
    /// Encrypts the central directory when set.
    pub central_directory_encryption: Option<CentralDirectoryEncryption>,
}

impl ZipSettings {
    /// Single-file archive, automatic ZIP64, UTF-8 names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits the archive into volumes of at most `size` bytes.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSplitSize`] below 64 KiB.
    pub fn with_split_size(mut self, size: u64) -> Result<Self> {
        if size < MIN_SPLIT_SIZE {
            return Err(Error::InvalidSplitSize {
                size,
                minimum: MIN_SPLIT_SIZE,
            });
        }
        self.split_size = Some(size);
        Ok(self)
    }

    /// Sets the ZIP64 policy.
    pub fn with_zip64(mut self, mode: Zip64Mode) -> Self {
        self.zip64 = mode;
        self
    }

    /// Sets the charset for names and comments.
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Sets the archive comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Encrypts the central directory.
    pub fn with_central_directory_encryption(
        mut self,
        encryption: CentralDirectoryEncryption,
    ) -> Self {
        self.central_directory_encryption = Some(encryption);
        self
    }
}

/// Per-entry settings.
///
/// # Example
///
/// ```rust
/// use zipspan::codec::Compression;
/// use zipspan::crypto::{Encryption, Password};
/// use zipspan::write::EntrySettings;
///
/// let settings = EntrySettings::new()
///     .with_compression(Compression::Deflate { level: 9 })
///     .unwrap()
///     .with_encryption(Encryption::AES256, Password::new("secret"));
/// assert!(settings.encryption.is_encrypted());
/// ```
#[derive(Debug, Clone)]
pub struct EntrySettings {
    /// Compression method and level.
    pub compression: Compression,
    /// Encryption scheme.
    pub encryption: Encryption,
    /// Password for `encryption`.
    pub password: Option<Password>,
    /// Streams sizes and CRC in a trailing data descriptor. When `false`
    /// the entry is spooled to a temporary file so the local header can
    /// carry final values. PKWARE encryption always uses a descriptor.
    pub data_descriptor: bool,
    /// Modification time; defaults to now.
    pub last_modified: Option<SystemTime>,
    /// Entry comment.
    pub comment: Option<String>,
    /// Unix permission and type bits, stored in the external attributes.
    pub unix_mode: Option<u32>,
    /// Expected uncompressed size, when known in advance. Picks the AES
    /// vendor version and is checked against the bytes actually written.
    pub size_hint: Option<u64>,
}

impl Default for EntrySettings {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            encryption: Encryption::None,
            password: None,
            data_descriptor: true,
            last_modified: None,
            comment: None,
            unix_mode: None,
            size_hint: None,
        }
    }
}

impl EntrySettings {
    /// Deflate level 6, unencrypted, with a data descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression, validating its level.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCompressionLevel`] for an out-of-range level and
    /// [`Error::UnsupportedMethod`] when the backend is not compiled in.
    pub fn with_compression(mut self, compression: Compression) -> Result<Self> {
        self.compression = compression.validate()?;
        Ok(self)
    }

    /// Encrypts the entry.
    pub fn with_encryption(
        mut self,
        encryption: Encryption,
        password: impl Into<Password>,
    ) -> Self {
        self.encryption = encryption;
        self.password = Some(password.into());
        self
    }

    /// Enables or disables the trailing data descriptor.
    pub fn with_data_descriptor(mut self, enabled: bool) -> Self {
        self.data_descriptor = enabled;
        self
    }

    /// Sets the modification time.
    pub fn with_last_modified(mut self, time: SystemTime) -> Self {
        self.last_modified = Some(time);
        self
    }

    /// Sets the entry comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets Unix mode bits.
    pub fn with_unix_mode(mut self, mode: u32) -> Self {
        self.unix_mode = Some(mode);
        self
    }

    /// Declares the uncompressed size in advance.
    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    /// Data descriptor policy after forcing it for PKWARE.
    pub(crate) fn uses_data_descriptor(&self) -> bool {
        self.data_descriptor || self.encryption == Encryption::Pkware
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_size_minimum() {
        assert!(matches!(
            ZipSettings::new().with_split_size(MIN_SPLIT_SIZE - 1),
            Err(Error::InvalidSplitSize { .. })
        ));
        assert!(ZipSettings::new().with_split_size(MIN_SPLIT_SIZE).is_ok());
    }

    #[test]
    fn test_level_validation() {
        assert!(matches!(
            EntrySettings::new().with_compression(Compression::Deflate { level: 10 }),
            Err(Error::InvalidCompressionLevel { .. })
        ));
        assert!(EntrySettings::new().with_compression(Compression::Store).is_ok());
    }

    #[test]
    fn test_pkware_forces_descriptor() {
        let settings = EntrySettings::new()
            .with_data_descriptor(false)
            .with_encryption(Encryption::Pkware, "pw");
        assert!(settings.uses_data_descriptor());
        let settings = EntrySettings::new().with_data_descriptor(false);
        assert!(!settings.uses_data_descriptor());
    }

    #[test]
    fn test_directory_compression_restricted() {
        let enc = CentralDirectoryEncryption::new("pw");
        assert!(enc.clone().with_compression(Compression::Store).is_ok());
        assert!(matches!(
            enc.with_compression(Compression::Bzip2 { level: 9 }),
            Err(Error::UnsupportedFeature { .. })
        ));
    }
}
