//! Error types for ZIP archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when reading or writing ZIP archives, along with a
//! [`Result<T>`] type alias.
//!
//! # Error kinds
//!
//! | Kind | Variants |
//! |------|----------|
//! | Malformed input | [`InvalidFormat`][Error::InvalidFormat], [`CorruptHeader`][Error::CorruptHeader], [`SignatureMismatch`][Error::SignatureMismatch], [`UnknownMethod`][Error::UnknownMethod] |
//! | Incorrect password | [`WrongPassword`][Error::WrongPassword], [`PasswordRequired`][Error::PasswordRequired] |
//! | Integrity | [`CrcMismatch`][Error::CrcMismatch], [`SizeMismatch`][Error::SizeMismatch], [`MacMismatch`][Error::MacMismatch] |
//! | I/O | [`Io`][Error::Io], [`VolumeMissing`][Error::VolumeMissing], [`VolumeCorrupted`][Error::VolumeCorrupted] |
//! | Unsupported | [`UnsupportedMethod`][Error::UnsupportedMethod], [`UnsupportedEncryption`][Error::UnsupportedEncryption], [`UnsupportedFeature`][Error::UnsupportedFeature] |
//!
//! Errors raised while an entry is being processed always name the entry,
//! either through their own `entry_name` field or by being wrapped in
//! [`Error::Entry`].
//!
//! ```rust,no_run
//! use zipspan::{Error, ReadOptions, ZipArchive};
//!
//! fn read_secret(path: &str) -> zipspan::Result<Vec<u8>> {
//!     let archive = ZipArchive::open(path, ReadOptions::new().with_password("hunter2"))?;
//!     match archive.read_to_vec("secret.txt") {
//!         Err(Error::WrongPassword { entry_name, .. }) => {
//!             eprintln!("wrong password for {:?}", entry_name);
//!             Err(Error::PasswordRequired { entry_name })
//!         }
//!         other => other,
//!     }
//! }
//! ```

use std::io;

/// How a wrong password was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PasswordDetectionMethod {
    /// The last byte of the decrypted PKWARE header did not match the
    /// expected check byte.
    CheckByte,

    /// The 2-byte WinZip AES password verification value did not match.
    VerificationValue,

    /// The decrypted strong-encryption validation data failed its padding
    /// or CRC-32 check.
    ValidationData,
}

impl std::fmt::Display for PasswordDetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CheckByte => write!(f, "encryption header check byte"),
            Self::VerificationValue => write!(f, "password verification value"),
            Self::ValidationData => write!(f, "password validation data"),
        }
    }
}

/// Helper struct for formatting messages that may name an entry.
struct EntrySuffix<'a>(Option<&'a str>);

impl std::fmt::Display for EntrySuffix<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(name) => write!(f, " for entry '{}'", name),
            None => Ok(()),
        }
    }
}

/// The main error type for ZIP archive operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    ///
    /// Errors produced inside a stream decorator chain that carry one of
    /// this crate's own errors are unwrapped back into that error by the
    /// `From<io::Error>` conversion, so this variant only holds genuine
    /// I/O failures.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The archive is not a ZIP archive or a record is structurally invalid.
    #[error("Invalid ZIP format: {0}")]
    InvalidFormat(String),

    /// A record is corrupt or truncated at a known offset.
    #[error("Corrupt header at offset {offset:#x}: {reason}")]
    CorruptHeader {
        /// The byte offset where corruption was detected.
        offset: u64,
        /// A description of the corruption.
        reason: String,
    },

    /// A record signature did not match at the location where it was expected.
    #[error("Bad signature at offset {offset:#x}: expected {expected:#010x}, found {actual:#010x}")]
    SignatureMismatch {
        /// The byte offset of the signature.
        offset: u64,
        /// The expected signature.
        expected: u32,
        /// The value actually read.
        actual: u32,
    },

    /// A compression method identifier that the ZIP format does not define.
    #[error("Unknown compression method {method_id}")]
    UnknownMethod {
        /// The raw method identifier.
        method_id: u16,
    },

    /// A compression method defined by the ZIP format but not implemented
    /// (or disabled in this build).
    #[error("Unsupported compression method {method_id}")]
    UnsupportedMethod {
        /// The raw method identifier.
        method_id: u16,
    },

    /// An encryption algorithm recognized by the format but not implemented.
    #[error("Unsupported encryption algorithm: {algorithm}")]
    UnsupportedEncryption {
        /// Human-readable algorithm name or identifier.
        algorithm: String,
    },

    /// A feature required by the archive is not supported.
    #[error("Unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: &'static str,
    },

    /// The password is incorrect.
    ///
    /// Raised before any payload byte reaches the decompressor.
    #[error(
        "Wrong password{} (detected by {detection_method})",
        EntrySuffix(entry_name.as_deref())
    )]
    WrongPassword {
        /// The entry name, if known.
        entry_name: Option<String>,
        /// Which check rejected the password.
        detection_method: PasswordDetectionMethod,
    },

    /// An encrypted entry or central directory was opened without a password.
    #[error("Password required{}", EntrySuffix(entry_name.as_deref()))]
    PasswordRequired {
        /// The entry name, if known.
        entry_name: Option<String>,
    },

    /// A cryptographic primitive failed (invalid key length, bad padding).
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// The CRC-32 of the extracted data does not match the stored value.
    #[error(
        "CRC mismatch{}: expected {expected:#010x}, got {actual:#010x}",
        EntrySuffix(entry_name.as_deref())
    )]
    CrcMismatch {
        /// The entry name, if known.
        entry_name: Option<String>,
        /// The CRC stored in the archive.
        expected: u32,
        /// The CRC of the data actually produced.
        actual: u32,
    },

    /// The number of bytes extracted does not match the declared size.
    #[error(
        "Size mismatch{}: expected {expected} bytes, got {actual}",
        EntrySuffix(entry_name.as_deref())
    )]
    SizeMismatch {
        /// The entry name, if known.
        entry_name: Option<String>,
        /// The declared uncompressed size.
        expected: u64,
        /// The number of bytes actually produced.
        actual: u64,
    },

    /// The WinZip AES authentication code did not match.
    ///
    /// Either the data is corrupt or the password is wrong and happened to
    /// pass the 2-byte verification value.
    #[error("Authentication code mismatch{}", EntrySuffix(entry_name.as_deref()))]
    MacMismatch {
        /// The entry name, if known.
        entry_name: Option<String>,
    },

    /// A lower-level error annotated with the entry being processed.
    #[error("Entry '{entry_name}': {source}")]
    Entry {
        /// The entry name.
        entry_name: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Path traversal detected while extracting an entry.
    #[error("Path traversal detected in entry: {path}")]
    PathTraversal {
        /// The offending entry name.
        path: String,
    },

    /// An entry name is invalid.
    #[error("Invalid archive path: {0}")]
    InvalidArchivePath(String),

    /// A volume file of a split archive is missing.
    #[error("Volume {volume} missing: expected at '{path}'")]
    VolumeMissing {
        /// The 0-based disk number.
        volume: u32,
        /// The expected path of the missing volume.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A volume file is corrupted or truncated.
    #[error("Volume {volume} corrupted: {details}")]
    VolumeCorrupted {
        /// The 0-based disk number.
        volume: u32,
        /// Description of the corruption.
        details: String,
    },

    /// An entry was not found in the archive.
    #[error("Entry not found: {path}")]
    EntryNotFound {
        /// The name that was looked up.
        path: String,
    },

    /// An entry with the same name was already written.
    #[error("Entry already exists: {path}")]
    EntryExists {
        /// The duplicated name.
        path: String,
    },

    /// An invalid compression level was provided.
    #[error("invalid compression level {level} for {method}")]
    InvalidCompressionLevel {
        /// The method the level was given for.
        method: &'static str,
        /// The invalid level.
        level: i32,
    },

    /// The split size is below the format minimum.
    #[error("invalid split size {size}: must be at least {minimum} bytes")]
    InvalidSplitSize {
        /// The requested split size.
        size: u64,
        /// The smallest accepted split size.
        minimum: u64,
    },

    /// An operation was attempted in the wrong writer or reader state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

impl Error {
    /// Returns `true` if retrying with different input might succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::WrongPassword { .. } | Error::PasswordRequired { .. } => true,
            Error::VolumeMissing { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            Error::Entry { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Returns `true` if this is a data corruption or integrity error.
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::CrcMismatch { .. }
            | Error::SizeMismatch { .. }
            | Error::MacMismatch { .. }
            | Error::CorruptHeader { .. }
            | Error::SignatureMismatch { .. }
            | Error::VolumeCorrupted { .. } => true,
            Error::Entry { source, .. } => source.is_corruption(),
            _ => false,
        }
    }

    /// Returns `true` if this is an encryption-related error.
    pub fn is_encryption_error(&self) -> bool {
        match self {
            Error::WrongPassword { .. }
            | Error::PasswordRequired { .. }
            | Error::MacMismatch { .. }
            | Error::CryptoError(_)
            | Error::UnsupportedEncryption { .. } => true,
            Error::Entry { source, .. } => source.is_encryption_error(),
            _ => false,
        }
    }

    /// Returns `true` if the archive uses something this build cannot handle.
    pub fn is_unsupported(&self) -> bool {
        match self {
            Error::UnsupportedMethod { .. }
            | Error::UnsupportedEncryption { .. }
            | Error::UnsupportedFeature { .. } => true,
            Error::Entry { source, .. } => source.is_unsupported(),
            _ => false,
        }
    }

    /// Returns the entry name associated with this error, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Error::WrongPassword { entry_name, .. }
            | Error::PasswordRequired { entry_name }
            | Error::CrcMismatch { entry_name, .. }
            | Error::SizeMismatch { entry_name, .. }
            | Error::MacMismatch { entry_name } => entry_name.as_deref(),
            Error::Entry { entry_name, .. } => Some(entry_name),
            Error::PathTraversal { path } => Some(path),
            Error::EntryNotFound { path } | Error::EntryExists { path } => Some(path),
            _ => None,
        }
    }

    /// Attaches an entry name to this error.
    ///
    /// Variants with their own `entry_name` field have it filled in (an
    /// existing name is kept); anything else is wrapped in [`Error::Entry`].
    pub fn with_entry(self, name: &str) -> Self {
        fn fill(slot: Option<String>, name: &str) -> Option<String> {
            slot.or_else(|| Some(name.to_string()))
        }

        match self {
            Error::WrongPassword {
                entry_name,
                detection_method,
            } => Error::WrongPassword {
                entry_name: fill(entry_name, name),
                detection_method,
            },
            Error::PasswordRequired { entry_name } => Error::PasswordRequired {
                entry_name: fill(entry_name, name),
            },
            Error::CrcMismatch {
                entry_name,
                expected,
                actual,
            } => Error::CrcMismatch {
                entry_name: fill(entry_name, name),
                expected,
                actual,
            },
            Error::SizeMismatch {
                entry_name,
                expected,
                actual,
            } => Error::SizeMismatch {
                entry_name: fill(entry_name, name),
                expected,
                actual,
            },
            Error::MacMismatch { entry_name } => Error::MacMismatch {
                entry_name: fill(entry_name, name),
            },
            e @ (Error::Entry { .. }
            | Error::PathTraversal { .. }
            | Error::EntryNotFound { .. }
            | Error::EntryExists { .. }) => e,
            other => Error::Entry {
                entry_name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through [`Error::Entry`].
    pub fn kind(&self) -> &Error {
        match self {
            Error::Entry { source, .. } => source.kind(),
            other => other,
        }
    }

    /// Creates a WrongPassword error without entry context.
    pub fn wrong_password(detection_method: PasswordDetectionMethod) -> Self {
        Error::WrongPassword {
            entry_name: None,
            detection_method,
        }
    }

    /// Creates a CorruptHeader error.
    pub fn corrupt_header(offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptHeader {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            let kind = err.kind();
            return match err.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(inner)) => *inner,
                Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
                None => Error::Io(io::Error::from(kind)),
            };
        }
        Error::Io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => {
                let kind = match &other {
                    Error::VolumeMissing { .. } => io::ErrorKind::NotFound,
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

/// A specialized Result type for ZIP operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_survives_io_boundary() {
        let original = Error::MacMismatch { entry_name: None };
        let io_err: io::Error = original.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        let back: Error = io_err.into();
        assert!(matches!(back, Error::MacMismatch { .. }));
    }

    #[test]
    fn test_os_error_is_not_lost() {
        let io_err = io::Error::from_raw_os_error(2);
        let err: Error = io_err.into();
        match err {
            Error::Io(e) => assert_eq!(e.raw_os_error(), Some(2)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_with_entry_fills_name() {
        let err = Error::wrong_password(PasswordDetectionMethod::CheckByte).with_entry("a.txt");
        assert_eq!(err.entry_name(), Some("a.txt"));
        assert!(matches!(err, Error::WrongPassword { .. }));
        assert!(err.to_string().contains("a.txt"));
    }

    #[test]
    fn test_with_entry_keeps_existing_name() {
        let err = Error::CrcMismatch {
            entry_name: Some("first".into()),
            expected: 1,
            actual: 2,
        }
        .with_entry("second");
        assert_eq!(err.entry_name(), Some("first"));
    }

    #[test]
    fn test_with_entry_wraps_other_kinds() {
        let err = Error::InvalidFormat("bad".into()).with_entry("dir/file.bin");
        assert!(matches!(err, Error::Entry { .. }));
        assert_eq!(err.entry_name(), Some("dir/file.bin"));
        assert!(matches!(err.kind(), Error::InvalidFormat(_)));

        let twice = err.with_entry("other");
        assert_eq!(twice.entry_name(), Some("dir/file.bin"));
    }

    #[test]
    fn test_classification() {
        assert!(Error::wrong_password(PasswordDetectionMethod::VerificationValue).is_recoverable());
        assert!(Error::MacMismatch { entry_name: None }.is_corruption());
        assert!(Error::MacMismatch { entry_name: None }.is_encryption_error());
        assert!(Error::UnsupportedMethod { method_id: 6 }.is_unsupported());
        assert!(!Error::UnknownMethod { method_id: 77 }.is_unsupported());

        let wrapped = Error::UnsupportedMethod { method_id: 98 }.with_entry("x");
        assert!(wrapped.is_unsupported());
    }

    #[test]
    fn test_signature_mismatch_display() {
        let err = Error::SignatureMismatch {
            offset: 0x10,
            expected: 0x04034b50,
            actual: 0,
        };
        assert_eq!(
            err.to_string(),
            "Bad signature at offset 0x10: expected 0x04034b50, found 0x00000000"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
