//! # zipspan
//!
//! A pure-Rust codec for ZIP archives: single files or split sets, ZIP64,
//! PKWARE traditional, WinZip AES and strong AES encryption, and Store,
//! Deflate, BZip2, LZMA and Zstandard compression.
//!
//! ## Quick Start
//!
//! ### Creating an Archive
//!
//! ```rust,no_run
//! use zipspan::codec::Compression;
//! use zipspan::crypto::Encryption;
//! use zipspan::{EntrySettings, ZipSettings, ZipWriter};
//!
//! fn main() -> zipspan::Result<()> {
//!     let settings = ZipSettings::new().with_split_size(1024 * 1024)?;
//!     let mut writer = ZipWriter::create("backup.zip", settings)?;
//!
//!     let entry = EntrySettings::new()
//!         .with_compression(Compression::Deflate { level: 6 })?
//!         .with_encryption(Encryption::AES256, "secret");
//!     writer.add_bytes("notes.txt", b"Hello, World!", entry)?;
//!     writer.add_directory("empty/", EntrySettings::new())?;
//!
//!     // Every volume, disk 0 first; the last is backup.zip.
//!     let volumes = writer.finish()?;
//!     println!("wrote {} volume(s)", volumes.len());
//!     Ok(())
//! }
//! ```
//!
//! ### Streaming an Entry
//!
//! ```rust,no_run
//! use std::io::Write;
//! use zipspan::{EntrySettings, ZipSettings, ZipWriter};
//!
//! fn main() -> zipspan::Result<()> {
//!     let mut writer = ZipWriter::create("log.zip", ZipSettings::new())?;
//!     let mut entry = writer.start_entry("app.log", EntrySettings::new())?;
//!     for line in ["one\n", "two\n"] {
//!         entry.write_all(line.as_bytes())?;
//!     }
//!     entry.finish()?;
//!     writer.finish()?;
//!     Ok(())
//! }
//! ```
//!
//! ### Extracting an Archive
//!
//! ```rust,no_run
//! use zipspan::{ReadOptions, ZipArchive};
//!
//! fn main() -> zipspan::Result<()> {
//!     let archive = ZipArchive::open("backup.zip", ReadOptions::new().with_password("secret"))?;
//!     let report = archive.extract_all("./output")?;
//!     for failure in &report.failures {
//!         eprintln!("{}: {}", failure.entry_name, failure.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate compression (method 8) |
//! | `bzip2` | Yes | BZip2 compression (method 12) |
//! | `lzma` | Yes | LZMA compression (method 14) |
//! | `zstd` | Yes | Zstandard compression (method 93) |
//!
//! Store and every encryption scheme are always available. Entries using a
//! disabled method fail with [`Error::UnsupportedMethod`].
//!
//! ## Integrity
//!
//! Every byte read through [`read::EntryReader`] is checked: the CRC-32
//! and size are compared when the stream ends, WinZip AES authentication
//! codes and strong-encryption padding are verified, and a wrong password
//! is detected before any plaintext is produced.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

/// Default buffer size for read operations (8 KiB).
pub(crate) const READ_BUFFER_SIZE: usize = 8192;

pub mod archive_path;
pub mod charset;
pub mod checksum;
pub mod codec;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod format;
pub mod io;
pub mod read;
pub mod source;
pub mod timestamp;
pub mod volume;
pub mod write;

pub use archive_path::ArchivePath;
pub use charset::Charset;
pub use crypto::Password;
pub use entry::ZipEntry;
pub use error::{Error, PasswordDetectionMethod, Result};
pub use read::{
    EntryReader, ExtractFailure, ExtractReport, PasswordProvider, ReadOptions, ZipArchive,
};
pub use source::EntrySource;
pub use timestamp::{DosDateTime, Timestamp};
pub use write::{
    CentralDirectoryEncryption, EntrySettings, EntryWriter, Zip64Mode, ZipSettings, ZipWriter,
};
