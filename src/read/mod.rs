//! Reading ZIP archives.
//!
//! [`ZipArchive::open`] locates the end records on the last volume, loads
//! the central directory (decrypting it when needed) and indexes the
//! entries by name. Entry payloads are streamed through [`EntryReader`],
//! which decrypts, decompresses and verifies them on the fly.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::Read;
//! use zipspan::{ReadOptions, ZipArchive};
//!
//! # fn main() -> zipspan::Result<()> {
//! let archive = ZipArchive::open("backup.zip", ReadOptions::new().with_password("secret"))?;
//! for entry in archive.entries() {
//!     println!("{} ({} bytes)", entry.name, entry.uncompressed_size);
//! }
//!
//! let mut text = String::new();
//! archive.reader("notes.txt")?.read_to_string(&mut text)?;
//! # Ok(())
//! # }
//! ```

mod central;
mod entry_input;
mod extract;
mod locate;

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::charset::{Charset, decode_archive_comment};
use crate::crypto::Password;
use crate::entry::ZipEntry;
use crate::format::local::LocalFileHeader;
use crate::volume::{SplitReader, SrcZip};
use crate::{Error, Result};

pub use entry_input::EntryReader;
pub use extract::{ExtractFailure, ExtractReport};

/// Supplies passwords for encrypted entries and directories.
///
/// `entry` is the entry name, or `None` for the encrypted central
/// directory.
pub trait PasswordProvider {
    /// Returns the password to try, or `None` if there is none.
    fn password_for(&self, entry: Option<&str>) -> Option<Password>;
}

impl PasswordProvider for Password {
    fn password_for(&self, _entry: Option<&str>) -> Option<Password> {
        Some(self.clone())
    }
}

impl<F> PasswordProvider for F
where
    F: Fn(Option<&str>) -> Option<Password>,
{
    fn password_for(&self, entry: Option<&str>) -> Option<Password> {
        self(entry)
    }
}

/// Options for opening an archive.
#[derive(Clone, Default)]
pub struct ReadOptions {
    charset: Charset,
    password: Option<Password>,
    provider: Option<Arc<dyn PasswordProvider + Send + Sync>>,
}

impl fmt::Debug for ReadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOptions")
            .field("charset", &self.charset)
            .field("password", &self.password)
            .field("provider", &self.provider.as_ref().map(|_| "<provider>"))
            .finish()
    }
}

impl ReadOptions {
    /// Default options: names without the UTF-8 flag decode as UTF-8, no password.
    pub fn new() -> Self {
        Self::default()
    }

    /// Charset for names and comments that lack the UTF-8 flag.
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Password used for every encrypted entry and the central directory.
    pub fn with_password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Asks `provider` for passwords; a fixed password takes precedence.
    pub fn with_password_provider(
        mut self,
        provider: impl PasswordProvider + Send + Sync + 'static,
    ) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }
}

impl PasswordProvider for ReadOptions {
    fn password_for(&self, entry: Option<&str>) -> Option<Password> {
        self.password
            .clone()
            .or_else(|| self.provider.as_ref().and_then(|p| p.password_for(entry)))
    }
}

/// An open ZIP archive, single file or split.
#[derive(Debug)]
pub struct ZipArchive {
    src: SrcZip,
    entries: Vec<ZipEntry>,
    index: HashMap<String, usize>,
    comment: String,
    encrypted_directory: bool,
    options: ReadOptions,
}

impl ZipArchive {
    /// Opens the archive at `path`, the final (`.zip`) volume of a split set.
    pub fn open(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let src = SrcZip::open(path.as_ref())?;
        let end = locate::locate(&src)?;
        let headers = central::read_central_directory(&src, &end, &options)?;

        let entries = headers
            .iter()
            .map(|header| ZipEntry::from_central(header, options.charset))
            .collect::<Result<Vec<_>>>()?;
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if index.contains_key(&entry.name) {
                log::warn!("duplicate entry name '{}', keeping the first", entry.name);
                continue;
            }
            index.insert(entry.name.clone(), i);
        }

        let comment = decode_archive_comment(options.charset, &end.eocd.comment).into_owned();
        let encrypted_directory = end.zip64.as_ref().is_some_and(|z| z.data_sector.is_some());
        log::debug!(
            "opened {}: {} volume(s), {} entries{}",
            path.as_ref().display(),
            src.disk_count(),
            entries.len(),
            if encrypted_directory { ", encrypted directory" } else { "" }
        );

        Ok(Self {
            src,
            entries,
            index,
            comment,
            encrypted_directory,
            options,
        })
    }

    /// Entries in central directory order.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Looks an entry up by name.
    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the archive holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archive comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Returns `true` for a split archive.
    pub fn is_split(&self) -> bool {
        self.src.is_split()
    }

    /// Returns `true` if the central directory was stored encrypted.
    pub fn has_encrypted_directory(&self) -> bool {
        self.encrypted_directory
    }

    /// Volume paths, disk 0 first.
    pub fn volume_paths(&self) -> Vec<PathBuf> {
        self.src.paths()
    }

    /// Opens a verifying reader over the contents of `name`.
    ///
    /// Each reader has its own file handles, so several may be used at
    /// once, from different threads.
    pub fn reader(&self, name: &str) -> Result<EntryReader> {
        let entry = self.entry(name).ok_or_else(|| Error::EntryNotFound {
            path: name.to_string(),
        })?;
        self.open_entry(entry).map_err(|e| e.with_entry(name))
    }

    /// Reads all of `name` into memory.
    pub fn read_to_vec(&self, name: &str) -> Result<Vec<u8>> {
        let mut reader = self.reader(name)?;
        let capacity = usize::try_from(reader.expected_size()).unwrap_or(0).min(64 << 20);
        let mut out = Vec::with_capacity(capacity);
        reader.read_to_end(&mut out).map_err(|e| Error::from(e).with_entry(name))?;
        Ok(out)
    }

    pub(crate) fn open_entry(&self, entry: &ZipEntry) -> Result<EntryReader> {
        entry.method.ensure_supported()?;
        let password = if entry.is_encrypted() {
            let password = self
                .options
                .password_for(Some(&entry.name))
                .ok_or_else(|| Error::PasswordRequired {
                    entry_name: Some(entry.name.clone()),
                })?;
            Some(password)
        } else {
            None
        };

        let mut source = SplitReader::new(&self.src);
        source.seek_disk(entry.disk_start, entry.local_header_offset)?;
        let local = LocalFileHeader::read(&mut source, entry.local_header_offset)?;
        if local.name != entry.raw_name() {
            log::warn!(
                "local header name differs from central directory for '{}'",
                entry.name
            );
        }
        log::trace!(
            "reading '{}' from disk {} offset {}",
            entry.name,
            entry.disk_start,
            entry.local_header_offset
        );
        EntryReader::new(entry, source, password.as_ref())
    }
}
