//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tempfile::TempDir;
use zipspan::codec::Compression;
use zipspan::crypto::{AesStrength, Encryption};
use zipspan::{EntrySettings, ReadOptions, ZipArchive, ZipSettings, ZipWriter};

/// A scratch directory and an archive path inside it.
pub fn scratch() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("test.zip");
    (dir, path)
}

/// Incompressible bytes, reproducible for a given seed.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

/// Highly compressible text.
pub fn text_bytes(len: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

/// Every compression the build supports.
pub fn all_compressions() -> Vec<Compression> {
    let mut out = vec![Compression::Store];
    #[cfg(feature = "deflate")]
    out.push(Compression::Deflate { level: 6 });
    #[cfg(feature = "bzip2")]
    out.push(Compression::Bzip2 { level: 9 });
    #[cfg(feature = "lzma")]
    out.push(Compression::Lzma { level: 5 });
    #[cfg(feature = "zstd")]
    out.push(Compression::Zstd { level: 3 });
    out
}

/// Every encryption scheme, strengths included.
pub fn all_encryptions() -> Vec<Encryption> {
    let mut out = vec![Encryption::None, Encryption::Pkware];
    for strength in [AesStrength::Aes128, AesStrength::Aes192, AesStrength::Aes256] {
        out.push(Encryption::Aes {
            strength,
            vendor_version: None,
        });
        out.push(Encryption::Strong { strength });
    }
    out
}

/// Entry settings for one compression and encryption pair.
pub fn entry_settings(
    compression: Compression,
    encryption: Encryption,
    password: &str,
) -> EntrySettings {
    let settings = EntrySettings::new()
        .with_compression(compression)
        .expect("Invalid compression");
    if encryption.is_encrypted() {
        settings.with_encryption(encryption, password)
    } else {
        settings
    }
}

/// Writes `entries` to `path` and returns the volume paths.
pub fn write_archive(
    path: &Path,
    settings: ZipSettings,
    entries: &[(&str, &[u8], EntrySettings)],
) -> Vec<PathBuf> {
    let mut writer = ZipWriter::create(path, settings).expect("Failed to create writer");
    for (name, data, entry) in entries {
        writer
            .add_bytes(name, data, entry.clone())
            .expect("Failed to add entry");
    }
    writer.finish().expect("Failed to finish archive")
}

/// Opens `path`, optionally with a password.
pub fn open(path: &Path, password: Option<&str>) -> ZipArchive {
    let options = match password {
        Some(p) => ReadOptions::new().with_password(p),
        None => ReadOptions::new(),
    };
    ZipArchive::open(path, options).expect("Failed to open archive")
}
