//! Strong (AES-CBC) encryption tests.
//!
//! CBC works on 16-byte blocks and the last block carries padding, so the
//! decoder must hand out plaintext correctly whatever size the caller asks
//! for, and must never return padding bytes.

mod common;

use std::io::Read;

use common::{open, random_bytes, scratch, write_archive};
use zipspan::codec::Compression;
use zipspan::crypto::{AesStrength, Encryption};
use zipspan::{EntrySettings, ZipSettings};

const PASSWORD: &str = "block-cipher";

fn read_in_chunks(mut reader: impl Read, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = reader.read(&mut buf).expect("read failed");
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn test_non_aligned_read_sizes() {
    // Lengths around block boundaries, including exact multiples.
    let lengths = [0usize, 1, 15, 16, 17, 31, 32, 33, 1_000, 4_096, 65_537];
    let (_dir, path) = scratch();
    let payloads: Vec<(String, Vec<u8>)> = lengths
        .iter()
        .map(|&len| (format!("len-{len}.bin"), random_bytes(len, len as u64)))
        .collect();
    let settings = EntrySettings::new()
        .with_compression(Compression::Store)
        .unwrap()
        .with_encryption(
            Encryption::Strong {
                strength: AesStrength::Aes256,
            },
            PASSWORD,
        );
    let entries: Vec<(&str, &[u8], EntrySettings)> = payloads
        .iter()
        .map(|(name, data)| (name.as_str(), data.as_slice(), settings.clone()))
        .collect();
    write_archive(&path, ZipSettings::new(), &entries);

    let archive = open(&path, Some(PASSWORD));
    for (name, data) in &payloads {
        for chunk in [1usize, 3, 7, 15, 16, 17, 100, 8_192] {
            let reader = archive.reader(name).unwrap();
            assert_eq!(&read_in_chunks(reader, chunk), data, "{name} in chunks of {chunk}");
        }
    }
}

#[test]
fn test_every_strength_with_compression() {
    let data = common::text_bytes(30_001);
    for strength in [AesStrength::Aes128, AesStrength::Aes192, AesStrength::Aes256] {
        for compression in common::all_compressions() {
            let (_dir, path) = scratch();
            let encryption = Encryption::Strong { strength };
            let settings = common::entry_settings(compression, encryption, PASSWORD);
            write_archive(&path, ZipSettings::new(), &[("a.txt", &data, settings)]);

            let archive = open(&path, Some(PASSWORD));
            let entry = archive.entry("a.txt").unwrap();
            assert_eq!(entry.encryption, Encryption::Strong { strength });
            assert!(entry.flags.is_strong_encryption());
            assert_eq!(read_in_chunks(archive.reader("a.txt").unwrap(), 13), data);
        }
    }
}

#[test]
fn test_stored_size_covers_padding() {
    let (_dir, path) = scratch();
    let data = random_bytes(100, 5);
    let settings = EntrySettings::new()
        .with_compression(Compression::Store)
        .unwrap()
        .with_encryption(
            Encryption::Strong {
                strength: AesStrength::Aes128,
            },
            PASSWORD,
        );
    write_archive(&path, ZipSettings::new(), &[("a.bin", &data, settings)]);

    let archive = open(&path, Some(PASSWORD));
    let entry = archive.entry("a.bin").unwrap();
    // 100 bytes pad to 112; the decryption header comes on top.
    assert!(entry.compressed_size >= 112);
    assert_eq!(archive.read_to_vec("a.bin").unwrap(), data);
}
