//! Property-based tests using proptest.
//!
//! These tests verify invariants of the zipspan library using randomly
//! generated inputs.

mod common;

use std::io::Write;

use proptest::prelude::*;
use zipspan::checksum::{Checksum, Crc32};
use zipspan::timestamp::DosDateTime;
use zipspan::volume::MIN_SPLIT_SIZE;
use zipspan::{ArchivePath, Charset, ZipSettings, ZipWriter};

/// Strategy for generating valid archive path strings.
///
/// - 1-4 path components separated by '/'
/// - Each component is 1-10 characters from a conservative alphabet
/// - Excludes "." and ".." segments (path traversal)
fn valid_path_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-zA-Z0-9][a-zA-Z0-9_.-]{0,9}", 1..4)
        .prop_map(|parts| parts.join("/"))
        .prop_filter("must not contain dot segments", |s| {
            !s.split('/').any(|seg| seg == "." || seg == "..")
        })
}

proptest! {
    /// Valid paths should always parse, unchanged.
    #[test]
    fn valid_paths_parse_successfully(path in valid_path_strategy()) {
        let parsed = ArchivePath::file(&path);
        prop_assert!(parsed.is_ok(), "Valid path '{}' failed to parse: {:?}", path, parsed);
        let parsed = parsed.unwrap();
        prop_assert_eq!(parsed.as_str(), path.as_str());

        let dir = ArchivePath::directory(&path).unwrap();
        let expected = format!("{}/", path);
        prop_assert_eq!(dir.as_str(), expected.as_str());
    }

    /// A '..' segment anywhere is rejected.
    #[test]
    fn traversal_segments_rejected(
        prefix in valid_path_strategy(),
        suffix in valid_path_strategy(),
    ) {
        let path = format!("{}/../{}", prefix, suffix);
        prop_assert!(ArchivePath::file(&path).is_err());
    }

    /// DOS timestamps keep every field, with seconds at 2-second resolution.
    #[test]
    fn dos_time_fields_round_trip(
        year in 1980u16..=2107,
        month in 1u8..=12,
        day in 1u8..=28,
        hour in 0u8..=23,
        minute in 0u8..=59,
        second in 0u8..=59,
    ) {
        let dos = DosDateTime::new(year, month, day, hour, minute, second).unwrap();
        let back = DosDateTime::from_u32(dos.to_u32());
        prop_assert_eq!(back.year(), year);
        prop_assert_eq!(back.month(), month);
        prop_assert_eq!(back.day(), day);
        prop_assert_eq!(back.hour(), hour);
        prop_assert_eq!(back.minute(), minute);
        prop_assert_eq!(back.second(), second & !1);

        let via_system = DosDateTime::from_system_time(dos.to_system_time());
        prop_assert_eq!(via_system, dos);
    }

    /// Text made of CP437 characters survives an encode/decode cycle.
    #[test]
    fn cp437_text_round_trips(text in "[a-zA-Z0-9 ._éüÇåñ¿½░│]{1,40}") {
        let (bytes, utf8) = Charset::Cp437.encode(&text);
        prop_assert!(!utf8);
        prop_assert_eq!(Charset::Cp437.decode(&bytes, false), text);
    }

    /// The incremental CRC does not depend on how the input is chunked.
    #[test]
    fn crc_independent_of_chunking(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        chunk in 1usize..512,
    ) {
        let mut crc = Crc32::new();
        for part in data.chunks(chunk) {
            crc.update(part);
        }
        prop_assert_eq!(crc.finalize(), Crc32::compute(&data));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any payload, written in any chunking with any method, reads back intact.
    #[test]
    fn entries_round_trip(
        data in proptest::collection::vec(any::<u8>(), 0..20_000),
        chunk in 1usize..5_000,
        compression in 0usize..8,
        encryption in 0usize..8,
        data_descriptor in any::<bool>(),
        split in any::<bool>(),
    ) {
        let compressions = common::all_compressions();
        let encryptions = common::all_encryptions();
        let compression = compressions[compression % compressions.len()];
        let encryption = encryptions[encryption % encryptions.len()];

        let (_dir, path) = common::scratch();
        let settings = if split {
            ZipSettings::new().with_split_size(MIN_SPLIT_SIZE).unwrap()
        } else {
            ZipSettings::new()
        };
        let mut writer = ZipWriter::create(&path, settings).unwrap();
        // Fill the first volume so small payloads still cross a seam.
        if split {
            writer
                .add_bytes(
                    "filler.bin",
                    &common::random_bytes(MIN_SPLIT_SIZE as usize - 100, 1),
                    zipspan::EntrySettings::new()
                        .with_compression(zipspan::codec::Compression::Store)
                        .unwrap(),
                )
                .unwrap();
        }
        let entry_settings = common::entry_settings(compression, encryption, "pw")
            .with_data_descriptor(data_descriptor);
        let mut entry = writer.start_entry("payload.bin", entry_settings).unwrap();
        for part in data.chunks(chunk) {
            entry.write_all(part).unwrap();
        }
        entry.finish().unwrap();
        writer.finish().unwrap();

        let archive = common::open(&path, Some("pw"));
        prop_assert_eq!(archive.read_to_vec("payload.bin").unwrap(), data);
    }
}
