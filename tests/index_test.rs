mod common;

use std::fs;
use std::sync::atomic::AtomicBool;

use stdfio::{
    CompressionKind, Endianness, FileSession, OffsetIndex, StreamError, Version, UNKNOWN_KIND,
};
use tempfile::NamedTempFile;

fn two_part_lot(version: Version, endian: Endianness) -> Vec<stdfio::RecordInstance> {
    vec![
        common::header_record(version, endian),
        common::pir(version, endian, 1, 1),
        common::ptr(version, endian, 1, 1, 100, 1.5, 0, false),
        common::prr(version, endian, 1, 1, "P001", 1, false),
        common::pir(version, endian, 1, 1),
        common::ptr(version, endian, 1, 1, 100, 2.5, 0, true),
        common::prr(version, endian, 1, 1, "P002", 7, true),
        common::mrr(version, endian),
    ]
}

#[test]
fn test_index_counts_and_offsets() {
    let temp = NamedTempFile::new().unwrap();
    common::write_file(
        temp.path(),
        CompressionKind::None,
        &two_part_lot(Version::V4, Endianness::Little),
    );

    let mut session = FileSession::open(temp.path()).unwrap();
    let index = session.build_offset_index().unwrap();

    assert!(!index.is_empty());
    assert_eq!(index.record_count(), 8);
    assert_eq!(index.offsets("PIR").len(), 2);
    assert_eq!(index.offsets("PTR").len(), 2);
    assert_eq!(index.offsets("PRR").len(), 2);
    assert_eq!(index.offsets("WIR").len(), 0);
    assert!(index.offsets("FAR") == [0]);
    let ptr_offsets = index.offsets("PTR");
    assert!(ptr_offsets[0] < ptr_offsets[1], "offsets keep stream order");

    let kinds: Vec<&str> = index.kinds().collect();
    assert_eq!(kinds, ["FAR", "MRR", "PIR", "PRR", "PTR"]);
}

#[test]
fn test_rebuild_is_idempotent() {
    let temp = NamedTempFile::new().unwrap();
    common::write_file(
        temp.path(),
        CompressionKind::Gzip,
        &two_part_lot(Version::V4, Endianness::Little),
    );

    let mut session = FileSession::open(temp.path()).unwrap();
    let first = session.build_offset_index().unwrap().clone();
    let second = session.build_offset_index().unwrap().clone();
    assert_eq!(first, second);
}

#[test]
fn test_offsets_survive_envelope_change() {
    // offsets address the decoded stream, so the envelope must not matter
    let records = two_part_lot(Version::V4, Endianness::Big);
    let plain = NamedTempFile::new().unwrap();
    let packed = NamedTempFile::new().unwrap();
    common::write_file(plain.path(), CompressionKind::None, &records);
    common::write_file(packed.path(), CompressionKind::Lzma, &records);

    let mut a = FileSession::open(plain.path()).unwrap();
    let mut b = FileSession::open(packed.path()).unwrap();
    assert_eq!(
        a.build_offset_index().unwrap(),
        b.build_offset_index().unwrap()
    );
}

#[test]
fn test_record_at_indexed_offset() {
    let temp = NamedTempFile::new().unwrap();
    common::write_file(
        temp.path(),
        CompressionKind::Bzip2,
        &two_part_lot(Version::V4, Endianness::Little),
    );

    let mut session = FileSession::open(temp.path()).unwrap();
    session.build_offset_index().unwrap();
    let offsets = session.offset_index().unwrap().offsets("PRR").to_vec();

    let second = session.record_at(offsets[1]).unwrap();
    assert_eq!(second.id(), "PRR");
    assert_eq!(second.get_str("PART_ID"), Some("P002"));
    assert_eq!(second.get_u64("HARD_BIN"), Some(7));

    // random access does not disturb re-reads
    let first = session.record_at(offsets[0]).unwrap();
    assert_eq!(first.get_str("PART_ID"), Some("P001"));
}

#[test]
fn test_snapshot_roundtrip() {
    let temp = NamedTempFile::new().unwrap();
    common::write_file(
        temp.path(),
        CompressionKind::None,
        &two_part_lot(Version::V4, Endianness::Little),
    );

    let mut session = FileSession::open(temp.path()).unwrap();
    let index = session.build_offset_index().unwrap();
    let snapshot = index.to_bytes().unwrap();
    let restored = OffsetIndex::from_bytes(&snapshot).unwrap();
    assert_eq!(&restored, session.offset_index().unwrap());

    // a restored snapshot serves lookups without a fresh walk
    let mut reopened = FileSession::open(temp.path()).unwrap();
    reopened.restore_offset_index(restored);
    let rec = reopened
        .record_at(reopened.offset_index().unwrap().offsets("MRR")[0])
        .unwrap();
    assert_eq!(rec.id(), "MRR");
}

#[test]
fn test_unknown_kind_bucket() {
    let version = Version::V4;
    let endian = Endianness::Little;
    let mut bytes = common::stream_bytes(&[
        common::header_record(version, endian),
        common::pir(version, endian, 1, 1),
    ]);
    bytes.extend_from_slice(&common::unknown_record(endian, &[1, 2, 3, 4]));
    bytes.extend_from_slice(&common::stream_bytes(&[common::prr(
        version, endian, 1, 1, "P1", 1, false,
    )]));
    let temp = NamedTempFile::new().unwrap();
    fs::write(temp.path(), &bytes).unwrap();

    let mut session = FileSession::open(temp.path()).unwrap();
    let index = session.build_offset_index().unwrap();
    assert_eq!(index.record_count(), 4);
    assert_eq!(index.offsets(UNKNOWN_KIND).len(), 1);

    let offset = index.offsets(UNKNOWN_KIND)[0];
    let err = session.record_at(offset).unwrap_err();
    assert!(
        matches!(
            err,
            StreamError::Decode(stdfio::CodecError::UnknownRecordKind { .. })
        ),
        "{err}"
    );
}

#[test]
fn test_cancelled_build_leaves_no_index() {
    let temp = NamedTempFile::new().unwrap();
    common::write_file(
        temp.path(),
        CompressionKind::None,
        &two_part_lot(Version::V4, Endianness::Little),
    );

    let mut session = FileSession::open(temp.path()).unwrap();
    let cancel = AtomicBool::new(true);
    let err = session.build_offset_index_with(&cancel).unwrap_err();
    assert!(matches!(err, StreamError::Interrupted), "{err}");
    assert!(session.offset_index().is_none());
}

#[test]
fn test_conformance_gaps() {
    let version = Version::V4;
    let endian = Endianness::Little;
    let temp = NamedTempFile::new().unwrap();
    common::write_file(
        temp.path(),
        CompressionKind::None,
        &two_part_lot(version, endian),
    );

    let mut session = FileSession::open(temp.path()).unwrap();
    assert_eq!(session.conformance_gaps(&[]), None, "no index yet");

    session.build_offset_index().unwrap();
    let gaps = session.conformance_gaps(&[]).unwrap();
    let expected: Vec<&str> = vec!["HBR", "MIR", "PCR", "SBR", "TSR"];
    assert_eq!(gaps.iter().copied().collect::<Vec<_>>(), expected);

    // naming the 2007 extension adds its obligatory kinds
    let gaps = session.conformance_gaps(&["V4-2007"]).unwrap();
    assert!(gaps.contains("VUR"));
    assert!(!gaps.contains("PSR"), "PSR is optional under the extension");
}

#[test]
fn test_v3_lot_has_no_gaps() {
    let temp = NamedTempFile::new().unwrap();
    common::write_file(
        temp.path(),
        CompressionKind::None,
        &two_part_lot(Version::V3, Endianness::Little),
    );

    let mut session = FileSession::open(temp.path()).unwrap();
    session.build_offset_index().unwrap();
    assert!(session.conformance_gaps(&[]).unwrap().is_empty());
}
