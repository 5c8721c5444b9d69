#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;

use stdfio::{CompressionKind, Endianness, FieldKind, RecordInstance, StdfWriter, Value, Version};

const TEXT_POOL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SIZED_WIDTH: u64 = 4;
const ARRAY_LEN: usize = 3;

pub fn make_text(len: usize) -> String {
    TEXT_POOL.iter().cycle().take(len).map(|&b| b as char).collect()
}

// Values in the canonical shapes decode produces, so decode(encode(x)) == x
// holds field for field.  Floats stay f32-exact, fixed strings fill their
// width, bit arrays for `B*f` fill all 8*width positions.
fn scalar_value(kind: FieldKind, i: usize) -> Value {
    match kind {
        FieldKind::UInt(_)      => Value::U((i as u64 * 7 + 1) & 0x7F),
        FieldKind::Int(_)       => Value::I(-((i as i64 % 100) + 1)),
        FieldKind::Real(4)      => Value::F(i as f64 * 0.5),
        FieldKind::Real(_)      => Value::F(i as f64 * 0.25 + 0.125),
        FieldKind::FixedStr(w)  => Value::Text(make_text(w as usize)),
        FieldKind::VarStr       => Value::Text(format!("F{i:02}")),
        FieldKind::LongStr      => Value::Text(format!("S{i:02}-{}", make_text(8))),
        FieldKind::FixedBits(w) => Value::Bits((0..w as usize * 8).map(|b| b % 3 == 0).collect()),
        FieldKind::VarBits      => Value::Bits((0..16).map(|b| b % 2 == 0).collect()),
        FieldKind::WideBits     => Value::Bits((0..11).map(|b| b % 4 == 0).collect()),
        FieldKind::Nibbles      => Value::Nibbles(vec![(i % 16) as u8]),
        FieldKind::Variant      => Value::Tagged(1, Box::new(Value::U(7))),
        FieldKind::SizedUInt(_) => Value::U(9),
        FieldKind::SizedStr(_)  => Value::Text(make_text(SIZED_WIDTH as usize)),
    }
}

fn array_value(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Nibbles => Value::Nibbles(vec![1, 2, 3]),
        FieldKind::Variant => Value::List(vec![
            Value::Tagged(1, Box::new(Value::U(7))),
            Value::Tagged(2, Box::new(Value::U(500))),
            Value::Tagged(10, Box::new(Value::Text("gd".into()))),
        ]),
        k => Value::List((1..=ARRAY_LEN).map(|j| scalar_value(k, j)).collect()),
    }
}

/// An instance of `id` with every field set to a value that survives an
/// encode/decode round trip unchanged.  Count fields get [`ARRAY_LEN`],
/// width fields get [`SIZED_WIDTH`], so references stay consistent.
pub fn filled_instance(version: Version, endian: Endianness, id: &str) -> RecordInstance {
    let mut rec = RecordInstance::new(version, endian, id).unwrap();
    let def = rec.def();
    let size_targets: HashSet<&str> =
        def.fields.iter().filter_map(|f| f.kind.size_ref()).collect();
    let count_targets: HashSet<&str> = def.fields.iter().filter_map(|f| f.count_ref).collect();
    for (i, f) in def.fields.iter().enumerate() {
        let value = if f.count_ref.is_some() {
            array_value(f.kind)
        } else if size_targets.contains(f.name) {
            Value::U(SIZED_WIDTH)
        } else if count_targets.contains(f.name) {
            Value::U(ARRAY_LEN as u64)
        } else {
            scalar_value(f.kind, i)
        };
        rec.set(f.name, value).unwrap();
    }
    rec
}

/// The record every stream must start with, markers matching `endian` and
/// `version`: a FAR for V4, a MIR for V3.
pub fn header_record(version: Version, endian: Endianness) -> RecordInstance {
    let id = match version {
        Version::V3 => "MIR",
        Version::V4 => "FAR",
    };
    let mut rec = RecordInstance::new(version, endian, id).unwrap();
    rec.set("CPU_TYPE", Value::U(endian.marker() as u64)).unwrap();
    rec.set("STDF_VER", Value::U(version.marker() as u64)).unwrap();
    rec
}

pub fn pir(version: Version, endian: Endianness, head: u64, site: u64) -> RecordInstance {
    let mut rec = RecordInstance::new(version, endian, "PIR").unwrap();
    rec.set("HEAD_NUM", Value::U(head)).unwrap();
    rec.set("SITE_NUM", Value::U(site)).unwrap();
    rec
}

pub fn ptr(
    version: Version,
    endian: Endianness,
    head: u64,
    site: u64,
    test_num: u64,
    result: f64,
    res_scal: i64,
    fail: bool,
) -> RecordInstance {
    let mut rec = RecordInstance::new(version, endian, "PTR").unwrap();
    rec.set("TEST_NUM", Value::U(test_num)).unwrap();
    rec.set("HEAD_NUM", Value::U(head)).unwrap();
    rec.set("SITE_NUM", Value::U(site)).unwrap();
    rec.set("TEST_FLG", Value::U(if fail { 0x80 } else { 0x00 })).unwrap();
    rec.set("RESULT", Value::F(result)).unwrap();
    rec.set("RES_SCAL", Value::I(res_scal)).unwrap();
    rec.set("TEST_TXT", Value::Text(format!("T{test_num}"))).unwrap();
    rec
}

pub fn ftr(
    version: Version,
    endian: Endianness,
    head: u64,
    site: u64,
    test_num: u64,
    fail: bool,
) -> RecordInstance {
    let mut rec = RecordInstance::new(version, endian, "FTR").unwrap();
    rec.set("TEST_NUM", Value::U(test_num)).unwrap();
    rec.set("HEAD_NUM", Value::U(head)).unwrap();
    rec.set("SITE_NUM", Value::U(site)).unwrap();
    rec.set("TEST_FLG", Value::U(if fail { 0x80 } else { 0x00 })).unwrap();
    rec.set("TEST_TXT", Value::Text(format!("V{test_num}"))).unwrap();
    rec
}

pub fn prr(
    version: Version,
    endian: Endianness,
    head: u64,
    site: u64,
    part_id: &str,
    hard_bin: u64,
    fail: bool,
) -> RecordInstance {
    let mut rec = RecordInstance::new(version, endian, "PRR").unwrap();
    rec.set("HEAD_NUM", Value::U(head)).unwrap();
    rec.set("SITE_NUM", Value::U(site)).unwrap();
    rec.set("PART_FLG", Value::U(if fail { 0x08 } else { 0x00 })).unwrap();
    rec.set("NUM_TEST", Value::U(2)).unwrap();
    rec.set("HARD_BIN", Value::U(hard_bin)).unwrap();
    rec.set("SOFT_BIN", Value::U(hard_bin)).unwrap();
    rec.set("X_COORD", Value::I(7)).unwrap();
    rec.set("Y_COORD", Value::I(-3)).unwrap();
    rec.set("PART_ID", Value::Text(part_id.into())).unwrap();
    if version == Version::V4 {
        rec.set("TEST_T", Value::U(1234)).unwrap();
    }
    rec
}

pub fn mrr(version: Version, endian: Endianness) -> RecordInstance {
    RecordInstance::new(version, endian, "MRR").unwrap()
}

/// Encoded concatenation, for tests that corrupt or splice streams by hand.
pub fn stream_bytes(records: &[RecordInstance]) -> Vec<u8> {
    let mut out = Vec::new();
    for rec in records {
        out.extend_from_slice(&rec.encode().unwrap());
    }
    out
}

/// A record of kind (200, 200), which no version's table knows.
pub fn unknown_record(endian: Endianness, body: &[u8]) -> Vec<u8> {
    let mut out = match endian {
        Endianness::Big    => (body.len() as u16).to_be_bytes().to_vec(),
        Endianness::Little => (body.len() as u16).to_le_bytes().to_vec(),
    };
    out.push(200);
    out.push(200);
    out.extend_from_slice(body);
    out
}

pub fn write_file(path: &Path, compression: CompressionKind, records: &[RecordInstance]) {
    let first = records.first().expect("at least the header record");
    let mut writer =
        StdfWriter::create(path, first.version(), first.endianness(), compression).unwrap();
    for rec in records {
        writer.write_record(rec).unwrap();
    }
    writer.finish().unwrap();
}
