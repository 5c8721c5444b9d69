use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stdfio::{
    decode_record, CompressionKind, Endianness, FileSession, RecordInstance, StdfWriter, Value,
    Version,
};

fn sample_ptr() -> RecordInstance {
    let mut rec = RecordInstance::new(Version::V4, Endianness::Little, "PTR").unwrap();
    rec.set("TEST_NUM", Value::U(1001)).unwrap();
    rec.set("HEAD_NUM", Value::U(1)).unwrap();
    rec.set("SITE_NUM", Value::U(3)).unwrap();
    rec.set("TEST_FLG", Value::U(0)).unwrap();
    rec.set("RESULT", Value::F(0.7265625)).unwrap();
    rec.set("TEST_TXT", Value::Text("vdd_leakage".into())).unwrap();
    rec.set("RES_SCAL", Value::I(-3)).unwrap();
    rec.set("UNITS", Value::Text("A".into())).unwrap();
    rec.set("LO_LIMIT", Value::F(0.5)).unwrap();
    rec.set("HI_LIMIT", Value::F(1.5)).unwrap();
    rec
}

fn lot_file(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("bench.stdf");
    let mut writer =
        StdfWriter::create(&path, Version::V4, Endianness::Little, CompressionKind::None).unwrap();
    let mut far = RecordInstance::new(Version::V4, Endianness::Little, "FAR").unwrap();
    far.set("CPU_TYPE", Value::U(2)).unwrap();
    far.set("STDF_VER", Value::U(4)).unwrap();
    writer.write_record(&far).unwrap();
    let ptr = sample_ptr();
    for _ in 0..1000 {
        writer.write_record(&ptr).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn bench_record_codec(c: &mut Criterion) {
    let rec = sample_ptr();
    let bytes = rec.encode().unwrap();

    c.bench_function("encode_ptr", |b| b.iter(|| black_box(&rec).encode().unwrap()));
    c.bench_function("decode_ptr", |b| {
        b.iter(|| decode_record(Version::V4, Endianness::Little, black_box(&bytes)).unwrap())
    });
}

fn bench_file_walks(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = lot_file(dir.path());

    let mut session = FileSession::open(&path).unwrap();
    c.bench_function("index_1k_records", |b| {
        b.iter(|| {
            session.build_offset_index().unwrap();
        })
    });

    c.bench_function("open_and_decode_1k_records", |b| {
        b.iter(|| {
            let mut session = FileSession::open(&path).unwrap();
            let mut ok = 0usize;
            for rec in session.records() {
                ok += usize::from(rec.is_ok());
            }
            black_box(ok)
        })
    });
}

criterion_group!(benches, bench_record_codec, bench_file_walks);
criterion_main!(benches);
