//! File transport: compression envelopes, prologue sniffing and raw record
//! streaming.
//!
//! # Envelope rules
//! Whether a file is compressed is decided by content, never by file name.
//! The first bytes of the RAW file are matched against the magic numbers of
//! gzip, bzip2, xz and lzma-alone; no match means a plain record stream.
//! Compressed envelopes are decompressed fully into memory at open, so the
//! rest of the crate always works over one uniform seekable byte stream.
//!
//! A gzip envelope carries a CRC-32 and a length (mod 2^32) of the original
//! data in its trailer; both are verified against the decompressed bytes at
//! open, and a disagreement is a damaged envelope, not a record error.
//!
//! # Stream grammar
//! After the envelope, the stream is nothing but records back to back.  The
//! only clean end of stream is byte-for-byte exhaustion at a record
//! boundary.  Streaming reports any mid-record end, header or body, as a
//! truncated stream; the boundary walk instead calls leftover bytes too
//! short for a header trailing garbage.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::field::{CodecError, Endianness};
use crate::record::{RecordHeader, RecordInstance, HEADER_LEN};
use crate::schema::Version;

// ── Compression kinds ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    None,
    Gzip,
    Bzip2,
    Lzma,
    Xz,
}

impl CompressionKind {
    /// Matches the magic numbers at the start of the raw file.  Anything
    /// unrecognised is a plain stream; the prologue sniff decides whether it
    /// is a record stream at all.
    pub fn sniff(prefix: &[u8]) -> CompressionKind {
        if prefix.starts_with(&[0x1F, 0x8B]) {
            CompressionKind::Gzip
        } else if prefix.starts_with(b"BZh") {
            CompressionKind::Bzip2
        } else if prefix.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]) {
            CompressionKind::Xz
        } else if prefix.starts_with(&[0x5D, 0x00, 0x00]) {
            CompressionKind::Lzma
        } else {
            CompressionKind::None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionKind::None  => "none",
            CompressionKind::Gzip  => "gzip",
            CompressionKind::Bzip2 => "bzip2",
            CompressionKind::Lzma  => "lzma",
            CompressionKind::Xz    => "xz",
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum OpenError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("not an STDF file: {0}")]
    NotStdf(String),
    #[error("endianness marker {0} is neither 1 (big-endian) nor 2 (little-endian)")]
    UnknownEndianness(u8),
    #[error("version marker {0} is not a supported STDF version")]
    UnsupportedVersion(u8),
    #[error("damaged compression envelope: {0}")]
    Envelope(String),
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The stream ends inside a record: mid-header while streaming, or a
    /// header promising more bytes than the stream holds.
    #[error("stream truncated at offset {offset}: {needed} byte(s) missing")]
    TruncatedStream { offset: u64, needed: usize },
    /// Bytes after the last whole record are too few to form a header.
    /// Raised by the boundary walks; streaming reports truncation instead.
    #[error("{leftover} trailing byte(s) at offset {offset} cannot form a record")]
    TrailingGarbage { offset: u64, leftover: usize },
    /// A cooperative scan observed its cancellation flag.
    #[error("scan interrupted")]
    Interrupted,
    #[error(transparent)]
    Decode(#[from] CodecError),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("header record: {0}")]
    HeaderRecord(String),
    #[error("cannot mix {got} records into a {want} stream")]
    VersionMismatch { want: &'static str, got: &'static str },
    #[error("record byte order {got} does not match the stream's {want}")]
    EndianMismatch { want: &'static str, got: &'static str },
    #[error("{0} encoding is not supported")]
    UnsupportedCompression(&'static str),
}

// ── Byte sources ─────────────────────────────────────────────────────────────

/// Uniform seekable view over the decoded record stream: the file itself
/// when uncompressed, the decompressed buffer otherwise.
#[derive(Debug)]
pub(crate) enum ByteSource {
    Plain(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::Plain(f)  => f.read(buf),
            ByteSource::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ByteSource::Plain(f)  => f.seek(pos),
            ByteSource::Memory(c) => c.seek(pos),
        }
    }
}

pub(crate) fn read_at_most<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut got = 0;
    while got < buf.len() {
        match r.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(got)
}

// ── Envelope open ────────────────────────────────────────────────────────────

struct GzipTrailer {
    crc32:      u32,
    stored_len: u32,
}

pub(crate) struct Envelope {
    pub kind:       CompressionKind,
    pub source:     ByteSource,
    /// Length of the decoded record stream, for end-of-stream checks.
    pub stream_len: u64,
}

pub(crate) fn open_envelope(path: &Path) -> Result<Envelope, OpenError> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 6];
    let got = read_at_most(&mut file, &mut magic)?;
    let kind = CompressionKind::sniff(&magic[..got]);
    file.seek(SeekFrom::Start(0))?;

    match kind {
        CompressionKind::None => {
            let stream_len = file.metadata()?.len();
            Ok(Envelope {
                kind,
                source: ByteSource::Plain(BufReader::new(file)),
                stream_len,
            })
        }
        CompressionKind::Gzip => {
            let trailer = read_gzip_trailer(&mut file)?;
            let mut data = Vec::new();
            flate2::read::GzDecoder::new(file)
                .read_to_end(&mut data)
                .map_err(|e| OpenError::Envelope(format!("gzip: {e}")))?;
            if let Some(t) = trailer {
                let mut hasher = crc32fast::Hasher::new();
                hasher.update(&data);
                if hasher.finalize() != t.crc32 {
                    return Err(OpenError::Envelope("gzip trailer CRC mismatch".into()));
                }
                if data.len() as u32 != t.stored_len {
                    return Err(OpenError::Envelope(format!(
                        "gzip trailer declares {} byte(s), stream decodes to {}",
                        t.stored_len,
                        data.len()
                    )));
                }
            }
            Ok(memory_envelope(kind, data))
        }
        CompressionKind::Bzip2 => {
            let mut data = Vec::new();
            bzip2::read::BzDecoder::new(file)
                .read_to_end(&mut data)
                .map_err(|e| OpenError::Envelope(format!("bzip2: {e}")))?;
            Ok(memory_envelope(kind, data))
        }
        CompressionKind::Xz => {
            let mut reader = BufReader::new(file);
            let mut data = Vec::new();
            lzma_rs::xz_decompress(&mut reader, &mut data)
                .map_err(|e| OpenError::Envelope(format!("xz: {e}")))?;
            Ok(memory_envelope(kind, data))
        }
        CompressionKind::Lzma => {
            let mut reader = BufReader::new(file);
            let mut data = Vec::new();
            lzma_rs::lzma_decompress(&mut reader, &mut data)
                .map_err(|e| OpenError::Envelope(format!("lzma: {e}")))?;
            Ok(memory_envelope(kind, data))
        }
    }
}

fn memory_envelope(kind: CompressionKind, data: Vec<u8>) -> Envelope {
    Envelope {
        kind,
        stream_len: data.len() as u64,
        source: ByteSource::Memory(Cursor::new(data)),
    }
}

/// Last 8 raw bytes of a gzip member: CRC-32 then length mod 2^32, both
/// little-endian regardless of the record stream's byte order.  Absent on
/// files too short to hold header and trailer; the decoder will reject those
/// on its own.
fn read_gzip_trailer(file: &mut File) -> Result<Option<GzipTrailer>, OpenError> {
    let raw_len = file.metadata()?.len();
    if raw_len < 18 {
        return Ok(None);
    }
    file.seek(SeekFrom::End(-8))?;
    let mut t = [0u8; 8];
    file.read_exact(&mut t)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(Some(GzipTrailer {
        crc32:      u32::from_le_bytes([t[0], t[1], t[2], t[3]]),
        stored_len: u32::from_le_bytes([t[4], t[5], t[6], t[7]]),
    }))
}

// ── Prologue sniff ───────────────────────────────────────────────────────────

pub(crate) struct Prologue {
    pub endianness: Endianness,
    pub version:    Version,
}

/// Reads the first record's header and the two marker bytes behind it.  Both
/// supported versions put the endianness marker at stream offset 4 and the
/// version marker at offset 5, so the sniff never needs to know the version
/// in advance.  Leaves the source back at offset 0.
pub(crate) fn sniff_prologue(source: &mut ByteSource) -> Result<Prologue, OpenError> {
    source.seek(SeekFrom::Start(0))?;
    let mut first = [0u8; 6];
    if read_at_most(source, &mut first)? < first.len() {
        return Err(OpenError::NotStdf(
            "shorter than the first record's markers".into(),
        ));
    }
    source.seek(SeekFrom::Start(0))?;

    let pair = (first[2], first[3]);
    if !Version::ALL.iter().any(|v| v.header_record() == pair) {
        return Err(OpenError::NotStdf(format!(
            "first record kind ({}, {}) is no version's header record",
            pair.0, pair.1
        )));
    }
    let endianness =
        Endianness::from_marker(first[4]).ok_or(OpenError::UnknownEndianness(first[4]))?;
    let version = Version::from_marker(first[5]).ok_or(OpenError::UnsupportedVersion(first[5]))?;
    if pair != version.header_record() {
        return Err(OpenError::NotStdf(format!(
            "first record kind ({}, {}) does not open a {} file",
            pair.0,
            pair.1,
            version.name()
        )));
    }
    if endianness.read_u16(&first[0..2]) < 2 {
        return Err(OpenError::NotStdf(
            "first record too short to carry the format markers".into(),
        ));
    }
    Ok(Prologue { endianness, version })
}

// ── Raw record streaming ─────────────────────────────────────────────────────

/// One record as it sits on the wire: position, header, undecoded body.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub offset: u64,
    pub header: RecordHeader,
    pub body:   Vec<u8>,
}

/// Next record with its body, or `None` at a clean end of stream.  An end
/// inside the header is truncation, same as an end inside the body.
pub(crate) fn next_raw(
    source: &mut ByteSource,
    endian: Endianness,
) -> Result<Option<RawRecord>, StreamError> {
    let offset = source.stream_position()?;
    let mut head = [0u8; HEADER_LEN];
    let got = read_at_most(source, &mut head)?;
    if got == 0 {
        return Ok(None);
    }
    if got < HEADER_LEN {
        return Err(StreamError::TruncatedStream { offset, needed: HEADER_LEN - got });
    }
    let header = RecordHeader::parse(&head, endian)?;
    let mut body = vec![0u8; header.len as usize];
    let got = read_at_most(source, &mut body)?;
    if got < body.len() {
        return Err(StreamError::TruncatedStream {
            offset,
            needed: body.len() - got,
        });
    }
    Ok(Some(RawRecord { offset, header, body }))
}

/// Next record's header only, skipping the body.  `stream_len` bounds the
/// skip, since seeking past the end would not fail on its own.  Bytes too
/// short for a header are classified as trailing garbage here, where
/// streaming reports truncation.
pub(crate) fn next_header(
    source: &mut ByteSource,
    endian: Endianness,
    stream_len: u64,
) -> Result<Option<(u64, RecordHeader)>, StreamError> {
    let offset = source.stream_position()?;
    let mut head = [0u8; HEADER_LEN];
    let got = read_at_most(source, &mut head)?;
    if got == 0 {
        return Ok(None);
    }
    if got < HEADER_LEN {
        return Err(StreamError::TrailingGarbage { offset, leftover: got });
    }
    let header = RecordHeader::parse(&head, endian)?;
    let end = offset + (HEADER_LEN as u64) + header.len as u64;
    if end > stream_len {
        return Err(StreamError::TruncatedStream {
            offset,
            needed: (end - stream_len) as usize,
        });
    }
    source.seek(SeekFrom::Start(end))?;
    Ok(Some((offset, header)))
}

// ── Envelope write ───────────────────────────────────────────────────────────

pub(crate) fn write_envelope(
    path: &Path,
    kind: CompressionKind,
    data: &[u8],
) -> Result<(), WriteError> {
    // Decode-only backend: no xz encoder, so `path` must stay untouched.
    if kind == CompressionKind::Xz {
        return Err(WriteError::UnsupportedCompression("xz"));
    }
    let mut file = File::create(path)?;
    match kind {
        CompressionKind::None => {
            file.write_all(data)?;
        }
        CompressionKind::Gzip => {
            let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            enc.write_all(data)?;
            enc.finish()?;
        }
        CompressionKind::Bzip2 => {
            let mut enc = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
            enc.write_all(data)?;
            enc.finish()?;
        }
        CompressionKind::Lzma => {
            lzma_rs::lzma_compress(&mut Cursor::new(data), &mut file)?;
        }
        CompressionKind::Xz => unreachable!("rejected above"),
    }
    Ok(())
}

// ── Record writer ────────────────────────────────────────────────────────────

/// Encode-side counterpart of the open path: collects encoded records and
/// wraps them in the chosen envelope when finished.  Nothing reaches the
/// path until `finish`.
///
/// The first record written must be the version's header record, with
/// marker fields matching the writer's byte order and version.
pub struct StdfWriter {
    path:         PathBuf,
    version:      Version,
    endian:       Endianness,
    compression:  CompressionKind,
    buf:          Vec<u8>,
    wrote_header: bool,
}

impl StdfWriter {
    pub fn create<P: Into<PathBuf>>(
        path: P,
        version: Version,
        endian: Endianness,
        compression: CompressionKind,
    ) -> Result<Self, WriteError> {
        if compression == CompressionKind::Xz {
            return Err(WriteError::UnsupportedCompression("xz"));
        }
        Ok(StdfWriter {
            path: path.into(),
            version,
            endian,
            compression,
            buf: Vec::new(),
            wrote_header: false,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn endianness(&self) -> Endianness {
        self.endian
    }

    pub fn write_record(&mut self, rec: &RecordInstance) -> Result<(), WriteError> {
        if rec.version() != self.version {
            return Err(WriteError::VersionMismatch {
                want: self.version.name(),
                got:  rec.version().name(),
            });
        }
        if rec.endianness() != self.endian {
            return Err(WriteError::EndianMismatch {
                want: self.endian.name(),
                got:  rec.endianness().name(),
            });
        }
        if !self.wrote_header {
            self.check_header_record(rec)?;
        }
        let bytes = rec.encode()?;
        self.buf.extend_from_slice(&bytes);
        self.wrote_header = true;
        Ok(())
    }

    fn check_header_record(&self, rec: &RecordInstance) -> Result<(), WriteError> {
        let expect = self.version.header_record();
        if rec.type_pair() != expect {
            return Err(WriteError::HeaderRecord(format!(
                "a {} stream begins with ({}, {}), not {}",
                self.version.name(),
                expect.0,
                expect.1,
                rec.id()
            )));
        }
        let cpu = rec.get_u64("CPU_TYPE");
        if cpu != Some(self.endian.marker() as u64) {
            return Err(WriteError::HeaderRecord(format!(
                "CPU_TYPE {:?} does not declare {}",
                cpu,
                self.endian.name()
            )));
        }
        let ver = rec.get_u64("STDF_VER");
        if ver != Some(self.version.marker() as u64) {
            return Err(WriteError::HeaderRecord(format!(
                "STDF_VER {:?} does not declare {}",
                ver,
                self.version.name()
            )));
        }
        Ok(())
    }

    /// Wraps everything written in the envelope and puts it on disk.
    pub fn finish(self) -> Result<PathBuf, WriteError> {
        if !self.wrote_header {
            return Err(WriteError::HeaderRecord(
                "stream closed without its header record".into(),
            ));
        }
        write_envelope(&self.path, self.compression, &self.buf)?;
        Ok(self.path)
    }
}
