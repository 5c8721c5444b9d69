//! Field-level wire codec: the closed alphabet of STDF field encodings.
//!
//! # Alphabet rules
//! Every field in every record is encoded with one of the kinds below.  The
//! set is CLOSED: record tables may only reference these kinds, and a decoder
//! meeting a kind it cannot handle must fail with `UnsupportedEncoding`,
//! never skip bytes silently.
//!
//! # Endianness
//! Scalar integers and reals honour the file's byte order, chosen once per
//! file by the endianness marker.  Length prefixes (the 1-byte count of
//! `C*n`, the 2-byte counts of `S*n`/`D*n`) are scalars and follow the same
//! byte order.  Bit arrays and nibble packing are byte-order independent.
//!
//! # Bit order
//! Bit arrays (`B*f`, `B*n`, `D*n`) present the most significant bit of each
//! byte first, so bit 7 of a flag byte is element 0 of the decoded sequence.
//! Nibble arrays (`N*1`) fill the low nibble of each byte first.

use std::fmt;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

// ── Endianness ───────────────────────────────────────────────────────────────

/// File-wide byte order, fixed by the marker byte in the first record.
/// Marker 1 is big-endian, marker 2 is little-endian; anything else is
/// unusable and rejected at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            1 => Some(Endianness::Big),
            2 => Some(Endianness::Little),
            _ => None,
        }
    }

    #[inline]
    pub fn marker(self) -> u8 {
        match self {
            Endianness::Big    => 1,
            Endianness::Little => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Endianness::Big    => "big-endian",
            Endianness::Little => "little-endian",
        }
    }

    #[inline]
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endianness::Big    => BigEndian::read_u16(buf),
            Endianness::Little => LittleEndian::read_u16(buf),
        }
    }

    #[inline]
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endianness::Big    => BigEndian::read_u32(buf),
            Endianness::Little => LittleEndian::read_u32(buf),
        }
    }

    #[inline]
    pub fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            Endianness::Big    => BigEndian::read_u64(buf),
            Endianness::Little => LittleEndian::read_u64(buf),
        }
    }

    #[inline]
    pub fn read_f32(self, buf: &[u8]) -> f32 {
        match self {
            Endianness::Big    => BigEndian::read_f32(buf),
            Endianness::Little => LittleEndian::read_f32(buf),
        }
    }

    #[inline]
    pub fn read_f64(self, buf: &[u8]) -> f64 {
        match self {
            Endianness::Big    => BigEndian::read_f64(buf),
            Endianness::Little => LittleEndian::read_f64(buf),
        }
    }

    #[inline]
    pub fn write_u16(self, out: &mut Vec<u8>, v: u16) {
        let mut b = [0u8; 2];
        match self {
            Endianness::Big    => BigEndian::write_u16(&mut b, v),
            Endianness::Little => LittleEndian::write_u16(&mut b, v),
        }
        out.extend_from_slice(&b);
    }

    #[inline]
    pub fn write_u32(self, out: &mut Vec<u8>, v: u32) {
        let mut b = [0u8; 4];
        match self {
            Endianness::Big    => BigEndian::write_u32(&mut b, v),
            Endianness::Little => LittleEndian::write_u32(&mut b, v),
        }
        out.extend_from_slice(&b);
    }

    #[inline]
    pub fn write_u64(self, out: &mut Vec<u8>, v: u64) {
        let mut b = [0u8; 8];
        match self {
            Endianness::Big    => BigEndian::write_u64(&mut b, v),
            Endianness::Little => LittleEndian::write_u64(&mut b, v),
        }
        out.extend_from_slice(&b);
    }

    #[inline]
    pub fn write_f32(self, out: &mut Vec<u8>, v: f32) {
        let mut b = [0u8; 4];
        match self {
            Endianness::Big    => BigEndian::write_f32(&mut b, v),
            Endianness::Little => LittleEndian::write_f32(&mut b, v),
        }
        out.extend_from_slice(&b);
    }

    #[inline]
    pub fn write_f64(self, out: &mut Vec<u8>, v: f64) {
        let mut b = [0u8; 8];
        match self {
            Endianness::Big    => BigEndian::write_f64(&mut b, v),
            Endianness::Little => LittleEndian::write_f64(&mut b, v),
        }
        out.extend_from_slice(&b);
    }
}

// ── Field kinds ──────────────────────────────────────────────────────────────

/// Wire encoding of a single field.  Widths are in bytes.
///
/// `SizedUInt` and `SizedStr` take their width from the decoded value of an
/// earlier field in the same record; the record codec resolves them to
/// `UInt`/`FixedStr` before the field codec ever sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `U*1`/`U*2`/`U*4`/`U*8` — unsigned integer of the given width.
    UInt(u8),
    /// `I*1`/`I*2`/`I*4`/`I*8` — two's-complement signed integer.
    Int(u8),
    /// `R*4`/`R*8` — IEEE 754 float of the given width.
    Real(u8),
    /// `C*f` — fixed-width string, blank-padded, no length prefix.
    FixedStr(u8),
    /// `C*n` — string with a 1-byte length prefix.
    VarStr,
    /// `S*n` — string with a 2-byte length prefix (V4-2007).
    LongStr,
    /// `B*f` — fixed bit array of `8 * width` bits, no length prefix.
    FixedBits(u8),
    /// `B*n` — bit array with a 1-byte prefix counting payload BYTES.
    VarBits,
    /// `D*n` — bit array with a 2-byte prefix counting payload BITS.
    WideBits,
    /// `N*1` — 4-bit unsigned nibble; arrays pack two per byte.
    Nibbles,
    /// `V*n` — self-describing value: a 1-byte type code, then the payload.
    Variant,
    /// `U*f` — unsigned integer whose byte width is the value of the named
    /// earlier field (must resolve to 1, 2, 4 or 8).
    SizedUInt(&'static str),
    /// `C*f` with a field-supplied width: fixed string whose width is the
    /// value of the named earlier field.
    SizedStr(&'static str),
}

impl FieldKind {
    /// Field the width is borrowed from, for the two field-sized kinds.
    pub fn size_ref(self) -> Option<&'static str> {
        match self {
            FieldKind::SizedUInt(f) | FieldKind::SizedStr(f) => Some(f),
            _ => None,
        }
    }
}

// ── Type codes for V*n payloads ──────────────────────────────────────────────
//
// These codes are on-disk values and are permanent.  Code 0 is a pad byte
// with no payload; code 9 was never assigned.  An unassigned code in the
// input is an UnsupportedEncoding error, never a skip.

pub const VARIANT_PAD: u8 = 0;

pub(crate) fn variant_kind(code: u8) -> Option<FieldKind> {
    match code {
        1  => Some(FieldKind::UInt(1)),
        2  => Some(FieldKind::UInt(2)),
        3  => Some(FieldKind::UInt(4)),
        4  => Some(FieldKind::Int(1)),
        5  => Some(FieldKind::Int(2)),
        6  => Some(FieldKind::Int(4)),
        7  => Some(FieldKind::Real(4)),
        8  => Some(FieldKind::Real(8)),
        10 => Some(FieldKind::VarStr),
        11 => Some(FieldKind::VarBits),
        12 => Some(FieldKind::WideBits),
        13 => Some(FieldKind::Nibbles),
        _  => None,
    }
}

// ── Values ───────────────────────────────────────────────────────────────────

/// Decoded field value.
///
/// Integers widen losslessly to 64 bits; `R*4` widens to `f64` and narrows
/// back on encode.  Bit sequences are most-significant-bit first.  Arrays
/// decode to `List` except nibble arrays, which stay packed-order in
/// `Nibbles`.  `Tagged` is a `V*n` payload carrying its on-disk type code;
/// pad entries are `Tagged(0, _)` and re-encode as the bare code byte.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U(u64),
    I(i64),
    F(f64),
    Text(String),
    Bits(Vec<bool>),
    Nibbles(Vec<u8>),
    List(Vec<Value>),
    Tagged(u8, Box<Value>),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I(v) => Some(v),
            Value::U(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F(v) => Some(v),
            Value::U(v) => Some(v as f64),
            Value::I(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bits(&self) -> Option<&[bool]> {
        match self {
            Value::Bits(bits) => Some(bits),
            _ => None,
        }
    }

    pub fn as_nibbles(&self) -> Option<&[u8]> {
        match self {
            Value::Nibbles(nibbles) => Some(nibbles),
            _ => None,
        }
    }

    /// Reads numbered flag bit `n` (0 = least significant) from a flag byte,
    /// whether it decoded to a bit sequence or was substituted as a packed
    /// integer missing value.  `None` if the bit is not available.
    pub fn flag(&self, n: u8) -> Option<bool> {
        match self {
            Value::Bits(bits) if (n as usize) < bits.len() => {
                Some(bits[bits.len() - 1 - n as usize])
            }
            Value::U(v) if n < 64 => Some(v >> n & 1 == 1),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U(v)    => write!(f, "{v}"),
            Value::I(v)    => write!(f, "{v}"),
            Value::F(v)    => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bits(bits) => {
                write!(f, "0x{}/{}", hex::encode(bytes_from_bits(bits)), bits.len())
            }
            Value::Nibbles(nibbles) => {
                write!(f, "0x{}/{}", hex::encode(bytes_from_nibbles_lossy(nibbles)), nibbles.len())
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Tagged(code, inner) => write!(f, "<{code}>{inner}"),
        }
    }
}

fn bytes_from_nibbles_lossy(nibbles: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; nibbles.len().div_ceil(2)];
    for (i, &n) in nibbles.iter().enumerate() {
        if i % 2 == 0 {
            bytes[i / 2] |= n & 0x0F;
        } else {
            bytes[i / 2] |= (n & 0x0F) << 4;
        }
    }
    bytes
}

// ── Missing values ───────────────────────────────────────────────────────────

/// Substitute for a field the record body ends before.
///
/// `Default` is the kind-shaped neutral value (zero, blanks, empty).  The
/// numeric variants carry the format's designated invalid markers (65535 for
/// an absent soft bin, -32768 for an absent coordinate, and so on) and
/// materialise as plain integers even for flag-byte fields, so `Value::flag`
/// keeps working on substituted data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingValue {
    Default,
    U(u64),
    I(i64),
}

impl MissingValue {
    pub fn materialize(self, kind: FieldKind, is_array: bool) -> Value {
        if is_array {
            return match kind {
                FieldKind::Nibbles => Value::Nibbles(Vec::new()),
                _ => Value::List(Vec::new()),
            };
        }
        match self {
            MissingValue::U(v) => Value::U(v),
            MissingValue::I(v) => Value::I(v),
            MissingValue::Default => match kind {
                FieldKind::UInt(_) | FieldKind::SizedUInt(_) => Value::U(0),
                FieldKind::Int(_)       => Value::I(0),
                FieldKind::Real(_)      => Value::F(0.0),
                FieldKind::FixedStr(n)  => Value::Text(" ".repeat(n as usize)),
                FieldKind::SizedStr(_)  => Value::Text(String::new()),
                FieldKind::VarStr | FieldKind::LongStr => Value::Text(String::new()),
                FieldKind::FixedBits(_) | FieldKind::VarBits | FieldKind::WideBits => {
                    Value::Bits(Vec::new())
                }
                FieldKind::Nibbles => Value::Nibbles(Vec::new()),
                FieldKind::Variant => Value::Tagged(VARIANT_PAD, Box::new(Value::U(0))),
            },
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    /// The record body ran out before the schema was satisfied.  Only raised
    /// when the body is partially there: a field starting exactly at the end
    /// of the body takes its missing value instead.
    #[error("record body ends early: {needed} byte(s) needed, {available} available")]
    TruncatedRecord { needed: usize, available: usize },
    #[error("value out of range: {0}")]
    ValueOutOfRange(String),
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("schema violation: {0}")]
    SchemaViolation(String),
    /// Encoded body length disagrees with what a re-decode of the same body
    /// consumes.  Raised at encode time, before anything reaches a stream.
    #[error("encoded length mismatch: body is {declared} byte(s), fields span {measured}")]
    RecordLengthMismatch { declared: usize, measured: usize },
    /// `(REC_TYP, REC_SUB)` absent from the registry for this version.  The
    /// raw body travels with the error so callers can skip or archive it.
    #[error("unknown record kind ({rec_typ}, {rec_sub})")]
    UnknownRecordKind { rec_typ: u8, rec_sub: u8, bytes: Vec<u8> },
}

impl CodecError {
    /// Prefix range/encoding errors with the field they concern.  Structural
    /// errors pass through untouched.
    pub(crate) fn in_field(self, name: &str) -> CodecError {
        match self {
            CodecError::ValueOutOfRange(msg) => {
                CodecError::ValueOutOfRange(format!("{name}: {msg}"))
            }
            CodecError::UnsupportedEncoding(msg) => {
                CodecError::UnsupportedEncoding(format!("{name}: {msg}"))
            }
            other => other,
        }
    }
}

// ── Byte cursor / sink ───────────────────────────────────────────────────────

/// Forward-only cursor over a record body.
pub struct ByteReader<'a> {
    buf:    &'a [u8],
    pos:    usize,
    endian: Endianness,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], endian: Endianness) -> Self {
        ByteReader { buf, pos: 0, endian }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::TruncatedRecord {
                needed:    n,
                available: self.remaining(),
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        let e = self.endian;
        Ok(e.read_u16(self.take(2)?))
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        let e = self.endian;
        Ok(e.read_u32(self.take(4)?))
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        let e = self.endian;
        Ok(e.read_u64(self.take(8)?))
    }

    pub fn f32(&mut self) -> Result<f32, CodecError> {
        let e = self.endian;
        Ok(e.read_f32(self.take(4)?))
    }

    pub fn f64(&mut self) -> Result<f64, CodecError> {
        let e = self.endian;
        Ok(e.read_f64(self.take(8)?))
    }
}

/// Append-only sink for a record body.
pub struct ByteWriter {
    buf:    Vec<u8>,
    endian: Endianness,
}

impl ByteWriter {
    pub fn new(endian: Endianness) -> Self {
        ByteWriter { buf: Vec::new(), endian }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.endian.write_u16(&mut self.buf, v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.endian.write_u32(&mut self.buf, v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.endian.write_u64(&mut self.buf, v);
    }

    pub fn put_f32(&mut self, v: f32) {
        self.endian.write_f32(&mut self.buf, v);
    }

    pub fn put_f64(&mut self, v: f64) {
        self.endian.write_f64(&mut self.buf, v);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

// ── Bit and nibble packing ───────────────────────────────────────────────────

pub(crate) fn bits_from_bytes(bytes: &[u8], nbits: usize) -> Vec<bool> {
    let mut bits = Vec::with_capacity(nbits);
    for i in 0..nbits {
        let byte = bytes[i / 8];
        bits.push(byte & (0x80 >> (i % 8)) != 0);
    }
    bits
}

pub(crate) fn bytes_from_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 0x80 >> (i % 8);
        }
    }
    bytes
}

fn bits_from_uint(v: u64, width: u8) -> Vec<bool> {
    let nbits = width as usize * 8;
    let mut bits = Vec::with_capacity(nbits);
    for i in (0..nbits).rev() {
        bits.push(v >> i & 1 == 1);
    }
    bits
}

pub(crate) fn nibbles_from_bytes(bytes: &[u8], count: usize) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(count);
    for i in 0..count {
        let byte = bytes[i / 2];
        nibbles.push(if i % 2 == 0 { byte & 0x0F } else { byte >> 4 });
    }
    nibbles
}

pub(crate) fn bytes_from_nibbles(nibbles: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut bytes = vec![0u8; nibbles.len().div_ceil(2)];
    for (i, &n) in nibbles.iter().enumerate() {
        if n > 0x0F {
            return Err(CodecError::ValueOutOfRange(format!(
                "nibble value {n} exceeds 15"
            )));
        }
        if i % 2 == 0 {
            bytes[i / 2] |= n;
        } else {
            bytes[i / 2] |= n << 4;
        }
    }
    Ok(bytes)
}

// ── Scalar decode ────────────────────────────────────────────────────────────

/// Decodes one value of a fully resolved kind.  The cursor must not be empty
/// for length-prefixed kinds; callers handle missing-tail substitution before
/// getting here.
pub fn decode_value(kind: FieldKind, r: &mut ByteReader<'_>) -> Result<Value, CodecError> {
    match kind {
        FieldKind::UInt(1) => Ok(Value::U(r.u8()? as u64)),
        FieldKind::UInt(2) => Ok(Value::U(r.u16()? as u64)),
        FieldKind::UInt(4) => Ok(Value::U(r.u32()? as u64)),
        FieldKind::UInt(8) => Ok(Value::U(r.u64()?)),
        FieldKind::Int(1)  => Ok(Value::I(r.u8()? as i8 as i64)),
        FieldKind::Int(2)  => Ok(Value::I(r.u16()? as i16 as i64)),
        FieldKind::Int(4)  => Ok(Value::I(r.u32()? as i32 as i64)),
        FieldKind::Int(8)  => Ok(Value::I(r.u64()? as i64)),
        FieldKind::Real(4) => Ok(Value::F(r.f32()? as f64)),
        FieldKind::Real(8) => Ok(Value::F(r.f64()?)),
        FieldKind::UInt(w) | FieldKind::Int(w) | FieldKind::Real(w) => Err(
            CodecError::UnsupportedEncoding(format!("scalar width {w} is not in the format")),
        ),
        FieldKind::FixedStr(width) => {
            let raw = r.take(width as usize)?;
            Ok(Value::Text(String::from_utf8_lossy(raw).into_owned()))
        }
        FieldKind::VarStr => {
            let len = r.u8()? as usize;
            let raw = r.take(len)?;
            Ok(Value::Text(String::from_utf8_lossy(raw).into_owned()))
        }
        FieldKind::LongStr => {
            let len = r.u16()? as usize;
            let raw = r.take(len)?;
            Ok(Value::Text(String::from_utf8_lossy(raw).into_owned()))
        }
        FieldKind::FixedBits(width) => {
            let raw = r.take(width as usize)?;
            Ok(Value::Bits(bits_from_bytes(raw, width as usize * 8)))
        }
        FieldKind::VarBits => {
            let nbytes = r.u8()? as usize;
            let raw = r.take(nbytes)?;
            Ok(Value::Bits(bits_from_bytes(raw, nbytes * 8)))
        }
        FieldKind::WideBits => {
            let nbits = r.u16()? as usize;
            let raw = r.take(nbits.div_ceil(8))?;
            Ok(Value::Bits(bits_from_bytes(raw, nbits)))
        }
        FieldKind::Nibbles => {
            let raw = r.take(1)?;
            Ok(Value::Nibbles(vec![raw[0] & 0x0F]))
        }
        FieldKind::Variant => {
            let code = r.u8()?;
            if code == VARIANT_PAD {
                return Ok(Value::Tagged(VARIANT_PAD, Box::new(Value::U(0))));
            }
            let inner_kind = variant_kind(code).ok_or_else(|| {
                CodecError::UnsupportedEncoding(format!("self-describing type code {code}"))
            })?;
            let inner = decode_value(inner_kind, r)?;
            Ok(Value::Tagged(code, Box::new(inner)))
        }
        FieldKind::SizedUInt(f) | FieldKind::SizedStr(f) => Err(CodecError::SchemaViolation(
            format!("field-sized kind not resolved (width field {f})"),
        )),
    }
}

// ── Scalar encode ────────────────────────────────────────────────────────────

fn uint_max(width: u8) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (width * 8)) - 1
    }
}

/// Encodes one value of a fully resolved kind.  Bit-array kinds accept a
/// packed integer in place of an explicit bit sequence; both spellings yield
/// identical bytes.
pub fn encode_value(kind: FieldKind, value: &Value, w: &mut ByteWriter) -> Result<(), CodecError> {
    match (kind, value) {
        (FieldKind::UInt(width @ (1 | 2 | 4 | 8)), Value::U(v)) => {
            if *v > uint_max(width) {
                return Err(CodecError::ValueOutOfRange(format!(
                    "{v} exceeds {width}-byte unsigned range"
                )));
            }
            match width {
                1 => w.put_u8(*v as u8),
                2 => w.put_u16(*v as u16),
                4 => w.put_u32(*v as u32),
                _ => w.put_u64(*v),
            }
            Ok(())
        }
        (FieldKind::Int(width @ (1 | 2 | 4 | 8)), Value::I(v)) => {
            let bits = width as u32 * 8;
            let lo = if width >= 8 { i64::MIN } else { -(1i64 << (bits - 1)) };
            let hi = if width >= 8 { i64::MAX } else { (1i64 << (bits - 1)) - 1 };
            if *v < lo || *v > hi {
                return Err(CodecError::ValueOutOfRange(format!(
                    "{v} exceeds {width}-byte signed range"
                )));
            }
            match width {
                1 => w.put_u8(*v as i8 as u8),
                2 => w.put_u16(*v as i16 as u16),
                4 => w.put_u32(*v as i32 as u32),
                _ => w.put_u64(*v as u64),
            }
            Ok(())
        }
        (FieldKind::Real(4), Value::F(v)) => {
            w.put_f32(*v as f32);
            Ok(())
        }
        (FieldKind::Real(8), Value::F(v)) => {
            w.put_f64(*v);
            Ok(())
        }
        (FieldKind::FixedStr(width), Value::Text(s)) => {
            let width = width as usize;
            let raw = s.as_bytes();
            if raw.len() >= width {
                w.put_bytes(&raw[..width]);
            } else {
                w.put_bytes(raw);
                w.put_bytes(&b" ".repeat(width - raw.len()));
            }
            Ok(())
        }
        (FieldKind::VarStr, Value::Text(s)) => {
            let raw = s.as_bytes();
            if raw.len() > u8::MAX as usize {
                return Err(CodecError::ValueOutOfRange(format!(
                    "string of {} byte(s) exceeds the 1-byte length prefix",
                    raw.len()
                )));
            }
            w.put_u8(raw.len() as u8);
            w.put_bytes(raw);
            Ok(())
        }
        (FieldKind::LongStr, Value::Text(s)) => {
            let raw = s.as_bytes();
            if raw.len() > u16::MAX as usize {
                return Err(CodecError::ValueOutOfRange(format!(
                    "string of {} byte(s) exceeds the 2-byte length prefix",
                    raw.len()
                )));
            }
            w.put_u16(raw.len() as u16);
            w.put_bytes(raw);
            Ok(())
        }
        (FieldKind::FixedBits(width), Value::Bits(bits)) => {
            let nbits = width as usize * 8;
            if bits.len() > nbits {
                return Err(CodecError::ValueOutOfRange(format!(
                    "{} bit(s) exceed the {nbits}-bit field",
                    bits.len()
                )));
            }
            let mut packed = bytes_from_bits(bits);
            packed.resize(width as usize, 0);
            w.put_bytes(&packed);
            Ok(())
        }
        (FieldKind::FixedBits(width), Value::U(v)) => {
            if width > 8 || *v > uint_max(width) {
                return Err(CodecError::ValueOutOfRange(format!(
                    "{v} exceeds the {width}-byte bit field"
                )));
            }
            w.put_bytes(&bytes_from_bits(&bits_from_uint(*v, width)));
            Ok(())
        }
        (FieldKind::VarBits, Value::Bits(bits)) => {
            let packed = bytes_from_bits(bits);
            if packed.len() > u8::MAX as usize {
                return Err(CodecError::ValueOutOfRange(format!(
                    "{} bit(s) exceed the 1-byte length prefix",
                    bits.len()
                )));
            }
            w.put_u8(packed.len() as u8);
            w.put_bytes(&packed);
            Ok(())
        }
        (FieldKind::VarBits, Value::U(v)) => {
            let width = ((64 - v.leading_zeros()).div_ceil(8)).max(1) as u8;
            w.put_u8(width);
            w.put_bytes(&bytes_from_bits(&bits_from_uint(*v, width)));
            Ok(())
        }
        (FieldKind::WideBits, Value::Bits(bits)) => {
            if bits.len() > u16::MAX as usize {
                return Err(CodecError::ValueOutOfRange(format!(
                    "{} bit(s) exceed the 2-byte bit count",
                    bits.len()
                )));
            }
            w.put_u16(bits.len() as u16);
            w.put_bytes(&bytes_from_bits(bits));
            Ok(())
        }
        (FieldKind::WideBits, Value::U(v)) => {
            let width = ((64 - v.leading_zeros()).div_ceil(8)).max(1) as u8;
            w.put_u16(width as u16 * 8);
            w.put_bytes(&bytes_from_bits(&bits_from_uint(*v, width)));
            Ok(())
        }
        (FieldKind::Nibbles, Value::Nibbles(nibbles)) => {
            if nibbles.len() != 1 {
                return Err(CodecError::ValueOutOfRange(format!(
                    "scalar nibble field holds exactly one nibble, got {}",
                    nibbles.len()
                )));
            }
            w.put_bytes(&bytes_from_nibbles(nibbles)?);
            Ok(())
        }
        (FieldKind::Nibbles, Value::U(v)) => {
            w.put_bytes(&bytes_from_nibbles(&[u8::try_from(*v).map_err(|_| {
                CodecError::ValueOutOfRange(format!("{v} exceeds nibble range"))
            })?])?);
            Ok(())
        }
        (FieldKind::Variant, Value::Tagged(code, inner)) => {
            w.put_u8(*code);
            if *code == VARIANT_PAD {
                return Ok(());
            }
            let inner_kind = variant_kind(*code).ok_or_else(|| {
                CodecError::UnsupportedEncoding(format!("self-describing type code {code}"))
            })?;
            encode_value(inner_kind, inner, w)
        }
        (FieldKind::SizedUInt(f) | FieldKind::SizedStr(f), _) => Err(
            CodecError::SchemaViolation(format!("field-sized kind not resolved (width field {f})")),
        ),
        (kind, value) => Err(CodecError::ValueOutOfRange(format!(
            "value {value:?} does not fit field kind {kind:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_order_is_msb_first() {
        let bits = bits_from_bytes(&[0x80, 0x01], 16);
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[15]);
        assert_eq!(bytes_from_bits(&bits), [0x80, 0x01]);
    }

    #[test]
    fn partial_byte_rounds_up() {
        let bits = vec![true, false, true];
        assert_eq!(bytes_from_bits(&bits), [0b1010_0000]);
        assert_eq!(bits_from_bytes(&[0b1010_0000], 3), bits);
    }

    #[test]
    fn nibble_pairs_pack_low_first() {
        assert_eq!(bytes_from_nibbles(&[1, 2, 3]).unwrap(), [0x21, 0x03]);
        assert_eq!(nibbles_from_bytes(&[0x21, 0x03], 3), [1, 2, 3]);
    }

    #[test]
    fn nibble_range_checked() {
        assert!(bytes_from_nibbles(&[16]).is_err());
    }

    #[test]
    fn flag_counts_from_the_lsb() {
        assert_eq!(Value::U(0b1000_0001).flag(0), Some(true));
        assert_eq!(Value::U(0b1000_0001).flag(1), Some(false));
        assert_eq!(Value::U(0b1000_0001).flag(7), Some(true));

        let bits = Value::Bits(bits_from_bytes(&[0b1000_0001], 8));
        assert_eq!(bits.flag(0), Some(true));
        assert_eq!(bits.flag(1), Some(false));
        assert_eq!(bits.flag(7), Some(true));
        assert_eq!(bits.flag(8), None);
    }

    #[test]
    fn scalar_byte_orders() {
        let mut w = ByteWriter::new(Endianness::Big);
        assert!(w.is_empty());
        w.put_u16(0x1234);
        assert_eq!(w.len(), 2);
        assert_eq!(w.into_vec(), [0x12, 0x34]);

        let mut w = ByteWriter::new(Endianness::Little);
        w.put_u16(0x1234);
        assert_eq!(w.into_vec(), [0x34, 0x12]);

        let mut r = ByteReader::new(&[0x34, 0x12], Endianness::Little);
        assert_eq!(r.u16().unwrap(), 0x1234);
    }

    #[test]
    fn wide_bits_prefix_counts_bits_not_bytes() {
        let bits: Vec<bool> = (0..11).map(|i| i % 4 == 0).collect();
        let mut w = ByteWriter::new(Endianness::Little);
        encode_value(FieldKind::WideBits, &Value::Bits(bits.clone()), &mut w).unwrap();
        let bytes = w.into_vec();
        assert_eq!(&bytes[..2], [0x0B, 0x00], "11 bits, little-endian prefix");
        assert_eq!(bytes.len(), 2 + 2, "payload rounds up to whole bytes");

        let mut r = ByteReader::new(&bytes, Endianness::Little);
        assert_eq!(decode_value(FieldKind::WideBits, &mut r).unwrap(), Value::Bits(bits));
    }

    #[test]
    fn var_bits_prefix_counts_bytes() {
        let mut w = ByteWriter::new(Endianness::Little);
        encode_value(FieldKind::VarBits, &Value::U(0x0180), &mut w).unwrap();
        assert_eq!(w.into_vec(), [2, 0x01, 0x80]);
    }

    #[test]
    fn packed_integer_and_bit_sequence_encode_identically() {
        let bits = vec![true, false, true, true, false, false, false, false];
        for kind in [FieldKind::FixedBits(1), FieldKind::VarBits, FieldKind::WideBits] {
            let mut from_bits = ByteWriter::new(Endianness::Little);
            encode_value(kind, &Value::Bits(bits.clone()), &mut from_bits).unwrap();
            let mut from_int = ByteWriter::new(Endianness::Little);
            encode_value(kind, &Value::U(0b1011_0000), &mut from_int).unwrap();
            assert_eq!(from_bits.into_vec(), from_int.into_vec(), "{kind:?}");
        }
    }

    #[test]
    fn flag_byte_from_integer_decodes_msb_first() {
        let mut w = ByteWriter::new(Endianness::Little);
        encode_value(FieldKind::FixedBits(1), &Value::U(0b1011_0000), &mut w).unwrap();
        let bytes = w.into_vec();
        assert_eq!(bytes, [0b1011_0000]);

        let mut r = ByteReader::new(&bytes, Endianness::Little);
        let decoded = decode_value(FieldKind::FixedBits(1), &mut r).unwrap();
        assert_eq!(
            decoded,
            Value::Bits(vec![true, false, true, true, false, false, false, false])
        );
    }

    #[test]
    fn variant_pad_is_a_bare_code_byte() {
        let mut w = ByteWriter::new(Endianness::Little);
        let pad = Value::Tagged(VARIANT_PAD, Box::new(Value::U(0)));
        encode_value(FieldKind::Variant, &pad, &mut w).unwrap();
        assert_eq!(w.into_vec(), [0]);

        let mut r = ByteReader::new(&[0], Endianness::Little);
        assert_eq!(decode_value(FieldKind::Variant, &mut r).unwrap(), pad);
    }
}
