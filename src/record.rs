//! Record codec: the 4-byte header plus schema-driven field bodies.
//!
//! # Header
//! Every record starts `REC_LEN (U*2) | REC_TYP (U*1) | REC_SUB (U*1)`.
//! `REC_LEN` counts body bytes only, and it is what moves a stream cursor
//! from one record to the next — field decoding never does.
//!
//! # Forward compatibility, both directions
//! A body SHORTER than the schema is legal: fields past the end take their
//! missing values, provided the body ends exactly on a field boundary.  A
//! body LONGER than the schema is also legal: surplus bytes after the last
//! known field are ignored (a newer writer appended fields this table
//! predates).  A body that ends INSIDE a field is corrupt and fails with
//! `TruncatedRecord`.
//!
//! # Encode validation
//! Encoding is strict where decoding is permissive.  The encoder always
//! emits every field (substituting missing values), enforces array lengths
//! against their live count fields, and re-decodes its own output to prove
//! the body spans exactly its declared length before anything reaches a
//! stream.

use std::cell::Cell;
use std::fmt;

use crate::field::{
    bytes_from_nibbles, decode_value, encode_value, nibbles_from_bytes, ByteReader, ByteWriter,
    CodecError, Endianness, FieldKind, Value,
};
use crate::schema::{registry, FieldSpec, RecordDef, Version};

/// Bytes of `REC_LEN | REC_TYP | REC_SUB` before every record body.
pub const HEADER_LEN: usize = 4;

// ── Header ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub len:     u16,
    pub rec_typ: u8,
    pub rec_sub: u8,
}

impl RecordHeader {
    pub fn parse(bytes: &[u8], endian: Endianness) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::TruncatedRecord {
                needed:    HEADER_LEN,
                available: bytes.len(),
            });
        }
        Ok(RecordHeader {
            len:     endian.read_u16(&bytes[0..2]),
            rec_typ: bytes[2],
            rec_sub: bytes[3],
        })
    }

    pub fn emit(&self, endian: Endianness) -> [u8; HEADER_LEN] {
        let len = match endian {
            Endianness::Big    => self.len.to_be_bytes(),
            Endianness::Little => self.len.to_le_bytes(),
        };
        [len[0], len[1], self.rec_typ, self.rec_sub]
    }
}

// ── Field resolution ─────────────────────────────────────────────────────────

fn uint_field(fields: &[(&'static str, Value)], name: &str) -> Result<u64, CodecError> {
    fields
        .iter()
        .find(|(n, _)| *n == name)
        .and_then(|(_, v)| v.as_u64())
        .ok_or_else(|| {
            CodecError::SchemaViolation(format!("length field {name} unavailable or not unsigned"))
        })
}

/// Resolves the two field-sized kinds against fields already handled, in
/// wire order.  The table constructor guarantees the referenced field is
/// earlier; a width outside the scalar set is data corruption, not a table
/// bug.
fn resolve_kind(
    kind: FieldKind,
    fields: &[(&'static str, Value)],
) -> Result<FieldKind, CodecError> {
    match kind {
        FieldKind::SizedUInt(width_field) => match uint_field(fields, width_field)? {
            w @ (1 | 2 | 4 | 8) => Ok(FieldKind::UInt(w as u8)),
            w => Err(CodecError::UnsupportedEncoding(format!(
                "{width_field} = {w} is not a scalar width"
            ))),
        },
        FieldKind::SizedStr(width_field) => match uint_field(fields, width_field)? {
            w if w <= u8::MAX as u64 => Ok(FieldKind::FixedStr(w as u8)),
            w => Err(CodecError::UnsupportedEncoding(format!(
                "{width_field} = {w} exceeds a 1-byte string width"
            ))),
        },
        k => Ok(k),
    }
}

// ── Body decode ──────────────────────────────────────────────────────────────

fn decode_field(
    f: &FieldSpec,
    r: &mut ByteReader<'_>,
    decoded: &[(&'static str, Value)],
) -> Result<Value, CodecError> {
    let Some(count_field) = f.count_ref else {
        let kind = resolve_kind(f.kind, decoded)?;
        return decode_value(kind, r).map_err(|e| e.in_field(f.name));
    };
    let count = uint_field(decoded, count_field)? as usize;
    if f.kind == FieldKind::Nibbles {
        let raw = r.take(count.div_ceil(2))?;
        return Ok(Value::Nibbles(nibbles_from_bytes(raw, count)));
    }
    if count == 0 {
        return Ok(Value::List(Vec::new()));
    }
    // A width field may legitimately read 0 while its array is empty, so
    // field-sized kinds resolve only once there are elements to decode.
    let kind = resolve_kind(f.kind, decoded)?;
    let mut items = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        items.push(decode_value(kind, r).map_err(|e| e.in_field(f.name))?);
    }
    Ok(Value::List(items))
}

fn decode_fields(
    def: &'static RecordDef,
    endian: Endianness,
    body: &[u8],
) -> Result<(Vec<(&'static str, Value)>, usize), CodecError> {
    let mut r = ByteReader::new(body, endian);
    let mut fields: Vec<(&'static str, Value)> = Vec::with_capacity(def.fields.len());
    for f in def.fields {
        let value = if r.is_empty() {
            f.missing.materialize(f.kind, f.count_ref.is_some())
        } else {
            decode_field(f, &mut r, &fields)?
        };
        fields.push((f.name, value));
    }
    Ok((fields, r.position()))
}

// ── Body encode ──────────────────────────────────────────────────────────────

fn encode_field(
    f: &FieldSpec,
    value: &Value,
    w: &mut ByteWriter,
    encoded: &[(&'static str, Value)],
) -> Result<(), CodecError> {
    let Some(count_field) = f.count_ref else {
        let kind = resolve_kind(f.kind, encoded).map_err(|e| e.in_field(f.name))?;
        return encode_value(kind, value, w).map_err(|e| e.in_field(f.name));
    };
    let count = uint_field(encoded, count_field)? as usize;
    match value {
        Value::Nibbles(nibbles) if f.kind == FieldKind::Nibbles => {
            if nibbles.len() != count {
                return Err(CodecError::ValueOutOfRange(format!(
                    "{}: {} nibble(s) but {count_field} = {count}",
                    f.name,
                    nibbles.len()
                )));
            }
            w.put_bytes(&bytes_from_nibbles(nibbles).map_err(|e| e.in_field(f.name))?);
            Ok(())
        }
        Value::List(items) => {
            if items.len() != count {
                return Err(CodecError::ValueOutOfRange(format!(
                    "{}: {} element(s) but {count_field} = {count}",
                    f.name,
                    items.len()
                )));
            }
            if items.is_empty() {
                return Ok(());
            }
            let kind = resolve_kind(f.kind, encoded).map_err(|e| e.in_field(f.name))?;
            for item in items {
                encode_value(kind, item, w).map_err(|e| e.in_field(f.name))?;
            }
            Ok(())
        }
        other => Err(CodecError::ValueOutOfRange(format!(
            "{}: array field expects a list, got {other:?}",
            f.name
        ))),
    }
}

fn encode_fields(
    def: &'static RecordDef,
    endian: Endianness,
    fields: &[(&'static str, Value)],
) -> Result<Vec<u8>, CodecError> {
    let mut w = ByteWriter::new(endian);
    let mut encoded: Vec<(&'static str, Value)> = Vec::with_capacity(def.fields.len());
    for f in def.fields {
        let value = fields
            .iter()
            .find(|(n, _)| *n == f.name)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| f.missing.materialize(f.kind, f.count_ref.is_some()));
        encode_field(f, &value, &mut w, &encoded)?;
        encoded.push((f.name, value));
    }
    Ok(w.into_vec())
}

// ── Record instances ─────────────────────────────────────────────────────────

/// One decoded (or under-construction) record: a definition plus an ordered
/// field map.  Field values live behind the symbolic names of the
/// definition; setting a name the definition does not list is a
/// `SchemaViolation`.
#[derive(Debug, Clone)]
pub struct RecordInstance {
    version: Version,
    endian:  Endianness,
    def:     &'static RecordDef,
    fields:  Vec<(&'static str, Value)>,
    /// Body length of the last encode/decode, dropped on any mutation.
    wire_len: Cell<Option<u16>>,
}

impl PartialEq for RecordInstance {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.def, other.def)
            && self.version == other.version
            && self.endian == other.endian
            && self.fields == other.fields
    }
}

impl RecordInstance {
    /// Empty instance of a known kind; every field reads as absent until set.
    pub fn new(version: Version, endian: Endianness, id: &str) -> Result<Self, CodecError> {
        let def = registry().by_id(version, id).ok_or_else(|| {
            CodecError::SchemaViolation(format!("{id} is not a {} record kind", version.name()))
        })?;
        Ok(RecordInstance {
            version,
            endian,
            def,
            fields: Vec::new(),
            wire_len: Cell::new(None),
        })
    }

    pub fn id(&self) -> &'static str {
        self.def.id
    }

    pub fn def(&self) -> &'static RecordDef {
        self.def
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn endianness(&self) -> Endianness {
        self.endian
    }

    pub fn type_pair(&self) -> (u8, u8) {
        (self.def.rec_typ, self.def.rec_sub)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name)?.as_u64()
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    /// Flag bit `bit` (0 = least significant) of a flag-byte field.
    pub fn get_flag(&self, name: &str, bit: u8) -> Option<bool> {
        self.get(name)?.flag(bit)
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<(), CodecError> {
        let spec = self
            .def
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                CodecError::SchemaViolation(format!("{} has no field {name}", self.def.id))
            })?;
        self.wire_len.set(None);
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((spec.name, value)),
        }
        Ok(())
    }

    /// Fields in the order they were populated.  Decoded instances hold
    /// every field of the definition in wire order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(n, v)| (*n, v))
    }

    /// Body length this record encodes to.  Cached until a field changes.
    pub fn wire_len(&self) -> Result<u16, CodecError> {
        if let Some(len) = self.wire_len.get() {
            return Ok(len);
        }
        self.encode().map(|bytes| (bytes.len() - HEADER_LEN) as u16)
    }

    /// Header plus body, validated: array lengths must match their count
    /// fields, the body must fit the 2-byte length header, and a re-decode
    /// of the body must span exactly its length.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let body = encode_fields(self.def, self.endian, &self.fields)?;
        if body.len() > u16::MAX as usize {
            return Err(CodecError::ValueOutOfRange(format!(
                "{} body of {} byte(s) exceeds the 2-byte length header",
                self.def.id,
                body.len()
            )));
        }
        let (_, measured) = decode_fields(self.def, self.endian, &body)?;
        if measured != body.len() {
            return Err(CodecError::RecordLengthMismatch {
                declared: body.len(),
                measured,
            });
        }
        let header = RecordHeader {
            len:     body.len() as u16,
            rec_typ: self.def.rec_typ,
            rec_sub: self.def.rec_sub,
        };
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&header.emit(self.endian));
        out.extend_from_slice(&body);
        self.wire_len.set(Some(body.len() as u16));
        Ok(out)
    }
}

impl fmt::Display for RecordInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.def.id, self.def.rec_typ, self.def.rec_sub
        )?;
        let mut sep = " { ";
        for (name, value) in &self.fields {
            write!(f, "{sep}{name}: {value}")?;
            sep = ", ";
        }
        if sep == ", " {
            write!(f, " }}")?;
        }
        Ok(())
    }
}

// ── Whole-record decode ──────────────────────────────────────────────────────

/// Decodes header and body from a buffer starting at a record boundary.
/// Bytes past the declared record length are not touched.
pub fn decode_record(
    version: Version,
    endian: Endianness,
    bytes: &[u8],
) -> Result<RecordInstance, CodecError> {
    let header = RecordHeader::parse(bytes, endian)?;
    let end = HEADER_LEN + header.len as usize;
    let body = bytes
        .get(HEADER_LEN..end)
        .ok_or(CodecError::TruncatedRecord {
            needed:    header.len as usize,
            available: bytes.len() - HEADER_LEN,
        })?;
    decode_body(version, endian, header.rec_typ, header.rec_sub, body)
}

/// Decodes a body whose header was already consumed by a stream reader.
pub fn decode_body(
    version: Version,
    endian: Endianness,
    rec_typ: u8,
    rec_sub: u8,
    body: &[u8],
) -> Result<RecordInstance, CodecError> {
    let def = registry()
        .lookup(version, rec_typ, rec_sub)
        .ok_or_else(|| CodecError::UnknownRecordKind {
            rec_typ,
            rec_sub,
            bytes: body.to_vec(),
        })?;
    let (fields, _) = decode_fields(def, endian, body)?;
    Ok(RecordInstance {
        version,
        endian,
        def,
        fields,
        wire_len: Cell::new(Some(body.len() as u16)),
    })
}
