//! Record registry: one canonical table per format version.
//!
//! # Identity rules
//! Every record kind is identified by its `(REC_TYP, REC_SUB)` byte pair on
//! disk and by a short symbolic id (`"MIR"`, `"PTR"`, ...) in APIs, logs and
//! index buckets.  Both directions of that mapping are generated here from
//! ONE table per version — the pair/id correspondence is never written out
//! by hand anywhere else, so the two directions cannot drift.
//!
//! Byte pairs and symbolic ids are permanent.  A pair is never reused, even
//! across versions that drop a kind.  Parsers meeting a pair that is absent
//! from the table for the file's version fail that record with
//! `UnknownRecordKind` and keep the raw bytes; they never guess.
//!
//! # Field order
//! `RecordDef::fields` lists fields in wire order.  Array length references
//! and field-sized widths always point at an EARLIER field of the same
//! record; the constructor checks this, so decode can run in one forward
//! pass.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::field::{FieldKind, MissingValue};

mod v3;
mod v4;

// ── Format versions ──────────────────────────────────────────────────────────

/// STDF major version, from the version marker in the first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V3,
    V4,
}

impl Version {
    pub const ALL: [Version; 2] = [Version::V3, Version::V4];

    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            3 => Some(Version::V3),
            4 => Some(Version::V4),
            _ => None,
        }
    }

    #[inline]
    pub fn marker(self) -> u8 {
        match self {
            Version::V3 => 3,
            Version::V4 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Version::V3 => "V3",
            Version::V4 => "V4",
        }
    }

    /// `(REC_TYP, REC_SUB)` of the record every file of this version must
    /// start with: the file attributes record for V4, the master information
    /// record for V3.  Both carry the endianness and version markers at body
    /// offsets 0 and 1.
    pub fn header_record(self) -> (u8, u8) {
        match self {
            Version::V3 => (1, 10),
            Version::V4 => (0, 10),
        }
    }
}

// ── Table vocabulary ─────────────────────────────────────────────────────────

pub(crate) const U1: FieldKind = FieldKind::UInt(1);
pub(crate) const U2: FieldKind = FieldKind::UInt(2);
pub(crate) const U4: FieldKind = FieldKind::UInt(4);
pub(crate) const U8: FieldKind = FieldKind::UInt(8);
pub(crate) const I1: FieldKind = FieldKind::Int(1);
pub(crate) const I2: FieldKind = FieldKind::Int(2);
pub(crate) const I4: FieldKind = FieldKind::Int(4);
pub(crate) const R4: FieldKind = FieldKind::Real(4);
pub(crate) const B1: FieldKind = FieldKind::FixedBits(1);
pub(crate) const CN: FieldKind = FieldKind::VarStr;
pub(crate) const SN: FieldKind = FieldKind::LongStr;
pub(crate) const BN: FieldKind = FieldKind::VarBits;
pub(crate) const DN: FieldKind = FieldKind::WideBits;
pub(crate) const N1: FieldKind = FieldKind::Nibbles;
pub(crate) const VN: FieldKind = FieldKind::Variant;

pub(crate) const fn c(width: u8) -> FieldKind {
    FieldKind::FixedStr(width)
}

pub(crate) const fn uf(width_field: &'static str) -> FieldKind {
    FieldKind::SizedUInt(width_field)
}

pub(crate) const fn cf(width_field: &'static str) -> FieldKind {
    FieldKind::SizedStr(width_field)
}

// ── Field specs ──────────────────────────────────────────────────────────────

/// One field of a record definition, in wire order.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name:      &'static str,
    pub kind:      FieldKind,
    /// Names an earlier unsigned field holding this array's element count.
    /// `None` for scalar fields.
    pub count_ref: Option<&'static str>,
    pub missing:   MissingValue,
    /// Required data for a conforming producer.  Decode does not enforce
    /// this; conformance reporting does.
    pub obligatory: bool,
}

pub(crate) const fn req(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind, count_ref: None, missing: MissingValue::Default, obligatory: true }
}

pub(crate) const fn opt(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind, count_ref: None, missing: MissingValue::Default, obligatory: false }
}

pub(crate) const fn opt_u(name: &'static str, kind: FieldKind, missing: u64) -> FieldSpec {
    FieldSpec { name, kind, count_ref: None, missing: MissingValue::U(missing), obligatory: false }
}

pub(crate) const fn opt_i(name: &'static str, kind: FieldKind, missing: i64) -> FieldSpec {
    FieldSpec { name, kind, count_ref: None, missing: MissingValue::I(missing), obligatory: false }
}

pub(crate) const fn arr(name: &'static str, kind: FieldKind, count_ref: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        count_ref: Some(count_ref),
        missing: MissingValue::Default,
        obligatory: false,
    }
}

// ── Record definitions ───────────────────────────────────────────────────────

/// Membership of a record kind in a named optional extension, with whether a
/// file using that extension must contain the kind.
#[derive(Debug, Clone, Copy)]
pub struct Extension {
    pub name:       &'static str,
    pub obligatory: bool,
}

pub(crate) const NO_EXT: &[Extension] = &[];

/// One record kind of one version: identity, conformance flags, field list.
#[derive(Debug)]
pub struct RecordDef {
    pub rec_typ:    u8,
    pub rec_sub:    u8,
    pub id:         &'static str,
    pub name:       &'static str,
    pub obligatory: bool,
    pub extensions: &'static [Extension],
    pub fields:     &'static [FieldSpec],
}

pub(crate) const fn def(
    rec_typ: u8,
    rec_sub: u8,
    id: &'static str,
    name: &'static str,
    obligatory: bool,
    fields: &'static [FieldSpec],
) -> RecordDef {
    RecordDef { rec_typ, rec_sub, id, name, obligatory, extensions: NO_EXT, fields }
}

pub(crate) const fn def_ext(
    rec_typ: u8,
    rec_sub: u8,
    id: &'static str,
    name: &'static str,
    extensions: &'static [Extension],
    fields: &'static [FieldSpec],
) -> RecordDef {
    RecordDef { rec_typ, rec_sub, id, name, obligatory: false, extensions, fields }
}

// ── Registry ─────────────────────────────────────────────────────────────────

struct VersionTable {
    defs:    &'static [RecordDef],
    by_pair: HashMap<(u8, u8), &'static RecordDef>,
    by_id:   HashMap<&'static str, &'static RecordDef>,
}

impl VersionTable {
    fn new(version: Version, defs: &'static [RecordDef]) -> Self {
        let mut by_pair = HashMap::with_capacity(defs.len());
        let mut by_id = HashMap::with_capacity(defs.len());
        for d in defs {
            let prev = by_pair.insert((d.rec_typ, d.rec_sub), d);
            assert!(
                prev.is_none(),
                "{} table reuses pair ({}, {})",
                version.name(),
                d.rec_typ,
                d.rec_sub
            );
            let prev = by_id.insert(d.id, d);
            assert!(prev.is_none(), "{} table reuses id {}", version.name(), d.id);
            Self::check_fields(version, d);
        }
        VersionTable { defs, by_pair, by_id }
    }

    /// Length references and field-sized widths must name an earlier,
    /// unsigned field of the same record.  Broken references are table bugs
    /// and abort construction rather than surfacing as per-record decode
    /// failures later.
    fn check_fields(version: Version, d: &RecordDef) {
        for (i, f) in d.fields.iter().enumerate() {
            let mut refs = Vec::new();
            if let Some(count) = f.count_ref {
                refs.push(count);
            }
            if let Some(width) = f.kind.size_ref() {
                refs.push(width);
            }
            for name in refs {
                let target = d.fields[..i].iter().find(|t| t.name == name);
                match target {
                    Some(t) => assert!(
                        matches!(t.kind, FieldKind::UInt(_)),
                        "{} {}.{} references non-unsigned field {}",
                        version.name(),
                        d.id,
                        f.name,
                        name
                    ),
                    None => panic!(
                        "{} {}.{} references {} which is not an earlier field",
                        version.name(),
                        d.id,
                        f.name,
                        name
                    ),
                }
            }
        }
    }
}

/// Process-wide record registry, built once from the version tables.
pub struct Registry {
    v3: VersionTable,
    v4: VersionTable,
}

impl Registry {
    fn table(&self, version: Version) -> &VersionTable {
        match version {
            Version::V3 => &self.v3,
            Version::V4 => &self.v4,
        }
    }

    /// All record kinds of a version, in table order.
    pub fn defs(&self, version: Version) -> &'static [RecordDef] {
        self.table(version).defs
    }

    /// `(REC_TYP, REC_SUB)` → definition.
    pub fn lookup(&self, version: Version, rec_typ: u8, rec_sub: u8) -> Option<&'static RecordDef> {
        self.table(version).by_pair.get(&(rec_typ, rec_sub)).copied()
    }

    /// Symbolic id → definition.
    pub fn by_id(&self, version: Version, id: &str) -> Option<&'static RecordDef> {
        self.table(version).by_id.get(id).copied()
    }

    /// `(REC_TYP, REC_SUB)` → symbolic id.
    pub fn symbolic_id(&self, version: Version, rec_typ: u8, rec_sub: u8) -> Option<&'static str> {
        self.lookup(version, rec_typ, rec_sub).map(|d| d.id)
    }

    /// Symbolic id → `(REC_TYP, REC_SUB)`.
    pub fn type_pair(&self, version: Version, id: &str) -> Option<(u8, u8)> {
        self.by_id(version, id).map(|d| (d.rec_typ, d.rec_sub))
    }

    /// Record kinds a conforming file of this version is expected to
    /// contain.  Extension kinds count only when their extension is named in
    /// `extensions` and the kind is obligatory under it.
    pub fn obligatory_records(
        &self,
        version: Version,
        extensions: &[&str],
    ) -> BTreeSet<&'static str> {
        self.table(version)
            .defs
            .iter()
            .filter(|d| {
                if d.extensions.is_empty() {
                    d.obligatory
                } else {
                    d.extensions
                        .iter()
                        .any(|e| e.obligatory && extensions.contains(&e.name))
                }
            })
            .map(|d| d.id)
            .collect()
    }

    /// Every record kind visible to a version/extension query, obligatory or
    /// not.  Base kinds are always included; extension kinds only when one of
    /// their extensions is named in `extensions`.
    pub fn record_kinds(&self, version: Version, extensions: &[&str]) -> BTreeSet<&'static str> {
        self.table(version)
            .defs
            .iter()
            .filter(|d| {
                d.extensions.is_empty()
                    || d.extensions.iter().any(|e| extensions.contains(&e.name))
            })
            .map(|d| d.id)
            .collect()
    }
}

/// The registry is immutable and shared by every session in the process.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        v3: VersionTable::new(Version::V3, v3::RECORDS),
        v4: VersionTable::new(Version::V4, v4::RECORDS),
    })
}
