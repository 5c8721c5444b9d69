//! Session facade: one open file, its sniffed facts, its cursor, its index.
//!
//! Opening runs the whole gauntlet up front — envelope sniff, decompression,
//! prologue sniff — so a constructed session has settled compression kind,
//! byte order and version, and every later operation can rely on them.
//!
//! A session owns a single cursor.  [`FileSession::records`] consumes from
//! wherever the cursor stands (a fresh session stands at the first record)
//! and is not restartable; going back means reopening, or building the
//! offset index once and jumping with [`FileSession::record_at`].  The
//! session is deliberately single-threaded; concurrent readers each open
//! their own session.

use std::collections::{BTreeSet, HashSet};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::field::Endianness;
use crate::index::{OffsetIndex, UNKNOWN_KIND};
use crate::record::{decode_body, RecordInstance, HEADER_LEN};
use crate::schema::{registry, Version};
use crate::stream::{
    next_header, next_raw, open_envelope, sniff_prologue, write_envelope, ByteSource,
    CompressionKind, OpenError, RawRecord, StreamError, WriteError,
};
use crate::unit::{self, OutcomeTally, UnitError, UnitResult};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Reopen(#[from] OpenError),
}

#[derive(Debug)]
pub struct FileSession {
    path:        PathBuf,
    compression: CompressionKind,
    endianness:  Endianness,
    version:     Version,
    source:      ByteSource,
    stream_len:  u64,
    index:       Option<OffsetIndex>,
}

impl FileSession {
    /// Opens a file: sniffs and unwraps the envelope, then sniffs byte order
    /// and version from the first record.  Everything fatal about a file
    /// surfaces here, not later mid-scan.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        let path = path.as_ref().to_path_buf();
        let mut envelope = open_envelope(&path)?;
        let prologue = sniff_prologue(&mut envelope.source)?;
        Ok(FileSession {
            path,
            compression: envelope.kind,
            endianness: prologue.endianness,
            version: prologue.version,
            source: envelope.source,
            stream_len: envelope.stream_len,
            index: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> CompressionKind {
        self.compression
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Length of the decoded record stream in bytes.
    pub fn stream_len(&self) -> u64 {
        self.stream_len
    }

    // ── Sequential access ────────────────────────────────────────────────

    /// Decoded records from the current cursor to the end of the stream.
    ///
    /// An unknown record kind is yielded as an error carrying its raw body,
    /// with the cursor already past it — the caller chooses between
    /// aborting and pulling the next record.
    pub fn records(&mut self) -> Records<'_> {
        Records { session: self, filter: None }
    }

    /// Like [`records`](Self::records), but decodes only the named kinds and
    /// skips everything else (including unknown kinds) without decoding.
    pub fn records_of_kinds(&mut self, kinds: &[&str]) -> Records<'_> {
        let version = self.version;
        let filter = kinds
            .iter()
            .filter_map(|id| registry().type_pair(version, id))
            .collect();
        Records { session: self, filter: Some(filter) }
    }

    /// Undecoded records from the current cursor: offset, header, body.
    pub fn raw_records(&mut self) -> RawRecords<'_> {
        RawRecords { session: self }
    }

    // ── Random access ────────────────────────────────────────────────────

    /// Decodes the record starting at `offset`.  Offsets come from the
    /// offset index; anything else is at the caller's risk, though a
    /// non-boundary offset fails loudly rather than desynchronising.
    pub fn record_at(&mut self, offset: u64) -> Result<RecordInstance, StreamError> {
        self.source.seek(SeekFrom::Start(offset))?;
        match next_raw(&mut self.source, self.endianness)? {
            Some(raw) => Ok(decode_body(
                self.version,
                self.endianness,
                raw.header.rec_typ,
                raw.header.rec_sub,
                &raw.body,
            )?),
            None => Err(StreamError::TruncatedStream { offset, needed: HEADER_LEN }),
        }
    }

    // ── Integrity ────────────────────────────────────────────────────────

    /// Walks the stream by headers alone and confirms it ends exactly on a
    /// record boundary.  Returns the record count; leaves the cursor at the
    /// end of the stream.
    ///
    /// This is the only end-of-stream check available to envelopes without
    /// a trailer (bzip2, lzma); gzip streams additionally had their trailer
    /// verified at open.
    pub fn check_boundaries(&mut self) -> Result<u64, StreamError> {
        self.source.seek(SeekFrom::Start(0))?;
        let mut count = 0u64;
        while next_header(&mut self.source, self.endianness, self.stream_len)?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    // ── Offset index ─────────────────────────────────────────────────────

    /// Walks the whole stream by headers alone and replaces the session's
    /// index.  Leaves the cursor at the end of the stream.
    pub fn build_offset_index(&mut self) -> Result<&OffsetIndex, StreamError> {
        static NEVER: AtomicBool = AtomicBool::new(false);
        self.build_offset_index_with(&NEVER)
    }

    /// Cooperative variant of [`build_offset_index`](Self::build_offset_index):
    /// checks `cancel` between records and stops with
    /// [`StreamError::Interrupted`] once it reads true.  An interrupted
    /// build leaves the session without an index.
    pub fn build_offset_index_with(
        &mut self,
        cancel: &AtomicBool,
    ) -> Result<&OffsetIndex, StreamError> {
        self.index = None;
        let mut index = OffsetIndex::new();
        self.source.seek(SeekFrom::Start(0))?;
        while let Some((offset, header)) =
            next_header(&mut self.source, self.endianness, self.stream_len)?
        {
            if cancel.load(Ordering::Relaxed) {
                return Err(StreamError::Interrupted);
            }
            let id = registry()
                .symbolic_id(self.version, header.rec_typ, header.rec_sub)
                .unwrap_or(UNKNOWN_KIND);
            index.insert(id, offset);
        }
        Ok(self.index.insert(index))
    }

    pub fn offset_index(&self) -> Option<&OffsetIndex> {
        self.index.as_ref()
    }

    /// Restores a snapshot taken from [`OffsetIndex::to_bytes`] in place of
    /// a fresh walk.  The caller vouches that the snapshot belongs to this
    /// file.
    pub fn restore_offset_index(&mut self, index: OffsetIndex) {
        self.index = Some(index);
    }

    /// Obligatory kinds for this version (and the named extensions) that
    /// have no record in the stream.  `None` until an index exists.
    pub fn conformance_gaps(&self, extensions: &[&str]) -> Option<BTreeSet<&'static str>> {
        let index = self.index.as_ref()?;
        let mut gaps = registry().obligatory_records(self.version, extensions);
        gaps.retain(|id| !index.contains(id));
        Some(gaps)
    }

    // ── Unit assembly ────────────────────────────────────────────────────

    /// Assembles one tested part from the records between the part
    /// information record at `offset` and its matching part results record,
    /// collecting the test executions of that head/site pair on the way.
    pub fn assemble_unit_result(&mut self, offset: u64) -> Result<UnitResult, UnitError> {
        unit::assemble(self, offset)
    }

    /// Pass/fail/bin totals over every part in the file, driven by the
    /// offset index (built on demand).
    pub fn tally_outcomes(&mut self) -> Result<OutcomeTally, UnitError> {
        unit::tally(self)
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// Re-wraps the record stream in a different envelope at `dest` and
    /// opens the result as a new session.  Record bytes are preserved
    /// exactly; only the envelope changes.  The stream is checked first, so
    /// nothing is written for a stream that does not parse to the end.
    pub fn convert<P: AsRef<Path>>(
        mut self,
        dest: P,
        compression: CompressionKind,
    ) -> Result<FileSession, ConvertError> {
        if compression == CompressionKind::Xz {
            return Err(WriteError::UnsupportedCompression("xz").into());
        }
        self.check_boundaries()?;
        self.source.seek(SeekFrom::Start(0)).map_err(StreamError::Io)?;
        let mut data = Vec::with_capacity(self.stream_len as usize);
        self.source.read_to_end(&mut data).map_err(StreamError::Io)?;
        write_envelope(dest.as_ref(), compression, &data)?;
        Ok(FileSession::open(dest)?)
    }

    /// Releases the underlying source.  Dropping does the same; this exists
    /// for call sites that want the hand-back explicit.
    pub fn close(self) {}
}

// ── Iterators ────────────────────────────────────────────────────────────────

pub struct Records<'a> {
    session: &'a mut FileSession,
    filter:  Option<HashSet<(u8, u8)>>,
}

impl Iterator for Records<'_> {
    type Item = Result<RecordInstance, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match next_raw(&mut self.session.source, self.session.endianness) {
                Ok(Some(raw)) => raw,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            if let Some(filter) = &self.filter {
                if !filter.contains(&(raw.header.rec_typ, raw.header.rec_sub)) {
                    continue;
                }
            }
            return Some(
                decode_body(
                    self.session.version,
                    self.session.endianness,
                    raw.header.rec_typ,
                    raw.header.rec_sub,
                    &raw.body,
                )
                .map_err(StreamError::Decode),
            );
        }
    }
}

pub struct RawRecords<'a> {
    session: &'a mut FileSession,
}

impl Iterator for RawRecords<'_> {
    type Item = Result<RawRecord, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        next_raw(&mut self.session.source, self.session.endianness).transpose()
    }
}
