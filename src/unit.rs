//! Per-part assembly: folds the flat record stream back into tested units.
//!
//! A tester emits one part as a bracket — a part information record opens
//! it, the test execution records of that head/site pair fill it, a part
//! results record closes it.  Parts from other sites interleave freely on
//! multi-site testers, so everything here keys on the (head, site) pair of
//! the opening record and ignores the rest of the traffic.

use std::collections::BTreeMap;
use std::mem;

use thiserror::Error;

use crate::field::{CodecError, Value};
use crate::record::RecordInstance;
use crate::session::FileSession;
use crate::stream::StreamError;

#[derive(Error, Debug)]
pub enum UnitError {
    /// The stream breaks the open/test/close bracket discipline.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Parametric,
    MultiParametric,
    Functional,
}

/// One test execution inside a part, with results already scaled into
/// engineering units (stored value times ten to the result scale).
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub test_num: u32,
    pub kind:     TestKind,
    pub label:    String,
    /// Empty for functional tests; one value for parametric, many for
    /// multi-result parametric.
    pub values:   Vec<f64>,
    pub failed:   bool,
}

/// Everything the stream said about one tested part.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitResult {
    pub head:         u8,
    pub site:         u8,
    pub part_id:      String,
    pub part_txt:     String,
    pub x_coord:      i16,
    pub y_coord:      i16,
    pub hard_bin:     u16,
    pub soft_bin:     u16,
    pub num_tests:    u16,
    /// Elapsed test time in milliseconds, when the closing record reports
    /// one.
    pub test_time_ms: Option<u64>,
    /// `None` when the part flag byte declares its pass/fail bit invalid.
    pub passed:       Option<bool>,
    pub tests:        Vec<TestResult>,
}

/// Pass/fail/bin totals over a whole file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeTally {
    pub parts:       u64,
    pub passed:      u64,
    pub failed:      u64,
    pub unknown:     u64,
    pub by_hard_bin: BTreeMap<u16, u64>,
}

// ── Assembly ─────────────────────────────────────────────────────────────────

pub(crate) fn assemble(session: &mut FileSession, offset: u64) -> Result<UnitResult, UnitError> {
    let first = session.record_at(offset)?;
    if first.id() != "PIR" {
        return Err(UnitError::ProtocolViolation(format!(
            "record at offset {offset} is {}, not PIR",
            first.id()
        )));
    }
    let mut builder = UnitBuilder::start(&first);
    for item in session.records() {
        let rec = match item {
            Ok(rec) => rec,
            Err(StreamError::Decode(CodecError::UnknownRecordKind { .. })) => continue,
            Err(e) => return Err(e.into()),
        };
        if !matches!(rec.id(), "PIR" | "PRR" | "PTR" | "MPR" | "FTR") {
            continue;
        }
        if let Some(unit) = builder.feed(&rec)? {
            return Ok(unit);
        }
    }
    Err(UnitError::ProtocolViolation(format!(
        "stream ended before the part opened at offset {offset} closed"
    )))
}

pub(crate) fn tally(session: &mut FileSession) -> Result<OutcomeTally, UnitError> {
    if session.offset_index().is_none() {
        session.build_offset_index()?;
    }
    let offsets = match session.offset_index() {
        Some(index) => index.offsets("PRR").to_vec(),
        None => Vec::new(),
    };
    let mut tally = OutcomeTally::default();
    for offset in offsets {
        let prr = session.record_at(offset)?;
        tally.parts += 1;
        match part_passed(&prr) {
            Some(true)  => tally.passed += 1,
            Some(false) => tally.failed += 1,
            None        => tally.unknown += 1,
        }
        let bin = prr.get_u64("HARD_BIN").unwrap_or(0) as u16;
        *tally.by_hard_bin.entry(bin).or_insert(0) += 1;
    }
    Ok(tally)
}

struct UnitBuilder {
    head:  u64,
    site:  u64,
    tests: Vec<TestResult>,
}

impl UnitBuilder {
    fn start(pir: &RecordInstance) -> UnitBuilder {
        UnitBuilder {
            head:  pir.get_u64("HEAD_NUM").unwrap_or(0),
            site:  pir.get_u64("SITE_NUM").unwrap_or(0),
            tests: Vec::new(),
        }
    }

    /// Folds one record in; `Some` once the closing record arrives.
    fn feed(&mut self, rec: &RecordInstance) -> Result<Option<UnitResult>, UnitError> {
        let head = rec.get_u64("HEAD_NUM").unwrap_or(0);
        let site = rec.get_u64("SITE_NUM").unwrap_or(0);
        if head != self.head || site != self.site {
            return Ok(None);
        }
        match rec.id() {
            "PIR" => Err(UnitError::ProtocolViolation(format!(
                "second PIR for head {head} site {site} before the part closed"
            ))),
            "PRR" => Ok(Some(self.finish(rec))),
            _ => {
                self.tests.push(test_result(rec));
                Ok(None)
            }
        }
    }

    fn finish(&mut self, prr: &RecordInstance) -> UnitResult {
        UnitResult {
            head:         self.head as u8,
            site:         self.site as u8,
            part_id:      prr.get_str("PART_ID").unwrap_or("").to_owned(),
            part_txt:     prr.get_str("PART_TXT").unwrap_or("").to_owned(),
            x_coord:      prr.get_i64("X_COORD").unwrap_or(-32768) as i16,
            y_coord:      prr.get_i64("Y_COORD").unwrap_or(-32768) as i16,
            hard_bin:     prr.get_u64("HARD_BIN").unwrap_or(0) as u16,
            soft_bin:     prr.get_u64("SOFT_BIN").unwrap_or(65535) as u16,
            num_tests:    prr.get_u64("NUM_TEST").unwrap_or(0) as u16,
            test_time_ms: prr.get_u64("TEST_T").filter(|&ms| ms != 0),
            passed:       part_passed(prr),
            tests:        mem::take(&mut self.tests),
        }
    }
}

fn test_result(rec: &RecordInstance) -> TestResult {
    let scale = rec.get_i64("RES_SCAL").unwrap_or(0) as i32;
    let factor = 10f64.powi(scale);
    let (kind, values) = match rec.id() {
        "PTR" => (
            TestKind::Parametric,
            rec.get_f64("RESULT").map(|v| vec![v * factor]).unwrap_or_default(),
        ),
        "MPR" => (
            TestKind::MultiParametric,
            rec.get("RTN_RSLT")
                .and_then(Value::as_list)
                .map(|vs| vs.iter().filter_map(Value::as_f64).map(|v| v * factor).collect())
                .unwrap_or_default(),
        ),
        _ => (TestKind::Functional, Vec::new()),
    };
    TestResult {
        test_num: rec.get_u64("TEST_NUM").unwrap_or(0) as u32,
        kind,
        label: rec.get_str("TEST_TXT").unwrap_or("").to_owned(),
        values,
        failed: rec.get_flag("TEST_FLG", 7) == Some(true),
    }
}

/// Part flag byte: bit 3 is the fail bit, bit 4 declares bit 3 invalid.
fn part_passed(prr: &RecordInstance) -> Option<bool> {
    match prr.get_flag("PART_FLG", 4) {
        Some(false) => prr.get_flag("PART_FLG", 3).map(|failed| !failed),
        _ => None,
    }
}
