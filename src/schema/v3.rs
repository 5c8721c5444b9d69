//! STDF V3 record tables.
//!
//! V3 files open with the master information record, which carries the
//! endianness and version markers in its first two body bytes — the same
//! offsets the V4 file attributes record uses, which is what keeps the
//! prologue sniff version-independent.  Counters that V4 later widened to
//! unsigned are signed here with -1 as the invalid marker, and several
//! records carry explicit pad bytes.

use super::{
    arr, c, def, opt, opt_i, opt_u, req, FieldSpec, RecordDef, B1, BN, CN, I1, I2, I4, R4, U1, U2,
    U4, VN,
};

// ── Lot data ─────────────────────────────────────────────────────────────────

static MIR_FIELDS: &[FieldSpec] = &[
    req("CPU_TYPE", U1),
    req("STDF_VER", U1),
    req("MODE_COD", c(1)),
    req("STAT_NUM", U1),
    req("TEST_COD", c(3)),
    opt("RTST_COD", c(1)),
    opt("PROT_COD", c(1)),
    opt("CMOD_COD", c(1)),
    req("SETUP_T", U4),
    req("START_T", U4),
    req("LOT_ID", CN),
    req("PART_TYP", CN),
    req("JOB_NAM", CN),
    opt("OPER_NAM", CN),
    opt("NODE_NAM", CN),
    opt("TSTR_TYP", CN),
    opt("EXEC_TYP", CN),
    opt("SUPR_NAM", CN),
    opt("HAND_ID", CN),
    opt("SBLOT_ID", CN),
    opt("JOB_REV", CN),
    opt("PROC_ID", CN),
    opt("PRB_CARD", CN),
];

static MRR_FIELDS: &[FieldSpec] = &[
    req("FINISH_T", U4),
    req("PART_CNT", U4),
    opt_i("RTST_CNT", I4, -1),
    opt_i("ABRT_CNT", I4, -1),
    opt_i("GOOD_CNT", I4, -1),
    opt_i("FUNC_CNT", I4, -1),
    opt("DISP_COD", c(1)),
    opt("USR_DESC", CN),
    opt("EXC_DESC", CN),
];

static HBR_FIELDS: &[FieldSpec] = &[
    req("HBIN_NUM", U2),
    req("HBIN_CNT", U4),
    opt("HBIN_NAM", CN),
];

static SBR_FIELDS: &[FieldSpec] = &[
    req("SBIN_NUM", U2),
    req("SBIN_CNT", U4),
    opt("SBIN_NAM", CN),
];

static PMR_FIELDS: &[FieldSpec] = &[
    req("PMR_INDX", U2),
    opt("CHAN_TYP", U2),
    opt("CHAN_NAM", CN),
    opt("PHY_NAM", CN),
    opt("LOG_NAM", CN),
];

static RDR_FIELDS: &[FieldSpec] = &[
    req("NUM_BINS", U2),
    arr("RTST_BIN", U2, "NUM_BINS"),
];

// ── Wafer data ───────────────────────────────────────────────────────────────

static WIR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    opt("PAD_BYTE", B1),
    req("START_T", U4),
    opt("WAFER_ID", CN),
];

static WRR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    opt("PAD_BYTE", B1),
    req("FINISH_T", U4),
    req("PART_CNT", U4),
    opt_i("RTST_CNT", I4, -1),
    opt_i("ABRT_CNT", I4, -1),
    opt_i("GOOD_CNT", I4, -1),
    opt_i("FUNC_CNT", I4, -1),
    opt("WAFER_ID", CN),
    opt("HAND_ID", CN),
    opt("PRB_CARD", CN),
    opt("USR_DESC", CN),
    opt("EXC_DESC", CN),
];

static WCR_FIELDS: &[FieldSpec] = &[
    opt("WAFR_SIZ", R4),
    opt("DIE_HT", R4),
    opt("DIE_WID", R4),
    opt("WF_UNITS", U1),
    opt("WF_FLAT", c(1)),
    opt_i("CENTER_X", I2, -32768),
    opt_i("CENTER_Y", I2, -32768),
    opt("POS_X", c(1)),
    opt("POS_Y", c(1)),
];

// ── Part data ────────────────────────────────────────────────────────────────

static PIR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    opt_i("X_COORD", I2, -32768),
    opt_i("Y_COORD", I2, -32768),
    opt("PART_ID", CN),
];

static PRR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("NUM_TEST", U2),
    req("HARD_BIN", U2),
    opt_u("SOFT_BIN", U2, 65535),
    req("PART_FLG", B1),
    opt("PAD_BYTE", B1),
    opt_i("X_COORD", I2, -32768),
    opt_i("Y_COORD", I2, -32768),
    opt("PART_ID", CN),
    opt("PART_TXT", CN),
    opt("PART_FIX", BN),
];

// ── Test descriptions and data ───────────────────────────────────────────────

static PDR_FIELDS: &[FieldSpec] = &[
    req("TEST_NUM", U4),
    opt("DESC_FLG", B1),
    opt_u("OPT_FLAG", B1, 0xFF),
    opt("RES_SCAL", I1),
    opt("UNITS", c(7)),
    opt("RES_LDIG", U1),
    opt("RES_RDIG", U1),
    opt("LLM_SCAL", I1),
    opt("HLM_SCAL", I1),
    opt("LLM_LDIG", U1),
    opt("LLM_RDIG", U1),
    opt("HLM_LDIG", U1),
    opt("HLM_RDIG", U1),
    opt("LO_LIMIT", R4),
    opt("HI_LIMIT", R4),
    opt("TEST_NAM", CN),
    opt("SEQ_NAM", CN),
];

static FDR_FIELDS: &[FieldSpec] = &[
    req("TEST_NUM", U4),
    opt("DESC_FLG", B1),
    opt("TEST_NAM", CN),
    opt("SEQ_NAM", CN),
];

static TSR_FIELDS: &[FieldSpec] = &[
    req("TEST_NUM", U4),
    opt_i("EXEC_CNT", I4, -1),
    opt_i("FAIL_CNT", I4, -1),
    opt_i("ALRM_CNT", I4, -1),
    opt_u("OPT_FLAG", B1, 0xFF),
    opt("PAD_BYTE", B1),
    opt("TEST_MIN", R4),
    opt("TEST_MAX", R4),
    opt("TST_MEAN", R4),
    opt("TST_SDEV", R4),
    opt("TST_SUMS", R4),
    opt("TST_SQRS", R4),
    opt("TEST_NAM", CN),
    opt("SEQ_NAM", CN),
];

static PTR_FIELDS: &[FieldSpec] = &[
    req("TEST_NUM", U4),
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("TEST_FLG", B1),
    req("PARM_FLG", B1),
    opt("RESULT", R4),
    opt_u("OPT_FLAG", B1, 0xFF),
    opt("RES_SCAL", I1),
    opt("UNITS", c(7)),
    opt("RES_LDIG", U1),
    opt("RES_RDIG", U1),
    opt("DESC_FLG", B1),
    opt("TEST_NAM", CN),
    opt("SEQ_NAM", CN),
    opt("TEST_TXT", CN),
];

static FTR_FIELDS: &[FieldSpec] = &[
    req("TEST_NUM", U4),
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("TEST_FLG", B1),
    opt("DESC_FLG", B1),
    opt_u("OPT_FLAG", B1, 0xFF),
    opt("TIME_SET", U1),
    opt("VECT_ADR", U4),
    opt("CYCL_CNT", U4),
    opt("REPT_CNT", U2),
    opt("PCP_ADDR", U2),
    opt("NUM_FAIL", U4),
    opt("FAIL_PIN", BN),
    opt("VECT_DAT", BN),
    opt("DEV_DAT", BN),
    opt("RPIN_MAP", BN),
    opt("TEST_NAM", CN),
    opt("SEQ_NAM", CN),
    opt("TEST_TXT", CN),
];

// ── Site-specific summaries ──────────────────────────────────────────────────

static SHB_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("HBIN_NUM", U2),
    req("HBIN_CNT", U4),
    opt("HBIN_NAM", CN),
];

static SSB_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("SBIN_NUM", U2),
    req("SBIN_CNT", U4),
    opt("SBIN_NAM", CN),
];

static STS_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("TEST_NUM", U4),
    opt_i("EXEC_CNT", I4, -1),
    opt_i("FAIL_CNT", I4, -1),
    opt_i("ALRM_CNT", I4, -1),
    opt_u("OPT_FLAG", B1, 0xFF),
    opt("PAD_BYTE", B1),
    opt("TEST_MIN", R4),
    opt("TEST_MAX", R4),
    opt("TST_MEAN", R4),
    opt("TST_SDEV", R4),
    opt("TST_SUMS", R4),
    opt("TST_SQRS", R4),
    opt("TEST_NAM", CN),
    opt("SEQ_NAM", CN),
    opt("TEST_LBL", CN),
];

static SCR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    opt("FINISH_T", U4),
    req("PART_CNT", U4),
    opt_i("RTST_CNT", I4, -1),
    opt_i("ABRT_CNT", I4, -1),
    opt_i("GOOD_CNT", I4, -1),
    opt_i("FUNC_CNT", I4, -1),
];

// ── Program and generic data ─────────────────────────────────────────────────

static BPS_FIELDS: &[FieldSpec] = &[
    opt("SEQ_NAME", CN),
];

static EPS_FIELDS: &[FieldSpec] = &[];

static GDR_FIELDS: &[FieldSpec] = &[
    req("FLD_CNT", U2),
    arr("GEN_DATA", VN, "FLD_CNT"),
];

static DTR_FIELDS: &[FieldSpec] = &[
    req("TEXT_DAT", CN),
];

// ── Table ────────────────────────────────────────────────────────────────────

pub(crate) static RECORDS: &[RecordDef] = &[
    def(1, 10, "MIR", "Master Information Record", true, MIR_FIELDS),
    def(1, 20, "MRR", "Master Results Record", true, MRR_FIELDS),
    def(1, 40, "HBR", "Hardware Bin Record", false, HBR_FIELDS),
    def(1, 50, "SBR", "Software Bin Record", false, SBR_FIELDS),
    def(1, 60, "PMR", "Pin Map Record", false, PMR_FIELDS),
    def(1, 70, "RDR", "Retest Data Record", false, RDR_FIELDS),
    def(2, 10, "WIR", "Wafer Information Record", false, WIR_FIELDS),
    def(2, 20, "WRR", "Wafer Results Record", false, WRR_FIELDS),
    def(2, 30, "WCR", "Wafer Configuration Record", false, WCR_FIELDS),
    def(5, 10, "PIR", "Part Information Record", true, PIR_FIELDS),
    def(5, 20, "PRR", "Part Results Record", true, PRR_FIELDS),
    def(10, 10, "PDR", "Parametric Test Description Record", false, PDR_FIELDS),
    def(10, 20, "FDR", "Functional Test Description Record", false, FDR_FIELDS),
    def(10, 30, "TSR", "Test Synopsis Record", false, TSR_FIELDS),
    def(15, 10, "PTR", "Parametric Test Record", false, PTR_FIELDS),
    def(15, 20, "FTR", "Functional Test Record", false, FTR_FIELDS),
    def(20, 10, "BPS", "Begin Program Section Record", false, BPS_FIELDS),
    def(20, 20, "EPS", "End Program Section Record", false, EPS_FIELDS),
    def(25, 10, "SHB", "Site-Specific Hardware Bin Record", false, SHB_FIELDS),
    def(25, 20, "SSB", "Site-Specific Software Bin Record", false, SSB_FIELDS),
    def(25, 30, "STS", "Site-Specific Test Synopsis Record", false, STS_FIELDS),
    def(25, 40, "SCR", "Site-Specific Count Record", false, SCR_FIELDS),
    def(50, 10, "GDR", "Generic Data Record", false, GDR_FIELDS),
    def(50, 30, "DTR", "Datalog Text Record", false, DTR_FIELDS),
];
