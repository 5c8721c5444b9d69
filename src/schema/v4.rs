//! STDF V4 record tables: the base standard plus the V4-2007 scan extension.
//!
//! Field lists are in wire order with the standard's field names.  Numeric
//! missing values are the standard's designated invalid markers; everything
//! else defaults to the kind-shaped neutral value.

use super::{
    arr, c, cf, def, def_ext, opt, opt_i, opt_u, req, uf, Extension, FieldSpec, RecordDef, B1, BN,
    CN, DN, I1, I2, I4, N1, R4, SN, U1, U2, U4, U8, VN,
};

const V4_2007: &[Extension] = &[Extension { name: "V4-2007", obligatory: false }];
const V4_2007_REQ: &[Extension] = &[Extension { name: "V4-2007", obligatory: true }];

// ── File data ────────────────────────────────────────────────────────────────

static FAR_FIELDS: &[FieldSpec] = &[
    req("CPU_TYPE", U1),
    req("STDF_VER", U1),
];

static ATR_FIELDS: &[FieldSpec] = &[
    req("MOD_TIM", U4),
    req("CMD_LINE", CN),
];

static VUR_FIELDS: &[FieldSpec] = &[
    req("UPD_NAM", CN),
];

// ── Lot data ─────────────────────────────────────────────────────────────────

static MIR_FIELDS: &[FieldSpec] = &[
    req("SETUP_T", U4),
    req("START_T", U4),
    req("STAT_NUM", U1),
    opt("MODE_COD", c(1)),
    opt("RTST_COD", c(1)),
    opt("PROT_COD", c(1)),
    opt_u("BURN_TIM", U2, 65535),
    opt("CMOD_COD", c(1)),
    req("LOT_ID", CN),
    req("PART_TYP", CN),
    req("NODE_NAM", CN),
    req("TSTR_TYP", CN),
    req("JOB_NAM", CN),
    opt("JOB_REV", CN),
    opt("SBLOT_ID", CN),
    opt("OPER_NAM", CN),
    opt("EXEC_TYP", CN),
    opt("EXEC_VER", CN),
    opt("TEST_COD", CN),
    opt("TST_TEMP", CN),
    opt("USER_TXT", CN),
    opt("AUX_FILE", CN),
    opt("PKG_TYP", CN),
    opt("FAMLY_ID", CN),
    opt("DATE_COD", CN),
    opt("FACIL_ID", CN),
    opt("FLOOR_ID", CN),
    opt("PROC_ID", CN),
    opt("OPER_FRQ", CN),
    opt("SPEC_NAM", CN),
    opt("SPEC_VER", CN),
    opt("FLOW_ID", CN),
    opt("SETUP_ID", CN),
    opt("DSGN_REV", CN),
    opt("ENG_ID", CN),
    opt("ROM_COD", CN),
    opt("SERL_NUM", CN),
    opt("SUPR_NAM", CN),
];

static MRR_FIELDS: &[FieldSpec] = &[
    req("FINISH_T", U4),
    opt("DISP_COD", c(1)),
    opt("USR_DESC", CN),
    opt("EXC_DESC", CN),
];

static PCR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("PART_CNT", U4),
    opt_u("RTST_CNT", U4, 4_294_967_295),
    opt_u("ABRT_CNT", U4, 4_294_967_295),
    opt_u("GOOD_CNT", U4, 4_294_967_295),
    opt_u("FUNC_CNT", U4, 4_294_967_295),
];

static HBR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("HBIN_NUM", U2),
    req("HBIN_CNT", U4),
    opt("HBIN_PF", c(1)),
    opt("HBIN_NAM", CN),
];

static SBR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("SBIN_NUM", U2),
    req("SBIN_CNT", U4),
    opt("SBIN_PF", c(1)),
    opt("SBIN_NAM", CN),
];

static PMR_FIELDS: &[FieldSpec] = &[
    req("PMR_INDX", U2),
    opt("CHAN_TYP", U2),
    opt("CHAN_NAM", CN),
    opt("PHY_NAM", CN),
    opt("LOG_NAM", CN),
    opt_u("HEAD_NUM", U1, 1),
    opt_u("SITE_NUM", U1, 1),
];

static PGR_FIELDS: &[FieldSpec] = &[
    req("GRP_INDX", U2),
    opt("GRP_NAM", CN),
    req("INDX_CNT", U2),
    arr("PMR_INDX", U2, "INDX_CNT"),
];

static PLR_FIELDS: &[FieldSpec] = &[
    req("GRP_CNT", U2),
    arr("GRP_INDX", U2, "GRP_CNT"),
    arr("GRP_MODE", U2, "GRP_CNT"),
    arr("GRP_RADX", U1, "GRP_CNT"),
    arr("PGM_CHAR", CN, "GRP_CNT"),
    arr("RTN_CHAR", CN, "GRP_CNT"),
    arr("PGM_CHAL", CN, "GRP_CNT"),
    arr("RTN_CHAL", CN, "GRP_CNT"),
];

static RDR_FIELDS: &[FieldSpec] = &[
    req("NUM_BINS", U2),
    arr("RTST_BIN", U2, "NUM_BINS"),
];

static SDR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_GRP", U1),
    req("SITE_CNT", U1),
    arr("SITE_NUM", U1, "SITE_CNT"),
    opt("HAND_TYP", CN),
    opt("HAND_ID", CN),
    opt("CARD_TYP", CN),
    opt("CARD_ID", CN),
    opt("LOAD_TYP", CN),
    opt("LOAD_ID", CN),
    opt("DIB_TYP", CN),
    opt("DIB_ID", CN),
    opt("CABL_TYP", CN),
    opt("CABL_ID", CN),
    opt("CONT_TYP", CN),
    opt("CONT_ID", CN),
    opt("LASR_TYP", CN),
    opt("LASR_ID", CN),
    opt("EXTR_TYP", CN),
    opt("EXTR_ID", CN),
];

static PSR_FIELDS: &[FieldSpec] = &[
    req("CONT_FLG", B1),
    req("PSR_INDX", U2),
    opt("PSR_NAM", CN),
    opt_u("OPT_FLG", B1, 0xFF),
    req("TOTP_CNT", U2),
    req("LOCP_CNT", U2),
    arr("PAT_BGN", U8, "LOCP_CNT"),
    arr("PAT_END", U8, "LOCP_CNT"),
    arr("PAT_FILE", CN, "LOCP_CNT"),
    arr("PAT_LBL", CN, "LOCP_CNT"),
    arr("FILE_UID", CN, "LOCP_CNT"),
    arr("ATPG_DSC", CN, "LOCP_CNT"),
    arr("SRC_ID", CN, "LOCP_CNT"),
];

static NMR_FIELDS: &[FieldSpec] = &[
    req("CONT_FLG", B1),
    req("TOTM_CNT", U2),
    req("LOCM_CNT", U2),
    arr("PMR_INDX", U2, "LOCM_CNT"),
    arr("ATPG_NAM", CN, "LOCM_CNT"),
];

static CNR_FIELDS: &[FieldSpec] = &[
    req("CHN_NUM", U2),
    req("BIT_POS", U4),
    opt("CELL_NAM", SN),
];

static SSR_FIELDS: &[FieldSpec] = &[
    opt("SSR_NAM", CN),
    req("CHN_CNT", U2),
    arr("CHN_LIST", U2, "CHN_CNT"),
];

static CDR_FIELDS: &[FieldSpec] = &[
    req("CONT_FLG", B1),
    req("CDR_INDX", U2),
    opt("CHN_NAM", CN),
    opt("CHN_LEN", U4),
    opt("SIN_PIN", U2),
    opt("SOUT_PIN", U2),
    req("MSTR_CNT", U1),
    arr("M_CLKS", U2, "MSTR_CNT"),
    req("SLAV_CNT", U1),
    arr("S_CLKS", U2, "SLAV_CNT"),
    opt("INV_VAL", U1),
    req("LST_CNT", U2),
    arr("CELL_LST", SN, "LST_CNT"),
];

// ── Wafer data ───────────────────────────────────────────────────────────────

static WIR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    opt_u("SITE_GRP", U1, 255),
    req("START_T", U4),
    opt("WAFER_ID", CN),
];

static WRR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    opt_u("SITE_GRP", U1, 255),
    req("FINISH_T", U4),
    req("PART_CNT", U4),
    opt_u("RTST_CNT", U4, 4_294_967_295),
    opt_u("ABRT_CNT", U4, 4_294_967_295),
    opt_u("GOOD_CNT", U4, 4_294_967_295),
    opt_u("FUNC_CNT", U4, 4_294_967_295),
    opt("WAFER_ID", CN),
    opt("FABWF_ID", CN),
    opt("FRAME_ID", CN),
    opt("MASK_ID", CN),
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
];

static PRR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("PART_FLG", B1),
    req("NUM_TEST", U2),
    req("HARD_BIN", U2),
    opt_u("SOFT_BIN", U2, 65535),
    opt_i("X_COORD", I2, -32768),
    opt_i("Y_COORD", I2, -32768),
    opt("TEST_T", U4),
    opt("PART_ID", CN),
    opt("PART_TXT", CN),
    opt("PART_FIX", BN),
];

// ── Test data ────────────────────────────────────────────────────────────────

static TSR_FIELDS: &[FieldSpec] = &[
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    opt("TEST_TYP", c(1)),
    req("TEST_NUM", U4),
    opt_u("EXEC_CNT", U4, 4_294_967_295),
    opt_u("FAIL_CNT", U4, 4_294_967_295),
    opt_u("ALRM_CNT", U4, 4_294_967_295),
    opt("TEST_NAM", CN),
    opt("SEQ_NAM", CN),
    opt("TEST_LBL", CN),
    opt_u("OPT_FLAG", B1, 0xFF),
    opt("TEST_TIM", R4),
    opt("TEST_MIN", R4),
    opt("TEST_MAX", R4),
    opt("TST_SUMS", R4),
    opt("TST_SQRS", R4),
];

static PTR_FIELDS: &[FieldSpec] = &[
    req("TEST_NUM", U4),
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("TEST_FLG", B1),
    req("PARM_FLG", B1),
    opt("RESULT", R4),
    opt("TEST_TXT", CN),
    opt("ALARM_ID", CN),
    opt_u("OPT_FLAG", B1, 0xFF),
    opt("RES_SCAL", I1),
    opt("LLM_SCAL", I1),
    opt("HLM_SCAL", I1),
    opt("LO_LIMIT", R4),
    opt("HI_LIMIT", R4),
    opt("UNITS", CN),
    opt("C_RESFMT", CN),
    opt("C_LLMFMT", CN),
    opt("C_HLMFMT", CN),
    opt("LO_SPEC", R4),
    opt("HI_SPEC", R4),
];

static MPR_FIELDS: &[FieldSpec] = &[
    req("TEST_NUM", U4),
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("TEST_FLG", B1),
    req("PARM_FLG", B1),
    opt("RTN_ICNT", U2),
    opt("RSLT_CNT", U2),
    arr("RTN_STAT", N1, "RTN_ICNT"),
    arr("RTN_RSLT", R4, "RSLT_CNT"),
    opt("TEST_TXT", CN),
    opt("ALARM_ID", CN),
    opt_u("OPT_FLAG", B1, 0xFF),
    opt("RES_SCAL", I1),
    opt("LLM_SCAL", I1),
    opt("HLM_SCAL", I1),
    opt("LO_LIMIT", R4),
    opt("HI_LIMIT", R4),
    opt("START_IN", R4),
    opt("INCR_IN", R4),
    arr("RTN_INDX", U2, "RTN_ICNT"),
    opt("UNITS", CN),
    opt("UNITS_IN", CN),
    opt("C_RESFMT", CN),
    opt("C_LLMFMT", CN),
    opt("C_HLMFMT", CN),
    opt("LO_SPEC", R4),
    opt("HI_SPEC", R4),
];

static FTR_FIELDS: &[FieldSpec] = &[
    req("TEST_NUM", U4),
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("TEST_FLG", B1),
    opt_u("OPT_FLAG", B1, 0xFF),
    opt("CYCL_CNT", U4),
    opt("REL_VADR", U4),
    opt("REPT_CNT", U4),
    opt("NUM_FAIL", U4),
    opt("XFAIL_AD", I4),
    opt("YFAIL_AD", I4),
    opt("VECT_OFF", I2),
    opt("RTN_ICNT", U2),
    opt("PGM_ICNT", U2),
    arr("RTN_INDX", U2, "RTN_ICNT"),
    arr("RTN_STAT", N1, "RTN_ICNT"),
    arr("PGM_INDX", U2, "PGM_ICNT"),
    arr("PGM_STAT", N1, "PGM_ICNT"),
    opt("FAIL_PIN", DN),
    opt("VECT_NAM", CN),
    opt("TIME_SET", CN),
    opt("OP_CODE", CN),
    opt("TEST_TXT", CN),
    opt("ALARM_ID", CN),
    opt("PROG_TXT", CN),
    opt("RSLT_TXT", CN),
    opt_u("PATG_NUM", U1, 255),
    opt("SPIN_MAP", DN),
];

static STR_FIELDS: &[FieldSpec] = &[
    req("CONT_FLG", B1),
    req("TEST_NUM", U4),
    req("HEAD_NUM", U1),
    req("SITE_NUM", U1),
    req("PSR_REF", U2),
    req("TEST_FLG", B1),
    opt("LOG_TYP", CN),
    opt("TEST_TXT", CN),
    opt("ALARM_ID", CN),
    opt("PROG_TXT", CN),
    opt("RSLT_TXT", CN),
    opt("Z_VAL", U1),
    opt_u("FMU_FLG", B1, 0xFF),
    opt("MASK_MAP", DN),
    opt("FAL_MAP", DN),
    opt("CYC_CNT", U8),
    opt("TOTF_CNT", U4),
    opt("TOTL_CNT", U4),
    opt("CYC_BASE", U8),
    opt("BIT_BASE", U4),
    opt("COND_CNT", U2),
    opt("LIM_CNT", U2),
    opt("CYC_SIZE", U1),
    opt("PMR_SIZE", U1),
    opt("CHN_SIZE", U1),
    opt("PAT_SIZE", U1),
    opt("BIT_SIZE", U1),
    opt("U1_SIZE", U1),
    opt("U2_SIZE", U1),
    opt("U3_SIZE", U1),
    opt("UTX_SIZE", U1),
    opt("CAP_BGN", U2),
    arr("LIM_INDX", U2, "LIM_CNT"),
    arr("LIM_SPEC", U4, "LIM_CNT"),
    arr("COND_LST", CN, "COND_CNT"),
    opt("CYCO_CNT", U2),
    arr("CYC_OFST", uf("CYC_SIZE"), "CYCO_CNT"),
    opt("PMR_CNT", U2),
    arr("PMR_INDX", uf("PMR_SIZE"), "PMR_CNT"),
    opt("CHN_CNT", U2),
    arr("CHN_NUM", uf("CHN_SIZE"), "CHN_CNT"),
    opt("EXP_CNT", U2),
    arr("EXP_DATA", U1, "EXP_CNT"),
    opt("CAP_CNT", U2),
    arr("CAP_DATA", U1, "CAP_CNT"),
    opt("NEW_CNT", U2),
    arr("NEW_DATA", U1, "NEW_CNT"),
    opt("PAT_CNT", U2),
    arr("PAT_NUM", uf("PAT_SIZE"), "PAT_CNT"),
    opt("BPOS_CNT", U2),
    arr("BIT_POS", uf("BIT_SIZE"), "BPOS_CNT"),
    opt("USR1_CNT", U2),
    arr("USR1", uf("U1_SIZE"), "USR1_CNT"),
    opt("USR2_CNT", U2),
    arr("USR2", uf("U2_SIZE"), "USR2_CNT"),
    opt("USR3_CNT", U2),
    arr("USR3", uf("U3_SIZE"), "USR3_CNT"),
    opt("TXT_CNT", U2),
    arr("USER_TXT", cf("UTX_SIZE"), "TXT_CNT"),
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
    def(0, 10, "FAR", "File Attributes Record", true, FAR_FIELDS),
    def(0, 20, "ATR", "Audit Trail Record", false, ATR_FIELDS),
    def_ext(0, 30, "VUR", "Version Update Record", V4_2007_REQ, VUR_FIELDS),
    def(1, 10, "MIR", "Master Information Record", true, MIR_FIELDS),
    def(1, 20, "MRR", "Master Results Record", true, MRR_FIELDS),
    def(1, 30, "PCR", "Part Count Record", true, PCR_FIELDS),
    def(1, 40, "HBR", "Hardware Bin Record", true, HBR_FIELDS),
    def(1, 50, "SBR", "Software Bin Record", true, SBR_FIELDS),
    def(1, 60, "PMR", "Pin Map Record", false, PMR_FIELDS),
    def(1, 62, "PGR", "Pin Group Record", false, PGR_FIELDS),
    def(1, 63, "PLR", "Pin List Record", false, PLR_FIELDS),
    def(1, 70, "RDR", "Retest Data Record", false, RDR_FIELDS),
    def(1, 80, "SDR", "Site Description Record", false, SDR_FIELDS),
    def_ext(1, 90, "PSR", "Pattern Sequence Record", V4_2007, PSR_FIELDS),
    def_ext(1, 91, "NMR", "Name Map Record", V4_2007, NMR_FIELDS),
    def_ext(1, 92, "CNR", "Cell Name Record", V4_2007, CNR_FIELDS),
    def_ext(1, 93, "SSR", "Scan Structure Record", V4_2007, SSR_FIELDS),
    def_ext(1, 94, "CDR", "Chain Description Record", V4_2007, CDR_FIELDS),
    def(2, 10, "WIR", "Wafer Information Record", false, WIR_FIELDS),
    def(2, 20, "WRR", "Wafer Results Record", false, WRR_FIELDS),
    def(2, 30, "WCR", "Wafer Configuration Record", false, WCR_FIELDS),
    def(5, 10, "PIR", "Part Information Record", true, PIR_FIELDS),
    def(5, 20, "PRR", "Part Results Record", true, PRR_FIELDS),
    def(10, 30, "TSR", "Test Synopsis Record", true, TSR_FIELDS),
    def(15, 10, "PTR", "Parametric Test Record", false, PTR_FIELDS),
    def(15, 15, "MPR", "Multiple-Result Parametric Record", false, MPR_FIELDS),
    def(15, 20, "FTR", "Functional Test Record", false, FTR_FIELDS),
    def_ext(15, 30, "STR", "Scan Test Record", V4_2007, STR_FIELDS),
    def(20, 10, "BPS", "Begin Program Section Record", false, BPS_FIELDS),
    def(20, 20, "EPS", "End Program Section Record", false, EPS_FIELDS),
    def(50, 10, "GDR", "Generic Data Record", false, GDR_FIELDS),
    def(50, 30, "DTR", "Datalog Text Record", false, DTR_FIELDS),
];
