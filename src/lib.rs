pub mod field;
pub mod schema;
pub mod record;
pub mod stream;
pub mod index;
pub mod session;
pub mod unit;

pub use field::{CodecError, Endianness, FieldKind, MissingValue, Value};
pub use schema::{registry, FieldSpec, RecordDef, Registry, Version};
pub use record::{decode_record, RecordHeader, RecordInstance, HEADER_LEN};
pub use stream::{CompressionKind, OpenError, RawRecord, StdfWriter, StreamError, WriteError};
pub use index::{OffsetIndex, UNKNOWN_KIND};
pub use session::{ConvertError, FileSession, RawRecords, Records};
pub use unit::{OutcomeTally, TestKind, TestResult, UnitError, UnitResult};
