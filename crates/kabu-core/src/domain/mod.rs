//! 도메인 타입.

mod code;
mod record;

pub use code::{normalize_codes, NormalizeReport, StockCode, CODE_WIDTH};
pub use record::{FetchResult, FetchStatus, FieldSpec, FieldValue, REQUIRED_COLUMNS, TABLE_COLUMNS};
