//! Parser Module
//!
//! calamineを使用したワークブックとエラーログの読み込み。

mod error_log;
mod metadata;
mod workbook;

pub(crate) use error_log::load_error_records;
pub(crate) use metadata::WorkbookMetadata;
pub(crate) use workbook::{read_input, WorkbookParser, ZIP_MAGIC};
