//! errstat - Daily OHT error-log aggregation and failure-rate reporting
//!
//! This crate reads a daily equipment-error log exported as a spreadsheet,
//! aggregates the alarm-level errors per message, computes the daily failure
//! rate and writes the results back into a multi-sheet report workbook,
//! including the rolling `Weekly_Report` sheet.
//!
//! The whole report workbook is loaded into memory, updated stage by stage and
//! written back once at the end through a temporary file, so a failing stage
//! never leaves a half-updated workbook behind. Only the parts the run changes
//! are rewritten: other sheets, styles, merged cells and column widths are
//! carried over byte for byte.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use errstat::{InputLocator, ProcessorBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Find data/ErrorTimeStatistics*.xlsx
//!     let input = InputLocator::default().locate()?;
//!
//!     // Sheet date = date in the file name minus one day
//!     let processor = ProcessorBuilder::new().build()?;
//!     let summary = processor.run(&input, Path::new("output/OHT_Daily_Report.xlsx"))?;
//!
//!     println!("{} -> {}", summary.statistics_sheet, summary.failure_rate);
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use errstat::{DateSource, ProcessorBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let date = NaiveDate::from_ymd_opt(2025, 1, 5).ok_or("invalid date")?;
//!     let processor = ProcessorBuilder::new()
//!         .with_date_source(DateSource::Explicit(date)) // 20250105_errorStatistics
//!         .with_total_row(true) // append a "Total" row
//!         .build()?;
//!
//!     let input = std::fs::read("data/ErrorTimeStatistics.xlsx")?;
//!     let workbook = std::fs::read("output/OHT_Daily_Report.xlsx")?;
//!     let (updated, summary) =
//!         processor.process_buffers(input, "ErrorTimeStatistics.xlsx", workbook)?;
//!
//!     std::fs::write("updated.xlsx", updated)?;
//!     println!("{}", serde_json::to_string_pretty(&summary)?);
//!     Ok(())
//! }
//! ```

mod aggregate;
mod api;
mod builder;
mod discovery;
mod error;
mod failure_rate;
mod formatter;
mod grid;
mod output;
mod parser;
mod security;
mod types;
mod weekly;

// 公開API
pub use aggregate::{aggregate, build_report, group_records, is_reportable};
pub use api::{
    statistics_sheet_name, utilization_sheet_name, DateSource, WEEKLY_AVG_LABEL,
    WEEKLY_REPORT_SHEET,
};
pub use builder::{ErrorLogProcessor, ProcessorBuilder, RunSummary};
pub use discovery::{file_date, resolve_sheet_date, InputLocator};
pub use error::{ErrStatError, Result};
pub use failure_rate::{daily_display, failure_rate, read_utilization};
pub use formatter::DateConverter;
pub use grid::{SheetGrid, WorkbookGrid};
pub use output::{statistics_sheet, weekly_edit, CellWrite, SheetEdit, WorkbookPackage};
pub use security::SecurityConfig;
pub use types::{
    CellValue, ErrorGroup, ErrorRecord, ReportRow, StatisticsReport, UtilizationRecord,
    WeeklyColumn, WeeklyDate, WeeklyReport, WeeklyReportRow,
};
pub use weekly::{
    apply_failure_rate, parse_weekly_report, recompute_weekly_avg, update_weekly_report,
    WeeklyUpdate,
};
