//! Output Module
//!
//! レポートのシート表現への変換と、ワークブックの書き戻しを提供するモジュール。
//!
//! - [`statistics_sheet`]: 集計結果を`SheetGrid`に変換
//! - [`weekly_edit`]: 週次レポートの更新を既存シートへの[`SheetEdit`]に変換
//! - [`WorkbookPackage`]: xlsxパッケージの変更するパートだけを書き換えて保存

mod package;
mod sheets;
mod styles;
mod worksheet;

pub use package::WorkbookPackage;
pub use sheets::{statistics_sheet, weekly_edit, STATISTICS_HEADER};
pub use worksheet::{CellWrite, SheetEdit};
