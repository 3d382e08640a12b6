//! Error Log Loader
//!
//! エラーログのシートを`ErrorRecord`の列に変換します。
//! 日時は寛容に解釈し、解釈できない値は`None`になります（行は棄却しない）。

use tracing::{debug, info};

use crate::api::REQUIRED_LOG_COLUMNS;
use crate::error::Result;
use crate::formatter::{cell_to_text, DateConverter};
use crate::grid::SheetGrid;
use crate::types::{CellCoord, ErrorRecord};

/// エラーログシートから`ErrorRecord`を読み込む
///
/// 1行目をヘッダー行として扱い、`REQUIRED_LOG_COLUMNS`の列を探します。
/// 余分な列は無視し、完全に空の行はスキップします。
///
/// # 戻り値
///
/// * `Ok(Vec<ErrorRecord>)` - 入力順のレコード
/// * `Err(ErrStatError::Schema)` - 必須列が1つでも欠けている場合
pub(crate) fn load_error_records(
    sheet: &SheetGrid,
    converter: DateConverter,
) -> Result<Vec<ErrorRecord>> {
    let columns = sheet.require_columns(&REQUIRED_LOG_COLUMNS)?;
    let (message_col, start_col, end_col, level_col, code_col) =
        (columns[0], columns[1], columns[2], columns[3], columns[4]);

    let mut records = Vec::new();
    let mut unparsed_times = 0usize;

    for (idx, row) in sheet.data_rows().enumerate() {
        if row.iter().all(|c| c.is_empty()) {
            continue;
        }
        let row_idx = idx + 1;

        let start_cell = sheet.cell(row_idx, start_col);
        let end_cell = sheet.cell(row_idx, end_col);
        let start_time = converter.parse_timestamp(start_cell);
        let end_time = converter.parse_timestamp(end_cell);

        for (cell, parsed, col) in [
            (start_cell, start_time, start_col),
            (end_cell, end_time, end_col),
        ] {
            if parsed.is_none() && !cell.is_empty() {
                unparsed_times += 1;
                debug!(
                    "Unparseable timestamp at {}: {:?}",
                    CellCoord::new(row_idx as u32, col as u32).to_a1_notation(),
                    cell
                );
            }
        }

        records.push(ErrorRecord {
            error_message: cell_to_text(sheet.cell(row_idx, message_col)),
            start_time,
            end_time,
            error_level: cell_to_text(sheet.cell(row_idx, level_col)),
            error_code: cell_to_text(sheet.cell(row_idx, code_col)),
        });
    }

    info!(
        "Loaded {} error records from '{}' ({} unparseable timestamps)",
        records.len(),
        sheet.name,
        unparsed_times
    );

    Ok(records)
}
