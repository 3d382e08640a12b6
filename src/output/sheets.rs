//! Sheet Serialization
//!
//! 集計結果を書き出し用の`SheetGrid`に、週次レポートの更新を
//! 既存シートへの`SheetEdit`に変換します。

use chrono::NaiveDateTime;

use crate::api::WEEKLY_AVG_LABEL;
use crate::failure_rate::{DAILY_RATE_FORMAT, WEEKLY_RATE_FORMAT};
use crate::grid::SheetGrid;
use crate::output::worksheet::{CellWrite, SheetEdit};
use crate::types::{CellValue, ReportRow, StatisticsReport, WeeklyColumn, WeeklyReport};
use crate::weekly::WeeklyUpdate;

/// エラー統計シートのヘッダー
pub const STATISTICS_HEADER: [&str; 4] = ["ERROR_MESSAGE", "START_TIME", "END_TIME", "Count"];

const TOTAL_LABEL: &str = "Total";
const FAILURE_RATE_LABEL: &str = "Failure Rate";

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

fn timestamp(value: Option<NaiveDateTime>) -> CellValue {
    value.map(CellValue::DateTime).unwrap_or_default()
}

/// `StatisticsReport`をエラー統計シートに変換
///
/// ```text
/// ERROR_MESSAGE | START_TIME          | END_TIME            | Count
/// M1            | 2025-01-01 01:00:00 | 2025-01-01 02:00:00 | 1
///               | 2025-01-01 01:00:00 | 2025-01-01 02:00:00 |
/// Total         |                     |                     | 1
/// Failure Rate  |                     |                     | 10.00%
/// ```
pub fn statistics_sheet(report: &StatisticsReport, sheet_name: &str) -> SheetGrid {
    let mut rows: Vec<Vec<CellValue>> = Vec::with_capacity(report.rows.len() + 1);
    rows.push(STATISTICS_HEADER.iter().map(|h| text(h)).collect());

    for row in &report.rows {
        let cells = match row {
            ReportRow::Summary {
                message,
                min_start,
                max_end,
                count,
            } => vec![
                text(message),
                timestamp(*min_start),
                timestamp(*max_end),
                CellValue::Number(*count as f64),
            ],
            ReportRow::Detail { start, end } => vec![
                CellValue::Empty,
                timestamp(*start),
                timestamp(*end),
                CellValue::Empty,
            ],
            ReportRow::Total { count } => vec![
                text(TOTAL_LABEL),
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Number(*count as f64),
            ],
            ReportRow::FailureRate { display } => vec![
                text(FAILURE_RATE_LABEL),
                CellValue::Empty,
                CellValue::Empty,
                text(display),
            ],
        };
        rows.push(cells);
    }

    SheetGrid::from_rows(sheet_name, rows)
}

/// 週次レポートの更新を既存シートへの変更に変換
///
/// 書き換えるのは、対象日の行の故障率セルと`Weekly Avg`行だけです。
/// 古い`Weekly Avg`行は削除され、解釈できなかったセルや追加の列、
/// 他の行の値と書式はそのまま残ります。値のない平均は書き込みません。
pub fn weekly_edit(report: &WeeklyReport, update: &WeeklyUpdate) -> SheetEdit {
    let mut edit = SheetEdit::new();
    for row in &update.removed_rows {
        edit.remove_row(*row as u32);
    }

    let col = |column: WeeklyColumn| report.column_index(&column).map(|c| c as u32);

    if let (Some(matched), Some(rate_col)) = (update.matched_row, col(WeeklyColumn::FailureRate)) {
        let rate = report
            .rows
            .iter()
            .find(|row| row.row == matched)
            .and_then(|row| row.failure_rate);
        if let Some(rate) = rate {
            edit.set(
                matched as u32,
                rate_col,
                CellWrite::formatted(rate, DAILY_RATE_FORMAT),
            );
        }
    }

    let average = &update.average;
    let row = average.row as u32;
    let cells = [
        (
            WeeklyColumn::Date,
            Some(CellWrite::Text(WEEKLY_AVG_LABEL.to_string())),
        ),
        (
            WeeklyColumn::AvgExecutePeriod,
            average.avg_execute_period.map(CellWrite::number),
        ),
        (
            WeeklyColumn::OhtUtilization,
            average
                .oht_utilization
                .map(|v| CellWrite::formatted(v, DAILY_RATE_FORMAT)),
        ),
        (
            WeeklyColumn::FailureRate,
            average
                .failure_rate
                .map(|v| CellWrite::formatted(v, WEEKLY_RATE_FORMAT)),
        ),
        (
            WeeklyColumn::TransferCount,
            average.transfer_count.map(CellWrite::number),
        ),
    ];
    for (column, cell) in cells {
        if let (Some(c), Some(cell)) = (col(column), cell) {
            edit.set(row, c, cell);
        }
    }

    edit
}
