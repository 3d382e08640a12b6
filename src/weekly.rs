//! Weekly Report Module
//!
//! `Weekly_Report`シートの読み込み、故障率の反映、週次平均行の再計算を行うモジュール。
//!
//! パーセンテージは割合として保持します。シートへはパーセント書式付きの数値として
//! 書き戻し（[`crate::output::weekly_edit`]）、解釈できなかったセルには触れません。

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::api::WEEKLY_AVG_LABEL;
use crate::error::Result;
use crate::formatter::{parse_percent_points, DateConverter};
use crate::grid::SheetGrid;
use crate::types::{CellValue, WeeklyColumn, WeeklyDate, WeeklyReport, WeeklyReportRow};

/// 週次レポートの列名
pub const DATE_COLUMN: &str = "Date";
pub const AVG_EXECUTE_PERIOD_COLUMN: &str = "Avg EXECUTE PERIOD";
pub const OHT_UTILIZATION_COLUMN: &str = "OHT Utilization (%)";
pub const FAILURE_RATE_COLUMN: &str = "Failure Rate (%)";
pub const TRANSFER_COUNT_COLUMN: &str = "Transfer Count";

/// 週次レポートの必須列
pub const WEEKLY_COLUMNS: [&str; 5] = [
    DATE_COLUMN,
    AVG_EXECUTE_PERIOD_COLUMN,
    OHT_UTILIZATION_COLUMN,
    FAILURE_RATE_COLUMN,
    TRANSFER_COUNT_COLUMN,
];

/// 週次レポート更新の結果
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyUpdate {
    /// 故障率を書き込んだシート上の行（0始まり、平均行削除後の位置）
    pub matched_row: Option<usize>,
    /// 削除した`Weekly Avg`行（元のシート上の行、昇順）
    pub removed_rows: Vec<usize>,
    /// 再計算した週次平均行
    pub average: WeeklyReportRow,
}

/// ヘッダー名から列種別を決定
///
/// 既知の列名が重複している場合は先頭の列だけを既知の列として扱います。
fn classify_columns(headers: &[String]) -> Vec<WeeklyColumn> {
    let mut seen = [false; 5];

    headers
        .iter()
        .map(|header| match WEEKLY_COLUMNS.iter().position(|c| c == header) {
            Some(pos) if !seen[pos] => {
                seen[pos] = true;
                match pos {
                    0 => WeeklyColumn::Date,
                    1 => WeeklyColumn::AvgExecutePeriod,
                    2 => WeeklyColumn::OhtUtilization,
                    3 => WeeklyColumn::FailureRate,
                    _ => WeeklyColumn::TransferCount,
                }
            }
            _ => WeeklyColumn::Extra(header.clone()),
        })
        .collect()
}

/// `Date`列のセルを解釈
fn parse_weekly_date(cell: &CellValue, converter: DateConverter) -> WeeklyDate {
    if cell.is_empty() {
        return WeeklyDate::Empty;
    }
    if let CellValue::Text(s) = cell {
        if s.trim() == WEEKLY_AVG_LABEL {
            return WeeklyDate::WeeklyAvg;
        }
    }
    match converter.parse_date(cell) {
        Some(date) => WeeklyDate::Date(date),
        None => WeeklyDate::Other(cell.clone()),
    }
}

/// `Failure Rate (%)`列のセルを割合として解釈
///
/// `%`付きの文字列はパーセンテージポイント、数値はすでに割合とみなします。
fn parse_failure_rate(cell: &CellValue) -> Option<f64> {
    let is_percent_text = match cell {
        CellValue::Text(s) => s.trim().ends_with('%'),
        CellValue::Formula { cached, .. } => cached.trim().ends_with('%'),
        _ => false,
    };
    if is_percent_text {
        let text = CellValue::Text(cell.to_display_string());
        parse_percent_points(&text).map(|p| p / 100.0)
    } else {
        cell.as_f64()
    }
}

/// `Weekly_Report`シートを`WeeklyReport`に変換
///
/// # 戻り値
///
/// * `Ok(WeeklyReport)` - 元のヘッダー順と行順を保持したレポート
/// * `Err(ErrStatError::Schema)` - 必須列が欠けている場合
pub fn parse_weekly_report(sheet: &SheetGrid, converter: DateConverter) -> Result<WeeklyReport> {
    sheet.require_columns(&WEEKLY_COLUMNS)?;

    let mut headers = sheet.headers();
    let width = sheet.width();
    if headers.len() < width {
        headers.resize(width, String::new());
    }
    let columns = classify_columns(&headers);

    let mut rows = Vec::new();
    for (idx, cells) in sheet.data_rows().enumerate() {
        let grid_row = idx + 1;
        if cells.iter().all(|c| c.is_empty()) {
            debug!("Skipping blank Weekly_Report row {}", grid_row + 1);
            continue;
        }

        let mut row = WeeklyReportRow {
            row: grid_row,
            ..WeeklyReportRow::default()
        };
        for (col, column) in columns.iter().enumerate() {
            let cell = sheet.cell(grid_row, col);
            match column {
                WeeklyColumn::Date => row.date = parse_weekly_date(cell, converter),
                WeeklyColumn::AvgExecutePeriod => row.avg_execute_period = cell.as_f64(),
                WeeklyColumn::OhtUtilization => {
                    row.oht_utilization = parse_percent_points(cell).map(|p| p / 100.0)
                }
                WeeklyColumn::FailureRate => row.failure_rate = parse_failure_rate(cell),
                WeeklyColumn::TransferCount => row.transfer_count = cell.as_f64(),
                WeeklyColumn::Extra(_) => {}
            }
        }

        rows.push(row);
    }

    Ok(WeeklyReport { columns, rows })
}

/// 対象日の行に故障率を書き込む
///
/// 日付が一致する最初の行のみを更新し、そのシート上の行（0始まり）を返します。
/// 一致する行がない場合は警告を出力して`None`を返します（エラーにはしない）。
pub fn apply_failure_rate(report: &mut WeeklyReport, target: NaiveDate, rate: f64) -> Option<usize> {
    let matched = report
        .rows
        .iter_mut()
        .find(|row| row.date == WeeklyDate::Date(target));

    match matched {
        Some(row) => {
            row.failure_rate = Some(rate);
            info!(
                "Inserted failure rate into Weekly_Report at row {}",
                row.row + 1
            );
            Some(row.row)
        }
        None => {
            warn!(
                "Could not find a Weekly_Report row dated {} to insert the failure rate",
                target
            );
            None
        }
    }
}

/// 存在する値の平均（値がなければ`None`）
fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// 削除した行より後ろの行を詰めた位置
fn shift_row(row: usize, removed: &[usize]) -> usize {
    row - removed.iter().filter(|&&r| r < row).count()
}

/// 週次平均行を再計算して末尾に追加
///
/// 既存の`Weekly Avg`行はすべて削除され、残りの行から
/// 平均（実行時間・稼働率・故障率）と合計（搬送数）を計算します。
/// 残りの行のシート上の位置は削除した行の分だけ詰められ、
/// 新しい平均行は最後のデータ行の直後に置かれます。
///
/// # 戻り値
///
/// 削除した平均行の元のシート上の行（昇順）
pub fn recompute_weekly_avg(report: &mut WeeklyReport) -> Vec<usize> {
    let mut removed: Vec<usize> = report
        .rows
        .iter()
        .filter(|row| row.is_weekly_avg())
        .map(|row| row.row)
        .collect();
    removed.sort_unstable();

    report.rows.retain(|row| !row.is_weekly_avg());
    for row in &mut report.rows {
        row.row = shift_row(row.row, &removed);
    }

    let rows = &report.rows;
    let average = WeeklyReportRow {
        row: rows.iter().map(|r| r.row).max().unwrap_or(0) + 1,
        date: WeeklyDate::WeeklyAvg,
        avg_execute_period: mean(rows.iter().map(|r| r.avg_execute_period)),
        oht_utilization: mean(rows.iter().map(|r| r.oht_utilization)),
        failure_rate: mean(rows.iter().map(|r| r.failure_rate)),
        transfer_count: Some(rows.iter().filter_map(|r| r.transfer_count).sum()),
    };
    debug!(
        "Recomputed Weekly Avg over {} rows (removed {} previous average rows)",
        rows.len(),
        removed.len()
    );

    report.rows.push(average);
    removed
}

/// 故障率の反映と週次平均の再計算をまとめて行う
pub fn update_weekly_report(report: &mut WeeklyReport, target: NaiveDate, rate: f64) -> WeeklyUpdate {
    let matched = apply_failure_rate(report, target, rate);
    let removed_rows = recompute_weekly_avg(report);
    let average = report.rows.last().cloned().unwrap_or_default();

    WeeklyUpdate {
        matched_row: matched.map(|row| shift_row(row, &removed_rows)),
        removed_rows,
        average,
    }
}
