//! Failure Rate Module
//!
//! 稼働率シートから稼働台数を読み取り、故障率を計算するモジュール。

use chrono::NaiveDate;
use tracing::info;

use crate::api::{utilization_sheet_name, HOURS_PER_DAY, USED_OHTS_COLUMN};
use crate::error::{ErrStatError, Result};
use crate::formatter::format_percent;
use crate::grid::WorkbookGrid;
use crate::types::UtilizationRecord;

/// 日次レポートの故障率の小数点以下桁数
pub const DAILY_RATE_DECIMALS: usize = 2;

/// 週次レポートのデータ行の故障率・稼働率の数値書式
pub const DAILY_RATE_FORMAT: &str = "0.00%";

/// 週次平均の故障率の数値書式
pub const WEEKLY_RATE_FORMAT: &str = "0.00000%";

/// `{sheet_date}_Utilization`シートのデータ1行目から稼働台数を読み取る
///
/// # 戻り値
///
/// * `Ok(UtilizationRecord)` - 稼働台数が正の有限値の場合
/// * `Err(ErrStatError::MissingSheet)` - シートが存在しない場合
/// * `Err(ErrStatError::Schema)` - `Used OHTs`列が存在しない場合
/// * `Err(ErrStatError::InvalidUtilization)` - 値が欠損・非数値・0以下の場合
pub fn read_utilization(workbook: &WorkbookGrid, sheet_date: NaiveDate) -> Result<UtilizationRecord> {
    let sheet_name = utilization_sheet_name(sheet_date);
    let sheet = workbook.require_sheet(&sheet_name)?;
    let col = sheet.require_columns(&[USED_OHTS_COLUMN])?[0];

    let cell = sheet.cell(1, col);
    match cell.as_f64() {
        Some(used_ohts) if used_ohts > 0.0 => Ok(UtilizationRecord { used_ohts }),
        _ => Err(ErrStatError::InvalidUtilization {
            sheet: sheet_name,
            value: if cell.is_empty() {
                "<empty>".to_string()
            } else {
                cell.to_display_string()
            },
        }),
    }
}

/// 故障率を計算（`total_count / (used_ohts * 24)`）
///
/// `UtilizationRecord`の不変条件により分母は常に正です。
pub fn failure_rate(total_count: usize, utilization: UtilizationRecord) -> f64 {
    let rate = total_count as f64 / (utilization.used_ohts * HOURS_PER_DAY);
    info!(
        "Failure rate: {} / ({} * {}) = {}",
        total_count, utilization.used_ohts, HOURS_PER_DAY, rate
    );
    rate
}

/// 日次レポート用の表示文字列（小数点以下2桁）
pub fn daily_display(rate: f64) -> String {
    format_percent(rate, DAILY_RATE_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SheetGrid;
    use crate::types::CellValue;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()
    }

    fn workbook_with(value: CellValue) -> WorkbookGrid {
        WorkbookGrid::new(vec![SheetGrid::from_rows(
            "20250105_Utilization",
            vec![
                vec![
                    CellValue::Text("Total OHTs".to_string()),
                    CellValue::Text("Used OHTs".to_string()),
                ],
                vec![CellValue::Number(12.0), value],
            ],
        )])
    }

    #[test]
    fn test_failure_rate_formula() {
        let rate = failure_rate(24, UtilizationRecord { used_ohts: 10.0 });
        assert_eq!(rate, 24.0 / (10.0 * 24.0));
        assert_eq!(daily_display(rate), "10.00%");
    }

    #[test]
    fn test_read_utilization() {
        let util = read_utilization(&workbook_with(CellValue::Number(10.0)), date()).unwrap();
        assert_eq!(util.used_ohts, 10.0);

        let util =
            read_utilization(&workbook_with(CellValue::Text("8".to_string())), date()).unwrap();
        assert_eq!(util.used_ohts, 8.0);
    }

    #[test]
    fn test_missing_sheet() {
        let other_day = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        match read_utilization(&workbook_with(CellValue::Number(10.0)), other_day) {
            Err(ErrStatError::MissingSheet(name)) => assert_eq!(name, "20250106_Utilization"),
            other => panic!("Expected MissingSheet, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_used_ohts_rejected() {
        for value in [
            CellValue::Number(0.0),
            CellValue::Number(-3.0),
            CellValue::Empty,
            CellValue::Text("n/a".to_string()),
        ] {
            assert!(matches!(
                read_utilization(&workbook_with(value), date()),
                Err(ErrStatError::InvalidUtilization { .. })
            ));
        }
    }

    #[test]
    fn test_missing_column() {
        let workbook = WorkbookGrid::new(vec![SheetGrid::from_rows(
            "20250105_Utilization",
            vec![vec![CellValue::Text("Total OHTs".to_string())]],
        )]);
        assert!(matches!(
            read_utilization(&workbook, date()),
            Err(ErrStatError::Schema { .. })
        ));
    }
}
