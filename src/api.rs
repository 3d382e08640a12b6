//! Public API Types
//!
//! 公開APIで使用する列挙型と、ワークブック上のシート名・列名の定数を定義するモジュール。

use chrono::NaiveDate;

/// 週次レポートシート名
pub const WEEKLY_REPORT_SHEET: &str = "Weekly_Report";

/// 週次平均行の`Date`列に入るラベル
pub const WEEKLY_AVG_LABEL: &str = "Weekly Avg";

/// 稼働率シート名の接尾辞（`{sheet_date}_Utilization`）
pub const UTILIZATION_SUFFIX: &str = "_Utilization";

/// エラー統計シート名の接尾辞（`{sheet_date}_errorStatistics`）
pub const STATISTICS_SUFFIX: &str = "_errorStatistics";

/// シート名に埋め込む日付の書式
pub const SHEET_DATE_FORMAT: &str = "%Y%m%d";

/// 故障率の分母に掛ける1日あたりの時間数
pub const HOURS_PER_DAY: f64 = 24.0;

/// エラーログの必須列
pub const REQUIRED_LOG_COLUMNS: [&str; 5] = [
    "ERROR_MESSAGE",
    "START_TIME",
    "END_TIME",
    "ERROR_LEVEL",
    "ERROR_CODE",
];

/// 稼働率シートの稼働台数列
pub const USED_OHTS_COLUMN: &str = "Used OHTs";

/// 日付からエラー統計シート名を生成する
///
/// # 使用例
///
/// ```rust
/// use chrono::NaiveDate;
/// use errstat::statistics_sheet_name;
///
/// let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
/// assert_eq!(statistics_sheet_name(date), "20250309_errorStatistics");
/// ```
pub fn statistics_sheet_name(sheet_date: NaiveDate) -> String {
    format!("{}{}", sheet_date.format(SHEET_DATE_FORMAT), STATISTICS_SUFFIX)
}

/// 日付から稼働率シート名を生成する
pub fn utilization_sheet_name(sheet_date: NaiveDate) -> String {
    format!("{}{}", sheet_date.format(SHEET_DATE_FORMAT), UTILIZATION_SUFFIX)
}

/// レポート対象日（シート日付）の決定方式
///
/// 入力ファイル名の日付とレポート対象日の関係を指定します。
/// 基準日（reference date）は通常、実行日のローカル日付です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum DateSource {
    /// 指定された日付をそのまま使用
    ///
    /// 例: `DateSource::Explicit(2025-01-05)` → シート日付 `20250105`
    Explicit(NaiveDate),

    /// 入力ファイル名に埋め込まれた`20YYMMDD`の前日（デフォルト）
    ///
    /// ファイル名に有効な日付が含まれない場合は、基準日の前日を使用します。
    ///
    /// 例: `ErrorTimeStatistics_20250106.xlsx` → シート日付 `20250105`
    #[default]
    FromFileName,

    /// 基準日の前日
    ///
    /// 入力ファイル名は無視されます。
    Yesterday,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_names() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(statistics_sheet_name(date), "20241231_errorStatistics");
        assert_eq!(utilization_sheet_name(date), "20241231_Utilization");
    }

    #[test]
    fn test_default_date_source() {
        assert_eq!(DateSource::default(), DateSource::FromFileName);
    }
}
