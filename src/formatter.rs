//! Formatter Module
//!
//! セル値と日時・パーセンテージの相互変換を担当するモジュール。
//! 入力側は寛容に解釈し（解釈できない値は`None`）、
//! 出力側の書式はこのモジュールに集約します。

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::CellValue;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// 1900年システムで架空の1900年2月29日にあたるシリアル値
const LEAP_BUG_SERIAL: f64 = 60.0;

/// 日時文字列として受け付ける書式（先頭から順に試行）
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// 日付のみの文字列として受け付ける書式
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Excelシリアル値と日時の変換器
///
/// # エポックシステム
///
/// - 1900年システム（デフォルト）: シリアル値1 = 1900年1月1日
///   - Excelは存在しない1900年2月29日をシリアル値60として数えるため、
///     60未満は1日ずらして換算し、60そのものは`None`
/// - 1904年システム: 1904年1月1日起算
///   - Mac版Excelで使用される
///   - シリアル値0 = 1904年1月1日
#[derive(Debug, Clone, Copy, Default)]
pub struct DateConverter {
    is_1904: bool,
}

impl DateConverter {
    pub fn new(is_1904: bool) -> Self {
        Self { is_1904 }
    }

    fn epoch(&self) -> NaiveDateTime {
        let date = if self.is_1904 {
            NaiveDate::from_ymd_opt(1904, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(1899, 12, 30)
        };
        date.unwrap_or_default().and_time(NaiveTime::MIN)
    }

    /// シリアル値を日時に変換
    ///
    /// 負の値・非有限値・範囲外は`None`。時刻はミリ秒単位で丸めます。
    pub fn serial_to_datetime(&self, serial: f64) -> Option<NaiveDateTime> {
        if !serial.is_finite() || serial < 0.0 {
            return None;
        }
        let mut days_offset = 0;
        if !self.is_1904 {
            if serial.floor() == LEAP_BUG_SERIAL {
                return None;
            }
            if serial < LEAP_BUG_SERIAL {
                days_offset = 1;
            }
        }
        let millis = (serial * MILLIS_PER_DAY).round();
        if millis > i64::MAX as f64 {
            return None;
        }
        self.epoch()
            .checked_add_signed(Duration::days(days_offset))?
            .checked_add_signed(Duration::milliseconds(millis as i64))
    }

    /// 日時をこのワークブックの日付システムのシリアル値に変換
    pub fn datetime_to_serial(&self, dt: NaiveDateTime) -> f64 {
        let serial = (dt - self.epoch()).num_milliseconds() as f64 / MILLIS_PER_DAY;
        // 1900年3月1日より前はExcelの数え方より1日多い
        if !self.is_1904 && serial < LEAP_BUG_SERIAL + 1.0 {
            serial - 1.0
        } else {
            serial
        }
    }

    /// セル値を日時として寛容に解釈
    ///
    /// - 日時セル: そのまま
    /// - 数値セル: Excelシリアル値（0以下は無効）
    /// - 文字列: `DATETIME_FORMATS`、`DATE_FORMATS`の順に試行
    /// - 数式: キャッシュ値を文字列または数値として解釈
    pub fn parse_timestamp(&self, cell: &CellValue) -> Option<NaiveDateTime> {
        match cell {
            CellValue::DateTime(dt) => Some(*dt),
            CellValue::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            CellValue::Number(n) if *n > 0.0 => self.serial_to_datetime(*n),
            CellValue::Text(s) => parse_datetime_str(s),
            CellValue::Formula { cached, .. } => parse_datetime_str(cached).or_else(|| {
                cached
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| *n > 0.0)
                    .and_then(|n| self.serial_to_datetime(n))
            }),
            _ => None,
        }
    }

    /// セル値を日付として寛容に解釈
    pub fn parse_date(&self, cell: &CellValue) -> Option<NaiveDate> {
        self.parse_timestamp(cell).map(|dt| dt.date())
    }
}

/// `YYYYMMDD`形式の8桁の数字を日付として解釈
pub(crate) fn parse_compact_date(digits: &str) -> Option<NaiveDate> {
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = digits[0..4].parse().ok()?;
    let month = digits[4..6].parse().ok()?;
    let day = digits[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// 日時文字列を解釈（日付のみの場合は0時）
pub(crate) fn parse_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// 割合をパーセンテージ文字列に変換
///
/// ```text
/// format_percent(0.1, 2)      -> "10.00%"
/// format_percent(0.000123, 5) -> "0.01230%"
/// ```
pub(crate) fn format_percent(fraction: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, fraction * 100.0)
}

/// セル値をパーセンテージポイントとして解釈
///
/// 末尾の`%`を取り除いた文字列、または数値をそのまま返します。
/// `"85.5%"`、`"85.5"`、`85.5`はいずれも`85.5`になります。
pub(crate) fn parse_percent_points(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Text(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite()),
        other => other.as_f64(),
    }
}

/// セル値を文字列として取得（前後の空白を除去）
pub(crate) fn cell_to_text(cell: &CellValue) -> String {
    cell.to_display_string().trim().to_string()
}
