//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use chrono::{NaiveDate, NaiveDateTime};

/// セルの値を表す列挙型
///
/// ワークブックをメモリ上で保持・書き戻すための表現です。
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// 空セル
    #[default]
    Empty,

    /// 数値（f64）
    Number(f64),

    /// 文字列
    Text(String),

    /// 論理値
    Bool(bool),

    /// 日付（`yyyy-mm-dd`形式で書き出す）
    Date(NaiveDate),

    /// 日時（`yyyy-mm-dd hh:mm:ss`形式で書き出す）
    DateTime(NaiveDateTime),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 数式（数式文字列とキャッシュされた結果の表示値）
    Formula { expr: String, cached: String },
}

impl CellValue {
    /// 値が空かどうかを判定
    ///
    /// 空白のみの文字列も空として扱います。
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 値を表示用の文字列として取得
    ///
    /// 整数値の数値は小数点以下を付けずに出力します（`1002.0` → `"1002"`）。
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Formula { cached, .. } => cached.clone(),
        }
    }

    /// 値を数値として取得
    ///
    /// 数値セル、数値として解釈できる文字列、数式のキャッシュ値が対象です。
    /// 非有限値（NaN, ∞）は`None`になります。
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Formula { cached, .. } => cached.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }
}

/// 数値を表示用文字列に変換（整数値は小数点なし）
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    pub fn to_a1_notation(self) -> String {
        let col_str = Self::col_index_to_letter(self.col);
        format!("{}{}", col_str, self.row + 1)
    }

    /// A1形式の文字列から座標を取得（`"$"`付きの絶対参照も可）
    pub fn from_a1_notation(s: &str) -> Option<Self> {
        let s = s.trim().replace('$', "");
        let split = s.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
            return None;
        }

        let mut col = 0u32;
        for b in letters.bytes() {
            let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
            col = col.checked_mul(26)?.checked_add(digit)?;
        }
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row - 1, col - 1))
    }

    /// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
    pub(crate) fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}

/// エラーログの1行
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub error_message: String,
    /// 解析できなかった日時は`None`
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub error_level: String,
    pub error_code: String,
}

/// 同一エラーメッセージを持つレコードのグループ
///
/// `records`は`start_time`の昇順（`None`は末尾）に安定ソート済みです。
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorGroup {
    pub message: String,
    pub records: Vec<ErrorRecord>,
}

impl ErrorGroup {
    /// グループ内のレコード数
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// 最も早い開始時刻（すべて欠損なら`None`）
    pub fn min_start(&self) -> Option<NaiveDateTime> {
        self.records.iter().filter_map(|r| r.start_time).min()
    }

    /// 最も遅い終了時刻（すべて欠損なら`None`）
    pub fn max_end(&self) -> Option<NaiveDateTime> {
        self.records.iter().filter_map(|r| r.end_time).max()
    }
}

/// エラー統計シートの1行
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRow {
    /// グループの集計行
    Summary {
        message: String,
        min_start: Option<NaiveDateTime>,
        max_end: Option<NaiveDateTime>,
        count: usize,
    },

    /// グループの明細行（メッセージと件数は空欄）
    Detail {
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    },

    /// 合計件数行
    Total { count: usize },

    /// 故障率行（`"10.00%"`形式の表示文字列）
    FailureRate { display: String },
}

/// エラー統計シートの内容
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatisticsReport {
    pub rows: Vec<ReportRow>,
    /// 全グループの件数の合計
    pub total_count: usize,
    /// グループ数
    pub group_count: usize,
}

/// 稼働率シートから読み取った稼働台数
///
/// 不変条件: `used_ohts > 0` かつ有限値
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationRecord {
    pub used_ohts: f64,
}

/// 週次レポートの`Date`列の値
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WeeklyDate {
    /// 日付として解釈できた値
    Date(NaiveDate),
    /// `"Weekly Avg"`ラベル
    WeeklyAvg,
    /// 日付として解釈できなかった値（照合時はスキップ）
    Other(CellValue),
    /// 空欄
    #[default]
    Empty,
}

/// 週次レポートの列
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeeklyColumn {
    Date,
    AvgExecutePeriod,
    OhtUtilization,
    FailureRate,
    TransferCount,
    /// 既知の列以外（セルには触れない）
    Extra(String),
}

/// 週次レポートの1行
///
/// パーセンテージはすべて割合（`0.1` = 10%）で保持します。
/// 解釈できなかったセルは`None`になりますが、シート上の元の値は
/// 書き戻しの対象にならないためそのまま残ります。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeeklyReportRow {
    /// シート上の行（0始まり、ヘッダー行が0）
    pub row: usize,
    pub date: WeeklyDate,
    pub avg_execute_period: Option<f64>,
    pub oht_utilization: Option<f64>,
    pub failure_rate: Option<f64>,
    pub transfer_count: Option<f64>,
}

impl WeeklyReportRow {
    /// 週次平均行かどうか
    pub fn is_weekly_avg(&self) -> bool {
        matches!(self.date, WeeklyDate::WeeklyAvg)
    }
}

/// 週次レポートシートの内容
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeeklyReport {
    /// 元のヘッダー順の列定義
    pub columns: Vec<WeeklyColumn>,
    /// 空行を除いたデータ行（シート上の順序）
    pub rows: Vec<WeeklyReportRow>,
}

impl WeeklyReport {
    /// 列の位置（0始まり）
    pub fn column_index(&self, column: &WeeklyColumn) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}
