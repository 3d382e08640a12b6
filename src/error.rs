//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use std::path::PathBuf;
use thiserror::Error;

/// errstatクレート全体で使用するエラー型
///
/// 入力ファイルの探索、エラーログの読み込み、集計、ワークブックへの書き戻しの
/// いずれかの段階で発生したエラーを統一的に扱います。
/// すべてのエラーは致命的であり、パイプラインはその時点で中断されます。
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー
/// - `Parse`: スプレッドシートの解析中に発生したエラー（calamine由来）
/// - `Write`: ワークブックの書き出し中に発生したエラー
/// - `Xml`: ワークブック内のXMLパートの読み書きで発生したエラー（quick-xml由来）
/// - `Schema`: 必須列が存在しない
/// - `MissingSheet`: 必要なシートがワークブックに存在しない
/// - `InputNotFound`: 入力ファイルが見つからない
/// - `InvalidUtilization`: 稼働台数が0・欠損・非数値で故障率を計算できない
///
/// # 使用例
///
/// ```rust,no_run
/// use errstat::ErrStatError;
/// use std::fs::File;
///
/// fn open_log(path: &str) -> Result<(), ErrStatError> {
///     let _file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum ErrStatError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// スプレッドシートの解析中に発生したエラー
    ///
    /// ファイル形式が不正、破損したファイルなどが原因となります。
    #[error("Failed to parse spreadsheet: {0}")]
    Parse(#[from] calamine::Error),

    /// ワークブックの書き出し中に発生したエラー
    ///
    /// 書き換えに必要なパート（`xl/workbook.xml`のシート一覧など）が
    /// 壊れている場合に発生します。
    #[error("Failed to write workbook: {0}")]
    Write(String),

    /// XMLパートの解析・生成エラー
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// UTF-8文字列の変換エラー
    ///
    /// `xl/workbook.xml`の属性値の解析時に発生します。
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// 必須列が存在しない（SchemaError）
    ///
    /// `missing`はソート済みの欠損列名の一覧です。
    #[error("Missing columns in sheet '{sheet}': {}", missing.join(", "))]
    Schema {
        /// 対象シート名
        sheet: String,
        /// 見つからなかった列名
        missing: Vec<String>,
    },

    /// 必要なシートがワークブックに存在しない（MissingSheetError）
    #[error("Sheet '{0}' not found")]
    MissingSheet(String),

    /// 入力ファイルが見つからない（LookupError）
    #[error("No input file matching '{pattern}' found in {}", dir.display())]
    InputNotFound {
        /// 探索したディレクトリ
        dir: PathBuf,
        /// 探索に使用したファイル名またはプレフィックス
        pattern: String,
    },

    /// 稼働台数が不正で故障率を計算できない（ArithmeticError）
    #[error("Invalid 'Used OHTs' value in sheet '{sheet}': {value}")]
    InvalidUtilization {
        /// 稼働率シート名
        sheet: String,
        /// セルの内容（表示用）
        value: String,
    },

    /// 設定の検証に失敗したエラー
    ///
    /// `ProcessorBuilder::build()`時の検証失敗や、XML解析エラーで使用されます。
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// 入力ファイルサイズ制限、ZIP bomb、パストラバーサルなどの
    /// 制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

/// errstat全体で使用するResult型
pub type Result<T> = std::result::Result<T, ErrStatError>;
