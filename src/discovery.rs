//! Input Discovery Module
//!
//! 入力ファイルの探索とレポート対象日（シート日付）の決定を行うモジュール。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use tracing::{debug, info};

use crate::api::DateSource;
use crate::error::{ErrStatError, Result};
use crate::formatter::parse_compact_date;

/// デフォルトの入力ディレクトリ
pub const DEFAULT_INPUT_DIR: &str = "data";

/// デフォルトの入力ファイル名
pub const DEFAULT_INPUT_FILE: &str = "ErrorTimeStatistics.xlsx";

/// デフォルトの入力ファイル名の接頭辞
pub const DEFAULT_INPUT_PREFIX: &str = "ErrorTimeStatistics";

/// 入力として受け付ける拡張子（calamineが読み込める形式）
pub const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"20\d{6}").expect("date pattern is a valid regex"))
}

/// ファイル名に埋め込まれた最初の有効な`20YYMMDD`日付を取得
///
/// ```
/// use chrono::NaiveDate;
/// use errstat::file_date;
///
/// assert_eq!(
///     file_date("ErrorTimeStatistics_20250106.xlsx"),
///     NaiveDate::from_ymd_opt(2025, 1, 6)
/// );
/// assert_eq!(file_date("ErrorTimeStatistics.xlsx"), None);
/// ```
pub fn file_date(name: &str) -> Option<NaiveDate> {
    date_pattern()
        .find_iter(name)
        .find_map(|m| parse_compact_date(m.as_str()))
}

/// レポート対象日を決定
///
/// * `Explicit(date)` - 指定日
/// * `FromFileName` - ファイル名の日付の前日（日付がなければ基準日の前日）
/// * `Yesterday` - 基準日の前日
pub fn resolve_sheet_date(source: DateSource, file_name: &str, reference: NaiveDate) -> NaiveDate {
    let previous = |date: NaiveDate| date - Duration::days(1);
    match source {
        DateSource::Explicit(date) => date,
        DateSource::FromFileName => match file_date(file_name) {
            Some(date) => previous(date),
            None => {
                debug!(
                    "No date in file name '{}', falling back to reference date {}",
                    file_name, reference
                );
                previous(reference)
            }
        },
        DateSource::Yesterday => previous(reference),
    }
}

/// 入力ファイルの探索器
///
/// 1. `dir/file_name`が存在すればそれを使用
/// 2. なければ`prefix`で始まるスプレッドシートファイルから、ファイル名の
///    日付が最も新しいもの（日付なしは日付ありより後回し、同順位は名前の大きい方）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLocator {
    pub dir: PathBuf,
    pub file_name: String,
    pub prefix: String,
}

impl Default for InputLocator {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_INPUT_DIR),
            file_name: DEFAULT_INPUT_FILE.to_string(),
            prefix: DEFAULT_INPUT_PREFIX.to_string(),
        }
    }
}

impl InputLocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// 入力ファイルのパスを決定
    ///
    /// # 戻り値
    ///
    /// * `Ok(PathBuf)` - 見つかった入力ファイル
    /// * `Err(ErrStatError::InputNotFound)` - 候補が1つもない場合
    /// * `Err(ErrStatError::Io)` - ディレクトリを読み込めない場合
    pub fn locate(&self) -> Result<PathBuf> {
        let exact = self.dir.join(&self.file_name);
        if exact.is_file() {
            info!("Using input file {}", exact.display());
            return Ok(exact);
        }

        let not_found = || ErrStatError::InputNotFound {
            dir: self.dir.clone(),
            pattern: format!("{}*.{{{}}}", self.prefix, SPREADSHEET_EXTENSIONS.join(",")),
        };

        if !self.dir.is_dir() {
            return Err(not_found());
        }

        let mut candidates: Vec<(Option<NaiveDate>, String)> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.is_candidate(&name) {
                debug!("Input candidate: {}", name);
                candidates.push((file_date(&name), name));
            }
        }

        // Option<NaiveDate>の順序はNone < Someなので、最大値が日付ありの最新
        let (_, name) = candidates.into_iter().max().ok_or_else(not_found)?;
        let path = self.dir.join(name);
        info!("Using input file {}", path.display());
        Ok(path)
    }

    fn is_candidate(&self, name: &str) -> bool {
        if !name.starts_with(&self.prefix) {
            return false;
        }
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                SPREADSHEET_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
            .unwrap_or(false)
    }
}
