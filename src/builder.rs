//! Builder Module
//!
//! Fluent Builder APIを提供し、`ErrorLogProcessor`インスタンスを段階的に構築する。

use std::path::Path;

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::aggregate::aggregate;
use crate::api::{statistics_sheet_name, DateSource, WEEKLY_REPORT_SHEET};
use crate::discovery::resolve_sheet_date;
use crate::error::{ErrStatError, Result};
use crate::failure_rate::{daily_display, failure_rate, read_utilization};
use crate::formatter::DateConverter;
use crate::grid::{SheetGrid, WorkbookGrid};
use crate::output::{statistics_sheet, weekly_edit, WorkbookPackage};
use crate::parser::{load_error_records, read_input, WorkbookParser};
use crate::security::SecurityConfig;
use crate::weekly::{parse_weekly_report, update_weekly_report};

/// Excelで表現可能な年の範囲
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 9999;

/// 処理の設定を保持する内部構造体
#[derive(Debug, Clone, Default)]
pub(crate) struct ProcessingConfig {
    /// シート日付の決定方式
    pub date_source: DateSource,

    /// エラー統計シートに合計行を出力するか
    pub emit_total_row: bool,

    /// 基準日（Noneの場合はビルド時のローカル日付）
    pub reference_date: Option<NaiveDate>,

    /// セキュリティ設定
    pub security_config: SecurityConfig,
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use errstat::{DateSource, ProcessorBuilder};
///
/// # fn main() -> Result<(), errstat::ErrStatError> {
/// let processor = ProcessorBuilder::new()
///     .with_date_source(DateSource::Yesterday)
///     .with_total_row(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ProcessorBuilder {
    /// 内部設定（構築中）
    config: ProcessingConfig,
}

impl ProcessorBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - シート日付: 入力ファイル名の日付の前日（`DateSource::FromFileName`）
    /// - 合計行: 出力しない
    /// - 基準日: 実行時のローカル日付
    pub fn new() -> Self {
        Self::default()
    }

    /// シート日付の決定方式を指定する
    pub fn with_date_source(mut self, source: DateSource) -> Self {
        self.config.date_source = source;
        self
    }

    /// エラー統計シートの末尾に`Total`行を出力するかを指定する
    pub fn with_total_row(mut self, emit: bool) -> Self {
        self.config.emit_total_row = emit;
        self
    }

    /// 基準日を指定する（`FromFileName`のフォールバックと`Yesterday`で使用）
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.config.reference_date = Some(date);
        self
    }

    /// セキュリティ設定を指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use errstat::{ProcessorBuilder, SecurityConfig};
    ///
    /// let builder = ProcessorBuilder::new().with_security_config(SecurityConfig {
    ///     max_input_file_size: 50 * 1024 * 1024,
    ///     ..SecurityConfig::default()
    /// });
    /// ```
    pub fn with_security_config(mut self, config: SecurityConfig) -> Self {
        self.config.security_config = config;
        self
    }

    /// 設定を検証し、`ErrorLogProcessor`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `ErrStatError::Config(String)`: 設定の検証に失敗した場合
    ///   * 指定日・基準日がExcelで表現できない年（1900〜9999の範囲外）
    ///   * セキュリティ設定の上限に0が含まれる
    pub fn build(self) -> Result<ErrorLogProcessor> {
        // 1. 日付の検証
        let reference_date = self
            .config
            .reference_date
            .unwrap_or_else(|| Local::now().date_naive());
        check_year(reference_date, "Reference date")?;

        if let DateSource::Explicit(date) = self.config.date_source {
            check_year(date, "Sheet date")?;
        }

        // 2. セキュリティ設定の検証
        self.config.security_config.validate()?;

        Ok(ErrorLogProcessor {
            config: self.config,
            reference_date,
        })
    }
}

fn check_year(date: NaiveDate, what: &str) -> Result<()> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(ErrStatError::Config(format!(
            "{} {} is outside the supported range ({}-{})",
            what, date, MIN_YEAR, MAX_YEAR
        )));
    }
    Ok(())
}

/// 1回の実行結果の要約
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// レポート対象日
    pub sheet_date: NaiveDate,
    /// 書き込んだエラー統計シート名
    pub statistics_sheet: String,
    /// エラーメッセージのグループ数
    pub group_count: usize,
    /// 集計対象のエラー件数
    pub total_count: usize,
    /// 稼働台数
    pub used_ohts: f64,
    /// 故障率（割合）
    pub failure_rate: f64,
    /// 故障率を書き込んだ週次レポートのデータ行（0始まり）
    pub weekly_row_updated: Option<usize>,
    /// 更新後の週次レポートのデータ行数（`Weekly Avg`行を含む）
    pub weekly_row_count: usize,
    /// 保存後のシート順
    pub sheet_order: Vec<String>,
}

/// エラーログ処理のファサード
///
/// エラーログを集計し、レポートワークブックのエラー統計シートと
/// 週次レポートを更新します。ワークブックはメモリ上で更新され、
/// すべての段階が成功した場合にのみ1回だけ書き出されます。
/// 処理で触れないシートやセルの書式はそのまま残ります。
///
/// # 使用例
///
/// ```rust,no_run
/// use std::path::Path;
/// use errstat::ProcessorBuilder;
///
/// # fn main() -> Result<(), errstat::ErrStatError> {
/// let processor = ProcessorBuilder::new().build()?;
/// let summary = processor.run(
///     Path::new("data/ErrorTimeStatistics_20250106.xlsx"),
///     Path::new("output/OHT_Daily_Report.xlsx"),
/// )?;
/// println!("{}: {}", summary.statistics_sheet, summary.total_count);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ErrorLogProcessor {
    /// 処理設定
    config: ProcessingConfig,

    /// 基準日
    reference_date: NaiveDate,
}

impl ErrorLogProcessor {
    /// 基準日
    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// 入力ファイル名からシート日付を決定
    pub fn resolve_sheet_date(&self, input_name: &str) -> NaiveDate {
        resolve_sheet_date(self.config.date_source, input_name, self.reference_date)
    }

    /// ファイルを読み込み、処理し、ワークブックをアトミックに保存する
    ///
    /// # 引数
    ///
    /// * `input_path` - エラーログファイル（先頭シートを使用）
    /// * `workbook_path` - 更新するレポートワークブック
    ///
    /// # 戻り値
    ///
    /// * `Ok(RunSummary)` - すべての段階が成功し、保存した場合
    /// * `Err(ErrStatError)` - いずれかの段階が失敗した場合（ワークブックは変更されない）
    pub fn run(&self, input_path: &Path, workbook_path: &Path) -> Result<RunSummary> {
        let security = &self.config.security_config;

        let mut input = WorkbookParser::open_path(input_path, security)?;
        let log_sheet = input.read_first_sheet()?;
        let log_converter = input.converter();

        let workbook = read_input(workbook_path, security)?;
        let input_name = file_name_of(input_path);
        let (package, summary) =
            self.process_workbook(&log_sheet, log_converter, workbook, &input_name)?;

        package.save_atomic(workbook_path)?;
        Ok(summary)
    }

    /// メモリ上のバイト列を処理し、更新後のワークブックを返す
    ///
    /// # 引数
    ///
    /// * `input` - エラーログファイルのバイト列
    /// * `input_name` - 入力ファイル名（`DateSource::FromFileName`で使用）
    /// * `workbook` - レポートワークブック（xlsx / xlsm）のバイト列
    pub fn process_buffers(
        &self,
        input: Vec<u8>,
        input_name: &str,
        workbook: Vec<u8>,
    ) -> Result<(Vec<u8>, RunSummary)> {
        let security = &self.config.security_config;

        let mut input = WorkbookParser::from_bytes(input, security)?;
        let log_sheet = input.read_first_sheet()?;
        let log_converter = input.converter();

        let (package, summary) =
            self.process_workbook(&log_sheet, log_converter, workbook, input_name)?;
        Ok((package.to_bytes()?, summary))
    }

    /// レポートワークブックを開いて処理する
    ///
    /// パッケージとして開けない形式（xls / xlsb / ods）はcalamineで読む前に拒否します。
    fn process_workbook(
        &self,
        log_sheet: &SheetGrid,
        log_converter: DateConverter,
        workbook: Vec<u8>,
        input_name: &str,
    ) -> Result<(WorkbookPackage, RunSummary)> {
        let security = &self.config.security_config;

        let mut package = WorkbookPackage::open(&workbook, security)?;
        let mut target = WorkbookParser::from_bytes(workbook, security)?;
        let grid = target.read_all()?;
        let workbook_converter = target.converter();

        let summary = self.process(
            log_sheet,
            log_converter,
            &grid,
            workbook_converter,
            &mut package,
            input_name,
        )?;
        Ok((package, summary))
    }

    /// 処理パイプライン本体
    ///
    /// 1. エラーレコードの読み込み
    /// 2. 抽出・集計
    /// 3. シート日付と稼働台数の決定
    /// 4. 故障率の計算
    /// 5. エラー統計シートの作成（同名シートは置換）
    /// 6. 週次レポートの更新（対象セルと平均行のみ）
    /// 7. 週次レポートを末尾へ移動
    fn process(
        &self,
        log_sheet: &SheetGrid,
        log_converter: DateConverter,
        workbook: &WorkbookGrid,
        workbook_converter: DateConverter,
        package: &mut WorkbookPackage,
        input_name: &str,
    ) -> Result<RunSummary> {
        // 1-2. 読み込みと集計
        let records = load_error_records(log_sheet, log_converter)?;
        let mut report = aggregate(&records, self.config.emit_total_row);

        // 3. メタデータ
        let sheet_date = self.resolve_sheet_date(input_name);
        info!("Sheet date: {}", sheet_date);
        let utilization = read_utilization(workbook, sheet_date)?;

        // 4. 故障率
        let rate = failure_rate(report.total_count, utilization);

        // 5. エラー統計シート
        report.push_failure_rate(daily_display(rate));
        let statistics_name = statistics_sheet_name(sheet_date);
        package.write_sheet(&statistics_sheet(&report, &statistics_name), workbook_converter)?;
        info!(
            "Exported {} rows to sheet '{}'",
            report.rows.len(),
            statistics_name
        );

        // 6. 週次レポート
        let mut weekly =
            parse_weekly_report(workbook.require_sheet(WEEKLY_REPORT_SHEET)?, workbook_converter)?;
        let update = update_weekly_report(&mut weekly, sheet_date, rate);
        package.patch_sheet(WEEKLY_REPORT_SHEET, &weekly_edit(&weekly, &update))?;

        // 7. 並べ替え
        package.move_to_end(WEEKLY_REPORT_SHEET);

        Ok(RunSummary {
            sheet_date,
            statistics_sheet: statistics_name,
            group_count: report.group_count,
            total_count: report.total_count,
            used_ohts: utilization.used_ohts,
            failure_rate: rate,
            // ヘッダー行を除いたデータ行の位置
            weekly_row_updated: update.matched_row.map(|row| row.saturating_sub(1)),
            weekly_row_count: weekly.rows.len(),
            sheet_order: package.sheet_names(),
        })
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
