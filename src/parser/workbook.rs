//! Workbook Parser
//!
//! calamineを使用したワークブック読み込みの実装。
//! シートをセル値と数式の両方を保持した`SheetGrid`へ変換します。

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};
use chrono::NaiveTime;
use tracing::debug;

use crate::error::{ErrStatError, Result};
use crate::formatter::{parse_datetime_str, DateConverter};
use crate::grid::{SheetGrid, WorkbookGrid};
use crate::parser::WorkbookMetadata;
use crate::security::SecurityConfig;
use crate::types::{CellCoord, CellValue};

/// ZIPローカルファイルヘッダーのシグネチャ
pub(crate) const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// ファイルを読み込む
///
/// ファイルサイズは読み込み前に`SecurityConfig::max_input_file_size`で検査します。
pub(crate) fn read_input(path: &Path, security_config: &SecurityConfig) -> Result<Vec<u8>> {
    let file_len = std::fs::metadata(path)?.len();
    security_config.check_input_size(file_len)?;

    let mut buffer = Vec::with_capacity(file_len as usize);
    File::open(path)?.read_to_end(&mut buffer)?;
    debug!("Read {} bytes from {}", buffer.len(), path.display());
    Ok(buffer)
}

/// ワークブックパーサー
///
/// calamineのラッパーとして、ワークブックレベルの操作を提供します。
/// XLSX / XLSM / XLSB / XLS / ODS のいずれも読み込めます。
pub(crate) struct WorkbookParser<RS: Read + Seek> {
    /// calamineのワークブック
    workbook: Sheets<RS>,
    /// シリアル値の変換器（1904年エポックを反映）
    converter: DateConverter,
}

impl WorkbookParser<Cursor<Vec<u8>>> {
    /// ファイルパスからワークブックを開く
    pub fn open_path(path: &Path, security_config: &SecurityConfig) -> Result<Self> {
        Self::from_bytes(read_input(path, security_config)?, security_config)
    }

    /// メモリ上のバイト列からワークブックを開く
    ///
    /// ZIPコンテナ（XLSX系・ODS）の場合は、先にアーカイブのセキュリティ検査と
    /// 1904年エポック判定を行います。
    pub fn from_bytes(buffer: Vec<u8>, security_config: &SecurityConfig) -> Result<Self> {
        security_config.check_input_size(buffer.len() as u64)?;

        let metadata = if buffer.starts_with(ZIP_MAGIC) {
            WorkbookMetadata::read(Cursor::new(buffer.as_slice()), security_config)?
        } else {
            WorkbookMetadata::default()
        };

        let workbook = open_workbook_auto_from_rs(Cursor::new(buffer))?;

        Ok(Self {
            workbook,
            converter: DateConverter::new(metadata.date1904()),
        })
    }
}

impl<RS: Read + Seek> WorkbookParser<RS> {
    /// すべてのシート名を取得（ワークブック上の順序）
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names().to_vec()
    }

    /// ワークブックの日時変換器
    pub fn converter(&self) -> DateConverter {
        self.converter
    }

    /// 先頭のシートを読み込む
    pub fn read_first_sheet(&mut self) -> Result<SheetGrid> {
        let name = self
            .sheet_names()
            .into_iter()
            .next()
            .ok_or(ErrStatError::Parse(calamine::Error::Msg(
                "Workbook contains no sheets",
            )))?;
        self.read_sheet(&name)
    }

    /// すべてのシートを順序どおりに読み込む
    pub fn read_all(&mut self) -> Result<WorkbookGrid> {
        let mut sheets = Vec::new();
        for name in self.sheet_names() {
            sheets.push(self.read_sheet(&name)?);
        }
        Ok(WorkbookGrid::new(sheets))
    }

    /// シートを読み込み、セル値と数式を`SheetGrid`に変換
    ///
    /// # 戻り値
    ///
    /// * `Ok(SheetGrid)` - A1起点の稠密なグリッド
    /// * `Err(ErrStatError::MissingSheet)` - シートが存在しない場合
    /// * `Err(ErrStatError::Parse)` - シートの解析に失敗した場合
    pub fn read_sheet(&mut self, sheet_name: &str) -> Result<SheetGrid> {
        if !self.sheet_names().iter().any(|n| n == sheet_name) {
            return Err(ErrStatError::MissingSheet(sheet_name.to_string()));
        }

        // 1. 値の取得
        let range = self.workbook.worksheet_range(sheet_name)?;

        // 2. 数式の取得（数式をサポートしない形式では空）
        // 数式範囲の起点は値の範囲と異なる場合があるため、絶対座標で対応付ける
        let mut formulas: HashMap<(u32, u32), String> = HashMap::new();
        if let Ok(formula_range) = self.workbook.worksheet_formula(sheet_name) {
            if let Some((start_row, start_col)) = formula_range.start() {
                for (row, col, formula) in formula_range.cells() {
                    if !formula.is_empty() {
                        formulas.insert(
                            (start_row + row as u32, start_col + col as u32),
                            formula.clone(),
                        );
                    }
                }
            }
        }

        // 3. セルデータの抽出
        let mut cells = Vec::new();
        if let Some((start_row, start_col)) = range.start() {
            for (row, col, data) in range.cells() {
                let key = (start_row + row as u32, start_col + col as u32);
                let value = self.convert_cell(data);
                let value = match formulas.remove(&key) {
                    Some(expr) => CellValue::Formula {
                        expr,
                        cached: value.to_display_string(),
                    },
                    None => value,
                };
                cells.push((CellCoord::new(key.0, key.1), value));
            }
        }

        // 値の範囲外にある数式（キャッシュ値なし）
        for ((row, col), expr) in formulas {
            cells.push((
                CellCoord::new(row, col),
                CellValue::Formula {
                    expr,
                    cached: String::new(),
                },
            ));
        }

        debug!("Read sheet '{}' ({} cells)", sheet_name, cells.len());
        Ok(SheetGrid::from_cells(sheet_name, cells))
    }

    /// calamineのセルデータを`CellValue`に変換
    fn convert_cell(&self, cell: &Data) -> CellValue {
        match cell {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) if s.is_empty() => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => {
                let serial = dt.as_f64();
                match self.converter.serial_to_datetime(serial) {
                    // 時刻部分のない値は日付セルとして保持
                    Some(dt) if dt.time() == NaiveTime::MIN => CellValue::Date(dt.date()),
                    Some(dt) => CellValue::DateTime(dt),
                    None => CellValue::Number(serial),
                }
            }
            Data::DateTimeIso(s) => parse_datetime_str(s)
                .map(CellValue::DateTime)
                .unwrap_or_else(|| CellValue::Text(s.clone())),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Error(e.to_string()),
            _ => CellValue::Empty,
        }
    }
}
