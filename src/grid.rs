//! Grid Module
//!
//! 読み込んだワークブックの値をメモリ上で保持するためのグリッド構造を提供するモジュール。
//! 処理段階はこのモデルを読み取り、書き戻しは[`crate::output::WorkbookPackage`]が行います。

use std::collections::HashMap;

use crate::error::{ErrStatError, Result};
use crate::types::{CellCoord, CellValue};

static EMPTY_CELL: CellValue = CellValue::Empty;

/// 1シート分の稠密なグリッド（A1起点）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetGrid {
    /// シート名
    pub name: String,

    /// グリッドデータ（行 × 列）。行ごとに長さが異なってもよい
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetGrid {
    /// 空のシートを生成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// 行データからシートを生成
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// スパースなセルデータから稠密なグリッド構造を構築
    ///
    /// 座標はシート上の絶対位置（0始まり）です。空セルは埋められます。
    pub(crate) fn from_cells(name: impl Into<String>, cells: Vec<(CellCoord, CellValue)>) -> Self {
        let mut rows: Vec<Vec<CellValue>> = Vec::new();

        for (coord, value) in cells {
            if value == CellValue::Empty {
                continue;
            }
            let (row, col) = (coord.row as usize, coord.col as usize);
            if rows.len() <= row {
                rows.resize_with(row + 1, Vec::new);
            }
            let cols = &mut rows[row];
            if cols.len() <= col {
                cols.resize(col + 1, CellValue::Empty);
            }
            cols[col] = value;
        }

        Self {
            name: name.into(),
            rows,
        }
    }

    /// セルを取得（範囲外は空セル）
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// ヘッダー行（1行目）の列名
    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| {
                row.iter()
                    .map(|c| c.to_display_string().trim().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 列名から列インデックスを取得（同名の列は先頭を優先）
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers().iter().position(|h| h == header)
    }

    /// 必須列のインデックスを取得
    ///
    /// 1つでも欠けている場合は、欠けている列をすべて（ソート済みで）含む
    /// `ErrStatError::Schema`を返します。
    pub fn require_columns(&self, required: &[&str]) -> Result<Vec<usize>> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, header) in self.headers().into_iter().enumerate() {
            index.entry(header).or_insert(i);
        }

        let mut missing: Vec<String> = required
            .iter()
            .filter(|name| !index.contains_key(**name))
            .map(|name| name.to_string())
            .collect();

        if !missing.is_empty() {
            missing.sort();
            return Err(ErrStatError::Schema {
                sheet: self.name.clone(),
                missing,
            });
        }

        Ok(required.iter().map(|name| index[*name]).collect())
    }

    /// データ行（ヘッダー行を除く）
    pub fn data_rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().skip(1).map(|r| r.as_slice())
    }

    /// 列数（最も長い行の長さ）
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }
}

/// ワークブック全体（シート順を保持）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkbookGrid {
    pub sheets: Vec<SheetGrid>,
}

impl WorkbookGrid {
    pub fn new(sheets: Vec<SheetGrid>) -> Self {
        Self { sheets }
    }

    /// シート名の一覧（ワークブック上の順序）
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| s.name == name)
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetGrid> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// シートを取得（存在しない場合は`ErrStatError::MissingSheet`）
    pub fn require_sheet(&self, name: &str) -> Result<&SheetGrid> {
        self.sheet(name)
            .ok_or_else(|| ErrStatError::MissingSheet(name.to_string()))
    }
}
