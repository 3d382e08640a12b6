//! Worksheet Parts
//!
//! ワークシートのXMLパートを生成・部分更新します。
//!
//! - [`render_worksheet`]: `SheetGrid`から新しいワークシートを生成
//! - [`patch_worksheet`]: 既存のワークシートの指定したセルと行だけを書き換え、
//!   それ以外（列幅、結合セル、条件付き書式、他のセルの値と書式）はそのまま残す

use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::iter::Peekable;

use chrono::NaiveTime;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ErrStatError, Result};
use crate::formatter::DateConverter;
use crate::grid::SheetGrid;
use crate::output::styles::{attr_value, name_prefix, StylesPart};
use crate::types::{CellCoord, CellValue};

/// 日付セルの数値書式
pub(crate) const DATE_FORMAT: &str = "yyyy-mm-dd";
/// 日時セルの数値書式
pub(crate) const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIP_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// シートに書き込むセルの値
#[derive(Debug, Clone, PartialEq)]
pub enum CellWrite {
    /// 数値。`format`を指定するとその数値書式のセル書式を適用する
    Number {
        value: f64,
        format: Option<&'static str>,
    },
    /// 文字列（インライン文字列として書き込む）
    Text(String),
    Bool(bool),
    /// 数式とキャッシュ値の表示文字列
    Formula { expr: String, cached: String },
    /// エラー値（`#N/A`など）
    Error(String),
}

impl CellWrite {
    /// 書式なしの数値
    pub fn number(value: f64) -> Self {
        CellWrite::Number {
            value,
            format: None,
        }
    }

    /// 数値書式付きの数値
    pub fn formatted(value: f64, format: &'static str) -> Self {
        CellWrite::Number {
            value,
            format: Some(format),
        }
    }

    /// セル値から変換（空セルは`None`）
    ///
    /// 日付・日時は`converter`の日付システムのシリアル値として書き込みます。
    pub fn from_value(value: &CellValue, converter: DateConverter) -> Option<Self> {
        let cell = match value {
            CellValue::Empty => return None,
            CellValue::Number(n) => CellWrite::number(*n),
            CellValue::Text(s) => CellWrite::Text(s.clone()),
            CellValue::Bool(b) => CellWrite::Bool(*b),
            CellValue::Date(d) => CellWrite::formatted(
                converter.datetime_to_serial(d.and_time(NaiveTime::MIN)),
                DATE_FORMAT,
            ),
            CellValue::DateTime(dt) => {
                CellWrite::formatted(converter.datetime_to_serial(*dt), DATETIME_FORMAT)
            }
            CellValue::Error(e) => CellWrite::Error(e.clone()),
            CellValue::Formula { expr, cached } => CellWrite::Formula {
                expr: expr.clone(),
                cached: cached.clone(),
            },
        };
        Some(cell)
    }
}

/// 既存シートへの変更内容
///
/// 行の削除は元のシート上の行番号、セルの書き込みは削除後の行番号で指定します
/// （いずれも0始まり）。削除した行より下の行は上に詰められます。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetEdit {
    removed_rows: BTreeSet<u32>,
    cells: BTreeMap<(u32, u32), CellWrite>,
}

impl SheetEdit {
    pub fn new() -> Self {
        Self::default()
    }

    /// 行を削除する（元のシート上の行番号）
    pub fn remove_row(&mut self, row: u32) {
        self.removed_rows.insert(row);
    }

    /// セルを書き込む（削除後の行番号）
    pub fn set(&mut self, row: u32, col: u32, cell: CellWrite) {
        self.cells.insert((row, col), cell);
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&CellWrite> {
        self.cells.get(&(row, col))
    }

    pub fn removed_rows(&self) -> impl Iterator<Item = u32> + '_ {
        self.removed_rows.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.removed_rows.is_empty() && self.cells.is_empty()
    }

    /// 元の行番号を削除後の行番号に変換（削除される行は`None`）
    fn shifted(&self, row: u32) -> Option<u32> {
        if self.removed_rows.contains(&row) {
            return None;
        }
        Some(row - self.removed_rows.range(..row).count() as u32)
    }

    /// 書き込むセルを行ごとにまとめる
    fn rows(&self) -> BTreeMap<u32, BTreeMap<u32, &CellWrite>> {
        let mut rows: BTreeMap<u32, BTreeMap<u32, &CellWrite>> = BTreeMap::new();
        for ((row, col), cell) in &self.cells {
            rows.entry(*row).or_default().insert(*col, cell);
        }
        rows
    }
}

fn sheet_index(i: usize) -> Result<u32> {
    u32::try_from(i).map_err(|_| ErrStatError::Write(format!("Row or column {} out of range", i)))
}

/// `SheetGrid`から新しいワークシートのXMLを生成
///
/// 空セルは出力しません。日付・日時・書式付き数値のセル書式は`styles`に追加されます。
pub(crate) fn render_worksheet(
    sheet: &SheetGrid,
    converter: DateConverter,
    styles: &mut StylesPart,
) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("worksheet");
    root.push_attribute(("xmlns", MAIN_NS));
    root.push_attribute(("xmlns:r", RELATIONSHIP_NS));
    writer.write_event(Event::Start(root))?;

    let width = sheet.width();
    let dimension = if sheet.rows.is_empty() || width == 0 {
        "A1".to_string()
    } else {
        let last = CellCoord::new(sheet_index(sheet.rows.len() - 1)?, sheet_index(width - 1)?);
        format!("A1:{}", last.to_a1_notation())
    };
    let mut tag = BytesStart::new("dimension");
    tag.push_attribute(("ref", dimension.as_str()));
    writer.write_event(Event::Empty(tag))?;

    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;
    for (r, row) in sheet.rows.iter().enumerate() {
        let cells: Vec<(usize, CellWrite)> = row
            .iter()
            .enumerate()
            .filter_map(|(c, value)| CellWrite::from_value(value, converter).map(|w| (c, w)))
            .collect();
        if cells.is_empty() {
            continue;
        }

        let r = sheet_index(r)?;
        let mut tag = BytesStart::new("row");
        tag.push_attribute(("r", (r + 1).to_string().as_str()));
        writer.write_event(Event::Start(tag))?;
        for (c, cell) in &cells {
            let coord = CellCoord::new(r, sheet_index(*c)?);
            write_cell(&mut writer, "", coord, cell, None, styles)?;
        }
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;

    Ok(writer.into_inner())
}

/// `<c>`要素を1つ書き込む
///
/// `base_style`は置き換える前のセルの書式です。数値書式を指定したセルは
/// その書式をもとに数値書式だけを差し替えます。
fn write_cell(
    writer: &mut Writer<Vec<u8>>,
    prefix: &str,
    coord: CellCoord,
    cell: &CellWrite,
    base_style: Option<u32>,
    styles: &mut StylesPart,
) -> Result<()> {
    let name = format!("{}c", prefix);
    let mut tag = BytesStart::new(name.as_str());
    tag.push_attribute(("r", coord.to_a1_notation().as_str()));

    let style = match cell {
        CellWrite::Number {
            format: Some(format),
            ..
        } => Some(styles.number_style(base_style, format)?),
        _ => base_style,
    };
    if let Some(style) = style {
        tag.push_attribute(("s", style.to_string().as_str()));
    }

    match cell {
        CellWrite::Number { value, .. } => {
            if !value.is_finite() {
                writer.write_event(Event::Empty(tag))?;
                return Ok(());
            }
            writer.write_event(Event::Start(tag))?;
            write_element(writer, prefix, "v", &value.to_string())?;
        }
        CellWrite::Text(text) => {
            tag.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(tag))?;
            let is = format!("{}is", prefix);
            writer.write_event(Event::Start(BytesStart::new(is.as_str())))?;
            let t = format!("{}t", prefix);
            let mut t_tag = BytesStart::new(t.as_str());
            if text.trim() != text {
                t_tag.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(t_tag))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new(t.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new(is.as_str())))?;
        }
        CellWrite::Bool(value) => {
            tag.push_attribute(("t", "b"));
            writer.write_event(Event::Start(tag))?;
            write_element(writer, prefix, "v", if *value { "1" } else { "0" })?;
        }
        CellWrite::Formula { expr, cached } => {
            let expr = expr.strip_prefix('=').unwrap_or(expr);
            let numeric = cached.trim().parse::<f64>().ok().filter(|n| n.is_finite());
            if numeric.is_none() && !cached.is_empty() {
                tag.push_attribute(("t", "str"));
            }
            writer.write_event(Event::Start(tag))?;
            write_element(writer, prefix, "f", expr)?;
            match numeric {
                Some(n) => write_element(writer, prefix, "v", &n.to_string())?,
                None if !cached.is_empty() => write_element(writer, prefix, "v", cached)?,
                None => {}
            }
        }
        CellWrite::Error(error) => {
            tag.push_attribute(("t", "e"));
            writer.write_event(Event::Start(tag))?;
            write_element(writer, prefix, "v", error)?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, prefix: &str, local: &str, text: &str) -> Result<()> {
    let name = format!("{}{}", prefix, local);
    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
    Ok(())
}

/// 既存のワークシートXMLに変更を適用
///
/// `<sheetData>`の外側はそのまま書き出し、`<dimension>`だけを更新します。
/// 変更のない行はバイト列そのままで、変更のある行は書き換えるセル以外を
/// 元のまま（列位置の参照だけ更新して）書き出します。
pub(crate) fn patch_worksheet(
    xml: &[u8],
    edit: &SheetEdit,
    styles: &mut StylesPart,
) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut patcher = Patcher {
        edit,
        pending: edit.rows().into_iter().peekable(),
        styles,
        prefix: String::new(),
        writer: Writer::new(Vec::with_capacity(xml.len() + 1024)),
        last_row: 0,
    };
    let mut in_sheet_data = false;
    let mut row: Option<RowBuffer> = None;

    loop {
        let event = reader.read_event()?;

        if let Some(buffer) = row.as_mut() {
            match &event {
                Event::Start(_) => buffer.depth += 1,
                Event::End(_) => buffer.depth -= 1,
                Event::Eof => return Err(ErrStatError::Write("unterminated <row>".to_string())),
                _ => {}
            }
            if buffer.depth > 0 {
                buffer.events.push(event);
            } else if let Some(buffer) = row.take() {
                patcher.flush_row(buffer)?;
            }
            continue;
        }

        match event {
            Event::Start(tag) if !in_sheet_data && tag.local_name().as_ref() == b"sheetData" => {
                patcher.prefix = name_prefix(tag.name().as_ref());
                in_sheet_data = true;
                patcher.writer.write_event(Event::Start(tag))?;
            }
            Event::Empty(tag) if !in_sheet_data && tag.local_name().as_ref() == b"sheetData" => {
                patcher.prefix = name_prefix(tag.name().as_ref());
                let end = tag.to_end().into_owned();
                patcher.writer.write_event(Event::Start(tag))?;
                patcher.write_pending_rows(None)?;
                patcher.writer.write_event(Event::End(end))?;
            }
            Event::End(tag) if in_sheet_data && tag.local_name().as_ref() == b"sheetData" => {
                patcher.write_pending_rows(None)?;
                in_sheet_data = false;
                patcher.writer.write_event(Event::End(tag))?;
            }
            Event::Start(tag) if in_sheet_data && tag.local_name().as_ref() == b"row" => {
                row = Some(RowBuffer {
                    start: tag,
                    empty: false,
                    events: Vec::new(),
                    depth: 1,
                });
            }
            Event::Empty(tag) if in_sheet_data && tag.local_name().as_ref() == b"row" => {
                patcher.flush_row(RowBuffer {
                    start: tag,
                    empty: true,
                    events: Vec::new(),
                    depth: 0,
                })?;
            }
            Event::Empty(tag) if !in_sheet_data && tag.local_name().as_ref() == b"dimension" => {
                let tag = patcher.adjusted_dimension(tag)?;
                patcher.writer.write_event(Event::Empty(tag))?;
            }
            Event::Eof => break,
            event => patcher.writer.write_event(event)?,
        }
    }

    Ok(patcher.writer.into_inner())
}

/// 読み込み途中の`<row>`要素
struct RowBuffer<'a> {
    start: BytesStart<'a>,
    /// `<row/>`（子要素なし）
    empty: bool,
    events: Vec<Event<'a>>,
    depth: usize,
}

/// 行の子要素
enum RowItem<'a> {
    Cell {
        col: u32,
        style: Option<u32>,
        events: Vec<Event<'a>>,
    },
    Other(Event<'a>),
}

type PendingRows<'e> = Peekable<btree_map::IntoIter<u32, BTreeMap<u32, &'e CellWrite>>>;

struct Patcher<'e, 's> {
    edit: &'e SheetEdit,
    /// まだ書き込んでいない行ごとのセル（削除後の行番号順）
    pending: PendingRows<'e>,
    styles: &'s mut StylesPart,
    prefix: String,
    writer: Writer<Vec<u8>>,
    /// 直前の行の行番号（1始まり、未読なら0）
    last_row: u32,
}

impl<'e, 's> Patcher<'e, 's> {
    /// `before`より前（`None`なら全部）の、元のシートにない行を書き込む
    fn write_pending_rows(&mut self, before: Option<u32>) -> Result<()> {
        while let Some((row, _)) = self.pending.peek() {
            if before.is_some_and(|b| *row >= b) {
                break;
            }
            if let Some((row, cells)) = self.pending.next() {
                let name = format!("{}row", self.prefix);
                let mut tag = BytesStart::new(name.as_str());
                tag.push_attribute(("r", (row + 1).to_string().as_str()));
                self.writer.write_event(Event::Start(tag))?;
                for (col, cell) in cells {
                    let coord = CellCoord::new(row, col);
                    write_cell(&mut self.writer, &self.prefix, coord, cell, None, self.styles)?;
                }
                self.writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
            }
        }
        Ok(())
    }

    fn flush_row(&mut self, buffer: RowBuffer) -> Result<()> {
        let number = attr_value(&buffer.start, b"r")?
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(self.last_row + 1);
        self.last_row = number;

        let original = number - 1;
        let Some(target) = self.edit.shifted(original) else {
            return Ok(());
        };

        self.write_pending_rows(Some(target))?;
        let has_cells = matches!(self.pending.peek(), Some((row, _)) if *row == target);
        let cells = if has_cells {
            self.pending.next().map(|(_, cells)| cells)
        } else {
            None
        };

        match cells {
            None if target == original => self.write_unchanged(buffer),
            cells => self.rewrite_row(buffer, target, cells.unwrap_or_default()),
        }
    }

    fn write_unchanged(&mut self, buffer: RowBuffer) -> Result<()> {
        if buffer.empty {
            self.writer.write_event(Event::Empty(buffer.start))?;
            return Ok(());
        }
        let end = buffer.start.to_end().into_owned();
        self.writer.write_event(Event::Start(buffer.start))?;
        for event in buffer.events {
            self.writer.write_event(event)?;
        }
        self.writer.write_event(Event::End(end))?;
        Ok(())
    }

    /// 行番号の更新とセルの書き換え
    ///
    /// `spans`属性は列範囲が変わりうるため削除します。
    fn rewrite_row(
        &mut self,
        buffer: RowBuffer,
        target: u32,
        mut edits: BTreeMap<u32, &'e CellWrite>,
    ) -> Result<()> {
        let start = with_ref(&buffer.start, &(target + 1).to_string(), &[b"spans"])?;
        let end = start.to_end().into_owned();
        self.writer.write_event(Event::Start(start))?;

        for item in split_cells(buffer.events)? {
            match item {
                RowItem::Cell { col, style, events } => {
                    self.write_new_cells(target, &mut edits, Some(col))?;
                    let coord = CellCoord::new(target, col);
                    match edits.remove(&col) {
                        Some(cell) => {
                            write_cell(&mut self.writer, &self.prefix, coord, cell, style, self.styles)?
                        }
                        None => self.write_moved_cell(events, coord)?,
                    }
                }
                RowItem::Other(event) => {
                    // 行末の拡張要素より前にセルを置く
                    if matches!(event, Event::Start(_) | Event::Empty(_)) {
                        self.write_new_cells(target, &mut edits, None)?;
                    }
                    self.writer.write_event(event)?;
                }
            }
        }
        self.write_new_cells(target, &mut edits, None)?;

        self.writer.write_event(Event::End(end))?;
        Ok(())
    }

    /// `before`列より左（`None`なら全部）の新しいセルを書き込む
    fn write_new_cells(
        &mut self,
        row: u32,
        edits: &mut BTreeMap<u32, &'e CellWrite>,
        before: Option<u32>,
    ) -> Result<()> {
        let cols: Vec<u32> = edits
            .keys()
            .copied()
            .filter(|col| before.map_or(true, |b| *col < b))
            .collect();
        for col in cols {
            if let Some(cell) = edits.remove(&col) {
                let coord = CellCoord::new(row, col);
                write_cell(&mut self.writer, &self.prefix, coord, cell, None, self.styles)?;
            }
        }
        Ok(())
    }

    /// 元のセルを参照だけ更新して書き出す
    fn write_moved_cell(&mut self, events: Vec<Event>, coord: CellCoord) -> Result<()> {
        let reference = coord.to_a1_notation();
        let mut events = events.into_iter();
        match events.next() {
            Some(Event::Start(tag)) => {
                self.writer
                    .write_event(Event::Start(with_ref(&tag, &reference, &[])?))?;
            }
            Some(Event::Empty(tag)) => {
                self.writer
                    .write_event(Event::Empty(with_ref(&tag, &reference, &[])?))?;
            }
            Some(other) => self.writer.write_event(other)?,
            None => {}
        }
        for event in events {
            self.writer.write_event(event)?;
        }
        Ok(())
    }

    /// `<dimension ref="A1:F9"/>`の終端を行の削除とセルの追加に合わせる
    fn adjusted_dimension<'a>(&self, tag: BytesStart<'a>) -> Result<BytesStart<'a>> {
        let Some(reference) = attr_value(&tag, b"ref")? else {
            return Ok(tag);
        };
        let (first, last) = reference
            .split_once(':')
            .unwrap_or((reference.as_str(), reference.as_str()));
        let Some(last) = CellCoord::from_a1_notation(last) else {
            return Ok(tag);
        };

        let removed = self.edit.removed_rows.range(..=last.row).count() as u32;
        let mut row = last.row.saturating_sub(removed);
        let mut col = last.col;
        for (r, c) in self.edit.cells.keys() {
            row = row.max(*r);
            col = col.max(*c);
        }

        let updated = format!("{}:{}", first, CellCoord::new(row, col).to_a1_notation());
        with_attribute(&tag, "ref", &updated)
    }
}

/// 行の子イベントをセル単位に分ける
fn split_cells(events: Vec<Event>) -> Result<Vec<RowItem>> {
    let mut items = Vec::new();
    let mut current: Option<(u32, Option<u32>, Vec<Event>, usize)> = None;
    let mut next_col = 0u32;

    for event in events {
        if let Some((_, _, cell_events, depth)) = current.as_mut() {
            match &event {
                Event::Start(_) => *depth += 1,
                Event::End(_) => *depth -= 1,
                _ => {}
            }
            cell_events.push(event);
            let done = *depth == 0;
            if done {
                if let Some((col, style, events, _)) = current.take() {
                    items.push(RowItem::Cell { col, style, events });
                }
            }
            continue;
        }

        let is_cell = matches!(
            &event,
            Event::Start(tag) | Event::Empty(tag) if tag.local_name().as_ref() == b"c"
        );
        if !is_cell {
            items.push(RowItem::Other(event));
            continue;
        }
        let (tag, empty) = match &event {
            Event::Start(tag) => (tag, false),
            Event::Empty(tag) => (tag, true),
            _ => continue,
        };

        let col = attr_value(tag, b"r")?
            .and_then(|r| CellCoord::from_a1_notation(&r))
            .map(|coord| coord.col)
            .unwrap_or(next_col);
        let style = attr_value(tag, b"s")?.and_then(|s| s.trim().parse::<u32>().ok());
        next_col = col + 1;

        if empty {
            items.push(RowItem::Cell {
                col,
                style,
                events: vec![event],
            });
        } else {
            current = Some((col, style, vec![event], 1));
        }
    }

    if current.is_some() {
        return Err(ErrStatError::Write("unterminated <c>".to_string()));
    }
    Ok(items)
}

/// `r`属性を先頭に置き換え、`drop`の属性を除いた開始タグ
fn with_ref(tag: &BytesStart, reference: &str, drop: &[&[u8]]) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    out.push_attribute(("r", reference));
    for attr in tag.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = attr.key.as_ref();
        if key != b"r" && !drop.contains(&key) {
            out.push_attribute(attr);
        }
    }
    Ok(out)
}

/// 1つの属性値だけを差し替えた開始タグ（属性の順序は保持）
fn with_attribute(tag: &BytesStart, key: &str, value: &str) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in tag.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key.as_bytes() {
            out.push_attribute((key, value));
        } else {
            out.push_attribute(attr);
        }
    }
    Ok(out)
}
