//! Workbook Package
//!
//! レポートワークブックをZIPパッケージのまま保持し、書き換えるパートだけを差し替えます。
//! 触れないパート（他のシート、グラフ、画像、定義名、テーマなど）は
//! 読み込んだバイト列のまま書き戻します。
//!
//! ファイルへの保存は同じディレクトリの一時ファイルに書き込んでから
//! 置き換えるため、途中で失敗しても対象ファイルは変更されません。

use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ErrStatError, Result};
use crate::formatter::DateConverter;
use crate::grid::SheetGrid;
use crate::output::styles::{attr_value, StylesPart, MINIMAL_STYLESHEET};
use crate::output::worksheet::{patch_worksheet, render_worksheet, SheetEdit};
use crate::parser::ZIP_MAGIC;
use crate::security::SecurityConfig;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
/// 数式の計算順序のキャッシュ（Excelが開くときに再構築する）
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
const DEFAULT_STYLES_PART: &str = "xl/styles.xml";

const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const STYLES_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const STYLES_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

/// ZIPエントリ
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
}

/// `xl/_rels/workbook.xml.rels`の1エントリ
#[derive(Debug, Clone)]
struct Relationship {
    id: String,
    rel_type: String,
    /// `Target`属性の値
    target: String,
    /// パッケージ内のパート名（`xl/worksheets/sheet1.xml`）
    part: String,
    /// このパッケージで追加したか
    added: bool,
}

/// `xl/workbook.xml`の`<sheet>`
#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    sheet_id: u32,
    /// 読み込んだワークブック上の位置（追加したシートは`None`）
    original_index: Option<usize>,
    /// 元の`<sheet>`要素（`state="hidden"`などを保持）
    tag: BytesStart<'static>,
    part: String,
}

/// 部分的に書き換えられるxlsxパッケージ
///
/// # 使用例
///
/// ```rust,no_run
/// use errstat::{SecurityConfig, WorkbookPackage};
///
/// # fn main() -> Result<(), errstat::ErrStatError> {
/// let bytes = std::fs::read("output/OHT_Daily_Report.xlsx")?;
/// let mut package = WorkbookPackage::open(&bytes, &SecurityConfig::default())?;
/// package.move_to_end("Weekly_Report");
/// package.save_atomic("output/OHT_Daily_Report.xlsx".as_ref())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WorkbookPackage {
    /// ZIPエントリ（元の順序）
    parts: Vec<Part>,
    /// シート（ワークブック上の順序）
    sheets: Vec<SheetEntry>,
    relationships: Vec<Relationship>,
    /// 追加したパートのContent Type（パート名, 種類）
    added_content_types: Vec<(String, &'static str)>,
    styles: StylesPart,
    styles_part: String,
}

fn zip_error(e: zip::result::ZipError) -> ErrStatError {
    ErrStatError::Zip(e.to_string())
}

fn not_spreadsheet_ml(reason: &str) -> ErrStatError {
    ErrStatError::Config(format!(
        "Report workbook must be .xlsx or .xlsm ({})",
        reason
    ))
}

impl WorkbookPackage {
    /// xlsx / xlsmのバイト列を開く
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookPackage)` - すべてのパートを読み込んだパッケージ
    /// * `Err(ErrStatError::Config)` - ZIPでない、または`xl/workbook.xml`がない
    ///   （xls / xlsb / odsなど）場合
    /// * `Err(ErrStatError::SecurityViolation)` - サイズやエントリ数の上限を超えた場合
    pub fn open(data: &[u8], security_config: &SecurityConfig) -> Result<Self> {
        security_config.check_input_size(data.len() as u64)?;
        if !data.starts_with(ZIP_MAGIC) {
            return Err(not_spreadsheet_ml("not a ZIP package"));
        }

        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(zip_error)?;
        security_config.check_archive(&mut archive)?;

        let limit = security_config.max_file_size;
        let mut total = 0u64;
        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(zip_error)?;
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.take(limit + 1).read_to_end(&mut data)?;

            let size = data.len() as u64;
            total = total.saturating_add(size);
            if size > limit || total > security_config.max_decompressed_size {
                return Err(ErrStatError::SecurityViolation(format!(
                    "Entry '{}' exceeds maximum size while extracting",
                    name
                )));
            }
            parts.push(Part { name, data });
        }

        let find = |name: &str| parts.iter().find(|p| p.name == name).map(|p| p.data.as_slice());
        let workbook = find(WORKBOOK_PART).ok_or_else(|| not_spreadsheet_ml("no xl/workbook.xml"))?;
        let rels = find(WORKBOOK_RELS_PART)
            .ok_or_else(|| not_spreadsheet_ml("no xl/_rels/workbook.xml.rels"))?;

        let relationships = parse_relationships(rels)?;
        let sheets = parse_sheets(workbook, &relationships)?;

        let mut package = Self {
            parts,
            sheets,
            relationships,
            added_content_types: Vec::new(),
            styles: StylesPart::parse(MINIMAL_STYLESHEET.as_bytes())?,
            styles_part: DEFAULT_STYLES_PART.to_string(),
        };
        package.load_styles()?;

        debug!(
            "Opened workbook package ({} parts, {} sheets)",
            package.parts.len(),
            package.sheets.len()
        );
        Ok(package)
    }

    /// スタイルシートを読み込む。ない場合は最小のスタイルシートを追加する
    fn load_styles(&mut self) -> Result<()> {
        let existing = self
            .relationships
            .iter()
            .find(|rel| rel.rel_type == STYLES_REL_TYPE)
            .map(|rel| rel.part.clone());

        if let Some(part) = &existing {
            if let Some(data) = self.part(part) {
                self.styles = StylesPart::parse(data)?;
                self.styles_part = part.clone();
                return Ok(());
            }
        }

        let name = existing
            .clone()
            .unwrap_or_else(|| DEFAULT_STYLES_PART.to_string());
        debug!("Workbook has no styles part, adding {}", name);
        self.parts.push(Part {
            name: name.clone(),
            data: MINIMAL_STYLESHEET.as_bytes().to_vec(),
        });
        if existing.is_none() {
            self.add_relationship(STYLES_REL_TYPE, DEFAULT_STYLES_PART);
        }
        self.added_content_types.push((name.clone(), STYLES_CONTENT_TYPE));
        self.styles_part = name;
        Ok(())
    }

    /// シート名の一覧（ワークブック上の順序）
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| s.name == name)
    }

    fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
            }),
        }
    }

    /// シートを`sheet`の内容で置き換える。存在しなければ末尾に追加する
    ///
    /// 置き換えたシートは同じ位置に残ります。元のシートに関連付けられていた
    /// 図形やコメントの関連付けは外されます。
    pub fn write_sheet(&mut self, sheet: &SheetGrid, converter: DateConverter) -> Result<()> {
        let xml = render_worksheet(sheet, converter, &mut self.styles)?;

        let existing = self
            .sheets
            .iter()
            .find(|s| s.name == sheet.name)
            .map(|s| s.part.clone());
        match existing {
            Some(part) => {
                let rels = sheet_rels_part(&part);
                self.parts.retain(|p| p.name != rels);
                self.set_part(&part, xml);
                debug!("Replaced sheet '{}' ({})", sheet.name, part);
            }
            None => {
                let part = self.add_sheet(&sheet.name, xml);
                debug!("Added sheet '{}' ({})", sheet.name, part);
            }
        }
        Ok(())
    }

    /// 既存のシートに変更を適用する
    ///
    /// # 戻り値
    ///
    /// * `Err(ErrStatError::MissingSheet)` - シートが存在しない場合
    pub fn patch_sheet(&mut self, name: &str, edit: &SheetEdit) -> Result<()> {
        let part = self
            .sheets
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.part.clone())
            .ok_or_else(|| ErrStatError::MissingSheet(name.to_string()))?;

        let xml = self
            .parts
            .iter()
            .find(|p| p.name == part)
            .map(|p| p.data.as_slice())
            .ok_or_else(|| ErrStatError::Write(format!("Missing worksheet part {}", part)))?;
        let patched = patch_worksheet(xml, edit, &mut self.styles)?;
        self.set_part(&part, patched);
        Ok(())
    }

    /// シートを末尾へ移動する。存在しなければ`false`
    pub fn move_to_end(&mut self, name: &str) -> bool {
        match self.sheets.iter().position(|s| s.name == name) {
            Some(pos) => {
                let sheet = self.sheets.remove(pos);
                self.sheets.push(sheet);
                true
            }
            None => false,
        }
    }

    fn add_sheet(&mut self, name: &str, xml: Vec<u8>) -> String {
        let mut n = self.sheets.len() + 1;
        let part = loop {
            let candidate = format!("xl/worksheets/sheet{}.xml", n);
            if self.part(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };

        let rel_id = self.add_relationship(WORKSHEET_REL_TYPE, &part);
        let sheet_id = self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;
        let (tag_name, id_key) = self
            .sheets
            .first()
            .map(|s| {
                let tag_name = String::from_utf8_lossy(s.tag.name().as_ref()).into_owned();
                (tag_name, relationship_id_key(&s.tag))
            })
            .unwrap_or_else(|| ("sheet".to_string(), None));

        let mut tag = BytesStart::new(tag_name);
        tag.push_attribute(("name", name));
        tag.push_attribute(("sheetId", sheet_id.to_string().as_str()));
        tag.push_attribute((id_key.as_deref().unwrap_or("r:id"), rel_id.as_str()));

        self.parts.push(Part {
            name: part.clone(),
            data: xml,
        });
        self.added_content_types
            .push((part.clone(), WORKSHEET_CONTENT_TYPE));
        self.sheets.push(SheetEntry {
            name: name.to_string(),
            sheet_id,
            original_index: None,
            tag,
            part: part.clone(),
        });
        part
    }

    /// ワークブックからパートへの関連付けを追加し、IDを返す
    fn add_relationship(&mut self, rel_type: &str, part: &str) -> String {
        let next = self
            .relationships
            .iter()
            .filter_map(|rel| rel.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{}", next);
        self.relationships.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: part.strip_prefix("xl/").unwrap_or(part).to_string(),
            part: part.to_string(),
            added: true,
        });
        id
    }

    /// 読み込んだ時点の位置から現在の位置への対応
    fn new_index(&self, original: usize) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.original_index == Some(original))
    }

    /// 変更を反映したxlsxのバイト列を生成
    ///
    /// `xl/calcChain.xml`は書き換えたセルの数式と食い違うことがあるため
    /// 取り除きます（Excelは開くときに再構築します）。
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let workbook = self.workbook_xml()?;
        let rels = self.relationships_xml()?;
        let content_types = self.content_types_xml()?;
        let styles = self.styles.to_bytes()?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for part in &self.parts {
            if part.name == CALC_CHAIN_PART {
                continue;
            }
            if part.name.ends_with('/') {
                zip.add_directory(part.name.as_str(), options)
                    .map_err(zip_error)?;
                continue;
            }

            let data: &[u8] = match part.name.as_str() {
                WORKBOOK_PART => &workbook,
                WORKBOOK_RELS_PART => &rels,
                CONTENT_TYPES_PART => &content_types,
                name if name == self.styles_part => &styles,
                _ => &part.data,
            };
            zip.start_file(part.name.as_str(), options)
                .map_err(zip_error)?;
            zip.write_all(data)?;
        }

        let cursor = zip.finish().map_err(zip_error)?;
        Ok(cursor.into_inner())
    }

    /// ワークブックを指定パスにアトミックに保存
    ///
    /// 対象と同じディレクトリに一時ファイルを作成し、書き込み完了後に
    /// 対象パスへ置き換えます。
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        let buffer = self.to_bytes()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&buffer)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| ErrStatError::Io(e.error))?;

        info!(
            "Saved workbook to {} ({} sheets, {} bytes)",
            path.display(),
            self.sheets.len(),
            buffer.len()
        );
        Ok(())
    }

    /// シート順を反映した`xl/workbook.xml`
    ///
    /// `<sheets>`を現在の順序で書き直し、シート位置を参照する
    /// `definedName@localSheetId`と`workbookView@activeTab/firstSheet`を付け替えます。
    fn workbook_xml(&self) -> Result<Vec<u8>> {
        let source = self
            .part(WORKBOOK_PART)
            .ok_or_else(|| ErrStatError::Write("Missing xl/workbook.xml".to_string()))?;
        let mut reader = Reader::from_reader(source);
        let mut writer = Writer::new(Vec::with_capacity(source.len() + 256));
        let mut in_sheets = false;

        loop {
            let event = reader.read_event()?;
            if in_sheets {
                if let Event::End(tag) = &event {
                    if tag.local_name().as_ref() == b"sheets" {
                        in_sheets = false;
                        self.write_sheet_tags(&mut writer)?;
                        writer.write_event(event)?;
                    }
                }
                continue;
            }

            match event {
                Event::Start(tag) if tag.local_name().as_ref() == b"sheets" => {
                    in_sheets = true;
                    writer.write_event(Event::Start(tag))?;
                }
                Event::Empty(tag) if tag.local_name().as_ref() == b"sheets" => {
                    let end = tag.to_end().into_owned();
                    writer.write_event(Event::Start(tag))?;
                    self.write_sheet_tags(&mut writer)?;
                    writer.write_event(Event::End(end))?;
                }
                Event::Start(tag) if tag.local_name().as_ref() == b"definedName" => {
                    writer.write_event(Event::Start(self.remap(&tag, &["localSheetId"])?))?;
                }
                Event::Start(tag) if tag.local_name().as_ref() == b"workbookView" => {
                    let tag = self.remap(&tag, &["activeTab", "firstSheet"])?;
                    writer.write_event(Event::Start(tag))?;
                }
                Event::Empty(tag) if tag.local_name().as_ref() == b"workbookView" => {
                    let tag = self.remap(&tag, &["activeTab", "firstSheet"])?;
                    writer.write_event(Event::Empty(tag))?;
                }
                Event::Eof => break,
                event => writer.write_event(event)?,
            }
        }

        Ok(writer.into_inner())
    }

    fn write_sheet_tags(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        for sheet in &self.sheets {
            writer.write_event(Event::Empty(sheet.tag.borrow()))?;
        }
        Ok(())
    }

    /// シート位置を表す属性を現在の順序に付け替える
    fn remap(&self, tag: &BytesStart, keys: &[&str]) -> Result<BytesStart<'static>> {
        let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
        let mut out = BytesStart::new(name);
        for attr in tag.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = attr.key.as_ref();
            if !keys.iter().any(|k| k.as_bytes() == key) {
                out.push_attribute(attr);
                continue;
            }

            let value = quick_xml::escape::unescape(
                std::str::from_utf8(&attr.value).map_err(quick_xml::Error::from)?,
            )
            .map_err(quick_xml::Error::from)?;
            let remapped = value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|old| self.new_index(old))
                .unwrap_or(0);
            let key = String::from_utf8_lossy(key).into_owned();
            out.push_attribute((key.as_str(), remapped.to_string().as_str()));
        }
        Ok(out)
    }

    /// 追加した関連付けを反映し、`calcChain`への関連付けを除いた`.rels`
    fn relationships_xml(&self) -> Result<Vec<u8>> {
        let source = self
            .part(WORKBOOK_RELS_PART)
            .ok_or_else(|| ErrStatError::Write("Missing workbook relationships".to_string()))?;
        let mut reader = Reader::from_reader(source);
        let mut writer = Writer::new(Vec::with_capacity(source.len() + 256));

        loop {
            match reader.read_event()? {
                Event::Empty(tag) if tag.local_name().as_ref() == b"Relationship" => {
                    let id = attr_value(&tag, b"Id")?;
                    let is_calc_chain = self
                        .relationships
                        .iter()
                        .any(|rel| Some(&rel.id) == id.as_ref() && rel.part == CALC_CHAIN_PART);
                    if !is_calc_chain {
                        writer.write_event(Event::Empty(tag))?;
                    }
                }
                Event::End(tag) if tag.local_name().as_ref() == b"Relationships" => {
                    for rel in self.relationships.iter().filter(|rel| rel.added) {
                        let mut added = BytesStart::new("Relationship");
                        added.push_attribute(("Id", rel.id.as_str()));
                        added.push_attribute(("Type", rel.rel_type.as_str()));
                        added.push_attribute(("Target", rel.target.as_str()));
                        writer.write_event(Event::Empty(added))?;
                    }
                    writer.write_event(Event::End(tag))?;
                }
                Event::Eof => break,
                event => writer.write_event(event)?,
            }
        }

        Ok(writer.into_inner())
    }

    /// 追加したパートの`Override`を反映した`[Content_Types].xml`
    fn content_types_xml(&self) -> Result<Vec<u8>> {
        let source = self
            .part(CONTENT_TYPES_PART)
            .ok_or_else(|| ErrStatError::Write("Missing [Content_Types].xml".to_string()))?;
        let mut reader = Reader::from_reader(source);
        let mut writer = Writer::new(Vec::with_capacity(source.len() + 256));
        let calc_chain = format!("/{}", CALC_CHAIN_PART);
        let mut declared: Vec<String> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Empty(tag) if tag.local_name().as_ref() == b"Override" => {
                    let part_name = attr_value(&tag, b"PartName")?.unwrap_or_default();
                    if part_name != calc_chain {
                        declared.push(part_name);
                        writer.write_event(Event::Empty(tag))?;
                    }
                }
                Event::End(tag) if tag.local_name().as_ref() == b"Types" => {
                    for (part, content_type) in &self.added_content_types {
                        let part_name = format!("/{}", part);
                        if declared.contains(&part_name) {
                            continue;
                        }
                        let mut added = BytesStart::new("Override");
                        added.push_attribute(("PartName", part_name.as_str()));
                        added.push_attribute(("ContentType", *content_type));
                        writer.write_event(Event::Empty(added))?;
                    }
                    writer.write_event(Event::End(tag))?;
                }
                Event::Eof => break,
                event => writer.write_event(event)?,
            }
        }

        Ok(writer.into_inner())
    }
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
fn sheet_rels_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// `xl/`からの相対パス（または`/`始まりの絶対パス）をパート名に解決
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments = vec!["xl"];
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    let mut relationships = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(tag) | Event::Empty(tag)
                if tag.local_name().as_ref() == b"Relationship" =>
            {
                let (Some(id), Some(target)) =
                    (attr_value(&tag, b"Id")?, attr_value(&tag, b"Target")?)
                else {
                    continue;
                };
                let external = attr_value(&tag, b"TargetMode")?.as_deref() == Some("External");
                relationships.push(Relationship {
                    id,
                    rel_type: attr_value(&tag, b"Type")?.unwrap_or_default(),
                    part: if external {
                        target.clone()
                    } else {
                        resolve_target(&target)
                    },
                    target,
                    added: false,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(relationships)
}

/// `<sheet r:id="...">`の関連付けID属性の名前（`r:id`など）
fn relationship_id_key(tag: &BytesStart) -> Option<String> {
    tag.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some())
        .map(|attr| String::from_utf8_lossy(attr.key.as_ref()).into_owned())
}

fn parse_sheets(xml: &[u8], relationships: &[Relationship]) -> Result<Vec<SheetEntry>> {
    let mut reader = Reader::from_reader(xml);
    let mut sheets = Vec::new();
    let mut in_sheets = false;

    loop {
        match reader.read_event()? {
            Event::Start(tag) if tag.local_name().as_ref() == b"sheets" => in_sheets = true,
            Event::End(tag) if tag.local_name().as_ref() == b"sheets" => in_sheets = false,
            Event::Start(tag) | Event::Empty(tag)
                if in_sheets && tag.local_name().as_ref() == b"sheet" =>
            {
                let name = attr_value(&tag, b"name")?
                    .ok_or_else(|| ErrStatError::Write("<sheet> without a name".to_string()))?;
                let sheet_id = attr_value(&tag, b"sheetId")?
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0);

                let key = relationship_id_key(&tag);
                let rel_id = match key {
                    Some(key) => attr_value(&tag, key.as_bytes())?,
                    None => None,
                };
                let part = rel_id
                    .and_then(|id| relationships.iter().find(|rel| rel.id == id))
                    .map(|rel| rel.part.clone())
                    .ok_or_else(|| {
                        ErrStatError::Write(format!("Sheet '{}' has no worksheet part", name))
                    })?;

                sheets.push(SheetEntry {
                    name,
                    sheet_id,
                    original_index: Some(sheets.len()),
                    tag: tag.into_owned(),
                    part,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(sheets)
}
