//! Styles Part
//!
//! `xl/styles.xml`の数値書式（`numFmts`）とセル書式（`cellXfs`）を扱います。
//! 既存の書式には触れず、必要になった書式だけを末尾に追加します。

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ErrStatError, Result};

/// Excel組み込みの数値書式
const BUILTIN_NUM_FORMATS: &[(&str, u32)] = &[
    ("General", 0),
    ("0", 1),
    ("0.00", 2),
    ("0%", 9),
    ("0.00%", 10),
];

/// ユーザー定義の数値書式IDの下限
const FIRST_CUSTOM_NUM_FORMAT: u32 = 164;

/// `xl/styles.xml`が存在しないワークブックに追加するスタイルシート
pub(crate) const MINIMAL_STYLESHEET: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

/// スタイルシートの数値書式とセル書式
#[derive(Debug, Clone)]
pub(crate) struct StylesPart {
    /// 元のXML
    source: Vec<u8>,
    /// 要素名の名前空間プレフィックス（`"x:"`など、通常は空）
    prefix: String,
    /// `<numFmts>`要素があるか
    has_num_fmts: bool,
    /// 定義済みの数値書式（書式コード, ID）
    num_formats: Vec<(String, u32)>,
    /// 追加した数値書式
    added_formats: Vec<(String, u32)>,
    /// `cellXfs`の各`<xf>`要素（シリアライズ済み）
    xfs: Vec<Vec<u8>>,
    /// 元から存在した`<xf>`の数
    original_xf_count: usize,
}

impl StylesPart {
    /// `xl/styles.xml`を解析
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut prefix = None;
        let mut num_formats = Vec::new();
        let mut xfs = Vec::new();
        let mut has_num_fmts = false;
        let mut in_num_fmts = false;
        let mut in_cell_xfs = false;
        let mut capture: Option<(Writer<Vec<u8>>, usize)> = None;

        loop {
            let event = reader.read_event()?;

            if let Some((writer, depth)) = capture.as_mut() {
                match &event {
                    Event::Start(_) => *depth += 1,
                    Event::End(_) => *depth -= 1,
                    Event::Eof => return Err(malformed("unterminated <xf>")),
                    _ => {}
                }
                writer.write_event(event)?;
                let done = *depth == 0;
                if done {
                    if let Some((writer, _)) = capture.take() {
                        xfs.push(writer.into_inner());
                    }
                }
                continue;
            }

            match event {
                Event::Start(ref tag) | Event::Empty(ref tag) if prefix.is_none() => {
                    prefix = Some(name_prefix(tag.name().as_ref()));
                }
                Event::Start(ref tag) if tag.local_name().as_ref() == b"numFmts" => {
                    has_num_fmts = true;
                    in_num_fmts = true;
                }
                Event::Empty(ref tag) if tag.local_name().as_ref() == b"numFmts" => {
                    has_num_fmts = true;
                }
                Event::End(ref tag) if tag.local_name().as_ref() == b"numFmts" => {
                    in_num_fmts = false;
                }
                Event::Start(ref tag) if tag.local_name().as_ref() == b"cellXfs" => {
                    in_cell_xfs = true;
                }
                Event::End(ref tag) if tag.local_name().as_ref() == b"cellXfs" => {
                    in_cell_xfs = false;
                }
                Event::Start(ref tag) | Event::Empty(ref tag)
                    if in_num_fmts && tag.local_name().as_ref() == b"numFmt" =>
                {
                    let id = attr_value(tag, b"numFmtId")?.and_then(|v| v.parse().ok());
                    let code = attr_value(tag, b"formatCode")?;
                    if let (Some(id), Some(code)) = (id, code) {
                        num_formats.push((code, id));
                    }
                }
                Event::Empty(tag) if in_cell_xfs && tag.local_name().as_ref() == b"xf" => {
                    let mut writer = Writer::new(Vec::new());
                    writer.write_event(Event::Empty(tag))?;
                    xfs.push(writer.into_inner());
                }
                Event::Start(tag) if in_cell_xfs && tag.local_name().as_ref() == b"xf" => {
                    let mut writer = Writer::new(Vec::new());
                    writer.write_event(Event::Start(tag))?;
                    capture = Some((writer, 1));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if xfs.is_empty() {
            return Err(malformed("no <cellXfs> entries"));
        }

        Ok(Self {
            source: xml.to_vec(),
            prefix: prefix.unwrap_or_default(),
            has_num_fmts,
            num_formats,
            added_formats: Vec::new(),
            original_xf_count: xfs.len(),
            xfs,
        })
    }

    /// 書式を追加したかどうか
    pub fn is_modified(&self) -> bool {
        !self.added_formats.is_empty() || self.xfs.len() > self.original_xf_count
    }

    /// 数値書式を適用したセル書式のインデックスを取得
    ///
    /// `base`のセル書式（なければ既定の0番）をもとに、数値書式だけを
    /// 差し替えた書式を返します。同じ内容の書式がすでにあればそれを再利用するため、
    /// 同じ処理を繰り返してもセル書式は増えません。
    pub fn number_style(&mut self, base: Option<u32>, format: &str) -> Result<u32> {
        let format_id = self.format_id(format);
        let base = base
            .map(|b| b as usize)
            .filter(|b| *b < self.xfs.len())
            .unwrap_or(0);

        let derived = with_number_format(&self.xfs[base], format_id)?;
        let index = match self.xfs.iter().position(|xf| *xf == derived) {
            Some(index) => index,
            None => {
                self.xfs.push(derived);
                self.xfs.len() - 1
            }
        };
        u32::try_from(index).map_err(|_| malformed("too many cell formats"))
    }

    fn format_id(&mut self, code: &str) -> u32 {
        if let Some((_, id)) = BUILTIN_NUM_FORMATS.iter().find(|(c, _)| *c == code) {
            return *id;
        }
        if let Some((_, id)) = self.num_formats.iter().find(|(c, _)| c == code) {
            return *id;
        }

        let id = self
            .num_formats
            .iter()
            .map(|(_, id)| *id + 1)
            .max()
            .unwrap_or(0)
            .max(FIRST_CUSTOM_NUM_FORMAT);
        self.num_formats.push((code.to_string(), id));
        self.added_formats.push((code.to_string(), id));
        id
    }

    /// 追加した書式を反映したXMLを生成
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.is_modified() {
            return Ok(self.source.clone());
        }

        let mut reader = Reader::from_reader(self.source.as_slice());
        let mut writer = Writer::new(Vec::with_capacity(self.source.len() + 512));
        let mut seen_root = false;
        let total_formats = self.num_formats.len();
        let added_xfs = &self.xfs[self.original_xf_count..];

        loop {
            match reader.read_event()? {
                Event::Start(tag) if !seen_root => {
                    seen_root = true;
                    writer.write_event(Event::Start(tag))?;
                    if !self.has_num_fmts && !self.added_formats.is_empty() {
                        let name = format!("{}numFmts", self.prefix);
                        let mut start = BytesStart::new(name.as_str());
                        start.push_attribute(("count", total_formats.to_string().as_str()));
                        writer.write_event(Event::Start(start))?;
                        self.write_added_formats(&mut writer)?;
                        writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
                    }
                }
                Event::Start(tag) if tag.local_name().as_ref() == b"numFmts" => {
                    writer.write_event(Event::Start(with_count(&tag, total_formats)?))?;
                }
                Event::Empty(tag) if tag.local_name().as_ref() == b"numFmts" => {
                    let start = with_count(&tag, total_formats)?;
                    let end = start.to_end().into_owned();
                    writer.write_event(Event::Start(start))?;
                    self.write_added_formats(&mut writer)?;
                    writer.write_event(Event::End(end))?;
                }
                Event::End(tag) if tag.local_name().as_ref() == b"numFmts" => {
                    self.write_added_formats(&mut writer)?;
                    writer.write_event(Event::End(tag))?;
                }
                Event::Start(tag) if tag.local_name().as_ref() == b"cellXfs" => {
                    writer.write_event(Event::Start(with_count(&tag, self.xfs.len())?))?;
                }
                Event::End(tag) if tag.local_name().as_ref() == b"cellXfs" => {
                    for xf in added_xfs {
                        writer.get_mut().extend_from_slice(xf);
                    }
                    writer.write_event(Event::End(tag))?;
                }
                Event::Eof => break,
                event => writer.write_event(event)?,
            }
        }

        Ok(writer.into_inner())
    }

    fn write_added_formats(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let name = format!("{}numFmt", self.prefix);
        for (code, id) in &self.added_formats {
            let mut tag = BytesStart::new(name.as_str());
            tag.push_attribute(("numFmtId", id.to_string().as_str()));
            tag.push_attribute(("formatCode", code.as_str()));
            writer.write_event(Event::Empty(tag))?;
        }
        Ok(())
    }
}

fn malformed(reason: &str) -> ErrStatError {
    ErrStatError::Write(format!("xl/styles.xml: {}", reason))
}

/// `x:cellXfs`のような要素名からプレフィックス（`"x:"`）を取り出す
pub(crate) fn name_prefix(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    match name.rfind(':') {
        Some(pos) => name[..=pos].to_string(),
        None => String::new(),
    }
}

/// 属性値をアンエスケープして取得
pub(crate) fn attr_value(tag: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    match tag.try_get_attribute(key)? {
        Some(attr) => {
            let raw = std::str::from_utf8(&attr.value).map_err(quick_xml::Error::from)?;
            Ok(Some(
                quick_xml::escape::unescape(raw)
                    .map_err(quick_xml::Error::from)?
                    .into_owned(),
            ))
        }
        None => Ok(None),
    }
}

/// `count`属性だけを差し替えた開始タグ
fn with_count(tag: &BytesStart, count: usize) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in tag.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() != b"count" {
            out.push_attribute(attr);
        }
    }
    out.push_attribute(("count", count.to_string().as_str()));
    Ok(out)
}

/// `<xf>`要素の数値書式だけを差し替える（子要素と他の属性は保持）
fn with_number_format(xf: &[u8], format_id: u32) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xf);
    let mut writer = Writer::new(Vec::with_capacity(xf.len() + 32));
    let mut first = true;

    loop {
        match reader.read_event()? {
            Event::Start(tag) if first => {
                first = false;
                writer.write_event(Event::Start(replace_num_fmt(&tag, format_id)?))?;
            }
            Event::Empty(tag) if first => {
                first = false;
                writer.write_event(Event::Empty(replace_num_fmt(&tag, format_id)?))?;
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }

    Ok(writer.into_inner())
}

fn replace_num_fmt(tag: &BytesStart, format_id: u32) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    out.push_attribute(("numFmtId", format_id.to_string().as_str()));
    for attr in tag.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if !matches!(attr.key.as_ref(), b"numFmtId" | b"applyNumberFormat") {
            out.push_attribute(attr);
        }
    }
    out.push_attribute(("applyNumberFormat", "1"));
    Ok(out)
}
