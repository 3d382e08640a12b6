//! Workbook Metadata
//!
//! calamineが公開しない情報をZIPコンテナから直接読み取ります。
//! 必要なのは日付システム（1900年 / 1904年）だけです。

use std::io::{Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::{ErrStatError, Result};
use crate::security::SecurityConfig;

const WORKBOOK_PART: &str = "xl/workbook.xml";

/// ZIPコンテナから読み取ったワークブック情報
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WorkbookMetadata {
    date1904: bool,
}

impl WorkbookMetadata {
    /// アーカイブを検査してからメタデータを読み取る
    ///
    /// `xl/workbook.xml`がない場合（ODSなど）は1900年システムとして扱います。
    pub fn read<R: Read + Seek>(reader: R, security_config: &SecurityConfig) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).map_err(|e| ErrStatError::Zip(e.to_string()))?;
        security_config.check_archive(&mut archive)?;

        let mut xml = Vec::new();
        match archive.by_name(WORKBOOK_PART) {
            Ok(mut part) => {
                part.read_to_end(&mut xml)?;
            }
            Err(_) => return Ok(Self::default()),
        }

        Ok(Self {
            date1904: date1904_flag(&xml)?,
        })
    }

    /// 1904年日付システムのワークブックかどうか
    pub fn date1904(&self) -> bool {
        self.date1904
    }
}

/// `<workbookPr date1904="1"/>`の値を読む
fn date1904_flag(xml: &[u8]) -> Result<bool> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ErrStatError::Config(format!("workbook.xml: {}", e)))?;
        match event {
            Event::Start(ref tag) | Event::Empty(ref tag) if tag.name().as_ref() == b"workbookPr" => {
                let attr = tag
                    .try_get_attribute("date1904")
                    .map_err(|e| ErrStatError::Config(format!("workbook.xml: {}", e)))?;
                return match attr {
                    Some(attr) => {
                        let value = std::str::from_utf8(&attr.value)?;
                        Ok(matches!(value, "1" | "true"))
                    }
                    None => Ok(false),
                };
            }
            Event::Eof => return Ok(false),
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::{FileOptions, ZipWriter};

    fn archive_with_workbook(xml: &str) -> Vec<u8> {
        let mut data = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut data));
            zip.start_file(WORKBOOK_PART, FileOptions::default()).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        data
    }

    #[test]
    fn test_date1904_flag_values() {
        assert!(date1904_flag(br#"<workbook><workbookPr date1904="1"/></workbook>"#).unwrap());
        assert!(
            date1904_flag(br#"<workbook><workbookPr date1904="true"></workbookPr></workbook>"#)
                .unwrap()
        );
        assert!(!date1904_flag(br#"<workbook><workbookPr date1904="0"/></workbook>"#).unwrap());
        assert!(!date1904_flag(br#"<workbook><workbookPr codeName="x"/></workbook>"#).unwrap());
        assert!(!date1904_flag(b"<workbook><sheets/></workbook>").unwrap());
    }

    #[test]
    fn test_read_from_archive() {
        let data = archive_with_workbook(r#"<workbook><workbookPr date1904="1"/></workbook>"#);
        let metadata = WorkbookMetadata::read(Cursor::new(data), &SecurityConfig::default()).unwrap();
        assert!(metadata.date1904());
    }

    #[test]
    fn test_archive_limits_checked_first() {
        let data = archive_with_workbook(r#"<workbook><workbookPr date1904="1"/></workbook>"#);
        let config = SecurityConfig {
            max_file_size: 8,
            ..SecurityConfig::default()
        };
        let result = WorkbookMetadata::read(Cursor::new(data), &config);
        assert!(matches!(result, Err(ErrStatError::SecurityViolation(_))));
    }

    #[test]
    fn test_rejects_non_zip() {
        let result = WorkbookMetadata::read(
            Cursor::new(b"not a zip".to_vec()),
            &SecurityConfig::default(),
        );
        assert!(matches!(result, Err(ErrStatError::Zip(_))));
    }
}
