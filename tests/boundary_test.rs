//! Boundary Tests for errstat
//!
//! Edge cases of the input log, the utilization sheet and the weekly report.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::NaiveDate;
use errstat::{DateSource, ErrStatError, ProcessorBuilder};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

// Helper module for generating boundary test fixtures
mod fixtures {
    use super::*;

    pub const WEEKLY_HEADER: [&str; 5] = [
        "Date",
        "Avg EXECUTE PERIOD",
        "OHT Utilization (%)",
        "Failure Rate (%)",
        "Transfer Count",
    ];

    /// Error log from raw rows (first row is the header)
    pub fn log(rows: &[&[&str]]) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    worksheet.write_string(r as u32, c as u16, *value)?;
                }
            }
        }
        Ok(workbook.save_to_buffer()?)
    }

    pub fn header_only_log() -> Result<Vec<u8>, XlsxError> {
        log(&[&[
            "ERROR_MESSAGE",
            "START_TIME",
            "END_TIME",
            "ERROR_LEVEL",
            "ERROR_CODE",
        ]])
    }

    /// Report workbook for 2025-01-05 with the given used-OHT cell and weekly header
    pub fn report(used_ohts: Option<f64>, weekly_header: &[&str]) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();

        let utilization = workbook.add_worksheet();
        utilization.set_name("20250105_Utilization")?;
        utilization.write_string(0, 0, "Used OHTs")?;
        if let Some(value) = used_ohts {
            utilization.write_number(1, 0, value)?;
        }

        let weekly = workbook.add_worksheet();
        weekly.set_name("Weekly_Report")?;
        for (col, header) in weekly_header.iter().enumerate() {
            weekly.write_string(0, col as u16, *header)?;
        }
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        weekly.write_number_with_format(1, 0, 45662.0, &date_format)?;

        Ok(workbook.save_to_buffer()?)
    }
}

fn processor() -> errstat::ErrorLogProcessor {
    ProcessorBuilder::new()
        .with_date_source(DateSource::Explicit(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()))
        .build()
        .unwrap()
}

fn range(bytes: &[u8], sheet: &str) -> Range<Data> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).unwrap();
    workbook.worksheet_range(sheet).unwrap()
}

fn cell(range: &Range<Data>, row: u32, col: u32) -> Data {
    range.get_value((row, col)).cloned().unwrap_or(Data::Empty)
}

/// TC-B-001: Empty log produces a zero failure rate
#[test]
fn test_empty_log() {
    let (output, summary) = processor()
        .process_buffers(
            fixtures::header_only_log().unwrap(),
            "log.xlsx",
            fixtures::report(Some(10.0), &fixtures::WEEKLY_HEADER).unwrap(),
        )
        .unwrap();

    assert_eq!(summary.total_count, 0);
    assert_eq!(summary.group_count, 0);
    assert_eq!(summary.failure_rate, 0.0);

    let stats = range(&output, "20250105_errorStatistics");
    assert_eq!(
        cell(&stats, 1, 0),
        Data::String("Failure Rate".to_string())
    );
    assert_eq!(cell(&stats, 1, 3), Data::String("0.00%".to_string()));

    let weekly = range(&output, "Weekly_Report");
    assert_eq!(cell(&weekly, 1, 3), Data::Float(0.0));
    assert_eq!(cell(&weekly, 2, 0), Data::String("Weekly Avg".to_string()));
    assert_eq!(cell(&weekly, 2, 3), Data::Float(0.0));
    // 値のない列の平均は空欄、合計は0
    assert_eq!(cell(&weekly, 2, 1), Data::Empty);
    assert_eq!(cell(&weekly, 2, 4), Data::Float(0.0));
}

/// TC-B-002: Every missing log column is reported
#[test]
fn test_log_missing_columns() {
    let log = fixtures::log(&[&["ERROR_MESSAGE", "ERROR_LEVEL", "ERROR_CODE"]]).unwrap();
    let result = processor().process_buffers(
        log,
        "log.xlsx",
        fixtures::report(Some(10.0), &fixtures::WEEKLY_HEADER).unwrap(),
    );

    match result {
        Err(ErrStatError::Schema { missing, .. }) => {
            assert_eq!(missing, vec!["END_TIME", "START_TIME"]);
        }
        other => panic!("Expected Schema error, got {:?}", other.map(|(_, s)| s)),
    }
}

/// TC-B-003: Zero or absent used OHTs
#[test]
fn test_invalid_utilization() {
    for used in [Some(0.0), Some(-1.0), None] {
        let result = processor().process_buffers(
            fixtures::header_only_log().unwrap(),
            "log.xlsx",
            fixtures::report(used, &fixtures::WEEKLY_HEADER).unwrap(),
        );
        assert!(
            matches!(result, Err(ErrStatError::InvalidUtilization { .. })),
            "used OHTs {:?} should be rejected",
            used
        );
    }
}

/// TC-B-004: Weekly_Report without the required columns
#[test]
fn test_weekly_missing_columns() {
    let result = processor().process_buffers(
        fixtures::header_only_log().unwrap(),
        "log.xlsx",
        fixtures::report(Some(10.0), &["Date", "Failure Rate (%)"]).unwrap(),
    );

    match result {
        Err(ErrStatError::Schema { sheet, missing }) => {
            assert_eq!(sheet, "Weekly_Report");
            assert_eq!(
                missing,
                vec!["Avg EXECUTE PERIOD", "OHT Utilization (%)", "Transfer Count"]
            );
        }
        other => panic!("Expected Schema error, got {:?}", other.map(|(_, s)| s)),
    }
}

/// TC-B-005: Extra weekly columns are carried through
#[test]
fn test_weekly_extra_columns() {
    let mut header = fixtures::WEEKLY_HEADER.to_vec();
    header.push("Comment");

    let (output, _) = processor()
        .process_buffers(
            fixtures::header_only_log().unwrap(),
            "log.xlsx",
            fixtures::report(Some(10.0), &header).unwrap(),
        )
        .unwrap();

    let weekly = range(&output, "Weekly_Report");
    assert_eq!(cell(&weekly, 0, 5), Data::String("Comment".to_string()));
    assert_eq!(cell(&weekly, 2, 5), Data::Empty);
}

/// TC-B-006: Unparseable timestamps and text error codes
#[test]
fn test_permissive_log_values() {
    let log = fixtures::log(&[
        &[
            "ERROR_CODE",
            "ERROR_LEVEL",
            "ERROR_MESSAGE",
            "START_TIME",
            "END_TIME",
            "VEHICLE",
        ],
        &["1002", "Alarm", "Jam", "not a time", "2025/01/05 10:00", "OHT-1"],
        &["1002", "Alarm", "Jam", "2025-01-05T08:00:00", "", "OHT-2"],
        &["", "", "", "", "", ""],
        &["1001", "Alarm", "Jam", "2025-01-05 09:00:00", "", "OHT-3"],
    ])
    .unwrap();

    let (output, summary) = processor()
        .process_buffers(
            log,
            "log.xlsx",
            fixtures::report(Some(1.0), &fixtures::WEEKLY_HEADER).unwrap(),
        )
        .unwrap();

    assert_eq!(summary.total_count, 2);
    assert_eq!(summary.group_count, 1);

    let stats = range(&output, "20250105_errorStatistics");
    assert_eq!(cell(&stats, 1, 0), Data::String("Jam".to_string()));
    assert_eq!(cell(&stats, 1, 3), Data::Float(2.0));
    // 開始時刻のある行が先、欠損した行が後
    assert!(matches!(cell(&stats, 2, 1), Data::DateTime(_)));
    assert_eq!(cell(&stats, 3, 1), Data::Empty);
    assert!(matches!(cell(&stats, 3, 2), Data::DateTime(_)));
    // 2 / (1 * 24)
    assert_eq!(cell(&stats, 4, 3), Data::String("8.33%".to_string()));
}

/// TC-B-007: Sheet date falls back to the reference date when the name has no date
#[test]
fn test_reference_date_fallback() {
    let processor = ProcessorBuilder::new()
        .with_reference_date(NaiveDate::from_ymd_opt(2025, 1, 6).unwrap())
        .build()
        .unwrap();

    let (_, summary) = processor
        .process_buffers(
            fixtures::header_only_log().unwrap(),
            "ErrorTimeStatistics.xlsx",
            fixtures::report(Some(10.0), &fixtures::WEEKLY_HEADER).unwrap(),
        )
        .unwrap();

    assert_eq!(summary.statistics_sheet, "20250105_errorStatistics");
    assert_eq!(summary.weekly_row_updated, Some(0));
}

/// TC-B-008: Input that is not a spreadsheet
#[test]
fn test_garbage_input() {
    let result = processor().process_buffers(
        b"definitely not a workbook".to_vec(),
        "log.xlsx",
        fixtures::report(Some(10.0), &fixtures::WEEKLY_HEADER).unwrap(),
    );
    assert!(result.is_err());
}

/// TC-B-009: Unparseable weekly cells and untouched rows keep their values
#[test]
fn test_weekly_cells_outside_update_are_kept() {
    let mut workbook = Workbook::new();
    let utilization = workbook.add_worksheet();
    utilization.set_name("20250105_Utilization").unwrap();
    utilization.write_string(0, 0, "Used OHTs").unwrap();
    utilization.write_number(1, 0, 10.0).unwrap();

    let weekly = workbook.add_worksheet();
    weekly.set_name("Weekly_Report").unwrap();
    for (col, header) in fixtures::WEEKLY_HEADER.iter().enumerate() {
        weekly.write_string(0, col as u16, *header).unwrap();
    }
    weekly.write_string(1, 0, "2025-01-04").unwrap();
    weekly.write_string(1, 1, "n/a").unwrap();
    weekly.write_number(1, 2, 85.5).unwrap();
    weekly.write_string(1, 4, "pending").unwrap();
    // 3行目は空行
    weekly.write_string(3, 0, "2025-01-05").unwrap();
    weekly.write_number(3, 4, 120.0).unwrap();
    let report = workbook.save_to_buffer().unwrap();

    let (output, summary) = processor()
        .process_buffers(fixtures::header_only_log().unwrap(), "log.xlsx", report)
        .unwrap();
    assert_eq!(summary.weekly_row_updated, Some(2));

    let weekly = range(&output, "Weekly_Report");
    assert_eq!(cell(&weekly, 1, 0), Data::String("2025-01-04".to_string()));
    assert_eq!(cell(&weekly, 1, 1), Data::String("n/a".to_string()));
    assert_eq!(cell(&weekly, 1, 2), Data::Float(85.5));
    assert_eq!(cell(&weekly, 1, 4), Data::String("pending".to_string()));
    assert_eq!(cell(&weekly, 2, 0), Data::Empty);

    assert_eq!(cell(&weekly, 3, 0), Data::String("2025-01-05".to_string()));
    assert_eq!(cell(&weekly, 3, 3), Data::Float(0.0));
    assert_eq!(cell(&weekly, 3, 4), Data::Float(120.0));

    assert_eq!(cell(&weekly, 4, 0), Data::String("Weekly Avg".to_string()));
    assert_eq!(cell(&weekly, 4, 4), Data::Float(120.0));
}

/// TC-B-010: A report workbook that is not xlsx / xlsm is rejected untouched
#[test]
fn test_non_xlsx_report_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("log.xlsx");
    std::fs::write(&input_path, fixtures::header_only_log().unwrap()).unwrap();

    // OLE2ヘッダー（xls）と、xl/workbook.xmlのないZIP（ods相当）
    let mut ods = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut ods));
        zip.start_file("content.xml", zip::write::FileOptions::default())
            .unwrap();
        std::io::Write::write_all(&mut zip, b"<office:document-content/>").unwrap();
        zip.finish().unwrap();
    }
    let legacy = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1 legacy workbook".to_vec();

    for (name, original) in [("report.xls", legacy), ("report.ods", ods)] {
        let workbook_path = dir.path().join(name);
        std::fs::write(&workbook_path, &original).unwrap();

        let result = processor().run(&input_path, &workbook_path);
        match result {
            Err(ErrStatError::Config(msg)) => assert!(msg.contains(".xlsx or .xlsm"), "{}", msg),
            other => panic!("Expected Config error for {}, got {:?}", name, other),
        }
        assert_eq!(std::fs::read(&workbook_path).unwrap(), original);
    }
}
