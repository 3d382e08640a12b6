//! Security Tests
//!
//! セキュリティ対策のテストケースを実装します。
//! ZIP bomb攻撃、パストラバーサル攻撃、過大な入力ファイルへの対策を
//! エラーログとレポートワークブックの両方について検証します。

use std::io::{Cursor, Write};

use chrono::NaiveDate;
use errstat::{DateSource, ErrStatError, ProcessorBuilder, SecurityConfig};
use rust_xlsxwriter::Workbook;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

fn processor(config: SecurityConfig) -> errstat::ErrorLogProcessor {
    ProcessorBuilder::new()
        .with_date_source(DateSource::Explicit(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()))
        .with_security_config(config)
        .build()
        .unwrap()
}

fn log_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in ["ERROR_MESSAGE", "START_TIME", "END_TIME", "ERROR_LEVEL", "ERROR_CODE"]
        .iter()
        .enumerate()
    {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

fn report_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let utilization = workbook.add_worksheet();
    utilization.set_name("20250105_Utilization").unwrap();
    utilization.write_string(0, 0, "Used OHTs").unwrap();
    utilization.write_number(1, 0, 10.0).unwrap();

    let weekly = workbook.add_worksheet();
    weekly.set_name("Weekly_Report").unwrap();
    for (col, header) in [
        "Date",
        "Avg EXECUTE PERIOD",
        "OHT Utilization (%)",
        "Failure Rate (%)",
        "Transfer Count",
    ]
    .iter()
    .enumerate()
    {
        weekly.write_string(0, col as u16, *header).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

fn zip_with_entry(name: &str) -> Vec<u8> {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(name, options).unwrap();
        zip.write_all(b"test").unwrap();
        zip.finish().unwrap();
    }
    zip_data
}

fn expect_violation(
    result: errstat::Result<(Vec<u8>, errstat::RunSummary)>,
    needle: &str,
) {
    match result {
        Err(ErrStatError::SecurityViolation(msg)) => {
            assert!(msg.contains(needle), "unexpected message: {}", msg);
        }
        other => panic!("Expected SecurityViolation, got {:?}", other.map(|(_, s)| s)),
    }
}

/// 正常なファイルはデフォルト設定で処理できる
#[test]
fn test_valid_files_pass() {
    let result = processor(SecurityConfig::default()).process_buffers(
        log_workbook(),
        "log.xlsx",
        report_workbook(),
    );
    assert!(result.is_ok(), "{:?}", result.map(|(_, s)| s));
}

/// ZIP bomb攻撃のテスト: ファイル数の上限
#[test]
fn test_too_many_files() {
    let config = SecurityConfig {
        max_file_count: 2,
        ..SecurityConfig::default()
    };
    expect_violation(
        processor(config).process_buffers(log_workbook(), "log.xlsx", report_workbook()),
        "too many files",
    );
}

/// ZIP bomb攻撃のテスト: 単一エントリのサイズ上限
#[test]
fn test_entry_too_large() {
    let config = SecurityConfig {
        max_file_size: 16,
        ..SecurityConfig::default()
    };
    expect_violation(
        processor(config).process_buffers(log_workbook(), "log.xlsx", report_workbook()),
        "exceeds maximum size",
    );
}

/// ZIP bomb攻撃のテスト: 展開後の合計サイズ上限
#[test]
fn test_total_decompressed_size() {
    let config = SecurityConfig {
        max_decompressed_size: 1024,
        ..SecurityConfig::default()
    };
    expect_violation(
        processor(config).process_buffers(log_workbook(), "log.xlsx", report_workbook()),
        "decompressed size",
    );
}

/// ファイルサイズ制限のテスト: 入力ファイルが大きすぎる場合
#[test]
fn test_input_file_size_limit() {
    let config = SecurityConfig {
        max_input_file_size: 64,
        ..SecurityConfig::default()
    };
    expect_violation(
        processor(config).process_buffers(log_workbook(), "log.xlsx", report_workbook()),
        "Input file size",
    );
}

/// レポートワークブック側にも制限が適用される
#[test]
fn test_limits_apply_to_report_workbook() {
    let log = log_workbook();
    let report = report_workbook();
    assert!(report.len() > log.len());
    let config = SecurityConfig {
        max_input_file_size: log.len() as u64,
        ..SecurityConfig::default()
    };

    let result = processor(config).process_buffers(log, "log.xlsx", report);
    expect_violation(result, "Input file size");
}

/// パストラバーサル攻撃のテスト: `..`を含むパス
#[test]
fn test_path_traversal_dotdot() {
    let result = processor(SecurityConfig::default()).process_buffers(
        zip_with_entry("../etc/passwd"),
        "log.xlsx",
        report_workbook(),
    );
    expect_violation(result, "Invalid ZIP path");
}

/// パストラバーサル攻撃のテスト: 絶対パス
#[test]
fn test_path_traversal_absolute_path() {
    let result = processor(SecurityConfig::default()).process_buffers(
        zip_with_entry("/etc/passwd"),
        "log.xlsx",
        report_workbook(),
    );

    // ZIPライブラリがパスを正規化した場合はXLSXとして認識されずパースエラーになる
    match result {
        Err(ErrStatError::SecurityViolation(msg)) => {
            assert!(msg.contains("Invalid ZIP path"));
        }
        Err(ErrStatError::Parse(_)) | Err(ErrStatError::Zip(_)) => {}
        other => panic!("Unexpected result: {:?}", other.map(|(_, s)| s)),
    }
}

/// パストラバーサル攻撃のテスト: レポートワークブック側
#[test]
fn test_path_traversal_in_report_workbook() {
    let result = processor(SecurityConfig::default()).process_buffers(
        log_workbook(),
        "log.xlsx",
        zip_with_entry("xl/../../etc/passwd"),
    );
    expect_violation(result, "Invalid ZIP path");
}
