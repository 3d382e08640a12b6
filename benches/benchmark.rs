//! パフォーマンスベンチマーク
//!
//! このモジュールは、errstatクレートのパフォーマンスを測定するためのベンチマークを提供します。
//!
//! 実装するベンチマーク:
//! - 集計（抽出・グループ化・レポート構築）のスループット
//! - エンドツーエンド処理（読み込み〜書き出し、メモリ上）

use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use errstat::{aggregate, DateSource, ErrorRecord, ProcessorBuilder};
use rust_xlsxwriter::Workbook;

const MESSAGES: [&str; 8] = [
    "Door open",
    "Track jam",
    "Obstacle detected",
    "Hoist timeout",
    "Power low",
    "Comm lost",
    "Barcode misread",
    "Overload",
];

const CODES: [&str; 4] = ["1002", "1001", "1100", "2001"];

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 5)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// 決定的な疑似レコードを生成
fn generate_records(n: usize) -> Vec<ErrorRecord> {
    (0..n)
        .map(|i| {
            let start = base_time() + Duration::seconds(((i * 7919) % 86_400) as i64);
            ErrorRecord {
                error_message: MESSAGES[i % MESSAGES.len()].to_string(),
                start_time: (i % 17 != 0).then_some(start),
                end_time: Some(start + Duration::seconds(90)),
                error_level: if i % 5 == 0 { "Warning" } else { "Alarm" }.to_string(),
                error_code: CODES[i % CODES.len()].to_string(),
            }
        })
        .collect()
}

fn benchmark_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for size in [1_000usize, 10_000, 100_000] {
        let records = generate_records(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| aggregate(black_box(records), true));
        });
    }

    group.finish();
}

fn log_fixture(rows: usize) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in ["ERROR_MESSAGE", "START_TIME", "END_TIME", "ERROR_LEVEL", "ERROR_CODE"]
        .iter()
        .enumerate()
    {
        let _ = worksheet.write_string(0, col as u16, *header);
    }
    for (i, record) in generate_records(rows).iter().enumerate() {
        let row = i as u32 + 1;
        let time = |t: Option<NaiveDateTime>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        };
        let _ = worksheet.write_string(row, 0, &record.error_message);
        let _ = worksheet.write_string(row, 1, time(record.start_time));
        let _ = worksheet.write_string(row, 2, time(record.end_time));
        let _ = worksheet.write_string(row, 3, &record.error_level);
        let _ = worksheet.write_string(row, 4, &record.error_code);
    }
    workbook.save_to_buffer().unwrap_or_default()
}

fn report_fixture() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let utilization = workbook.add_worksheet();
    let _ = utilization.set_name("20250105_Utilization");
    let _ = utilization.write_string(0, 0, "Used OHTs");
    let _ = utilization.write_number(1, 0, 120.0);

    let weekly = workbook.add_worksheet();
    let _ = weekly.set_name("Weekly_Report");
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
        let _ = weekly.write_string(0, col as u16, *header);
    }
    for day in 0..7u32 {
        let _ = weekly.write_string(day + 1, 0, format!("2025-01-{:02}", day + 1));
        let _ = weekly.write_number(day + 1, 4, 1000.0);
    }
    workbook.save_to_buffer().unwrap_or_default()
}

fn benchmark_end_to_end(c: &mut Criterion) {
    let Some(date) = NaiveDate::from_ymd_opt(2025, 1, 5) else {
        return;
    };
    let processor = match ProcessorBuilder::new()
        .with_date_source(DateSource::Explicit(date))
        .with_total_row(true)
        .build()
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Warning: failed to build processor: {}. Skipping benchmark.", e);
            return;
        }
    };

    let log = log_fixture(5_000);
    let report = report_fixture();

    let mut group = c.benchmark_group("end_to_end");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(log.len() as u64));
    group.bench_function("5000_rows", |b| {
        b.iter(|| {
            let result = processor.process_buffers(
                black_box(log.clone()),
                "ErrorTimeStatistics.xlsx",
                black_box(report.clone()),
            );
            black_box(result.is_ok())
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_aggregate, benchmark_end_to_end);
criterion_main!(benches);
