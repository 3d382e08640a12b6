//! Aggregation Module
//!
//! アラームレベルのエラーを抽出し、エラーメッセージ単位で集計するモジュール。

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::info;

use crate::types::{ErrorGroup, ErrorRecord, ReportRow, StatisticsReport};

/// 集計対象のエラーレベル
pub const ALARM_LEVEL: &str = "Alarm";

/// 集計対象から除外するエラーコード
pub const EXCLUDED_CODE: &str = "1001";

/// 集計対象かどうかを判定
///
/// `error_level == "Alarm"` かつ `error_code`が`"1"`で始まり、`"1001"`ではないもの。
pub fn is_reportable(record: &ErrorRecord) -> bool {
    record.error_level == ALARM_LEVEL
        && record.error_code.starts_with('1')
        && record.error_code != EXCLUDED_CODE
}

/// 開始時刻の比較（`None`は末尾）
fn cmp_start(a: &Option<NaiveDateTime>, b: &Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 集計対象のレコードをエラーメッセージごとにグループ化
///
/// グループはメッセージの辞書順（バイト順）に並び、グループ内は開始時刻の昇順に
/// 安定ソートされます。開始時刻が欠損しているレコードはグループの末尾に並びます。
pub fn group_records(records: &[ErrorRecord]) -> Vec<ErrorGroup> {
    let mut groups: BTreeMap<&str, Vec<ErrorRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| is_reportable(r)) {
        groups
            .entry(record.error_message.as_str())
            .or_default()
            .push(record.clone());
    }

    groups
        .into_iter()
        .map(|(message, mut records)| {
            // sort_byは安定ソート
            records.sort_by(|a, b| cmp_start(&a.start_time, &b.start_time));
            ErrorGroup {
                message: message.to_string(),
                records,
            }
        })
        .collect()
}

/// グループからエラー統計シートの本体を構築
///
/// 各グループについて集計行を1行、続いて明細行をレコード数だけ出力します。
/// `emit_total_row`が`true`の場合は末尾に合計行を追加します。
/// 故障率行はこの段階では追加しません（[`StatisticsReport::push_failure_rate`]）。
pub fn build_report(groups: &[ErrorGroup], emit_total_row: bool) -> StatisticsReport {
    let mut rows = Vec::new();
    let mut total_count = 0usize;

    for group in groups {
        let count = group.count();
        total_count += count;

        rows.push(ReportRow::Summary {
            message: group.message.clone(),
            min_start: group.min_start(),
            max_end: group.max_end(),
            count,
        });
        rows.extend(group.records.iter().map(|r| ReportRow::Detail {
            start: r.start_time,
            end: r.end_time,
        }));
    }

    if emit_total_row {
        rows.push(ReportRow::Total { count: total_count });
    }

    StatisticsReport {
        rows,
        total_count,
        group_count: groups.len(),
    }
}

/// 抽出・グループ化・レポート本体の構築をまとめて行う
pub fn aggregate(records: &[ErrorRecord], emit_total_row: bool) -> StatisticsReport {
    let groups = group_records(records);
    let report = build_report(&groups, emit_total_row);
    info!(
        "Aggregated {} alarm records into {} groups",
        report.total_count, report.group_count
    );
    report
}

impl StatisticsReport {
    /// 故障率行を末尾に追加
    pub fn push_failure_rate(&mut self, display: String) {
        self.rows.push(ReportRow::FailureRate { display });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn record(message: &str, level: &str, code: &str, start: Option<&str>) -> ErrorRecord {
        ErrorRecord {
            error_message: message.to_string(),
            start_time: start.map(dt),
            end_time: start.map(dt),
            error_level: level.to_string(),
            error_code: code.to_string(),
        }
    }

    #[test]
    fn test_filter_rules() {
        assert!(is_reportable(&record("M", "Alarm", "1002", None)));
        assert!(is_reportable(&record("M", "Alarm", "1", None)));
        assert!(!is_reportable(&record("M", "Alarm", "1001", None)));
        assert!(!is_reportable(&record("M", "Alarm", "2001", None)));
        assert!(!is_reportable(&record("M", "Warning", "1002", None)));
        assert!(!is_reportable(&record("M", "alarm", "1002", None)));
        assert!(!is_reportable(&record("M", "Alarm", "", None)));
    }

    #[test]
    fn test_only_1002_survives() {
        let records = vec![
            record("M1", "Alarm", "1002", Some("2025-01-01 01:00:00")),
            record("M1", "Alarm", "1001", Some("2025-01-01 02:00:00")),
            record("M2", "Alarm", "2001", Some("2025-01-01 03:00:00")),
        ];

        let report = aggregate(&records, true);
        assert_eq!(report.total_count, 1);
        assert_eq!(report.group_count, 1);
        assert_eq!(
            report.rows,
            vec![
                ReportRow::Summary {
                    message: "M1".to_string(),
                    min_start: Some(dt("2025-01-01 01:00:00")),
                    max_end: Some(dt("2025-01-01 01:00:00")),
                    count: 1,
                },
                ReportRow::Detail {
                    start: Some(dt("2025-01-01 01:00:00")),
                    end: Some(dt("2025-01-01 01:00:00")),
                },
                ReportRow::Total { count: 1 },
            ]
        );
    }

    #[test]
    fn test_groups_sorted_by_message() {
        let records = vec![
            record("b", "Alarm", "1002", None),
            record("B", "Alarm", "1002", None),
            record("a", "Alarm", "1002", None),
        ];
        let groups = group_records(&records);
        let names: Vec<&str> = groups.iter().map(|g| g.message.as_str()).collect();
        assert_eq!(names, vec!["B", "a", "b"]);
    }

    #[test]
    fn test_members_sorted_nulls_last_and_stable() {
        let mut first_null = record("M", "Alarm", "1002", None);
        first_null.error_code = "1010".to_string();
        let mut second_null = record("M", "Alarm", "1002", None);
        second_null.error_code = "1020".to_string();

        let records = vec![
            first_null,
            record("M", "Alarm", "1002", Some("2025-01-01 09:00:00")),
            second_null,
            record("M", "Alarm", "1002", Some("2025-01-01 08:00:00")),
        ];

        let groups = group_records(&records);
        let codes: Vec<(&str, Option<NaiveDateTime>)> = groups[0]
            .records
            .iter()
            .map(|r| (r.error_code.as_str(), r.start_time))
            .collect();

        assert_eq!(
            codes,
            vec![
                ("1002", Some(dt("2025-01-01 08:00:00"))),
                ("1002", Some(dt("2025-01-01 09:00:00"))),
                ("1010", None),
                ("1020", None),
            ]
        );
    }

    #[test]
    fn test_total_row_is_optional() {
        let records = vec![record("M1", "Alarm", "1002", None)];
        let report = aggregate(&records, false);
        assert!(!report
            .rows
            .iter()
            .any(|r| matches!(r, ReportRow::Total { .. })));
        assert_eq!(report.total_count, 1);
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate(&[], true);
        assert_eq!(report.rows, vec![ReportRow::Total { count: 0 }]);
        assert_eq!(report.group_count, 0);
    }

    #[test]
    fn test_push_failure_rate() {
        let mut report = aggregate(&[], false);
        report.push_failure_rate("10.00%".to_string());
        assert_eq!(
            report.rows.last(),
            Some(&ReportRow::FailureRate {
                display: "10.00%".to_string()
            })
        );
    }

    fn arb_record() -> impl Strategy<Value = ErrorRecord> {
        (
            prop::sample::select(vec!["M1", "M2", "M3", "Door open"]),
            prop::sample::select(vec!["Alarm", "Warning"]),
            prop::sample::select(vec!["1001", "1002", "1100", "2001", "19"]),
            prop::option::of(0i64..100_000),
        )
            .prop_map(|(message, level, code, offset)| ErrorRecord {
                error_message: message.to_string(),
                start_time: offset.map(|s| dt("2025-01-01 00:00:00") + chrono::Duration::seconds(s)),
                end_time: None,
                error_level: level.to_string(),
                error_code: code.to_string(),
            })
    }

    proptest! {
        #[test]
        fn prop_summary_count_matches_detail_rows(records in prop::collection::vec(arb_record(), 0..60)) {
            let report = aggregate(&records, false);
            let rows = &report.rows;
            let mut i = 0;
            while i < rows.len() {
                match &rows[i] {
                    ReportRow::Summary { count, .. } => {
                        let details = rows[i + 1..]
                            .iter()
                            .take_while(|r| matches!(r, ReportRow::Detail { .. }))
                            .count();
                        prop_assert_eq!(*count, details);
                        i += details + 1;
                    }
                    other => prop_assert!(false, "unexpected row {:?}", other),
                }
            }
        }

        #[test]
        fn prop_total_equals_sum_of_counts(records in prop::collection::vec(arb_record(), 0..60)) {
            let report = aggregate(&records, true);
            let sum: usize = report
                .rows
                .iter()
                .filter_map(|r| match r {
                    ReportRow::Summary { count, .. } => Some(*count),
                    _ => None,
                })
                .sum();
            let expected = records.iter().filter(|r| is_reportable(r)).count();
            prop_assert_eq!(sum, expected);
            prop_assert_eq!(report.rows.last(), Some(&ReportRow::Total { count: sum }));
        }
    }
}
