//! Security Module
//!
//! エラーログとレポートワークブックを読み込む前の入力検査。
//! 巨大な入力ファイル、ZIP bomb、アーカイブ外を指すエントリ名を拒否します。

use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::error::{ErrStatError, Result};

const MIB: u64 = 1024 * 1024;

/// 入力ワークブックに適用する上限
///
/// エラーログとレポートワークブックの両方に同じ値を使います。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// アーカイブ展開後の合計サイズ上限（バイト、既定 1GiB）
    pub max_decompressed_size: u64,
    /// アーカイブ内のエントリ数上限（既定 10000）
    pub max_file_count: usize,
    /// 1エントリの展開後サイズ上限（バイト、既定 100MiB）
    pub max_file_size: u64,
    /// 入力ファイルそのもののサイズ上限（バイト、既定 2GiB）
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 1024 * MIB,
            max_file_count: 10_000,
            max_file_size: 100 * MIB,
            max_input_file_size: 2048 * MIB,
        }
    }
}

impl SecurityConfig {
    /// すべての上限が0より大きいかを検証
    pub(crate) fn validate(&self) -> Result<()> {
        let limits = [
            ("max_decompressed_size", self.max_decompressed_size),
            ("max_file_count", self.max_file_count as u64),
            ("max_file_size", self.max_file_size),
            ("max_input_file_size", self.max_input_file_size),
        ];
        match limits.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ErrStatError::Config(format!(
                "Security limit {} must be greater than zero",
                name
            ))),
            None => Ok(()),
        }
    }

    /// 入力ファイルのサイズを検査
    pub(crate) fn check_input_size(&self, len: u64) -> Result<()> {
        if len > self.max_input_file_size {
            return Err(violation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                len, self.max_input_file_size
            )));
        }
        Ok(())
    }

    /// ZIPコンテナを展開せずに検査
    ///
    /// エントリ数、各エントリ名、宣言された展開後サイズとその合計を
    /// セントラルディレクトリの情報だけで確認します。
    pub(crate) fn check_archive<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<()> {
        let entry_count = archive.len();
        if entry_count > self.max_file_count {
            return Err(violation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                entry_count, self.max_file_count
            )));
        }

        let mut declared_total = 0u64;
        for index in 0..entry_count {
            let entry = archive
                .by_index(index)
                .map_err(|e| ErrStatError::Zip(e.to_string()))?;
            check_entry_path(entry.name())?;

            let size = entry.size();
            if size > self.max_file_size {
                return Err(violation(format!(
                    "Entry '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    entry.name(),
                    size,
                    self.max_file_size
                )));
            }

            declared_total = declared_total.saturating_add(size);
            if declared_total > self.max_decompressed_size {
                return Err(violation(format!(
                    "Archive decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    declared_total, self.max_decompressed_size
                )));
            }
        }

        Ok(())
    }
}

fn violation(message: String) -> ErrStatError {
    ErrStatError::SecurityViolation(message)
}

/// アーカイブのエントリ名がアーカイブ内の相対パスかを検査
///
/// 区切り文字は`/`のみ許可し、`..`のセグメント、先頭の`/`、
/// ドライブ指定（`C:`）を含む名前を拒否します。
fn check_entry_path(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("empty entry name")
    } else if name.contains('\\') {
        Some("backslash separator")
    } else if name.starts_with('/') || name.split('/').next().is_some_and(|s| s.contains(':')) {
        Some("absolute path")
    } else if name.split('/').any(|segment| segment == "..") {
        Some("parent directory segment")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(violation(format!(
            "Invalid ZIP path '{}': {}",
            name, reason
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(name: &str) -> bool {
        matches!(
            check_entry_path(name),
            Err(ErrStatError::SecurityViolation(msg)) if msg.contains("Invalid ZIP path")
        )
    }

    #[test]
    fn test_workbook_entries_accepted() {
        for name in [
            "[Content_Types].xml",
            "xl/workbook.xml",
            "xl/worksheets/sheet1.xml",
            "xl/_rels/workbook.xml.rels",
            "content.xml",
        ] {
            assert!(check_entry_path(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_escaping_entries_rejected() {
        for name in [
            "",
            "../etc/passwd",
            "xl/../../etc/passwd",
            "xl/..",
            "/etc/passwd",
            "C:/Windows/system32",
            "c:\\xl\\workbook.xml",
            "xl\\workbook.xml",
        ] {
            assert!(rejected(name), "{}", name);
        }
    }

    #[test]
    fn test_dots_inside_names_allowed() {
        assert!(check_entry_path("xl/media/image..png").is_ok());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SecurityConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let config = SecurityConfig {
            max_file_count: 0,
            ..SecurityConfig::default()
        };
        match config.validate() {
            Err(ErrStatError::Config(msg)) => assert!(msg.contains("max_file_count")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_check_input_size() {
        let config = SecurityConfig {
            max_input_file_size: 10,
            ..SecurityConfig::default()
        };
        assert!(config.check_input_size(10).is_ok());
        assert!(matches!(
            config.check_input_size(11),
            Err(ErrStatError::SecurityViolation(_))
        ));
    }
}
