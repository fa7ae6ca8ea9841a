//! 종목 코드 파일 저장.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use kabu_core::StockCode;

use super::write_atomic;
use crate::error::Result;

/// 코드 목록을 한 줄에 하나씩 (헤더 없이) 저장하고 타임스탬프 백업을 남깁니다.
///
/// 백업 파일명: `codes_backup_%Y%m%d_%H%M%S.csv`. 백업 경로를 반환합니다.
pub fn save_codes(
    codes: &[StockCode],
    path: &Path,
    backup_dir: &Path,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    let mut content = String::with_capacity(codes.len() * 5);
    for code in codes {
        content.push_str(&code.to_string());
        content.push('\n');
    }

    write_atomic(path, content.as_bytes())?;
    tracing::info!(path = %path.display(), count = codes.len(), "종목 코드 파일 저장");

    let backup_path = backup_dir.join(format!("codes_backup_{}.csv", now.format("%Y%m%d_%H%M%S")));
    write_atomic(&backup_path, content.as_bytes())?;
    tracing::info!(path = %backup_path.display(), "종목 코드 백업 저장");

    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_save_codes_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let codes: Vec<StockCode> = ["13", "7203"].iter().map(|c| c.parse().unwrap()).collect();
        let now = Local.with_ymd_and_hms(2024, 1, 5, 9, 30, 15).unwrap();

        let path = dir.path().join("codes.csv");
        let backup = save_codes(&codes, &path, &dir.path().join("backup"), now).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0013\n7203\n");
        assert_eq!(
            backup.file_name().unwrap().to_str().unwrap(),
            "codes_backup_20240105_093015.csv"
        );
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "0013\n7203\n");
    }
}
