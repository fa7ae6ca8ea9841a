//! 파일 기반 저장소.
//!
//! - `table`: 출력 테이블 CSV와 upsert 병합
//! - `timeseries`: 일자별 스냅샷 + 메타데이터 원장
//! - `codes`: 종목 코드 파일과 타임스탬프 백업

pub mod codes;
pub mod table;
pub mod timeseries;

use std::path::Path;

use crate::error::Result;

pub use codes::save_codes;
pub use table::{merge_results, MergeOutcome, MergeStats, OutputTable};
pub use timeseries::{
    CleanupReport, LedgerEntry, MetadataLedger, QueryFrame, QueryRow, StoreStatistics,
    TimeSeriesStore,
};

/// 같은 디렉터리의 임시 파일에 쓴 뒤 rename으로 교체합니다.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
