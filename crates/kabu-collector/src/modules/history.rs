//! 시계열 조회/정리.

use chrono::NaiveDate;
use kabu_data::{CleanupReport, QueryFrame, StoreStatistics, TimeSeriesStore};

use crate::config::PathsConfig;
use crate::Result;

/// 저장소 통계를 조회하고 로그로 남깁니다.
pub fn history_statistics(paths: &PathsConfig) -> Result<StoreStatistics> {
    let store = TimeSeriesStore::open(&paths.history_dir)?;
    let stats = store.statistics();

    match stats.date_range {
        Some((first, last)) => tracing::info!(
            total_files = stats.total_files,
            total_data_points = stats.total_data_points,
            first = %first,
            last = %last,
            average_daily_records = format!("{:.1}", stats.average_daily_records),
            "시계열 저장소 통계"
        ),
        None => tracing::info!("시계열 저장소가 비어 있습니다"),
    }

    Ok(stats)
}

/// 기간/컬럼 조회.
pub fn query_history(
    paths: &PathsConfig,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    columns: Option<&[String]>,
) -> Result<QueryFrame> {
    let store = TimeSeriesStore::open(&paths.history_dir)?;
    let frame = store.query(start, end, columns)?;

    tracing::info!(rows = frame.len(), columns = frame.columns.len(), "시계열 조회");
    Ok(frame)
}

/// 보관 기간이 지난 스냅샷을 삭제합니다.
pub fn cleanup_history(paths: &PathsConfig, keep_days: u32) -> Result<CleanupReport> {
    let mut store = TimeSeriesStore::open(&paths.history_dir)?;
    Ok(store.cleanup(keep_days)?)
}
