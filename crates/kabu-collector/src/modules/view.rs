//! 업종별 파생 뷰 조회.

use std::time::Duration;

use kabu_data::{
    build_sector_view, load_classification, DataError, DerivedViewCache, OutputTable, SectorView,
};

use crate::config::PathsConfig;
use crate::Result;

/// 캐시를 거쳐 업종별 뷰를 반환합니다.
///
/// `refresh`이면 캐시를 버리고 다시 만듭니다.
pub fn sector_view(paths: &PathsConfig, ttl: Duration, refresh: bool) -> Result<SectorView> {
    let cache = DerivedViewCache::new(&paths.view_cache_file, ttl);
    if refresh {
        cache.invalidate()?;
    }

    let view = cache.get_or_build(|| {
        let table = OutputTable::load(&paths.output_file)?.ok_or_else(|| {
            DataError::NotFound(format!("출력 테이블 없음: {}", paths.output_file.display()))
        })?;
        let classification = load_classification(&paths.classification_file)?;
        Ok(build_sector_view(&table, &classification))
    })?;

    for (sector, rows) in view.bucket_sizes() {
        tracing::debug!(sector, rows, "업종");
    }
    tracing::info!(
        sectors = view.sectors.len(),
        rows = view.total_rows(),
        built_at = %view.built_at,
        "업종별 뷰"
    );

    Ok(view)
}
