//! 전체 수집 흐름.
//!
//! 기존 테이블 로드 → 종목 코드 취득/정규화 → 구간 선택 → 병렬 수집 →
//! upsert 병합 → 출력 테이블 저장 → 일자 스냅샷 기록.

use std::path::Path;
use std::time::Instant;

use chrono::NaiveDate;
use kabu_core::StockCode;
use kabu_data::{merge_results, AcquireMethod, LedgerEntry, OutputTable, TimeSeriesStore, UniverseChain};
use tracing::{info, warn};

use super::executor::FetchExecutor;
use super::universe_sync::acquire_codes;
use super::window::{select_window, WindowOptions};
use crate::config::PathsConfig;
use crate::error::CollectorError;
use crate::stats::CollectionStats;
use crate::Result;

/// 수집 실행 옵션.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// 종목 코드 취득 방식
    pub method: AcquireMethod,
    pub window: WindowOptions,
}

/// 수집 실행 결과.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stats: CollectionStats,
    /// 구간 선택 결과가 비어 수집을 건너뜀
    pub nothing_to_do: bool,
    /// 병합 검증 실패로 새 결과만 저장함
    pub merge_fallback: bool,
    /// 저장된 출력 테이블 행 수
    pub table_rows: usize,
    /// 기록된 일자 스냅샷
    pub snapshot: Option<LedgerEntry>,
    /// 취소/마감으로 시작하지 못한 종목
    pub unscheduled: Vec<StockCode>,
}

/// 기존 출력 테이블을 읽습니다. 읽을 수 없으면 없는 것으로 봅니다.
fn load_existing(path: &Path) -> Option<OutputTable> {
    match OutputTable::load(path) {
        Ok(table) => table,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "기존 테이블 읽기 실패, 무시");
            None
        }
    }
}

/// 전체 수집을 실행합니다.
///
/// 어떤 소스에서도 종목 코드를 얻지 못하고 기존 테이블도 없을 때만 실패합니다.
/// 그 밖의 실패는 로그와 결과 통계로만 드러납니다.
pub async fn run_collection(
    chain: &UniverseChain,
    executor: &FetchExecutor,
    paths: &PathsConfig,
    options: &RunOptions,
    today: NaiveDate,
) -> Result<RunReport> {
    let started = Instant::now();
    let mut report = RunReport::default();

    let existing = load_existing(&paths.output_file);
    if let Some(table) = &existing {
        info!(rows = table.len(), "기존 테이블 로드");
    }

    let normalized = acquire_codes(chain, &options.method).await;
    report.stats.rejected = normalized.rejected_count();

    let universe = if !normalized.codes.is_empty() {
        normalized.codes
    } else {
        match &existing {
            Some(table) if !table.is_empty() => {
                warn!(count = table.len(), "종목 코드 취득 실패, 기존 테이블의 코드 사용");
                table.codes()
            }
            _ => return Err(CollectorError::NoIdentifiers),
        }
    };

    let window = select_window(&universe, existing.as_ref(), &options.window);
    report.stats.skipped = window.skipped;

    if window.is_empty() {
        info!(universe = universe.len(), "수집할 종목 없음");
        report.nothing_to_do = true;
        report.table_rows = existing.as_ref().map_or(0, OutputTable::len);
        report.stats.elapsed = started.elapsed();
        return Ok(report);
    }

    let batch = executor.run(&window.codes).await;
    report.stats.record(&batch.results);
    report.stats.unscheduled = batch.unscheduled.len();
    report.unscheduled = batch.unscheduled;

    if batch.results.is_empty() {
        warn!("수집 결과 없음, 테이블 유지");
        report.table_rows = existing.as_ref().map_or(0, OutputTable::len);
        report.stats.elapsed = started.elapsed();
        return Ok(report);
    }

    let outcome = merge_results(existing, batch.results);
    report.merge_fallback = outcome.is_fallback();
    let table = outcome.into_table();

    table.save(&paths.output_file)?;
    report.table_rows = table.len();
    info!(path = %paths.output_file.display(), rows = table.len(), "출력 테이블 저장");

    report.snapshot = match TimeSeriesStore::open(&paths.history_dir)
        .and_then(|mut store| store.write(today, &table))
    {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(date = %today, error = %e, "일자 스냅샷 저장 실패");
            None
        }
    };

    report.stats.elapsed = started.elapsed();
    Ok(report)
}
